//! エラーケーステスト
//!
//! エラーの表示・変換・致命度の分類を検証

use sheet_matcher::config::Config;
use sheet_matcher::error::MatcherError;
use sheet_matcher::job::JobFile;
use tempfile::tempdir;

/// MatcherErrorのDisplay実装確認
#[test]
fn test_error_display() {
    let errors = vec![
        MatcherError::Config("テスト設定エラー".to_string()),
        MatcherError::MissingApiKey,
        MatcherError::ApiCall("API呼び出し失敗".to_string()),
        MatcherError::RateLimited("429".to_string()),
        MatcherError::ApiParse("不正なJSON".to_string()),
        MatcherError::Data("データなし".to_string()),
        MatcherError::SheetRead("シートなし".to_string()),
        MatcherError::Export("書き出し失敗".to_string()),
        MatcherError::Excel("Excel生成エラー".to_string()),
        MatcherError::SessionExpired,
    ];

    for err in errors {
        let display = format!("{}", err);
        assert!(!display.is_empty(), "エラーメッセージが空: {:?}", err);
    }
}

/// MissingApiKeyエラーのメッセージ確認
#[test]
fn test_missing_api_key_message() {
    let display = format!("{}", MatcherError::MissingApiKey);

    assert!(display.contains("APIキー"));
    assert!(display.contains("sheet-matcher config"));
}

/// 致命度の分類
#[test]
fn test_fatal_classification() {
    assert!(MatcherError::MissingApiKey.is_fatal());
    assert!(MatcherError::Config("x".into()).is_fatal());
    assert!(MatcherError::SessionExpired.is_fatal());
    assert!(MatcherError::Data("x".into()).is_fatal());

    assert!(!MatcherError::ApiCall("x".into()).is_fatal());
    assert!(!MatcherError::RateLimited("x".into()).is_fatal());
    assert!(!MatcherError::ApiParse("x".into()).is_fatal());
    assert!(!MatcherError::Export("x".into()).is_fatal());
}

/// レート制限の判定
#[test]
fn test_rate_limit_classification() {
    assert!(MatcherError::RateLimited("429".into()).is_rate_limit());
    assert!(MatcherError::ApiCall("Rate limit reached for requests".into()).is_rate_limit());
    assert!(MatcherError::ApiCall("You exceeded your current quota".into()).is_rate_limit());
    assert!(!MatcherError::ApiCall("500 Internal Server Error".into()).is_rate_limit());
    assert!(!MatcherError::Export("rate limit".into()).is_rate_limit());
}

/// IOエラーからの変換
#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let err: MatcherError = io_err.into();

    assert!(matches!(err, MatcherError::Io(_)));
    assert!(format!("{}", err).contains("IO"));
}

/// JSONエラーからの変換
#[test]
fn test_json_error_conversion() {
    let json_err = serde_json::from_str::<serde_json::Value>("{ invalid }").unwrap_err();
    let err: MatcherError = json_err.into();

    assert!(matches!(err, MatcherError::JsonParse(_)));
}

/// common::Errorからの変換（透過的エラー）
#[test]
fn test_common_error_conversion() {
    let common_err = sheet_matcher_common::Error::Range("invalid column: 1A".to_string());
    let err: MatcherError = common_err.into();

    assert!(matches!(err, MatcherError::Common(_)));
    assert!(format!("{}", err).contains("invalid column"));
}

/// 設定値の検証エラーは実行前に検出される
#[test]
fn test_invalid_settings_rejected_before_run() {
    let mut config = Config::default();
    config.ai.retry_attempts = 0;
    assert!(config.run_config().is_err());

    let mut config = Config::default();
    config.export.chunk_size = 0;
    assert!(config.run_config().is_err());

    let mut config = Config::default();
    config.ai.threshold = 101;
    assert!(config.run_config().is_err());
}

/// 壊れたジョブファイル
#[test]
fn test_malformed_job_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("job.json");
    std::fs::write(&path, "{ \"target\": 1 }").unwrap();

    let result = JobFile::load(&path);
    assert!(matches!(result, Err(MatcherError::JsonParse(_))));

    let missing = JobFile::load(&dir.path().join("none.json"));
    assert!(matches!(missing, Err(MatcherError::Config(_))));
}
