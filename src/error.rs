use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatcherError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("OpenAI APIキーが設定されていません。`sheet-matcher config --set-api-key YOUR_KEY` で設定してください")]
    MissingApiKey,

    #[error("API呼び出しエラー: {0}")]
    ApiCall(String),

    #[error("APIレート制限: {0}")]
    RateLimited(String),

    #[error("APIレスポンスのパースに失敗: {0}")]
    ApiParse(String),

    #[error("データエラー: {0}")]
    Data(String),

    #[error("シート読み込みエラー: {0}")]
    SheetRead(String),

    #[error("エクスポートエラー: {0}")]
    Export(String),

    #[error("Excelエラー: {0}")]
    Excel(String),

    #[error("セッションの有効期限が切れました。再認証してください")]
    SessionExpired,

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] sheet_matcher_common::Error),
}

impl MatcherError {
    /// 再試行しても回復しないエラー（実行全体を中断する）
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MatcherError::Config(_)
                | MatcherError::MissingApiKey
                | MatcherError::SessionExpired
                | MatcherError::Data(_)
                | MatcherError::Common(_)
        )
    }

    pub fn is_rate_limit(&self) -> bool {
        match self {
            MatcherError::RateLimited(_) => true,
            MatcherError::ApiCall(message) => {
                let message = message.to_lowercase();
                message.contains("rate limit") || message.contains("quota")
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, MatcherError>;
