//! 照合処理の型定義
//!
//! CLIと各シートバックエンドで共有される型:
//! - Criterion / TargetRow: 入力（条件リストと対象行）
//! - MatchResult / MatchDetail: 1セル単位の照合結果
//! - MatchedRow: 全条件を通過した出力行
//! - AiConfig / ExportConfig / ProcessingConfig: 実行単位の設定

use crate::error::{Error, Result};
use crate::prompts::DEFAULT_MATCH_PROMPT;
use serde::{Deserialize, Serialize};

/// 完全一致（部分一致を含む）時の信頼度
pub const EXACT_CONFIDENCE: u8 = 95;
/// フォールバック照合でヒットした場合の信頼度
pub const FALLBACK_MATCH_CONFIDENCE: u8 = 60;
/// フォールバック照合でヒットしなかった場合の信頼度
pub const FALLBACK_MISS_CONFIDENCE: u8 = 40;

/// 照合種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Ai,
    Fallback,
    Error,
    None,
}

impl MatchType {
    /// AIオラクルに問い合わせた結果かどうか
    pub fn is_oracle(&self) -> bool {
        matches!(self, MatchType::Ai | MatchType::Fallback | MatchType::Error)
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchType::Exact => write!(f, "exact"),
            MatchType::Ai => write!(f, "ai"),
            MatchType::Fallback => write!(f, "fallback"),
            MatchType::Error => write!(f, "error"),
            MatchType::None => write!(f, "none"),
        }
    }
}

/// 1セルの照合結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub is_match: bool,
    /// 0..=100
    pub confidence: u8,
    pub match_type: MatchType,
    #[serde(default)]
    pub details: String,
}

impl MatchResult {
    pub fn exact() -> Self {
        Self {
            is_match: true,
            confidence: EXACT_CONFIDENCE,
            match_type: MatchType::Exact,
            details: "exact match found".into(),
        }
    }

    pub fn none(details: impl Into<String>) -> Self {
        Self {
            is_match: false,
            confidence: 0,
            match_type: MatchType::None,
            details: details.into(),
        }
    }

    pub fn error(details: impl Into<String>) -> Self {
        Self {
            is_match: false,
            confidence: 0,
            match_type: MatchType::Error,
            details: details.into(),
        }
    }

    /// AI不通時の簡易照合結果
    pub fn fallback(matched: bool) -> Self {
        Self {
            is_match: matched,
            confidence: if matched {
                FALLBACK_MATCH_CONFIDENCE
            } else {
                FALLBACK_MISS_CONFIDENCE
            },
            match_type: MatchType::Fallback,
            details: "oracle unavailable, basic match used".into(),
        }
    }

    /// 閾値未満として棄却（信頼度と種別は診断用に保持）
    pub fn below_threshold(self, threshold: u8) -> Self {
        Self {
            is_match: false,
            confidence: self.confidence,
            match_type: self.match_type,
            details: format!(
                "below threshold: confidence {}% < {}%",
                self.confidence, threshold
            ),
        }
    }

    /// 閾値込みで採用可能か
    pub fn passes(&self, threshold: u8) -> bool {
        self.is_match && self.confidence >= threshold
    }
}

/// 条件ごとの照合記録
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetail {
    pub criterion_name: String,
    pub target_value: String,
    pub confidence: u8,
    pub match_type: MatchType,
    pub details: String,
}

/// 条件値の取得元
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionSource {
    /// スプレッドシートID、またはxlsxファイルのパス
    pub resource_id: String,
    pub sheet_name: String,
}

/// 照合条件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Criterion {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub source: CriterionSource,
    pub source_column_index: usize,
    pub target_column_index: usize,
    /// 遅延ロードされる条件値（順序・重複は結果に影響しない）
    #[serde(default)]
    pub values: Vec<String>,
}

impl Criterion {
    /// 対象行から照合対象セルを取得（列が無ければ空文字）
    pub fn target_value<'a>(&self, row: &'a TargetRow) -> &'a str {
        row.cell(self.target_column_index)
    }

    /// 列データ（ヘッダー行込み）から条件値を設定
    ///
    /// ヘッダー行を除外し、各行の先頭セルのうち空白でないものだけを採用する
    pub fn set_values_from_column(&mut self, column: &[Vec<String>]) {
        self.values = column
            .iter()
            .skip(1)
            .filter_map(|row| row.first())
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .collect();
    }
}

/// 対象行（読み込み後は不変）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRow {
    pub data: Vec<String>,
    pub original_index: usize,
}

impl TargetRow {
    pub fn new(data: Vec<String>, original_index: usize) -> Self {
        Self { data, original_index }
    }

    pub fn cell(&self, index: usize) -> &str {
        self.data.get(index).map(String::as_str).unwrap_or("")
    }
}

/// 全条件を通過した行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedRow {
    pub data: Vec<String>,
    pub match_details: Vec<MatchDetail>,
    pub average_confidence: u8,
    /// 出現順を保った重複なしの照合種別
    pub match_types: Vec<MatchType>,
}

impl MatchedRow {
    /// 照合記録と累計値から出力行を作る
    ///
    /// 平均信頼度は round(累計 / 件数)、照合種別は出現順で重複を除く
    pub fn new(
        data: Vec<String>,
        match_details: Vec<MatchDetail>,
        total_confidence: u32,
        match_count: u32,
    ) -> Self {
        let average_confidence = if match_count == 0 {
            0
        } else {
            (total_confidence as f64 / match_count as f64).round() as u8
        };

        let mut match_types = Vec::new();
        for detail in &match_details {
            if !match_types.contains(&detail.match_type) {
                match_types.push(detail.match_type);
            }
        }

        Self {
            data,
            match_details,
            average_confidence,
            match_types,
        }
    }
}

/// AI照合設定（実行開始時に一度だけ読み込み、実行中は不変）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiConfig {
    pub enabled: bool,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// 秒
    pub timeout: u64,
    /// 0..=100
    pub threshold: u8,
    pub retry_attempts: u32,
    pub batch_delay_ms: u64,
    pub fallback_matching: bool,
    pub case_sensitive: bool,
    pub prompt: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "gpt-3.5-turbo".into(),
            temperature: 0.3,
            max_tokens: 150,
            timeout: 30,
            threshold: 70,
            retry_attempts: 3,
            batch_delay_ms: 1000,
            fallback_matching: true,
            case_sensitive: false,
            prompt: DEFAULT_MATCH_PROMPT.into(),
        }
    }
}

impl AiConfig {
    pub fn validate(&self) -> Result<()> {
        if self.threshold > 100 {
            return Err(Error::Config(format!(
                "threshold must be within 0..=100 (got {})",
                self.threshold
            )));
        }
        if self.retry_attempts == 0 {
            return Err(Error::Config("retryAttempts must be at least 1".into()));
        }
        if self.max_tokens == 0 {
            return Err(Error::Config("maxTokens must be positive".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::Config(format!(
                "temperature must be within 0.0..=2.0 (got {})",
                self.temperature
            )));
        }
        if self.enabled && self.model.trim().is_empty() {
            return Err(Error::Config("model is empty".into()));
        }
        Ok(())
    }
}

/// 段階的エクスポート設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportConfig {
    pub enabled: bool,
    pub chunk_size: usize,
    pub batch_delay_ms: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chunk_size: 10,
            batch_delay_ms: 500,
        }
    }
}

impl ExportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("exportChunkSize must be at least 1".into()));
        }
        Ok(())
    }
}

/// バッチ処理設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessingConfig {
    pub base_batch_size: usize,
    /// 1回のAI問い合わせに含める条件値の上限
    pub max_criteria_per_request: usize,
    /// 対象行数の上限（None = 全行）
    pub rows_limit: Option<usize>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            base_batch_size: 50,
            max_criteria_per_request: 10,
            rows_limit: None,
        }
    }
}
