use crate::error::{MatcherError, Result};
use serde::{Deserialize, Serialize};
use sheet_matcher_common::{AiConfig, ExportConfig, ProcessingConfig};
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Google OAuthのリフレッシュトークン設定
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GoogleOAuth {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_url: String,
    pub google_access_token: Option<String>,
    pub google_oauth: Option<GoogleOAuth>,
    pub ai: AiConfig,
    pub export: ExportConfig,
    pub processing: ProcessingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.into(),
            google_access_token: None,
            google_oauth: None,
            ai: AiConfig::default(),
            export: ExportConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| MatcherError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("sheet-matcher").join("config.json"))
    }

    pub fn get_api_key(&self) -> Result<String> {
        // 環境変数を優先
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                return Ok(key);
            }
        }

        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(MatcherError::MissingApiKey)
    }

    pub fn set_api_key(&mut self, key: String) -> Result<()> {
        self.api_key = Some(key);
        self.save()
    }

    pub fn google_token(&self) -> Option<String> {
        std::env::var("GOOGLE_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.google_access_token.clone())
    }

    /// 実行単位の不変設定を組み立てる
    pub fn run_config(&self) -> Result<RunConfig> {
        self.ai.validate()?;
        self.export.validate()?;
        if self.processing.base_batch_size == 0 {
            return Err(MatcherError::Config("baseBatchSize must be at least 1".into()));
        }
        if self.processing.max_criteria_per_request == 0 {
            return Err(MatcherError::Config(
                "maxCriteriaPerRequest must be at least 1".into(),
            ));
        }
        Ok(RunConfig {
            ai: self.ai.clone(),
            export: self.export.clone(),
            processing: self.processing.clone(),
        })
    }
}

/// 1回の実行で使う設定（実行中は変更しない）
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub ai: AiConfig,
    pub export: ExportConfig,
    pub processing: ProcessingConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            ai: AiConfig::default(),
            export: ExportConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}
