//! Chat Completions API連携
//!
//! リクエスト/レスポンスの型と、reqwestによるHTTPバックエンド

use crate::error::{MatcherError, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use sheet_matcher_common::AiConfig;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }
}

/// Chat Completions リクエスト
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ChatRequest {
    /// system（設定のプロンプト）+ user の2メッセージ構成
    pub fn new(config: &AiConfig, user_message: String) -> Self {
        Self {
            model: config.model.clone(),
            messages: vec![
                ChatMessage::system(config.prompt.clone()),
                ChatMessage::user(user_message),
            ],
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

/// Chat Completions レスポンス
#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// チャットAPIの送信口
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// 認証情報が揃っているか（揃っていなければ致命的な設定エラー）
    fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    /// 1回分の呼び出し。応答テキスト（choices[0].message.content）を返す
    async fn complete(&self, request: &ChatRequest, timeout: Duration) -> Result<String>;
}

/// OpenAI互換エンドポイントへのHTTPバックエンド
pub struct HttpChatBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl HttpChatBackend {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    fn ensure_ready(&self) -> Result<()> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(()),
            _ => Err(MatcherError::MissingApiKey),
        }
    }

    async fn complete(&self, request: &ChatRequest, timeout: Duration) -> Result<String> {
        self.ensure_ready()?;
        let api_key = self.api_key.as_deref().unwrap_or_default();

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .timeout(timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| MatcherError::ApiCall(format!("OpenAI API送信失敗: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("OpenAI API error: {} - {}", status, body.trim());
            return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                MatcherError::RateLimited(message)
            } else {
                MatcherError::ApiCall(message)
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| MatcherError::ApiParse(format!("レスポンスJSON: {}", e)))?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| MatcherError::ApiParse("choices[0].message.content がありません".into()))?;

        debug!("AI応答: {}", text.trim());
        Ok(text)
    }
}
