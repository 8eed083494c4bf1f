//! Google Sheets v4 REST バックエンド
//!
//! HTTP 401 を受けたらトークンを1回だけ更新して再送する。
//! 更新に失敗するか再送も 401 ならセッション切れ（致命的）とする。

use super::{RowSource, SheetSink};
use crate::config::GoogleOAuth;
use crate::error::{MatcherError, Result};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use sheet_matcher_common::a1::quote_sheet_name;
use tokio::sync::Mutex;

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets/";
pub const OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// アクセストークンの供給元
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;

    /// 401 を受けた後に呼ばれる。更新できなければ `SessionExpired`
    async fn refresh(&self) -> Result<String>;
}

/// 固定トークン（更新不可）
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }

    async fn refresh(&self) -> Result<String> {
        Err(MatcherError::SessionExpired)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// OAuth リフレッシュトークンでアクセストークンを取得する
pub struct RefreshTokenProvider {
    client: reqwest::Client,
    oauth: GoogleOAuth,
    token_url: String,
    current: Mutex<Option<String>>,
}

impl RefreshTokenProvider {
    pub fn new(oauth: GoogleOAuth) -> Self {
        Self::with_token_url(oauth, OAUTH_TOKEN_URL)
    }

    pub fn with_token_url(oauth: GoogleOAuth, token_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            oauth,
            token_url: token_url.into(),
            current: Mutex::new(None),
        }
    }

    async fn request_token(&self) -> Result<String> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.oauth.client_id.as_str()),
            ("client_secret", self.oauth.client_secret.as_str()),
            ("refresh_token", self.oauth.refresh_token.as_str()),
        ];
        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                warn!("トークン更新の送信に失敗: {}", e);
                MatcherError::SessionExpired
            })?;

        if !response.status().is_success() {
            warn!("トークン更新が拒否されました: {}", response.status());
            return Err(MatcherError::SessionExpired);
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            warn!("トークン応答のパースに失敗: {}", e);
            MatcherError::SessionExpired
        })?;
        Ok(body.access_token)
    }
}

#[async_trait]
impl TokenProvider for RefreshTokenProvider {
    async fn access_token(&self) -> Result<String> {
        let mut current = self.current.lock().await;
        if let Some(token) = current.as_ref() {
            return Ok(token.clone());
        }
        let token = self.request_token().await?;
        *current = Some(token.clone());
        Ok(token)
    }

    async fn refresh(&self) -> Result<String> {
        let mut current = self.current.lock().await;
        let token = self.request_token().await?;
        *current = Some(token.clone());
        Ok(token)
    }
}

/// 操作の種類（エラーの分類に使う）
#[derive(Clone, Copy)]
enum Operation {
    Read,
    Write,
}

impl Operation {
    fn error(self, message: String) -> MatcherError {
        match self {
            Operation::Read => MatcherError::SheetRead(message),
            Operation::Write => MatcherError::Export(message),
        }
    }
}

pub struct GoogleSheetsClient {
    client: reqwest::Client,
    base_url: Url,
    tokens: Box<dyn TokenProvider>,
}

impl GoogleSheetsClient {
    pub fn new(tokens: Box<dyn TokenProvider>) -> Result<Self> {
        Self::with_base_url(tokens, SHEETS_API_BASE)
    }

    pub fn with_base_url(tokens: Box<dyn TokenProvider>, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| MatcherError::Config(format!("Sheets APIのURLが不正です: {}", e)))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            tokens,
        })
    }

    /// `{base}/{spreadsheet}/values/{range}`
    fn values_url(&self, resource_id: &str, range: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| MatcherError::Config(format!("Sheets APIのURLが不正です: {}", self.base_url)))?
            .pop_if_empty()
            .extend([resource_id, "values", range]);
        Ok(url)
    }

    /// 401 なら1回だけトークンを更新して再送する
    async fn send(
        &self,
        operation: Operation,
        build: impl Fn(&str) -> RequestBuilder + Send + Sync,
    ) -> Result<Response> {
        let token = self.tokens.access_token().await?;
        let response = build(&token)
            .send()
            .await
            .map_err(|e| operation.error(format!("Sheets API送信失敗: {}", e)))?;

        let response = if response.status() == StatusCode::UNAUTHORIZED {
            debug!("Sheets API 401: トークンを更新して再送します");
            let token = self.tokens.refresh().await?;
            let retried = build(&token)
                .send()
                .await
                .map_err(|e| operation.error(format!("Sheets API送信失敗: {}", e)))?;
            if retried.status() == StatusCode::UNAUTHORIZED {
                return Err(MatcherError::SessionExpired);
            }
            retried
        } else {
            response
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(operation.error(format!(
                "Sheets API error: {} - {}",
                status,
                body.trim()
            )));
        }
        Ok(response)
    }
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl RowSource for GoogleSheetsClient {
    async fn fetch_column_values(
        &self,
        resource_id: &str,
        sheet_name: &str,
        column_range: &str,
    ) -> Result<Vec<Vec<String>>> {
        let range = format!("{}!{}", quote_sheet_name(sheet_name), column_range);
        let url = self.values_url(resource_id, &range)?;

        let response = self
            .send(Operation::Read, |token| self.client.get(url.clone()).bearer_auth(token))
            .await?;
        let body: ValueRange = response
            .json()
            .await
            .map_err(|e| MatcherError::SheetRead(format!("レスポンスJSON: {}", e)))?;

        Ok(body
            .values
            .iter()
            .map(|row| row.iter().map(value_text).collect())
            .collect())
    }
}

#[async_trait]
impl SheetSink for GoogleSheetsClient {
    async fn clear_range(&self, resource_id: &str, sheet_range: &str) -> Result<()> {
        let url = self.values_url(resource_id, &format!("{}:clear", sheet_range))?;
        self.send(Operation::Write, |token| {
            self.client.post(url.clone()).bearer_auth(token).json(&json!({}))
        })
        .await?;
        Ok(())
    }

    async fn write_range(
        &self,
        resource_id: &str,
        range_start: &str,
        values: &[Vec<String>],
    ) -> Result<()> {
        let mut url = self.values_url(resource_id, range_start)?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = json!({ "range": range_start, "values": values });

        self.send(Operation::Write, |token| {
            self.client.put(url.clone()).bearer_auth(token).json(&body)
        })
        .await?;
        Ok(())
    }

    async fn append_rows(
        &self,
        resource_id: &str,
        sheet_name: &str,
        values: &[Vec<String>],
    ) -> Result<()> {
        let mut url =
            self.values_url(resource_id, &format!("{}:append", quote_sheet_name(sheet_name)))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let body = json!({ "values": values });

        self.send(Operation::Write, |token| {
            self.client.post(url.clone()).bearer_auth(token).json(&body)
        })
        .await?;
        Ok(())
    }
}
