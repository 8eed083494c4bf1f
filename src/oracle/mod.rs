//! AIオラクル
//!
//! 完全一致で判定できなかった値を言語モデルに問い合わせる。
//! 一時的な失敗は再試行し、使い切った場合はフォールバック照合か
//! error種別の結果に畳み込む。呼び出し元へ伝播するのは致命的な設定エラーのみ。

pub mod chat;
pub mod response;

pub use chat::{ChatBackend, ChatMessage, ChatRequest, HttpChatBackend};
pub use response::{extract_confidence, interpret_response, is_affirmative};

use crate::error::Result;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use log::{debug, warn};
use sheet_matcher_common::{basic_match, build_user_message, AiConfig, MatchResult};
use std::time::Duration;

/// 分類オラクル
#[async_trait]
pub trait Oracle: Send + Sync {
    /// 呼び出し前の検証（認証情報の欠落は致命的エラー）
    fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    /// 1値を条件リストに対して分類する
    async fn classify(
        &self,
        target: &str,
        criteria: &[String],
        config: &AiConfig,
    ) -> Result<MatchResult>;
}

/// Chat Completions を使うオラクル
pub struct AiOracle<B: ChatBackend> {
    backend: B,
    max_criteria: usize,
}

impl<B: ChatBackend> AiOracle<B> {
    pub fn new(backend: B, max_criteria: usize) -> Self {
        Self {
            backend,
            max_criteria: max_criteria.max(1),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[async_trait]
impl<B: ChatBackend> Oracle for AiOracle<B> {
    fn ensure_ready(&self) -> Result<()> {
        self.backend.ensure_ready()
    }

    async fn classify(
        &self,
        target: &str,
        criteria: &[String],
        config: &AiConfig,
    ) -> Result<MatchResult> {
        self.backend.ensure_ready()?;

        let request = ChatRequest::new(
            config,
            build_user_message(target, criteria, self.max_criteria),
        );
        let timeout = Duration::from_secs(config.timeout.max(1));
        let policy = RetryPolicy::fixed(
            config.retry_attempts,
            Duration::from_millis(config.batch_delay_ms),
        );

        let outcome = policy
            .run(
                |attempt| {
                    debug!("AI照合 \"{}\" (試行 {})", target, attempt);
                    self.backend.complete(&request, timeout)
                },
                |e| !e.is_fatal(),
            )
            .await;

        match outcome {
            Ok(text) => Ok(interpret_response(&text, config.threshold)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("AI照合の再試行上限に到達 (\"{}\"): {}", target, e);
                if config.fallback_matching {
                    Ok(MatchResult::fallback(basic_match(target, criteria)))
                } else {
                    Ok(MatchResult::error(format!("AI error: {}", e)))
                }
            }
        }
    }
}
