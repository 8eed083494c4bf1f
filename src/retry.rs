//! 再試行ユーティリティ
//!
//! AIオラクルの呼び出しとバッチ処理の両方で使う。
//! 最大試行回数・待機時間の計算方法・再試行可否の判定を外から与える。

use crate::error::{MatcherError, Result};
use log::warn;
use std::future::Future;
use std::time::Duration;

/// 失敗後の待機時間の決め方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// 毎回同じ待機
    Fixed(Duration),
    /// n回目の失敗後に base × n
    Linear(Duration),
    /// レート制限なら rate_limit_base × 2^n、それ以外は base × n
    RateLimitAware {
        base: Duration,
        rate_limit_base: Duration,
    },
}

impl Backoff {
    /// `failures` 回目の失敗の後に待つ時間
    pub fn delay_for(&self, error: &MatcherError, failures: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Linear(base) => base.saturating_mul(failures),
            Backoff::RateLimitAware {
                base,
                rate_limit_base,
            } => {
                if error.is_rate_limit() {
                    let exponent = failures.min(16);
                    rate_limit_base.saturating_mul(1u32 << exponent)
                } else {
                    base.saturating_mul(failures)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 初回を含む試行回数（1以上）
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// 固定間隔での再試行
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, Backoff::Fixed(delay))
    }

    /// バッチ単位の再試行（3回、レート制限は 2^n × 2秒、その他は n × 1秒）
    pub fn batch() -> Self {
        Self::new(
            3,
            Backoff::RateLimitAware {
                base: Duration::from_millis(1000),
                rate_limit_base: Duration::from_millis(2000),
            },
        )
    }

    /// `op` を成功するか再試行不可になるまで実行する
    ///
    /// `op` には1始まりの試行番号が渡される。最後のエラーをそのまま返す。
    pub async fn run<T, F, Fut, P>(&self, mut op: F, retryable: P) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&MatcherError) -> bool,
    {
        let mut failures = 0u32;
        loop {
            match op(failures + 1).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    failures += 1;
                    if !retryable(&err) || failures >= self.max_attempts {
                        return Err(err);
                    }
                    let delay = self.backoff.delay_for(&err, failures);
                    warn!(
                        "試行 {}/{} 失敗: {} ({}ms後に再試行)",
                        failures,
                        self.max_attempts,
                        err,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
