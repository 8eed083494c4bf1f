//! バッチ計画と適応的な待機時間

use sheet_matcher_common::{adaptive_delay_ms, BatchPlan};
use std::time::Duration;

/// 対象行数と条件数から実行計画を立てる
pub fn plan_run(total_rows: usize, criteria_count: usize, base_batch_size: usize) -> BatchPlan {
    BatchPlan::new(total_rows, criteria_count, base_batch_size)
}

/// 実行開始からの実測レートに応じたバッチ間待機時間
pub fn next_delay(api_call_count: u64, elapsed: Duration, base: Duration) -> Duration {
    let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(adaptive_delay_ms(api_call_count, elapsed_ms, base_ms))
}
