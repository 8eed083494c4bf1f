//! バッチ計画の計算式
//!
//! 条件数に応じたバッチサイズと、実測した呼び出しレートに応じた
//! バッチ間待機時間を求める。非同期処理は含まない。

/// バッチサイズの下限
pub const MIN_BATCH_SIZE: usize = 2;
/// バッチサイズの上限
pub const MAX_BATCH_SIZE: usize = 20;

/// 対象データ全体のバッチ計画
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    pub total_rows: usize,
    pub batch_size: usize,
    pub total_batches: usize,
}

impl BatchPlan {
    /// 対象行数・条件数から計画を立てる
    pub fn new(total_rows: usize, criteria_count: usize, base_batch_size: usize) -> Self {
        let batch_size = plan_batch_size(criteria_count, base_batch_size);
        Self {
            total_rows,
            batch_size,
            total_batches: total_rows.div_ceil(batch_size),
        }
    }

    /// i番目のバッチの行範囲
    pub fn batch_range(&self, index: usize) -> std::ops::Range<usize> {
        let start = (index * self.batch_size).min(self.total_rows);
        let end = (start + self.batch_size).min(self.total_rows);
        start..end
    }

    pub fn is_last(&self, index: usize) -> bool {
        index + 1 >= self.total_batches
    }
}

/// バッチサイズ = clamp(floor(base / max(1, 条件数/3)), 2, 20)
///
/// 条件数が多いほどバッチを小さくして、1バッチあたりのAI呼び出しの集中を抑える
///
/// # Examples
/// ```
/// use sheet_matcher_common::plan_batch_size;
///
/// assert_eq!(plan_batch_size(9, 50), 16);
/// assert_eq!(plan_batch_size(1, 50), 20);
/// ```
pub fn plan_batch_size(criteria_count: usize, base_batch_size: usize) -> usize {
    let factor = (criteria_count as f64 / 3.0).max(1.0);
    let adjusted = (base_batch_size as f64 / factor).floor() as usize;
    adjusted.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE)
}

/// 実測レートに応じたバッチ間待機時間（ミリ秒）
///
/// 毎秒5回超なら2倍、3回超なら1.5倍、それ以外は基準値
pub fn adaptive_delay_ms(api_call_count: u64, elapsed_ms: u64, base_delay_ms: u64) -> u64 {
    if api_call_count == 0 {
        return base_delay_ms;
    }
    let calls_per_second = if elapsed_ms == 0 {
        f64::INFINITY
    } else {
        api_call_count as f64 / (elapsed_ms as f64 / 1000.0)
    };

    if calls_per_second > 5.0 {
        base_delay_ms.saturating_mul(2)
    } else if calls_per_second > 3.0 {
        base_delay_ms.saturating_mul(3) / 2
    } else {
        base_delay_ms
    }
}
