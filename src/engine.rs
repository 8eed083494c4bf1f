//! 逐次絞り込みエンジン
//!
//! 1バッチ分の行に条件を1つずつ適用し、通過した行だけを次の条件へ送る。
//! 条件間はAND。候補が空になった時点で残りの条件は評価しない。

use crate::cancel::CancelFlag;
use crate::error::Result;
use crate::matcher::Matcher;
use log::debug;
use sheet_matcher_common::{AiConfig, Criterion, MatchDetail, MatchedRow, TargetRow};

/// 絞り込み中の行
struct RowCandidate<'r> {
    row: &'r TargetRow,
    match_details: Vec<MatchDetail>,
    total_confidence: u32,
    match_count: u32,
}

impl<'r> RowCandidate<'r> {
    fn new(row: &'r TargetRow) -> Self {
        Self {
            row,
            match_details: Vec::new(),
            total_confidence: 0,
            match_count: 0,
        }
    }

    fn into_matched(self) -> MatchedRow {
        MatchedRow::new(
            self.row.data.clone(),
            self.match_details,
            self.total_confidence,
            self.match_count,
        )
    }
}

/// 1バッチの処理結果
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub matched: Vec<MatchedRow>,
    /// 実際にAIへ問い合わせた回数
    pub oracle_calls: u64,
    /// 停止フラグで中断された（全条件を評価していない行が含まれうる）
    pub cancelled: bool,
}

/// 1バッチを条件順に絞り込む
pub async fn filter_batch(
    rows: &[TargetRow],
    criteria: &[Criterion],
    config: &AiConfig,
    matcher: &Matcher<'_>,
    cancel: &CancelFlag,
) -> Result<BatchOutcome> {
    let mut candidates: Vec<RowCandidate> = rows.iter().map(RowCandidate::new).collect();
    let mut oracle_calls = 0u64;
    let mut cancelled = false;

    for (index, criterion) in criteria.iter().enumerate() {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }

        debug!(
            "条件 {}/{} \"{}\": 残り{}行",
            index + 1,
            criteria.len(),
            criterion.name,
            candidates.len()
        );

        let mut survivors = Vec::with_capacity(candidates.len());
        for mut candidate in candidates {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let target_value = criterion.target_value(candidate.row);
            if target_value.trim().is_empty() {
                continue;
            }

            let result = matcher
                .evaluate(
                    target_value,
                    &criterion.values,
                    config.threshold,
                    config.case_sensitive,
                )
                .await?;
            if result.match_type.is_oracle() {
                oracle_calls += 1;
            }

            if result.passes(config.threshold) {
                candidate.total_confidence += result.confidence as u32;
                candidate.match_count += 1;
                candidate.match_details.push(MatchDetail {
                    criterion_name: criterion.name.clone(),
                    target_value: target_value.to_string(),
                    confidence: result.confidence,
                    match_type: result.match_type,
                    details: result.details,
                });
                survivors.push(candidate);
            }
        }

        candidates = survivors;
        debug!("条件 \"{}\" 通過: {}行", criterion.name, candidates.len());

        if cancelled || candidates.is_empty() {
            break;
        }
    }

    Ok(BatchOutcome {
        matched: candidates.into_iter().map(RowCandidate::into_matched).collect(),
        oracle_calls,
        cancelled,
    })
}
