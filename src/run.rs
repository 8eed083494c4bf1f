//! 実行の組み立て
//!
//! 条件値と対象データを読み込み、バッチごとに絞り込みを行い、
//! 照合済みの行を段階的にエクスポートする。状態は `RunState` に集約し、
//! 進捗は `RunEvent` として `ProgressObserver` へ通知する。

use crate::cancel::CancelFlag;
use crate::config::RunConfig;
use crate::engine::{filter_batch, BatchOutcome};
use crate::error::{MatcherError, Result};
use crate::export::{FlushOutcome, ProgressiveExporter};
use crate::matcher::Matcher;
use crate::oracle::Oracle;
use crate::retry::RetryPolicy;
use crate::scheduler::{self, next_delay};
use crate::sheets::{RowSource, SheetLocation, SheetSink};
use log::{info, warn};
use sheet_matcher_common::a1::{column_span, LAST_COLUMN};
use sheet_matcher_common::{BatchPlan, Criterion, TargetRow};
use std::time::Duration;
use tokio::time::Instant;

/// 実行の状態遷移: Idle → Running → (Filtering → Exporting?)* → Done | Cancelled | Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
    Filtering,
    Exporting,
    Done,
    Cancelled,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Cancelled | RunPhase::Failed)
    }
}

/// 実行中の集計値
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunState {
    pub phase: RunPhase,
    pub total_rows: usize,
    pub processed_rows: usize,
    pub matched_rows: usize,
    pub exported_rows: usize,
    pub api_calls: u64,
    pub current_batch: usize,
    pub total_batches: usize,
}

/// 進捗イベント
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Phase(RunPhase),
    Planned(BatchPlan),
    BatchStarted { index: usize, total: usize },
    BatchFinished { index: usize, state: RunState },
    Exported { rows: usize, total: usize },
    ExportFailed { pending: usize },
}

pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &RunEvent);
}

pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_event(&self, _event: &RunEvent) {}
}

static NOOP_OBSERVER: NoopObserver = NoopObserver;

/// 実行結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub phase: RunPhase,
    pub total_rows: usize,
    pub processed_rows: usize,
    pub matched_rows: usize,
    pub exported_rows: usize,
    /// 最終書き出しにも失敗して出力されなかった行
    pub unexported_rows: usize,
    pub api_calls: u64,
    pub batches: usize,
    pub elapsed: Duration,
}

/// 実行内容
#[derive(Debug, Clone, PartialEq)]
pub struct MatchJob {
    pub target: SheetLocation,
    pub output: SheetLocation,
    pub criteria: Vec<Criterion>,
}

/// 読み込み済みの対象データ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetData {
    pub header: Vec<String>,
    pub rows: Vec<TargetRow>,
}

pub struct MatchRun<'a> {
    config: &'a RunConfig,
    oracle: &'a dyn Oracle,
    source: &'a dyn RowSource,
    sink: &'a dyn SheetSink,
    observer: &'a dyn ProgressObserver,
    cancel: CancelFlag,
    state: RunState,
}

impl<'a> MatchRun<'a> {
    pub fn new(
        config: &'a RunConfig,
        oracle: &'a dyn Oracle,
        source: &'a dyn RowSource,
        sink: &'a dyn SheetSink,
    ) -> Self {
        Self {
            config,
            oracle,
            source,
            sink,
            observer: &NOOP_OBSERVER,
            cancel: CancelFlag::new(),
            state: RunState::default(),
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.observer = observer;
        self
    }

    /// 外部（Ctrl-Cハンドラ等）と停止フラグを共有する
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// 停止を要求する。処理中のAI呼び出しが終わった時点で止まる
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    fn set_phase(&mut self, phase: RunPhase) {
        if self.state.phase != phase {
            self.state.phase = phase;
            self.observer.on_event(&RunEvent::Phase(phase));
        }
    }

    /// 各条件の値リストを読み込む（ヘッダー行は除外）
    pub async fn load_criteria(&self, criteria: &mut [Criterion]) -> Result<()> {
        if criteria.is_empty() {
            return Err(MatcherError::Config("照合条件が1つもありません".into()));
        }

        for criterion in criteria.iter_mut() {
            let column_range =
                column_span(criterion.source_column_index, criterion.source_column_index);
            let column = self
                .source
                .fetch_column_values(
                    &criterion.source.resource_id,
                    &criterion.source.sheet_name,
                    &column_range,
                )
                .await
                .map_err(|e| match e {
                    MatcherError::SheetRead(_) | MatcherError::SessionExpired => e,
                    other => MatcherError::SheetRead(format!("{}: {}", criterion.name, other)),
                })?;
            criterion.set_values_from_column(&column);

            if criterion.values.is_empty() {
                warn!("条件 \"{}\" の値が空です", criterion.name);
            } else {
                info!("条件 \"{}\": {}件の値", criterion.name, criterion.values.len());
            }
        }
        Ok(())
    }

    /// 対象シートを読み込む（1行目はヘッダー）
    pub async fn load_target(&self, target: &SheetLocation) -> Result<TargetData> {
        let mut values = self
            .source
            .fetch_column_values(
                &target.resource_id,
                &target.sheet_name,
                &format!("A:{}", LAST_COLUMN),
            )
            .await?;

        if values.len() < 2 {
            return Err(MatcherError::Data(format!(
                "対象シート \"{}\" にデータ行がありません",
                target.sheet_name
            )));
        }

        let header = values.remove(0);
        let limit = self.config.processing.rows_limit.unwrap_or(usize::MAX);
        let rows = values
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, data)| TargetRow::new(data, i))
            .collect();

        Ok(TargetData { header, rows })
    }

    pub fn plan_run(&self, total_rows: usize, criteria_count: usize) -> BatchPlan {
        scheduler::plan_run(
            total_rows,
            criteria_count,
            self.config.processing.base_batch_size,
        )
    }

    /// 1バッチを絞り込む（一時的な失敗はバッチ単位で再試行）
    pub async fn run_batch(
        &self,
        rows: &[TargetRow],
        criteria: &[Criterion],
    ) -> Result<BatchOutcome> {
        let matcher = Matcher::new(self.oracle, &self.config.ai);
        RetryPolicy::batch()
            .run(
                |_| filter_batch(rows, criteria, &self.config.ai, &matcher, &self.cancel),
                |e| !e.is_fatal(),
            )
            .await
    }

    /// 実行全体
    pub async fn run(&mut self, job: MatchJob) -> Result<RunReport> {
        let started = Instant::now();
        self.state = RunState::default();
        self.set_phase(RunPhase::Running);

        let MatchJob {
            target,
            output,
            mut criteria,
        } = job;

        let prepared = self.prepare(&target, &mut criteria).await;
        let data = match prepared {
            Ok(data) => data,
            Err(e) => {
                self.set_phase(RunPhase::Failed);
                return Err(e);
            }
        };

        let plan = self.plan_run(data.rows.len(), criteria.len());
        self.state.total_rows = plan.total_rows;
        self.state.total_batches = plan.total_batches;
        self.observer.on_event(&RunEvent::Planned(plan));
        info!(
            "{}行 / 条件{}件 / バッチサイズ{} ({}バッチ)",
            plan.total_rows,
            criteria.len(),
            plan.batch_size,
            plan.total_batches
        );

        let mut exporter = ProgressiveExporter::new(
            self.sink,
            output,
            data.header,
            self.config.export.clone(),
        );
        let base_delay = Duration::from_millis(self.config.ai.batch_delay_ms);
        // 呼び出しレートは読み込み完了後から測る
        let batches_started = Instant::now();

        for index in 0..plan.total_batches {
            if self.cancel.is_cancelled() {
                break;
            }

            let rows = &data.rows[plan.batch_range(index)];
            self.state.current_batch = index + 1;
            self.set_phase(RunPhase::Filtering);
            self.observer.on_event(&RunEvent::BatchStarted {
                index,
                total: plan.total_batches,
            });

            let outcome = match self.run_batch(rows, &criteria).await {
                Ok(outcome) => outcome,
                Err(e) => return Err(self.fail(&mut exporter, e).await),
            };
            self.state.api_calls += outcome.oracle_calls;

            if outcome.cancelled {
                // 全条件を通していない行は出力しない
                info!("バッチ{}の途中で停止しました", index + 1);
                break;
            }

            self.state.processed_rows += rows.len();
            self.state.matched_rows += outcome.matched.len();
            info!(
                "バッチ {}/{}: {}行中{}行が一致",
                index + 1,
                plan.total_batches,
                rows.len(),
                outcome.matched.len()
            );
            exporter.push(outcome.matched.into_iter().map(|row| row.data));

            if exporter.should_flush() {
                if let Err(e) = self.flush(&mut exporter).await {
                    return Err(self.fail(&mut exporter, e).await);
                }
            }

            self.observer.on_event(&RunEvent::BatchFinished {
                index,
                state: self.state,
            });

            if !plan.is_last(index) && !self.cancel.is_cancelled() {
                let delay = next_delay(self.state.api_calls, batches_started.elapsed(), base_delay);
                tokio::time::sleep(delay).await;
            }
        }

        let cancelled = self.cancel.is_cancelled();
        if exporter.pending() > 0 || (exporter.is_first_flush() && !cancelled) {
            if let Err(e) = self.flush(&mut exporter).await {
                return Err(self.fail(&mut exporter, e).await);
            }
        }

        self.set_phase(if cancelled {
            RunPhase::Cancelled
        } else {
            RunPhase::Done
        });
        Ok(self.report(&exporter, started))
    }

    async fn prepare(
        &self,
        target: &SheetLocation,
        criteria: &mut [Criterion],
    ) -> Result<TargetData> {
        if self.config.ai.enabled {
            self.oracle.ensure_ready()?;
        }
        self.load_criteria(criteria).await?;
        self.load_target(target).await
    }

    /// 書き出し（致命的なエラーのみ `Err`）
    async fn flush(&mut self, exporter: &mut ProgressiveExporter<'_>) -> Result<()> {
        self.set_phase(RunPhase::Exporting);
        match exporter.flush().await? {
            FlushOutcome::Flushed(rows) => {
                self.state.exported_rows = exporter.exported_rows();
                self.observer.on_event(&RunEvent::Exported {
                    rows,
                    total: self.state.exported_rows,
                });
            }
            FlushOutcome::Failed => {
                self.observer.on_event(&RunEvent::ExportFailed {
                    pending: exporter.pending(),
                });
            }
            FlushOutcome::Empty => {}
        }
        Ok(())
    }

    /// 致命的エラー: バッファに残った行を1回だけ書き出してから失敗とする
    async fn fail(
        &mut self,
        exporter: &mut ProgressiveExporter<'_>,
        error: MatcherError,
    ) -> MatcherError {
        warn!("実行を中断します: {}", error);
        if exporter.pending() > 0 {
            if let Err(e) = self.flush(exporter).await {
                warn!("最終エクスポートに失敗: {}", e);
            }
        }
        self.set_phase(RunPhase::Failed);
        error
    }

    fn report(&self, exporter: &ProgressiveExporter<'_>, started: Instant) -> RunReport {
        RunReport {
            phase: self.state.phase,
            total_rows: self.state.total_rows,
            processed_rows: self.state.processed_rows,
            matched_rows: self.state.matched_rows,
            exported_rows: exporter.exported_rows(),
            unexported_rows: exporter.pending(),
            api_calls: self.state.api_calls,
            batches: self.state.current_batch,
            elapsed: started.elapsed(),
        }
    }
}
