//! コンソール進捗表示（indicatif）

use crate::run::{ProgressObserver, RunEvent, RunPhase};
use indicatif::{ProgressBar, ProgressStyle};

pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}行 {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
        );
        Self { bar }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ConsoleProgress {
    fn on_event(&self, event: &RunEvent) {
        match event {
            RunEvent::Planned(plan) => {
                self.bar.set_length(plan.total_rows as u64);
                self.bar.set_message(format!("{}バッチ", plan.total_batches));
            }
            RunEvent::BatchStarted { index, total } => {
                self.bar.set_message(format!("バッチ {}/{} 照合中", index + 1, total));
            }
            RunEvent::BatchFinished { state, .. } => {
                self.bar.set_position(state.processed_rows as u64);
                self.bar.set_message(format!(
                    "一致 {}行 / API {}回",
                    state.matched_rows, state.api_calls
                ));
            }
            RunEvent::Exported { total, .. } => {
                self.bar.println(format!("✔ {}行をエクスポート済み", total));
            }
            RunEvent::ExportFailed { pending } => {
                self.bar
                    .println(format!("⚠ エクスポート失敗（{}行を保持して再試行します）", pending));
            }
            RunEvent::Phase(RunPhase::Done) => self.bar.finish_with_message("完了"),
            RunEvent::Phase(RunPhase::Cancelled) => self.bar.abandon_with_message("停止"),
            RunEvent::Phase(RunPhase::Failed) => self.bar.abandon_with_message("失敗"),
            RunEvent::Phase(_) => {}
        }
    }
}
