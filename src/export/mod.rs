//! 段階的エクスポート
//!
//! 照合済みの行をバッファし、一定件数ごとに書き出し先へ送る。
//! 最初の書き出しでシートを消去してヘッダーごと書き込み、以降は末尾へ追加する。

pub mod excel;

use crate::error::{MatcherError, Result};
use crate::sheets::{SheetLocation, SheetSink};
use log::{info, warn};
use sheet_matcher_common::a1::{top_left, whole_sheet};
use sheet_matcher_common::ExportConfig;
use std::time::Duration;
use tokio::time::Instant;

/// バッファを1回書き出す
///
/// 失敗してもバッファはそのまま（呼び出し側が次の機会に再送する）
pub async fn flush(
    buffer: &[Vec<String>],
    sink: &dyn SheetSink,
    destination: &SheetLocation,
    header: &[String],
    is_first_flush: bool,
) -> Result<()> {
    if is_first_flush {
        sink.clear_range(&destination.resource_id, &whole_sheet(&destination.sheet_name))
            .await?;

        let mut values = Vec::with_capacity(buffer.len() + 1);
        values.push(header.to_vec());
        values.extend(buffer.iter().cloned());
        sink.write_range(
            &destination.resource_id,
            &top_left(&destination.sheet_name),
            &values,
        )
        .await
    } else {
        sink.append_rows(&destination.resource_id, &destination.sheet_name, buffer)
            .await
    }
}

/// 書き出しの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// 書き出したデータ行数
    Flushed(usize),
    /// 送るものが無かった
    Empty,
    /// 失敗（バッファ保持）
    Failed,
}

pub struct ProgressiveExporter<'a> {
    sink: &'a dyn SheetSink,
    destination: SheetLocation,
    header: Vec<String>,
    config: ExportConfig,
    buffer: Vec<Vec<String>>,
    first_flush: bool,
    exported_rows: usize,
    last_flush: Option<Instant>,
}

impl<'a> ProgressiveExporter<'a> {
    pub fn new(
        sink: &'a dyn SheetSink,
        destination: SheetLocation,
        header: Vec<String>,
        config: ExportConfig,
    ) -> Self {
        Self {
            sink,
            destination,
            header,
            config,
            buffer: Vec::new(),
            first_flush: true,
            exported_rows: 0,
            last_flush: None,
        }
    }

    pub fn push(&mut self, rows: impl IntoIterator<Item = Vec<String>>) {
        self.buffer.extend(rows);
    }

    /// 段階的書き出しが有効で、バッファがチャンクサイズに達している
    pub fn should_flush(&self) -> bool {
        self.config.enabled && self.buffer.len() >= self.config.chunk_size
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn exported_rows(&self) -> usize {
        self.exported_rows
    }

    /// まだ1度も書き出していない
    pub fn is_first_flush(&self) -> bool {
        self.first_flush
    }

    /// バッファを書き出す
    ///
    /// 致命的なエラー（セッション切れ）のみ `Err`。
    /// それ以外の失敗は警告を出して `FlushOutcome::Failed` を返す。
    pub async fn flush(&mut self) -> Result<FlushOutcome> {
        // 一度もデータが無い場合でもヘッダーだけは書き出す（最終回のみ呼ばれる）
        if self.buffer.is_empty() && !self.first_flush {
            return Ok(FlushOutcome::Empty);
        }

        self.wait_for_spacing().await;

        match flush(
            &self.buffer,
            self.sink,
            &self.destination,
            &self.header,
            self.first_flush,
        )
        .await
        {
            Ok(()) => {
                let count = self.buffer.len();
                self.buffer.clear();
                self.first_flush = false;
                self.exported_rows += count;
                self.last_flush = Some(Instant::now());
                info!(
                    "{}行をエクスポート (累計{}行) → {}",
                    count, self.exported_rows, self.destination.sheet_name
                );
                Ok(FlushOutcome::Flushed(count))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                let e = match e {
                    MatcherError::Export(_) => e,
                    other => MatcherError::Export(other.to_string()),
                };
                warn!("エクスポート失敗 ({}行はバッファに保持): {}", self.buffer.len(), e);
                Ok(FlushOutcome::Failed)
            }
        }
    }

    /// 前回の書き出し成功から `batch_delay_ms` 経つまで待つ
    async fn wait_for_spacing(&self) {
        if let Some(last) = self.last_flush {
            let spacing = Duration::from_millis(self.config.batch_delay_ms);
            tokio::time::sleep_until(last + spacing).await;
        }
    }
}
