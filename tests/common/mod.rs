//! 結合テスト用のフェイク

#![allow(dead_code)]

pub mod http;

use async_trait::async_trait;
use sheet_matcher::error::{MatcherError, Result};
use sheet_matcher::oracle::Oracle;
use sheet_matcher::sheets::{RowSource, SheetSink};
use sheet_matcher::CancelFlag;
use sheet_matcher_common::{AiConfig, MatchResult, MatchType, SheetRange};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// 書き出し先への呼び出し記録
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    Clear(String),
    Write(String, usize),
    Append(String, usize),
}

/// メモリ上のワークブック群
#[derive(Default)]
pub struct MemorySheets {
    sheets: Mutex<HashMap<(String, String), Vec<Vec<String>>>>,
    calls: Mutex<Vec<SinkCall>>,
    fetches: AtomicUsize,
    /// 先頭から順に書き出し系の呼び出しへ返すエラー
    sink_failures: Mutex<VecDeque<MatcherError>>,
    fetch_delay: Option<Duration>,
}

impl MemorySheets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(self, resource: &str, sheet: &str, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect();
        self.sheets
            .lock()
            .unwrap()
            .insert((resource.to_string(), sheet.to_string()), rows);
        self
    }

    /// 読み込みのたびに待機する
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    pub fn fail_next_sink_call(&self, error: MatcherError) {
        self.sink_failures.lock().unwrap().push_back(error);
    }

    pub fn sheet(&self, resource: &str, sheet: &str) -> Vec<Vec<String>> {
        self.sheets
            .lock()
            .unwrap()
            .get(&(resource.to_string(), sheet.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn record(&self, call: SinkCall) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        match self.sink_failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RowSource for MemorySheets {
    async fn fetch_column_values(
        &self,
        resource_id: &str,
        sheet_name: &str,
        column_range: &str,
    ) -> Result<Vec<Vec<String>>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        let range = SheetRange::parse(&format!("X!{}", column_range))?;
        let sheets = self.sheets.lock().unwrap();
        let rows = sheets
            .get(&(resource_id.to_string(), sheet_name.to_string()))
            .ok_or_else(|| MatcherError::SheetRead(format!("{}/{}", resource_id, sheet_name)))?;
        Ok(rows
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter(|(c, _)| range.contains_col(*c))
                    .map(|(_, v)| v.clone())
                    .collect()
            })
            .collect())
    }
}

#[async_trait]
impl SheetSink for MemorySheets {
    async fn clear_range(&self, resource_id: &str, sheet_range: &str) -> Result<()> {
        self.record(SinkCall::Clear(sheet_range.to_string()))?;
        let range = SheetRange::parse(sheet_range)?;
        self.sheets
            .lock()
            .unwrap()
            .insert((resource_id.to_string(), range.sheet), Vec::new());
        Ok(())
    }

    async fn write_range(
        &self,
        resource_id: &str,
        range_start: &str,
        values: &[Vec<String>],
    ) -> Result<()> {
        self.record(SinkCall::Write(range_start.to_string(), values.len()))?;
        let range = SheetRange::parse(range_start)?;
        let mut sheets = self.sheets.lock().unwrap();
        let rows = sheets.entry((resource_id.to_string(), range.sheet)).or_default();
        rows.truncate(range.start_row);
        rows.extend(values.iter().cloned());
        Ok(())
    }

    async fn append_rows(
        &self,
        resource_id: &str,
        sheet_name: &str,
        values: &[Vec<String>],
    ) -> Result<()> {
        self.record(SinkCall::Append(sheet_name.to_string(), values.len()))?;
        self.sheets
            .lock()
            .unwrap()
            .entry((resource_id.to_string(), sheet_name.to_string()))
            .or_default()
            .extend(values.iter().cloned());
        Ok(())
    }
}

/// 値ごとに信頼度を決めておくオラクル
#[derive(Default)]
pub struct ScriptedOracle {
    confidence: HashMap<String, u8>,
    calls: AtomicUsize,
    failures: Mutex<VecDeque<MatcherError>>,
    cancel_on_call: Option<(usize, CancelFlag)>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, target: &str, confidence: u8) -> Self {
        self.confidence.insert(target.to_string(), confidence);
        self
    }

    /// n回目（1始まり）の呼び出しで停止フラグを立てる
    pub fn cancel_on_call(mut self, call: usize, flag: CancelFlag) -> Self {
        self.cancel_on_call = Some((call, flag));
        self
    }

    pub fn fail_next(&self, error: MatcherError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn classify(
        &self,
        target: &str,
        _criteria: &[String],
        _config: &AiConfig,
    ) -> Result<MatchResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((at, flag)) = &self.cancel_on_call {
            if *at == call {
                flag.cancel();
            }
        }
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        let confidence = self.confidence.get(target).copied().unwrap_or(0);
        Ok(MatchResult {
            is_match: confidence > 0,
            confidence,
            match_type: MatchType::Ai,
            details: format!("scripted {}", confidence),
        })
    }
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
