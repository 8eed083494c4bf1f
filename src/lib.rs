//! Sheet Matcher
//!
//! 対象シートの行を複数の条件リストに照らして絞り込み、
//! 一致した行を出力シートへ段階的に書き出す。

pub mod cancel;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod job;
pub mod matcher;
pub mod oracle;
pub mod progress;
pub mod retry;
pub mod run;
pub mod scheduler;
pub mod sheets;

pub use cancel::CancelFlag;
pub use config::{Config, RunConfig};
pub use error::{MatcherError, Result};
pub use run::{MatchJob, MatchRun, RunEvent, RunPhase, RunReport, RunState};
