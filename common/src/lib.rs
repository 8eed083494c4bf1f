//! Sheet Matcher Common Library
//!
//! 照合エンジンと各シートバックエンドで共有される型と純粋関数

pub mod a1;
pub mod error;
pub mod matching;
pub mod prompts;
pub mod schedule;
pub mod types;

pub use a1::SheetRange;
pub use error::{Error, Result};
pub use matching::{basic_match, exact_match, normalize};
pub use prompts::{build_user_message, truncate_criteria, DEFAULT_MATCH_PROMPT};
pub use schedule::{adaptive_delay_ms, plan_batch_size, BatchPlan};
pub use types::{
    AiConfig, Criterion, CriterionSource, ExportConfig, MatchDetail, MatchResult, MatchType,
    MatchedRow, ProcessingConfig, TargetRow,
};
