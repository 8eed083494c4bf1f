//! ジョブファイル
//!
//! 1回の実行内容（対象・出力・条件）をJSONで記述する。
//!
//! ```json
//! {
//!   "backend": "xlsx",
//!   "target": { "resource": "companies.xlsx", "sheet": "Data" },
//!   "output": { "resource": "out.xlsx", "sheet": "Results" },
//!   "criteria": [
//!     { "name": "Tech", "source": { "resource": "lists.xlsx", "sheet": "Tech", "column": "A" },
//!       "targetColumn": "B" }
//!   ]
//! }
//! ```

use crate::error::{MatcherError, Result};
use crate::run::MatchJob;
use crate::sheets::SheetLocation;
use serde::{Deserialize, Serialize};
use sheet_matcher_common::a1::{check_column_index, parse_column_ref};
use sheet_matcher_common::{Criterion, CriterionSource};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Xlsx,
    Google,
}

/// 列指定（0始まりの番号、またはA1形式の列名）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(usize),
    Letter(String),
}

impl ColumnRef {
    pub fn index(&self) -> Result<usize> {
        match self {
            ColumnRef::Index(index) => Ok(check_column_index(*index)?),
            ColumnRef::Letter(letter) => Ok(parse_column_ref(letter)?),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRef {
    pub resource: String,
    pub sheet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRef {
    /// 省略時は対象と同じワークブック
    #[serde(default)]
    pub resource: Option<String>,
    /// 省略時は日時から生成
    #[serde(default)]
    pub sheet: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSourceRef {
    pub resource: String,
    pub sheet: String,
    pub column: ColumnRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionSpec {
    pub name: String,
    pub source: ColumnSourceRef,
    pub target_column: ColumnRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFile {
    #[serde(default)]
    pub backend: Backend,
    pub target: SheetRef,
    #[serde(default)]
    pub output: Option<OutputRef>,
    pub criteria: Vec<CriterionSpec>,
}

impl JobFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MatcherError::Config(format!("ジョブファイルを読めません {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// 実行内容に変換する
    ///
    /// xlsxの相対パスはジョブファイルのディレクトリを基準に解決する
    pub fn into_job(self, base_dir: &Path) -> Result<MatchJob> {
        let backend = self.backend;
        let resolve = |resource: &str| -> String {
            let path = Path::new(resource);
            if backend == Backend::Xlsx && path.is_relative() {
                base_dir.join(path).to_string_lossy().to_string()
            } else {
                resource.to_string()
            }
        };

        let target = SheetLocation::new(resolve(&self.target.resource), self.target.sheet.clone());

        let output = self.output.unwrap_or(OutputRef {
            resource: None,
            sheet: None,
        });
        let output = SheetLocation::new(
            output
                .resource
                .as_deref()
                .map(resolve)
                .unwrap_or_else(|| target.resource_id.clone()),
            output.sheet.unwrap_or_else(default_output_sheet),
        );

        let criteria = self
            .criteria
            .iter()
            .enumerate()
            .map(|(i, spec)| -> Result<Criterion> {
                Ok(Criterion {
                    id: i as u32 + 1,
                    name: spec.name.clone(),
                    source: CriterionSource {
                        resource_id: resolve(&spec.source.resource),
                        sheet_name: spec.source.sheet.clone(),
                    },
                    source_column_index: spec.source.column.index()?,
                    target_column_index: spec.target_column.index()?,
                    values: Vec::new(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(MatchJob {
            target,
            output,
            criteria,
        })
    }
}

/// 既定の出力シート名（例: `Results_20241019_153000`）
pub fn default_output_sheet() -> String {
    format!("Results_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"))
}
