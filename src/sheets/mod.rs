//! シートバックエンド
//!
//! 行の読み込み元と書き出し先の境界。ローカルのxlsxとGoogle Sheetsを実装する。

pub mod google;
pub mod xlsx;

pub use google::{GoogleSheetsClient, RefreshTokenProvider, StaticToken, TokenProvider};
pub use xlsx::XlsxBackend;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// ワークブック（スプレッドシート）内のシート
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetLocation {
    /// xlsxならファイルパス、Google Sheetsならスプレッドシート ID
    pub resource_id: String,
    pub sheet_name: String,
}

impl SheetLocation {
    pub fn new(resource_id: impl Into<String>, sheet_name: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            sheet_name: sheet_name.into(),
        }
    }
}

/// 行の読み込み元
#[async_trait]
pub trait RowSource: Send + Sync {
    /// 指定列範囲（例: `A:ZZ`、`C:C`）の値を行ごとに取得
    ///
    /// ヘッダー行を含めて返す。末尾の空セル・空行は含まれないことがある。
    async fn fetch_column_values(
        &self,
        resource_id: &str,
        sheet_name: &str,
        column_range: &str,
    ) -> Result<Vec<Vec<String>>>;
}

/// 行の書き出し先
#[async_trait]
pub trait SheetSink: Send + Sync {
    /// 範囲（例: `Out!A:ZZ`）の値を消去
    async fn clear_range(&self, resource_id: &str, sheet_range: &str) -> Result<()>;

    /// 範囲の左上（例: `Out!A1`）から値を書き込む
    async fn write_range(
        &self,
        resource_id: &str,
        range_start: &str,
        values: &[Vec<String>],
    ) -> Result<()>;

    /// シートの既存データの末尾に行を追加
    async fn append_rows(
        &self,
        resource_id: &str,
        sheet_name: &str,
        values: &[Vec<String>],
    ) -> Result<()>;
}
