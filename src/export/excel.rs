//! Excel書き出し
//!
//! ワークブック全体をシート単位の文字列表から生成する

use crate::error::{MatcherError, Result};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::path::Path;

/// シート名と行データの組
pub type SheetTable = (String, Vec<Vec<String>>);

fn excel_error(e: XlsxError) -> MatcherError {
    MatcherError::Excel(e.to_string())
}

/// ワークブックをファイルに書き出す（既存ファイルは上書き）
///
/// 先頭シートの1行目は太字にする
pub fn write_workbook(path: &Path, sheets: &[SheetTable]) -> Result<()> {
    let buffer = workbook_buffer(sheets)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, buffer)?;
    Ok(())
}

/// ワークブックをバッファに生成
pub fn workbook_buffer(sheets: &[SheetTable]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    for (index, (name, rows)) in sheets.iter().enumerate() {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(name).map_err(excel_error)?;

        for (row_idx, row) in rows.iter().enumerate() {
            let row_num = u32::try_from(row_idx)
                .map_err(|_| MatcherError::Excel(format!("行数が多すぎます: {}", row_idx)))?;
            for (col_idx, value) in row.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                let col_num = u16::try_from(col_idx)
                    .map_err(|_| MatcherError::Excel(format!("列数が多すぎます: {}", col_idx)))?;
                if index == 0 && row_idx == 0 {
                    worksheet
                        .write_string_with_format(row_num, col_num, value, &header_format)
                        .map_err(excel_error)?;
                } else {
                    worksheet
                        .write_string(row_num, col_num, value)
                        .map_err(excel_error)?;
                }
            }
        }
    }

    // シートが1枚も無いと不正なファイルになる
    if sheets.is_empty() {
        workbook.add_worksheet();
    }

    workbook.save_to_buffer().map_err(excel_error)
}
