//! A1表記のセル範囲
//!
//! `Sheet1!A:ZZ`, `'My Sheet'!A1`, `Sheet1!B2:C10` のような範囲文字列を扱う

use crate::error::{Error, Result};

/// 出力先のクリア・読み込みに使う列範囲の終端
pub const LAST_COLUMN: &str = "ZZ";

/// 列指定として受け付ける最大の列番号（`ZZ`）
pub const MAX_COLUMN_INDEX: usize = 26 * 27 - 1;

/// 0始まりの列番号 → 列文字（0 → A, 26 → AA）
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// 列文字 → 0始まりの列番号
pub fn column_index(letters: &str) -> Result<usize> {
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::Range(format!("invalid column: {}", letters)));
    }
    let mut n: usize = 0;
    for c in letters.chars() {
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        n = n
            .checked_mul(26)
            .and_then(|v| v.checked_add(digit))
            .ok_or_else(|| Error::Range(format!("column out of range: {}", letters)))?;
    }
    Ok(n - 1)
}

/// 列番号が `A..=ZZ` に収まるか
pub fn check_column_index(index: usize) -> Result<usize> {
    if index > MAX_COLUMN_INDEX {
        return Err(Error::Range(format!(
            "column index out of range (max {}): {}",
            MAX_COLUMN_INDEX, index
        )));
    }
    Ok(index)
}

/// 列指定（"C" または "2"）→ 0始まりの列番号
pub fn parse_column_ref(value: &str) -> Result<usize> {
    let value = value.trim();
    let index = match value.parse::<usize>() {
        Ok(index) => index,
        Err(_) => column_index(value)?,
    };
    check_column_index(index)
}

/// シート名を必要に応じて引用符で囲む
pub fn quote_sheet_name(sheet: &str) -> String {
    if !sheet.is_empty() && sheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        sheet.to_string()
    } else {
        format!("'{}'", sheet.replace('\'', "''"))
    }
}

/// シート名を含まない列範囲（例: `C:C`）
pub fn column_span(first: usize, last: usize) -> String {
    format!("{}:{}", column_letter(first), column_letter(last))
}

/// 出力シート全体（`Sheet!A:ZZ`）
pub fn whole_sheet(sheet: &str) -> String {
    format!("{}!A:{}", quote_sheet_name(sheet), LAST_COLUMN)
}

/// 左上セル（`Sheet!A1`）
pub fn top_left(sheet: &str) -> String {
    format!("{}!A1", quote_sheet_name(sheet))
}

/// パース済みの範囲（行・列とも0始まり）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRange {
    pub sheet: String,
    pub start_col: usize,
    pub end_col: Option<usize>,
    pub start_row: usize,
    pub end_row: Option<usize>,
}

impl SheetRange {
    /// 範囲文字列をパース
    pub fn parse(range: &str) -> Result<Self> {
        let (sheet, cells) = split_sheet(range)?;
        if cells.is_empty() {
            return Ok(Self {
                sheet,
                start_col: 0,
                end_col: None,
                start_row: 0,
                end_row: None,
            });
        }

        let (start, end) = match cells.split_once(':') {
            Some((s, e)) => (s, Some(e)),
            None => (cells, None),
        };
        let (start_col, start_row) = parse_cell(start)?;
        let (end_col, end_row) = match end {
            Some(e) => {
                let (col, row) = parse_cell(e)?;
                (Some(col), row)
            }
            // 単一セルは列・行とも開放（そのセルから書き込む）
            None => (None, None),
        };

        Ok(Self {
            sheet,
            start_col,
            end_col,
            start_row: start_row.unwrap_or(0),
            end_row,
        })
    }

    pub fn contains_col(&self, col: usize) -> bool {
        col >= self.start_col && self.end_col.map_or(true, |end| col <= end)
    }

    pub fn contains_row(&self, row: usize) -> bool {
        row >= self.start_row && self.end_row.map_or(true, |end| row <= end)
    }
}

fn split_sheet(range: &str) -> Result<(String, &str)> {
    let range = range.trim();
    if let Some(rest) = range.strip_prefix('\'') {
        // 'My ''quoted'' Sheet'!A1
        let mut sheet = String::new();
        let mut chars = rest.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if c == '\'' {
                if matches!(chars.peek(), Some((_, '\''))) {
                    sheet.push('\'');
                    chars.next();
                    continue;
                }
                let tail = &rest[i + 1..];
                let cells = tail.strip_prefix('!').unwrap_or(tail);
                return Ok((sheet, cells));
            }
            sheet.push(c);
        }
        return Err(Error::Range(format!("unterminated sheet name: {}", range)));
    }

    match range.rsplit_once('!') {
        Some((sheet, cells)) => Ok((sheet.to_string(), cells)),
        None => Ok((range.to_string(), "")),
    }
}

fn parse_cell(cell: &str) -> Result<(usize, Option<usize>)> {
    let split = cell
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(cell.len());
    let (letters, digits) = cell.split_at(split);
    let col = column_index(letters)?;
    let row = if digits.is_empty() {
        None
    } else {
        let n: usize = digits
            .parse()
            .map_err(|_| Error::Range(format!("invalid row: {}", cell)))?;
        if n == 0 {
            return Err(Error::Range(format!("rows start at 1: {}", cell)));
        }
        Some(n - 1)
    };
    Ok((col, row))
}
