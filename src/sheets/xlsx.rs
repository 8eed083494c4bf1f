//! ローカルxlsxバックエンド
//!
//! calamineで読み込んだワークブックをメモリ上に保持し、
//! 書き込み系の操作のたびにワークブック全体を保存し直す。

use super::{RowSource, SheetSink};
use crate::error::{MatcherError, Result};
use crate::export::excel::{write_workbook, SheetTable};
use async_trait::async_trait;
use calamine::{open_workbook_auto, Data, Reader};
use log::debug;
use sheet_matcher_common::a1::quote_sheet_name;
use sheet_matcher_common::SheetRange;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

type Book = Vec<SheetTable>;

#[derive(Default)]
pub struct XlsxBackend {
    books: Mutex<HashMap<PathBuf, Book>>,
}

impl XlsxBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_book<T>(
        &self,
        resource_id: &str,
        create: bool,
        f: impl FnOnce(&mut Book) -> Result<T>,
    ) -> Result<T> {
        let path = PathBuf::from(resource_id);
        let mut books = self
            .books
            .lock()
            .map_err(|_| MatcherError::Excel("ワークブックのロックが壊れています".into()))?;

        if !books.contains_key(&path) {
            let book = if path.exists() {
                load_book(&path)?
            } else if create {
                Vec::new()
            } else {
                return Err(MatcherError::SheetRead(format!(
                    "ファイルが見つかりません: {}",
                    path.display()
                )));
            };
            books.insert(path.clone(), book);
        }

        let book = books
            .get_mut(&path)
            .ok_or_else(|| MatcherError::SheetRead(path.display().to_string()))?;
        f(book)
    }

    fn modify(&self, resource_id: &str, f: impl FnOnce(&mut Book) -> Result<()>) -> Result<()> {
        // 保存に成功した場合のみキャッシュを差し替える
        self.with_book(resource_id, true, |book| {
            let mut updated = book.clone();
            f(&mut updated)?;
            write_workbook(Path::new(resource_id), &updated)
                .map_err(|e| MatcherError::Export(e.to_string()))?;
            *book = updated;
            Ok(())
        })
    }
}

/// ファイルから全シートを読み込む（セル位置はA1基準に揃える）
fn load_book(path: &Path) -> Result<Book> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| MatcherError::SheetRead(format!("{}: {}", path.display(), e)))?;

    let mut book = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| MatcherError::SheetRead(format!("{}: {}", name, e)))?;
        let (row_offset, col_offset) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));

        let mut rows: Vec<Vec<String>> = vec![Vec::new(); row_offset];
        for source in range.rows() {
            let mut row = vec![String::new(); col_offset];
            row.extend(source.iter().map(cell_text));
            rows.push(row);
        }
        trim_grid(&mut rows);
        debug!("シート読み込み: {} ({}行)", name, rows.len());
        book.push((name, rows));
    }
    Ok(book)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 末尾の空セル・空行を取り除く
fn trim_grid(rows: &mut Vec<Vec<String>>) {
    for row in rows.iter_mut() {
        while row.last().is_some_and(|c| c.is_empty()) {
            row.pop();
        }
    }
    while rows.last().is_some_and(|r| r.is_empty()) {
        rows.pop();
    }
}

fn parse_range(sheet_name: &str, cells: &str) -> Result<SheetRange> {
    Ok(SheetRange::parse(&format!(
        "{}!{}",
        quote_sheet_name(sheet_name),
        cells
    ))?)
}

fn sheet_mut<'b>(book: &'b mut Book, name: &str) -> &'b mut Vec<Vec<String>> {
    let index = match book.iter().position(|(n, _)| n == name) {
        Some(index) => index,
        None => {
            book.push((name.to_string(), Vec::new()));
            book.len() - 1
        }
    };
    &mut book[index].1
}

#[async_trait]
impl RowSource for XlsxBackend {
    async fn fetch_column_values(
        &self,
        resource_id: &str,
        sheet_name: &str,
        column_range: &str,
    ) -> Result<Vec<Vec<String>>> {
        let range = parse_range(sheet_name, column_range)?;
        self.with_book(resource_id, false, |book| {
            let (_, rows) = book
                .iter()
                .find(|(n, _)| n == &range.sheet)
                .ok_or_else(|| {
                    MatcherError::SheetRead(format!("シートが見つかりません: {}", range.sheet))
                })?;

            let mut values: Vec<Vec<String>> = rows
                .iter()
                .enumerate()
                .filter(|(i, _)| range.contains_row(*i))
                .map(|(_, row)| {
                    row.iter()
                        .enumerate()
                        .filter(|(c, _)| range.contains_col(*c))
                        .map(|(_, v)| v.clone())
                        .collect()
                })
                .collect();
            trim_grid(&mut values);
            Ok(values)
        })
    }
}

#[async_trait]
impl SheetSink for XlsxBackend {
    async fn clear_range(&self, resource_id: &str, sheet_range: &str) -> Result<()> {
        let range = SheetRange::parse(sheet_range)?;
        self.modify(resource_id, |book| {
            let rows = sheet_mut(book, &range.sheet);
            for (r, row) in rows.iter_mut().enumerate() {
                if !range.contains_row(r) {
                    continue;
                }
                for (c, cell) in row.iter_mut().enumerate() {
                    if range.contains_col(c) {
                        cell.clear();
                    }
                }
            }
            trim_grid(rows);
            Ok(())
        })
    }

    async fn write_range(
        &self,
        resource_id: &str,
        range_start: &str,
        values: &[Vec<String>],
    ) -> Result<()> {
        let range = SheetRange::parse(range_start)?;
        self.modify(resource_id, |book| {
            let rows = sheet_mut(book, &range.sheet);
            for (i, values_row) in values.iter().enumerate() {
                let r = range.start_row + i;
                if rows.len() <= r {
                    rows.resize(r + 1, Vec::new());
                }
                let row = &mut rows[r];
                let end = range.start_col + values_row.len();
                if row.len() < end {
                    row.resize(end, String::new());
                }
                row[range.start_col..end].clone_from_slice(values_row);
            }
            trim_grid(rows);
            Ok(())
        })
    }

    async fn append_rows(
        &self,
        resource_id: &str,
        sheet_name: &str,
        values: &[Vec<String>],
    ) -> Result<()> {
        self.modify(resource_id, |book| {
            let rows = sheet_mut(book, sheet_name);
            trim_grid(rows);
            rows.extend(values.iter().cloned());
            Ok(())
        })
    }
}
