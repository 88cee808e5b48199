//! Tabular reader for CSV and Excel reports
//!
//! Produces a [`TableReader`]: the header row as read plus a lazy iterator over
//! data rows as loosely typed cells. Column order is preserved; nothing is
//! selected or renamed here.

use crate::encoding::{detect_encoding, DetectedEncoding};
use calamine::{open_workbook_auto_from_rs, Data, DataType, Range, Reader};
use encoding_rs::{Encoding, UTF_8};
use mrr_common::{Error, Result};
use std::borrow::Cow;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

/// Fallback encodings, in order, after a confident detection
pub const CSV_ENCODING_CANDIDATES: &[&str] =
    &["utf-8", "cp1251", "windows-1251", "latin1", "iso-8859-1"];

/// Spreadsheet dates without a time of day
const DATE_FORMAT: &str = "%d.%m.%Y";
const DATETIME_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xlsx,
    Xls,
}

impl FileFormat {
    /// Format from the file name extension (case-insensitive)
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_extension(ext)
            .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(FileFormat::Csv),
            "xlsx" => Some(FileFormat::Xlsx),
            "xls" => Some(FileFormat::Xls),
            _ => None,
        }
    }
}

/// One cell of an input row
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => CellValue::Empty,
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::String(s) => CellValue::text(s.as_str()),
            other => CellValue::text(cell_text(other)),
        }
    }
}

/// Display text of a spreadsheet cell; date cells render as `dd.mm.YYYY`
fn cell_text(data: &Data) -> String {
    let is_duration = matches!(data, Data::DateTime(dt) if dt.is_duration());
    match data {
        Data::DateTime(_) | Data::DateTimeIso(_) if !is_duration => match data.as_datetime() {
            Some(dt) if dt.time() == chrono::NaiveTime::MIN => dt.format(DATE_FORMAT).to_string(),
            Some(dt) => dt.format(DATETIME_FORMAT).to_string(),
            None => data.to_string(),
        },
        other => other.to_string(),
    }
}

/// A fully materialized sheet: header names and rows in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// Headers of an upload plus its data rows, read on demand
pub struct TableReader<'a> {
    pub headers: Vec<String>,
    /// Encoding used for CSV input; `None` for spreadsheets
    pub encoding: Option<&'static str>,
    rows: RowSource<'a>,
}

impl TableReader<'_> {
    /// Next non-blank data row
    pub fn next_row(&mut self) -> Option<Result<Vec<CellValue>>> {
        loop {
            let row = match &mut self.rows {
                RowSource::Csv(records) => records
                    .next()?
                    .map(|record| record.iter().map(CellValue::text).collect::<Vec<_>>())
                    .map_err(|e| Error::UnreadableFile(e.to_string())),
                RowSource::Sheet(sheet) => Ok(sheet.next()?),
            };
            match row {
                Ok(row) if row.iter().all(CellValue::is_empty) => continue,
                other => return Some(other),
            }
        }
    }

    /// Read the remaining rows into a [`Table`]
    pub fn into_table(mut self) -> Result<Table> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row() {
            rows.push(row?);
        }
        Ok(Table {
            headers: self.headers,
            rows,
        })
    }
}

enum RowSource<'a> {
    Csv(csv::StringRecordsIntoIter<Cursor<Cow<'a, [u8]>>>),
    Sheet(SheetRows),
}

/// Rows of an owned calamine range, starting below the header
struct SheetRows {
    range: Range<Data>,
    next: usize,
}

impl Iterator for SheetRows {
    type Item = Vec<CellValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.range.height() {
            return None;
        }
        let row = self.next;
        self.next += 1;
        Some(
            (0..self.range.width())
                .map(|col| {
                    self.range
                        .get((row, col))
                        .map(CellValue::from)
                        .unwrap_or(CellValue::Empty)
                })
                .collect(),
        )
    }
}

/// Open an upload whose format is taken from `file_name`
pub fn read_table<'a>(file_name: &Path, bytes: &'a [u8]) -> Result<TableReader<'a>> {
    match FileFormat::from_path(file_name)? {
        FileFormat::Csv => read_csv(bytes),
        FileFormat::Xlsx | FileFormat::Xls => read_spreadsheet(bytes),
    }
}

/// Decode CSV bytes and open them for row-by-row parsing
///
/// The first encoding in [`candidate_encodings`] order that decodes the whole
/// buffer without errors wins. Rows are parsed leniently, so short or long rows
/// never disqualify an encoding. Only when nothing decodes strictly are the
/// bytes read as lossy UTF-8.
pub fn read_csv(bytes: &[u8]) -> Result<TableReader<'_>> {
    let detected = detect_encoding(bytes);
    debug!(
        "Detected CSV encoding {} (confident: {})",
        detected.label(),
        detected.confident
    );

    let decoded = candidate_encodings(&detected)
        .into_iter()
        .find_map(|encoding| match decode_strict(encoding, bytes) {
            Some(text) => Some((encoding, text)),
            None => {
                debug!("CSV does not decode as {}", encoding.name());
                None
            }
        });

    let (encoding, text) = match decoded {
        Some(found) => found,
        None => {
            warn!("No CSV encoding decoded cleanly, falling back to lossy UTF-8");
            (UTF_8, String::from_utf8_lossy(strip_bom(UTF_8, bytes)))
        }
    };
    open_csv_text(text, encoding)
}

/// Open the first sheet of an XLSX/XLS workbook; first row is the header
pub fn read_spreadsheet(bytes: &[u8]) -> Result<TableReader<'static>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| Error::UnreadableFile(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::UnreadableFile("workbook has no sheets".to_string()))?
        .map_err(|e| Error::UnreadableFile(e.to_string()))?;

    let headers = range
        .rows()
        .next()
        .map(|row| row.iter().map(|cell| cell_text(cell).trim().to_string()).collect())
        .unwrap_or_default();

    Ok(TableReader {
        headers,
        encoding: None,
        rows: RowSource::Sheet(SheetRows { range, next: 1 }),
    })
}

/// Detected encoding first when confident, otherwise after the fixed candidates
fn candidate_encodings(detected: &DetectedEncoding) -> Vec<&'static Encoding> {
    let mut candidates = Vec::new();
    if detected.confident {
        candidates.push(detected.encoding);
    }
    for label in CSV_ENCODING_CANDIDATES {
        if let Some(encoding) = Encoding::for_label(label.as_bytes()) {
            if !candidates.contains(&encoding) {
                candidates.push(encoding);
            }
        }
    }
    if !candidates.contains(&detected.encoding) {
        candidates.push(detected.encoding);
    }
    candidates
}

fn strip_bom<'a>(encoding: &'static Encoding, bytes: &'a [u8]) -> &'a [u8] {
    match Encoding::for_bom(bytes) {
        Some((bom_encoding, len)) if bom_encoding == encoding => &bytes[len..],
        _ => bytes,
    }
}

fn decode_strict<'a>(encoding: &'static Encoding, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
    encoding.decode_without_bom_handling_and_without_replacement(strip_bom(encoding, bytes))
}

/// Guess the field delimiter from the header line
fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    let commas = header.matches(',').count();
    let semicolons = header.matches(';').count();
    let tabs = header.matches('\t').count();

    if semicolons > commas && semicolons >= tabs {
        b';'
    } else if tabs > commas && tabs > semicolons {
        b'\t'
    } else {
        b','
    }
}

fn open_csv_text<'a>(text: Cow<'a, str>, encoding: &'static Encoding) -> Result<TableReader<'a>> {
    let delimiter = sniff_delimiter(&text);
    let bytes: Cow<'a, [u8]> = match text {
        Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
        Cow::Owned(s) => Cow::Owned(s.into_bytes()),
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(Cursor::new(bytes));

    let headers = reader
        .headers()
        .map_err(|e| Error::UnreadableFile(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    Ok(TableReader {
        headers,
        encoding: Some(encoding.name()),
        rows: RowSource::Csv(reader.into_records()),
    })
}
