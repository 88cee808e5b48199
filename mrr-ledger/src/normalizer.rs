//! Column normalization
//!
//! Maps platform-specific (often Russian) header names onto the canonical
//! usage-record fields by case-insensitive substring matching, then coerces
//! each row into a [`NewUsageRecord`].
//!
//! For every input column the synonym table is scanned in declaration order
//! and the first hit decides. A header that contains several synonyms (say
//! "Streams Income") therefore maps to whichever synonym is listed first.
//! Columns that match nothing are dropped.

use crate::reader::{CellValue, Table};
use mrr_common::config::SynonymEntry;
use mrr_common::db::NewUsageRecord;
use mrr_common::{Error, Result};
use std::fmt;
use tracing::{debug, warn};

/// Revenue per play used when a report has no revenue column
pub const SYNTHETIC_REVENUE_PER_PLAY: f64 = 0.01;

/// Canonical usage-record columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    UsagePeriod,
    Platform,
    Territory,
    ContentType,
    UsageType,
    Artist,
    TrackName,
    Plays,
    Revenue,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 9] = [
        CanonicalField::UsagePeriod,
        CanonicalField::Platform,
        CanonicalField::Territory,
        CanonicalField::ContentType,
        CanonicalField::UsageType,
        CanonicalField::Artist,
        CanonicalField::TrackName,
        CanonicalField::Plays,
        CanonicalField::Revenue,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CanonicalField::UsagePeriod => "usage_period",
            CanonicalField::Platform => "platform",
            CanonicalField::Territory => "territory",
            CanonicalField::ContentType => "content_type",
            CanonicalField::UsageType => "usage_type",
            CanonicalField::Artist => "artist",
            CanonicalField::TrackName => "track_name",
            CanonicalField::Plays => "plays",
            CanonicalField::Revenue => "revenue",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Built-in synonyms, in match priority order
pub const BUILTIN_SYNONYMS: &[(&str, CanonicalField)] = &[
    ("Период использования контента", CanonicalField::UsagePeriod),
    ("Площадка", CanonicalField::Platform),
    ("Территория", CanonicalField::Territory),
    ("Тип контента", CanonicalField::ContentType),
    ("Вид использования контента", CanonicalField::UsageType),
    ("Исполнитель", CanonicalField::Artist),
    ("Название трека", CanonicalField::TrackName),
    ("Количество прослушиваний", CanonicalField::Plays),
    ("Доход", CanonicalField::Revenue),
    ("Revenue", CanonicalField::Revenue),
    ("Income", CanonicalField::Revenue),
    ("Стримы", CanonicalField::Plays),
    ("Прослушивания", CanonicalField::Plays),
    ("Streams", CanonicalField::Plays),
    ("Кол-во прослушиваний", CanonicalField::Plays),
];

/// Ordered synonym list; matching is case-insensitive substring
#[derive(Debug, Clone)]
pub struct SynonymTable {
    entries: Vec<(String, CanonicalField)>,
}

impl Default for SynonymTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SynonymTable {
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_SYNONYMS
                .iter()
                .map(|(key, field)| (key.to_lowercase(), *field))
                .collect(),
        }
    }

    /// Built-in table followed by configured entries
    pub fn with_extra(extra: &[SynonymEntry]) -> Result<Self> {
        let mut table = Self::builtin();
        for entry in extra {
            let field = CanonicalField::from_name(entry.field.trim()).ok_or_else(|| {
                Error::Config(format!(
                    "Unknown canonical field {:?} for synonym {:?}",
                    entry.field, entry.header
                ))
            })?;
            if entry.header.trim().is_empty() {
                return Err(Error::Config(format!("Empty synonym for field {}", field)));
            }
            table.entries.push((entry.header.to_lowercase(), field));
        }
        Ok(table)
    }

    /// First synonym contained in `header`
    pub fn match_header(&self, header: &str) -> Option<CanonicalField> {
        let header = header.to_lowercase();
        self.entries
            .iter()
            .find(|(key, _)| header.contains(key.as_str()))
            .map(|(_, field)| *field)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Which input column feeds which canonical field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMapping {
    columns: Vec<(CanonicalField, usize)>,
}

impl ColumnMapping {
    pub fn column_of(&self, field: CanonicalField) -> Option<usize> {
        self.columns
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, idx)| *idx)
    }

    pub fn has(&self, field: CanonicalField) -> bool {
        self.column_of(field).is_some()
    }

    /// True when revenue will be derived from plays
    pub fn revenue_synthesized(&self) -> bool {
        !self.has(CanonicalField::Revenue)
    }

    /// Mapped fields in input column order
    pub fn fields(&self) -> Vec<CanonicalField> {
        let mut columns = self.columns.clone();
        columns.sort_by_key(|(_, idx)| *idx);
        columns.into_iter().map(|(f, _)| f).collect()
    }

    fn cell<'a>(&self, row: &'a [CellValue], field: CanonicalField) -> &'a CellValue {
        self.column_of(field)
            .and_then(|idx| row.get(idx))
            .unwrap_or(&CellValue::Empty)
    }

    /// Coerce one input row into a record for `period`
    ///
    /// Returns `None` when artist or track name is empty after coercion.
    pub fn normalize_row(&self, period: &str, row: &[CellValue]) -> Option<NewUsageRecord> {
        let text = |field: CanonicalField| coerce_text(self.cell(row, field));

        let artist = text(CanonicalField::Artist);
        let track_name = text(CanonicalField::TrackName);
        if artist.is_empty() || track_name.is_empty() {
            debug!("Rejecting row without artist or track name: {:?}", row);
            return None;
        }

        let usage_period = match text(CanonicalField::UsagePeriod) {
            p if p.is_empty() => period.to_string(),
            p => p,
        };

        let plays_cell = self.cell(row, CanonicalField::Plays);
        let revenue = if self.revenue_synthesized() {
            parse_number(plays_cell).map_or(0.0, sanitize) * SYNTHETIC_REVENUE_PER_PLAY
        } else {
            coerce_revenue(self.cell(row, CanonicalField::Revenue))
        };

        Some(NewUsageRecord {
            period: period.to_string(),
            usage_period,
            platform: text(CanonicalField::Platform),
            territory: text(CanonicalField::Territory),
            content_type: text(CanonicalField::ContentType),
            usage_type: text(CanonicalField::UsageType),
            artist,
            track_name,
            plays: coerce_plays(plays_cell),
            revenue,
        })
    }
}

/// Rows of one table converted to records
#[derive(Debug, Clone, Default)]
pub struct NormalizedReport {
    pub records: Vec<NewUsageRecord>,
    pub rejected: usize,
    pub revenue_synthesized: bool,
}

/// Header mapping plus row coercion
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    synonyms: SynonymTable,
}

impl Normalizer {
    pub fn new(synonyms: SynonymTable) -> Self {
        Self { synonyms }
    }

    /// Map input headers; the first column to claim a field keeps it
    pub fn map_headers(&self, headers: &[String]) -> ColumnMapping {
        let mut mapping = ColumnMapping::default();

        for (idx, header) in headers.iter().enumerate() {
            match self.synonyms.match_header(header) {
                Some(field) => {
                    if let Some(existing) = mapping.column_of(field) {
                        warn!(
                            "Column {:?} also maps to {}, keeping column {:?}",
                            header, field, headers[existing]
                        );
                    } else {
                        debug!("Column {:?} -> {}", header, field);
                        mapping.columns.push((field, idx));
                    }
                }
                None => debug!("Dropping unmapped column {:?}", header),
            }
        }

        mapping
    }

    pub fn normalize(&self, table: &Table, period: &str) -> NormalizedReport {
        let mapping = self.map_headers(&table.headers);
        let mut report = NormalizedReport {
            revenue_synthesized: mapping.revenue_synthesized(),
            ..Default::default()
        };

        for row in &table.rows {
            match mapping.normalize_row(period, row) {
                Some(record) => report.records.push(record),
                None => report.rejected += 1,
            }
        }

        report
    }
}

/// Cell as trimmed text; integral numbers render without a fractional part
pub fn coerce_text(cell: &CellValue) -> String {
    match cell {
        CellValue::Empty => String::new(),
        CellValue::Text(s) => s.trim().to_string(),
        CellValue::Number(n) => format_number(*n),
    }
}

/// Play count; anything unparseable, negative or non-finite becomes 0
pub fn coerce_plays(cell: &CellValue) -> i64 {
    parse_number(cell).map_or(0, |n| sanitize(n).trunc() as i64)
}

/// Revenue; anything unparseable, negative or non-finite becomes 0.0
pub fn coerce_revenue(cell: &CellValue) -> f64 {
    parse_number(cell).map_or(0.0, sanitize)
}

/// Numeric reading of a cell
///
/// Text may use spaces as thousands separators and a decimal comma when no dot is present.
pub fn parse_number(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Empty => None,
        CellValue::Number(n) => Some(*n),
        CellValue::Text(s) => {
            let compact: String = s
                .trim()
                .chars()
                .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
                .collect();
            let compact = if compact.contains('.') {
                compact
            } else {
                compact.replace(',', ".")
            };
            compact.parse::<f64>().ok()
        }
    }
}

fn sanitize(n: f64) -> f64 {
    if n.is_finite() && n > 0.0 {
        n
    } else {
        0.0
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
