//! Report exporters
//!
//! CSV and XLSX carry the same logical content: one data row per computed
//! record, per-artist licensor totals sorted by artist, a grand total and the
//! export parameters. Data cells keep raw numbers; summary amounts are
//! currency strings.

pub mod artist;
pub mod csv;
pub mod filename;
pub mod xlsx;

use crate::aggregate::{Aggregation, ComputedRow};
use crate::calculation::TaxRate;
use chrono::{DateTime, Local};
use mrr_common::time::export_stamp;
use mrr_common::CurrencyFormat;

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub(crate) const ARTIST_TOTALS_TITLE: &str = "ИТОГИ ПО АРТИСТАМ";
pub(crate) const ARTIST_COLUMN: &str = "Артист";
pub(crate) const PAYOUT_COLUMN: &str = "Итоговая выплата";
pub(crate) const GRAND_TOTAL_LABEL: &str = "ОБЩИЙ ИТОГ";
pub(crate) const PARAMETERS_TITLE: &str = "Параметры экспорта:";
pub(crate) const ALL_ARTISTS: &str = "Все артисты";

/// Output format of a period export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => CSV_CONTENT_TYPE,
            ExportFormat::Xlsx => XLSX_CONTENT_TYPE,
        }
    }
}

/// A produced download
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
    /// Data rows written, summary rows excluded
    pub row_count: usize,
}

/// Filters and presentation settings an export was produced with
#[derive(Debug, Clone)]
pub struct ExportParams {
    pub period: String,
    pub artist_filter: Option<String>,
    pub only_new: bool,
    pub apply_tax: bool,
    pub tax: TaxRate,
    pub currency: CurrencyFormat,
    pub exported_at: DateTime<Local>,
}

impl ExportParams {
    pub fn revenue_header(&self) -> String {
        if self.apply_tax {
            format!("Доход (после вычета {}% налога)", self.tax.percent())
        } else {
            "Доход".to_string()
        }
    }

    fn tax_deducted_label(&self) -> String {
        format!("Налог {}% вычтен", self.tax.percent())
    }

    /// (label, value) pairs for the parameters block
    ///
    /// `include_empty_artist` adds the artist line even without a filter.
    pub(crate) fn parameter_pairs(&self, include_empty_artist: bool) -> Vec<(String, String)> {
        let mut pairs = vec![("Период".to_string(), self.period.clone())];
        match &self.artist_filter {
            Some(artist) => pairs.push(("Артист".to_string(), artist.clone())),
            None if include_empty_artist => {
                pairs.push(("Артист".to_string(), ALL_ARTISTS.to_string()))
            }
            None => {}
        }
        pairs.push(("Только новые треки".to_string(), yes_no(self.only_new)));
        pairs.push((self.tax_deducted_label(), yes_no(self.apply_tax)));
        pairs.push(("Дата экспорта".to_string(), export_stamp(self.exported_at)));
        pairs
    }
}

fn yes_no(flag: bool) -> String {
    let label = if flag { "Да" } else { "Нет" };
    label.to_string()
}

/// One exported cell
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ExportCell {
    Text(String),
    Number(f64),
}

impl ExportCell {
    pub(crate) fn render(&self) -> String {
        match self {
            ExportCell::Text(s) => s.clone(),
            ExportCell::Number(n) => n.to_string(),
        }
    }
}

/// Data sheet headers
pub(crate) fn data_headers(params: &ExportParams) -> Vec<String> {
    let mut headers: Vec<String> = [
        "Период использования контента",
        "Площадка",
        "Территория",
        "Тип контента",
        "Вид использования контента",
        "Исполнитель",
        "Название трека",
        "Количество прослушиваний",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    headers.extend(calculation_headers(params));
    headers
}

/// The five computed columns shared by every export
pub(crate) fn calculation_headers(params: &ExportParams) -> Vec<String> {
    vec![
        "Доля артиста в треке (%)".to_string(),
        "% Вознаграждение Лицензиару".to_string(),
        "Вознаграждение Лицензиату".to_string(),
        "К выплате Лицензиару за период".to_string(),
        params.revenue_header(),
    ]
}

pub(crate) fn calculation_cells(row: &ComputedRow) -> [ExportCell; 5] {
    [
        ExportCell::Number(row.calc.artist_share),
        ExportCell::Number(row.calc.royalty_percent),
        ExportCell::Number(row.calc.artist_revenue),
        ExportCell::Number(row.calc.licensor_payment),
        ExportCell::Number(row.calc.effective_revenue),
    ]
}

pub(crate) fn usage_period_of(row: &ComputedRow) -> String {
    if row.record.usage_period.is_empty() {
        row.record.period.clone()
    } else {
        row.record.usage_period.clone()
    }
}

pub(crate) fn data_cells(row: &ComputedRow) -> Vec<ExportCell> {
    let r = &row.record;
    let mut cells = vec![
        ExportCell::Text(usage_period_of(row)),
        ExportCell::Text(r.platform.clone()),
        ExportCell::Text(r.territory.clone()),
        ExportCell::Text(r.content_type.clone()),
        ExportCell::Text(r.usage_type.clone()),
        ExportCell::Text(r.artist.clone()),
        ExportCell::Text(r.track_name.clone()),
        ExportCell::Number(r.plays as f64),
    ];
    cells.extend(calculation_cells(row));
    cells
}

/// Licensor totals sorted by artist, then the grand total
pub(crate) fn licensor_totals(rows: &[ComputedRow]) -> (Vec<(String, f64)>, f64) {
    let aggregation = Aggregation::from_rows(rows);
    let by_artist = aggregation
        .sorted_by_artist()
        .into_iter()
        .map(|a| (a.artist.clone(), a.totals.licensor_payment))
        .collect();
    (by_artist, aggregation.grand.licensor_payment)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_revenue_header_depends_on_tax() {
        let mut p = params("Q1");
        assert_eq!(p.revenue_header(), "Доход");
        p.apply_tax = true;
        assert_eq!(p.revenue_header(), "Доход (после вычета 6% налога)");
        p.tax = TaxRate::new(13.5).unwrap();
        assert_eq!(p.revenue_header(), "Доход (после вычета 13.5% налога)");
    }

    #[test]
    fn test_parameter_pairs() {
        let mut p = params("Q1");
        let labels: Vec<String> = p.parameter_pairs(false).into_iter().map(|(l, _)| l).collect();
        assert_eq!(
            labels,
            vec!["Период", "Только новые треки", "Налог 6% вычтен", "Дата экспорта"]
        );

        let pairs = p.parameter_pairs(true);
        assert_eq!(pairs[1], ("Артист".to_string(), "Все артисты".to_string()));

        p.artist_filter = Some("Alice".into());
        p.only_new = true;
        let pairs = p.parameter_pairs(false);
        assert_eq!(pairs[1], ("Артист".to_string(), "Alice".to_string()));
        assert_eq!(pairs[2], ("Только новые треки".to_string(), "Да".to_string()));
        assert_eq!(pairs[4], ("Дата экспорта".to_string(), "02.04.2024 10:30".to_string()));
    }

    #[test]
    fn test_usage_period_falls_back_to_period() {
        let mut r = row(1, "A", "T", 1.0, 0.5);
        r.record.usage_period.clear();
        assert_eq!(usage_period_of(&r), "Q1 2024");
    }

    #[test]
    fn test_licensor_totals_sorted() {
        let rows = vec![
            row(1, "Zed", "T1", 10.0, 5.0),
            row(2, "Alice", "T2", 4.0, 2.0),
            row(3, "Zed", "T3", 1.0, 0.5),
        ];
        let (by_artist, grand) = licensor_totals(&rows);
        assert_eq!(by_artist, vec![("Alice".to_string(), 2.0), ("Zed".to_string(), 5.5)]);
        assert_eq!(grand, 7.5);
    }
}
