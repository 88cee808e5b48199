//! Single-artist CSV statement

use super::csv::CsvDocument;
use super::filename::artist_file_stem;
use super::{
    calculation_cells, calculation_headers, usage_period_of, ExportFile, ExportFormat,
    ExportParams,
};
use crate::aggregate::ComputedRow;
use mrr_common::{round_money, Result};

pub(crate) const ARTIST_TOTAL_LABEL: &str = "ИТОГ ДЛЯ АРТИСТА";

const ARTIST_COLUMN_INDEX: usize = 6;
const PAYMENT_COLUMN_INDEX: usize = 12;

fn headers(params: &ExportParams) -> Vec<String> {
    let mut headers: Vec<String> = [
        "Период отчета",
        "Период использования",
        "Площадка",
        "Территория",
        "Тип контента",
        "Вид использования",
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

/// Statement for one artist
///
/// Rows are re-ordered by (period, track_name). The closing row carries the
/// artist's licensor total under the payment column.
pub fn export_artist_csv(
    artist: &str,
    rows: &[ComputedRow],
    params: &ExportParams,
) -> Result<ExportFile> {
    let mut ordered: Vec<&ComputedRow> = rows.iter().collect();
    ordered.sort_by(|a, b| {
        (&a.record.period, &a.record.track_name, a.record.id)
            .cmp(&(&b.record.period, &b.record.track_name, b.record.id))
    });

    let mut doc = CsvDocument::new();
    doc.row(headers(params))?;

    let mut total = 0.0;
    for row in &ordered {
        let r = &row.record;
        let mut fields = vec![
            r.period.clone(),
            usage_period_of(row),
            r.platform.clone(),
            r.territory.clone(),
            r.content_type.clone(),
            r.usage_type.clone(),
            r.artist.clone(),
            r.track_name.clone(),
            r.plays.to_string(),
        ];
        fields.extend(calculation_cells(row).iter().map(|c| c.render()));
        doc.row(fields)?;
        total += row.calc.licensor_payment;
    }

    let mut closing = vec![String::new(); PAYMENT_COLUMN_INDEX + 1];
    closing[0] = ARTIST_TOTAL_LABEL.to_string();
    closing[ARTIST_COLUMN_INDEX] = artist.to_string();
    closing[PAYMENT_COLUMN_INDEX] = params.currency.format(round_money(total));

    doc.blank_row()?;
    doc.row(closing)?;

    Ok(ExportFile {
        file_name: format!(
            "{}.{}",
            artist_file_stem(artist, &params.period, params.only_new),
            ExportFormat::Csv.extension()
        ),
        content_type: ExportFormat::Csv.content_type(),
        bytes: doc.finish()?,
        row_count: ordered.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{params, row};
    use super::*;

    #[test]
    fn test_statement_layout() {
        let rows = vec![
            row(1, "Alice", "Zebra", 10.0, 5.0),
            row(2, "Alice", "Apple", 4.0, 2.0),
        ];
        let file = export_artist_csv("Alice", &rows, &params("Q1 2024")).unwrap();
        let text = String::from_utf8(file.bytes[3..].to_vec()).unwrap();
        let lines: Vec<&str> = text.split("\r\n").collect();

        assert_eq!(file.file_name, "report_Alice_Q1_2024.csv");
        assert!(lines[0].starts_with("Период отчета,Период использования,"));
        assert!(lines[1].contains(",Apple,"));
        assert!(lines[2].contains(",Zebra,"));
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "ИТОГ ДЛЯ АРТИСТА,,,,,,Alice,,,,,,7.00 ₽");
    }

    #[test]
    fn test_only_new_in_file_name() {
        let mut p = params("Q1");
        p.only_new = true;
        let file = export_artist_csv("Alice", &[row(1, "Alice", "T", 1.0, 0.5)], &p).unwrap();
        assert_eq!(file.file_name, "report_Alice_Q1_new_tracks.csv");
    }
}
