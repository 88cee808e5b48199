//! CSV export
//!
//! UTF-8 with a BOM, comma-delimited, CRLF line endings, fields quoted only
//! when needed. Separator rows in the summary block are truly empty lines.

use super::filename::report_file_stem;
use super::{
    data_cells, data_headers, licensor_totals, ExportFile, ExportFormat, ExportParams,
    ARTIST_COLUMN, ARTIST_TOTALS_TITLE, GRAND_TOTAL_LABEL, PARAMETERS_TITLE, PAYOUT_COLUMN,
};
use crate::aggregate::ComputedRow;
use ::csv::{Terminator, Writer, WriterBuilder};
use mrr_common::{Error, Result};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

fn export_error(e: impl std::fmt::Display) -> Error {
    Error::Export(e.to_string())
}

fn writer_over(buf: Vec<u8>) -> Writer<Vec<u8>> {
    WriterBuilder::new()
        .flexible(true)
        .terminator(Terminator::CRLF)
        .from_writer(buf)
}

/// Incrementally built CSV document
pub(crate) struct CsvDocument {
    writer: Writer<Vec<u8>>,
}

impl CsvDocument {
    pub(crate) fn new() -> Self {
        Self {
            writer: writer_over(UTF8_BOM.to_vec()),
        }
    }

    pub(crate) fn row<I, T>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer.write_record(fields).map_err(export_error)
    }

    /// An empty line; `write_record` of zero fields would emit `""`
    pub(crate) fn blank_row(&mut self) -> Result<()> {
        let writer = std::mem::replace(&mut self.writer, writer_over(Vec::new()));
        let mut buf = writer.into_inner().map_err(export_error)?;
        buf.extend_from_slice(b"\r\n");
        self.writer = writer_over(buf);
        Ok(())
    }

    pub(crate) fn finish(self) -> Result<Vec<u8>> {
        self.writer.into_inner().map_err(export_error)
    }
}

/// Render rows that already passed every filter
pub fn export_csv(rows: &[ComputedRow], params: &ExportParams) -> Result<ExportFile> {
    let mut doc = CsvDocument::new();

    doc.row(data_headers(params))?;
    for row in rows {
        doc.row(data_cells(row).iter().map(|c| c.render()))?;
    }

    let (by_artist, grand_total) = licensor_totals(rows);

    doc.blank_row()?;
    doc.row([ARTIST_TOTALS_TITLE])?;
    doc.row([ARTIST_COLUMN, PAYOUT_COLUMN])?;
    for (artist, total) in &by_artist {
        doc.row([artist.clone(), params.currency.format(*total)])?;
    }

    doc.blank_row()?;
    doc.row([GRAND_TOTAL_LABEL.to_string(), params.currency.format(grand_total)])?;

    doc.blank_row()?;
    doc.row([PARAMETERS_TITLE])?;
    for (label, value) in params.parameter_pairs(false) {
        doc.row([format!("{}: {}", label, value)])?;
    }

    Ok(ExportFile {
        file_name: format!(
            "{}.{}",
            report_file_stem(&params.period, params.only_new, params.artist_filter.as_deref()),
            ExportFormat::Csv.extension()
        ),
        content_type: ExportFormat::Csv.content_type(),
        bytes: doc.finish()?,
        row_count: rows.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{params, row};
    use super::*;

    fn text(file: &ExportFile) -> String {
        assert!(file.bytes.starts_with(UTF8_BOM));
        String::from_utf8(file.bytes[UTF8_BOM.len()..].to_vec()).unwrap()
    }

    #[test]
    fn test_layout() {
        let rows = vec![
            row(1, "Zed", "Night", 10.0, 5.0),
            row(2, "Alice", "Day, Two", 4.0, 2.0),
        ];
        let file = export_csv(&rows, &params("Q1 2024")).unwrap();
        let text = text(&file);
        let lines: Vec<&str> = text.split("\r\n").collect();

        assert_eq!(file.file_name, "music_report_Q1_2024.csv");
        assert_eq!(file.row_count, 2);
        assert!(lines[0].starts_with("Период использования контента,Площадка,"));
        assert!(lines[0].ends_with(",Доход"));
        assert_eq!(lines[1], "Q1 2024,Spotify,,,,Zed,Night,100,100,50,10,5,10");
        assert_eq!(lines[2], "Q1 2024,Spotify,,,,Alice,\"Day, Two\",100,100,50,4,2,4");
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "ИТОГИ ПО АРТИСТАМ");
        assert_eq!(lines[5], "Артист,Итоговая выплата");
        assert_eq!(lines[6], "Alice,2.00 ₽");
        assert_eq!(lines[7], "Zed,5.00 ₽");
        assert_eq!(lines[8], "");
        assert_eq!(lines[9], "ОБЩИЙ ИТОГ,7.00 ₽");
        assert_eq!(lines[10], "");
        assert_eq!(lines[11], "Параметры экспорта:");
        assert_eq!(lines[12], "Период: Q1 2024");
        assert_eq!(lines[13], "Только новые треки: Нет");
        assert_eq!(lines[14], "Налог 6% вычтен: Нет");
        assert_eq!(lines[15], "Дата экспорта: 02.04.2024 10:30");
        assert_eq!(lines[16], "");
        assert_eq!(lines.len(), 17);
    }

    #[test]
    fn test_artist_filter_and_flags_in_name_and_block() {
        let mut p = params("Q1");
        p.artist_filter = Some("Alice".into());
        p.only_new = true;
        p.apply_tax = true;

        let file = export_csv(&[row(1, "Alice", "Song", 9.4, 4.7)], &p).unwrap();
        let text = text(&file);

        assert_eq!(file.file_name, "music_report_Q1_new_tracks_Alice.csv");
        assert!(text.contains("Доход (после вычета 6% налога)\r\n"));
        assert!(text.contains("\r\nАртист: Alice\r\n"));
        assert!(text.contains("\r\nТолько новые треки: Да\r\n"));
        assert!(text.contains("\r\nНалог 6% вычтен: Да\r\n"));
    }
}
