//! XLSX export: "Данные", "Итоги" and "Инфо" sheets

use super::filename::report_file_stem;
use super::{
    data_cells, data_headers, licensor_totals, ExportCell, ExportFile, ExportFormat, ExportParams,
    ARTIST_COLUMN, GRAND_TOTAL_LABEL, PAYOUT_COLUMN,
};
use crate::aggregate::ComputedRow;
use mrr_common::{Error, Result};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

pub const DATA_SHEET: &str = "Данные";
pub const TOTALS_SHEET: &str = "Итоги";
pub const INFO_SHEET: &str = "Инфо";

/// Widest auto-fitted data column
const MAX_COLUMN_WIDTH: usize = 50;

fn xlsx_error(e: XlsxError) -> Error {
    Error::Export(e.to_string())
}

fn fitted_width(max_chars: usize) -> f64 {
    (max_chars + 2).min(MAX_COLUMN_WIDTH) as f64
}

fn data_sheet(
    rows: &[ComputedRow],
    params: &ExportParams,
    bold: &Format,
) -> std::result::Result<Worksheet, XlsxError> {
    let mut sheet = Worksheet::new();
    sheet.set_name(DATA_SHEET)?;

    let headers = data_headers(params);
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();

    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, header.as_str(), bold)?;
    }

    for (idx, row) in rows.iter().enumerate() {
        let row_num = idx as u32 + 1;
        for (col, cell) in data_cells(row).into_iter().enumerate() {
            let len = cell.render().chars().count();
            if let Some(width) = widths.get_mut(col) {
                *width = (*width).max(len);
            }
            match cell {
                ExportCell::Text(text) => sheet.write_string(row_num, col as u16, text)?,
                ExportCell::Number(n) => sheet.write_number(row_num, col as u16, n)?,
            };
        }
    }

    for (col, width) in widths.into_iter().enumerate() {
        sheet.set_column_width(col as u16, fitted_width(width))?;
    }

    Ok(sheet)
}

fn totals_sheet(
    rows: &[ComputedRow],
    params: &ExportParams,
    bold: &Format,
) -> std::result::Result<Worksheet, XlsxError> {
    let mut sheet = Worksheet::new();
    sheet.set_name(TOTALS_SHEET)?;
    sheet.write_string_with_format(0, 0, ARTIST_COLUMN, bold)?;
    sheet.write_string_with_format(0, 1, PAYOUT_COLUMN, bold)?;

    let (by_artist, grand_total) = licensor_totals(rows);
    let mut row_num = 1;
    for (artist, total) in &by_artist {
        sheet.write_string(row_num, 0, artist.as_str())?;
        sheet.write_string(row_num, 1, params.currency.format(*total))?;
        row_num += 1;
    }
    sheet.write_string_with_format(row_num, 0, GRAND_TOTAL_LABEL, bold)?;
    sheet.write_string_with_format(row_num, 1, params.currency.format(grand_total), bold)?;

    sheet.set_column_width(0, 40)?;
    sheet.set_column_width(1, 20)?;
    Ok(sheet)
}

fn info_sheet(params: &ExportParams, bold: &Format) -> std::result::Result<Worksheet, XlsxError> {
    let mut sheet = Worksheet::new();
    sheet.set_name(INFO_SHEET)?;
    sheet.write_string_with_format(0, 0, "Параметр", bold)?;
    sheet.write_string_with_format(0, 1, "Значение", bold)?;

    for (idx, (label, value)) in params.parameter_pairs(true).into_iter().enumerate() {
        let row_num = idx as u32 + 1;
        sheet.write_string(row_num, 0, label)?;
        sheet.write_string(row_num, 1, value)?;
    }

    sheet.set_column_width(0, 20)?;
    sheet.set_column_width(1, 30)?;
    Ok(sheet)
}

/// Render rows that already passed every filter
pub fn export_xlsx(rows: &[ComputedRow], params: &ExportParams) -> Result<ExportFile> {
    let bold = Format::new().set_bold();

    let mut workbook = Workbook::new();
    workbook.push_worksheet(data_sheet(rows, params, &bold).map_err(xlsx_error)?);
    workbook.push_worksheet(totals_sheet(rows, params, &bold).map_err(xlsx_error)?);
    workbook.push_worksheet(info_sheet(params, &bold).map_err(xlsx_error)?);

    let bytes = workbook.save_to_buffer().map_err(xlsx_error)?;

    Ok(ExportFile {
        file_name: format!(
            "{}.{}",
            report_file_stem(&params.period, params.only_new, params.artist_filter.as_deref()),
            ExportFormat::Xlsx.extension()
        ),
        content_type: ExportFormat::Xlsx.content_type(),
        bytes,
        row_count: rows.len(),
    })
}
