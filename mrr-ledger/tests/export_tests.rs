//! Export tests: parse produced files back and check the summary block

use calamine::{open_workbook_auto_from_rs, Reader};
use mrr_common::{CurrencyFormat, Error};
use mrr_ledger::export::xlsx::{DATA_SHEET, INFO_SHEET, TOTALS_SHEET};
use mrr_ledger::{
    ExportFormat, MemoryStore, PeriodFilter, ReportFilter, RoyaltyLedger, TaxRate,
};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

const REPORT: &str = "Исполнитель,Название трека,Площадка,Количество прослушиваний,Доход\n\
                      Alice,Song A,Spotify,100,12.34\n\
                      Alice,Song B,Spotify,100,7.78\n\
                      Bob,Tune,Spotify,100,3.21\n\
                      \"Carol, Jr.\",Waves,Yandex,100,1.10\n";

const LICENSOR_COLUMN: usize = 11;

async fn ledger() -> RoyaltyLedger<MemoryStore> {
    let ledger = RoyaltyLedger::new(MemoryStore::new());
    ledger
        .import_report(Path::new("q1.csv"), REPORT.as_bytes(), "Q1 2024")
        .await
        .unwrap();
    ledger
}

fn q1(only_new: bool) -> ReportFilter {
    ReportFilter {
        period: PeriodFilter::parse("Q1 2024"),
        only_new,
        ..Default::default()
    }
}

/// Data rows, artist totals and the grand total of an exported CSV
struct ParsedCsv {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    artist_totals: Vec<(String, f64)>,
    grand_total: f64,
    parameters: Vec<String>,
}

fn parse_csv(bytes: &[u8]) -> ParsedCsv {
    let text = std::str::from_utf8(bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap()).unwrap();
    let sections: Vec<&str> = text.split("\r\n\r\n").collect();
    assert_eq!(sections.len(), 4, "unexpected layout: {:?}", text);

    let mut reader = csv::ReaderBuilder::new().from_reader(sections[0].as_bytes());
    let headers = reader.headers().unwrap().iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();

    let currency = CurrencyFormat::default();
    let mut totals = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(sections[1].as_bytes());
    let artist_totals = totals
        .records()
        .skip(2)
        .map(|r| {
            let r = r.unwrap();
            (r[0].to_string(), currency.parse(&r[1]).unwrap())
        })
        .collect();

    let grand_line = sections[2].trim_end();
    let grand_total = currency
        .parse(grand_line.strip_prefix("ОБЩИЙ ИТОГ,").unwrap())
        .unwrap();

    let parameters = sections[3]
        .split("\r\n")
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    ParsedCsv {
        headers,
        rows,
        artist_totals,
        grand_total,
        parameters,
    }
}

fn licensor_by_artist(rows: &[Vec<String>]) -> BTreeMap<String, f64> {
    let mut sums = BTreeMap::new();
    for row in rows {
        let amount: f64 = row[LICENSOR_COLUMN].parse().unwrap();
        *sums.entry(row[5].clone()).or_insert(0.0) += amount;
    }
    sums
}

#[tokio::test]
async fn test_csv_summary_matches_data_rows() {
    let ledger = ledger().await;
    let file = ledger.export(&q1(false), ExportFormat::Csv).await.unwrap();
    let parsed = parse_csv(&file.bytes);

    assert_eq!(parsed.headers.len(), 13);
    assert_eq!(parsed.rows.len(), 4);
    assert_eq!(parsed.rows[3][5], "Carol, Jr.");

    let sums = licensor_by_artist(&parsed.rows);
    let names: Vec<&str> = parsed.artist_totals.iter().map(|(a, _)| a.as_str()).collect();
    assert_eq!(names, vec!["Alice", "Bob", "Carol, Jr."]);
    for (artist, total) in &parsed.artist_totals {
        assert!((sums[artist] - total).abs() < 0.005, "{}", artist);
    }

    let sum_of_artists: f64 = parsed.artist_totals.iter().map(|(_, t)| t).sum();
    assert!((sum_of_artists - parsed.grand_total).abs() < 0.005);
    assert_eq!(parsed.parameters[0], "Параметры экспорта:");
    assert_eq!(parsed.parameters[1], "Период: Q1 2024");
}

#[tokio::test]
async fn test_only_new_excludes_configured_tracks_from_rows_and_totals() {
    let ledger = ledger().await;
    ledger.bulk_by_text("Alice - Song A", "10").await.unwrap();

    let file = ledger.export(&q1(true), ExportFormat::Csv).await.unwrap();
    assert_eq!(file.file_name, "music_report_Q1_2024_new_tracks.csv");
    let parsed = parse_csv(&file.bytes);

    assert_eq!(parsed.rows.len(), 3);
    assert!(parsed.rows.iter().all(|r| r[6] != "Song A"));

    let alice = parsed
        .artist_totals
        .iter()
        .find(|(a, _)| a == "Alice")
        .unwrap();
    // Song B only: 7.78 * 50 %
    assert_eq!(alice.1, 3.89);
    assert!(parsed.parameters.contains(&"Только новые треки: Да".to_string()));
}

#[tokio::test]
async fn test_tax_rate_from_configuration_reaches_headers() {
    let ledger = ledger().await.with_tax(TaxRate::new(13.0).unwrap());
    let mut filter = q1(false);
    filter.apply_tax = true;

    let file = ledger.export(&filter, ExportFormat::Csv).await.unwrap();
    let parsed = parse_csv(&file.bytes);

    assert_eq!(parsed.headers[12], "Доход (после вычета 13% налога)");
    let bob = parsed.rows.iter().find(|r| r[5] == "Bob").unwrap();
    // 3.21 * 0.87 = 2.7927
    assert_eq!(bob[12], "2.79");
}

#[tokio::test]
async fn test_xlsx_has_three_sheets() {
    let ledger = ledger().await;
    let mut filter = q1(false);
    filter.artist = Some("Alice".to_string());

    let file = ledger.export(&filter, ExportFormat::Xlsx).await.unwrap();
    assert_eq!(file.file_name, "music_report_Q1_2024_Alice.xlsx");
    assert_eq!(file.row_count, 2);

    let workbook = open_workbook_auto_from_rs(Cursor::new(file.bytes)).unwrap();
    assert_eq!(workbook.sheet_names(), vec![DATA_SHEET, TOTALS_SHEET, INFO_SHEET]);
}

#[tokio::test]
async fn test_artist_statement_total() {
    let ledger = ledger().await;
    let file = ledger
        .export_artist("Alice", &PeriodFilter::parse("Q1 2024"), false, false)
        .await
        .unwrap();

    let text = String::from_utf8(file.bytes[3..].to_vec()).unwrap();
    let last = text.trim_end().lines().last().unwrap();
    // 12.34 * 0.5 + 7.78 * 0.5 = 6.17 + 3.89
    assert_eq!(last, "ИТОГ ДЛЯ АРТИСТА,,,,,,Alice,,,,,,10.06 ₽");
}

#[tokio::test]
async fn test_empty_export_is_a_notice() {
    let ledger = ledger().await;
    let filter = ReportFilter {
        period: PeriodFilter::parse("Q4 1999"),
        ..Default::default()
    };

    let err = ledger.export(&filter, ExportFormat::Csv).await.unwrap_err();
    assert!(matches!(err, Error::EmptyResultSet(_)));
    assert!(err.is_notice());
}
