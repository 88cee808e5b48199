//! Royalty ledger service
//!
//! [`RoyaltyLedger`] is the single entry point front-ends talk to. It owns a
//! store implementing both storage ports and recomputes every view and export
//! from stored records plus a fresh override snapshot.

use crate::aggregate::{Aggregation, ComputedRow};
use crate::calculation::{Calculator, OverrideLookup, TaxRate};
use crate::export::artist::export_artist_csv;
use crate::export::csv::export_csv;
use crate::export::xlsx::export_xlsx;
use crate::export::{ExportFile, ExportFormat, ExportParams};
use crate::normalizer::{Normalizer, SynonymTable};
use crate::overrides::{
    parse_percent, parse_track_lines, validate_percent, BulkTextOutcome, ARTIST_SHARE_FIELD,
    ROYALTY_PERCENT_FIELD,
};
use crate::reader::read_table;
use crate::store::{InsertOutcome, OverrideStore, PeriodFilter, RecordQuery, ReportStore};
use chrono::Local;
use mrr_common::db::{
    RoyaltyOverride, TrackShareOverride, UsageRecord, DEFAULT_ARTIST_SHARE,
    DEFAULT_ROYALTY_PERCENT,
};
use mrr_common::{CurrencyFormat, Error, Result};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// Result of one upload
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub added: usize,
    /// Rows whose (period, artist, track_name, platform) was already stored
    pub duplicates: usize,
    /// Rows without artist or track name
    pub rejected: usize,
    /// No revenue column; revenue was derived from plays
    pub revenue_synthesized: bool,
    /// Encoding used for CSV input
    pub encoding: Option<&'static str>,
}

/// Filters of the report view and period exports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub period: PeriodFilter,
    /// Artist name substring, ASCII case-insensitive
    pub artist: Option<String>,
    pub apply_tax: bool,
    /// Drop rows of tracks that already have settings
    pub only_new: bool,
}

impl ReportFilter {
    fn query(&self) -> RecordQuery {
        RecordQuery::period(self.period.clone()).with_artist_substring(self.artist.as_deref())
    }
}

/// Computed rows with totals
#[derive(Debug, Clone, Serialize)]
pub struct ReportView {
    pub rows: Vec<ComputedRow>,
    pub aggregation: Aggregation,
    /// New tracks in the selected period, 0 when no period is selected
    pub new_tracks_count: usize,
    pub periods: Vec<String>,
}

/// A record of a period whose track has no settings yet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTrack {
    pub id: i64,
    pub artist: String,
    pub track_name: String,
    pub platform: String,
    pub plays: i64,
}

/// Resolved settings of the track behind one record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSettings {
    pub record_id: i64,
    pub artist: String,
    pub track_name: String,
    pub artist_share: f64,
    pub royalty_percent: f64,
    pub has_settings: bool,
}

/// Share and royalty percent, both already range-checked
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettingsInput {
    artist_share: f64,
    royalty_percent: f64,
}

impl SettingsInput {
    pub fn new(artist_share: f64, royalty_percent: f64) -> Result<Self> {
        Ok(Self {
            artist_share: validate_percent(ARTIST_SHARE_FIELD, artist_share)?,
            royalty_percent: validate_percent(ROYALTY_PERCENT_FIELD, royalty_percent)?,
        })
    }

    /// Parse user text; a decimal comma is accepted
    pub fn parse(artist_share: &str, royalty_percent: &str) -> Result<Self> {
        Ok(Self {
            artist_share: parse_percent(ARTIST_SHARE_FIELD, artist_share)?,
            royalty_percent: parse_percent(ROYALTY_PERCENT_FIELD, royalty_percent)?,
        })
    }

    pub fn artist_share(&self) -> f64 {
        self.artist_share
    }

    pub fn royalty_percent(&self) -> f64 {
        self.royalty_percent
    }
}

/// Outcome of a single-track write
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsUpdate {
    pub settings: TrackSettings,
    /// Either override existed before the write
    pub existed_before: bool,
}

/// Both override tables
#[derive(Debug, Clone, Default, Serialize)]
pub struct OverrideListing {
    pub shares: Vec<TrackShareOverride>,
    pub royalties: Vec<RoyaltyOverride>,
}

pub struct RoyaltyLedger<S> {
    store: S,
    normalizer: Normalizer,
    calculator: Calculator,
    currency: CurrencyFormat,
}

impl<S> RoyaltyLedger<S>
where
    S: ReportStore + OverrideStore,
{
    /// Ledger with the built-in synonym table, default tax and currency
    pub fn new(store: S) -> Self {
        Self {
            store,
            normalizer: Normalizer::default(),
            calculator: Calculator::default(),
            currency: CurrencyFormat::default(),
        }
    }

    pub fn with_synonyms(mut self, synonyms: SynonymTable) -> Self {
        self.normalizer = Normalizer::new(synonyms);
        self
    }

    pub fn with_tax(mut self, tax: TaxRate) -> Self {
        self.calculator = Calculator::new(tax);
        self
    }

    pub fn with_currency(mut self, currency: CurrencyFormat) -> Self {
        self.currency = currency;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Ingest one CSV/XLS/XLSX upload under `period`
    ///
    /// Rows stream from the reader through the normalizer into the store one at
    /// a time; duplicates of stored rows are skipped and the import still succeeds.
    pub async fn import_report(
        &self,
        file_name: &Path,
        bytes: &[u8],
        period: &str,
    ) -> Result<ImportOutcome> {
        let period = period.trim();
        if period.is_empty() {
            return Err(Error::InvalidInput("report period is required".to_string()));
        }

        let mut reader = read_table(file_name, bytes)?;
        let mapping = self.normalizer.map_headers(&reader.headers);
        let mut outcome = ImportOutcome {
            revenue_synthesized: mapping.revenue_synthesized(),
            encoding: reader.encoding,
            ..Default::default()
        };

        while let Some(row) = reader.next_row() {
            let row = row?;
            let Some(record) = mapping.normalize_row(period, &row) else {
                outcome.rejected += 1;
                continue;
            };
            match self.store.insert_if_absent(&record).await? {
                InsertOutcome::Inserted(id) => {
                    debug!("Inserted record {} ({} - {})", id, record.artist, record.track_name);
                    outcome.added += 1;
                }
                InsertOutcome::Skipped => {
                    debug!(
                        "Skipped duplicate {} - {} on {:?}",
                        record.artist, record.track_name, record.platform
                    );
                    outcome.duplicates += 1;
                }
            }
        }

        if outcome.revenue_synthesized {
            warn!("{}: no revenue column, revenue derived from plays", file_name.display());
        }
        info!(
            "Imported {} for period {:?}: {} added, {} duplicates, {} rejected",
            file_name.display(),
            period,
            outcome.added,
            outcome.duplicates,
            outcome.rejected
        );

        Ok(outcome)
    }

    async fn computed_rows(
        &self,
        query: &RecordQuery,
        apply_tax: bool,
        only_new: bool,
    ) -> Result<Vec<ComputedRow>> {
        let records = self.store.query(query).await?;
        let overrides = self.store.load_snapshot().await?;
        Ok(self.compute_all(records, &overrides, apply_tax, only_new))
    }

    fn compute_all(
        &self,
        records: Vec<UsageRecord>,
        overrides: &impl OverrideLookup,
        apply_tax: bool,
        only_new: bool,
    ) -> Vec<ComputedRow> {
        records
            .into_iter()
            .map(|record| {
                let calc = self.calculator.compute(&record, overrides, apply_tax);
                ComputedRow { record, calc }
            })
            .filter(|row| !only_new || row.is_new())
            .collect()
    }

    /// Computed rows, totals and the period list for one filter
    pub async fn report_view(&self, filter: &ReportFilter) -> Result<ReportView> {
        let rows = self
            .computed_rows(&filter.query(), filter.apply_tax, filter.only_new)
            .await?;
        let aggregation = Aggregation::from_rows(&rows);

        let new_tracks_count = match &filter.period {
            PeriodFilter::All => 0,
            period @ PeriodFilter::Period(_) => self.new_tracks(period).await?.len(),
        };

        Ok(ReportView {
            rows,
            aggregation,
            new_tracks_count,
            periods: self.store.distinct_periods().await?,
        })
    }

    pub async fn distinct_periods(&self) -> Result<Vec<String>> {
        self.store.distinct_periods().await
    }

    /// Records of a period whose track has neither override
    pub async fn new_tracks(&self, period: &PeriodFilter) -> Result<Vec<NewTrack>> {
        if period.period().is_none() {
            return Err(Error::MissingRequiredFilter(
                "select a specific period to list new tracks".to_string(),
            ));
        }

        let rows = self
            .computed_rows(&RecordQuery::period(period.clone()), false, true)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| NewTrack {
                id: row.record.id,
                artist: row.record.artist,
                track_name: row.record.track_name,
                platform: row.record.platform,
                plays: row.record.plays,
            })
            .collect())
    }

    async fn record(&self, id: i64) -> Result<UsageRecord> {
        self.store
            .get_record(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("record {}", id)))
    }

    async fn resolve_settings(&self, record: &UsageRecord) -> Result<TrackSettings> {
        let share = self.store.get_share(&record.artist, &record.track_name).await?;
        let royalty = self
            .store
            .get_royalty(&record.artist, &record.track_name)
            .await?;

        Ok(TrackSettings {
            record_id: record.id,
            artist: record.artist.clone(),
            track_name: record.track_name.clone(),
            has_settings: share.is_some() || royalty.is_some(),
            artist_share: share.map_or(DEFAULT_ARTIST_SHARE, |s| s.share),
            royalty_percent: royalty.map_or(DEFAULT_ROYALTY_PERCENT, |r| r.royalty_percent),
        })
    }

    /// Settings of the track behind record `id`, defaults when unset
    pub async fn track_settings(&self, id: i64) -> Result<TrackSettings> {
        let record = self.record(id).await?;
        self.resolve_settings(&record).await
    }

    /// Write both overrides of the track behind record `id`
    pub async fn set_track_settings(&self, id: i64, input: SettingsInput) -> Result<SettingsUpdate> {
        let record = self.record(id).await?;
        let existed_before = self.resolve_settings(&record).await?.has_settings;

        self.store
            .upsert_track_settings(
                &record.artist,
                &record.track_name,
                input.artist_share,
                input.royalty_percent,
            )
            .await?;
        info!(
            "Settings for {} - {}: share {}%, royalty {}%",
            record.artist, record.track_name, input.artist_share, input.royalty_percent
        );

        Ok(SettingsUpdate {
            settings: self.resolve_settings(&record).await?,
            existed_before,
        })
    }

    /// Apply one share and royalty percent to the tracks behind `ids`
    ///
    /// Ids that no longer resolve are skipped. Returns the number of ids applied.
    pub async fn bulk_by_ids(&self, ids: &[i64], input: SettingsInput) -> Result<usize> {
        let mut updated = 0;
        for &id in ids {
            let Some(record) = self.store.get_record(id).await? else {
                debug!("Bulk settings: record {} not found, skipping", id);
                continue;
            };
            self.store
                .upsert_track_settings(
                    &record.artist,
                    &record.track_name,
                    input.artist_share,
                    input.royalty_percent,
                )
                .await?;
            updated += 1;
        }
        info!("Bulk settings applied to {} of {} records", updated, ids.len());
        Ok(updated)
    }

    /// Set the royalty percent of every known `"artist - track"` line in `text`
    ///
    /// The percentage is validated before anything is written. Only royalty
    /// percent changes; shares are untouched.
    pub async fn bulk_by_text(&self, text: &str, royalty_percent: &str) -> Result<BulkTextOutcome> {
        let royalty_percent = parse_percent(ROYALTY_PERCENT_FIELD, royalty_percent)?;
        let parsed = parse_track_lines(text);

        let mut outcome = BulkTextOutcome {
            malformed: parsed.malformed,
            ..Default::default()
        };
        for key in parsed.keys {
            if self.store.pair_exists(&key.artist, &key.track_name).await? {
                self.store
                    .upsert_royalty(&key.artist, &key.track_name, royalty_percent)
                    .await?;
                outcome.applied.push(key);
            } else {
                debug!("Bulk royalty: unknown track {} - {}", key.artist, key.track_name);
                outcome.unknown.push(key);
            }
        }

        info!(
            "Bulk royalty {}%: {} applied, {} unknown, {} malformed",
            royalty_percent,
            outcome.applied.len(),
            outcome.unknown.len(),
            outcome.malformed.len()
        );
        Ok(outcome)
    }

    pub async fn list_overrides(&self) -> Result<OverrideListing> {
        Ok(OverrideListing {
            shares: self.store.list_shares().await?,
            royalties: self.store.list_royalties().await?,
        })
    }

    fn export_params(
        &self,
        period: &str,
        artist: Option<String>,
        apply_tax: bool,
        only_new: bool,
    ) -> ExportParams {
        ExportParams {
            period: period.to_string(),
            artist_filter: artist,
            only_new,
            apply_tax,
            tax: self.calculator.tax(),
            currency: self.currency.clone(),
            exported_at: Local::now(),
        }
    }

    /// Period export in CSV or XLSX
    pub async fn export(&self, filter: &ReportFilter, format: ExportFormat) -> Result<ExportFile> {
        let period = required_period(&filter.period)?;
        let rows = self
            .computed_rows(&filter.query(), filter.apply_tax, filter.only_new)
            .await?;
        if rows.is_empty() {
            return Err(Error::EmptyResultSet(format!(
                "no records to export for period {:?}",
                period
            )));
        }

        let artist = filter
            .artist
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);
        let params = self.export_params(period, artist, filter.apply_tax, filter.only_new);
        let file = match format {
            ExportFormat::Csv => export_csv(&rows, &params)?,
            ExportFormat::Xlsx => export_xlsx(&rows, &params)?,
        };

        info!("Exported {} rows to {}", file.row_count, file.file_name);
        Ok(file)
    }

    /// CSV statement for exactly one artist in one period
    pub async fn export_artist(
        &self,
        artist: &str,
        period: &PeriodFilter,
        apply_tax: bool,
        only_new: bool,
    ) -> Result<ExportFile> {
        let period_label = required_period(period)?;
        let query = RecordQuery::period(period.clone()).with_artist(artist);
        let rows = self.computed_rows(&query, apply_tax, only_new).await?;
        if rows.is_empty() {
            return Err(Error::EmptyResultSet(format!(
                "no records for artist {:?} in period {:?}",
                artist, period_label
            )));
        }

        let params = self.export_params(period_label, Some(artist.to_string()), apply_tax, only_new);
        let file = export_artist_csv(artist, &rows, &params)?;

        info!("Exported {} rows to {}", file.row_count, file.file_name);
        Ok(file)
    }
}

fn required_period(period: &PeriodFilter) -> Result<&str> {
    period.period().ok_or_else(|| {
        Error::MissingRequiredFilter("select a specific period before exporting".to_string())
    })
}
