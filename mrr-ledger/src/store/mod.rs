//! Storage ports for usage records and per-track overrides
//!
//! The calculation and export code only sees these traits. [`SqliteStore`]
//! is the production implementation; [`MemoryStore`] backs tests and embedding.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::overrides::OverrideSnapshot;
use async_trait::async_trait;
use mrr_common::db::{NewUsageRecord, RoyaltyOverride, TrackShareOverride, UsageRecord};
use mrr_common::Result;
use serde::Serialize;

/// Period selector value meaning "no period filter"
pub const ALL_PERIODS: &str = "all";

/// Period filter for queries and exports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub enum PeriodFilter {
    #[default]
    All,
    Period(String),
}

impl PeriodFilter {
    /// Empty input and the `"all"` sentinel both mean no filter
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value == ALL_PERIODS {
            PeriodFilter::All
        } else {
            PeriodFilter::Period(value.to_string())
        }
    }

    pub fn period(&self) -> Option<&str> {
        match self {
            PeriodFilter::All => None,
            PeriodFilter::Period(p) => Some(p),
        }
    }

    pub fn label(&self) -> &str {
        self.period().unwrap_or(ALL_PERIODS)
    }
}

/// Record selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    pub period: PeriodFilter,
    /// Substring of the artist name, ASCII case-insensitive
    pub artist_contains: Option<String>,
    /// Exact artist name
    pub artist_exact: Option<String>,
}

impl RecordQuery {
    pub fn period(period: PeriodFilter) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    pub fn with_artist_substring(mut self, artist: Option<&str>) -> Self {
        self.artist_contains = artist
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);
        self
    }

    pub fn with_artist(mut self, artist: &str) -> Self {
        self.artist_exact = Some(artist.to_string());
        self
    }

    /// Same predicate the SQL implementation applies
    pub fn matches(&self, record: &UsageRecord) -> bool {
        if let Some(period) = self.period.period() {
            if record.period != period {
                return false;
            }
        }
        if let Some(artist) = &self.artist_contains {
            if !record
                .artist
                .to_ascii_lowercase()
                .contains(&artist.to_ascii_lowercase())
            {
                return false;
            }
        }
        if let Some(artist) = &self.artist_exact {
            if &record.artist != artist {
                return false;
            }
        }
        true
    }
}

/// Result of an `insert_if_absent`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    /// A record with the same (period, artist, track_name, platform) exists
    Skipped,
}

/// Append-only usage records, unique on (period, artist, track_name, platform)
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn insert_if_absent(&self, record: &NewUsageRecord) -> Result<InsertOutcome>;

    /// Matching records ordered by (artist, track_name, id)
    async fn query(&self, query: &RecordQuery) -> Result<Vec<UsageRecord>>;

    /// `"all"` followed by every stored period label, ascending
    async fn distinct_periods(&self) -> Result<Vec<String>>;

    async fn get_record(&self, id: i64) -> Result<Option<UsageRecord>>;

    /// True if any record carries this (artist, track_name)
    async fn pair_exists(&self, artist: &str, track_name: &str) -> Result<bool>;

    async fn count_records(&self) -> Result<i64>;
}

/// Two last-write-wins tables keyed by (artist, track_name)
#[async_trait]
pub trait OverrideStore: Send + Sync {
    async fn get_share(&self, artist: &str, track_name: &str) -> Result<Option<TrackShareOverride>>;

    async fn upsert_share(&self, artist: &str, track_name: &str, share: f64) -> Result<()>;

    async fn get_royalty(&self, artist: &str, track_name: &str) -> Result<Option<RoyaltyOverride>>;

    async fn upsert_royalty(&self, artist: &str, track_name: &str, royalty_percent: f64)
        -> Result<()>;

    /// Write share and royalty percent of one track together
    async fn upsert_track_settings(
        &self,
        artist: &str,
        track_name: &str,
        share: f64,
        royalty_percent: f64,
    ) -> Result<()>;

    /// Ordered by (artist, track_name)
    async fn list_shares(&self) -> Result<Vec<TrackShareOverride>>;

    /// Ordered by (artist, track_name)
    async fn list_royalties(&self) -> Result<Vec<RoyaltyOverride>>;

    /// Both tables loaded for one calculation pass
    async fn load_snapshot(&self) -> Result<OverrideSnapshot> {
        Ok(OverrideSnapshot::from_overrides(
            self.list_shares().await?,
            self.list_royalties().await?,
        ))
    }
}

/// Prepend the `"all"` sentinel to sorted period labels
pub(crate) fn with_all_sentinel(mut periods: Vec<String>) -> Vec<String> {
    periods.retain(|p| p != ALL_PERIODS);
    periods.sort();
    periods.dedup();
    periods.insert(0, ALL_PERIODS.to_string());
    periods
}
