//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Artist share used when a track has no override
pub const DEFAULT_ARTIST_SHARE: f64 = 100.0;

/// Licensor percent used when a track has no override
pub const DEFAULT_ROYALTY_PERCENT: f64 = 50.0;

/// One stored usage line from an imported platform report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: i64,
    pub period: String,
    pub usage_period: String,
    pub platform: String,
    pub territory: String,
    pub content_type: String,
    pub usage_type: String,
    pub artist: String,
    pub track_name: String,
    pub plays: i64,
    pub revenue: f64,
    pub created_at: DateTime<Utc>,
}

/// A normalized row ready for insertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUsageRecord {
    pub period: String,
    pub usage_period: String,
    pub platform: String,
    pub territory: String,
    pub content_type: String,
    pub usage_type: String,
    pub artist: String,
    pub track_name: String,
    pub plays: i64,
    pub revenue: f64,
}

impl NewUsageRecord {
    /// Minimal record; optional text fields empty, usage_period equal to period
    pub fn new(
        period: impl Into<String>,
        artist: impl Into<String>,
        track_name: impl Into<String>,
    ) -> Self {
        let period = period.into();
        Self {
            usage_period: period.clone(),
            period,
            platform: String::new(),
            territory: String::new(),
            content_type: String::new(),
            usage_type: String::new(),
            artist: artist.into(),
            track_name: track_name.into(),
            plays: 0,
            revenue: 0.0,
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn with_plays(mut self, plays: i64) -> Self {
        self.plays = plays;
        self
    }

    pub fn with_revenue(mut self, revenue: f64) -> Self {
        self.revenue = revenue;
        self
    }

    /// Materialize as a stored record
    pub fn into_record(self, id: i64, created_at: DateTime<Utc>) -> UsageRecord {
        UsageRecord {
            id,
            period: self.period,
            usage_period: self.usage_period,
            platform: self.platform,
            territory: self.territory,
            content_type: self.content_type,
            usage_type: self.usage_type,
            artist: self.artist,
            track_name: self.track_name,
            plays: self.plays,
            revenue: self.revenue,
            created_at,
        }
    }
}

/// Artist ownership share of a track, in percent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackShareOverride {
    pub artist: String,
    pub track_name: String,
    pub share: f64,
    pub updated_at: DateTime<Utc>,
}

/// Percent of the artist revenue owed to the licensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoyaltyOverride {
    pub artist: String,
    pub track_name: String,
    pub royalty_percent: f64,
    pub updated_at: DateTime<Utc>,
}
