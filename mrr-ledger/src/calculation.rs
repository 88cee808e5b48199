//! Royalty calculation engine
//!
//! For one usage record:
//! ```text
//! effective_revenue = revenue * (1 - tax/100)       if apply_tax, else revenue
//! artist_revenue    = effective_revenue * share/100
//! licensor_payment  = artist_revenue * royalty_percent/100
//! ```
//! The chain is computed unrounded; the three amounts are rounded to cents at the end.
//! Absent overrides default to a 100 % share and a 50 % royalty.

use crate::overrides::validate_percent;
use mrr_common::config::DEFAULT_TAX_PERCENT;
use mrr_common::db::{UsageRecord, DEFAULT_ARTIST_SHARE, DEFAULT_ROYALTY_PERCENT};
use mrr_common::{round_money, Result};
use serde::Serialize;

/// Point lookups of the two override tables
pub trait OverrideLookup {
    fn share(&self, artist: &str, track_name: &str) -> Option<f64>;
    fn royalty_percent(&self, artist: &str, track_name: &str) -> Option<f64>;
}

/// Tax deducted from revenue when requested
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxRate(f64);

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate(DEFAULT_TAX_PERCENT)
    }
}

impl TaxRate {
    pub fn new(percent: f64) -> Result<Self> {
        validate_percent("tax_percent", percent).map(TaxRate)
    }

    pub fn percent(&self) -> f64 {
        self.0
    }

    fn apply(&self, revenue: f64) -> f64 {
        revenue * (1.0 - self.0 / 100.0)
    }
}

/// Computed values for one record
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalculationResult {
    pub artist_share: f64,
    pub royalty_percent: f64,
    pub artist_revenue: f64,
    pub licensor_payment: f64,
    pub effective_revenue: f64,
    pub has_settings: bool,
}

impl CalculationResult {
    /// Track has never been configured
    pub fn is_new(&self) -> bool {
        !self.has_settings
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Calculator {
    tax: TaxRate,
}

impl Calculator {
    pub fn new(tax: TaxRate) -> Self {
        Self { tax }
    }

    pub fn tax(&self) -> TaxRate {
        self.tax
    }

    pub fn compute(
        &self,
        record: &UsageRecord,
        overrides: &impl OverrideLookup,
        apply_tax: bool,
    ) -> CalculationResult {
        let share = overrides.share(&record.artist, &record.track_name);
        let royalty = overrides.royalty_percent(&record.artist, &record.track_name);

        let artist_share = share.unwrap_or(DEFAULT_ARTIST_SHARE);
        let royalty_percent = royalty.unwrap_or(DEFAULT_ROYALTY_PERCENT);

        let effective_revenue = if apply_tax {
            self.tax.apply(record.revenue)
        } else {
            record.revenue
        };
        let artist_revenue = effective_revenue * (artist_share / 100.0);
        let licensor_payment = artist_revenue * (royalty_percent / 100.0);

        CalculationResult {
            artist_share,
            royalty_percent,
            artist_revenue: round_money(artist_revenue),
            licensor_payment: round_money(licensor_payment),
            effective_revenue: round_money(effective_revenue),
            has_settings: share.is_some() || royalty.is_some(),
        }
    }
}
