//! Per-artist aggregation of computed rows

use crate::calculation::CalculationResult;
use mrr_common::db::UsageRecord;
use mrr_common::round_money;
use serde::Serialize;
use std::collections::HashMap;

/// A stored record with its computed values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputedRow {
    pub record: UsageRecord,
    pub calc: CalculationResult,
}

impl ComputedRow {
    pub fn is_new(&self) -> bool {
        self.calc.is_new()
    }
}

/// Sums over a group of rows
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    pub track_count: usize,
    pub new_tracks_count: usize,
    pub revenue: f64,
    pub artist_revenue: f64,
    pub licensor_payment: f64,
}

impl Totals {
    fn add(&mut self, row: &ComputedRow) {
        self.track_count += 1;
        if row.is_new() {
            self.new_tracks_count += 1;
        }
        self.revenue += row.calc.effective_revenue;
        self.artist_revenue += row.calc.artist_revenue;
        self.licensor_payment += row.calc.licensor_payment;
    }

    fn round(&mut self) {
        self.revenue = round_money(self.revenue);
        self.artist_revenue = round_money(self.artist_revenue);
        self.licensor_payment = round_money(self.licensor_payment);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistTotals {
    pub artist: String,
    #[serde(flatten)]
    pub totals: Totals,
}

/// Artist groups plus grand totals
///
/// `artists` keeps first-occurrence order of the input rows; use
/// [`sorted_by_artist`](Self::sorted_by_artist) for exports.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Aggregation {
    pub artists: Vec<ArtistTotals>,
    pub grand: Totals,
}

impl Aggregation {
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a ComputedRow>) -> Self {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut aggregation = Aggregation::default();

        for row in rows {
            let slot = *index.entry(row.record.artist.as_str()).or_insert_with(|| {
                aggregation.artists.push(ArtistTotals {
                    artist: row.record.artist.clone(),
                    totals: Totals::default(),
                });
                aggregation.artists.len() - 1
            });
            aggregation.artists[slot].totals.add(row);
            aggregation.grand.add(row);
        }

        for group in &mut aggregation.artists {
            group.totals.round();
        }
        aggregation.grand.round();
        aggregation
    }

    pub fn sorted_by_artist(&self) -> Vec<&ArtistTotals> {
        let mut sorted: Vec<&ArtistTotals> = self.artists.iter().collect();
        sorted.sort_by(|a, b| a.artist.cmp(&b.artist));
        sorted
    }

    pub fn is_empty(&self) -> bool {
        self.artists.is_empty()
    }
}
