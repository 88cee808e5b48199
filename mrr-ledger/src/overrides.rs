//! Per-track override handling
//!
//! Validation of share / royalty percent input, the in-memory snapshot used
//! by the calculator, and parsing of bulk `"artist - track"` lists.

use crate::calculation::OverrideLookup;
use mrr_common::db::{RoyaltyOverride, TrackShareOverride};
use mrr_common::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;

pub const ARTIST_SHARE_FIELD: &str = "artist_share";
pub const ROYALTY_PERCENT_FIELD: &str = "royalty_percent";

/// Separator between artist and track in bulk lists
pub const TRACK_LINE_SEPARATOR: &str = " - ";

/// Natural identity of a track across periods and platforms
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TrackKey {
    pub artist: String,
    pub track_name: String,
}

impl TrackKey {
    pub fn new(artist: impl Into<String>, track_name: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            track_name: track_name.into(),
        }
    }
}

/// Parse a user-supplied percentage
///
/// Accepts a decimal comma. Non-numeric or non-finite input is
/// [`Error::MalformedFieldValue`]; values outside 0..=100 are [`Error::OutOfRangeValue`].
pub fn parse_percent(field: &str, text: &str) -> Result<f64> {
    let trimmed = text.trim();
    let value: f64 = trimmed
        .replace(',', ".")
        .parse()
        .map_err(|_| Error::malformed(field, text))?;
    validate_percent(field, value)
}

/// Range check for an already numeric percentage
pub fn validate_percent(field: &str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(Error::malformed(field, value.to_string()));
    }
    if !(0.0..=100.0).contains(&value) {
        return Err(Error::out_of_range(field, value));
    }
    Ok(value)
}

/// Result of splitting a bulk text list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTrackLines {
    pub keys: Vec<TrackKey>,
    /// Non-blank lines without a usable `artist - track` pair
    pub malformed: Vec<String>,
}

/// Split newline-separated `"artist - track"` lines
///
/// Blank lines are ignored. Each line is split on the first `" - "`, so track
/// names may themselves contain the separator.
pub fn parse_track_lines(text: &str) -> ParsedTrackLines {
    let mut parsed = ParsedTrackLines::default();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match line.split_once(TRACK_LINE_SEPARATOR) {
            Some((artist, track)) if !artist.trim().is_empty() && !track.trim().is_empty() => {
                parsed.keys.push(TrackKey::new(artist.trim(), track.trim()));
            }
            _ => parsed.malformed.push(line.to_string()),
        }
    }

    parsed
}

/// Outcome of a bulk royalty update from a text list
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkTextOutcome {
    pub applied: Vec<TrackKey>,
    /// Well-formed lines naming a pair absent from the report store
    pub unknown: Vec<TrackKey>,
    pub malformed: Vec<String>,
}

impl BulkTextOutcome {
    pub fn updated(&self) -> usize {
        self.applied.len()
    }
}

/// Both override tables loaded for a calculation pass
///
/// Keyed artist first, then track, so lookups borrow `&str` without building a key.
#[derive(Debug, Clone, Default)]
pub struct OverrideSnapshot {
    shares: HashMap<String, HashMap<String, f64>>,
    royalties: HashMap<String, HashMap<String, f64>>,
}

impl OverrideSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_overrides(shares: Vec<TrackShareOverride>, royalties: Vec<RoyaltyOverride>) -> Self {
        let mut snapshot = Self::new();
        for s in shares {
            snapshot.insert_share(s.artist, s.track_name, s.share);
        }
        for r in royalties {
            snapshot.insert_royalty(r.artist, r.track_name, r.royalty_percent);
        }
        snapshot
    }

    pub fn insert_share(&mut self, artist: String, track_name: String, share: f64) {
        self.shares.entry(artist).or_default().insert(track_name, share);
    }

    pub fn insert_royalty(&mut self, artist: String, track_name: String, royalty_percent: f64) {
        self.royalties
            .entry(artist)
            .or_default()
            .insert(track_name, royalty_percent);
    }

    pub fn share_count(&self) -> usize {
        self.shares.values().map(HashMap::len).sum()
    }

    pub fn royalty_count(&self) -> usize {
        self.royalties.values().map(HashMap::len).sum()
    }
}

impl OverrideLookup for OverrideSnapshot {
    fn share(&self, artist: &str, track_name: &str) -> Option<f64> {
        self.shares.get(artist)?.get(track_name).copied()
    }

    fn royalty_percent(&self, artist: &str, track_name: &str) -> Option<f64> {
        self.royalties.get(artist)?.get(track_name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_percent_accepts_range_bounds() {
        assert_eq!(parse_percent(ROYALTY_PERCENT_FIELD, "0").unwrap(), 0.0);
        assert_eq!(parse_percent(ROYALTY_PERCENT_FIELD, " 100 ").unwrap(), 100.0);
        assert_eq!(parse_percent(ARTIST_SHARE_FIELD, "33,5").unwrap(), 33.5);
    }

    #[test]
    fn test_parse_percent_rejects_garbage() {
        let err = parse_percent(ROYALTY_PERCENT_FIELD, "thirty").unwrap_err();
        assert!(matches!(err, Error::MalformedFieldValue { .. }));

        let err = parse_percent(ROYALTY_PERCENT_FIELD, "NaN").unwrap_err();
        assert!(matches!(err, Error::MalformedFieldValue { .. }));

        let err = parse_percent(ROYALTY_PERCENT_FIELD, "").unwrap_err();
        assert!(matches!(err, Error::MalformedFieldValue { .. }));
    }

    #[test]
    fn test_parse_percent_rejects_out_of_range() {
        let err = parse_percent(ARTIST_SHARE_FIELD, "100.01").unwrap_err();
        assert!(matches!(err, Error::OutOfRangeValue { .. }));

        let err = validate_percent(ARTIST_SHARE_FIELD, -1.0).unwrap_err();
        assert!(matches!(err, Error::OutOfRangeValue { .. }));
    }

    #[test]
    fn test_parse_track_lines() {
        let parsed = parse_track_lines("Alice - Song One\n\n  Bob - Song - Two  \nno separator\n - Orphan\n");
        assert_eq!(
            parsed.keys,
            vec![
                TrackKey::new("Alice", "Song One"),
                TrackKey::new("Bob", "Song - Two"),
            ]
        );
        assert_eq!(parsed.malformed, vec!["no separator", "- Orphan"]);
    }

    #[test]
    fn test_parse_track_lines_handles_crlf() {
        let parsed = parse_track_lines("Alice - Song One\r\nBob - Song Two\r\n");
        assert_eq!(parsed.keys.len(), 2);
        assert_eq!(parsed.keys[1], TrackKey::new("Bob", "Song Two"));
    }

    #[test]
    fn test_snapshot_lookup() {
        let mut snapshot = OverrideSnapshot::new();
        snapshot.insert_share("Alice".into(), "Song".into(), 50.0);
        snapshot.insert_royalty("Bob".into(), "Tune".into(), 20.0);

        assert_eq!(snapshot.share("Alice", "Song"), Some(50.0));
        assert_eq!(snapshot.share("Alice", "Other"), None);
        assert_eq!(snapshot.royalty_percent("Alice", "Song"), None);
        assert_eq!(snapshot.royalty_percent("Bob", "Tune"), Some(20.0));
        assert_eq!(snapshot.share_count(), 1);
        assert_eq!(snapshot.royalty_count(), 1);
    }
}
