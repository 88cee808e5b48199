//! In-memory implementation of the storage ports

use super::{with_all_sentinel, InsertOutcome, OverrideStore, RecordQuery, ReportStore};
use async_trait::async_trait;
use mrr_common::db::{NewUsageRecord, RoyaltyOverride, TrackShareOverride, UsageRecord};
use mrr_common::time::now;
use mrr_common::{Error, Result};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

type DedupKey = (String, String, String, String);
type PairKey = (String, String);

#[derive(Debug, Default)]
struct State {
    records: Vec<UsageRecord>,
    keys: HashSet<DedupKey>,
    shares: BTreeMap<PairKey, TrackShareOverride>,
    royalties: BTreeMap<PairKey, RoyaltyOverride>,
}

/// Process-local store; contents vanish with the value
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| Error::Internal("memory store lock poisoned".to_string()))
    }
}

fn pair(artist: &str, track_name: &str) -> PairKey {
    (artist.to_string(), track_name.to_string())
}

fn put_share(state: &mut State, artist: &str, track_name: &str, share: f64) {
    state.shares.insert(
        pair(artist, track_name),
        TrackShareOverride {
            artist: artist.to_string(),
            track_name: track_name.to_string(),
            share,
            updated_at: now(),
        },
    );
}

fn put_royalty(state: &mut State, artist: &str, track_name: &str, royalty_percent: f64) {
    state.royalties.insert(
        pair(artist, track_name),
        RoyaltyOverride {
            artist: artist.to_string(),
            track_name: track_name.to_string(),
            royalty_percent,
            updated_at: now(),
        },
    );
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn insert_if_absent(&self, record: &NewUsageRecord) -> Result<InsertOutcome> {
        let mut state = self.state()?;
        let key = (
            record.period.clone(),
            record.artist.clone(),
            record.track_name.clone(),
            record.platform.clone(),
        );
        if !state.keys.insert(key) {
            return Ok(InsertOutcome::Skipped);
        }

        let id = state.records.len() as i64 + 1;
        state.records.push(record.clone().into_record(id, now()));
        Ok(InsertOutcome::Inserted(id))
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<UsageRecord>> {
        let state = self.state()?;
        let mut records: Vec<UsageRecord> = state
            .records
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            (&a.artist, &a.track_name, a.id).cmp(&(&b.artist, &b.track_name, b.id))
        });
        Ok(records)
    }

    async fn distinct_periods(&self) -> Result<Vec<String>> {
        let state = self.state()?;
        Ok(with_all_sentinel(
            state.records.iter().map(|r| r.period.clone()).collect(),
        ))
    }

    async fn get_record(&self, id: i64) -> Result<Option<UsageRecord>> {
        let state = self.state()?;
        Ok(state.records.iter().find(|r| r.id == id).cloned())
    }

    async fn pair_exists(&self, artist: &str, track_name: &str) -> Result<bool> {
        let state = self.state()?;
        Ok(state
            .records
            .iter()
            .any(|r| r.artist == artist && r.track_name == track_name))
    }

    async fn count_records(&self) -> Result<i64> {
        Ok(self.state()?.records.len() as i64)
    }
}

#[async_trait]
impl OverrideStore for MemoryStore {
    async fn get_share(&self, artist: &str, track_name: &str) -> Result<Option<TrackShareOverride>> {
        Ok(self.state()?.shares.get(&pair(artist, track_name)).cloned())
    }

    async fn upsert_share(&self, artist: &str, track_name: &str, share: f64) -> Result<()> {
        let mut state = self.state()?;
        put_share(&mut state, artist, track_name, share);
        Ok(())
    }

    async fn get_royalty(&self, artist: &str, track_name: &str) -> Result<Option<RoyaltyOverride>> {
        Ok(self.state()?.royalties.get(&pair(artist, track_name)).cloned())
    }

    async fn upsert_royalty(
        &self,
        artist: &str,
        track_name: &str,
        royalty_percent: f64,
    ) -> Result<()> {
        let mut state = self.state()?;
        put_royalty(&mut state, artist, track_name, royalty_percent);
        Ok(())
    }

    async fn upsert_track_settings(
        &self,
        artist: &str,
        track_name: &str,
        share: f64,
        royalty_percent: f64,
    ) -> Result<()> {
        let mut state = self.state()?;
        put_share(&mut state, artist, track_name, share);
        put_royalty(&mut state, artist, track_name, royalty_percent);
        Ok(())
    }

    async fn list_shares(&self) -> Result<Vec<TrackShareOverride>> {
        Ok(self.state()?.shares.values().cloned().collect())
    }

    async fn list_royalties(&self) -> Result<Vec<RoyaltyOverride>> {
        Ok(self.state()?.royalties.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upserts_replace_previous_values() {
        let store = MemoryStore::new();
        store.upsert_share("Alice", "Song", 70.0).await.unwrap();
        store.upsert_share("Alice", "Song", 40.0).await.unwrap();
        store.upsert_royalty("Alice", "Song", 25.0).await.unwrap();
        store.upsert_royalty("Alice", "Song", 30.0).await.unwrap();

        assert_eq!(store.get_share("Alice", "Song").await.unwrap().unwrap().share, 40.0);
        assert_eq!(
            store.get_royalty("Alice", "Song").await.unwrap().unwrap().royalty_percent,
            30.0
        );
        assert_eq!(store.list_shares().await.unwrap().len(), 1);
        assert_eq!(store.list_royalties().await.unwrap().len(), 1);
    }
}
