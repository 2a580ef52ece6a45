//! In-memory storage implementation.
//!
//! Ordered maps keyed by `(partition_key, row_key)`, mirroring the
//! SQLite tables. Useful for tests and single-process deployments.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use fanout_core::RangeBounds;

use crate::models::*;
use crate::traits::*;

type Key = (String, String);

#[derive(Default)]
struct Tables {
    tokens: BTreeMap<Key, TokenRow>,
    users: BTreeMap<Key, UserRow>,
}

/// In-memory storage.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> color_eyre::eyre::Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| color_eyre::eyre::eyre!("storage lock poisoned"))
    }

    /// Number of rows in the by-token index.
    pub fn token_row_count(&self) -> color_eyre::eyre::Result<usize> {
        Ok(self.lock()?.tokens.len())
    }

    /// Number of rows in the by-user index.
    pub fn user_row_count(&self) -> color_eyre::eyre::Result<usize> {
        Ok(self.lock()?.users.len())
    }
}

fn insert<R: Clone>(
    map: &mut BTreeMap<Key, R>,
    key: Key,
    row: &R,
    overwrite: bool,
) -> color_eyre::eyre::Result<()> {
    if !overwrite && map.contains_key(&key) {
        color_eyre::eyre::bail!("row ({}, {}) already exists", key.0, key.1);
    }
    map.insert(key, row.clone());
    Ok(())
}

fn partition<R: Clone>(map: &BTreeMap<Key, R>, partition_key: &str) -> Vec<R> {
    map.range((partition_key.to_string(), String::new())..)
        .take_while(|((pk, _), _)| pk == partition_key)
        .map(|(_, row)| row.clone())
        .collect()
}

fn delete<R>(map: &mut BTreeMap<Key, R>, partition_key: &str, row_key: &str) -> DeleteOutcome {
    match map.remove(&(partition_key.to_string(), row_key.to_string())) {
        Some(_) => DeleteOutcome::Deleted,
        None => DeleteOutcome::NotFound,
    }
}

impl TokenIndex for MemoryStorage {
    fn insert_token_row(&self, row: &TokenRow, overwrite: bool) -> color_eyre::eyre::Result<()> {
        let key = (row.partition_key.clone(), row.row_key.clone());
        insert(&mut self.lock()?.tokens, key, row, overwrite)
    }

    fn token_rows(&self, normalized_token: &str) -> color_eyre::eyre::Result<Vec<TokenRow>> {
        Ok(partition(&self.lock()?.tokens, normalized_token))
    }

    fn delete_token_row(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> color_eyre::eyre::Result<DeleteOutcome> {
        Ok(delete(&mut self.lock()?.tokens, partition_key, row_key))
    }
}

impl UserIndex for MemoryStorage {
    fn insert_user_row(&self, row: &UserRow, overwrite: bool) -> color_eyre::eyre::Result<()> {
        let key = (row.partition_key.clone(), row.row_key.clone());
        insert(&mut self.lock()?.users, key, row, overwrite)
    }

    fn user_rows(&self, bucket_key: &str) -> color_eyre::eyre::Result<Vec<UserRow>> {
        Ok(partition(&self.lock()?.users, bucket_key))
    }

    fn user_rows_in_range(&self, bounds: &RangeBounds) -> color_eyre::eyre::Result<Vec<UserRow>> {
        let tables = self.lock()?;

        Ok(tables
            .users
            .range((bounds.low.clone(), String::new())..)
            .take_while(|((pk, _), _)| pk.as_str() < bounds.high.as_str())
            .filter(|((pk, _), _)| bounds.contains(pk))
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn delete_user_row(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> color_eyre::eyre::Result<DeleteOutcome> {
        Ok(delete(&mut self.lock()?.users, partition_key, row_key))
    }
}
