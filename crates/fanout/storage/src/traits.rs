//! Storage traits.

use fanout_core::RangeBounds;

use crate::{TokenRow, UserRow};

/// Result of a point delete.
///
/// A missing row is not an error: a racing cleanup may already have removed
/// it, and callers treat that as done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

impl DeleteOutcome {
    pub fn from_count(count: usize) -> Self {
        if count == 0 {
            DeleteOutcome::NotFound
        } else {
            DeleteOutcome::Deleted
        }
    }
}

/// By-token index operations.
pub trait TokenIndex: Send + Sync {
    /// Insert a row, replacing an existing row with the same key if `overwrite` is set.
    fn insert_token_row(&self, row: &TokenRow, overwrite: bool) -> color_eyre::eyre::Result<()>;

    /// All rows in a normalized-token partition, ordered by row key.
    fn token_rows(&self, normalized_token: &str) -> color_eyre::eyre::Result<Vec<TokenRow>>;

    /// Delete a row by key.
    fn delete_token_row(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> color_eyre::eyre::Result<DeleteOutcome>;

    /// Delete a previously read row.
    fn delete_token(&self, row: &TokenRow) -> color_eyre::eyre::Result<DeleteOutcome> {
        self.delete_token_row(&row.partition_key, &row.row_key)
    }
}

/// By-user index operations.
pub trait UserIndex: Send + Sync {
    /// Insert a row, replacing an existing row with the same key if `overwrite` is set.
    fn insert_user_row(&self, row: &UserRow, overwrite: bool) -> color_eyre::eyre::Result<()>;

    /// All rows for one bucketed user key, ordered by row key.
    fn user_rows(&self, bucket_key: &str) -> color_eyre::eyre::Result<Vec<UserRow>>;

    /// All rows whose partition key falls strictly inside `bounds`, in key order.
    fn user_rows_in_range(&self, bounds: &RangeBounds) -> color_eyre::eyre::Result<Vec<UserRow>>;

    /// Delete a row by key.
    fn delete_user_row(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> color_eyre::eyre::Result<DeleteOutcome>;

    /// Delete a previously read row.
    fn delete_user(&self, row: &UserRow) -> color_eyre::eyre::Result<DeleteOutcome> {
        self.delete_user_row(&row.partition_key, &row.row_key)
    }
}

/// Combined storage trait.
pub trait SubscriptionStorage: TokenIndex + UserIndex {}

impl<T> SubscriptionStorage for T where T: TokenIndex + UserIndex {}
