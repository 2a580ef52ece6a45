//! Subscription lifecycle over the two storage indexes.
//!
//! Every live subscription has one by-token row and one by-user row. The
//! rows are never updated in place: each transition removes rows and inserts
//! new ones. The two indexes are not written atomically, so deletes are
//! best-effort and inserts overwrite, which lets a retried call converge.

use color_eyre::eyre::WrapErr as _;
use fanout_core::{BucketKey, Platform, Subscription, normalize_token};
use fanout_storage::{
    DeleteOutcome, SubscriptionStorage, TokenIndex as _, TokenRow, UserIndex as _, UserRow,
};

/// Maintains both subscription indexes.
#[derive(Clone)]
pub struct SubscriptionStore<S> {
    storage: S,
}

impl<S> SubscriptionStore<S> {
    /// Create a new subscription store.
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }
}

impl<S: SubscriptionStorage> SubscriptionStore<S> {
    /// Register `token` for `user_id`.
    ///
    /// A token already registered to another user is released from that
    /// user first. Registering the same token for the same user again is a
    /// no-op.
    pub fn add(
        &self,
        user_id: &str,
        platform: Platform,
        token: &str,
    ) -> color_eyre::eyre::Result<()> {
        let normalized = normalize_token(token);
        let existing = self
            .storage
            .token_rows(&normalized)
            .wrap_err("failed to look up token")?;

        let registered = existing
            .iter()
            .any(|row| row.user_id == user_id && row.token == token);

        for row in existing
            .iter()
            .filter(|row| !(row.user_id == user_id && row.token == token))
        {
            if row.user_id != user_id {
                tracing::info!(
                    token = %token,
                    previous_user_id = %row.user_id,
                    user_id = %user_id,
                    "transferring token to new user"
                );
                self.delete_user_row(&row.user_id, &normalized)?;
            }
            self.delete_token_row(row)?;
        }

        if registered {
            tracing::debug!(user_id = %user_id, token = %token, "subscription already registered");
            return Ok(());
        }

        let subscription = Subscription::new(user_id, platform, token);
        let row_key = uuid::Uuid::new_v4().simple().to_string();

        self.storage
            .insert_token_row(&TokenRow::new(&subscription, row_key), true)
            .wrap_err("failed to insert token subscription")?;
        self.storage
            .insert_user_row(&UserRow::new(&subscription), true)
            .wrap_err("failed to insert user subscription")?;

        tracing::info!(user_id = %user_id, %platform, token = %token, "subscription added");

        Ok(())
    }

    /// Unregister `token`, returning the subscription it belonged to.
    pub fn remove(&self, token: &str) -> color_eyre::eyre::Result<Option<Subscription>> {
        let normalized = normalize_token(token);
        let rows = self
            .storage
            .token_rows(&normalized)
            .wrap_err("failed to look up token")?;

        let Some(found) = rows
            .iter()
            .find(|row| row.token == token)
            .or_else(|| rows.first())
        else {
            tracing::debug!(token = %token, "token not registered");
            return Ok(None);
        };
        let removed = found.subscription()?;

        for row in &rows {
            self.delete_user_row(&row.user_id, &normalized)?;
            self.delete_token_row(row)?;
        }

        tracing::info!(user_id = %removed.user_id, token = %token, "subscription removed");

        Ok(Some(removed))
    }

    /// Move the subscription for `old_token` to `new_token`.
    ///
    /// Does nothing if `old_token` is not registered.
    pub fn change_token(&self, old_token: &str, new_token: &str) -> color_eyre::eyre::Result<()> {
        let Some(removed) = self.remove(old_token)? else {
            tracing::debug!(old_token = %old_token, "token to change not registered");
            return Ok(());
        };

        self.add(&removed.user_id, removed.platform, new_token)?;

        tracing::info!(
            user_id = %removed.user_id,
            old_token = %old_token,
            new_token = %new_token,
            "subscription token changed"
        );

        Ok(())
    }

    /// All subscriptions registered for `user_id`.
    pub fn subscriptions_for(&self, user_id: &str) -> color_eyre::eyre::Result<Vec<Subscription>> {
        self.storage
            .user_rows(BucketKey::for_user(user_id).as_str())
            .wrap_err("failed to look up user subscriptions")?
            .iter()
            .map(UserRow::subscription)
            .collect()
    }

    fn delete_user_row(&self, user_id: &str, normalized: &str) -> color_eyre::eyre::Result<()> {
        let key = BucketKey::for_user(user_id);
        let outcome = self
            .storage
            .delete_user_row(key.as_str(), normalized)
            .wrap_err("failed to delete user subscription")?;

        if outcome == DeleteOutcome::NotFound {
            tracing::debug!(user_id = %user_id, token = %normalized, "user subscription already gone");
        }
        Ok(())
    }

    fn delete_token_row(&self, row: &TokenRow) -> color_eyre::eyre::Result<()> {
        let outcome = self
            .storage
            .delete_token(row)
            .wrap_err("failed to delete token subscription")?;

        if outcome == DeleteOutcome::NotFound {
            tracing::debug!(token = %row.token, "token subscription already gone");
        }
        Ok(())
    }
}
