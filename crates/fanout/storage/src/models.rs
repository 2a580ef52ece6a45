//! Database models.
//!
//! Both indexes store the same `{user_id, token, platform}` payload under
//! different keys.

use diesel::prelude::*;
use fanout_core::{BucketKey, Platform, Subscription, normalize_token};

use crate::schema::{token_subscriptions, user_subscriptions};

/// By-token index row, keyed by `(normalized token, unique row id)`.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = token_subscriptions)]
pub struct TokenRow {
    pub partition_key: String,
    pub row_key: String,
    pub user_id: String,
    pub token: String,
    pub platform: String,
}

impl TokenRow {
    /// Build the by-token row for a subscription.
    pub fn new(subscription: &Subscription, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: normalize_token(&subscription.token),
            row_key: row_key.into(),
            user_id: subscription.user_id.clone(),
            token: subscription.token.clone(),
            platform: subscription.platform.as_str().to_string(),
        }
    }

    pub fn subscription(&self) -> color_eyre::eyre::Result<Subscription> {
        to_subscription(&self.user_id, &self.token, &self.platform)
    }
}

/// By-user index row, keyed by `(bucketed user id, normalized token)`.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = user_subscriptions)]
pub struct UserRow {
    pub partition_key: String,
    pub row_key: String,
    pub user_id: String,
    pub token: String,
    pub platform: String,
}

impl UserRow {
    /// Build the by-user row for a subscription.
    pub fn new(subscription: &Subscription) -> Self {
        Self {
            partition_key: BucketKey::for_user(&subscription.user_id).into_string(),
            row_key: normalize_token(&subscription.token),
            user_id: subscription.user_id.clone(),
            token: subscription.token.clone(),
            platform: subscription.platform.as_str().to_string(),
        }
    }

    pub fn subscription(&self) -> color_eyre::eyre::Result<Subscription> {
        to_subscription(&self.user_id, &self.token, &self.platform)
    }
}

fn to_subscription(
    user_id: &str,
    token: &str,
    platform: &str,
) -> color_eyre::eyre::Result<Subscription> {
    let platform: Platform = platform.parse()?;
    Ok(Subscription::new(user_id, platform, token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_share_payload_under_different_keys() {
        let sub = Subscription::new("alice", Platform::Ios, "<ab cd-12>");

        let by_token = TokenRow::new(&sub, "row1");
        assert_eq!(by_token.partition_key, "abcd12");
        assert_eq!(by_token.row_key, "row1");

        let by_user = UserRow::new(&sub);
        assert_eq!(by_user.partition_key, BucketKey::for_user("alice").as_str());
        assert_eq!(by_user.row_key, "abcd12");

        assert_eq!(by_token.subscription().unwrap(), sub);
        assert_eq!(by_user.subscription().unwrap(), sub);
    }
}
