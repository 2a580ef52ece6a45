//! Push dispatch to a user or a bucket range.

use std::collections::BTreeMap;

use color_eyre::eyre::WrapErr as _;
use fanout_core::{BucketKey, Platform, PushContent, build_apns, build_gcm, range_bounds};
use fanout_storage::{UserIndex, UserRow};
use fanout_transport::Transport;

/// Source of the send timestamp.
pub trait Clock: Send + Sync {
    fn now(&self) -> chrono::DateTime<chrono::Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::Utc::now()
    }
}

/// Outbound transport calls made by one push.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// One per iOS device.
    pub ios: usize,
    /// One per Android group.
    pub android: usize,
}

impl DispatchSummary {
    pub fn total(&self) -> usize {
        self.ios + self.android
    }
}

/// Resolves recipients and hands platform payloads to the transport.
pub struct Dispatcher<S, T, C = SystemClock> {
    storage: S,
    transport: T,
    clock: C,
}

impl<S, T> Dispatcher<S, T> {
    /// Create a new dispatcher using the wall clock.
    pub fn new(storage: S, transport: T) -> Self {
        Self::with_clock(storage, transport, SystemClock)
    }
}

impl<S, T, C> Dispatcher<S, T, C> {
    /// Create a new dispatcher with an explicit clock.
    pub fn with_clock(storage: S, transport: T, clock: C) -> Self {
        Self {
            storage,
            transport,
            clock,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<S, T, C> Dispatcher<S, T, C>
where
    S: UserIndex,
    T: Transport,
    C: Clock,
{
    /// Push to every device of one user.
    pub fn push_to_user(
        &self,
        user_id: &str,
        content: &PushContent<'_>,
    ) -> color_eyre::eyre::Result<DispatchSummary> {
        let key = BucketKey::for_user(user_id);
        let rows = self
            .storage
            .user_rows(key.as_str())
            .wrap_err("failed to look up user subscriptions")?;

        tracing::debug!(user_id = %user_id, recipients = rows.len(), "pushing to user");

        self.dispatch(rows, content)
    }

    /// Push to every device of every user from bucket `start` up to bucket `end`.
    ///
    /// The end bucket is only covered for user ids sorting below `|` (see
    /// [`fanout_core::RangeBounds`]). Buckets at or above
    /// [`fanout_core::BUCKET_COUNT`] are rejected. Broadcasts never carry a
    /// badge.
    pub fn push_to_range(
        &self,
        start: u32,
        end: u32,
        content: &PushContent<'_>,
    ) -> color_eyre::eyre::Result<DispatchSummary> {
        let bounds = range_bounds(start, end).wrap_err("invalid bucket range")?;
        let rows = self
            .storage
            .user_rows_in_range(&bounds)
            .wrap_err("failed to scan user subscriptions")?;

        tracing::debug!(start, end, recipients = rows.len(), "pushing to bucket range");

        let content = PushContent {
            badge: None,
            ..*content
        };
        self.dispatch(rows, &content)
    }

    fn dispatch(
        &self,
        rows: Vec<UserRow>,
        content: &PushContent<'_>,
    ) -> color_eyre::eyre::Result<DispatchSummary> {
        let mut summary = DispatchSummary::default();
        let now = self.clock.now();

        for (platform, tokens) in group_by_platform(rows) {
            if !self.transport.is_enabled(platform) {
                tracing::debug!(%platform, recipients = tokens.len(), "platform not enabled, skipping");
                continue;
            }

            match platform {
                Platform::Ios => {
                    for notification in build_apns(tokens.iter().map(String::as_str), content, now)
                    {
                        self.transport.send(notification.into());
                        summary.ios += 1;
                    }
                }
                Platform::Android => {
                    let notification = build_gcm(tokens, content, now)?;
                    self.transport.send(notification.into());
                    summary.android += 1;
                }
            }
        }

        tracing::info!(
            object_id = %content.object_id,
            kind = %content.kind,
            ios = summary.ios,
            android = summary.android,
            "push dispatched"
        );

        Ok(summary)
    }
}

/// Group recipient tokens by platform, skipping rows with an unknown platform.
fn group_by_platform(rows: Vec<UserRow>) -> BTreeMap<Platform, Vec<String>> {
    let mut groups: BTreeMap<Platform, Vec<String>> = BTreeMap::new();

    for row in rows {
        match row.platform.parse::<Platform>() {
            Ok(platform) => groups.entry(platform).or_default().push(row.token),
            Err(e) => {
                tracing::warn!(user_id = %row.user_id, token = %row.token, error = %e, "skipping subscription");
            }
        }
    }

    groups
}
