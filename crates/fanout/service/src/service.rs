//! Public service surface.

use color_eyre::eyre::WrapErr as _;
use fanout_core::{Platform, PushContent, Subscription};
use fanout_storage::{SqliteStorage, SubscriptionStorage};
use fanout_transport::{Broker, Transport, TransportConfig};

use crate::{Clock, Config, DispatchSummary, Dispatcher, SubscriptionStore, SystemClock, event_handler};

/// Push fan-out service: subscription management plus dispatch.
pub struct FanoutService<S, T, C = SystemClock> {
    store: SubscriptionStore<S>,
    dispatcher: Dispatcher<S, T, C>,
}

impl<S: Clone, T> FanoutService<S, T> {
    /// Create a new service over `storage` sending through `transport`.
    pub fn new(storage: S, transport: T) -> Self {
        Self::with_clock(storage, transport, SystemClock)
    }
}

impl<S: Clone, T, C> FanoutService<S, T, C> {
    /// Create a new service with an explicit clock.
    pub fn with_clock(storage: S, transport: T, clock: C) -> Self {
        Self {
            store: SubscriptionStore::new(storage.clone()),
            dispatcher: Dispatcher::with_clock(storage, transport, clock),
        }
    }

    pub fn store(&self) -> &SubscriptionStore<S> {
        &self.store
    }

    pub fn transport(&self) -> &T {
        self.dispatcher.transport()
    }
}

impl<S> FanoutService<S, Broker>
where
    S: SubscriptionStorage + Clone + 'static,
{
    /// Start a push broker wired back into `storage` for token cleanup.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(storage: S, config: &TransportConfig) -> color_eyre::eyre::Result<Self> {
        let handler = event_handler(SubscriptionStore::new(storage.clone()));
        let broker = Broker::from_config(config, handler).wrap_err("failed to start push broker")?;

        Ok(Self::new(storage, broker))
    }
}

impl FanoutService<SqliteStorage, Broker> {
    /// Open the configured database and start the push broker.
    pub fn from_config(config: &Config) -> color_eyre::eyre::Result<Self> {
        let storage =
            SqliteStorage::new(&config.database_url).wrap_err("failed to initialize storage")?;

        storage
            .run_migrations()
            .wrap_err("failed to run migrations")?;

        Self::start(storage, &config.transport)
    }
}

impl<S, T, C> FanoutService<S, T, C>
where
    S: SubscriptionStorage,
    T: Transport,
    C: Clock,
{
    /// Register a device token for a user.
    pub fn add_subscription(
        &self,
        user_id: &str,
        platform: Platform,
        token: &str,
    ) -> color_eyre::eyre::Result<()> {
        self.store.add(user_id, platform, token)
    }

    /// Unregister a device token.
    pub fn remove_subscription(&self, token: &str) -> color_eyre::eyre::Result<Option<Subscription>> {
        self.store.remove(token)
    }

    /// Move a registration from one token to another.
    pub fn change_subscription(
        &self,
        old_token: &str,
        new_token: &str,
    ) -> color_eyre::eyre::Result<()> {
        self.store.change_token(old_token, new_token)
    }

    /// Push to all devices of one user.
    pub fn push(
        &self,
        user_id: &str,
        object_id: &str,
        kind: &str,
        message: &str,
        badge: Option<u32>,
    ) -> color_eyre::eyre::Result<DispatchSummary> {
        let content = PushContent {
            object_id,
            kind,
            message,
            badge,
        };
        self.dispatcher.push_to_user(user_id, &content)
    }

    /// Push to all devices of all users from bucket `start` up to bucket `end`.
    ///
    /// Fails if either bucket is out of range.
    pub fn push_range(
        &self,
        start: u32,
        end: u32,
        object_id: &str,
        kind: &str,
        message: &str,
    ) -> color_eyre::eyre::Result<DispatchSummary> {
        let content = PushContent {
            object_id,
            kind,
            message,
            badge: None,
        };
        self.dispatcher.push_to_range(start, end, &content)
    }

    /// Stop the transport.
    pub fn dispose(&self) {
        self.dispatcher.transport().shutdown();
    }
}
