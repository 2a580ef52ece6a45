//! Transport events.

use std::sync::Arc;

use fanout_core::Notification;

/// Asynchronous outcome reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The provider no longer accepts this token.
    SubscriptionExpired { token: String },
    /// The provider issued a replacement token.
    SubscriptionChanged { old_token: String, new_token: String },
    /// Delivery of one notification failed.
    NotificationFailed {
        notification: Notification,
        error: String,
    },
    /// The provider connection itself failed.
    ServiceException { error: String },
}

/// Callback receiving transport events on the delivery task.
pub type EventHandler = Arc<dyn Fn(TransportEvent) + Send + Sync>;
