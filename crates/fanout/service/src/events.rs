//! Transport event handling.
//!
//! Expired and rotated tokens feed back into the subscription store. Nothing
//! here returns an error: failures are logged so the transport's delivery
//! loop keeps running.

use std::sync::Arc;

use fanout_storage::SubscriptionStorage;
use fanout_transport::{EventHandler, TransportEvent};

use crate::SubscriptionStore;

/// Build the transport callback for `store`.
pub fn event_handler<S>(store: SubscriptionStore<S>) -> EventHandler
where
    S: SubscriptionStorage + 'static,
{
    Arc::new(move |event| handle_event(&store, event))
}

/// Apply one transport event.
pub fn handle_event<S: SubscriptionStorage>(store: &SubscriptionStore<S>, event: TransportEvent) {
    match event {
        TransportEvent::SubscriptionExpired { token } => {
            tracing::info!(token = %token, "subscription expired");
            if let Err(e) = store.remove(&token) {
                tracing::error!(token = %token, error = ?e, "failed to remove expired subscription");
            }
        }
        TransportEvent::SubscriptionChanged {
            old_token,
            new_token,
        } => {
            tracing::info!(old_token = %old_token, new_token = %new_token, "subscription changed");
            if let Err(e) = store.change_token(&old_token, &new_token) {
                tracing::error!(
                    old_token = %old_token,
                    new_token = %new_token,
                    error = ?e,
                    "failed to change subscription"
                );
            }
        }
        TransportEvent::NotificationFailed {
            notification,
            error,
        } => {
            tracing::error!(
                platform = %notification.platform(),
                tokens = ?notification.tokens(),
                error = %error,
                "notification failed"
            );
        }
        TransportEvent::ServiceException { error } => {
            tracing::error!(error = %error, "push service exception");
        }
    }
}
