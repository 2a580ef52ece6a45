//! Push transport traits.

use fanout_core::{Notification, Platform};

use crate::TransportEvent;

/// Fire-and-forget notification queue.
pub trait Transport: Send + Sync {
    /// Whether notifications for `platform` can be delivered by this instance.
    fn is_enabled(&self, platform: Platform) -> bool;

    /// Queue a notification. Failures are reported asynchronously.
    fn send(&self, notification: Notification);

    /// Stop accepting notifications and release provider resources.
    fn shutdown(&self);
}

/// Low-level delivery to one push provider.
#[trait_variant::make(Send)]
pub trait Provider: Send + Sync {
    type Notification: Send + Sync;

    /// Deliver a notification, returning the events it produced.
    async fn deliver(&self, notification: &Self::Notification) -> Vec<TransportEvent>;
}
