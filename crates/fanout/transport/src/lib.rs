//! Fan-out Push Transport
//!
//! Queues provider-specific notifications and delivers them to APNs and GCM
//! in the background. Delivery outcomes that affect subscriptions (expired or
//! rotated tokens) and failures are reported through an injected
//! [`EventHandler`], never returned to the caller of [`Transport::send`].

mod apns;
mod broker;
mod config;
mod event;
mod gcm;
mod traits;

pub use apns::*;
pub use broker::*;
pub use config::*;
pub use event::*;
pub use gcm::*;
pub use traits::*;
