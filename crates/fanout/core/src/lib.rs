//! Fan-out Core Types
//!
//! Subscription model, key derivation and per-platform payload construction
//! for the push fan-out service. Nothing in here performs I/O.

mod keys;
mod notification;
mod payload;
mod subscription;

pub use keys::*;
pub use notification::*;
pub use payload::*;
pub use subscription::*;
