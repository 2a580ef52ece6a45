//! Fan-out Service Layer
//!
//! Subscription lifecycle, push dispatch and transport event handling.

mod config;
mod dispatch;
mod events;
mod service;
mod store;
#[cfg(test)]
mod testing;

pub use config::*;
pub use dispatch::*;
pub use events::*;
pub use service::*;
pub use store::*;
