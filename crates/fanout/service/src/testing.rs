//! Test doubles.

use std::sync::{Arc, Mutex};

use chrono::TimeZone as _;
use fanout_core::{Notification, Platform};
use fanout_transport::Transport;

use crate::Clock;

/// Transport that records what it was asked to send.
#[derive(Clone)]
pub struct RecordingTransport {
    enabled: Vec<Platform>,
    sent: Arc<Mutex<Vec<Notification>>>,
    stopped: Arc<Mutex<bool>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::with_platforms(&[Platform::Ios, Platform::Android])
    }

    pub fn with_platforms(enabled: &[Platform]) -> Self {
        Self {
            enabled: enabled.to_vec(),
            sent: Arc::default(),
            stopped: Arc::default(),
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock().unwrap()
    }
}

impl Transport for RecordingTransport {
    fn is_enabled(&self, platform: Platform) -> bool {
        self.enabled.contains(&platform)
    }

    fn send(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }

    fn shutdown(&self) {
        *self.stopped.lock().unwrap() = true;
    }
}

/// Clock pinned to 2024-05-06T07:08:09Z.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap()
    }
}
