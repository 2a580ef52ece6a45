//! Provider-specific notifications handed to the transport.

use crate::Platform;

/// Custom fields attached to every notification.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NotificationFields {
    /// Id of the object the notification is about.
    #[serde(rename = "objectId")]
    pub object_id: String,
    /// Application-defined notification type.
    #[serde(rename = "type")]
    pub kind: String,
    /// UTC send time, `%Y-%m-%dT%H:%M:%S`.
    pub time: String,
}

/// APNs notification for a single device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApnsNotification {
    pub device_token: String,
    /// Alert body, already truncated.
    pub alert: String,
    pub badge: Option<u32>,
    pub fields: NotificationFields,
}

/// GCM notification for a group of devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcmNotification {
    pub registration_ids: Vec<String>,
    /// Lets GCM coalesce pending notifications of the same type per device.
    pub collapse_key: String,
    /// Serialized JSON data object.
    pub json_data: String,
}

/// Notification queued on the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Apns(ApnsNotification),
    Gcm(GcmNotification),
}

impl Notification {
    pub fn platform(&self) -> Platform {
        match self {
            Notification::Apns(_) => Platform::Ios,
            Notification::Gcm(_) => Platform::Android,
        }
    }

    /// Device tokens this notification targets.
    pub fn tokens(&self) -> Vec<&str> {
        match self {
            Notification::Apns(n) => vec![n.device_token.as_str()],
            Notification::Gcm(n) => n.registration_ids.iter().map(String::as_str).collect(),
        }
    }
}

impl From<ApnsNotification> for Notification {
    fn from(n: ApnsNotification) -> Self {
        Notification::Apns(n)
    }
}

impl From<GcmNotification> for Notification {
    fn from(n: GcmNotification) -> Self {
        Notification::Gcm(n)
    }
}
