//! Per-platform payload construction.
//!
//! Provider payload limits are in bytes, so alert text is cut on UTF-8 byte
//! length, one whole character at a time.

use color_eyre::eyre::WrapErr as _;

use crate::{ApnsNotification, GcmNotification, NotificationFields};

/// Maximum alert bytes for APNs (the full payload is capped at 256 bytes on older devices).
pub const IOS_ALERT_LIMIT: usize = 150;

/// Maximum alert bytes for GCM (the full payload is capped at 4 KiB).
pub const ANDROID_ALERT_LIMIT: usize = 4000;

/// Appended to an alert that was cut.
pub const ELLIPSIS: &str = "...";

/// Timestamp format for the `time` field.
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Longest prefix of `message` that fits in `max_bytes` without splitting a character.
pub fn truncate_utf8(message: &str, max_bytes: usize) -> &str {
    let mut end = 0;
    for c in message.chars() {
        let next = end + c.len_utf8();
        if next > max_bytes {
            break;
        }
        end = next;
    }
    &message[..end]
}

/// Cut `message` to `max_bytes` and mark it with [`ELLIPSIS`] if anything was dropped.
pub fn truncate_alert(message: &str, max_bytes: usize) -> String {
    let cut = truncate_utf8(message, max_bytes);
    if cut.len() == message.len() {
        message.to_string()
    } else {
        format!("{cut}{ELLIPSIS}")
    }
}

/// Format a send time for the `time` field.
pub fn format_time(time: chrono::DateTime<chrono::Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Platform-neutral content of a push.
#[derive(Debug, Clone, Copy)]
pub struct PushContent<'a> {
    pub object_id: &'a str,
    pub kind: &'a str,
    pub message: &'a str,
    pub badge: Option<u32>,
}

impl PushContent<'_> {
    fn fields(&self, time: &str) -> NotificationFields {
        NotificationFields {
            object_id: self.object_id.to_string(),
            kind: self.kind.to_string(),
            time: time.to_string(),
        }
    }
}

/// Build one APNs notification per device token.
pub fn build_apns<'t>(
    tokens: impl IntoIterator<Item = &'t str>,
    content: &PushContent<'_>,
    time: chrono::DateTime<chrono::Utc>,
) -> Vec<ApnsNotification> {
    let alert = truncate_alert(content.message, IOS_ALERT_LIMIT);
    let fields = content.fields(&format_time(time));

    tokens
        .into_iter()
        .map(|token| ApnsNotification {
            device_token: token.to_string(),
            alert: alert.clone(),
            badge: content.badge,
            fields: fields.clone(),
        })
        .collect()
}

#[derive(serde::Serialize)]
struct GcmData<'a> {
    alert: &'a str,
    #[serde(rename = "objectId")]
    object_id: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    time: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    badge: Option<u32>,
}

/// Build a single GCM notification carrying every registration id.
pub fn build_gcm(
    registration_ids: Vec<String>,
    content: &PushContent<'_>,
    time: chrono::DateTime<chrono::Utc>,
) -> color_eyre::eyre::Result<GcmNotification> {
    let alert = truncate_alert(content.message, ANDROID_ALERT_LIMIT);
    let time = format_time(time);

    let data = GcmData {
        alert: &alert,
        object_id: content.object_id,
        kind: content.kind,
        time: &time,
        badge: content.badge,
    };
    let json_data = serde_json::to_string(&data).wrap_err("failed to serialize GCM data")?;

    Ok(GcmNotification {
        registration_ids,
        collapse_key: content.kind.to_string(),
        json_data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn fixed_time() -> chrono::DateTime<chrono::Utc> {
        chrono::Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
    }

    fn content(message: &str, badge: Option<u32>) -> PushContent<'_> {
        PushContent {
            object_id: "post-1",
            kind: "comment",
            message,
            badge,
        }
    }

    #[test]
    fn test_short_message_is_untouched() {
        assert_eq!(truncate_alert("hello", IOS_ALERT_LIMIT), "hello");
        assert_eq!(truncate_alert("", IOS_ALERT_LIMIT), "");
    }

    #[test]
    fn test_exact_limit_is_not_truncated() {
        let message = "a".repeat(IOS_ALERT_LIMIT);
        assert_eq!(truncate_alert(&message, IOS_ALERT_LIMIT), message);
    }

    #[test]
    fn test_multibyte_char_straddling_limit_is_dropped() {
        // 149 ASCII bytes, then a 3-byte char occupying bytes 150..=152.
        let message = format!("{}€tail", "a".repeat(149));
        let cut = truncate_utf8(&message, IOS_ALERT_LIMIT);
        assert_eq!(cut, "a".repeat(149));

        let alert = truncate_alert(&message, IOS_ALERT_LIMIT);
        assert_eq!(alert, format!("{}...", "a".repeat(149)));
    }

    #[test]
    fn test_multibyte_char_ending_on_limit_is_kept() {
        let message = format!("{}€x", "a".repeat(147));
        assert_eq!(truncate_utf8(&message, IOS_ALERT_LIMIT), format!("{}€", "a".repeat(147)));
    }

    #[test]
    fn test_android_truncates_to_4000_bytes() {
        let message = "x".repeat(4500);
        let gcm = build_gcm(vec!["t".into()], &content(&message, None), fixed_time()).unwrap();
        let data: serde_json::Value = serde_json::from_str(&gcm.json_data).unwrap();
        let alert = data["alert"].as_str().unwrap();
        assert_eq!(alert.len(), ANDROID_ALERT_LIMIT + ELLIPSIS.len());
        assert!(alert.ends_with("..."));
        assert_eq!(&alert[..ANDROID_ALERT_LIMIT], "x".repeat(ANDROID_ALERT_LIMIT));
    }

    #[test]
    fn test_gcm_payload_fields() {
        let gcm = build_gcm(
            vec!["tok-a".into(), "tok-b".into()],
            &content("hi", Some(3)),
            fixed_time(),
        )
        .unwrap();

        assert_eq!(gcm.registration_ids, vec!["tok-a", "tok-b"]);
        assert_eq!(gcm.collapse_key, "comment");
        let data: serde_json::Value = serde_json::from_str(&gcm.json_data).unwrap();
        assert_eq!(data["alert"], "hi");
        assert_eq!(data["objectId"], "post-1");
        assert_eq!(data["type"], "comment");
        assert_eq!(data["time"], "2024-03-09T07:05:01");
        assert_eq!(data["badge"], 3);
    }

    #[test]
    fn test_gcm_payload_omits_missing_badge() {
        let gcm = build_gcm(vec!["t".into()], &content("hi", None), fixed_time()).unwrap();
        let data: serde_json::Value = serde_json::from_str(&gcm.json_data).unwrap();
        assert!(data.get("badge").is_none());
    }

    #[test]
    fn test_apns_one_notification_per_token() {
        let notifications = build_apns(["a", "b"], &content("hello", Some(1)), fixed_time());
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0].device_token, "a");
        assert_eq!(notifications[1].device_token, "b");
        for n in &notifications {
            assert_eq!(n.alert, "hello");
            assert_eq!(n.badge, Some(1));
            assert_eq!(n.fields.object_id, "post-1");
            assert_eq!(n.fields.kind, "comment");
            assert_eq!(n.fields.time, "2024-03-09T07:05:01");
        }
    }
}
