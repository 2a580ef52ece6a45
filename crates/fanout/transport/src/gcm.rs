//! GCM provider over the legacy HTTP JSON API.

use std::time::Duration;

use color_eyre::eyre::WrapErr as _;
use fanout_core::{GcmNotification, Notification};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

use crate::{Provider, TransportEvent};

const GCM_ENDPOINT: &str = "https://gcm-http.googleapis.com/gcm/send";
const GCM_TIMEOUT: Duration = Duration::from_secs(60);

/// GCM provider authenticated with a server key.
pub struct GcmProvider {
    client: reqwest::Client,
    sender_id: String,
    package_name: Option<String>,
}

impl GcmProvider {
    /// Create a new GCM provider.
    ///
    /// Fails if the sender id or auth token is missing or unusable.
    pub fn new(
        sender_id: &str,
        auth_token: &str,
        package_name: &str,
    ) -> color_eyre::eyre::Result<Self> {
        if sender_id.trim().is_empty() {
            color_eyre::eyre::bail!("GCM sender id is not configured");
        }
        if auth_token.trim().is_empty() {
            color_eyre::eyre::bail!("GCM auth token is not configured");
        }

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("key={auth_token}"))
            .wrap_err("GCM auth token is not a valid header value")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .user_agent("fanout/0.1.0")
            .timeout(GCM_TIMEOUT)
            .default_headers(headers)
            .build()
            .wrap_err("failed to create GCM client")?;

        let package_name = Some(package_name.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        Ok(Self {
            client,
            sender_id: sender_id.to_string(),
            package_name,
        })
    }

    async fn post(&self, notification: &GcmNotification) -> color_eyre::eyre::Result<GcmResponse> {
        let data: serde_json::Value =
            serde_json::from_str(&notification.json_data).wrap_err("invalid GCM data payload")?;

        let request = GcmRequest {
            registration_ids: &notification.registration_ids,
            collapse_key: &notification.collapse_key,
            data,
            restricted_package_name: self.package_name.as_deref(),
        };

        let response = self
            .client
            .post(GCM_ENDPOINT)
            .json(&request)
            .send()
            .await
            .wrap_err("GCM request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            color_eyre::eyre::bail!("GCM error, status {}: {}", status.as_u16(), body);
        }

        response
            .json::<GcmResponse>()
            .await
            .wrap_err("failed to decode GCM response")
    }
}

impl Provider for GcmProvider {
    type Notification = GcmNotification;

    async fn deliver(&self, notification: &GcmNotification) -> Vec<TransportEvent> {
        match self.post(notification).await {
            Ok(response) => interpret_response(notification, &response),
            Err(e) => {
                tracing::warn!(sender_id = %self.sender_id, error = %e, "gcm delivery failed");
                vec![TransportEvent::ServiceException {
                    error: format!("{e:#}"),
                }]
            }
        }
    }
}

#[derive(serde::Serialize)]
struct GcmRequest<'a> {
    registration_ids: &'a [String],
    collapse_key: &'a str,
    data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    restricted_package_name: Option<&'a str>,
}

/// Response body from the GCM send endpoint.
#[derive(Debug, Default, serde::Deserialize)]
pub struct GcmResponse {
    #[serde(default)]
    pub results: Vec<GcmResult>,
}

/// Per-registration result, in request order.
#[derive(Debug, Default, serde::Deserialize)]
pub struct GcmResult {
    pub message_id: Option<String>,
    /// Canonical id replacing the one that was sent.
    pub registration_id: Option<String>,
    pub error: Option<String>,
}

/// Map per-registration results back onto the tokens that were sent.
pub fn interpret_response(
    notification: &GcmNotification,
    response: &GcmResponse,
) -> Vec<TransportEvent> {
    let mut events = Vec::new();

    for (token, result) in notification.registration_ids.iter().zip(&response.results) {
        match (&result.error, &result.registration_id) {
            (Some(error), _) if error == "NotRegistered" || error == "InvalidRegistration" => {
                events.push(TransportEvent::SubscriptionExpired {
                    token: token.clone(),
                });
            }
            (Some(error), _) => {
                events.push(TransportEvent::NotificationFailed {
                    notification: Notification::Gcm(GcmNotification {
                        registration_ids: vec![token.clone()],
                        ..notification.clone()
                    }),
                    error: error.clone(),
                });
            }
            (None, Some(canonical)) if canonical != token => {
                events.push(TransportEvent::SubscriptionChanged {
                    old_token: token.clone(),
                    new_token: canonical.clone(),
                });
            }
            (None, _) => {}
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(tokens: &[&str]) -> GcmNotification {
        GcmNotification {
            registration_ids: tokens.iter().map(|t| t.to_string()).collect(),
            collapse_key: "comment".into(),
            json_data: r#"{"alert":"hi"}"#.into(),
        }
    }

    #[test]
    fn test_interpret_response() {
        let response: GcmResponse = serde_json::from_str(
            r#"{
                "multicast_id": 1,
                "success": 2,
                "failure": 2,
                "canonical_ids": 1,
                "results": [
                    {"message_id": "1:0408"},
                    {"error": "NotRegistered"},
                    {"message_id": "1:1516", "registration_id": "fresh"},
                    {"error": "Unavailable"}
                ]
            }"#,
        )
        .unwrap();

        let events = interpret_response(&notification(&["ok", "gone", "old", "busy"]), &response);

        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0],
            TransportEvent::SubscriptionExpired {
                token: "gone".into()
            }
        );
        assert_eq!(
            events[1],
            TransportEvent::SubscriptionChanged {
                old_token: "old".into(),
                new_token: "fresh".into()
            }
        );
        match &events[2] {
            TransportEvent::NotificationFailed {
                notification: Notification::Gcm(n),
                error,
            } => {
                assert_eq!(n.registration_ids, vec!["busy"]);
                assert_eq!(n.collapse_key, "comment");
                assert_eq!(error, "Unavailable");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_missing_credentials_fail_fast() {
        assert!(GcmProvider::new("", "token", "com.example").is_err());
        assert!(GcmProvider::new("1234", " ", "com.example").is_err());
        assert!(GcmProvider::new("1234", "bad\ntoken", "com.example").is_err());
    }
}
