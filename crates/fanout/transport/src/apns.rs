//! APNs provider using the a2 crate.

use std::path::Path;

use a2::NotificationBuilder as _;
use color_eyre::eyre::WrapErr as _;
use fanout_core::{ApnsNotification, Notification};

use crate::{Provider, TransportEvent};

/// APNs answers 410 for tokens that are no longer active.
const GONE: u16 = 410;

/// APNs provider using certificate authentication.
pub struct ApnsProvider {
    client: a2::Client,
}

impl ApnsProvider {
    /// Create a new APNs provider from PKCS12 certificate bytes and password.
    pub fn new(
        pkcs12_der: &[u8],
        password: &str,
        endpoint: a2::Endpoint,
    ) -> color_eyre::eyre::Result<Self> {
        let mut cursor = std::io::Cursor::new(pkcs12_der);
        let config = a2::ClientConfig {
            endpoint,
            ..Default::default()
        };

        let client = a2::Client::certificate(&mut cursor, password, config)
            .wrap_err("failed to create APNs client")?;

        Ok(Self { client })
    }

    /// Load the certificate from disk.
    pub fn from_file(
        path: &Path,
        password: &str,
        production: bool,
    ) -> color_eyre::eyre::Result<Self> {
        let der = std::fs::read(path)
            .wrap_err_with(|| format!("failed to read APNs certificate {}", path.display()))?;

        let endpoint = if production {
            a2::Endpoint::Production
        } else {
            a2::Endpoint::Sandbox
        };

        Self::new(&der, password, endpoint)
    }
}

impl Provider for ApnsProvider {
    type Notification = ApnsNotification;

    async fn deliver(&self, notification: &ApnsNotification) -> Vec<TransportEvent> {
        let mut builder = a2::DefaultNotificationBuilder::new().set_body(&notification.alert);
        if let Some(badge) = notification.badge {
            builder = builder.set_badge(badge);
        }

        let mut payload = builder.build(
            &notification.device_token,
            a2::NotificationOptions::default(),
        );

        let fields = &notification.fields;
        for (key, value) in [
            ("objectId", &fields.object_id),
            ("type", &fields.kind),
            ("time", &fields.time),
        ] {
            if let Err(e) = payload.add_custom_data(key, value) {
                return vec![failed(notification, e)];
            }
        }

        match self.client.send(payload).await {
            Ok(response) => {
                tracing::debug!(
                    token = %notification.device_token,
                    apns_id = ?response.apns_id,
                    "apns notification accepted"
                );
                Vec::new()
            }
            Err(a2::Error::ResponseError(response)) if response.code == GONE => {
                vec![TransportEvent::SubscriptionExpired {
                    token: notification.device_token.clone(),
                }]
            }
            Err(e) => vec![failed(notification, e)],
        }
    }
}

fn failed(notification: &ApnsNotification, error: impl std::fmt::Display) -> TransportEvent {
    TransportEvent::NotificationFailed {
        notification: Notification::Apns(notification.clone()),
        error: error.to_string(),
    }
}
