//! Background delivery broker.

use std::sync::{Mutex, MutexGuard};

use color_eyre::eyre::WrapErr as _;
use fanout_core::{ApnsNotification, GcmNotification, Notification, Platform};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{
    ApnsProvider, EventHandler, GcmProvider, Provider, Transport, TransportConfig,
};

/// Queues notifications and delivers them on a background task.
pub struct Broker {
    queue: Mutex<Option<mpsc::UnboundedSender<Notification>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    ios_enabled: bool,
    android_enabled: bool,
}

impl Broker {
    /// Start a broker over the given providers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<A, G>(
        apns: Option<A>,
        gcm: Option<G>,
        handler: EventHandler,
    ) -> color_eyre::eyre::Result<Self>
    where
        A: Provider<Notification = ApnsNotification> + 'static,
        G: Provider<Notification = GcmNotification> + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .wrap_err("push broker requires a tokio runtime")?;

        let ios_enabled = apns.is_some();
        let android_enabled = gcm.is_some();

        let (tx, rx) = mpsc::unbounded_channel();
        let worker = runtime.spawn(run_worker(rx, apns, gcm, handler));

        tracing::info!(ios_enabled, android_enabled, "push broker started");

        Ok(Self {
            queue: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            ios_enabled,
            android_enabled,
        })
    }

    /// Build providers from configuration and start a broker.
    ///
    /// An unusable iOS configuration disables iOS for this broker. An
    /// unusable Android configuration is an error.
    pub fn from_config(
        config: &TransportConfig,
        handler: EventHandler,
    ) -> color_eyre::eyre::Result<Self> {
        let apns = if config.ios_enabled {
            match apns_from_config(config) {
                Ok(provider) => Some(provider),
                Err(e) => {
                    tracing::error!(error = ?e, "failed to configure iOS push, disabling");
                    None
                }
            }
        } else {
            None
        };

        let gcm = if config.android_enabled {
            let provider = GcmProvider::new(
                &config.gcm_sender_id,
                &config.gcm_auth_token,
                &config.gcm_package_name,
            )
            .wrap_err("failed to configure Android push")?;
            Some(provider)
        } else {
            None
        };

        Self::new(apns, gcm, handler)
    }

    /// Wait for the worker to finish delivering queued notifications.
    ///
    /// Only returns once [`Transport::shutdown`] has been called.
    pub async fn drain(&self) {
        let worker = lock(&self.worker).take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "push broker worker panicked");
            }
        }
    }
}

fn apns_from_config(config: &TransportConfig) -> color_eyre::eyre::Result<ApnsProvider> {
    let path = config
        .apn_certificate_path
        .as_deref()
        .ok_or_else(|| color_eyre::eyre::eyre!("APNs certificate path is not configured"))?;

    ApnsProvider::from_file(
        path,
        &config.apn_certificate_password,
        config.apn_use_production,
    )
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Transport for Broker {
    fn is_enabled(&self, platform: Platform) -> bool {
        match platform {
            Platform::Ios => self.ios_enabled,
            Platform::Android => self.android_enabled,
        }
    }

    fn send(&self, notification: Notification) {
        let platform = notification.platform();
        if !self.is_enabled(platform) {
            tracing::warn!(%platform, "platform not enabled, dropping notification");
            return;
        }

        match lock(&self.queue).as_ref() {
            Some(tx) => {
                if tx.send(notification).is_err() {
                    tracing::warn!(%platform, "push queue closed, dropping notification");
                }
            }
            None => tracing::warn!(%platform, "push broker stopped, dropping notification"),
        }
    }

    fn shutdown(&self) {
        if lock(&self.queue).take().is_some() {
            tracing::info!("push broker stopping");
        }
    }
}

async fn run_worker<A, G>(
    mut rx: mpsc::UnboundedReceiver<Notification>,
    apns: Option<A>,
    gcm: Option<G>,
    handler: EventHandler,
) where
    A: Provider<Notification = ApnsNotification>,
    G: Provider<Notification = GcmNotification>,
{
    while let Some(notification) = rx.recv().await {
        let events = match (&notification, &apns, &gcm) {
            (Notification::Apns(n), Some(apns), _) => apns.deliver(n).await,
            (Notification::Gcm(n), _, Some(gcm)) => gcm.deliver(n).await,
            (n, _, _) => {
                tracing::warn!(platform = %n.platform(), "no provider for notification");
                continue;
            }
        };

        for event in events {
            handler(event);
        }
    }

    tracing::info!("push broker stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::TransportEvent;
    use fanout_core::NotificationFields;

    struct ExpiringApns;

    impl Provider for ExpiringApns {
        type Notification = ApnsNotification;

        async fn deliver(&self, notification: &ApnsNotification) -> Vec<TransportEvent> {
            vec![TransportEvent::SubscriptionExpired {
                token: notification.device_token.clone(),
            }]
        }
    }

    struct RotatingGcm;

    impl Provider for RotatingGcm {
        type Notification = GcmNotification;

        async fn deliver(&self, notification: &GcmNotification) -> Vec<TransportEvent> {
            notification
                .registration_ids
                .iter()
                .map(|t| TransportEvent::SubscriptionChanged {
                    old_token: t.clone(),
                    new_token: format!("{t}-new"),
                })
                .collect()
        }
    }

    fn recorder() -> (EventHandler, Arc<Mutex<Vec<TransportEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let handler: EventHandler = Arc::new(move |event| sink.lock().unwrap().push(event));
        (handler, events)
    }

    fn apns(token: &str) -> Notification {
        Notification::Apns(ApnsNotification {
            device_token: token.into(),
            alert: "hi".into(),
            badge: None,
            fields: NotificationFields {
                object_id: "1".into(),
                kind: "t".into(),
                time: "2024-01-01T00:00:00".into(),
            },
        })
    }

    fn gcm(tokens: &[&str]) -> Notification {
        Notification::Gcm(GcmNotification {
            registration_ids: tokens.iter().map(|t| t.to_string()).collect(),
            collapse_key: "t".into(),
            json_data: "{}".into(),
        })
    }

    #[tokio::test]
    async fn test_events_reach_handler() {
        let (handler, events) = recorder();
        let broker = Broker::new(Some(ExpiringApns), Some(RotatingGcm), handler).unwrap();

        broker.send(apns("a"));
        broker.send(gcm(&["b", "c"]));
        broker.shutdown();
        broker.drain().await;

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                TransportEvent::SubscriptionExpired { token: "a".into() },
                TransportEvent::SubscriptionChanged {
                    old_token: "b".into(),
                    new_token: "b-new".into()
                },
                TransportEvent::SubscriptionChanged {
                    old_token: "c".into(),
                    new_token: "c-new".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_disabled_platform_is_dropped() {
        let (handler, events) = recorder();
        let broker = Broker::new(Some(ExpiringApns), None::<RotatingGcm>, handler).unwrap();

        assert!(broker.is_enabled(Platform::Ios));
        assert!(!broker.is_enabled(Platform::Android));

        broker.send(gcm(&["b"]));
        broker.shutdown();
        broker.send(apns("late"));
        broker.drain().await;

        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_ios_certificate_disables_ios() {
        let (handler, _events) = recorder();
        let config = TransportConfig {
            ios_enabled: true,
            apn_certificate_path: Some("/nonexistent/fanout/apns.p12".into()),
            ..Default::default()
        };

        let broker = Broker::from_config(&config, handler).unwrap();
        assert!(!broker.is_enabled(Platform::Ios));
        broker.shutdown();
    }

    #[tokio::test]
    async fn test_android_misconfiguration_is_fatal() {
        let (handler, _events) = recorder();
        let config = TransportConfig {
            android_enabled: true,
            ..Default::default()
        };

        assert!(Broker::from_config(&config, handler).is_err());
    }

    #[tokio::test]
    async fn test_android_only_config() {
        let (handler, _events) = recorder();
        let config = TransportConfig {
            android_enabled: true,
            gcm_sender_id: "1234".into(),
            gcm_auth_token: "server-key".into(),
            gcm_package_name: "com.example.app".into(),
            ..Default::default()
        };

        let broker = Broker::from_config(&config, handler).unwrap();
        assert!(broker.is_enabled(Platform::Android));
        assert!(!broker.is_enabled(Platform::Ios));
        broker.shutdown();
    }

    #[test]
    fn test_requires_runtime() {
        let (handler, _events) = recorder();
        assert!(Broker::new(None::<ExpiringApns>, None::<RotatingGcm>, handler).is_err());
    }
}
