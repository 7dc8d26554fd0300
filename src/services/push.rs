use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, error, info, warn};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use web_push::{
    ContentEncoding, HyperWebPushClient, SubscriptionInfo, VapidSignatureBuilder, WebPushClient,
    WebPushError, WebPushMessageBuilder, URL_SAFE_NO_PAD,
};

use crate::models::subscription::{PushSubscription, SubscriptionKeys};
use crate::services::database::{DatabaseError, DatabaseService};

const NOTIFICATION_ICON: &str = "/icons/android-launchericon-192-192.png";
const NOTIFICATION_BADGE: &str = "/icons/android-launchericon-96-96.png";
const NOTIFICATIONS_URL: &str = "/notificacoes";

#[derive(Debug, Error)]
pub enum PushError {
    /// The push service reported the endpoint no longer exists. The
    /// subscription row must be discarded.
    #[error("subscription endpoint is gone")]
    EndpointGone,
    #[error("push delivery failed: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error(transparent)]
    Store(#[from] DatabaseError),
    #[error("failed to encode push payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Payload shown by the installed service worker. Wire-visible: installed
/// clients parse exactly this shape, so it must stay stable.
#[derive(Debug, Serialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub data: PushPayloadData,
}

#[derive(Debug, Serialize)]
pub struct PushPayloadData {
    pub url: String,
}

impl PushPayload {
    pub fn new(title: &str, message: &str) -> Self {
        Self {
            title: title.to_string(),
            body: message.to_string(),
            icon: NOTIFICATION_ICON.to_string(),
            badge: NOTIFICATION_BADGE.to_string(),
            data: PushPayloadData {
                url: NOTIFICATIONS_URL.to_string(),
            },
        }
    }
}

/// Process-wide sender identity for the Web Push protocol.
#[derive(Debug, Clone)]
pub struct VapidConfig {
    pub public_key: String,
    pub private_key: String,
    pub contact: String,
}

impl VapidConfig {
    /// Returns `None` unless all three variables are present, which puts the
    /// push service into delivery-disabled mode.
    pub fn from_env() -> Option<Self> {
        let public_key = env::var("PUBLIC_VAPID_KEY").ok()?;
        let private_key = env::var("PRIVATE_VAPID_KEY").ok()?;
        let contact = env::var("VAPID_MAILTO").ok()?;
        Some(Self {
            public_key,
            private_key,
            contact,
        })
    }
}

/// Seam over the Web Push wire protocol so delivery outcomes can be faked
/// in tests.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(&self, subscription: &PushSubscription, payload: &str) -> Result<(), PushError>;
}

pub struct WebPushTransport {
    client: HyperWebPushClient,
    vapid: VapidConfig,
}

impl WebPushTransport {
    pub fn new(vapid: VapidConfig) -> Self {
        Self {
            client: HyperWebPushClient::new(),
            vapid,
        }
    }
}

#[async_trait]
impl PushTransport for WebPushTransport {
    async fn send(&self, subscription: &PushSubscription, payload: &str) -> Result<(), PushError> {
        let info = SubscriptionInfo::new(
            subscription.endpoint.clone(),
            subscription.p256dh.clone(),
            subscription.auth.clone(),
        );

        let mut signature =
            VapidSignatureBuilder::from_base64(&self.vapid.private_key, URL_SAFE_NO_PAD, &info)
                .map_err(|e| PushError::Transport(e.to_string()))?;
        signature.add_claim("sub", self.vapid.contact.clone());

        let mut message = WebPushMessageBuilder::new(&info);
        message.set_payload(ContentEncoding::Aes128Gcm, payload.as_bytes());
        message.set_vapid_signature(
            signature
                .build()
                .map_err(|e| PushError::Transport(e.to_string()))?,
        );
        let message = message
            .build()
            .map_err(|e| PushError::Transport(e.to_string()))?;

        match self.client.send(message).await {
            Ok(()) => Ok(()),
            Err(WebPushError::EndpointNotFound | WebPushError::EndpointNotValid) => {
                Err(PushError::EndpointGone)
            }
            Err(e) => Err(PushError::Transport(e.to_string())),
        }
    }
}

/// Fans a domain event out to every device a user has registered, recording
/// it in-app first. Delivery is best-effort at-most-once: there is no retry,
/// no backoff and no dead-letter handling, only pruning of endpoints the
/// transport reports as gone.
pub struct PushService {
    db: DatabaseService,
    /// `None` means delivery is disabled (no VAPID identity configured).
    /// Notifications are still recorded in-app.
    transport: Option<Arc<dyn PushTransport>>,
    vapid_public_key: Option<String>,
}

impl PushService {
    pub fn new(db: DatabaseService, vapid: VapidConfig) -> Self {
        let public_key = vapid.public_key.clone();
        Self {
            db,
            transport: Some(Arc::new(WebPushTransport::new(vapid))),
            vapid_public_key: Some(public_key),
        }
    }

    /// Used when no VAPID keys are configured: `notify` keeps recording
    /// notifications but never attempts delivery.
    pub fn disabled(db: DatabaseService) -> Self {
        Self {
            db,
            transport: None,
            vapid_public_key: None,
        }
    }

    #[cfg(test)]
    fn with_transport(db: DatabaseService, transport: Arc<dyn PushTransport>) -> Self {
        Self {
            db,
            transport: Some(transport),
            vapid_public_key: None,
        }
    }

    pub fn vapid_public_key(&self) -> Option<&str> {
        self.vapid_public_key.as_deref()
    }

    /// Registers (or refreshes) a device for a user. Upsert on the
    /// `(user, endpoint)` pair, so key rotation never duplicates rows.
    pub fn subscribe(
        &self,
        user_id: Uuid,
        endpoint: &str,
        keys: SubscriptionKeys,
    ) -> Result<(), DatabaseError> {
        self.db.upsert_subscription(user_id, endpoint, keys)
    }

    /// Records the notification and delivers it to every device the user has
    /// registered. Recording and delivery fail independently: a failed
    /// insert is logged and delivery still runs, while per-endpoint delivery
    /// outcomes never bubble up to the caller. Only a failure to load the
    /// subscription list fails the whole call.
    pub async fn notify(
        &self,
        user_id: Uuid,
        title: &str,
        message: &str,
    ) -> Result<(), NotifyError> {
        if let Err(err) = self.db.insert_notification(user_id, title, message) {
            error!("failed to record notification for user {user_id}: {err}");
        }

        let subscriptions = self.db.list_subscriptions(user_id)?;
        if subscriptions.is_empty() {
            debug!("no push subscriptions for user {user_id}");
            return Ok(());
        }

        let Some(transport) = &self.transport else {
            warn!(
                "push delivery disabled, skipping {} subscription(s) for user {user_id}",
                subscriptions.len()
            );
            return Ok(());
        };

        let payload = serde_json::to_string(&PushPayload::new(title, message))?;
        let payload = payload.as_str();

        let attempts = subscriptions
            .iter()
            .map(|subscription| async move {
                (subscription, transport.send(subscription, payload).await)
            });

        for (subscription, outcome) in join_all(attempts).await {
            match outcome {
                Ok(()) => {}
                Err(PushError::EndpointGone) => {
                    info!("removing expired push subscription {}", subscription.endpoint);
                    if let Err(err) = self.db.delete_subscription(&subscription.endpoint) {
                        error!(
                            "failed to remove expired subscription {}: {err}",
                            subscription.endpoint
                        );
                    }
                }
                Err(err) => {
                    warn!("push delivery to {} failed: {err}", subscription.endpoint);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Transport double with per-endpoint programmed outcomes. Every call is
    /// recorded so tests can assert exactly which deliveries were attempted.
    #[derive(Default)]
    struct FakeTransport {
        gone_endpoints: HashSet<String>,
        failing_endpoints: HashSet<String>,
        attempts: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn attempts(&self) -> Vec<String> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PushTransport for FakeTransport {
        async fn send(
            &self,
            subscription: &PushSubscription,
            _payload: &str,
        ) -> Result<(), PushError> {
            self.attempts
                .lock()
                .unwrap()
                .push(subscription.endpoint.clone());
            if self.gone_endpoints.contains(&subscription.endpoint) {
                Err(PushError::EndpointGone)
            } else if self.failing_endpoints.contains(&subscription.endpoint) {
                Err(PushError::Transport("connection reset".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn keys() -> SubscriptionKeys {
        SubscriptionKeys {
            p256dh: "BPk".to_string(),
            auth: "a".to_string(),
        }
    }

    fn service_with(
        db: &DatabaseService,
        transport: FakeTransport,
    ) -> (PushService, Arc<FakeTransport>) {
        let transport = Arc::new(transport);
        let service = PushService::with_transport(db.clone(), transport.clone());
        (service, transport)
    }

    #[tokio::test]
    async fn test_notify_without_subscriptions_records_and_skips_delivery() {
        let db = DatabaseService::new();
        let user_id = Uuid::new_v4();
        let (service, transport) = service_with(&db, FakeTransport::default());

        service
            .notify(user_id, "Nova Consulta Agendada!", "Detalhes da consulta.")
            .await
            .unwrap();

        let recorded = db.notifications_for_user(user_id).unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].title, "Nova Consulta Agendada!");
        assert!(!recorded[0].read);
        assert!(transport.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_gone_endpoint_pruned_exactly() {
        let db = DatabaseService::new();
        let user_id = Uuid::new_v4();
        for endpoint in ["https://push.example/a", "https://push.example/b", "https://push.example/c"] {
            db.upsert_subscription(user_id, endpoint, keys()).unwrap();
        }
        let (service, transport) = service_with(
            &db,
            FakeTransport {
                gone_endpoints: HashSet::from(["https://push.example/b".to_string()]),
                ..Default::default()
            },
        );

        service.notify(user_id, "Teste", "mensagem").await.unwrap();

        assert_eq!(transport.attempts().len(), 3);
        let remaining = db.list_subscriptions(user_id).unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().all(|s| s.endpoint != "https://push.example/b"));
    }

    #[tokio::test]
    async fn test_transport_error_does_not_short_circuit() {
        let db = DatabaseService::new();
        let user_id = Uuid::new_v4();
        for endpoint in ["https://push.example/a", "https://push.example/b", "https://push.example/c"] {
            db.upsert_subscription(user_id, endpoint, keys()).unwrap();
        }
        let (service, transport) = service_with(
            &db,
            FakeTransport {
                failing_endpoints: HashSet::from(["https://push.example/a".to_string()]),
                ..Default::default()
            },
        );

        service.notify(user_id, "Teste", "mensagem").await.unwrap();

        // All three deliveries attempted, nothing pruned for transient errors.
        assert_eq!(transport.attempts().len(), 3);
        assert_eq!(db.list_subscriptions(user_id).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_stale_and_healthy_device_scenario() {
        let db = DatabaseService::new();
        let user_id = Uuid::new_v4();
        db.upsert_subscription(user_id, "https://push.example/stale", keys())
            .unwrap();
        db.upsert_subscription(user_id, "https://push.example/healthy", keys())
            .unwrap();
        let (service, transport) = service_with(
            &db,
            FakeTransport {
                gone_endpoints: HashSet::from(["https://push.example/stale".to_string()]),
                ..Default::default()
            },
        );

        service
            .notify(user_id, "Consulta Confirmada", "Sua consulta foi confirmada.")
            .await
            .unwrap();

        assert_eq!(db.notifications_for_user(user_id).unwrap().len(), 1);
        assert_eq!(transport.attempts().len(), 2);
        let remaining = db.list_subscriptions(user_id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].endpoint, "https://push.example/healthy");
    }

    #[tokio::test]
    async fn test_disabled_delivery_still_records() {
        let db = DatabaseService::new();
        let user_id = Uuid::new_v4();
        db.upsert_subscription(user_id, "https://push.example/a", keys())
            .unwrap();
        let service = PushService::disabled(db.clone());

        service.notify(user_id, "Teste", "mensagem").await.unwrap();

        assert_eq!(db.notifications_for_user(user_id).unwrap().len(), 1);
        // Subscription untouched: disabled mode never attempts delivery.
        assert_eq!(db.list_subscriptions(user_id).unwrap().len(), 1);
        assert!(service.vapid_public_key().is_none());
    }

    #[tokio::test]
    async fn test_subscribe_twice_keeps_second_keys() {
        let db = DatabaseService::new();
        let user_id = Uuid::new_v4();
        let (service, _) = service_with(&db, FakeTransport::default());

        service
            .subscribe(
                user_id,
                "https://push.example/e",
                SubscriptionKeys {
                    p256dh: "k1".to_string(),
                    auth: "a1".to_string(),
                },
            )
            .unwrap();
        service
            .subscribe(
                user_id,
                "https://push.example/e",
                SubscriptionKeys {
                    p256dh: "k2".to_string(),
                    auth: "a2".to_string(),
                },
            )
            .unwrap();

        let subs = db.list_subscriptions(user_id).unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].p256dh, "k2");
        assert_eq!(subs[0].auth, "a2");
    }

    #[test]
    fn test_payload_wire_format_is_stable() {
        let payload = PushPayload::new("Consulta Confirmada", "Sua consulta foi confirmada.");
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "title": "Consulta Confirmada",
                "body": "Sua consulta foi confirmada.",
                "icon": "/icons/android-launchericon-192-192.png",
                "badge": "/icons/android-launchericon-96-96.png",
                "data": { "url": "/notificacoes" }
            })
        );
    }
}
