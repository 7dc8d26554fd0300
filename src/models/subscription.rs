use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A device's registered Web Push endpoint plus the key pair needed to
/// address it. `(user_id, endpoint)` is the natural key: re-subscribing from
/// the same endpoint rotates the keys in place instead of duplicating the
/// row. Rows are removed when delivery observes the endpoint is gone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSubscription {
    pub user_id: Uuid,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PushSubscription {
    pub fn new(user_id: Uuid, endpoint: String, keys: SubscriptionKeys) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            endpoint,
            p256dh: keys.p256dh,
            auth: keys.auth,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn rotate_keys(&mut self, keys: SubscriptionKeys) {
        self.p256dh = keys.p256dh;
        self.auth = keys.auth;
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Body of `POST /notificacoes/subscribe`, the shape produced by
/// `PushManager.subscribe()` in the browser.
#[derive(Debug, Deserialize, Validate)]
pub struct SubscribeRequest {
    #[validate(url(message = "Endpoint inválido."))]
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}
