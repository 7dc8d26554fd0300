use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// In-app notification record. Created only as a side effect of a domain
/// trigger (appointment change, registration, test endpoint), never directly
/// by a user action. The record is the durable source of truth regardless of
/// push delivery outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub sent_at: DateTime<Utc>,
    pub read: bool,
    pub kind: Option<String>,
    pub urgency: Option<String>,
}

impl Notification {
    pub fn new(user_id: Uuid, title: String, message: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            title,
            message,
            sent_at: Utc::now(),
            read: false,
            kind: None,
            urgency: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MarkNotificationRequest {
    pub id: Uuid,
}

/// Notification as listed to the client, with the optional tags defaulted.
#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub sent_at: DateTime<Utc>,
    pub read: bool,
    pub kind: String,
    pub urgency: String,
}

impl From<&Notification> for NotificationResponse {
    fn from(notification: &Notification) -> Self {
        Self {
            id: notification.id,
            title: notification.title.clone(),
            message: notification.message.clone(),
            sent_at: notification.sent_at,
            read: notification.read,
            kind: notification
                .kind
                .clone()
                .unwrap_or_else(|| "appointment".to_string()),
            urgency: notification
                .urgency
                .clone()
                .unwrap_or_else(|| "normal".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_notification_is_unread() {
        let notification = Notification::new(
            Uuid::new_v4(),
            "Consulta Confirmada".to_string(),
            "Sua consulta foi confirmada.".to_string(),
        );
        assert!(!notification.read);
        assert!(notification.kind.is_none());
    }

    #[test]
    fn test_response_defaults_tags() {
        let notification = Notification::new(Uuid::new_v4(), "t".to_string(), "m".to_string());
        let response = NotificationResponse::from(&notification);
        assert_eq!(response.kind, "appointment");
        assert_eq!(response.urgency, "normal");
    }
}
