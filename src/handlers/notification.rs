use actix_web::web::{Data, Json};
use actix_web::{get, post, HttpResponse, Result};
use log::error;
use validator::Validate;

use crate::handlers::auth::AuthedUser;
use crate::handlers::validation_message;
use crate::models::notification::{MarkNotificationRequest, NotificationResponse};
use crate::models::subscription::SubscribeRequest;
use crate::services::database::{DatabaseError, DatabaseService};
use crate::services::push::PushService;

const TEST_TITLE: &str = "Teste de Notificação";
const TEST_MESSAGE: &str =
    "Esta é uma notificação de teste para verificar o funcionamento do sistema.";

/// Broadcast cap for the public test endpoint.
const TEST_BROADCAST_LIMIT: usize = 10;

#[get("")]
pub async fn list_notifications(
    db: Data<DatabaseService>,
    auth: AuthedUser,
) -> Result<HttpResponse> {
    let notifications = db.notifications_for_user(auth.user_id);
    let has_subscription = db.has_subscription(auth.user_id).unwrap_or(false);
    match notifications {
        Ok(notifications) => {
            let notifications: Vec<NotificationResponse> =
                notifications.iter().map(NotificationResponse::from).collect();
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "notifications": notifications,
                "has_subscription": has_subscription,
            })))
        }
        Err(err) => {
            error!("failed to list notifications: {err}");
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "message": "Erro ao carregar notificações."
            })))
        }
    }
}

#[post("/subscribe")]
pub async fn subscribe(
    push: Data<PushService>,
    auth: AuthedUser,
    payload: Json<SubscribeRequest>,
) -> Result<HttpResponse> {
    if let Err(errors) = payload.validate() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": validation_message(&errors)
        })));
    }

    let payload = payload.into_inner();
    match push.subscribe(auth.user_id, &payload.endpoint, payload.keys) {
        Ok(()) => Ok(HttpResponse::Created().json(serde_json::json!({
            "message": "Assinatura registrada com sucesso"
        }))),
        Err(err) => {
            error!("failed to register push subscription: {err}");
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "message": "Erro ao registrar assinatura"
            })))
        }
    }
}

#[post("/marcar-lida")]
pub async fn mark_read(
    db: Data<DatabaseService>,
    auth: AuthedUser,
    payload: Json<MarkNotificationRequest>,
) -> Result<HttpResponse> {
    set_read(&db, &auth, payload.id, true, "Notificação marcada como lida")
}

#[post("/marcar-nao-lida")]
pub async fn mark_unread(
    db: Data<DatabaseService>,
    auth: AuthedUser,
    payload: Json<MarkNotificationRequest>,
) -> Result<HttpResponse> {
    set_read(
        &db,
        &auth,
        payload.id,
        false,
        "Notificação marcada como não lida",
    )
}

fn set_read(
    db: &DatabaseService,
    auth: &AuthedUser,
    id: uuid::Uuid,
    read: bool,
    success_message: &str,
) -> Result<HttpResponse> {
    match db.set_notification_read(id, auth.user_id, read) {
        Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({ "message": success_message }))),
        Err(DatabaseError::NotFound(_)) => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Notificação não encontrada ou não pertence ao usuário"
        }))),
        Err(err) => {
            error!("failed to update notification read flag: {err}");
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "message": "Erro ao marcar notificação"
            })))
        }
    }
}

#[post("/marcar-todas-lidas")]
pub async fn mark_all_read(db: Data<DatabaseService>, auth: AuthedUser) -> Result<HttpResponse> {
    match db.mark_all_notifications_read(auth.user_id) {
        Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "message": "Todas as notificações marcadas como lidas"
        }))),
        Err(err) => {
            error!("failed to mark all notifications read: {err}");
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "message": "Erro ao marcar todas as notificações como lidas"
            })))
        }
    }
}

/// Client bootstrap: the service worker needs the VAPID public key to call
/// `PushManager.subscribe()`.
#[get("/vapid-public-key")]
pub async fn vapid_public_key(push: Data<PushService>) -> Result<HttpResponse> {
    match push.vapid_public_key() {
        Some(key) => Ok(HttpResponse::Ok().json(serde_json::json!({ "public_key": key }))),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Notificações push não configuradas."
        }))),
    }
}

#[get("/test")]
pub async fn send_test_notification(
    push: Data<PushService>,
    auth: AuthedUser,
) -> Result<HttpResponse> {
    match push.notify(auth.user_id, TEST_TITLE, TEST_MESSAGE).await {
        Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "message": "Notificação de teste enviada. Verifique seu dispositivo."
        }))),
        Err(err) => {
            error!("test notification failed: {err}");
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "message": "Erro ao enviar notificação de teste."
            })))
        }
    }
}

/// Public smoke test: pushes the test notification to every subscribed user,
/// capped, without requiring a login.
#[get("/test-push")]
pub async fn broadcast_test_notification(
    db: Data<DatabaseService>,
    push: Data<PushService>,
) -> Result<HttpResponse> {
    let user_ids = match db.subscribed_user_ids(TEST_BROADCAST_LIMIT) {
        Ok(ids) => ids,
        Err(err) => {
            error!("failed to load subscribed users: {err}");
            return Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "message": "Erro ao enviar notificação de teste."
            })));
        }
    };

    if user_ids.is_empty() {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Nenhuma subscription encontrada. Faça login e permita notificações primeiro."
        })));
    }

    let recipients = user_ids.len();
    for user_id in user_ids {
        if let Err(err) = push.notify(user_id, TEST_TITLE, TEST_MESSAGE).await {
            error!("test notification for user {user_id} failed: {err}");
        }
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": format!(
            "Notificação de teste enviada para {recipients} usuário(s). Verifique seu dispositivo."
        )
    })))
}
