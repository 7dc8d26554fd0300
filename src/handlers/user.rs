use actix_web::web::{Data, Json};
use actix_web::{get, put, HttpResponse, Result};
use log::error;
use validator::Validate;

use crate::handlers::auth::AuthedUser;
use crate::handlers::validation_message;
use crate::models::user::{UpdateProfileRequest, UserResponse};
use crate::services::database::{DatabaseError, DatabaseService};

#[get("")]
pub async fn get_profile(db: Data<DatabaseService>, auth: AuthedUser) -> Result<HttpResponse> {
    match db.get_user(auth.user_id) {
        Ok(Some(user)) => Ok(HttpResponse::Ok().json(UserResponse::from(&user))),
        Ok(None) => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Usuário não encontrado."
        }))),
        Err(err) => {
            error!("failed to load profile: {err}");
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "message": "Erro ao carregar perfil."
            })))
        }
    }
}

#[put("")]
pub async fn update_profile(
    db: Data<DatabaseService>,
    auth: AuthedUser,
    payload: Json<UpdateProfileRequest>,
) -> Result<HttpResponse> {
    if let Err(errors) = payload.validate() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": validation_message(&errors)
        })));
    }

    match db.update_profile(auth.user_id, payload.into_inner()) {
        Ok(user) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "message": "Perfil atualizado com sucesso!",
            "user": UserResponse::from(&user),
        }))),
        Err(DatabaseError::NotFound(_)) => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Usuário não encontrado para atualização."
        }))),
        Err(err) => {
            error!("failed to update profile: {err}");
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "message": "Erro interno do servidor ao atualizar perfil."
            })))
        }
    }
}

#[get("/stats")]
pub async fn get_stats(db: Data<DatabaseService>, auth: AuthedUser) -> Result<HttpResponse> {
    let appointments = db.count_appointments(auth.user_id);
    let unread = db.count_unread_notifications(auth.user_id);
    match (appointments, unread) {
        (Ok(appointments), Ok(unread)) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "appointments": appointments,
            "unread_notifications": unread,
            // Placeholder metric carried over from the original client.
            "health_score": 100,
        }))),
        (Err(err), _) | (_, Err(err)) => {
            error!("failed to load user stats: {err}");
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "message": "Erro ao carregar estatísticas."
            })))
        }
    }
}
