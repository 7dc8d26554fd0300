use std::future::{ready, Ready};

use actix_web::error::ErrorUnauthorized;
use actix_web::http::header;
use actix_web::web::{Data, Json};
use actix_web::{dev, post, FromRequest, HttpRequest, HttpResponse, Result};
use log::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::handlers::validation_message;
use crate::models::user::{
    ChangePasswordRequest, LoginRequest, PasswordResetRequest, RegisterRequest, UserResponse,
};
use crate::services::database::{DatabaseError, DatabaseService};
use crate::services::push::PushService;

/// Authenticated caller, resolved from the bearer session token. Rejects the
/// request with 401 before the handler body runs.
pub struct AuthedUser {
    pub user_id: Uuid,
    pub token: String,
}

impl FromRequest for AuthedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut dev::Payload) -> Self::Future {
        let token = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_string);

        let session = token.as_deref().and_then(|token| {
            req.app_data::<Data<DatabaseService>>()
                .and_then(|db| db.get_session(token).ok().flatten())
        });

        ready(match (session, token) {
            (Some(user_id), Some(token)) => Ok(AuthedUser { user_id, token }),
            _ => Err(ErrorUnauthorized("Usuário não autenticado")),
        })
    }
}

#[post("/register")]
pub async fn register(
    db: Data<DatabaseService>,
    push: Data<PushService>,
    payload: Json<RegisterRequest>,
) -> Result<HttpResponse> {
    if let Err(errors) = payload.validate() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": validation_message(&errors)
        })));
    }
    if payload.password != payload.confirm_password {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "As senhas não coincidem."
        })));
    }

    let password_hash = match bcrypt::hash(&payload.password, bcrypt::DEFAULT_COST) {
        Ok(hash) => hash,
        Err(err) => {
            error!("failed to hash password: {err}");
            return Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "message": "Erro interno ao processar cadastro."
            })));
        }
    };

    let payload = payload.into_inner();
    let user = match db.create_user(payload.name, payload.email, password_hash) {
        Ok(user) => user,
        Err(DatabaseError::DuplicateEmail) => {
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "message": "Este email já está cadastrado."
            })));
        }
        Err(err) => {
            error!("failed to create user: {err}");
            return Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "message": "Erro interno ao processar cadastro."
            })));
        }
    };
    info!("registered user {}", user.email);

    if let Err(err) = push
        .notify(
            user.id,
            "Bem-vindo!",
            "Seu cadastro foi realizado com sucesso.",
        )
        .await
    {
        warn!("welcome notification for {} failed: {err}", user.id);
    }

    match db.create_session(user.id) {
        Ok(token) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "message": "Cadastro realizado com sucesso!",
            "token": token,
            "user": UserResponse::from(&user),
        }))),
        Err(err) => {
            error!("failed to create session: {err}");
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "message": "Erro interno ao processar cadastro."
            })))
        }
    }
}

#[post("/login")]
pub async fn login(
    db: Data<DatabaseService>,
    payload: Json<LoginRequest>,
) -> Result<HttpResponse> {
    let invalid = || {
        HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Email ou senha inválidos."
        }))
    };

    let user = match db.get_user_by_email(&payload.email) {
        Ok(Some(user)) => user,
        Ok(None) => return Ok(invalid()),
        Err(err) => {
            error!("login lookup failed: {err}");
            return Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "message": "Erro interno do servidor ao tentar fazer login."
            })));
        }
    };

    match bcrypt::verify(&payload.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => return Ok(invalid()),
        Err(err) => {
            error!("password verification failed: {err}");
            return Ok(invalid());
        }
    }

    match db.create_session(user.id) {
        Ok(token) => {
            info!("user {} logged in", user.email);
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "message": "Login bem-sucedido!",
                "token": token,
                "user": UserResponse::from(&user),
            })))
        }
        Err(err) => {
            error!("failed to create session: {err}");
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "message": "Erro interno do servidor ao tentar fazer login."
            })))
        }
    }
}

#[post("/logout")]
pub async fn logout(db: Data<DatabaseService>, auth: AuthedUser) -> Result<HttpResponse> {
    if let Err(err) = db.delete_session(&auth.token) {
        error!("failed to delete session: {err}");
        return Ok(HttpResponse::InternalServerError().json(serde_json::json!({
            "message": "Erro ao fazer logout."
        })));
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Logout realizado." })))
}

#[post("/password/change")]
pub async fn change_password(
    db: Data<DatabaseService>,
    auth: AuthedUser,
    payload: Json<ChangePasswordRequest>,
) -> Result<HttpResponse> {
    if let Err(errors) = payload.validate() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": validation_message(&errors)
        })));
    }

    let user = match db.get_user(auth.user_id) {
        Ok(Some(user)) => user,
        Ok(None) => {
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "message": "Usuário não encontrado."
            })));
        }
        Err(err) => {
            error!("password change lookup failed: {err}");
            return Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "message": "Erro interno do servidor ao tentar alterar a senha."
            })));
        }
    };

    if !bcrypt::verify(&payload.current_password, &user.password_hash).unwrap_or(false) {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Senha atual incorreta."
        })));
    }

    let new_hash = match bcrypt::hash(&payload.new_password, bcrypt::DEFAULT_COST) {
        Ok(hash) => hash,
        Err(err) => {
            error!("failed to hash new password: {err}");
            return Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "message": "Erro interno do servidor ao tentar alterar a senha."
            })));
        }
    };

    match db.update_password(auth.user_id, new_hash) {
        Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "message": "Senha alterada com sucesso!"
        }))),
        Err(err) => {
            error!("failed to update password: {err}");
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "message": "Erro interno do servidor ao tentar alterar a senha."
            })))
        }
    }
}

#[post("/password/reset")]
pub async fn request_password_reset(
    db: Data<DatabaseService>,
    payload: Json<PasswordResetRequest>,
) -> Result<HttpResponse> {
    match db.get_user_by_email(&payload.email) {
        Ok(Some(_)) => {
            // Recovery email dispatch is a placeholder, as in the original.
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "message": "Instruções de recuperação de senha enviadas para seu email."
            })))
        }
        Ok(None) => Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "message": "Email não encontrado."
        }))),
        Err(err) => {
            error!("password reset lookup failed: {err}");
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Erro interno ao processar sua solicitação."
            })))
        }
    }
}
