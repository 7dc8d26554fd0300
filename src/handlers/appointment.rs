use actix_web::web::{Data, Json};
use actix_web::{get, post, HttpResponse, Result};
use log::{error, warn};
use validator::Validate;

use crate::handlers::auth::AuthedUser;
use crate::handlers::validation_message;
use crate::models::appointment::{
    Appointment, AppointmentAction, AppointmentActionRequest, CreateAppointmentRequest,
};
use crate::services::database::{DatabaseError, DatabaseService};
use crate::services::push::PushService;

#[get("")]
pub async fn list_appointments(
    db: Data<DatabaseService>,
    auth: AuthedUser,
) -> Result<HttpResponse> {
    match db.active_appointments(auth.user_id) {
        Ok(appointments) => Ok(HttpResponse::Ok().json(appointments)),
        Err(err) => {
            error!("failed to list appointments: {err}");
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "message": "Erro ao carregar consultas."
            })))
        }
    }
}

#[get("/confirmadas")]
pub async fn list_confirmed_appointments(
    db: Data<DatabaseService>,
    auth: AuthedUser,
) -> Result<HttpResponse> {
    match db.confirmed_appointments(auth.user_id) {
        Ok(appointments) => Ok(HttpResponse::Ok().json(appointments)),
        Err(err) => {
            error!("failed to list confirmed appointments: {err}");
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "message": "Erro ao carregar consultas confirmadas."
            })))
        }
    }
}

#[post("")]
pub async fn add_appointment(
    db: Data<DatabaseService>,
    push: Data<PushService>,
    auth: AuthedUser,
    payload: Json<CreateAppointmentRequest>,
) -> Result<HttpResponse> {
    if let Err(errors) = payload.validate() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": validation_message(&errors)
        })));
    }

    let appointment = match db.create_appointment(auth.user_id, payload.into_inner()) {
        Ok(appointment) => appointment,
        Err(err) => {
            error!("failed to create appointment: {err}");
            return Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "message": "Erro ao agendar consulta."
            })));
        }
    };

    let message = format!(
        "Sua consulta com {} ({}) foi agendada para {} às {}.",
        appointment.doctor_name, appointment.specialty, appointment.date, appointment.time
    );
    if let Err(err) = push
        .notify(auth.user_id, "Nova Consulta Agendada!", &message)
        .await
    {
        warn!("notification for new appointment {} failed: {err}", appointment.id);
    }

    Ok(HttpResponse::Created().json(serde_json::json!({
        "message": "Consulta agendada com sucesso!",
        "id": appointment.id,
    })))
}

#[post("/acao")]
pub async fn appointment_action(
    db: Data<DatabaseService>,
    push: Data<PushService>,
    auth: AuthedUser,
    payload: Json<AppointmentActionRequest>,
) -> Result<HttpResponse> {
    let Some(action) = AppointmentAction::from_name(&payload.acao) else {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Ação inválida"
        })));
    };

    let appointment: Appointment =
        match db.set_appointment_status(payload.id, auth.user_id, action.status) {
            Ok(appointment) => appointment,
            Err(DatabaseError::NotFound(_)) => {
                return Ok(HttpResponse::NotFound().json(serde_json::json!({
                    "message": "Consulta não encontrada"
                })));
            }
            Err(err) => {
                error!("failed to update appointment status: {err}");
                return Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                    "message": "Erro interno do servidor."
                })));
            }
        };

    let message = format!(
        "{} Detalhes: {} em {} às {}.",
        action.notification_message, appointment.doctor_name, appointment.date, appointment.time
    );
    if let Err(err) = push
        .notify(auth.user_id, action.notification_title, &message)
        .await
    {
        warn!(
            "notification for appointment {} status change failed: {err}",
            appointment.id
        );
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Status atualizado",
        "consulta": appointment,
    })))
}
