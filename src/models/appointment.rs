use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AppointmentStatus {
    Awaiting,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub doctor_name: String,
    pub specialty: String,
    pub date: NaiveDate,
    /// Kept as "HH:MM" text, the same shape the client submits and displays.
    pub time: String,
    pub location: String,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn new(user_id: Uuid, dto: CreateAppointmentRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            doctor_name: dto.doctor_name,
            specialty: dto.specialty,
            date: dto.date,
            time: dto.time,
            location: dto.location,
            status: AppointmentStatus::Awaiting,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAppointmentRequest {
    #[validate(length(min = 1, message = "Nome do médico é obrigatório."))]
    pub doctor_name: String,
    #[validate(length(min = 1, message = "Especialidade é obrigatória."))]
    pub specialty: String,
    pub date: NaiveDate,
    #[validate(length(min = 1, message = "Horário é obrigatório."))]
    pub time: String,
    #[validate(length(min = 1, message = "Local é obrigatório."))]
    pub location: String,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentActionRequest {
    pub id: Uuid,
    pub acao: String,
}

/// Result of applying one of the triage actions to an appointment.
pub struct AppointmentAction {
    pub status: AppointmentStatus,
    pub notification_title: &'static str,
    pub notification_message: &'static str,
}

impl AppointmentAction {
    /// Maps the action names submitted by the client to the resulting status
    /// and the notification copy announcing it.
    pub fn from_name(acao: &str) -> Option<Self> {
        match acao {
            "confirmar" => Some(Self {
                status: AppointmentStatus::Confirmed,
                notification_title: "Consulta Confirmada",
                notification_message: "Sua consulta foi confirmada.",
            }),
            "desmarcar" => Some(Self {
                status: AppointmentStatus::Awaiting,
                notification_title: "Consulta Desmarcada",
                notification_message: "Sua consulta foi desmarcada e aguarda nova confirmação.",
            }),
            "cancelar" => Some(Self {
                status: AppointmentStatus::Cancelled,
                notification_title: "Consulta Cancelada",
                notification_message: "Sua consulta foi cancelada.",
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_appointment_awaits_confirmation() {
        let dto = CreateAppointmentRequest {
            doctor_name: "Dr. Souza".to_string(),
            specialty: "Cardiologia".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 9, 15).unwrap(),
            time: "14:30".to_string(),
            location: "Clínica Central".to_string(),
        };
        let appointment = Appointment::new(Uuid::new_v4(), dto);
        assert_eq!(appointment.status, AppointmentStatus::Awaiting);
    }

    #[test]
    fn test_action_mapping() {
        let confirm = AppointmentAction::from_name("confirmar").unwrap();
        assert_eq!(confirm.status, AppointmentStatus::Confirmed);
        assert_eq!(confirm.notification_title, "Consulta Confirmada");

        let unschedule = AppointmentAction::from_name("desmarcar").unwrap();
        assert_eq!(unschedule.status, AppointmentStatus::Awaiting);

        let cancel = AppointmentAction::from_name("cancelar").unwrap();
        assert_eq!(cancel.status, AppointmentStatus::Cancelled);

        assert!(AppointmentAction::from_name("remarcar").is_none());
    }
}
