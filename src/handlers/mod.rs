pub mod appointment;
pub mod auth;
pub mod notification;
pub mod user;

use validator::ValidationErrors;

/// First human-readable message out of a failed validation, for the
/// `{"message": ...}` error bodies the client expects.
pub fn validation_message(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|field| field.iter())
        .find_map(|error| error.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Dados inválidos.".to_string())
}
