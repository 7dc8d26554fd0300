use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    appointment::{Appointment, AppointmentStatus, CreateAppointmentRequest},
    notification::Notification,
    subscription::{PushSubscription, SubscriptionKeys},
    user::{UpdateProfileRequest, User},
};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("armazenamento indisponível")]
    Unavailable,
    #[error("{0} não encontrado")]
    NotFound(&'static str),
    #[error("Este email já está cadastrado.")]
    DuplicateEmail,
}

/// In-process store shared by every handler and by the push delivery
/// service. Each table is an `Arc<Mutex<_>>`, so clones of the service all
/// see the same data.
#[derive(Clone, Default)]
pub struct DatabaseService {
    users: Arc<Mutex<Vec<User>>>,
    sessions: Arc<Mutex<HashMap<String, Uuid>>>,
    appointments: Arc<Mutex<Vec<Appointment>>>,
    notifications: Arc<Mutex<Vec<Notification>>>,
    push_subscriptions: Arc<Mutex<Vec<PushSubscription>>>,
}

fn lock<T>(table: &Mutex<T>) -> Result<MutexGuard<'_, T>, DatabaseError> {
    table.lock().map_err(|_| DatabaseError::Unavailable)
}

impl DatabaseService {
    pub fn new() -> Self {
        Self::default()
    }

    // User operations

    pub fn create_user(
        &self,
        name: String,
        email: String,
        password_hash: String,
    ) -> Result<User, DatabaseError> {
        let mut users = lock(&self.users)?;
        let email_lower = email.to_lowercase();
        if users.iter().any(|u| u.email == email_lower) {
            return Err(DatabaseError::DuplicateEmail);
        }
        let user = User::new(name, email, password_hash);
        users.push(user.clone());
        Ok(user)
    }

    pub fn get_user(&self, user_id: Uuid) -> Result<Option<User>, DatabaseError> {
        let users = lock(&self.users)?;
        Ok(users.iter().find(|u| u.id == user_id).cloned())
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let users = lock(&self.users)?;
        let email_lower = email.to_lowercase();
        Ok(users.iter().find(|u| u.email == email_lower).cloned())
    }

    pub fn update_profile(
        &self,
        user_id: Uuid,
        update: UpdateProfileRequest,
    ) -> Result<User, DatabaseError> {
        let mut users = lock(&self.users)?;
        let user = users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(DatabaseError::NotFound("usuário"))?;
        user.name = update.name;
        user.email = update.email.to_lowercase();
        user.profile_picture_url = update.profile_picture_url;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    pub fn update_password(
        &self,
        user_id: Uuid,
        password_hash: String,
    ) -> Result<(), DatabaseError> {
        let mut users = lock(&self.users)?;
        let user = users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(DatabaseError::NotFound("usuário"))?;
        user.password_hash = password_hash;
        user.updated_at = Utc::now();
        Ok(())
    }

    // Session operations

    pub fn create_session(&self, user_id: Uuid) -> Result<String, DatabaseError> {
        let mut sessions = lock(&self.sessions)?;
        let token = Uuid::new_v4().simple().to_string();
        sessions.insert(token.clone(), user_id);
        Ok(token)
    }

    pub fn get_session(&self, token: &str) -> Result<Option<Uuid>, DatabaseError> {
        let sessions = lock(&self.sessions)?;
        Ok(sessions.get(token).copied())
    }

    pub fn delete_session(&self, token: &str) -> Result<(), DatabaseError> {
        let mut sessions = lock(&self.sessions)?;
        sessions.remove(token);
        Ok(())
    }

    // Appointment operations

    pub fn create_appointment(
        &self,
        user_id: Uuid,
        dto: CreateAppointmentRequest,
    ) -> Result<Appointment, DatabaseError> {
        let mut appointments = lock(&self.appointments)?;
        let appointment = Appointment::new(user_id, dto);
        appointments.push(appointment.clone());
        Ok(appointment)
    }

    /// Everything except cancelled appointments, ordered by date and time.
    pub fn active_appointments(&self, user_id: Uuid) -> Result<Vec<Appointment>, DatabaseError> {
        self.appointments_where(user_id, |a| a.status != AppointmentStatus::Cancelled)
    }

    pub fn confirmed_appointments(&self, user_id: Uuid) -> Result<Vec<Appointment>, DatabaseError> {
        self.appointments_where(user_id, |a| a.status == AppointmentStatus::Confirmed)
    }

    fn appointments_where(
        &self,
        user_id: Uuid,
        predicate: impl Fn(&Appointment) -> bool,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let appointments = lock(&self.appointments)?;
        let mut found: Vec<Appointment> = appointments
            .iter()
            .filter(|a| a.user_id == user_id && predicate(a))
            .cloned()
            .collect();
        found.sort_by(|a, b| (a.date, a.time.as_str()).cmp(&(b.date, b.time.as_str())));
        Ok(found)
    }

    /// Updates the status of an appointment owned by `user_id`. An id that
    /// exists but belongs to another user reads as not found.
    pub fn set_appointment_status(
        &self,
        appointment_id: Uuid,
        user_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, DatabaseError> {
        let mut appointments = lock(&self.appointments)?;
        let appointment = appointments
            .iter_mut()
            .find(|a| a.id == appointment_id && a.user_id == user_id)
            .ok_or(DatabaseError::NotFound("consulta"))?;
        appointment.status = status;
        appointment.updated_at = Utc::now();
        Ok(appointment.clone())
    }

    pub fn count_appointments(&self, user_id: Uuid) -> Result<usize, DatabaseError> {
        let appointments = lock(&self.appointments)?;
        Ok(appointments.iter().filter(|a| a.user_id == user_id).count())
    }

    // Notification operations

    pub fn insert_notification(
        &self,
        user_id: Uuid,
        title: &str,
        message: &str,
    ) -> Result<Notification, DatabaseError> {
        let mut notifications = lock(&self.notifications)?;
        let notification = Notification::new(user_id, title.to_string(), message.to_string());
        notifications.push(notification.clone());
        Ok(notification)
    }

    /// Most recent first.
    pub fn notifications_for_user(&self, user_id: Uuid) -> Result<Vec<Notification>, DatabaseError> {
        let notifications = lock(&self.notifications)?;
        let mut found: Vec<Notification> = notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        Ok(found)
    }

    pub fn count_unread_notifications(&self, user_id: Uuid) -> Result<usize, DatabaseError> {
        let notifications = lock(&self.notifications)?;
        Ok(notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.read)
            .count())
    }

    pub fn set_notification_read(
        &self,
        notification_id: Uuid,
        user_id: Uuid,
        read: bool,
    ) -> Result<(), DatabaseError> {
        let mut notifications = lock(&self.notifications)?;
        let notification = notifications
            .iter_mut()
            .find(|n| n.id == notification_id && n.user_id == user_id)
            .ok_or(DatabaseError::NotFound("notificação"))?;
        notification.read = read;
        Ok(())
    }

    pub fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<(), DatabaseError> {
        let mut notifications = lock(&self.notifications)?;
        for notification in notifications.iter_mut().filter(|n| n.user_id == user_id) {
            notification.read = true;
        }
        Ok(())
    }

    // Push subscription operations

    /// Check-then-act upsert on the `(user_id, endpoint)` natural key: a
    /// second subscribe from the same endpoint rotates the keys in place.
    pub fn upsert_subscription(
        &self,
        user_id: Uuid,
        endpoint: &str,
        keys: SubscriptionKeys,
    ) -> Result<(), DatabaseError> {
        let mut subscriptions = lock(&self.push_subscriptions)?;
        match subscriptions
            .iter()
            .position(|s| s.user_id == user_id && s.endpoint == endpoint)
        {
            Some(index) => subscriptions[index].rotate_keys(keys),
            None => subscriptions.push(PushSubscription::new(user_id, endpoint.to_string(), keys)),
        }
        Ok(())
    }

    pub fn list_subscriptions(&self, user_id: Uuid) -> Result<Vec<PushSubscription>, DatabaseError> {
        let subscriptions = lock(&self.push_subscriptions)?;
        Ok(subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    pub fn delete_subscription(&self, endpoint: &str) -> Result<(), DatabaseError> {
        let mut subscriptions = lock(&self.push_subscriptions)?;
        subscriptions.retain(|s| s.endpoint != endpoint);
        Ok(())
    }

    pub fn has_subscription(&self, user_id: Uuid) -> Result<bool, DatabaseError> {
        let subscriptions = lock(&self.push_subscriptions)?;
        Ok(subscriptions.iter().any(|s| s.user_id == user_id))
    }

    /// Distinct users with at least one registered device, capped at `limit`.
    /// Used by the public broadcast test endpoint.
    pub fn subscribed_user_ids(&self, limit: usize) -> Result<Vec<Uuid>, DatabaseError> {
        let subscriptions = lock(&self.push_subscriptions)?;
        let mut ids: Vec<Uuid> = Vec::new();
        for subscription in subscriptions.iter() {
            if !ids.contains(&subscription.user_id) {
                ids.push(subscription.user_id);
                if ids.len() == limit {
                    break;
                }
            }
        }
        Ok(ids)
    }

    pub fn subscription_count(&self) -> Result<usize, DatabaseError> {
        let subscriptions = lock(&self.push_subscriptions)?;
        Ok(subscriptions.len())
    }

    /// Simulates storage unavailability by poisoning the subscription table
    /// mutex: every later access reports `DatabaseError::Unavailable`.
    #[cfg(test)]
    pub fn poison_subscriptions(&self) {
        let subscriptions = Arc::clone(&self.push_subscriptions);
        let _ = std::thread::spawn(move || {
            let _guard = subscriptions.lock().unwrap();
            panic!("poisoning subscription table");
        })
        .join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(p256dh: &str, auth: &str) -> SubscriptionKeys {
        SubscriptionKeys {
            p256dh: p256dh.to_string(),
            auth: auth.to_string(),
        }
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let db = DatabaseService::new();
        db.create_user("Ana".into(), "ana@exemplo.com".into(), "h1".into())
            .unwrap();
        let err = db
            .create_user("Outra Ana".into(), "ANA@exemplo.com".into(), "h2".into())
            .unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateEmail));
    }

    #[test]
    fn test_resubscribe_updates_keys_in_place() {
        let db = DatabaseService::new();
        let user_id = Uuid::new_v4();
        db.upsert_subscription(user_id, "https://push.example/e1", keys("k1", "a1"))
            .unwrap();
        db.upsert_subscription(user_id, "https://push.example/e1", keys("k2", "a2"))
            .unwrap();

        let subs = db.list_subscriptions(user_id).unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].p256dh, "k2");
        assert_eq!(subs[0].auth, "a2");
    }

    #[test]
    fn test_repeated_identical_subscribe_is_idempotent() {
        let db = DatabaseService::new();
        let user_id = Uuid::new_v4();
        for _ in 0..3 {
            db.upsert_subscription(user_id, "https://push.example/e1", keys("k", "a"))
                .unwrap();
        }
        assert_eq!(db.subscription_count().unwrap(), 1);
    }

    #[test]
    fn test_appointment_status_scoped_to_owner() {
        let db = DatabaseService::new();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let appointment = db
            .create_appointment(
                owner,
                CreateAppointmentRequest {
                    doctor_name: "Dr. Souza".into(),
                    specialty: "Cardiologia".into(),
                    date: chrono::NaiveDate::from_ymd_opt(2026, 9, 15).unwrap(),
                    time: "14:30".into(),
                    location: "Clínica Central".into(),
                },
            )
            .unwrap();

        let err = db
            .set_appointment_status(appointment.id, stranger, AppointmentStatus::Confirmed)
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));

        let updated = db
            .set_appointment_status(appointment.id, owner, AppointmentStatus::Confirmed)
            .unwrap();
        assert_eq!(updated.status, AppointmentStatus::Confirmed);
    }

    #[test]
    fn test_cancelled_appointments_kept_but_filtered() {
        let db = DatabaseService::new();
        let user_id = Uuid::new_v4();
        let appointment = db
            .create_appointment(
                user_id,
                CreateAppointmentRequest {
                    doctor_name: "Dra. Lima".into(),
                    specialty: "Dermatologia".into(),
                    date: chrono::NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
                    time: "09:00".into(),
                    location: "Unidade Norte".into(),
                },
            )
            .unwrap();
        db.set_appointment_status(appointment.id, user_id, AppointmentStatus::Cancelled)
            .unwrap();

        assert!(db.active_appointments(user_id).unwrap().is_empty());
        assert_eq!(db.count_appointments(user_id).unwrap(), 1);
    }

    #[test]
    fn test_notifications_listed_most_recent_first() {
        let db = DatabaseService::new();
        let user_id = Uuid::new_v4();
        db.insert_notification(user_id, "Primeira", "m1").unwrap();
        db.insert_notification(user_id, "Segunda", "m2").unwrap();

        let listed = db.notifications_for_user(user_id).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].sent_at >= listed[1].sent_at);

        db.mark_all_notifications_read(user_id).unwrap();
        assert_eq!(db.count_unread_notifications(user_id).unwrap(), 0);
    }

    #[test]
    fn test_subscribed_user_ids_distinct_and_capped() {
        let db = DatabaseService::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        db.upsert_subscription(first, "https://push.example/a", keys("k", "a"))
            .unwrap();
        db.upsert_subscription(first, "https://push.example/b", keys("k", "a"))
            .unwrap();
        db.upsert_subscription(second, "https://push.example/c", keys("k", "a"))
            .unwrap();

        let ids = db.subscribed_user_ids(10).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(db.subscribed_user_ids(1).unwrap(), vec![first]);
    }
}
