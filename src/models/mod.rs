pub mod appointment;
pub mod notification;
pub mod subscription;
pub mod user;
