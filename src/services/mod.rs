pub mod database;
pub mod push;
