#![warn(missing_docs)]
//! Tablewatch watches columns in user-owned MySQL tables and sends email and
//! Telegram notifications when configured conditions are met.

pub mod config;
pub mod evaluator;
pub mod http_client;
pub mod models;
pub mod notification;
pub mod persistence;
pub mod provider;
pub mod scheduler;
pub mod secrets;
pub mod test_helpers;
pub mod validator;
