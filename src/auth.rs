use crate::auth::backend::RosterAuthBackend;
use axum_login::AuthSession;

pub mod backend;
pub mod postgres_store;

pub type RosterSession = AuthSession<RosterAuthBackend>;
