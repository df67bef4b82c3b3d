use crate::{auth::backend::RosterAuthBackend, data::record::Field};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use maud::html;
use snafu::Snafu;
use std::num::ParseIntError;
use uuid::Uuid;

pub type RosterResult<T> = Result<T, RosterError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RosterError {
    #[snafu(display("Error opening database"))]
    OpenDatabase { source: sqlx::Error },
    #[snafu(display("Error getting db connection"))]
    GetDatabaseConnection { source: sqlx::Error },
    #[snafu(display("Error making SQL query"))]
    MakeQuery { source: sqlx::Error },
    #[snafu(display("Error migrating DB schema"))]
    MigrateError { source: sqlx::migrate::MigrateError },
    #[snafu(display("Error serialising with rmp_serde"))]
    RmpSerdeEncode { source: rmp_serde::encode::Error },
    #[snafu(display("Error deserialising with rmp_serde"))]
    RmpSerdeDecode { source: rmp_serde::decode::Error },
    #[snafu(display("Unable to retrieve env var `{}`", name))]
    BadEnvVar {
        source: dotenvy::Error,
        name: &'static str,
    },
    #[snafu(display("Unable to parse IP port"))]
    ParsePort { source: ParseIntError },
    #[snafu(display("Unable to parse session length in days"))]
    ParseSessionDays { source: ParseIntError },
    #[snafu(display("{:?} is not a usable collection name", name))]
    InvalidCollection { name: String },
    #[snafu(display("Error with hashing/password verification"))]
    Bcrypt { source: bcrypt::BcryptError },
    #[snafu(display("Unable to join blocking task"))]
    JoinBlocking { source: tokio::task::JoinError },
    #[snafu(display("Error with sessions"))]
    TowerSession {
        source: axum_login::tower_sessions::session::Error,
    },
    #[snafu(display("Error parsing email address"))]
    Email { source: email_address::Error },
    #[snafu(display("Record store error"))]
    Store { source: StoreError },
    #[snafu(display("Authentication error"))]
    Auth { source: AuthError },
    #[snafu(display("Unable to handle that action"))]
    Intent { source: IntentError },
}

/// Failures of a single request against the record store. These are always recoverable:
/// the screen surfaces them and stays where it was.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    #[snafu(display("Unable to reach the `{}` collection: {}", collection, source))]
    Transport {
        source: sqlx::Error,
        collection: String,
    },
    #[snafu(display("Request rejected by the access policy: {}", reason))]
    Rejected { reason: String },
    #[snafu(display("Unable to find record with UUID: {}", id))]
    MissingRecord { id: Uuid },
    #[snafu(display("Record {} belongs to {}, not to the current user", id, owner_id))]
    ForeignRecord { id: Uuid, owner_id: Uuid },
    #[snafu(display("Record store unavailable: {}", message))]
    Unavailable { message: String },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StoreErrorKind {
    Transport,
    Policy,
    NotFound,
    Unavailable,
}

impl StoreError {
    pub const fn kind(&self) -> StoreErrorKind {
        match self {
            Self::Transport { .. } => StoreErrorKind::Transport,
            Self::Rejected { .. } | Self::ForeignRecord { .. } => StoreErrorKind::Policy,
            Self::MissingRecord { .. } => StoreErrorKind::NotFound,
            Self::Unavailable { .. } => StoreErrorKind::Unavailable,
        }
    }
}

#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum AuthError {
    #[snafu(display("Unable to look up the current session: {}", message))]
    SessionLookup { message: String },
    #[snafu(display("No user is logged in"))]
    NoSession,
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum ValidationError {
    #[snafu(display("{} is required", field.label()))]
    MissingField { field: Field },
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum IntentError {
    #[snafu(display("Cannot {} while {}", intent, phase))]
    NotAllowed {
        intent: &'static str,
        phase: &'static str,
    },
    #[snafu(display("No listed record with UUID: {}", id))]
    UnknownRecord { id: Uuid },
    #[snafu(display("The screen has exited"))]
    ScreenExited,
    #[snafu(display("Form is incomplete"))]
    Invalid { source: ValidationError },
}

impl From<axum_login::Error<RosterAuthBackend>> for RosterError {
    fn from(value: axum_login::Error<RosterAuthBackend>) -> Self {
        match value {
            axum_login::Error::Session(source) => Self::TowerSession { source },
            axum_login::Error::Backend(backend) => backend,
        }
    }
}

impl From<StoreError> for RosterError {
    fn from(source: StoreError) -> Self {
        Self::Store { source }
    }
}

impl From<AuthError> for RosterError {
    fn from(source: AuthError) -> Self {
        Self::Auth { source }
    }
}

impl From<IntentError> for RosterError {
    fn from(source: IntentError) -> Self {
        Self::Intent { source }
    }
}

impl IntoResponse for RosterError {
    #[allow(clippy::match_same_arms)]
    fn into_response(self) -> Response {
        const ISE: StatusCode = StatusCode::INTERNAL_SERVER_ERROR; //internal server error
        const NF: StatusCode = StatusCode::NOT_FOUND; //not found
        const NA: StatusCode = StatusCode::FORBIDDEN; //not allowed
        const BI: StatusCode = StatusCode::BAD_REQUEST; //bad input

        let basic_error = |desc| {
            html! {
                div class="bg-red-100 border border-red-400 text-red-700 px-4 py-3 rounded relative mb-4" role="alert" {
                    strong class="font-bold" {"Roster Error "}
                    span {(desc)}
                }
            }
        };

        let status_code = match &self {
            Self::OpenDatabase { .. } | Self::GetDatabaseConnection { .. } => ISE,
            Self::MigrateError { .. } => ISE,
            Self::MakeQuery { source } => match source {
                sqlx::Error::RowNotFound => NF,
                _ => ISE,
            },
            Self::RmpSerdeEncode { .. } => ISE,
            Self::RmpSerdeDecode { .. } => BI,
            Self::BadEnvVar { .. } | Self::ParsePort { .. } | Self::ParseSessionDays { .. } => ISE,
            Self::InvalidCollection { .. } => ISE,
            Self::Bcrypt { .. } | Self::JoinBlocking { .. } => ISE,
            Self::TowerSession { .. } => ISE,
            Self::Email { .. } => BI,
            Self::Store { source } => match source.kind() {
                StoreErrorKind::Policy => NA,
                StoreErrorKind::NotFound => NF,
                StoreErrorKind::Transport | StoreErrorKind::Unavailable => ISE,
            },
            Self::Auth { .. } => StatusCode::UNAUTHORIZED,
            Self::Intent { source } => match source {
                IntentError::Invalid { .. } => BI,
                IntentError::UnknownRecord { .. } => NF,
                IntentError::NotAllowed { .. } | IntentError::ScreenExited => StatusCode::CONFLICT,
            },
        };

        let desc = match &self {
            Self::Store { source } => source.to_string(),
            Self::Auth { source } => source.to_string(),
            Self::Intent {
                source: IntentError::Invalid { source },
            } => source.to_string(),
            Self::Intent { source } => source.to_string(),
            other => other.to_string(),
        };

        error!(?self, "Error!");
        (status_code, basic_error(desc)).into_response()
    }
}
