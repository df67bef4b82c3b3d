use crate::{
    error::{BcryptSnafu, EmailSnafu, JoinBlockingSnafu, MakeQuerySnafu, RosterResult},
    session::Identity,
};
use axum_login::AuthUser;
use bcrypt::DEFAULT_COST;
use email_address::EmailAddress;
use secrecy::{ExposeSecret, SecretString};
use snafu::ResultExt;
use sqlx::PgConnection;
use std::str::FromStr;
use uuid::Uuid;

/// An account that can log in and own student records.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub email: EmailAddress,
    pub bcrypt_hashed_password: SecretString,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    display_name: Option<String>,
    email: String,
    bcrypt_hashed_password: String,
}

impl TryFrom<UserRow> for User {
    type Error = crate::error::RosterError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            display_name: row.display_name,
            email: EmailAddress::from_str(&row.email).context(EmailSnafu)?,
            bcrypt_hashed_password: SecretString::from(row.bcrypt_hashed_password),
        })
    }
}

impl User {
    pub async fn get_from_db_by_id(id: Uuid, conn: &mut PgConnection) -> RosterResult<Option<Self>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM public.users WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await
            .context(MakeQuerySnafu)?
            .map(Self::try_from)
            .transpose()
    }

    pub async fn get_from_db_by_email(
        email: &str,
        conn: &mut PgConnection,
    ) -> RosterResult<Option<Self>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM public.users WHERE email = $1")
            .bind(email)
            .fetch_optional(conn)
            .await
            .context(MakeQuerySnafu)?
            .map(Self::try_from)
            .transpose()
    }

    pub async fn insert_into_database(
        email: EmailAddress,
        display_name: Option<String>,
        password: SecretString,
        conn: &mut PgConnection,
    ) -> RosterResult<Uuid> {
        let hashed = tokio::task::spawn_blocking(move || {
            bcrypt::hash(password.expose_secret().as_bytes(), DEFAULT_COST)
        })
        .await
        .context(JoinBlockingSnafu)?
        .context(BcryptSnafu)?;

        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO public.users (email, display_name, bcrypt_hashed_password) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(email.as_str())
        .bind(display_name)
        .bind(hashed)
        .fetch_one(conn)
        .await
        .context(MakeQuerySnafu)
    }

    /// The label shown in the screen header.
    pub fn label(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| self.email.to_string())
    }

    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            label: self.label(),
        }
    }
}

impl AuthUser for User {
    type Id = Uuid;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn session_auth_hash(&self) -> &[u8] {
        self.bcrypt_hashed_password.expose_secret().as_bytes()
    }
}
