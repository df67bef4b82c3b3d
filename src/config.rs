use crate::{
    error::{BadEnvVarSnafu, ParsePortSnafu, ParseSessionDaysSnafu, RosterResult},
    store::Collection,
};
use dotenvy::var;
use secrecy::{ExposeSecret, SecretString};
use snafu::ResultExt;
use std::sync::Arc;

const DEFAULT_SERVER_IP: &str = "127.0.0.1:8080";
const DEFAULT_SESSION_DAYS: i64 = 5;

#[derive(Clone, Debug)]
pub struct RuntimeConfiguration {
    db_config: Arc<DbConfig>,
    server_ip: Arc<str>,
    collection: Collection,
    session_days: i64,
}

impl RuntimeConfiguration {
    pub fn new() -> RosterResult<Self> {
        let collection = match optional_var("ROSTER_COLLECTION") {
            Some(name) => Collection::new(&name)?,
            None => Collection::default(),
        };
        let session_days = match optional_var("ROSTER_SESSION_DAYS") {
            Some(days) => days.parse().context(ParseSessionDaysSnafu)?,
            None => DEFAULT_SESSION_DAYS,
        };

        Ok(Self {
            db_config: Arc::new(DbConfig::new()?),
            server_ip: optional_var("ROSTER_SERVER_IP")
                .unwrap_or_else(|| DEFAULT_SERVER_IP.to_string())
                .into(),
            collection,
            session_days,
        })
    }

    pub fn db_config(&self) -> Arc<DbConfig> {
        self.db_config.clone()
    }

    pub fn server_ip(&self) -> &str {
        &self.server_ip
    }

    pub const fn collection(&self) -> &Collection {
        &self.collection
    }

    pub const fn session_days(&self) -> i64 {
        self.session_days
    }
}

fn optional_var(name: &'static str) -> Option<String> {
    var(name).ok().filter(|value| !value.is_empty())
}

#[derive(Debug)]
pub struct DbConfig {
    user: String,
    password: SecretString,
    path: String,
    port: u16,
    database: String,
}

impl DbConfig {
    pub fn new() -> RosterResult<Self> {
        let get_env_var = |name| var(name).context(BadEnvVarSnafu { name });

        Ok(Self {
            user: get_env_var("DB_USER")?,
            password: SecretString::from(get_env_var("DB_PASSWORD")?),
            path: get_env_var("DB_PATH")?,
            port: get_env_var("DB_PORT")?.parse().context(ParsePortSnafu)?,
            database: get_env_var("DB_NAME")?,
        })
    }

    pub fn get_db_path(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user,
            self.password.expose_secret(),
            self.path,
            self.port,
            self.database
        )
    }
}
