use crate::{
    config::RuntimeConfiguration,
    data::user::User,
    error::{
        GetDatabaseConnectionSnafu, MakeQuerySnafu, MigrateSnafu, OpenDatabaseSnafu, RosterResult,
    },
    maud_conveniences::render_nav,
    screen::{Screen, ScreenRegistry},
    session::hub::{AccountSessionProvider, SessionHub},
    store::{DEFAULT_COLLECTION, postgres::PgStoreConnector},
};
use maud::{DOCTYPE, Markup, html};
use snafu::ResultExt;
use sqlx::{Pool, Postgres, pool::PoolConnection, postgres::PgPoolOptions};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct RosterState {
    pool: Pool<Postgres>,
    config: RuntimeConfiguration,
    sessions: SessionHub,
    screens: Arc<ScreenRegistry>,
    connector: PgStoreConnector,
}

impl RosterState {
    pub async fn new(options: PgPoolOptions, config: RuntimeConfiguration) -> RosterResult<Self> {
        let pool = options
            .connect(&config.db_config().get_db_path())
            .await
            .context(OpenDatabaseSnafu)?;

        sqlx::migrate!().run(&pool).await.context(MigrateSnafu)?;

        //custom collections share the shape of the default one
        if config.collection().as_str() != DEFAULT_COLLECTION {
            let query = format!(
                "CREATE TABLE IF NOT EXISTS public.{} (LIKE public.{DEFAULT_COLLECTION} INCLUDING ALL)",
                config.collection()
            );
            sqlx::query(&query)
                .execute(&pool)
                .await
                .context(MakeQuerySnafu)?;
            info!(collection = %config.collection(), "using custom collection");
        }

        let connector = PgStoreConnector::new(pool.clone(), config.collection().clone());

        Ok(Self {
            pool,
            config,
            sessions: SessionHub::default(),
            screens: Arc::default(),
            connector,
        })
    }

    #[allow(clippy::unused_self, clippy::needless_pass_by_value)] //in case self is ever needed :), and to allow direct html! usage
    pub fn render(&self, user: Option<&User>, markup: Markup) -> Markup {
        let nav = render_nav(user);

        html! {
            (DOCTYPE)
            html {
                head {
                    meta charset="UTF-8" {}
                    meta name="viewport" content="width=device-width, initial-scale=1.0" {}
                    script src="https://unpkg.com/htmx.org@2.0.4" integrity="sha384-HGfztofotfshcF7+8n44JQL2oJmowVChPTg48S+jvZoztPfvwD79OC/LTtG6dMp+" crossorigin="anonymous" {}
                    script src="https://unpkg.com/htmx-ext-sse@2.2.3" integrity="sha384-Y4gc0CK6Kg+hmulDc6rZPJu0tqvk7EWlih0Oh+2OkAi1ZDlCbBDCQEE2uVk472Ky" crossorigin="anonymous" {}
                    script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4" {}
                    title { "Roster" }
                }
                body hx-ext="sse" class="bg-gray-900 min-h-screen flex flex-col items-center text-white" {
                    (nav)
                    (markup)
                }
            }
        }
    }

    pub async fn get_connection(&self) -> RosterResult<PoolConnection<Postgres>> {
        self.pool
            .acquire()
            .await
            .context(GetDatabaseConnectionSnafu)
    }

    pub const fn config(&self) -> &RuntimeConfiguration {
        &self.config
    }

    pub const fn sessions(&self) -> &SessionHub {
        &self.sessions
    }

    pub fn screens(&self) -> &ScreenRegistry {
        &self.screens
    }

    /// The user's mounted student screen, mounting it if needed.
    pub async fn screen_for(&self, user: &User) -> RosterResult<Arc<Screen>> {
        let provider = Arc::new(AccountSessionProvider::new(
            self.pool.clone(),
            self.sessions.clone(),
            user.id,
        ));

        Ok(self
            .screens
            .get_or_mount(user.id, provider, &self.connector)
            .await?)
    }

    pub async fn sensible_shutdown(&self) -> RosterResult<()> {
        info!("closing database pool");
        self.pool.close().await;
        Ok(())
    }
}
