use crate::{
    data::user::User,
    error::{AuthError, SessionLookupSnafu},
    session::{Identity, SessionChange, SessionProvider},
};
use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use tokio::sync::broadcast::{Receiver, Sender, channel};
use uuid::Uuid;

/// Fans login/logout out to everything listening for one user.
#[derive(Clone, Debug, Default)]
pub struct SessionHub {
    channels: Arc<Mutex<HashMap<Uuid, Sender<SessionChange>>>>,
}

impl SessionHub {
    pub fn subscribe(&self, user_id: Uuid) -> Receiver<SessionChange> {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user_id)
            .or_insert_with(|| channel(16).0)
            .subscribe()
    }

    pub fn publish(&self, user_id: Uuid, session: Option<Identity>) {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = channels.get(&user_id) else {
            return;
        };

        let logged_out = session.is_none();
        let _ = sender.send(SessionChange { session });
        if logged_out || sender.receiver_count() == 0 {
            channels.remove(&user_id);
        }
    }
}

/// Session lookups for one account: the account must still exist, changes come through the hub.
#[derive(Clone, Debug)]
pub struct AccountSessionProvider {
    pool: Pool<Postgres>,
    hub: SessionHub,
    user_id: Uuid,
}

impl AccountSessionProvider {
    pub const fn new(pool: Pool<Postgres>, hub: SessionHub, user_id: Uuid) -> Self {
        Self { pool, hub, user_id }
    }
}

#[async_trait]
impl SessionProvider for AccountSessionProvider {
    async fn current_session(&self) -> Result<Option<Identity>, AuthError> {
        let lookup = async {
            let mut conn = self.pool.acquire().await.map_err(|e| e.to_string())?;
            User::get_from_db_by_id(self.user_id, &mut conn)
                .await
                .map_err(|e| e.to_string())
        };

        match lookup.await {
            Ok(user) => Ok(user.as_ref().map(User::identity)),
            Err(message) => SessionLookupSnafu { message }.fail(),
        }
    }

    fn on_session_change(&self) -> Receiver<SessionChange> {
        self.hub.subscribe(self.user_id)
    }
}
