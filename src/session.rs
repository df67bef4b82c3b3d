use crate::error::AuthError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast::{Receiver, Sender, channel};
use uuid::Uuid;

pub mod gate;
pub mod hub;

/// Who is logged in, as far as the student screen is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub label: String,
}

/// Sent whenever a session starts, refreshes or ends. `None` means logged out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionChange {
    pub session: Option<Identity>,
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn current_session(&self) -> Result<Option<Identity>, AuthError>;

    /// Dropping the receiver is how a listener unsubscribes.
    fn on_session_change(&self) -> Receiver<SessionChange>;
}

/// A provider whose session is whatever it was last told, for embedding the screen in a
/// process that already knows who is logged in.
#[derive(Debug)]
pub struct LocalSessionProvider {
    current: Mutex<Result<Option<Identity>, AuthError>>,
    changes: Sender<SessionChange>,
}

impl LocalSessionProvider {
    pub fn new(session: Option<Identity>) -> Self {
        let (changes, _) = channel(16);
        Self {
            current: Mutex::new(Ok(session)),
            changes,
        }
    }

    /// Makes the next lookup fail, without notifying anyone.
    pub fn fail_lookups(&self, error: AuthError) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Err(error);
    }

    pub fn set(&self, session: Option<Identity>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Ok(session.clone());
        let _ = self.changes.send(SessionChange { session });
    }

    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }
}

#[async_trait]
impl SessionProvider for LocalSessionProvider {
    async fn current_session(&self) -> Result<Option<Identity>, AuthError> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn on_session_change(&self) -> Receiver<SessionChange> {
        self.changes.subscribe()
    }
}
