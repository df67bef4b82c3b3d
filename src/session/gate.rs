use crate::session::{Identity, SessionChange, SessionProvider};
use std::sync::Arc;
use tokio::{
    sync::{
        broadcast::{Receiver, error::RecvError},
        watch,
    },
    task::JoinHandle,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateStatus {
    Pending,
    Resolved(Identity),
    Unauthenticated,
}

impl GateStatus {
    pub const fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Resolved(identity) => Some(identity),
            _ => None,
        }
    }
}

/// Resolves who is logged in when a screen mounts and keeps track of it until the screen goes
/// away. Once unauthenticated the gate stays that way.
#[derive(Debug)]
pub struct SessionGate {
    status: Arc<watch::Sender<GateStatus>>,
    listener: Option<JoinHandle<()>>,
}

impl SessionGate {
    pub async fn start(provider: Arc<dyn SessionProvider>) -> Self {
        let status = Arc::new(watch::Sender::new(GateStatus::Pending));

        //subscribe first so a change racing the lookup isn't lost
        let changes = provider.on_session_change();
        let initial = lookup(provider.as_ref()).await;
        status.send_replace(initial.clone());

        let listener = match initial {
            GateStatus::Resolved(identity) => {
                info!(id = %identity.id, "session resolved");
                Some(tokio::spawn(listen(provider, changes, status.clone())))
            }
            _ => None,
        };

        Self { status, listener }
    }

    pub fn status(&self) -> GateStatus {
        self.status.borrow().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.status.borrow().identity().cloned()
    }

    pub fn watch(&self) -> watch::Receiver<GateStatus> {
        self.status.subscribe()
    }

    pub fn is_listening(&self) -> bool {
        self.listener
            .as_ref()
            .is_some_and(|listener| !listener.is_finished())
    }

    /// Drops the session-change subscription. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            debug!("session gate stopped");
        }
    }
}

impl Drop for SessionGate {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn lookup(provider: &dyn SessionProvider) -> GateStatus {
    match provider.current_session().await {
        Ok(Some(identity)) => GateStatus::Resolved(identity),
        Ok(None) => GateStatus::Unauthenticated,
        Err(e) => {
            warn!(?e, "session lookup failed, treating as logged out");
            GateStatus::Unauthenticated
        }
    }
}

async fn listen(
    provider: Arc<dyn SessionProvider>,
    mut changes: Receiver<SessionChange>,
    status: Arc<watch::Sender<GateStatus>>,
) {
    loop {
        let next = match changes.recv().await {
            Ok(SessionChange {
                session: Some(identity),
            }) => GateStatus::Resolved(identity),
            Ok(SessionChange { session: None }) => GateStatus::Unauthenticated,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "missed session changes, looking the session up again");
                lookup(provider.as_ref()).await
            }
            Err(RecvError::Closed) => {
                warn!("session provider went away");
                GateStatus::Unauthenticated
            }
        };

        let lost = next == GateStatus::Unauthenticated;
        status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });

        if lost {
            info!("session lost");
            break;
        }
    }
}
