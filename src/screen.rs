//! Drives a [`RecordController`] against a real store and session.
//!
//! Store calls are made without holding the controller lock, so the screen keeps taking
//! intents (like cancel) while one is outstanding. Everything that changes is announced on a
//! broadcast channel for whatever is drawing the screen.

use crate::{
    controller::{Notice, RecordController, Snapshot, StoreOp, StoreReply, StoreRequest},
    data::record::Field,
    error::{AuthError, IntentError, NoSessionSnafu},
    session::{
        Identity, SessionProvider,
        gate::{GateStatus, SessionGate},
    },
    store::{RecordStore, StoreConnector},
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::{
    sync::{
        Mutex,
        broadcast::{Receiver, Sender, channel},
        watch,
    },
    task::JoinHandle,
};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenEvent {
    Changed,
    Notice(Notice),
    Exited,
}

impl ScreenEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Changed => "screen_changed",
            Self::Notice(_) => "notice",
            Self::Exited => "exited",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    OpenCreate,
    OpenEdit(Uuid),
    EditField(Field, String),
    Cancel,
    Submit,
    RequestDelete(Uuid),
    ConfirmDelete,
    CancelDelete,
    Refresh,
}

struct Inner {
    controller: Mutex<RecordController>,
    store: Arc<dyn RecordStore>,
    events: Sender<ScreenEvent>,
    exit_announced: AtomicBool,
}

impl Inner {
    async fn run(&self, mut request: Option<StoreRequest>) {
        while let Some(StoreRequest { ticket, op }) = request.take() {
            let reply = self.execute(op).await;

            let mut controller = self.controller.lock().await;
            request = controller.resolve(ticket, reply);
            self.publish(&mut controller);
        }
    }

    async fn execute(&self, op: StoreOp) -> StoreReply {
        match op {
            StoreOp::List { owner_id } => StoreReply::Listed(self.store.list(owner_id).await),
            StoreOp::Insert(record) => StoreReply::Done(self.store.insert(record).await),
            StoreOp::Update { id, fields } => StoreReply::Done(self.store.update(id, fields).await),
            StoreOp::Delete { id } => StoreReply::Done(self.store.delete(id).await),
        }
    }

    fn publish(&self, controller: &mut RecordController) {
        for notice in controller.take_notices() {
            let _ = self.events.send(ScreenEvent::Notice(notice));
        }
        let _ = self.events.send(ScreenEvent::Changed);
    }

    //at most once, whether the session ended or the screen was torn down first
    fn announce_exit(&self) {
        if !self.exit_announced.swap(true, Ordering::AcqRel) {
            let _ = self.events.send(ScreenEvent::Exited);
        }
    }
}

/// One mounted student screen.
pub struct Screen {
    inner: Arc<Inner>,
    gate: SessionGate,
    watcher: JoinHandle<()>,
}

impl Screen {
    /// Resolves the session, then loads that identity's records. Fails if nobody is logged in.
    pub async fn mount(
        provider: Arc<dyn SessionProvider>,
        connector: &dyn StoreConnector,
    ) -> Result<Self, AuthError> {
        let gate = SessionGate::start(provider).await;
        let Some(identity) = gate.identity() else {
            return NoSessionSnafu.fail();
        };

        let store = connector.connect(identity.id);
        info!(
            collection = %store.collection(),
            acting_as = %store.acting_as(),
            "mounting student screen"
        );
        let (controller, first_list) = RecordController::new(identity);
        let (events, _) = channel(64);
        let inner = Arc::new(Inner {
            controller: Mutex::new(controller),
            store,
            events,
            exit_announced: AtomicBool::new(false),
        });

        let watcher = tokio::spawn(follow_session(inner.clone(), gate.watch()));
        inner.run(Some(first_list)).await;

        Ok(Self {
            inner,
            gate,
            watcher,
        })
    }

    pub async fn dispatch(&self, intent: Intent) -> Result<(), IntentError> {
        let request = {
            let mut controller = self.inner.controller.lock().await;
            let request = match intent {
                Intent::OpenCreate => controller.open_create().map(|()| None),
                Intent::OpenEdit(id) => controller.open_edit(id).map(|()| None),
                Intent::EditField(field, value) => controller.edit_field(field, value).map(|()| None),
                Intent::Cancel => controller.cancel(),
                Intent::Submit => controller.submit().map(Some),
                Intent::RequestDelete(id) => controller.request_delete(id).map(|()| None),
                Intent::ConfirmDelete => controller.confirm_delete().map(Some),
                Intent::CancelDelete => controller.cancel_delete(),
                Intent::Refresh => controller.refresh().map(Some),
            }?;
            self.inner.publish(&mut controller);
            request
        };

        self.inner.run(request).await;
        Ok(())
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.inner.controller.lock().await.snapshot()
    }

    pub async fn identity(&self) -> Identity {
        self.inner.controller.lock().await.identity().clone()
    }

    pub async fn is_exited(&self) -> bool {
        self.inner.controller.lock().await.is_exited()
    }

    pub fn subscribe(&self) -> Receiver<ScreenEvent> {
        self.inner.events.subscribe()
    }

    pub fn gate_status(&self) -> GateStatus {
        self.gate.status()
    }

    /// Releases the session subscription. Dropping the screen does the same.
    pub fn unmount(mut self) {
        self.release();
    }

    fn release(&mut self) {
        self.watcher.abort();
        self.gate.stop();
        self.inner.announce_exit();
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        self.release();
    }
}

async fn follow_session(inner: Arc<Inner>, mut status: watch::Receiver<GateStatus>) {
    while status.changed().await.is_ok() {
        let session = match &*status.borrow_and_update() {
            GateStatus::Resolved(identity) => Some(identity.clone()),
            GateStatus::Unauthenticated => None,
            GateStatus::Pending => continue,
        };

        let mut controller = inner.controller.lock().await;
        controller.session_changed(session);
        inner.publish(&mut controller);

        if controller.is_exited() {
            inner.announce_exit();
            break;
        }
    }
}

/// The mounted screen for each user, mounted on first visit and again after it exits.
///
/// The map lock is only held to find a user's slot. Mounting happens under that user's own
/// slot lock, so a slow store for one user never holds up anybody else.
#[derive(Default)]
pub struct ScreenRegistry {
    screens: Mutex<HashMap<Uuid, Arc<Mutex<Option<Arc<Screen>>>>>>,
}

impl ScreenRegistry {
    pub async fn get_or_mount(
        &self,
        user_id: Uuid,
        provider: Arc<dyn SessionProvider>,
        connector: &dyn StoreConnector,
    ) -> Result<Arc<Screen>, AuthError> {
        let slot = self.screens.lock().await.entry(user_id).or_default().clone();

        let mut slot = slot.lock().await;
        if let Some(screen) = slot.as_ref() {
            if !screen.is_exited().await {
                return Ok(screen.clone());
            }
        }

        let screen = Arc::new(Screen::mount(provider, connector).await?);
        *slot = Some(screen.clone());
        Ok(screen)
    }

    pub async fn unmount(&self, user_id: Uuid) {
        if self.screens.lock().await.remove(&user_id).is_some() {
            debug!(%user_id, "screen unmounted");
        }
    }
}

impl std::fmt::Debug for ScreenRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenRegistry").finish_non_exhaustive()
    }
}
