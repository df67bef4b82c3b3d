#![allow(dead_code)]

use async_trait::async_trait;
use roster::{
    data::record::{Field, NewRecord, Record, RecordFields},
    error::{StoreError, UnavailableSnafu},
    screen::{Intent, Screen, ScreenEvent},
    session::{Identity, LocalSessionProvider},
    store::{Collection, RecordStore, StoreConnector, memory::MemoryStore},
};
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};
use time::OffsetDateTime;
use tokio::sync::{Semaphore, broadcast::Receiver};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    List,
    Insert,
    Update,
    Delete,
}

/// Wraps the in-memory store so tests can see every call, fail chosen operations, slip a
/// foreign record into lists, hold mutations until released, and slow lists down.
pub struct ScriptedStore {
    inner: Arc<dyn RecordStore>,
    list_delay: Option<Duration>,
    calls: Mutex<Vec<Op>>,
    failing: Mutex<HashSet<Op>>,
    leak: Mutex<Option<Record>>,
    held: Mutex<Option<Arc<Semaphore>>>,
}

impl ScriptedStore {
    pub fn new(inner: Arc<dyn RecordStore>, list_delay: Option<Duration>) -> Self {
        Self {
            inner,
            list_delay,
            calls: Mutex::default(),
            failing: Mutex::default(),
            leak: Mutex::default(),
            held: Mutex::default(),
        }
    }

    pub fn calls(&self) -> Vec<Op> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls().into_iter().filter(|call| *call == op).count()
    }

    pub fn fail(&self, op: Op) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn heal(&self, op: Op) {
        self.failing.lock().unwrap().remove(&op);
    }

    pub fn leak_into_lists(&self, record: Record) {
        *self.leak.lock().unwrap() = Some(record);
    }

    /// Mutations block until [`ScriptedStore::release`] is called once per mutation.
    pub fn hold_mutations(&self) {
        *self.held.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self) {
        if let Some(held) = self.held.lock().unwrap().as_ref() {
            held.add_permits(1);
        }
    }

    async fn enter(&self, op: Op) -> Result<(), StoreError> {
        self.calls.lock().unwrap().push(op);

        if op != Op::List {
            let held = self.held.lock().unwrap().clone();
            if let Some(held) = held {
                held.acquire().await.unwrap().forget();
            }
        }

        if self.failing.lock().unwrap().contains(&op) {
            return UnavailableSnafu {
                message: format!("{op:?} refused by the test"),
            }
            .fail();
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for ScriptedStore {
    fn collection(&self) -> &Collection {
        self.inner.collection()
    }

    fn acting_as(&self) -> Uuid {
        self.inner.acting_as()
    }

    async fn list(&self, owner_id: Uuid) -> Result<Vec<Record>, StoreError> {
        self.enter(Op::List).await?;
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        let mut records = self.inner.list(owner_id).await?;
        if let Some(foreign) = self.leak.lock().unwrap().clone() {
            records.push(foreign);
        }
        Ok(records)
    }

    async fn insert(&self, record: NewRecord) -> Result<(), StoreError> {
        self.enter(Op::Insert).await?;
        self.inner.insert(record).await
    }

    async fn update(&self, id: Uuid, fields: RecordFields) -> Result<(), StoreError> {
        self.enter(Op::Update).await?;
        self.inner.update(id, fields).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.enter(Op::Delete).await?;
        self.inner.delete(id).await
    }
}

/// Hands out the one scripted store, whoever asks.
pub struct ScriptedConnector {
    pub memory: MemoryStore,
    pub scripted: Mutex<Option<Arc<ScriptedStore>>>,
    list_delay: Mutex<Option<Duration>>,
}

impl ScriptedConnector {
    pub fn new(memory: MemoryStore) -> Self {
        Self {
            memory,
            scripted: Mutex::default(),
            list_delay: Mutex::default(),
        }
    }

    /// Every list made through the store handed out later sleeps for `delay` first.
    pub fn slow_lists(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = Some(delay);
    }

    /// Whether a screen has connected and asked for its first list.
    pub fn listing(&self) -> bool {
        self.scripted
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|store| store.count(Op::List) > 0)
    }

    pub fn store(&self) -> Arc<ScriptedStore> {
        self.scripted
            .lock()
            .unwrap()
            .clone()
            .expect("no screen has connected yet")
    }
}

impl StoreConnector for ScriptedConnector {
    fn connect(&self, acting_as: Uuid) -> Arc<dyn RecordStore> {
        self.scripted
            .lock()
            .unwrap()
            .get_or_insert_with(|| {
                Arc::new(ScriptedStore::new(
                    Arc::new(self.memory.acting_as(acting_as)),
                    *self.list_delay.lock().unwrap(),
                ))
            })
            .clone()
    }
}

pub struct Harness {
    pub identity: Identity,
    pub provider: Arc<LocalSessionProvider>,
    pub memory: MemoryStore,
    pub connector: ScriptedConnector,
}

impl Harness {
    pub fn new() -> Self {
        let identity = Identity {
            id: Uuid::new_v4(),
            label: "mentor@school.test".into(),
        };
        let memory = MemoryStore::default();
        Self {
            provider: Arc::new(LocalSessionProvider::new(Some(identity.clone()))),
            connector: ScriptedConnector::new(memory.clone()),
            memory,
            identity,
        }
    }

    pub async fn mount(&self) -> Arc<Screen> {
        Arc::new(
            Screen::mount(self.provider.clone(), &self.connector)
                .await
                .expect("screen should mount"),
        )
    }

    pub fn store(&self) -> Arc<ScriptedStore> {
        self.connector.store()
    }

    pub async fn seed(&self, full_name: &str) -> Uuid {
        self.memory
            .seed(NewRecord {
                fields: fields(full_name),
                owner_id: self.identity.id,
            })
            .await
    }
}

pub fn fields(full_name: &str) -> RecordFields {
    let slug = full_name.to_lowercase().replace(' ', ".");
    RecordFields {
        full_name: full_name.into(),
        registration_number: format!("{}", full_name.len() * 1000 + 1),
        email: format!("{slug}@x.com"),
        birth_date: "2001-05-01".into(),
    }
}

pub fn foreign_record() -> Record {
    Record {
        id: Uuid::new_v4(),
        fields: fields("Somebody Else"),
        owner_id: Uuid::new_v4(),
        created_at: OffsetDateTime::now_utc(),
    }
}

pub fn fill_in(fields: &RecordFields) -> Vec<Intent> {
    Field::ALL
        .into_iter()
        .map(|field| Intent::EditField(field, fields.get(field).to_string()))
        .collect()
}

pub async fn dispatch_all(screen: &Screen, intents: impl IntoIterator<Item = Intent>) {
    for intent in intents {
        screen.dispatch(intent).await.expect("intent should be accepted");
    }
}

/// Everything sent so far, without waiting for more.
pub fn drain(events: &mut Receiver<ScreenEvent>) -> Vec<ScreenEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

pub async fn wait_for<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition never became true");
}
