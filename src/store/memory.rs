use crate::{
    data::record::{NewRecord, Record, RecordFields},
    error::{MissingRecordSnafu, RejectedSnafu, StoreError},
    store::{Collection, RecordStore, StoreConnector},
};
use async_trait::async_trait;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A process-local collection with the same ordering and ownership rules as the Postgres one.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    collection: Collection,
    //newest first
    records: Arc<RwLock<Vec<Record>>>,
}

impl MemoryStore {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            records: Arc::default(),
        }
    }

    /// Every record regardless of owner.
    pub async fn all(&self) -> Vec<Record> {
        self.records.read().await.clone()
    }

    /// Inserts without going through any acting identity, returning the new id.
    pub async fn seed(&self, record: NewRecord) -> Uuid {
        let NewRecord { fields, owner_id } = record;
        let record = Record {
            id: Uuid::new_v4(),
            fields,
            owner_id,
            created_at: OffsetDateTime::now_utc(),
        };
        let id = record.id;
        self.records.write().await.insert(0, record);
        id
    }

    pub fn acting_as(&self, acting_as: Uuid) -> MemoryRecordStore {
        MemoryRecordStore {
            store: self.clone(),
            acting_as,
        }
    }
}

impl StoreConnector for MemoryStore {
    fn connect(&self, acting_as: Uuid) -> Arc<dyn RecordStore> {
        Arc::new(self.acting_as(acting_as))
    }
}

#[derive(Clone, Debug)]
pub struct MemoryRecordStore {
    store: MemoryStore,
    acting_as: Uuid,
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    fn collection(&self) -> &Collection {
        &self.store.collection
    }

    fn acting_as(&self) -> Uuid {
        self.acting_as
    }

    async fn list(&self, owner_id: Uuid) -> Result<Vec<Record>, StoreError> {
        snafu::ensure!(
            owner_id == self.acting_as,
            RejectedSnafu {
                reason: "records can only be listed by their owner"
            }
        );

        Ok(self
            .store
            .records
            .read()
            .await
            .iter()
            .filter(|record| record.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn insert(&self, record: NewRecord) -> Result<(), StoreError> {
        snafu::ensure!(
            record.owner_id == self.acting_as,
            RejectedSnafu {
                reason: "records can only be created for the logged-in user"
            }
        );

        self.store.seed(record).await;
        Ok(())
    }

    async fn update(&self, id: Uuid, fields: RecordFields) -> Result<(), StoreError> {
        let mut records = self.store.records.write().await;
        let record = records
            .iter_mut()
            .find(|record| record.id == id && record.owner_id == self.acting_as);
        let Some(record) = record else {
            return MissingRecordSnafu { id }.fail();
        };

        record.fields = fields;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut records = self.store.records.write().await;
        let Some(index) = records
            .iter()
            .position(|record| record.id == id && record.owner_id == self.acting_as)
        else {
            return MissingRecordSnafu { id }.fail();
        };

        records.remove(index);
        Ok(())
    }
}
