use crate::{
    data::record::{NewRecord, Record, RecordFields},
    error::{MissingRecordSnafu, RejectedSnafu, StoreError, TransportSnafu},
    store::{Collection, RecordStore, StoreConnector},
};
use async_trait::async_trait;
use snafu::ResultExt;
use sqlx::{Pool, Postgres};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct PgRecordStore {
    pool: Pool<Postgres>,
    collection: Collection,
    acting_as: Uuid,
}

impl PgRecordStore {
    pub const fn new(pool: Pool<Postgres>, collection: Collection, acting_as: Uuid) -> Self {
        Self {
            pool,
            collection,
            acting_as,
        }
    }

    fn transport(&self) -> TransportSnafu<String> {
        TransportSnafu {
            collection: self.collection.to_string(),
        }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    fn collection(&self) -> &Collection {
        &self.collection
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

        let query = format!(
            "SELECT id, full_name, registration_number, email, birth_date, owner_id, created_at FROM public.{} WHERE owner_id = $1 ORDER BY created_at DESC, id DESC",
            self.collection
        );
        sqlx::query_as::<_, Record>(&query)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .context(self.transport())
    }

    async fn insert(&self, record: NewRecord) -> Result<(), StoreError> {
        let NewRecord { fields, owner_id } = record;
        snafu::ensure!(
            owner_id == self.acting_as,
            RejectedSnafu {
                reason: "records can only be created for the logged-in user"
            }
        );

        let query = format!(
            "INSERT INTO public.{} (full_name, registration_number, email, birth_date, owner_id) VALUES ($1, $2, $3, $4, $5)",
            self.collection
        );
        sqlx::query(&query)
            .bind(fields.full_name)
            .bind(fields.registration_number)
            .bind(fields.email)
            .bind(fields.birth_date)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .context(self.transport())?;
        Ok(())
    }

    async fn update(&self, id: Uuid, fields: RecordFields) -> Result<(), StoreError> {
        let query = format!(
            "UPDATE public.{} SET full_name = $1, registration_number = $2, email = $3, birth_date = $4 WHERE id = $5 AND owner_id = $6",
            self.collection
        );
        let result = sqlx::query(&query)
            .bind(fields.full_name)
            .bind(fields.registration_number)
            .bind(fields.email)
            .bind(fields.birth_date)
            .bind(id)
            .bind(self.acting_as)
            .execute(&self.pool)
            .await
            .context(self.transport())?;

        //someone else's record looks exactly like a missing one
        snafu::ensure!(result.rows_affected() == 1, MissingRecordSnafu { id });
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let query = format!(
            "DELETE FROM public.{} WHERE id = $1 AND owner_id = $2",
            self.collection
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(self.acting_as)
            .execute(&self.pool)
            .await
            .context(self.transport())?;

        snafu::ensure!(result.rows_affected() == 1, MissingRecordSnafu { id });
        Ok(())
    }
}

/// Hands out [`PgRecordStore`]s sharing one pool.
#[derive(Clone, Debug)]
pub struct PgStoreConnector {
    pool: Pool<Postgres>,
    collection: Collection,
}

impl PgStoreConnector {
    pub const fn new(pool: Pool<Postgres>, collection: Collection) -> Self {
        Self { pool, collection }
    }
}

impl StoreConnector for PgStoreConnector {
    fn connect(&self, acting_as: Uuid) -> Arc<dyn RecordStore> {
        Arc::new(PgRecordStore::new(
            self.pool.clone(),
            self.collection.clone(),
            acting_as,
        ))
    }
}
