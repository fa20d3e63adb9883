use std::collections::HashMap;
use std::sync::{Arc, RwLock as StdRwLock};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::sync::RwLock as AsyncRwLock;

use crate::store::{Entity, EventKind, NoHooks, ObjectStore, ReplicaCursor, StoreEvent, StoreHooks, StoreLockGuard, UnlockOnDrop};
use crate::types::{EventId, ObjectId};

use super::Statements;

/// Error produced by the Postgres-backed [`ObjectStore`]: a thin wrapper around `sqlx`/`serde_json`
/// errors, plus the `not_found`/`conflict` distinction stores surface to callers.
pub use crate::error::StoreError as PgStoreError;

struct Inner<T: Entity, H> {
    pool: PgPool,
    statements: Statements,
    hooks: H,
    gap_expiry: Duration,
    /// Guards the replication cursor; held across the `SELECT ... fetch_all` await in
    /// `sync`/`sync_tx`, so it has to be the async-aware lock.
    cursor: AsyncRwLock<ReplicaCursor<T>>,
    /// Guards the materialized object map separately from the cursor, with a plain blocking lock:
    /// [`ObjectStore::get`]/[`ObjectStore::all`] are synchronous and must never treat "a sync is
    /// in progress" as "not found" the way a `try_read` against a busy async lock would.
    objects: StdRwLock<HashMap<ObjectId, T>>,
}

/// Default Postgres implementation of [`ObjectStore`]. `H` is the [`StoreHooks`] capability record
/// used to keep secondary indexes (User by login, by account_id, ...) in sync at apply time.
///
/// Cloning a `PgObjectStore` is cheap and yields a handle to the *same* replica: it is
/// `Arc`-wrapped so every request handler, and the invoker, share one in-memory view per process.
pub struct PgObjectStore<T: Entity, H: StoreHooks<T> = NoHooks> {
    inner: Arc<Inner<T, H>>,
}

impl<T: Entity, H: StoreHooks<T>> Clone for PgObjectStore<T, H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Builds a [`PgObjectStore`], creating its tables if needed. Stores maintain their own secondary
/// indexes via [`StoreHooks`] rather than externally registered handlers or buses - index
/// maintenance is intrinsic to the store, not a pluggable subscriber.
pub struct PgObjectStoreBuilder<T: Entity, H: StoreHooks<T> = NoHooks> {
    pool: PgPool,
    entity_name: &'static str,
    hooks: H,
    gap_expiry: Duration,
    create_tables: bool,
    _object: std::marker::PhantomData<T>,
}

impl<T: Entity> PgObjectStoreBuilder<T, NoHooks> {
    pub fn new(pool: PgPool, entity_name: &'static str) -> Self {
        Self {
            pool,
            entity_name,
            hooks: NoHooks,
            gap_expiry: Duration::seconds(5),
            create_tables: true,
            _object: std::marker::PhantomData,
        }
    }
}

impl<T: Entity, H: StoreHooks<T>> PgObjectStoreBuilder<T, H> {
    pub fn with_hooks<H2: StoreHooks<T>>(self, hooks: H2) -> PgObjectStoreBuilder<T, H2> {
        PgObjectStoreBuilder {
            pool: self.pool,
            entity_name: self.entity_name,
            hooks,
            gap_expiry: self.gap_expiry,
            create_tables: self.create_tables,
            _object: std::marker::PhantomData,
        }
    }

    pub fn with_gap_expiry(mut self, gap_expiry: Duration) -> Self {
        self.gap_expiry = gap_expiry;
        self
    }

    pub fn without_creating_tables(mut self) -> Self {
        self.create_tables = false;
        self
    }

    pub async fn try_build(self) -> Result<PgObjectStore<T, H>, PgStoreError> {
        let statements = Statements::new(self.entity_name);

        if self.create_tables {
            sqlx::query(&statements.create_object_table()).execute(&self.pool).await?;
            sqlx::query(&statements.create_event_table()).execute(&self.pool).await?;
            sqlx::query(&statements.create_event_object_id_index())
                .execute(&self.pool)
                .await?;
        }

        let store = PgObjectStore {
            inner: Arc::new(Inner {
                pool: self.pool,
                statements,
                hooks: self.hooks,
                gap_expiry: self.gap_expiry,
                cursor: AsyncRwLock::new(ReplicaCursor::new()),
                objects: StdRwLock::new(HashMap::new()),
            }),
        };

        store.sync().await?;
        Ok(store)
    }
}

struct PgAdvisoryLockGuard {
    pool: PgPool,
    key: i64,
}

impl UnlockOnDrop for PgAdvisoryLockGuard {}

impl Drop for PgAdvisoryLockGuard {
    fn drop(&mut self) {
        let pool = self.pool.clone();
        let key = self.key;
        tokio::spawn(async move {
            let _ = sqlx::query("SELECT pg_advisory_unlock($1)").bind(key).execute(&pool).await;
        });
    }
}

fn row_to_event<T: Entity>(row: sqlx::postgres::PgRow) -> Result<StoreEvent<T>, PgStoreError> {
    let event_id: EventId = row.try_get("event_id")?;
    let event_kind_raw: i16 = row.try_get("event_kind")?;
    let event_kind = EventKind::from_i16(event_kind_raw)
        .ok_or_else(|| PgStoreError::Fatal(format!("unknown event_kind {event_kind_raw} for event {event_id}")))?;
    let event_time: i64 = row.try_get("event_time")?;
    let event_account_id: Option<ObjectId> = row.try_get("event_account_id")?;
    let data: serde_json::Value = row.try_get("data")?;
    let object: T = serde_json::from_value(data)?;

    Ok(StoreEvent {
        event_id,
        event_kind,
        event_time,
        event_account_id,
        object,
    })
}

impl<T: Entity, H: StoreHooks<T>> PgObjectStore<T, H> {
    pub fn table_name(&self) -> &str {
        self.inner.statements.table_name()
    }

    /// Exposes the [`StoreHooks`] capability record, so concrete stores can layer secondary-index
    /// lookups (e.g. `UserStore::get_by_login`) on top of the generic [`ObjectStore`] surface.
    pub fn hooks(&self) -> &H {
        &self.inner.hooks
    }

    async fn insert_event(
        &self,
        transaction: &mut Transaction<'_, Postgres>,
        object: &T,
        kind: EventKind,
        actor: Option<ObjectId>,
    ) -> Result<(), PgStoreError> {
        let payload = serde_json::to_value(object)?;
        sqlx::query(&self.inner.statements.insert_event())
            .bind(object.id())
            .bind(kind as i16)
            .bind(Utc::now().timestamp())
            .bind(actor)
            .bind(payload)
            .execute(&mut **transaction)
            .await?;
        Ok(())
    }

    /// Pulls unseen events and applies them while reusing an already-open transaction, so two
    /// stores synced together (e.g. the invoker's Solutions+Reports) see a mutually consistent
    /// snapshot.
    pub async fn sync_tx(&self, transaction: &mut Transaction<'_, Postgres>) -> Result<(), PgStoreError> {
        let mut cursor = self.inner.cursor.write().await;
        let rows = sqlx::query(&self.inner.statements.select_events_after())
            .bind(cursor.last_applied())
            .fetch_all(&mut **transaction)
            .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            events.push(row_to_event::<T>(row)?);
        }

        let hooks = &self.inner.hooks;
        let mut objects = self.inner.objects.write().unwrap();
        cursor.advance(events, Utc::now(), self.inner.gap_expiry, |event| {
            apply_one(&mut objects, hooks, event);
        });

        Ok(())
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, PgStoreError> {
        Ok(self.inner.pool.begin().await?)
    }

    /// Conditional update: writes `object` and appends an `Update` event only if the row's
    /// current `data ->> json_field` still equals `expected`, returning whether the swap
    /// happened. The WHERE clause is evaluated by Postgres itself, so two callers racing this
    /// call on the same id can never both succeed - this is how the invoker's `Queued -> Running`
    /// claim stays exactly-once.
    pub async fn update_if(&self, object: T, actor: Option<ObjectId>, json_field: &str, expected: &str) -> Result<bool, PgStoreError> {
        let mut transaction = self.inner.pool.begin().await?;

        let payload = serde_json::to_value(&object)?;
        let sql = format!("UPDATE {} SET data = $1 WHERE id = $2 AND data ->> '{}' = $3", self.table_name(), json_field);
        let result = sqlx::query(&sql)
            .bind(&payload)
            .bind(object.id())
            .bind(expected)
            .execute(&mut *transaction)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        self.insert_event(&mut transaction, &object, EventKind::Update, actor).await?;
        transaction.commit().await?;
        self.sync().await?;
        Ok(true)
    }
}

fn apply_one<T: Entity, H: StoreHooks<T>>(objects: &mut HashMap<ObjectId, T>, hooks: &H, event: &StoreEvent<T>) {
    match event.event_kind {
        EventKind::Create => {
            objects.insert(event.object_id(), event.object.clone());
            hooks.on_create(&event.object);
        }
        EventKind::Update => {
            let previous = objects.insert(event.object_id(), event.object.clone());
            if let Some(previous) = previous {
                hooks.on_update(&previous, &event.object);
            } else {
                hooks.on_create(&event.object);
            }
        }
        EventKind::Delete => {
            objects.remove(&event.object_id());
            hooks.on_delete(&event.object);
        }
    }
}

#[async_trait]
impl<T: Entity, H: StoreHooks<T>> ObjectStore for PgObjectStore<T, H> {
    type Object = T;
    type Error = PgStoreError;

    #[tracing::instrument(skip_all, fields(table = self.table_name()), err)]
    async fn create(&self, mut object: T, actor: Option<ObjectId>) -> Result<T, PgStoreError> {
        let mut transaction = self.inner.pool.begin().await?;

        let payload = serde_json::to_value(&object)?;
        let row = sqlx::query(&self.inner.statements.insert_object())
            .bind(payload)
            .fetch_one(&mut *transaction)
            .await?;
        let id: ObjectId = row.try_get("id")?;
        object.set_id(id);

        self.insert_event(&mut transaction, &object, EventKind::Create, actor).await?;
        transaction.commit().await?;

        self.sync().await?;
        Ok(object)
    }

    #[tracing::instrument(skip_all, fields(table = self.table_name(), id = object.id()), err)]
    async fn update(&self, object: T, actor: Option<ObjectId>) -> Result<(), PgStoreError> {
        let mut transaction = self.inner.pool.begin().await?;

        let payload = serde_json::to_value(&object)?;
        let result = sqlx::query(&self.inner.statements.update_object())
            .bind(object.id())
            .bind(payload)
            .execute(&mut *transaction)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PgStoreError::NotFound);
        }

        self.insert_event(&mut transaction, &object, EventKind::Update, actor).await?;
        transaction.commit().await?;

        self.sync().await
    }

    #[tracing::instrument(skip_all, fields(table = self.table_name(), id = id), err)]
    async fn delete(&self, id: ObjectId, actor: Option<ObjectId>) -> Result<(), PgStoreError> {
        let object = self.get(id).ok_or(PgStoreError::NotFound)?;

        let mut transaction = self.inner.pool.begin().await?;
        let result = sqlx::query(&self.inner.statements.delete_object())
            .bind(id)
            .execute(&mut *transaction)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PgStoreError::NotFound);
        }

        self.insert_event(&mut transaction, &object, EventKind::Delete, actor).await?;
        transaction.commit().await?;

        self.sync().await
    }

    fn get(&self, id: ObjectId) -> Option<T> {
        self.inner.objects.read().unwrap().get(&id).cloned()
    }

    fn all(&self) -> Vec<T> {
        self.inner.objects.read().unwrap().values().cloned().collect()
    }

    #[tracing::instrument(skip_all, fields(table = self.table_name()), err)]
    async fn sync(&self) -> Result<(), PgStoreError> {
        let last_applied = self.inner.cursor.read().await.last_applied();
        let rows = sqlx::query(&self.inner.statements.select_events_after())
            .bind(last_applied)
            .fetch_all(&self.inner.pool)
            .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            events.push(row_to_event::<T>(row)?);
        }

        let mut cursor = self.inner.cursor.write().await;
        let hooks = &self.inner.hooks;
        let mut objects = self.inner.objects.write().unwrap();
        cursor.advance(events, Utc::now(), self.inner.gap_expiry, |event| {
            apply_one(&mut objects, hooks, event);
        });

        Ok(())
    }

    async fn lock(&self) -> Result<StoreLockGuard, PgStoreError> {
        let key = self.inner.statements.advisory_lock_key();
        sqlx::query("SELECT pg_advisory_lock($1)").bind(key).execute(&self.inner.pool).await?;

        Ok(StoreLockGuard::new(PgAdvisoryLockGuard {
            pool: self.inner.pool.clone(),
            key,
        }))
    }
}

impl<T: Entity, H: StoreHooks<T>> std::fmt::Debug for PgObjectStore<T, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgObjectStore").field("table", &self.table_name()).finish()
    }
}
