//! The generic event-sourced object store.
//!
//! A store manages one object type `T`. Every mutation is recorded as an immutable event in an
//! append-only table; replicas reconstruct in-memory state by tailing that log. This module holds
//! the backend-agnostic pieces (the entity contract, the event envelope, the cursor/gap-buffering
//! protocol); [`postgres`] supplies the concrete SQL-backed [`ObjectStore`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::{EventId, ObjectId, UnixTime};

pub mod postgres;

/// Marker trait for every entity persisted by an [`ObjectStore`] (`User`, `Problem`, `Solution`, ...).
///
/// Implementors are plain data: the store clones them in and out, callers never hold references
/// into store-internal state.
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    fn id(&self) -> ObjectId;
    fn set_id(&mut self, id: ObjectId);
}

/// Closed enumeration of mutation kinds, applied with exhaustive case analysis rather than
/// virtual dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum EventKind {
    Create = 1,
    Update = 2,
    Delete = 3,
}

impl EventKind {
    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            1 => Some(EventKind::Create),
            2 => Some(EventKind::Update),
            3 => Some(EventKind::Delete),
            _ => None,
        }
    }
}

/// One row of an `<entity>_event` table: the event kind plus a full snapshot of the object's
/// fields at the time of the mutation. Delete events retain the object's last known field values
/// so replicas can still locate which row disappeared.
#[derive(Debug, Clone)]
pub struct StoreEvent<T> {
    pub event_id: EventId,
    pub event_kind: EventKind,
    pub event_time: UnixTime,
    pub event_account_id: Option<ObjectId>,
    pub object: T,
}

impl<T: Entity> StoreEvent<T> {
    pub fn object_id(&self) -> ObjectId {
        self.object.id()
    }
}

/// Capability record an entity supplies to the generic store so apply-time secondary indexes
/// (User by login, User by account_id, ...) stay in sync - a plain value the generic layer calls
/// into, not a supertrait/inheritance relationship.
///
/// All methods default to no-ops; a store with no secondary indexes need not override any of them.
pub trait StoreHooks<T>: Send + Sync {
    fn on_create(&self, _object: &T) {}
    fn on_update(&self, _previous: &T, _object: &T) {}
    fn on_delete(&self, _object: &T) {}
}

/// No-op hooks for stores with no secondary indexes to maintain.
pub struct NoHooks;
impl<T> StoreHooks<T> for NoHooks {}

/// Lock guard preventing concurrent structural operations on a store's event table. Released
/// when dropped. Concrete backends box their own guard type behind this.
pub trait UnlockOnDrop: Send + Sync + 'static {}

pub struct StoreLockGuard(#[allow(dead_code)] Box<dyn UnlockOnDrop>);

impl StoreLockGuard {
    pub fn new(lock: impl UnlockOnDrop) -> Self {
        Self(Box::new(lock))
    }
}

/// The generic store surface every concrete store (Users, Problems, Solutions, ...) exposes.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    type Object: Entity;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Writes both the object row and a `Create` event in one transaction; returns the object
    /// with its assigned id. `actor` is recorded on the event as `event_account_id`, when known.
    async fn create(&self, object: Self::Object, actor: Option<ObjectId>) -> Result<Self::Object, Self::Error>;

    /// Updates the row and appends an `Update` event. Fails with not-found if the object does not
    /// exist.
    async fn update(&self, object: Self::Object, actor: Option<ObjectId>) -> Result<(), Self::Error>;

    /// Removes the row and appends a `Delete` event. Fails with not-found if missing.
    async fn delete(&self, id: ObjectId, actor: Option<ObjectId>) -> Result<(), Self::Error>;

    /// Reads from the in-memory replica; does not touch the database.
    fn get(&self, id: ObjectId) -> Option<Self::Object>;

    /// Reads every object currently known to the in-memory replica.
    fn all(&self) -> Vec<Self::Object>;

    /// Pulls unseen events from the event table and applies them to the in-memory replica.
    async fn sync(&self) -> Result<(), Self::Error>;

    /// Issues an advisory, database-level lock on this store's event table, excluding concurrent
    /// writers for the lifetime of the returned guard.
    async fn lock(&self) -> Result<StoreLockGuard, Self::Error>;
}

/// Pure, backend-agnostic replication cursor implementing the gap-buffering protocol. Kept
/// separate from any SQL so the protocol itself - not just its Postgres plumbing - can be driven
/// deterministically in tests.
///
/// Event ids are assigned by the database on `INSERT`, but a row only becomes visible to readers
/// on commit; a transaction that started earlier may therefore commit (and become visible) after
/// one that started later. Without buffering, a replica scanning strictly by increasing id could
/// permanently miss the earlier event once its own cursor has passed it.
#[derive(Debug)]
pub struct ReplicaCursor<T> {
    /// Highest event id applied in unbroken, ascending sequence.
    last_applied: EventId,
    /// Events seen with `id > last_applied` that could not yet be applied in order, keyed by id,
    /// holding both the time they were first buffered and their full payload - the payload has to
    /// survive across calls, since an expired gap is skipped using whatever is already buffered,
    /// not a fresh read of the event table.
    pending: BTreeMap<EventId, (DateTime<Utc>, StoreEvent<T>)>,
}

impl<T> Default for ReplicaCursor<T> {
    fn default() -> Self {
        Self {
            last_applied: 0,
            pending: BTreeMap::new(),
        }
    }
}

impl<T: Entity> ReplicaCursor<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_applied(&self) -> EventId {
        self.last_applied
    }

    /// Feeds a batch of newly-read events (`event_id > last_applied`, ascending) plus whatever is
    /// still buffered from a previous call through the gap-buffering protocol, invoking `apply`
    /// for every event that becomes ready in this call, in ascending `event_id` order.
    ///
    /// `now` and `gap_expiry` together decide when a persistent gap is skipped rather than
    /// buffered forever: an expired gap is safe to skip because each event carries a full object
    /// snapshot, so the object's current state is recoverable from its next event (or a full
    /// rescan) regardless of which earlier event was dropped. Skipping only needs the payload
    /// already buffered - it never requires a fresh batch of events to arrive in the same call.
    pub fn advance<I, F>(&mut self, new_events: I, now: DateTime<Utc>, gap_expiry: chrono::Duration, mut apply: F)
    where
        I: IntoIterator<Item = StoreEvent<T>>,
        F: FnMut(&StoreEvent<T>),
    {
        let mut arrived: BTreeMap<EventId, (DateTime<Utc>, StoreEvent<T>)> = std::mem::take(&mut self.pending);

        for event in new_events {
            if event.event_id > self.last_applied {
                arrived.entry(event.event_id).or_insert((now, event));
            }
        }

        loop {
            let next_id = self.last_applied + 1;
            match arrived.remove(&next_id) {
                Some((_, event)) => {
                    apply(&event);
                    self.last_applied = next_id;
                }
                None => break,
            }
        }

        // Check whether the oldest open gap has outlived `gap_expiry`. If so, skip it using
        // whatever payload is already buffered for it, and resume applying a contiguous run from
        // there.
        if let Some((&oldest_pending_id, first_seen)) = arrived.iter().next().map(|(id, entry)| (id, entry.0)) {
            if now - first_seen >= gap_expiry {
                if let Some((_, event)) = arrived.remove(&oldest_pending_id) {
                    apply(&event);
                    self.last_applied = oldest_pending_id;

                    loop {
                        let next_id = self.last_applied + 1;
                        match arrived.remove(&next_id) {
                            Some((_, event)) => {
                                apply(&event);
                                self.last_applied = next_id;
                            }
                            None => break,
                        }
                    }
                }
            }
        }

        self.pending = arrived;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Dummy {
        id: ObjectId,
        value: i32,
    }

    impl Entity for Dummy {
        fn id(&self) -> ObjectId {
            self.id
        }
        fn set_id(&mut self, id: ObjectId) {
            self.id = id;
        }
    }

    fn event(id: EventId, value: i32) -> StoreEvent<Dummy> {
        StoreEvent {
            event_id: id,
            event_kind: EventKind::Update,
            event_time: 0,
            event_account_id: None,
            object: Dummy { id: 1, value },
        }
    }

    #[test]
    fn applies_events_in_order_as_they_arrive() {
        let mut cursor = ReplicaCursor::new();
        let mut applied = vec![];
        let now = Utc::now();

        cursor.advance(vec![event(1, 10), event(2, 20)], now, chrono::Duration::seconds(5), |e| {
            applied.push(e.object.value)
        });

        assert_eq!(applied, vec![10, 20]);
        assert_eq!(cursor.last_applied(), 2);
    }

    #[test]
    fn buffers_a_gap_and_applies_once_it_closes() {
        let mut cursor = ReplicaCursor::new();
        let mut applied = vec![];
        let now = Utc::now();

        // event 2 arrives before event 1 (its transaction committed first, was visible first).
        cursor.advance(vec![event(2, 20)], now, chrono::Duration::seconds(5), |e| applied.push(e.object.value));
        assert!(applied.is_empty());
        assert_eq!(cursor.last_applied(), 0);

        cursor.advance(vec![event(1, 10)], now, chrono::Duration::seconds(5), |e| applied.push(e.object.value));
        assert_eq!(applied, vec![10, 20]);
        assert_eq!(cursor.last_applied(), 2);
    }

    #[test]
    fn expired_gap_is_skipped_not_buffered_forever() {
        let mut cursor = ReplicaCursor::new();
        let mut applied = vec![];
        let t0 = Utc::now();

        cursor.advance(vec![event(2, 20)], t0, chrono::Duration::seconds(5), |e| applied.push(e.object.value));
        assert!(applied.is_empty());

        // Re-check past the expiry deadline, without event 1 ever showing up.
        let t1 = t0 + chrono::Duration::seconds(6);
        cursor.advance(Vec::<StoreEvent<Dummy>>::new(), t1, chrono::Duration::seconds(5), |e| {
            applied.push(e.object.value)
        });

        assert_eq!(applied, vec![20]);
        assert_eq!(cursor.last_applied(), 2);
    }

    #[test]
    fn gap_not_yet_expired_stays_buffered() {
        let mut cursor = ReplicaCursor::new();
        let mut applied = vec![];
        let t0 = Utc::now();

        cursor.advance(vec![event(2, 20)], t0, chrono::Duration::seconds(5), |e| applied.push(e.object.value));

        let t1 = t0 + chrono::Duration::seconds(2);
        cursor.advance(Vec::<StoreEvent<Dummy>>::new(), t1, chrono::Duration::seconds(5), |e| {
            applied.push(e.object.value)
        });

        assert!(applied.is_empty());
        assert_eq!(cursor.last_applied(), 0);
    }
}
