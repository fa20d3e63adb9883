use chrono::{DateTime, Utc};

/// Identifier assigned to an object by the store on [`crate::store::ObjectStore::create`].
///
/// Every entity in the data model (`User`, `Problem`, `Solution`, ...) is keyed by one of these;
/// the store itself never interprets the value, it only hands out successive ones.
pub type ObjectId = i64;

/// Identifier of a row in an `<entity>_event` table. Strictly increasing per database, shared
/// across all entities stored by the same database (not per-object).
pub type EventId = i64;

/// Unix timestamp, seconds. Used for `create_time`, `begin_time`, and friends throughout the data
/// model, matching how the source schema stores them.
pub type UnixTime = i64;

/// Converts a `DateTime<Utc>` into the `UnixTime` representation used by the data model.
pub fn unix_time(at: DateTime<Utc>) -> UnixTime {
    at.timestamp()
}
