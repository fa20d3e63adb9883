//! Postgres-backed [`super::ObjectStore`]: an `Arc`-wrapped inner struct holding the pool plus
//! per-table SQL, a builder that runs migrations before handing out the store, and an
//! advisory-lock guard released on drop.

mod statement;
mod store;

pub use statement::Statements;
pub use store::{PgObjectStore, PgObjectStoreBuilder};
