//! Error kinds shared by every component of the crate.
//!
//! A `thiserror` enum wrapping `sqlx`/`serde_json` errors, plus a coarse classification callers
//! branch on: not-found, conflict, validation, forbidden, transient, fatal.

use std::fmt;

/// Coarse classification of a [`StoreError`]/[`Error`], used by callers above this crate (the
/// out-of-scope HTTP layer) to decide a status code without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Forbidden,
    Transient,
    Fatal,
}

/// Error produced by the generic event store and its concrete Postgres backend.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Lookup by id (or secondary index) found nothing.
    #[error("object not found")]
    NotFound,
    /// A unique constraint (login, account_id, role name, ...) would be violated.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Sql error, propagated verbatim.
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
    /// Event payload failed to (de)serialize.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Schema mismatch or corrupt event row; not safely recoverable.
    #[error("fatal store error: {0}")]
    Fatal(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound => ErrorKind::NotFound,
            StoreError::Conflict(_) => ErrorKind::Conflict,
            StoreError::Sql(e) if is_transient_sql_error(e) => ErrorKind::Transient,
            StoreError::Sql(_) => ErrorKind::Fatal,
            StoreError::Json(_) => ErrorKind::Fatal,
            StoreError::Fatal(_) => ErrorKind::Fatal,
        }
    }
}

fn is_transient_sql_error(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db_error) => {
            // Postgres SQLSTATE class 40 ("transaction rollback") covers serialization failures
            // and deadlock victims - both are safe to retry.
            db_error.code().is_some_and(|code| code.starts_with("40"))
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
        _ => false,
    }
}

/// Error produced by the contest context manager and standings manager.
#[derive(thiserror::Error, Debug)]
pub enum ContestError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("contest configuration is invalid: {0}")]
    InvalidConfig(String),
    #[error("caller lacks permission: {0}")]
    Forbidden(&'static str),
}

impl ContestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContestError::Store(e) => e.kind(),
            ContestError::InvalidConfig(_) => ErrorKind::Fatal,
            ContestError::Forbidden(_) => ErrorKind::Forbidden,
        }
    }
}

/// Error produced by the invoker while claiming or grading a report.
#[derive(thiserror::Error, Debug)]
pub enum InvokerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("solution {0} referenced by report is missing")]
    MissingSolution(crate::types::ObjectId),
    #[error("grader failed: {0}")]
    Grader(String),
}

impl InvokerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InvokerError::Store(e) => e.kind(),
            InvokerError::MissingSolution(_) => ErrorKind::NotFound,
            InvokerError::Grader(_) => ErrorKind::Fatal,
        }
    }
}

/// Error produced by the problem package manager.
#[derive(thiserror::Error, Debug)]
pub enum PackageError {
    #[error("download failed: {0}")]
    Download(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    /// A path inside the archive would have escaped the extraction directory.
    #[error("archive entry {0:?} escapes the extraction directory")]
    ZipSlip(std::path::PathBuf),
}

impl PackageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PackageError::Download(_) => ErrorKind::Transient,
            PackageError::Io(_) => ErrorKind::Transient,
            PackageError::Zip(_) => ErrorKind::Fatal,
            PackageError::ZipSlip(_) => ErrorKind::Fatal,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Transient => "transient",
            ErrorKind::Fatal => "fatal",
        };
        f.write_str(name)
    }
}
