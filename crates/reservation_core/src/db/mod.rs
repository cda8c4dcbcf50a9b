//! Storage session, keyspace schema and statement templates.
//!
//! # Responsibility
//! - Open and release the pooled SQLite session that hosts one keyspace.
//! - Create the denormalized reservation schema idempotently.
//! - Compile every access-pattern statement once per pooled connection.
//!
//! # Invariants
//! - No store operation runs before schema creation and statement
//!   preparation both succeed.
//! - Every table is addressed as `<keyspace>.<table>`.

use crate::logging::LoggingError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod schema;
mod session;
pub mod statements;

pub use session::Session;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
    /// Keyspace name is not a plain SQL identifier.
    InvalidKeyspace(String),
    /// Composite type could not be read back from keyspace metadata.
    MissingType(String),
    /// Composite type already registered with a different field list.
    TypeConflict {
        type_name: String,
        expected: String,
        actual: String,
    },
    StatementPrepare {
        statement: &'static str,
        source: rusqlite::Error,
    },
    /// A pooled connection mutex was poisoned by a panicking holder.
    ConnectionPoisoned,
    Logging(LoggingError),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::InvalidKeyspace(name) => write!(
                f,
                "invalid keyspace name `{name}`; expected [A-Za-z_][A-Za-z0-9_]{{0,47}}"
            ),
            Self::MissingType(name) => {
                write!(f, "type `{name}` is not registered in keyspace metadata")
            }
            Self::TypeConflict {
                type_name,
                expected,
                actual,
            } => write!(
                f,
                "type `{type_name}` already registered as {actual}; expected {expected}"
            ),
            Self::StatementPrepare { statement, source } => {
                write!(f, "failed to prepare statement `{statement}`: {source}")
            }
            Self::ConnectionPoisoned => write!(f, "pooled connection is poisoned"),
            Self::Logging(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::StatementPrepare { source, .. } => Some(source),
            Self::Logging(err) => Some(err),
            Self::InvalidKeyspace(_)
            | Self::MissingType(_)
            | Self::TypeConflict { .. }
            | Self::ConnectionPoisoned => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<LoggingError> for DbError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<std::io::Error> for DbError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
