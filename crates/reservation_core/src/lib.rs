//! Denormalized reservation data-access layer.
//!
//! One logical reservation is kept in several tables, each keyed for one
//! query shape. This crate owns the write fan-out, the read routing and the
//! session that hosts the keyspace.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;

pub use config::{LoggingConfig, SessionConfig};
pub use db::{DbError, DbResult, Session};
pub use logging::{init_logging, LoggingError};
pub use model::guest::{Address, Guest};
pub use model::reservation::{ConfirmationNumber, Reservation, ReservationValidationError};
pub use repo::guest_repo::{GuestRepository, SqliteGuestRepository};
pub use repo::reservation_repo::{
    ConfirmationSource, RandomConfirmationSource, RepoError, RepoResult, ReservationRepository,
    SqliteReservationRepository,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
