//! Guest profile repository.
//!
//! # Responsibility
//! - Persist guest profiles, including labeled `address` values.
//! - Serve the last-name lookup the reservation store uses to key
//!   `reservations_by_guest`.
//!
//! # Invariants
//! - Collection columns are stored as JSON matching the `guests` table checks.
//! - Upserting a guest does not touch reservation tables; existing
//!   `reservations_by_guest` rows keep the last name they were written with.

use crate::db::statements::Statement;
use crate::db::Session;
use crate::model::guest::Guest;
use crate::repo::mapper::guest_from_row;
use crate::repo::reservation_repo::{RepoError, RepoResult};
use log::debug;
use rusqlite::params;
use serde::Serialize;
use uuid::Uuid;

pub trait GuestRepository {
    fn upsert_guest(&self, guest: &Guest) -> RepoResult<Uuid>;
    fn find_guest(&self, guest_id: Uuid) -> RepoResult<Option<Guest>>;
}

/// SQLite-backed guest repository over a shared session.
pub struct SqliteGuestRepository<'s> {
    session: &'s Session,
}

impl<'s> SqliteGuestRepository<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self { session }
    }
}

impl GuestRepository for SqliteGuestRepository<'_> {
    fn upsert_guest(&self, guest: &Guest) -> RepoResult<Uuid> {
        let emails = to_json(&guest.emails, "emails")?;
        let phone_numbers = to_json(&guest.phone_numbers, "phone_numbers")?;
        let addresses = to_json(&guest.addresses, "addresses")?;

        self.session.with_connection(|conn| {
            let mut stmt =
                conn.prepare_cached(self.session.statements().sql(Statement::UpsertGuest))?;
            stmt.execute(params![
                guest.guest_id.to_string(),
                guest.first_name,
                guest.last_name,
                guest.title,
                emails,
                phone_numbers,
                addresses,
                guest.confirmation_number,
            ])?;
            Ok::<_, RepoError>(())
        })?;

        debug!(
            "event=guest_upsert module=repo status=ok guest_id={} addresses={}",
            guest.guest_id,
            guest.addresses.len()
        );
        Ok(guest.guest_id)
    }

    fn find_guest(&self, guest_id: Uuid) -> RepoResult<Option<Guest>> {
        self.session.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(self.session.statements().sql(Statement::FindGuest))?;
            let mut rows = stmt.query([guest_id.to_string()])?;
            if let Some(row) = rows.next()? {
                return Ok(Some(guest_from_row(row)?));
            }
            Ok(None)
        })
    }
}

fn to_json<T: Serialize>(value: &T, column: &str) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode {column}: {err}")))
}
