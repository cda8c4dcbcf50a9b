//! Parameterized statement templates for every reservation access pattern.
//!
//! # Responsibility
//! - Render one keyspace-qualified SQL template per access pattern.
//! - Compile every template into each pooled connection's statement cache.
//!
//! # Invariants
//! - The template table is complete: every `Statement` variant has SQL.
//! - Templates are built once per session and never re-rendered per call.
//! - The per-connection cache capacity holds all templates at once, so a
//!   compiled statement is never evicted by another template.

use crate::db::schema::{
    validate_keyspace, ADDRESSES, CONFIRMATION_NUMBER, EMAILS, END_DATE, FIRST_NAME, GUEST_ID,
    GUEST_LAST_NAME, HOTEL_ID, LAST_NAME, PHONE_NUMBERS, ROOM_NUMBER, START_DATE,
    TABLE_GUESTS, TABLE_RESERVATIONS_BY_CONFIRMATION, TABLE_RESERVATIONS_BY_GUEST,
    TABLE_RESERVATIONS_BY_HOTEL_DATE, TITLE,
};
use crate::db::{DbError, DbResult};
use rusqlite::Connection;

/// Headroom on top of the template count for ad hoc statements.
const CACHE_HEADROOM: usize = 8;

/// Access patterns served by the reservation and guest stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statement {
    ExistsByConfirmation,
    FindByConfirmation,
    FindAll,
    FindByHotelDate,
    InsertByHotelDate,
    InsertByConfirmation,
    DeleteByHotelDate,
    DeleteMovedByHotelDate,
    DeleteByConfirmation,
    FindGuestLastName,
    InsertByGuest,
    DeleteByGuest,
    FindByGuestLastName,
    UpsertGuest,
    FindGuest,
}

impl Statement {
    pub const ALL: [Statement; 15] = [
        Statement::ExistsByConfirmation,
        Statement::FindByConfirmation,
        Statement::FindAll,
        Statement::FindByHotelDate,
        Statement::InsertByHotelDate,
        Statement::InsertByConfirmation,
        Statement::DeleteByHotelDate,
        Statement::DeleteMovedByHotelDate,
        Statement::DeleteByConfirmation,
        Statement::FindGuestLastName,
        Statement::InsertByGuest,
        Statement::DeleteByGuest,
        Statement::FindByGuestLastName,
        Statement::UpsertGuest,
        Statement::FindGuest,
    ];

    /// Stable name used in logs and errors.
    pub fn name(self) -> &'static str {
        match self {
            Self::ExistsByConfirmation => "exists_by_confirmation",
            Self::FindByConfirmation => "find_by_confirmation",
            Self::FindAll => "find_all",
            Self::FindByHotelDate => "find_by_hotel_date",
            Self::InsertByHotelDate => "insert_by_hotel_date",
            Self::InsertByConfirmation => "insert_by_confirmation",
            Self::DeleteByHotelDate => "delete_by_hotel_date",
            Self::DeleteMovedByHotelDate => "delete_moved_by_hotel_date",
            Self::DeleteByConfirmation => "delete_by_confirmation",
            Self::FindGuestLastName => "find_guest_last_name",
            Self::InsertByGuest => "insert_by_guest",
            Self::DeleteByGuest => "delete_by_guest",
            Self::FindByGuestLastName => "find_by_guest_last_name",
            Self::UpsertGuest => "upsert_guest",
            Self::FindGuest => "find_guest",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn render(self, ks: &str) -> String {
        let reservation_columns = format!(
            "{CONFIRMATION_NUMBER}, {HOTEL_ID}, {START_DATE}, {END_DATE}, {ROOM_NUMBER}, {GUEST_ID}"
        );
        match self {
            Self::ExistsByConfirmation => format!(
                "SELECT {CONFIRMATION_NUMBER} FROM {ks}.{TABLE_RESERVATIONS_BY_CONFIRMATION}
                 WHERE {CONFIRMATION_NUMBER} = ?1"
            ),
            Self::FindByConfirmation => format!(
                "SELECT * FROM {ks}.{TABLE_RESERVATIONS_BY_CONFIRMATION}
                 WHERE {CONFIRMATION_NUMBER} = ?1"
            ),
            Self::FindAll => format!("SELECT * FROM {ks}.{TABLE_RESERVATIONS_BY_CONFIRMATION}"),
            Self::FindByHotelDate => format!(
                "SELECT * FROM {ks}.{TABLE_RESERVATIONS_BY_HOTEL_DATE}
                 WHERE {HOTEL_ID} = ?1 AND {START_DATE} = ?2
                 ORDER BY {ROOM_NUMBER} ASC"
            ),
            Self::InsertByHotelDate => format!(
                "INSERT OR REPLACE INTO {ks}.{TABLE_RESERVATIONS_BY_HOTEL_DATE}
                 ({reservation_columns}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ),
            Self::InsertByConfirmation => format!(
                "INSERT OR REPLACE INTO {ks}.{TABLE_RESERVATIONS_BY_CONFIRMATION}
                 ({reservation_columns}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ),
            Self::DeleteByHotelDate => format!(
                "DELETE FROM {ks}.{TABLE_RESERVATIONS_BY_HOTEL_DATE}
                 WHERE {HOTEL_ID} = ?1 AND {START_DATE} = ?2 AND {ROOM_NUMBER} = ?3"
            ),
            // Removes a moved reservation's old slot unless another booking
            // has since taken it.
            Self::DeleteMovedByHotelDate => format!(
                "DELETE FROM {ks}.{TABLE_RESERVATIONS_BY_HOTEL_DATE}
                 WHERE {HOTEL_ID} = ?1 AND {START_DATE} = ?2 AND {ROOM_NUMBER} = ?3
                   AND {CONFIRMATION_NUMBER} = ?4"
            ),
            Self::DeleteByConfirmation => format!(
                "DELETE FROM {ks}.{TABLE_RESERVATIONS_BY_CONFIRMATION}
                 WHERE {CONFIRMATION_NUMBER} = ?1"
            ),
            Self::FindGuestLastName => format!(
                "SELECT {LAST_NAME} FROM {ks}.{TABLE_GUESTS} WHERE {GUEST_ID} = ?1"
            ),
            Self::InsertByGuest => format!(
                "INSERT OR REPLACE INTO {ks}.{TABLE_RESERVATIONS_BY_GUEST}
                 ({GUEST_LAST_NAME}, {reservation_columns}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            ),
            // The confirmation filter keeps a newer booking of the same guest at
            // the same hotel from being removed by a stale delete.
            Self::DeleteByGuest => format!(
                "DELETE FROM {ks}.{TABLE_RESERVATIONS_BY_GUEST}
                 WHERE {GUEST_LAST_NAME} = ?1 AND {HOTEL_ID} = ?2 AND {CONFIRMATION_NUMBER} = ?3"
            ),
            Self::FindByGuestLastName => format!(
                "SELECT * FROM {ks}.{TABLE_RESERVATIONS_BY_GUEST}
                 WHERE {GUEST_LAST_NAME} = ?1
                 ORDER BY {HOTEL_ID} ASC"
            ),
            Self::UpsertGuest => format!(
                "INSERT OR REPLACE INTO {ks}.{TABLE_GUESTS}
                 ({GUEST_ID}, {FIRST_NAME}, {LAST_NAME}, {TITLE}, {EMAILS}, {PHONE_NUMBERS},
                  {ADDRESSES}, {CONFIRMATION_NUMBER})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ),
            Self::FindGuest => format!(
                "SELECT * FROM {ks}.{TABLE_GUESTS} WHERE {GUEST_ID} = ?1"
            ),
        }
    }
}

/// Rendered template table for one keyspace.
#[derive(Debug, Clone)]
pub struct StatementCache {
    keyspace: String,
    templates: Vec<String>,
}

impl StatementCache {
    /// Renders every template for `keyspace`.
    pub fn new(keyspace: &str) -> DbResult<Self> {
        validate_keyspace(keyspace)?;
        let templates = Statement::ALL
            .iter()
            .map(|statement| statement.render(keyspace))
            .collect();
        Ok(Self {
            keyspace: keyspace.to_string(),
            templates,
        })
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    /// Returns the SQL text for one access pattern.
    pub fn sql(&self, statement: Statement) -> &str {
        &self.templates[statement.index()]
    }

    /// Minimum per-connection cache capacity that keeps every template resident.
    pub fn capacity() -> usize {
        Statement::ALL.len() + CACHE_HEADROOM
    }

    /// Compiles every template into `conn`'s statement cache.
    ///
    /// # Errors
    /// - `StatementPrepare` naming the first template SQLite rejects; callers
    ///   treat this as fatal since every store path depends on every template.
    pub fn prepare_all(&self, conn: &Connection) -> DbResult<()> {
        conn.set_prepared_statement_cache_capacity(Self::capacity());
        for statement in Statement::ALL {
            conn.prepare_cached(self.sql(statement))
                .map_err(|source| DbError::StatementPrepare {
                    statement: statement.name(),
                    source,
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Statement, StatementCache};
    use std::collections::HashSet;

    #[test]
    fn every_statement_has_a_distinct_slot() {
        let indices: HashSet<_> = Statement::ALL.iter().map(|s| s.index()).collect();
        assert_eq!(indices.len(), Statement::ALL.len());
        assert!(indices.iter().all(|index| *index < Statement::ALL.len()));
    }

    #[test]
    fn templates_are_keyspace_qualified() {
        let cache = StatementCache::new("hotel_ks").unwrap();
        for statement in Statement::ALL {
            assert!(
                cache.sql(statement).contains("hotel_ks."),
                "{} is not keyspace qualified",
                statement.name()
            );
        }
    }

    #[test]
    fn full_scan_template_has_no_parameters() {
        let cache = StatementCache::new("reservation").unwrap();
        assert!(!cache.sql(Statement::FindAll).contains('?'));
        assert!(cache
            .sql(Statement::FindByHotelDate)
            .contains("ORDER BY room_number ASC"));
    }

    #[test]
    fn cache_capacity_holds_every_template() {
        assert!(StatementCache::capacity() > Statement::ALL.len());
    }

    #[test]
    fn new_rejects_invalid_keyspace() {
        assert!(StatementCache::new("bad keyspace").is_err());
    }
}
