//! Reservation repository contracts and the denormalized SQLite implementation.
//!
//! # Responsibility
//! - Route each lookup to the table whose partition key matches the
//!   caller's filter columns.
//! - Fan every write out to all per-query copies of a reservation.
//!
//! # Invariants
//! - Not found is a value (`false`, `None`, empty list), never an error.
//! - Empty key arguments are rejected before any I/O.
//! - Writes go hotel/date table first, then confirmation table, then the
//!   guest-name table when the guest profile resolves a last name.
//! - An upsert that moves a confirmed reservation to another hotel, date,
//!   room or guest-name key removes the copies left at the old key, so one
//!   reservation never has two rows in the same table.
//! - No step is rolled back or retried. A failure after the first step
//!   surfaces as `PartialWrite`; a concurrent delete racing an in-flight
//!   upsert can leave copies out of sync, and nothing here detects that.

use crate::db::schema::{
    TABLE_RESERVATIONS_BY_CONFIRMATION, TABLE_RESERVATIONS_BY_GUEST,
    TABLE_RESERVATIONS_BY_HOTEL_DATE,
};
use crate::db::statements::Statement;
use crate::db::{DbError, Session};
use crate::model::guest::index_last_name;
use crate::model::reservation::{ConfirmationNumber, Reservation, ReservationValidationError};
use crate::repo::mapper::reservation_from_row;
use chrono::NaiveDate;
use log::{debug, info, warn};
use rusqlite::{params, OptionalExtension, Params};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for reservation and guest persistence.
#[derive(Debug)]
pub enum RepoError {
    /// A required argument was empty; raised before any I/O.
    InvalidArgument(&'static str),
    Validation(ReservationValidationError),
    Db(DbError),
    InvalidData(String),
    /// A multi-table write failed after at least one table was updated.
    PartialWrite {
        confirmation_number: ConfirmationNumber,
        completed: Vec<&'static str>,
        failed: &'static str,
        source: DbError,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(name) => write!(f, "required argument `{name}` is empty"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::PartialWrite {
                confirmation_number,
                completed,
                failed,
                source,
            } => write!(
                f,
                "reservation {confirmation_number} partially written: applied to [{}], failed on {failed}: {source}",
                completed.join(", ")
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::PartialWrite { source, .. } => Some(source),
            Self::InvalidArgument(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<ReservationValidationError> for RepoError {
    fn from(value: ReservationValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Source of new confirmation numbers.
pub trait ConfirmationSource {
    fn next_confirmation_number(&self) -> ConfirmationNumber;
}

/// Random v4 UUID text, e.g. `0b9c8a9e-...`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomConfirmationSource;

impl ConfirmationSource for RandomConfirmationSource {
    fn next_confirmation_number(&self) -> ConfirmationNumber {
        Uuid::new_v4().to_string()
    }
}

/// Repository interface over the denormalized reservation tables.
pub trait ReservationRepository {
    /// Whether `reservations_by_confirmation` has a row for the number.
    fn exists(&self, confirmation_number: &str) -> RepoResult<bool>;
    /// Point lookup on `reservations_by_confirmation`.
    fn find_by_confirmation_number(
        &self,
        confirmation_number: &str,
    ) -> RepoResult<Option<Reservation>>;
    /// Full unpaginated scan of `reservations_by_confirmation`, in storage order.
    fn find_all(&self) -> RepoResult<Vec<Reservation>>;
    /// One `reservations_by_hotel_date` partition, ordered by room number.
    fn find_by_hotel_and_date(&self, hotel_id: &str, date: NaiveDate)
        -> RepoResult<Vec<Reservation>>;
    /// One `reservations_by_guest` partition, ordered by hotel id.
    fn find_by_guest_last_name(&self, last_name: &str) -> RepoResult<Vec<Reservation>>;
    /// Writes every copy; assigns a confirmation number to `reservation` when absent.
    fn upsert(&self, reservation: &mut Reservation) -> RepoResult<ConfirmationNumber>;
    /// Removes every copy. Returns `false` without writing when unknown.
    fn delete(&self, confirmation_number: &str) -> RepoResult<bool>;
}

/// SQLite-backed reservation repository over a shared session.
pub struct SqliteReservationRepository<'s> {
    session: &'s Session,
    confirmations: Box<dyn ConfirmationSource + Send + Sync + 's>,
}

impl<'s> SqliteReservationRepository<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self::with_confirmation_source(session, RandomConfirmationSource)
    }

    pub fn with_confirmation_source(
        session: &'s Session,
        confirmations: impl ConfirmationSource + Send + Sync + 's,
    ) -> Self {
        Self {
            session,
            confirmations: Box::new(confirmations),
        }
    }

    fn query_reservations<P: Params>(
        &self,
        statement: Statement,
        params: P,
    ) -> RepoResult<Vec<Reservation>> {
        self.session.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(self.session.statements().sql(statement))?;
            let mut rows = stmt.query(params)?;
            let mut reservations = Vec::new();
            while let Some(row) = rows.next()? {
                reservations.push(reservation_from_row(row)?);
            }
            Ok(reservations)
        })
    }

    fn execute<P: Params>(&self, statement: Statement, params: P) -> Result<usize, DbError> {
        self.session.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(self.session.statements().sql(statement))?;
            Ok(stmt.execute(params)?)
        })
    }

    fn write_copy(
        &self,
        statement: Statement,
        confirmation_number: &str,
        reservation: &Reservation,
    ) -> Result<usize, DbError> {
        self.execute(
            statement,
            params![
                confirmation_number,
                reservation.hotel_id,
                reservation.start_date,
                reservation.end_date,
                reservation.room_number,
                reservation.guest_id.to_string(),
            ],
        )
    }

    /// Resolves the guest-name partition key from the guest profile, if any.
    fn guest_last_name(&self, guest_id: Uuid) -> Result<Option<String>, DbError> {
        self.session.with_connection(|conn| {
            let mut stmt =
                conn.prepare_cached(self.session.statements().sql(Statement::FindGuestLastName))?;
            let last_name = stmt
                .query_row([guest_id.to_string()], |row| row.get::<_, Option<String>>(0))
                .optional()?
                .flatten();
            Ok(last_name
                .as_deref()
                .and_then(index_last_name)
                .map(str::to_string))
        })
    }

    /// Removes the copies a confirmed reservation left behind at keys it no
    /// longer occupies after `current` was written.
    fn remove_moved_copies(
        &self,
        fan_out: &mut FanOut<'_>,
        previous: &Reservation,
        current: &Reservation,
        current_last_name: Option<&str>,
    ) -> RepoResult<()> {
        if previous.hotel_date_key() != current.hotel_date_key() {
            let removed = self.execute(
                Statement::DeleteMovedByHotelDate,
                params![
                    previous.hotel_id,
                    previous.start_date,
                    previous.room_number,
                    fan_out.confirmation_number
                ],
            );
            fan_out.check(TABLE_RESERVATIONS_BY_HOTEL_DATE, removed)?;
            debug!(
                "event=reservation_move module=repo status=ok confirmation_number={} table={}",
                fan_out.confirmation_number, TABLE_RESERVATIONS_BY_HOTEL_DATE
            );
        }

        let resolved = self.guest_last_name(previous.guest_id);
        let Some(previous_last_name) = fan_out.check(TABLE_RESERVATIONS_BY_GUEST, resolved)? else {
            return Ok(());
        };
        if current_last_name == Some(previous_last_name.as_str())
            && current.hotel_id == previous.hotel_id
        {
            return Ok(());
        }
        let removed = self.execute(
            Statement::DeleteByGuest,
            params![previous_last_name, previous.hotel_id, fan_out.confirmation_number],
        );
        fan_out.check(TABLE_RESERVATIONS_BY_GUEST, removed)?;
        debug!(
            "event=reservation_move module=repo status=ok confirmation_number={} table={}",
            fan_out.confirmation_number, TABLE_RESERVATIONS_BY_GUEST
        );
        Ok(())
    }
}

impl ReservationRepository for SqliteReservationRepository<'_> {
    fn exists(&self, confirmation_number: &str) -> RepoResult<bool> {
        require_non_empty("confirmation_number", confirmation_number)?;
        self.session.with_connection(|conn| {
            let mut stmt = conn
                .prepare_cached(self.session.statements().sql(Statement::ExistsByConfirmation))?;
            Ok(stmt.exists([confirmation_number])?)
        })
    }

    fn find_by_confirmation_number(
        &self,
        confirmation_number: &str,
    ) -> RepoResult<Option<Reservation>> {
        require_non_empty("confirmation_number", confirmation_number)?;
        let found = self.session.with_connection(|conn| -> RepoResult<Option<Reservation>> {
            let mut stmt =
                conn.prepare_cached(self.session.statements().sql(Statement::FindByConfirmation))?;
            let mut rows = stmt.query([confirmation_number])?;
            if let Some(row) = rows.next()? {
                return Ok(Some(reservation_from_row(row)?));
            }
            Ok(None)
        })?;

        if found.is_none() {
            debug!(
                "event=reservation_lookup module=repo status=miss confirmation_number={}",
                confirmation_number
            );
        }
        Ok(found)
    }

    fn find_all(&self) -> RepoResult<Vec<Reservation>> {
        self.query_reservations(Statement::FindAll, [])
    }

    fn find_by_hotel_and_date(
        &self,
        hotel_id: &str,
        date: NaiveDate,
    ) -> RepoResult<Vec<Reservation>> {
        require_non_empty("hotel_id", hotel_id)?;
        self.query_reservations(Statement::FindByHotelDate, params![hotel_id, date])
    }

    fn find_by_guest_last_name(&self, last_name: &str) -> RepoResult<Vec<Reservation>> {
        let last_name = index_last_name(last_name).ok_or(RepoError::InvalidArgument("last_name"))?;
        self.query_reservations(Statement::FindByGuestLastName, [last_name])
    }

    fn upsert(&self, reservation: &mut Reservation) -> RepoResult<ConfirmationNumber> {
        reservation.validate()?;

        let previous = match reservation.confirmation_number.as_deref() {
            Some(existing) => self.find_by_confirmation_number(existing)?,
            None => None,
        };
        let confirmation_number = match reservation.confirmation_number.as_ref() {
            Some(existing) => existing.clone(),
            None => {
                let generated = self.confirmations.next_confirmation_number();
                reservation.confirmation_number = Some(generated.clone());
                debug!(
                    "event=confirmation_assign module=repo status=ok confirmation_number={}",
                    generated
                );
                generated
            }
        };
        let mut fan_out = FanOut::new("upsert", &confirmation_number);

        let written = self.write_copy(Statement::InsertByHotelDate, &confirmation_number, reservation);
        fan_out.step(TABLE_RESERVATIONS_BY_HOTEL_DATE, written)?;
        let written =
            self.write_copy(Statement::InsertByConfirmation, &confirmation_number, reservation);
        fan_out.step(TABLE_RESERVATIONS_BY_CONFIRMATION, written)?;

        let resolved = self.guest_last_name(reservation.guest_id);
        let last_name = fan_out.check(TABLE_RESERVATIONS_BY_GUEST, resolved)?;
        if let Some(last_name) = &last_name {
            let written = self.execute(
                Statement::InsertByGuest,
                params![
                    last_name,
                    confirmation_number,
                    reservation.hotel_id,
                    reservation.start_date,
                    reservation.end_date,
                    reservation.room_number,
                    reservation.guest_id.to_string(),
                ],
            );
            fan_out.step(TABLE_RESERVATIONS_BY_GUEST, written)?;
        }

        if let Some(previous) = &previous {
            self.remove_moved_copies(&mut fan_out, previous, reservation, last_name.as_deref())?;
        }

        info!(
            "event=reservation_upsert module=repo status=ok confirmation_number={} copies={}",
            confirmation_number,
            fan_out.completed.len()
        );
        Ok(confirmation_number)
    }

    fn delete(&self, confirmation_number: &str) -> RepoResult<bool> {
        let Some(existing) = self.find_by_confirmation_number(confirmation_number)? else {
            return Ok(false);
        };
        let mut fan_out = FanOut::new("delete", confirmation_number);

        let removed = self.execute(
            Statement::DeleteByHotelDate,
            params![existing.hotel_id, existing.start_date, existing.room_number],
        );
        fan_out.step(TABLE_RESERVATIONS_BY_HOTEL_DATE, removed)?;
        let removed = self.execute(Statement::DeleteByConfirmation, [confirmation_number]);
        fan_out.step(TABLE_RESERVATIONS_BY_CONFIRMATION, removed)?;

        let resolved = self.guest_last_name(existing.guest_id);
        if let Some(last_name) = fan_out.check(TABLE_RESERVATIONS_BY_GUEST, resolved)? {
            let removed = self.execute(
                Statement::DeleteByGuest,
                params![last_name, existing.hotel_id, confirmation_number],
            );
            fan_out.step(TABLE_RESERVATIONS_BY_GUEST, removed)?;
        }

        info!(
            "event=reservation_delete module=repo status=ok confirmation_number={} copies={}",
            confirmation_number,
            fan_out.completed.len()
        );
        Ok(true)
    }
}

/// Progress of one multi-table write, for `PartialWrite` reporting.
struct FanOut<'a> {
    operation: &'static str,
    confirmation_number: &'a str,
    completed: Vec<&'static str>,
}

impl<'a> FanOut<'a> {
    fn new(operation: &'static str, confirmation_number: &'a str) -> Self {
        Self {
            operation,
            confirmation_number,
            completed: Vec::new(),
        }
    }

    /// Records a finished write to `table`.
    fn step(&mut self, table: &'static str, result: Result<usize, DbError>) -> RepoResult<()> {
        self.check(table, result)?;
        if !self.completed.contains(&table) {
            self.completed.push(table);
        }
        Ok(())
    }

    /// Passes `result` through, mapping a failure to `Db` before the first
    /// completed table and to `PartialWrite` after it.
    fn check<T>(&mut self, table: &'static str, result: Result<T, DbError>) -> RepoResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(source) if self.completed.is_empty() => Err(RepoError::Db(source)),
            Err(source) => Err(partial_write(
                self.operation,
                self.confirmation_number.to_string(),
                std::mem::take(&mut self.completed),
                table,
                source,
            )),
        }
    }
}

fn require_non_empty(name: &'static str, value: &str) -> RepoResult<()> {
    if value.trim().is_empty() {
        return Err(RepoError::InvalidArgument(name));
    }
    Ok(())
}

fn partial_write(
    operation: &str,
    confirmation_number: ConfirmationNumber,
    completed: Vec<&'static str>,
    failed: &'static str,
    source: DbError,
) -> RepoError {
    warn!(
        "event=reservation_{} module=repo status=partial confirmation_number={} completed={} failed={} error={}",
        operation,
        confirmation_number,
        completed.join(","),
        failed,
        source
    );
    RepoError::PartialWrite {
        confirmation_number,
        completed,
        failed,
        source,
    }
}
