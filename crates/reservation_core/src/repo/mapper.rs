//! Row to entity translation for reservation and guest tables.
//!
//! # Invariants
//! - Columns are read by name, so any table carrying the six reservation
//!   columns maps through `reservation_from_row` regardless of key layout.
//! - Mapping is pure; no I/O, no logging.

use crate::db::schema::{
    ADDRESSES, CONFIRMATION_NUMBER, EMAILS, END_DATE, FIRST_NAME, GUEST_ID, HOTEL_ID, LAST_NAME,
    PHONE_NUMBERS, ROOM_NUMBER, START_DATE, TITLE,
};
use crate::model::guest::Guest;
use crate::model::reservation::Reservation;
use crate::repo::reservation_repo::{RepoError, RepoResult};
use rusqlite::Row;
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Maps one row of any reservation table into a `Reservation`.
pub fn reservation_from_row(row: &Row<'_>) -> RepoResult<Reservation> {
    let guest_id_text: String = row.get(GUEST_ID)?;
    Ok(Reservation {
        hotel_id: row.get(HOTEL_ID)?,
        confirmation_number: row.get(CONFIRMATION_NUMBER)?,
        guest_id: parse_uuid(&guest_id_text, GUEST_ID)?,
        room_number: row.get(ROOM_NUMBER)?,
        start_date: row.get(START_DATE)?,
        end_date: row.get(END_DATE)?,
    })
}

/// Maps one `guests` row, decoding its JSON collection columns.
pub fn guest_from_row(row: &Row<'_>) -> RepoResult<Guest> {
    let guest_id_text: String = row.get(GUEST_ID)?;
    let emails_json: String = row.get(EMAILS)?;
    let phones_json: String = row.get(PHONE_NUMBERS)?;
    let addresses_json: String = row.get(ADDRESSES)?;

    Ok(Guest {
        guest_id: parse_uuid(&guest_id_text, GUEST_ID)?,
        first_name: row.get(FIRST_NAME)?,
        last_name: row.get(LAST_NAME)?,
        title: row.get(TITLE)?,
        emails: parse_json(&emails_json, EMAILS)?,
        phone_numbers: parse_json(&phones_json, PHONE_NUMBERS)?,
        addresses: parse_json(&addresses_json, ADDRESSES)?,
        confirmation_number: row.get(CONFIRMATION_NUMBER)?,
    })
}

fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn parse_json<T: DeserializeOwned>(value: &str, column: &str) -> RepoResult<T> {
    serde_json::from_str(value)
        .map_err(|err| RepoError::InvalidData(format!("invalid {column} payload: {err}")))
}
