//! Keyspace schema bootstrap for the denormalized reservation tables.
//!
//! # Responsibility
//! - Register the `address` composite type in keyspace metadata.
//! - Create the per-query reservation tables and the guest table.
//!
//! # Invariants
//! - Every statement is `IF NOT EXISTS` / `INSERT OR IGNORE`; re-running is a no-op.
//! - Creation runs in one `IMMEDIATE` transaction so concurrent first-time
//!   initializers serialize on the database lock instead of failing.
//! - `guests` is created only after the `address` type is readable, since its
//!   `addresses` column holds values of that type.
//!
//! SQLite has no user-defined types, so the composite type lives as a row of
//! `<keyspace>.schema_types` listing its fields in declaration order.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use std::time::Instant;

pub const TYPE_ADDRESS: &str = "address";

pub const TABLE_RESERVATIONS_BY_HOTEL_DATE: &str = "reservations_by_hotel_date";
pub const TABLE_RESERVATIONS_BY_CONFIRMATION: &str = "reservations_by_confirmation";
pub const TABLE_RESERVATIONS_BY_GUEST: &str = "reservations_by_guest";
pub const TABLE_GUESTS: &str = "guests";
pub const TABLE_SCHEMA_TYPES: &str = "schema_types";

pub const STREET: &str = "street";
pub const CITY: &str = "city";
pub const STATE_PROVINCE: &str = "state_or_province";
pub const POSTAL_CODE: &str = "postal_code";
pub const COUNTRY: &str = "country";

pub const HOTEL_ID: &str = "hotel_id";
pub const START_DATE: &str = "start_date";
pub const END_DATE: &str = "end_date";
pub const ROOM_NUMBER: &str = "room_number";
pub const CONFIRMATION_NUMBER: &str = "confirmation_number";
pub const GUEST_ID: &str = "guest_id";
pub const GUEST_LAST_NAME: &str = "guest_last_name";
pub const FIRST_NAME: &str = "first_name";
pub const LAST_NAME: &str = "last_name";
pub const TITLE: &str = "title";
pub const EMAILS: &str = "emails";
pub const PHONE_NUMBERS: &str = "phone_numbers";
pub const ADDRESSES: &str = "addresses";

/// Field list of the `address` composite type, in declaration order.
pub const ADDRESS_FIELDS: [(&str, &str); 5] = [
    (STREET, "text"),
    (CITY, "text"),
    (STATE_PROVINCE, "text"),
    (POSTAL_CODE, "text"),
    (COUNTRY, "text"),
];

static KEYSPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,47}$").expect("valid keyspace regex"));

/// Rejects keyspace names that cannot be spliced into DDL as a bare identifier.
pub fn validate_keyspace(keyspace: &str) -> DbResult<()> {
    if KEYSPACE_RE.is_match(keyspace) {
        Ok(())
    } else {
        Err(DbError::InvalidKeyspace(keyspace.to_string()))
    }
}

/// Creates the composite type and all reservation tables if they are absent.
///
/// # Side effects
/// - Mutates keyspace metadata (`sqlite_master`, `schema_types`).
/// - Emits `schema_object` debug events and one `schema_init` info event.
///
/// # Errors
/// - `InvalidKeyspace` before any I/O when `keyspace` is not an identifier.
/// - `TypeConflict` when another writer registered `address` differently.
/// - Any SQLite failure, including lock waits that exceed the busy timeout.
pub fn ensure_schema(conn: &mut Connection, keyspace: &str) -> DbResult<()> {
    validate_keyspace(keyspace)?;
    let started_at = Instant::now();

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {keyspace}.{TABLE_SCHEMA_TYPES} (
            type_name TEXT PRIMARY KEY NOT NULL,
            fields TEXT NOT NULL CHECK (json_valid(fields))
        ) WITHOUT ROWID;"
    ))?;
    let expected_fields = address_type_definition();
    tx.execute(
        &format!(
            "INSERT OR IGNORE INTO {keyspace}.{TABLE_SCHEMA_TYPES} (type_name, fields)
             VALUES (?1, ?2);"
        ),
        [TYPE_ADDRESS, expected_fields.as_str()],
    )?;
    log_created("type", keyspace, TYPE_ADDRESS);

    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {keyspace}.{TABLE_RESERVATIONS_BY_HOTEL_DATE} (
            -- Q7. Find reservations by hotel and date
            {HOTEL_ID} TEXT NOT NULL,
            {START_DATE} TEXT NOT NULL,
            {END_DATE} TEXT,
            {ROOM_NUMBER} INTEGER NOT NULL CHECK ({ROOM_NUMBER} BETWEEN -32768 AND 32767),
            {CONFIRMATION_NUMBER} TEXT,
            {GUEST_ID} TEXT,
            PRIMARY KEY ({HOTEL_ID}, {START_DATE}, {ROOM_NUMBER} ASC)
        ) WITHOUT ROWID;"
    ))?;
    log_created("table", keyspace, TABLE_RESERVATIONS_BY_HOTEL_DATE);

    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {keyspace}.{TABLE_RESERVATIONS_BY_CONFIRMATION} (
            {CONFIRMATION_NUMBER} TEXT PRIMARY KEY NOT NULL,
            {HOTEL_ID} TEXT,
            {START_DATE} TEXT,
            {END_DATE} TEXT,
            {ROOM_NUMBER} INTEGER CHECK ({ROOM_NUMBER} BETWEEN -32768 AND 32767),
            {GUEST_ID} TEXT
        ) WITHOUT ROWID;"
    ))?;
    log_created("table", keyspace, TABLE_RESERVATIONS_BY_CONFIRMATION);

    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {keyspace}.{TABLE_RESERVATIONS_BY_GUEST} (
            -- Q8. Find reservations by guest name
            {GUEST_LAST_NAME} TEXT NOT NULL,
            {HOTEL_ID} TEXT NOT NULL,
            {START_DATE} TEXT,
            {END_DATE} TEXT,
            {ROOM_NUMBER} INTEGER CHECK ({ROOM_NUMBER} BETWEEN -32768 AND 32767),
            {CONFIRMATION_NUMBER} TEXT,
            {GUEST_ID} TEXT,
            PRIMARY KEY ({GUEST_LAST_NAME}, {HOTEL_ID})
        ) WITHOUT ROWID;"
    ))?;
    log_created("table", keyspace, TABLE_RESERVATIONS_BY_GUEST);

    let actual_fields = lookup_type(&tx, keyspace, TYPE_ADDRESS)?
        .ok_or_else(|| DbError::MissingType(TYPE_ADDRESS.to_string()))?;
    if actual_fields != expected_fields {
        return Err(DbError::TypeConflict {
            type_name: TYPE_ADDRESS.to_string(),
            expected: expected_fields,
            actual: actual_fields,
        });
    }

    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {keyspace}.{TABLE_GUESTS} (
            -- Q9. Find guest by ID
            {GUEST_ID} TEXT PRIMARY KEY NOT NULL,
            {FIRST_NAME} TEXT,
            {LAST_NAME} TEXT,
            {TITLE} TEXT,
            {EMAILS} TEXT NOT NULL DEFAULT '[]' CHECK (json_valid({EMAILS})),
            {PHONE_NUMBERS} TEXT NOT NULL DEFAULT '[]' CHECK (json_valid({PHONE_NUMBERS})),
            -- map<text, frozen<{TYPE_ADDRESS}>>
            {ADDRESSES} TEXT NOT NULL DEFAULT '{{}}' CHECK (json_valid({ADDRESSES})),
            {CONFIRMATION_NUMBER} TEXT
        ) WITHOUT ROWID;"
    ))?;
    log_created("table", keyspace, TABLE_GUESTS);

    tx.commit()?;

    info!(
        "event=schema_init module=db status=ok keyspace={} duration_ms={}",
        keyspace,
        started_at.elapsed().as_millis()
    );
    Ok(())
}

/// Reads a composite type definition (JSON field list) from keyspace metadata.
///
/// Returns `Ok(None)` when the type is not registered.
pub fn lookup_type(conn: &Connection, keyspace: &str, type_name: &str) -> DbResult<Option<String>> {
    validate_keyspace(keyspace)?;
    let fields = conn
        .query_row(
            &format!("SELECT fields FROM {keyspace}.{TABLE_SCHEMA_TYPES} WHERE type_name = ?1;"),
            [type_name],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(fields)
}

/// Canonical JSON definition of the `address` type: `[["street","text"],...]`.
pub fn address_type_definition() -> String {
    let fields: Vec<serde_json::Value> = ADDRESS_FIELDS
        .iter()
        .map(|(name, kind)| serde_json::json!([name, kind]))
        .collect();
    serde_json::Value::Array(fields).to_string()
}

fn log_created(kind: &str, keyspace: &str, name: &str) {
    debug!(
        "event=schema_object module=db status=ok kind={} name={}.{} note=created_if_absent",
        kind, keyspace, name
    );
}

#[cfg(test)]
mod tests {
    use super::{address_type_definition, validate_keyspace};
    use crate::db::DbError;

    #[test]
    fn keyspace_accepts_plain_identifiers() {
        validate_keyspace("reservation").unwrap();
        validate_keyspace("_ks_2024").unwrap();
    }

    #[test]
    fn keyspace_rejects_injection_and_empty_names() {
        for name in ["", "1abc", "reservation; DROP TABLE x", "a.b", "ks-name"] {
            let err = validate_keyspace(name).unwrap_err();
            assert!(matches!(err, DbError::InvalidKeyspace(ref rejected) if rejected == name));
        }
    }

    #[test]
    fn address_definition_is_valid_json_in_declaration_order() {
        let definition = address_type_definition();
        let parsed: Vec<(String, String)> = serde_json::from_str(&definition).unwrap();
        let names: Vec<_> = parsed.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(
            names,
            ["street", "city", "state_or_province", "postal_code", "country"]
        );
        assert!(parsed.iter().all(|(_, kind)| kind == "text"));
    }
}
