//! Guest profile and the `address` composite value.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Value of the keyspace-level `address` composite type.
///
/// Field names match the registered type definition one to one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state_or_province: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// Guest profile stored in `guests`, keyed by `guest_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub guest_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
    pub emails: BTreeSet<String>,
    pub phone_numbers: Vec<String>,
    /// Labeled addresses, e.g. `"home"`, `"work"`.
    pub addresses: BTreeMap<String, Address>,
    pub confirmation_number: Option<String>,
}

impl Guest {
    pub fn new(guest_id: Uuid) -> Self {
        Self {
            guest_id,
            first_name: None,
            last_name: None,
            title: None,
            emails: BTreeSet::new(),
            phone_numbers: Vec::new(),
            addresses: BTreeMap::new(),
            confirmation_number: None,
        }
    }
}

/// Last name as used for the `reservations_by_guest` partition key.
///
/// Surrounding whitespace is ignored; a blank name yields `None`.
pub(crate) fn index_last_name(last_name: &str) -> Option<&str> {
    Some(last_name.trim()).filter(|name| !name.is_empty())
}
