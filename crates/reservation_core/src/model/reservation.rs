//! Reservation aggregate.
//!
//! # Responsibility
//! - Hold the six fields copied into every denormalized reservation table.
//! - Check the key fields a store write cannot do without.
//!
//! # Invariants
//! - `confirmation_number`, when present, is non-empty.
//! - `hotel_id` is non-empty; it is half of the hotel/date partition key.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Public reservation identifier handed to guests.
pub type ConfirmationNumber = String;

/// One hotel stay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// `None` until the store assigns one on first upsert.
    pub confirmation_number: Option<ConfirmationNumber>,
    pub hotel_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Stored as a 16-bit integer.
    pub room_number: i16,
    pub guest_id: Uuid,
}

/// Key field that a reservation write cannot proceed without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationValidationError {
    EmptyHotelId,
    EmptyConfirmationNumber,
}

impl Display for ReservationValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyHotelId => write!(f, "hotel_id must not be empty"),
            Self::EmptyConfirmationNumber => {
                write!(f, "confirmation_number must not be empty when present")
            }
        }
    }
}

impl Error for ReservationValidationError {}

impl Reservation {
    /// Creates an unconfirmed reservation; the store assigns the confirmation
    /// number on first upsert.
    pub fn new(
        hotel_id: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        room_number: i16,
        guest_id: Uuid,
    ) -> Self {
        Self {
            confirmation_number: None,
            hotel_id: hotel_id.into(),
            start_date,
            end_date,
            room_number,
            guest_id,
        }
    }

    /// Same as `new` with a caller-supplied confirmation number, for imports
    /// and client-generated identities.
    pub fn with_confirmation_number(mut self, confirmation_number: impl Into<String>) -> Self {
        self.confirmation_number = Some(confirmation_number.into());
        self
    }

    /// Validates key fields only; date order and room ranges are not checked.
    pub fn validate(&self) -> Result<(), ReservationValidationError> {
        if self.hotel_id.trim().is_empty() {
            return Err(ReservationValidationError::EmptyHotelId);
        }
        if matches!(self.confirmation_number.as_deref(), Some(value) if value.trim().is_empty()) {
            return Err(ReservationValidationError::EmptyConfirmationNumber);
        }
        Ok(())
    }

    /// Number of nights between start and end date.
    pub fn nights(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    /// Primary key of this reservation's `reservations_by_hotel_date` row.
    pub fn hotel_date_key(&self) -> (&str, NaiveDate, i16) {
        (&self.hotel_id, self.start_date, self.room_number)
    }
}
