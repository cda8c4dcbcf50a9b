//! Reservation domain model.
//!
//! # Responsibility
//! - Define the in-memory reservation aggregate and the guest profile it
//!   references.
//!
//! # Invariants
//! - A reservation is fully described by six flat fields; no nesting.
//! - Confirmation number is the stable external identity; once assigned it
//!   is never reassigned.

pub mod guest;
pub mod reservation;
