//! Repository layer over the denormalized keyspace.
//!
//! # Responsibility
//! - Define query-shape oriented data access contracts.
//! - Keep table routing and SQL details behind those contracts.
//!
//! # Invariants
//! - Every read is served by one table whose partition key matches the
//!   supplied filter; there are no joins.
//! - Repository APIs return absence as a value and storage failures as
//!   errors, never one disguised as the other.

pub mod guest_repo;
pub mod mapper;
pub mod reservation_repo;
