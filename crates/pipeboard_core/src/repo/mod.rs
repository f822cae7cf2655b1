//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define storage-facing contracts for board items.
//! - Isolate SQLite query details from gateway and service orchestration.
//!
//! # Invariants
//! - Write paths validate items before persistence.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod item_repo;
