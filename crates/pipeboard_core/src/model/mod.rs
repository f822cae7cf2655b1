//! Domain model for the pipeline board.
//!
//! # Responsibility
//! - Define the item, column and scope shapes shared by every layer.
//!
//! # Invariants
//! - Item ids and column keys are distinct types.
//! - Every item carries the tenant/team scope it was created under.

pub mod column;
pub mod item;
