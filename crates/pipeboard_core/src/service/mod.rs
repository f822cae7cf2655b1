//! Board use-case services.
//!
//! # Responsibility
//! - Wire board model, drag controller, allocator and reconciler to one
//!   persistence gateway.
//! - Keep shell layers decoupled from storage and reconciliation details.

pub mod board_service;
