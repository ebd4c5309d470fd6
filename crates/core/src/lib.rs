//! Marginalia Core - Shared types library.
//!
//! This crate provides common types used across all Marginalia components:
//! - `reports` - Report generation library (calendar, aggregation, risk)
//! - `cli` - Command-line entry points and the job worker
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients. This keeps it lightweight and allows
//! it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, sales-channel
//!   classification, and title sort keys

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
