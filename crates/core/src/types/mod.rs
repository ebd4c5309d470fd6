//! Core types for Marginalia.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod channel;
pub mod id;
pub mod title;

pub use channel::SalesChannel;
pub use id::*;
pub use title::sort_key;
