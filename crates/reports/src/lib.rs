//! Marginalia Reports - scheduled retail operations reporting.
//!
//! This crate turns the Shopify Admin API into recurring operational
//! artifacts for a single retail shop:
//!
//! - **Daily sales** - the previous business window's paid orders,
//!   aggregated per product into four mutually exclusive buckets
//!   (main, backorder, out-of-stock, preorder) and split by channel.
//! - **Unfulfilled audit** - outstanding line items over a lookback
//!   window plus a committed-inventory risk summary with order ages.
//! - **Inventory hygiene** - catalog maintenance views (negative
//!   inventory, orphaned listings, uncovered commitments) and the
//!   fully shippable slice of the unfulfilled backlog.
//!
//! # Architecture
//!
//! - [`calendar`] - business-day rules and reporting-window resolution
//! - [`window`] - trading-day timestamp materialization (ET, 10:00 cutoff)
//! - [`shopify`] - GraphQL fetcher for orders, snapshots, and the catalog
//! - [`aggregate`] - sales bucketing and per-product accumulation
//! - [`risk`] - unfulfilled risk classification and age statistics
//! - [`hygiene`] - catalog maintenance views and shippable orders
//! - [`emit`] - CSV artifacts and email delivery
//! - [`run`] - report orchestration
//! - [`worker`] - Postgres-backed job polling loop
//!
//! Calendar, aggregation, and risk logic are pure, single-pass functions
//! over in-memory data; all I/O lives in the fetcher, emitters, and worker.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod aggregate;
pub mod calendar;
pub mod config;
pub mod emit;
pub mod error;
pub mod hygiene;
pub mod model;
pub mod risk;
pub mod run;
pub mod shopify;
pub mod window;
pub mod worker;

pub use config::ReportsConfig;
pub use error::ReportError;
