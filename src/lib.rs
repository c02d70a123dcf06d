//! congress-sync - Incremental synchronization of congress.gov legislative data
//!
//! This crate pulls bills, legislators and committees from the congress.gov
//! v3 API under a shared request budget, normalizes them, and upserts them
//! into a local SQLite store.

pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod normalize;
pub mod otel;
pub mod sync;
pub mod upstream;
