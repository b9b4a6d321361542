//! Bill payment aggregation backend
//!
//! Purchases for electricity, data, airtime, education and TV are sent to a
//! provider, normalised into one record shape per family and persisted so
//! every request id maps to exactly one transaction.

pub mod api;
pub mod bills;
#[cfg(feature = "cache")]
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod providers;
pub mod services;
