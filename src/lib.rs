//! Storefront
//!
//! Customers, orders and products in a relational store, a synthetic data
//! generator to fill it, and a set of read-only reports over it.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod reports;
pub mod services;

pub use errors::{AppError, ServiceError};
pub use services::reports::ReportService;
pub use services::seed::{create_random_data, SeedService, SeedSummary};
