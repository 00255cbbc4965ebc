//! trueno-core: Wire types, filters, and configuration for the Trueno graph driver.
//!
//! This crate has no I/O. It provides:
//! - The message envelope exchanged with the remote service
//! - Component, algorithm, job-status, and direction enums with their wire spellings
//! - The fluent query filter builder
//! - Connection configuration loading
//! - Common error types

pub mod config;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod types;

pub use config::DriverConfig;
pub use envelope::{Envelope, Status};
pub use error::TruenoError;
pub use filter::{Clause, Combinator, Filter, RangeOp};
pub use types::{Algorithm, ComponentType, Direction, JobStatus};
