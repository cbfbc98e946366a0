//! Database layer for etholog
//!
//! This module provides the read-only query layer over SQLite with:
//! - One connection with the `experiment`, `behavior` and `stimulus` schemas attached
//! - Lazy queries ([`Query`]) and materialized results ([`Table`])
//! - Parameterized loaders for sessions, trials, conditions and sensor events

pub mod filter;
pub mod loaders;
pub mod query;
pub mod repo;
pub mod schema;
pub mod table;

pub use filter::{DateRange, SessionKey, TrialSelection};
pub use query::{Format, Frame, Query};
pub use repo::Database;
pub use rusqlite::types::Value;
pub use table::Table;
