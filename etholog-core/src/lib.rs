//! # etholog-core
//!
//! Core library for etholog - queries and summaries over behavioral
//! experiment databases.
//!
//! This library provides:
//! - Typed rows for sessions, trials, state onsets and sensor events
//! - A read-only query layer over SQLite (`experiment`, `behavior` and
//!   `stimulus` schemas attached to one connection)
//! - Derived metrics: performance, session duration, trial counts
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Lazy and materialized results
//!
//! Loaders take a [`Format`]: [`Format::Query`] returns the unexecuted
//! [`Query`], which can be restricted further or counted; [`Format::Table`]
//! runs it and returns a [`Table`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use etholog_core::{Config, Database, DateRange, Format, SessionKey, TrialSelection};
//!
//! let config = Config::load().expect("failed to load config");
//! let db = Database::open(&config.database)
//!     .expect("failed to open database")
//!     .with_analysis(config.analysis.clone());
//!
//! let sessions = db.list_sessions(12, &DateRange::all(), 50).expect("query failed");
//! for session in &sessions {
//!     let perf = db.performance(&session.key(), &TrialSelection::All).expect("query failed");
//!     println!("{} {:?}", session.session, perf);
//! }
//!
//! let licks = db
//!     .trial_licks(&SessionKey::new(12, 3), &TrialSelection::only([1, 2]), Format::Table)
//!     .expect("query failed");
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::{Database, DateRange, Format, Frame, Query, SessionKey, Table, TrialSelection};
pub use error::{Error, Result};
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod logging;
pub mod types;
