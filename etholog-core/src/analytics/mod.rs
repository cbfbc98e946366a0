//! Analytics module for etholog
//!
//! Derived metrics computed from loader results:
//! - Trial outcomes and performance (rewarded / decisive trials)
//! - Rolling performance for learning curves
//! - Session durations, trial counts and session summaries
//!
//! Everything here is implemented on [`Database`](crate::Database) and
//! post-processes materialized rows in memory.

pub mod performance;
pub mod session;

pub use performance::{
    classify_trials, rolling_performance, Outcome, PerformanceCounts, SessionPerformance,
};
pub use session::{SessionSummary, SessionTrialCount};
