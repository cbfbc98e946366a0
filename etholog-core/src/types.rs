//! Core domain types for etholog
//!
//! These types are typed views over rows of the experiment database.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Animal** | A subject, identified by an integer `animal_id` |
//! | **Session** | One behavioral recording episode for an animal |
//! | **Trial** | One discrete behavioral decision within a session |
//! | **State** | A named phase of the task (e.g. `PreTrial`, `Trial`, `Reward`, `Punish`) entered during a trial |
//! | **Condition** | The parameter set a trial ran with, identified by a hash per schema |
//! | **Lick** | A lick sensor event at a port |
//! | **Proximity** | A proximity sensor transition at a port (entering or leaving position) |
//!
//! Times inside a session are milliseconds relative to the session start
//! (`session_tmst`).

use chrono::NaiveDateTime;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::db::SessionKey;

/// Decode a typed value from a query result row.
///
/// Columns are looked up by name, so any query that selects (at least) the
/// named columns can be fetched as this type.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

// ============================================
// Sessions
// ============================================

/// A recording session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub animal_id: i64,
    pub session: i64,
    /// Name of the experimental setup (rig) the session ran on
    pub setup: String,
    /// Experimenter who started the session
    pub user_name: String,
    /// Session start
    pub session_tmst: NaiveDateTime,
    /// Experiment type (task family) the session ran
    pub experiment_type: String,
}

impl Session {
    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.animal_id, self.session)
    }
}

impl FromRow for Session {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Session {
            animal_id: row.get("animal_id")?,
            session: row.get("session")?,
            setup: row.get("setup")?,
            user_name: row.get("user_name")?,
            session_tmst: row.get("session_tmst")?,
            experiment_type: row.get("experiment_type")?,
        })
    }
}

/// The class triple a session's trials ran with.
///
/// A session can mix conditions, so a session may have several.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionClasses {
    pub experiment_class: String,
    pub behavior_class: String,
    pub stimulus_class: String,
}

impl FromRow for SessionClasses {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(SessionClasses {
            experiment_class: row.get("experiment_class")?,
            behavior_class: row.get("behavior_class")?,
            stimulus_class: row.get("stimulus_class")?,
        })
    }
}

// ============================================
// Trials
// ============================================

/// A single trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub animal_id: i64,
    pub session: i64,
    /// Index of the trial, unique within its session
    pub trial_idx: i64,
    /// Hash of the experiment condition this trial ran with
    pub cond_hash: String,
    /// Trial start (ms since session start)
    pub time: i64,
    /// Trial end (ms since session start), when recorded
    pub end_time: Option<i64>,
}

impl Trial {
    /// Trial length in ms, when the end was recorded
    pub fn duration_ms(&self) -> Option<i64> {
        self.end_time.map(|end| (end - self.time).max(0))
    }
}

impl FromRow for Trial {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Trial {
            animal_id: row.get("animal_id")?,
            session: row.get("session")?,
            trial_idx: row.get("trial_idx")?,
            cond_hash: row.get("cond_hash")?,
            time: row.get("time")?,
            end_time: row.get("end_time")?,
        })
    }
}

/// Onset of a task state within a trial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialState {
    pub animal_id: i64,
    pub session: i64,
    pub trial_idx: i64,
    pub state: String,
    /// Onset (ms since session start)
    pub time: i64,
}

impl FromRow for TrialState {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(TrialState {
            animal_id: row.get("animal_id")?,
            session: row.get("session")?,
            trial_idx: row.get("trial_idx")?,
            state: row.get("state")?,
            time: row.get("time")?,
        })
    }
}

// ============================================
// Sensor events
// ============================================

/// A lick detected at a port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LickEvent {
    pub animal_id: i64,
    pub session: i64,
    pub trial_idx: i64,
    pub port: i64,
    pub time: i64,
}

impl FromRow for LickEvent {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(LickEvent {
            animal_id: row.get("animal_id")?,
            session: row.get("session")?,
            trial_idx: row.get("trial_idx")?,
            port: row.get("port")?,
            time: row.get("time")?,
        })
    }
}

/// A proximity sensor transition at a port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProximityEvent {
    pub animal_id: i64,
    pub session: i64,
    pub trial_idx: i64,
    pub port: i64,
    pub time: i64,
    /// true when the animal entered position, false when it left
    pub in_position: bool,
}

impl FromRow for ProximityEvent {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ProximityEvent {
            animal_id: row.get("animal_id")?,
            session: row.get("session")?,
            trial_idx: row.get("trial_idx")?,
            port: row.get("port")?,
            time: row.get("time")?,
            in_position: row.get("in_position")?,
        })
    }
}
