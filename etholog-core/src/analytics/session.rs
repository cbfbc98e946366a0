//! Session-level aggregates: durations, trial counts and summaries.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use super::performance::PerformanceCounts;
use crate::db::loaders::{sessions_query, trial_licks_query, trials_query};
use crate::db::{Database, DateRange, SessionKey, TrialSelection};
use crate::error::Result;
use crate::format::format_duration_opt;
use crate::types::{Session, SessionClasses};

/// Everything a session overview shows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session: Session,
    pub classes: Vec<SessionClasses>,
    /// Session length in whole seconds, when the session has trials
    pub duration_secs: Option<i64>,
    /// `H:MM:SS` rendering of the duration
    pub duration: String,
    pub trial_count: usize,
    pub aborted_count: usize,
    pub counts: PerformanceCounts,
    pub performance: Option<f64>,
    pub lick_count: usize,
}

/// Trial count of one session in a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionTrialCount {
    pub key: SessionKey,
    pub trials: usize,
}

impl Database {
    /// Time of the last recorded trial event, in ms since session start.
    ///
    /// Considers trial starts and ends and state onsets. `None` when the
    /// session has no trials.
    fn last_event_ms(&self, key: &SessionKey) -> Result<Option<i64>> {
        let conn = self.connection();
        let (trials, last_trial): (i64, Option<i64>) = conn.query_row(
            "SELECT COUNT(*), MAX(MAX(time, COALESCE(end_time, time))) \
             FROM experiment.trial WHERE animal_id = ? AND session = ?",
            [key.animal_id, key.session],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        if trials == 0 {
            return Ok(None);
        }

        let last_state: Option<i64> = conn.query_row(
            "SELECT MAX(time) FROM experiment.trial_state WHERE animal_id = ? AND session = ?",
            [key.animal_id, key.session],
            |r| r.get(0),
        )?;

        Ok(last_trial.max(last_state))
    }

    /// Timestamp of the last recorded trial event
    pub fn session_end(&self, key: &SessionKey) -> Result<Option<NaiveDateTime>> {
        let Some(session) = self.session(key)? else {
            return Ok(None);
        };
        Ok(self
            .last_event_ms(key)?
            .map(|ms| session.session_tmst + Duration::milliseconds(ms.max(0))))
    }

    /// Time between session start and its last recorded trial event.
    ///
    /// `None` for unknown sessions and sessions without trials. Never negative.
    pub fn session_duration(&self, key: &SessionKey) -> Result<Option<Duration>> {
        if self.session(key)?.is_none() {
            return Ok(None);
        }
        Ok(self
            .last_event_ms(key)?
            .map(|ms| Duration::milliseconds(ms.max(0))))
    }

    /// Number of selected trials; equals the row count of [`Database::trials`]
    pub fn trial_count(
        &self,
        key: &SessionKey,
        trials: &TrialSelection,
        remove_aborted: bool,
    ) -> Result<usize> {
        trials_query(key, trials, remove_aborted).count(self)
    }

    /// Trial count of every session of an animal in a date range
    pub fn trials_per_session(
        &self,
        animal_id: i64,
        range: &DateRange,
    ) -> Result<Vec<SessionTrialCount>> {
        let table = sessions_query(animal_id, range, 0).fetch(self)?;
        let sessions = table.i64_column("session")?;
        let trials = table.i64_column("trials")?;

        Ok(sessions
            .into_iter()
            .zip(trials)
            .filter_map(|(session, trials)| {
                Some(SessionTrialCount {
                    key: SessionKey::new(animal_id, session?),
                    trials: trials.unwrap_or(0).max(0) as usize,
                })
            })
            .collect())
    }

    /// Overview of one session; `None` when the session does not exist
    pub fn session_summary(&self, key: &SessionKey) -> Result<Option<SessionSummary>> {
        let Some(session) = self.session(key)? else {
            tracing::debug!(%key, "No such session");
            return Ok(None);
        };

        let all = TrialSelection::All;
        let trial_count = self.trial_count(key, &all, false)?;
        let aborted_count = trial_count - self.trial_count(key, &all, true)?;
        let counts = self.performance_counts(key, &all)?;
        let duration = self.session_duration(key)?;

        Ok(Some(SessionSummary {
            classes: self.session_classes(key)?,
            duration_secs: duration.map(|d| d.num_seconds()),
            duration: format_duration_opt(duration),
            trial_count,
            aborted_count,
            counts,
            performance: counts.ratio(),
            lick_count: trial_licks_query(key, &all).count(self)?,
            session,
        }))
    }

    /// Summaries of every session of an animal in a date range
    pub fn animal_summary(
        &self,
        animal_id: i64,
        range: &DateRange,
        min_trials: usize,
    ) -> Result<Vec<SessionSummary>> {
        let sessions: Vec<Session> = sessions_query(animal_id, range, min_trials).fetch_as(self)?;
        tracing::info!(animal_id, sessions = sessions.len(), "Summarizing sessions");

        let mut summaries = Vec::with_capacity(sessions.len());
        for session in sessions {
            if let Some(summary) = self.session_summary(&session.key())? {
                summaries.push(summary);
            }
        }
        Ok(summaries)
    }
}
