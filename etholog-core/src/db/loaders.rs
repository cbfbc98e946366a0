//! Parameterized read-only loaders.
//!
//! Every loader comes in two parts: a `*_query` function that builds the lazy
//! [`Query`] from its arguments, and a method on [`Database`] that returns it
//! in the requested [`Format`].

use rusqlite::types::Value;

use super::filter::{DateRange, SessionKey, TrialSelection};
use super::query::{Format, Frame, Query};
use super::Database;
use crate::error::Result;
use crate::types::{Session, SessionClasses};

/// Small SELECT composer: a fixed head plus AND-ed restrictions.
struct Select {
    head: String,
    clauses: Vec<String>,
    params: Vec<Value>,
    group_by: Option<&'static str>,
    having: Option<(String, Vec<Value>)>,
    order_by: &'static str,
}

impl Select {
    fn new(head: impl Into<String>, order_by: &'static str) -> Self {
        Self {
            head: head.into(),
            clauses: Vec::new(),
            params: Vec::new(),
            group_by: None,
            having: None,
            order_by,
        }
    }

    fn filter(mut self, (clause, params): (String, Vec<Value>)) -> Self {
        self.clauses.push(clause);
        self.params.extend(params);
        self
    }

    fn filter_opt(self, clause: Option<(String, Vec<Value>)>) -> Self {
        match clause {
            Some(c) => self.filter(c),
            None => self,
        }
    }

    fn group_by(mut self, columns: &'static str, having: Option<(String, Vec<Value>)>) -> Self {
        self.group_by = Some(columns);
        self.having = having;
        self
    }

    fn build(self) -> Query {
        let mut sql = self.head;
        let mut params = self.params;

        if !self.clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.clauses.join(" AND "));
        }
        if let Some(group_by) = self.group_by {
            sql.push_str(" GROUP BY ");
            sql.push_str(group_by);
        }
        if let Some((having, having_params)) = self.having {
            sql.push_str(" HAVING ");
            sql.push_str(&having);
            params.extend(having_params);
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(self.order_by);

        Query::new(sql, params)
    }
}

// ============================================
// Query builders
// ============================================

/// Sessions of an animal within a date range having at least `min_trials`
/// trials, with a `trials` count column.
pub fn sessions_query(animal_id: i64, range: &DateRange, min_trials: usize) -> Query {
    let having = (min_trials > 0).then(|| {
        (
            "COUNT(t.trial_idx) >= ?".to_string(),
            vec![Value::Integer(i64::try_from(min_trials).unwrap_or(i64::MAX))],
        )
    });

    Select::new(
        "SELECT s.animal_id, s.session, s.setup, s.user_name, s.session_tmst, \
                s.experiment_type, COUNT(t.trial_idx) AS trials \
         FROM experiment.session s \
         LEFT JOIN experiment.trial t \
           ON t.animal_id = s.animal_id AND t.session = s.session",
        "s.session",
    )
    .filter((
        "s.animal_id = ?".to_string(),
        vec![Value::Integer(animal_id)],
    ))
    .filter_opt(range.clause("s.session_tmst"))
    .group_by("s.animal_id, s.session", having)
    .build()
}

/// Trials of a session, optionally without the aborted ones
pub fn trials_query(key: &SessionKey, trials: &TrialSelection, remove_aborted: bool) -> Query {
    let aborted = remove_aborted.then(|| {
        (
            "NOT EXISTS (SELECT 1 FROM experiment.trial_aborted a \
             WHERE a.animal_id = t.animal_id AND a.session = t.session \
               AND a.trial_idx = t.trial_idx)"
                .to_string(),
            vec![],
        )
    });

    Select::new(
        "SELECT t.animal_id, t.session, t.trial_idx, t.cond_hash, t.time, t.end_time \
         FROM experiment.trial t",
        "t.trial_idx",
    )
    .filter(key.clause("t"))
    .filter_opt(trials.clause("t.trial_idx"))
    .filter_opt(aborted)
    .build()
}

/// State onsets of the selected trials, in time order
pub fn trial_states_query(key: &SessionKey, trials: &TrialSelection) -> Query {
    Select::new(
        "SELECT st.animal_id, st.session, st.trial_idx, st.state, st.time \
         FROM experiment.trial_state st",
        "st.trial_idx, st.time",
    )
    .filter(key.clause("st"))
    .filter_opt(trials.clause("st.trial_idx"))
    .build()
}

/// Trials that entered `state` at least once
pub fn trials_with_state_query(key: &SessionKey, state: &str) -> Query {
    Select::new(
        "SELECT t.animal_id, t.session, t.trial_idx, t.cond_hash, t.time, t.end_time \
         FROM experiment.trial t",
        "t.trial_idx",
    )
    .filter(key.clause("t"))
    .filter((
        "EXISTS (SELECT 1 FROM experiment.trial_state st \
         WHERE st.animal_id = t.animal_id AND st.session = t.session \
           AND st.trial_idx = t.trial_idx AND st.state = ?)"
            .to_string(),
        vec![Value::Text(state.to_string())],
    ))
    .build()
}

/// Trials joined with their experiment condition and its parameters
pub fn trial_experiment_query(key: &SessionKey, trials: &TrialSelection) -> Query {
    Select::new(
        "SELECT t.animal_id, t.session, t.trial_idx, t.cond_hash, t.time, t.end_time, \
                c.experiment_class, c.behavior_class, c.stimulus_class, \
                p.difficulty, p.trial_selection, p.max_reward \
         FROM experiment.trial t \
         JOIN experiment.condition c ON c.cond_hash = t.cond_hash \
         LEFT JOIN experiment.condition_params p ON p.cond_hash = t.cond_hash",
        "t.trial_idx",
    )
    .filter(key.clause("t"))
    .filter_opt(trials.clause("t.trial_idx"))
    .build()
}

/// Trials joined with their behavior condition (response and reward ports)
pub fn trial_behavior_query(key: &SessionKey, trials: &TrialSelection) -> Query {
    Select::new(
        "SELECT bt.animal_id, bt.session, bt.trial_idx, bt.beh_hash, bt.time, \
                rp.response_port, wp.reward_port, wp.reward_amount, wp.reward_type \
         FROM behavior.beh_condition_trial bt \
         LEFT JOIN behavior.response_port rp ON rp.beh_hash = bt.beh_hash \
         LEFT JOIN behavior.reward_port wp ON wp.beh_hash = bt.beh_hash",
        "bt.trial_idx",
    )
    .filter(key.clause("bt"))
    .filter_opt(trials.clause("bt.trial_idx"))
    .build()
}

/// Trials joined with their stimulus condition and parameters
pub fn trial_stimulus_query(key: &SessionKey, trials: &TrialSelection) -> Query {
    Select::new(
        "SELECT sct.animal_id, sct.session, sct.trial_idx, sct.stim_hash, sc.stimulus_class, \
                sct.start_time, sct.end_time, sp.params \
         FROM stimulus.stim_condition_trial sct \
         JOIN stimulus.stim_condition sc ON sc.stim_hash = sct.stim_hash \
         LEFT JOIN stimulus.stim_params sp ON sp.stim_hash = sct.stim_hash",
        "sct.trial_idx",
    )
    .filter(key.clause("sct"))
    .filter_opt(trials.clause("sct.trial_idx"))
    .build()
}

/// Lick events of the selected trials, in time order
pub fn trial_licks_query(key: &SessionKey, trials: &TrialSelection) -> Query {
    Select::new(
        "SELECT l.animal_id, l.session, l.trial_idx, l.port, l.time FROM behavior.lick l",
        "l.time, l.port",
    )
    .filter(key.clause("l"))
    .filter_opt(trials.clause("l.trial_idx"))
    .build()
}

/// Proximity events of the selected trials, in time order
pub fn trial_proximities_query(key: &SessionKey, trials: &TrialSelection) -> Query {
    Select::new(
        "SELECT p.animal_id, p.session, p.trial_idx, p.port, p.time, p.in_position \
         FROM behavior.proximity p",
        "p.time, p.port",
    )
    .filter(key.clause("p"))
    .filter_opt(trials.clause("p.trial_idx"))
    .build()
}

/// Distinct class triples the session's trials ran with
pub fn session_classes_query(key: &SessionKey) -> Query {
    Select::new(
        "SELECT DISTINCT c.experiment_class, c.behavior_class, c.stimulus_class \
         FROM experiment.trial t \
         JOIN experiment.condition c ON c.cond_hash = t.cond_hash",
        "c.experiment_class, c.behavior_class, c.stimulus_class",
    )
    .filter(key.clause("t"))
    .build()
}

// ============================================
// Loaders
// ============================================

impl Database {
    /// Sessions of `animal_id` in `range` with at least `min_trials` trials
    pub fn sessions(
        &self,
        animal_id: i64,
        range: &DateRange,
        min_trials: usize,
        format: Format,
    ) -> Result<Frame> {
        Frame::build(self, sessions_query(animal_id, range, min_trials), format)
    }

    /// Typed session list, same filtering as [`Database::sessions`]
    pub fn list_sessions(
        &self,
        animal_id: i64,
        range: &DateRange,
        min_trials: usize,
    ) -> Result<Vec<Session>> {
        sessions_query(animal_id, range, min_trials).fetch_as(self)
    }

    /// One session by key
    pub fn session(&self, key: &SessionKey) -> Result<Option<Session>> {
        let query = Select::new(
            "SELECT s.animal_id, s.session, s.setup, s.user_name, s.session_tmst, \
                    s.experiment_type \
             FROM experiment.session s",
            "s.session",
        )
        .filter(key.clause("s"))
        .build();

        Ok(query.fetch_as::<Session>(self)?.into_iter().next())
    }

    /// Animals with at least one session
    pub fn animals(&self) -> Result<Vec<i64>> {
        let conn = self.connection();
        let mut stmt =
            conn.prepare("SELECT DISTINCT animal_id FROM experiment.session ORDER BY animal_id")?;
        let animals = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(animals)
    }

    pub fn trials(
        &self,
        key: &SessionKey,
        trials: &TrialSelection,
        remove_aborted: bool,
        format: Format,
    ) -> Result<Frame> {
        Frame::build(self, trials_query(key, trials, remove_aborted), format)
    }

    pub fn trial_states(
        &self,
        key: &SessionKey,
        trials: &TrialSelection,
        format: Format,
    ) -> Result<Frame> {
        Frame::build(self, trial_states_query(key, trials), format)
    }

    pub fn trials_with_state(&self, key: &SessionKey, state: &str, format: Format) -> Result<Frame> {
        Frame::build(self, trials_with_state_query(key, state), format)
    }

    pub fn trial_experiment(
        &self,
        key: &SessionKey,
        trials: &TrialSelection,
        format: Format,
    ) -> Result<Frame> {
        Frame::build(self, trial_experiment_query(key, trials), format)
    }

    pub fn trial_behavior(
        &self,
        key: &SessionKey,
        trials: &TrialSelection,
        format: Format,
    ) -> Result<Frame> {
        Frame::build(self, trial_behavior_query(key, trials), format)
    }

    pub fn trial_stimulus(
        &self,
        key: &SessionKey,
        trials: &TrialSelection,
        format: Format,
    ) -> Result<Frame> {
        Frame::build(self, trial_stimulus_query(key, trials), format)
    }

    /// Stimulus parameters of each selected trial, decoded from JSON.
    ///
    /// Trials whose stimulus has no parameter row are skipped.
    pub fn trial_stimulus_params(
        &self,
        key: &SessionKey,
        trials: &TrialSelection,
    ) -> Result<Vec<(i64, serde_json::Value)>> {
        let table = trial_stimulus_query(key, trials).fetch(self)?;
        let trial_idx = table.i64_column("trial_idx")?;
        let params = table.text_column("params")?;

        let mut decoded = Vec::new();
        for (idx, raw) in trial_idx.into_iter().zip(params) {
            if let (Some(idx), Some(raw)) = (idx, raw) {
                decoded.push((idx, serde_json::from_str(&raw)?));
            }
        }
        Ok(decoded)
    }

    pub fn trial_licks(
        &self,
        key: &SessionKey,
        trials: &TrialSelection,
        format: Format,
    ) -> Result<Frame> {
        Frame::build(self, trial_licks_query(key, trials), format)
    }

    pub fn trial_proximities(
        &self,
        key: &SessionKey,
        trials: &TrialSelection,
        format: Format,
    ) -> Result<Frame> {
        Frame::build(self, trial_proximities_query(key, trials), format)
    }

    /// Distinct (experiment, behavior, stimulus) classes used in a session
    pub fn session_classes(&self, key: &SessionKey) -> Result<Vec<SessionClasses>> {
        session_classes_query(key).fetch_as(self)
    }
}
