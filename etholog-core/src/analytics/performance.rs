//! Performance: the share of rewarded trials among decisive ones.
//!
//! A trial is decisive when it entered a reward or a punish state. The first
//! such state (by onset time) decides the outcome. Which state names count as
//! reward or punish comes from [`AnalysisConfig`].

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::db::loaders::{sessions_query, trial_states_query, trials_query};
use crate::db::{Database, DateRange, SessionKey, TrialSelection};
use crate::error::Result;
use crate::types::{Session, Trial, TrialState};

/// How a trial ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Reward,
    Punish,
    /// Neither a reward nor a punish state was entered
    Undecided,
}

impl Outcome {
    pub fn is_decisive(&self) -> bool {
        !matches!(self, Outcome::Undecided)
    }
}

/// Outcome counts over a set of trials
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PerformanceCounts {
    pub rewarded: usize,
    pub punished: usize,
    pub undecided: usize,
}

impl PerformanceCounts {
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a Outcome>) -> Self {
        let mut counts = Self::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Reward => counts.rewarded += 1,
                Outcome::Punish => counts.punished += 1,
                Outcome::Undecided => counts.undecided += 1,
            }
        }
        counts
    }

    pub fn decisive(&self) -> usize {
        self.rewarded + self.punished
    }

    pub fn total(&self) -> usize {
        self.decisive() + self.undecided
    }

    /// rewarded / (rewarded + punished); `None` without decisive trials
    pub fn ratio(&self) -> Option<f64> {
        match self.decisive() {
            0 => None,
            decisive => Some(self.rewarded as f64 / decisive as f64),
        }
    }
}

/// Performance of one session, for per-session plots
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionPerformance {
    pub animal_id: i64,
    pub session: i64,
    pub session_tmst: NaiveDateTime,
    pub trials: usize,
    pub counts: PerformanceCounts,
    pub performance: Option<f64>,
}

/// Classify each trial from its state onsets.
///
/// Every trial in `trials` gets an outcome, in trial order; states of trials
/// not listed are ignored.
pub fn classify_trials(
    trials: &[Trial],
    states: &[TrialState],
    analysis: &AnalysisConfig,
) -> Vec<(i64, Outcome)> {
    let mut by_trial: BTreeMap<i64, Vec<&TrialState>> = BTreeMap::new();
    for state in states {
        by_trial.entry(state.trial_idx).or_default().push(state);
    }

    let mut outcomes: Vec<(i64, Outcome)> = trials
        .iter()
        .map(|trial| {
            let mut onsets = by_trial.remove(&trial.trial_idx).unwrap_or_default();
            onsets.sort_by_key(|s| s.time);
            let outcome = onsets
                .iter()
                .find_map(|s| state_outcome(&s.state, analysis))
                .unwrap_or(Outcome::Undecided);
            (trial.trial_idx, outcome)
        })
        .collect();

    outcomes.sort_by_key(|(idx, _)| *idx);
    outcomes
}

fn state_outcome(state: &str, analysis: &AnalysisConfig) -> Option<Outcome> {
    if analysis.reward_states.iter().any(|s| s == state) {
        Some(Outcome::Reward)
    } else if analysis.punish_states.iter().any(|s| s == state) {
        Some(Outcome::Punish)
    } else {
        None
    }
}

/// Ratio of rewards over a moving window of decisive trials.
///
/// Undecided trials are skipped. One point per decisive trial, keyed by its
/// trial index; early points use the trials seen so far.
pub fn rolling_performance(outcomes: &[(i64, Outcome)], window: usize) -> Vec<(i64, f64)> {
    let window = window.max(1);
    let decisive: Vec<(i64, bool)> = outcomes
        .iter()
        .filter(|(_, o)| o.is_decisive())
        .map(|(idx, o)| (*idx, *o == Outcome::Reward))
        .collect();

    decisive
        .iter()
        .enumerate()
        .map(|(i, (idx, _))| {
            let start = (i + 1).saturating_sub(window);
            let slice = &decisive[start..=i];
            let rewarded = slice.iter().filter(|(_, r)| *r).count();
            (*idx, rewarded as f64 / slice.len() as f64)
        })
        .collect()
}

impl Database {
    /// Outcome of each selected trial of a session
    pub fn trial_outcomes(
        &self,
        key: &SessionKey,
        trials: &TrialSelection,
    ) -> Result<Vec<(i64, Outcome)>> {
        let trial_rows: Vec<Trial> = trials_query(key, trials, false).fetch_as(self)?;
        let states: Vec<TrialState> = trial_states_query(key, trials).fetch_as(self)?;
        Ok(classify_trials(&trial_rows, &states, self.analysis()))
    }

    /// Outcome counts of the selected trials
    pub fn performance_counts(
        &self,
        key: &SessionKey,
        trials: &TrialSelection,
    ) -> Result<PerformanceCounts> {
        let outcomes = self.trial_outcomes(key, trials)?;
        Ok(PerformanceCounts::from_outcomes(outcomes.iter().map(|(_, o)| o)))
    }

    /// Performance of the selected trials; `None` without decisive trials
    pub fn performance(&self, key: &SessionKey, trials: &TrialSelection) -> Result<Option<f64>> {
        let counts = self.performance_counts(key, trials)?;
        tracing::debug!(
            %key,
            rewarded = counts.rewarded,
            punished = counts.punished,
            "Computed performance"
        );
        Ok(counts.ratio())
    }

    /// Performance of every session of an animal in a date range
    pub fn performance_per_session(
        &self,
        animal_id: i64,
        range: &DateRange,
        min_trials: usize,
    ) -> Result<Vec<SessionPerformance>> {
        let sessions: Vec<Session> = sessions_query(animal_id, range, min_trials).fetch_as(self)?;

        sessions
            .into_iter()
            .map(|session| {
                let outcomes = self.trial_outcomes(&session.key(), &TrialSelection::All)?;
                let counts = PerformanceCounts::from_outcomes(outcomes.iter().map(|(_, o)| o));
                Ok(SessionPerformance {
                    animal_id: session.animal_id,
                    session: session.session,
                    session_tmst: session.session_tmst,
                    trials: outcomes.len(),
                    counts,
                    performance: counts.ratio(),
                })
            })
            .collect()
    }

    /// Rolling performance over a session, using the configured window
    pub fn rolling_performance(
        &self,
        key: &SessionKey,
        trials: &TrialSelection,
    ) -> Result<Vec<(i64, f64)>> {
        let outcomes = self.trial_outcomes(key, trials)?;
        Ok(rolling_performance(&outcomes, self.analysis().rolling_window))
    }
}
