//! Filter predicates built from loader arguments.
//!
//! Each filter renders to a SQL fragment plus bound parameters. Column names
//! are passed in by the caller so one filter can apply to any table alias.

use chrono::NaiveDate;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

/// Primary key of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub animal_id: i64,
    pub session: i64,
}

impl SessionKey {
    pub fn new(animal_id: i64, session: i64) -> Self {
        Self { animal_id, session }
    }

    /// `alias.animal_id = ? AND alias.session = ?`
    pub(crate) fn clause(&self, alias: &str) -> (String, Vec<Value>) {
        (
            format!("{0}.animal_id = ? AND {0}.session = ?", alias),
            vec![Value::Integer(self.animal_id), Value::Integer(self.session)],
        )
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "animal {} session {}", self.animal_id, self.session)
    }
}

/// Which trials of a session to load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TrialSelection {
    /// Every trial of the session
    #[default]
    All,
    /// Only the listed trial indices. An empty list selects nothing.
    Only(Vec<i64>),
}

impl TrialSelection {
    pub fn only(trials: impl IntoIterator<Item = i64>) -> Self {
        TrialSelection::Only(trials.into_iter().collect())
    }

    /// Whether the given trial index passes this selection
    pub fn contains(&self, trial_idx: i64) -> bool {
        match self {
            TrialSelection::All => true,
            TrialSelection::Only(trials) => trials.contains(&trial_idx),
        }
    }

    /// SQL restriction on `column`, or `None` when every trial passes.
    pub(crate) fn clause(&self, column: &str) -> Option<(String, Vec<Value>)> {
        match self {
            TrialSelection::All => None,
            TrialSelection::Only(trials) if trials.is_empty() => Some(("0".to_string(), vec![])),
            TrialSelection::Only(trials) => {
                let placeholders = vec!["?"; trials.len()].join(", ");
                Some((
                    format!("{} IN ({})", column, placeholders),
                    trials.iter().map(|t| Value::Integer(*t)).collect(),
                ))
            }
        }
    }
}

impl From<Vec<i64>> for TrialSelection {
    fn from(trials: Vec<i64>) -> Self {
        TrialSelection::Only(trials)
    }
}

impl From<Option<Vec<i64>>> for TrialSelection {
    fn from(trials: Option<Vec<i64>>) -> Self {
        trials.map_or(TrialSelection::All, TrialSelection::Only)
    }
}

/// Inclusive calendar-date range over session start times.
///
/// Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    /// No bound on either side
    pub fn all() -> Self {
        Self::default()
    }

    /// A single day
    pub fn day(date: NaiveDate) -> Self {
        Self::new(Some(date), Some(date))
    }

    /// True when `from` is after `to`; such a range matches nothing
    pub fn is_empty(&self) -> bool {
        matches!((self.from, self.to), (Some(from), Some(to)) if from > to)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }

    /// SQL restriction on the date part of a timestamp column.
    pub(crate) fn clause(&self, column: &str) -> Option<(String, Vec<Value>)> {
        let mut parts = Vec::new();
        let mut params = Vec::new();

        if let Some(from) = self.from {
            parts.push(format!("date({}) >= ?", column));
            params.push(Value::Text(from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.to {
            parts.push(format!("date({}) <= ?", column));
            params.push(Value::Text(to.format("%Y-%m-%d").to_string()));
        }

        if parts.is_empty() {
            None
        } else {
            Some((parts.join(" AND "), params))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_trial_selection_clause() {
        assert!(TrialSelection::All.clause("t.trial_idx").is_none());

        let (sql, params) = TrialSelection::only([3, 5]).clause("t.trial_idx").unwrap();
        assert_eq!(sql, "t.trial_idx IN (?, ?)");
        assert_eq!(params, vec![Value::Integer(3), Value::Integer(5)]);

        let (sql, params) = TrialSelection::Only(vec![]).clause("t.trial_idx").unwrap();
        assert_eq!(sql, "0");
        assert!(params.is_empty());
    }

    #[test]
    fn test_trial_selection_contains() {
        assert!(TrialSelection::All.contains(42));
        let only = TrialSelection::from(Some(vec![1, 2]));
        assert!(only.contains(2));
        assert!(!only.contains(3));
        assert!(!TrialSelection::Only(vec![]).contains(1));
        assert_eq!(TrialSelection::from(None), TrialSelection::All);
    }

    #[test]
    fn test_date_range_clause() {
        assert!(DateRange::all().clause("s.session_tmst").is_none());

        let range = DateRange::new(Some(date(2024, 3, 1)), None);
        let (sql, params) = range.clause("s.session_tmst").unwrap();
        assert_eq!(sql, "date(s.session_tmst) >= ?");
        assert_eq!(params, vec![Value::Text("2024-03-01".to_string())]);

        let (sql, params) = DateRange::day(date(2024, 3, 2))
            .clause("s.session_tmst")
            .unwrap();
        assert_eq!(sql, "date(s.session_tmst) >= ? AND date(s.session_tmst) <= ?");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_date_range_contains() {
        let range = DateRange::new(Some(date(2024, 3, 1)), Some(date(2024, 3, 31)));
        assert!(range.contains(date(2024, 3, 1)));
        assert!(range.contains(date(2024, 3, 31)));
        assert!(!range.contains(date(2024, 4, 1)));
        assert!(!range.is_empty());
        assert!(DateRange::new(Some(date(2024, 4, 1)), Some(date(2024, 3, 1))).is_empty());
    }

    #[test]
    fn test_session_key_clause() {
        let (sql, params) = SessionKey::new(7, 3).clause("s");
        assert_eq!(sql, "s.animal_id = ? AND s.session = ?");
        assert_eq!(params, vec![Value::Integer(7), Value::Integer(3)]);
        assert_eq!(SessionKey::new(7, 3).to_string(), "animal 7 session 3");
    }
}
