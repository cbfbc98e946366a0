//! Materialized query results.
//!
//! A [`Table`] is a column-named grid of SQLite values, the eager counterpart
//! of a lazy [`Query`](super::Query). Post-processing (filtering, projecting,
//! typed column extraction) happens in memory.

use std::collections::HashSet;

use rusqlite::types::Value;
use rusqlite::{Params, Statement};

use crate::error::{Error, Result};

/// Rows of a query result with named columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table from column names and rows.
    ///
    /// Every row must have one value per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        if let Some(bad) = rows.iter().position(|r| r.len() != columns.len()) {
            return Err(Error::Column(format!(
                "row {} has {} values, expected {}",
                bad,
                rows[bad].len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Run a prepared statement and collect every row
    pub(crate) fn from_statement<P: Params>(stmt: &mut Statement<'_>, params: P) -> Result<Self> {
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let rows = stmt
            .query_map(params, |row| {
                (0..width)
                    .map(|i| row.get::<_, Value>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::Column(format!("no column named {:?}", name)))
    }

    /// Value at `row` in column `name`
    pub fn get(&self, row: usize, name: &str) -> Result<&Value> {
        let col = self.column_index(name)?;
        self.rows
            .get(row)
            .map(|r| &r[col])
            .ok_or_else(|| Error::Column(format!("row {} out of range ({})", row, self.len())))
    }

    /// All values of one column
    pub fn column(&self, name: &str) -> Result<Vec<&Value>> {
        let col = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| &r[col]).collect())
    }

    /// Integer column; NULL becomes `None`
    pub fn i64_column(&self, name: &str) -> Result<Vec<Option<i64>>> {
        self.column(name)?
            .into_iter()
            .map(|v| match v {
                Value::Null => Ok(None),
                Value::Integer(i) => Ok(Some(*i)),
                other => Err(type_error(name, "integer", other)),
            })
            .collect()
    }

    /// Numeric column; integers are widened
    pub fn f64_column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        self.column(name)?
            .into_iter()
            .map(|v| match v {
                Value::Null => Ok(None),
                Value::Integer(i) => Ok(Some(*i as f64)),
                Value::Real(f) => Ok(Some(*f)),
                other => Err(type_error(name, "number", other)),
            })
            .collect()
    }

    /// Text column; NULL becomes `None`
    pub fn text_column(&self, name: &str) -> Result<Vec<Option<String>>> {
        self.column(name)?
            .into_iter()
            .map(|v| match v {
                Value::Null => Ok(None),
                Value::Text(s) => Ok(Some(s.clone())),
                other => Err(type_error(name, "text", other)),
            })
            .collect()
    }

    /// Rows whose value in column `name` satisfies `pred`
    pub fn filter_by<F>(&self, name: &str, pred: F) -> Result<Table>
    where
        F: Fn(&Value) -> bool,
    {
        let col = self.column_index(name)?;
        Ok(Table {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| pred(&r[col]))
                .cloned()
                .collect(),
        })
    }

    /// Projection onto `names`, keeping the first occurrence of each distinct row
    pub fn distinct(&self, names: &[&str]) -> Result<Table> {
        let cols = names
            .iter()
            .map(|n| self.column_index(n))
            .collect::<Result<Vec<_>>>()?;

        let mut seen = HashSet::new();
        let mut rows = Vec::new();
        for row in &self.rows {
            let projected: Vec<Value> = cols.iter().map(|&c| row[c].clone()).collect();
            let key = serde_json::Value::Array(projected.iter().map(value_to_json).collect())
                .to_string();
            if seen.insert(key) {
                rows.push(projected);
            }
        }

        Ok(Table {
            columns: names.iter().map(|n| n.to_string()).collect(),
            rows,
        })
    }

    /// Rows as JSON objects keyed by column name
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.rows
                .iter()
                .map(|row| {
                    let object = self
                        .columns
                        .iter()
                        .zip(row)
                        .map(|(c, v)| (c.clone(), value_to_json(v)))
                        .collect();
                    serde_json::Value::Object(object)
                })
                .collect(),
        )
    }
}

fn type_error(column: &str, expected: &str, got: &Value) -> Error {
    Error::Column(format!(
        "column {:?} holds {:?}, expected {}",
        column,
        got.data_type(),
        expected
    ))
}

/// Convert one SQLite value to JSON
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Real(f) => serde_json::Value::from(*f),
        Value::Text(s) => serde_json::Value::from(s.as_str()),
        Value::Blob(b) => serde_json::Value::from(b.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::new(
            vec!["trial_idx".into(), "state".into(), "time".into()],
            vec![
                vec![Value::Integer(1), Value::Text("Trial".into()), Value::Integer(100)],
                vec![Value::Integer(1), Value::Text("Reward".into()), Value::Integer(900)],
                vec![Value::Integer(2), Value::Text("Trial".into()), Value::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_ragged_rows() {
        let result = Table::new(vec!["a".into()], vec![vec![Value::Null, Value::Null]]);
        assert!(matches!(result, Err(Error::Column(_))));
    }

    #[test]
    fn test_typed_columns() {
        let table = sample();
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.i64_column("time").unwrap(),
            vec![Some(100), Some(900), None]
        );
        assert_eq!(table.f64_column("trial_idx").unwrap()[0], Some(1.0));
        assert_eq!(
            table.text_column("state").unwrap()[1].as_deref(),
            Some("Reward")
        );
        assert!(table.i64_column("state").is_err());
        assert!(matches!(table.column("missing"), Err(Error::Column(_))));
    }

    #[test]
    fn test_filter_and_distinct() {
        let table = sample();

        let rewards = table
            .filter_by("state", |v| matches!(v, Value::Text(s) if s == "Reward"))
            .unwrap();
        assert_eq!(rewards.len(), 1);
        assert_eq!(rewards.get(0, "time").unwrap(), &Value::Integer(900));

        let trials = table.distinct(&["trial_idx"]).unwrap();
        assert_eq!(trials.columns(), &["trial_idx".to_string()]);
        assert_eq!(trials.len(), 2);
    }

    #[test]
    fn test_to_json() {
        let json = sample().to_json();
        assert_eq!(json[0]["state"], "Trial");
        assert_eq!(json[1]["time"], 900);
        assert!(json[2]["time"].is_null());
    }

    #[test]
    fn test_get_out_of_range() {
        assert!(sample().get(10, "time").is_err());
    }
}
