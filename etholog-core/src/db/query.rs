//! Lazy relational expressions.
//!
//! A [`Query`] is an unexecuted SELECT together with its bound parameters.
//! Loaders hand out queries so callers can restrict them further, count them,
//! or materialize them into a [`Table`] when they need the rows.

use rusqlite::types::Value;

use super::{Database, Table};
use crate::error::Result;
use crate::types::FromRow;

/// An unexecuted SELECT statement with bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    sql: String,
    params: Vec<Value>,
}

impl Query {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Wrap this query as a subquery with an additional WHERE clause.
    ///
    /// The clause sees the output columns of this query under alias `q`.
    pub fn restrict(self, clause: &str, params: Vec<Value>) -> Query {
        let mut all = self.params;
        all.extend(params);
        Query {
            sql: format!("SELECT q.* FROM ({}) AS q WHERE {}", self.sql, clause),
            params: all,
        }
    }

    /// Keep only rows whose `column` equals `value`
    pub fn restrict_eq(self, column: &str, value: impl Into<Value>) -> Query {
        self.restrict(&format!("q.{} = ?", column), vec![value.into()])
    }

    /// Execute and collect the rows
    pub fn fetch(&self, db: &Database) -> Result<Table> {
        tracing::debug!(sql = %self.sql, params = self.params.len(), "Fetching query");
        let conn = db.connection();
        let mut stmt = conn.prepare(&self.sql)?;
        let table = Table::from_statement(&mut stmt, rusqlite::params_from_iter(&self.params))?;
        tracing::trace!(rows = table.len(), "Query fetched");
        Ok(table)
    }

    /// Execute and decode every row as `T`
    pub fn fetch_as<T: FromRow>(&self, db: &Database) -> Result<Vec<T>> {
        tracing::debug!(sql = %self.sql, params = self.params.len(), "Fetching typed query");
        let conn = db.connection();
        let mut stmt = conn.prepare(&self.sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(&self.params), |row| T::from_row(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Number of rows this query would return
    pub fn count(&self, db: &Database) -> Result<usize> {
        let conn = db.connection();
        let n: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM ({})", self.sql),
            rusqlite::params_from_iter(&self.params),
            |r| r.get(0),
        )?;
        Ok(n as usize)
    }
}

/// Representation a loader should return
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// Materialize into a [`Table`]
    #[default]
    Table,
    /// Return the lazy [`Query`] without running it
    Query,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "table" => Ok(Format::Table),
            "query" | "sql" => Ok(Format::Query),
            _ => Err(format!("unknown format: {}", s)),
        }
    }
}

/// Loader output in the requested [`Format`]
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Table(Table),
    Query(Query),
}

impl Frame {
    /// Produce the requested representation of `query`
    pub(crate) fn build(db: &Database, query: Query, format: Format) -> Result<Frame> {
        match format {
            Format::Table => Ok(Frame::Table(query.fetch(db)?)),
            Format::Query => Ok(Frame::Query(query)),
        }
    }

    /// Materialize, running the query if needed
    pub fn into_table(self, db: &Database) -> Result<Table> {
        match self {
            Frame::Table(table) => Ok(table),
            Frame::Query(query) => query.fetch(db),
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Frame::Table(table) => Some(table),
            Frame::Query(_) => None,
        }
    }

    pub fn as_query(&self) -> Option<&Query> {
        match self {
            Frame::Query(query) => Some(query),
            Frame::Table(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_numbers() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.connection()
            .execute_batch(
                "CREATE TABLE experiment.numbers (n INTEGER, label TEXT);
                 INSERT INTO experiment.numbers VALUES (1, 'a'), (2, 'b'), (3, 'b');",
            )
            .unwrap();
        db
    }

    #[test]
    fn test_fetch_and_count_agree() {
        let db = db_with_numbers();
        let query = Query::new("SELECT n, label FROM experiment.numbers ORDER BY n", vec![]);

        let table = query.fetch(&db).unwrap();
        assert_eq!(table.columns(), &["n".to_string(), "label".to_string()]);
        assert_eq!(table.len(), 3);
        assert_eq!(query.count(&db).unwrap(), 3);
    }

    #[test]
    fn test_restrict_composes_lazily() {
        let db = db_with_numbers();
        let query = Query::new(
            "SELECT n, label FROM experiment.numbers WHERE n >= ?",
            vec![Value::Integer(2)],
        )
        .restrict_eq("label", "b".to_string())
        .restrict("q.n < ?", vec![Value::Integer(3)]);

        assert_eq!(query.params().len(), 3);
        let table = query.fetch(&db).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0, "n").unwrap(), &Value::Integer(2));
    }

    #[test]
    fn test_frame_build() {
        let db = db_with_numbers();
        let query = Query::new("SELECT n FROM experiment.numbers", vec![]);

        let lazy = Frame::build(&db, query.clone(), Format::Query).unwrap();
        assert_eq!(lazy.as_query(), Some(&query));
        assert!(lazy.as_table().is_none());
        assert_eq!(lazy.into_table(&db).unwrap().len(), 3);

        let eager = Frame::build(&db, query, Format::Table).unwrap();
        assert_eq!(eager.as_table().map(Table::len), Some(3));
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("table".parse::<Format>().unwrap(), Format::Table);
        assert_eq!("sql".parse::<Format>().unwrap(), Format::Query);
        assert!("parquet".parse::<Format>().is_err());
    }
}
