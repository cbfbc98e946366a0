//! Database handle
//!
//! One SQLite connection with the `experiment`, `behavior` and `stimulus`
//! schemas attached. Loaders and analytics are implemented on [`Database`] in
//! their own modules.

use crate::config::{AnalysisConfig, DatabaseConfig};
use crate::error::{Error, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::schema::{self, BEHAVIOR, EXPERIMENT, STIMULUS};

/// Database handle (single shared connection)
pub struct Database {
    conn: Mutex<Connection>,
    analysis: AnalysisConfig,
}

impl Database {
    /// Open the three schema files read-only.
    ///
    /// Every file must exist and provide the required tables.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let conn = Self::attach_all(config, "ro")?;
        schema::verify_schema(&conn)?;

        tracing::info!(
            experiment = %config.experiment.display(),
            behavior = %config.behavior.display(),
            stimulus = %config.stimulus.display(),
            "Opened experiment database"
        );

        Ok(Self::from_connection(conn))
    }

    /// Open the three schema files read-write, creating files and tables
    /// that do not exist yet.
    ///
    /// Used to build fixture and demo databases.
    pub fn create(config: &DatabaseConfig) -> Result<Self> {
        for path in [&config.experiment, &config.behavior, &config.stimulus] {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Self::attach_all(config, "rwc")?;
        schema::create_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database with empty schemas (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        for name in [EXPERIMENT, BEHAVIOR, STIMULUS] {
            conn.execute(&format!("ATTACH DATABASE ':memory:' AS {}", name), [])?;
        }
        schema::create_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            analysis: AnalysisConfig::default(),
        }
    }

    fn attach_all(config: &DatabaseConfig, mode: &str) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            ":memory:",
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        for (name, path) in [
            (EXPERIMENT, &config.experiment),
            (BEHAVIOR, &config.behavior),
            (STIMULUS, &config.stimulus),
        ] {
            if mode == "ro" && !path.exists() {
                return Err(Error::Config(format!(
                    "{} database not found at {}",
                    name,
                    path.display()
                )));
            }
            conn.execute(
                &format!("ATTACH DATABASE ?1 AS {}", name),
                [file_uri(path, mode)],
            )?;
            tracing::debug!(schema = name, path = %path.display(), mode, "Attached schema");
        }

        Ok(conn)
    }

    /// Use these settings for derived metrics
    pub fn with_analysis(mut self, analysis: AnalysisConfig) -> Self {
        self.analysis = analysis;
        self
    }

    /// Settings used for derived metrics
    pub fn analysis(&self) -> &AnalysisConfig {
        &self.analysis
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// SQLite URI for a file path with an open mode.
///
/// Absolute paths get an empty authority (`file:///..`); repeated leading
/// slashes are collapsed so they are not read as a host name.
fn file_uri(path: &Path, mode: &str) -> String {
    let raw = path.to_string_lossy();
    let (prefix, rest) = match raw.strip_prefix('/') {
        Some(rest) => ("file:///", rest.trim_start_matches('/')),
        None => ("file:", &*raw),
    };

    let mut encoded = String::from(prefix);
    for c in rest.chars() {
        match c {
            '%' => encoded.push_str("%25"),
            '?' => encoded.push_str("%3f"),
            '#' => encoded.push_str("%23"),
            _ => encoded.push(c),
        }
    }
    format!("{}?mode={}", encoded, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_file_uri_escapes() {
        assert_eq!(
            file_uri(Path::new("/data/a?b#c%.db"), "ro"),
            "file:///data/a%3fb%23c%25.db?mode=ro"
        );
        assert_eq!(
            file_uri(Path::new("//tmp/lab/experiment.db"), "ro"),
            "file:///tmp/lab/experiment.db?mode=ro"
        );
        assert_eq!(
            file_uri(Path::new("lab/experiment.db"), "rwc"),
            "file:lab/experiment.db?mode=rwc"
        );
    }

    #[test]
    fn test_open_path_with_double_leading_slash() {
        let dir = TempDir::new().unwrap();
        let config = DatabaseConfig::in_dir(&dir.path().join("lab"));
        Database::create(&config).unwrap();

        let doubled = PathBuf::from(format!("/{}", dir.path().join("lab").display()));
        let db = Database::open(&DatabaseConfig::in_dir(&doubled)).unwrap();
        let n: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM experiment.session", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn test_create_then_open_read_only() {
        let dir = TempDir::new().unwrap();
        let config = DatabaseConfig::in_dir(&dir.path().join("lab"));

        {
            let db = Database::create(&config).unwrap();
            db.connection()
                .execute(
                    "INSERT INTO experiment.session VALUES (1, 1, 'rig-1', 'ana', '2024-03-01 10:00:00', 'MatchPort')",
                    [],
                )
                .unwrap();
        }

        let db = Database::open(&config).unwrap();
        let n: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM experiment.session", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 1);

        // Read-only attachments refuse writes
        let write = db
            .connection()
            .execute("DELETE FROM experiment.session", []);
        assert!(write.is_err());
    }

    #[test]
    fn test_open_missing_file() {
        let dir = TempDir::new().unwrap();
        let config = DatabaseConfig::in_dir(dir.path());
        assert!(matches!(Database::open(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_open_without_tables() {
        let dir = TempDir::new().unwrap();
        let config = DatabaseConfig::in_dir(dir.path());
        for path in [&config.experiment, &config.behavior, &config.stimulus] {
            Connection::open(path)
                .unwrap()
                .execute_batch("CREATE TABLE unrelated (x INTEGER)")
                .unwrap();
        }
        assert!(matches!(Database::open(&config), Err(Error::Schema { .. })));
    }
}
