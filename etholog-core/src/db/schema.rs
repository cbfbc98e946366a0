//! Database schema
//!
//! The experiment database is split over three SQLite files attached to one
//! connection as the `experiment`, `behavior` and `stimulus` schemas. This
//! crate only reads them; [`create_schema`] exists to build empty databases for
//! tests and demos.

use rusqlite::Connection;

use crate::error::{Error, Result};

/// Current schema version, stored in `experiment.user_version`
pub const SCHEMA_VERSION: i32 = 1;

/// Attached schema names
pub const EXPERIMENT: &str = "experiment";
pub const BEHAVIOR: &str = "behavior";
pub const STIMULUS: &str = "stimulus";

/// Tables every database must provide, by schema
pub const REQUIRED_TABLES: &[(&str, &[&str])] = &[
    (
        EXPERIMENT,
        &[
            "session",
            "trial",
            "trial_state",
            "trial_aborted",
            "condition",
            "condition_params",
        ],
    ),
    (
        BEHAVIOR,
        &[
            "beh_condition",
            "beh_condition_trial",
            "response_port",
            "reward_port",
            "lick",
            "proximity",
        ],
    ),
    (
        STIMULUS,
        &["stim_condition", "stim_condition_trial", "stim_params"],
    ),
];

const EXPERIMENT_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS experiment.session (
        animal_id        INTEGER NOT NULL,
        session          INTEGER NOT NULL,
        setup            TEXT NOT NULL,
        user_name        TEXT NOT NULL,
        session_tmst     TEXT NOT NULL,
        experiment_type  TEXT NOT NULL,
        PRIMARY KEY (animal_id, session)
    );

    CREATE TABLE IF NOT EXISTS experiment.condition (
        cond_hash        TEXT PRIMARY KEY,
        experiment_class TEXT NOT NULL,
        behavior_class   TEXT NOT NULL,
        stimulus_class   TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS experiment.condition_params (
        cond_hash        TEXT PRIMARY KEY REFERENCES condition(cond_hash),
        difficulty       INTEGER,
        trial_selection  TEXT,
        max_reward       REAL
    );

    CREATE TABLE IF NOT EXISTS experiment.trial (
        animal_id        INTEGER NOT NULL,
        session          INTEGER NOT NULL,
        trial_idx        INTEGER NOT NULL,
        cond_hash        TEXT NOT NULL,
        time             INTEGER NOT NULL,
        end_time         INTEGER,
        PRIMARY KEY (animal_id, session, trial_idx),
        FOREIGN KEY (animal_id, session) REFERENCES session(animal_id, session)
    );

    CREATE TABLE IF NOT EXISTS experiment.trial_state (
        animal_id        INTEGER NOT NULL,
        session          INTEGER NOT NULL,
        trial_idx        INTEGER NOT NULL,
        state            TEXT NOT NULL,
        time             INTEGER NOT NULL,
        PRIMARY KEY (animal_id, session, trial_idx, state, time),
        FOREIGN KEY (animal_id, session, trial_idx)
            REFERENCES trial(animal_id, session, trial_idx)
    );

    CREATE TABLE IF NOT EXISTS experiment.trial_aborted (
        animal_id        INTEGER NOT NULL,
        session          INTEGER NOT NULL,
        trial_idx        INTEGER NOT NULL,
        PRIMARY KEY (animal_id, session, trial_idx),
        FOREIGN KEY (animal_id, session, trial_idx)
            REFERENCES trial(animal_id, session, trial_idx)
    );

    CREATE INDEX IF NOT EXISTS experiment.idx_session_tmst ON session(session_tmst);
    CREATE INDEX IF NOT EXISTS experiment.idx_trial_cond ON trial(cond_hash);
"#;

const BEHAVIOR_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS behavior.beh_condition (
        beh_hash         TEXT PRIMARY KEY
    );

    CREATE TABLE IF NOT EXISTS behavior.beh_condition_trial (
        animal_id        INTEGER NOT NULL,
        session          INTEGER NOT NULL,
        trial_idx        INTEGER NOT NULL,
        beh_hash         TEXT NOT NULL REFERENCES beh_condition(beh_hash),
        time             INTEGER NOT NULL,
        PRIMARY KEY (animal_id, session, trial_idx)
    );

    CREATE TABLE IF NOT EXISTS behavior.response_port (
        beh_hash         TEXT PRIMARY KEY REFERENCES beh_condition(beh_hash),
        response_port    INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS behavior.reward_port (
        beh_hash         TEXT PRIMARY KEY REFERENCES beh_condition(beh_hash),
        reward_port      INTEGER NOT NULL,
        reward_amount    REAL NOT NULL,
        reward_type      TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS behavior.lick (
        animal_id        INTEGER NOT NULL,
        session          INTEGER NOT NULL,
        trial_idx        INTEGER NOT NULL,
        port             INTEGER NOT NULL,
        time             INTEGER NOT NULL,
        PRIMARY KEY (animal_id, session, trial_idx, port, time)
    );

    CREATE TABLE IF NOT EXISTS behavior.proximity (
        animal_id        INTEGER NOT NULL,
        session          INTEGER NOT NULL,
        trial_idx        INTEGER NOT NULL,
        port             INTEGER NOT NULL,
        time             INTEGER NOT NULL,
        in_position      INTEGER NOT NULL,
        PRIMARY KEY (animal_id, session, trial_idx, port, time)
    );
"#;

const STIMULUS_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS stimulus.stim_condition (
        stim_hash        TEXT PRIMARY KEY,
        stimulus_class   TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS stimulus.stim_condition_trial (
        animal_id        INTEGER NOT NULL,
        session          INTEGER NOT NULL,
        trial_idx        INTEGER NOT NULL,
        stim_hash        TEXT NOT NULL REFERENCES stim_condition(stim_hash),
        start_time       INTEGER,
        end_time         INTEGER,
        PRIMARY KEY (animal_id, session, trial_idx)
    );

    CREATE TABLE IF NOT EXISTS stimulus.stim_params (
        stim_hash        TEXT PRIMARY KEY REFERENCES stim_condition(stim_hash),
        params           JSON NOT NULL
    );
"#;

/// Create all tables in the three attached schemas.
///
/// Idempotent. The schemas must already be attached.
pub fn create_schema(conn: &Connection) -> Result<()> {
    let current_version = schema_version(conn)?;

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Creating experiment schemas"
    );

    conn.execute_batch(EXPERIMENT_DDL)?;
    conn.execute_batch(BEHAVIOR_DDL)?;
    conn.execute_batch(STIMULUS_DDL)?;
    conn.execute(
        &format!("PRAGMA {}.user_version = {}", EXPERIMENT, SCHEMA_VERSION),
        [],
    )?;

    Ok(())
}

/// Check that every required table exists.
pub fn verify_schema(conn: &Connection) -> Result<()> {
    for (schema, tables) in REQUIRED_TABLES {
        for table in *tables {
            let exists: i64 = conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM {}.sqlite_master WHERE type = 'table' AND name = ?",
                    schema
                ),
                [table],
                |r| r.get(0),
            )?;
            if exists == 0 {
                return Err(Error::Schema {
                    schema: schema.to_string(),
                    table: table.to_string(),
                });
            }
        }
    }

    let version = schema_version(conn)?;
    if version > SCHEMA_VERSION {
        tracing::warn!(
            version,
            supported = SCHEMA_VERSION,
            "Database schema is newer than this build"
        );
    }

    Ok(())
}

/// Get the schema version recorded in the experiment schema
pub fn schema_version(conn: &Connection) -> Result<i32> {
    let version: i32 = conn.query_row(
        &format!("PRAGMA {}.user_version", EXPERIMENT),
        [],
        |r| r.get(0),
    )?;
    Ok(version)
}
