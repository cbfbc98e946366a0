//! etholog - summaries of behavioral experiment sessions
//!
//! Command-line front end over the etholog-core loaders and metrics.

mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use etholog_core::config::DatabaseConfig;
use etholog_core::db::table::value_to_json;
use etholog_core::{Config, Database, DateRange, Format, Frame, SessionKey, TrialSelection};
use serde::Serialize;

use crate::render::{render_performance, render_summary, render_table};

#[derive(Parser, Debug)]
#[command(name = "etholog")]
#[command(about = "Query and summarize behavioral experiment sessions")]
#[command(version)]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/etholog/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding experiment.db, behavior.db and stimulus.db
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List sessions of an animal
    Sessions {
        #[command(flatten)]
        range: RangeArgs,
        /// Print the query instead of running it
        #[arg(long)]
        sql: bool,
    },
    /// List trials of a session
    Trials {
        #[command(flatten)]
        trials: TrialArgs,
        /// Drop aborted trials
        #[arg(long)]
        remove_aborted: bool,
    },
    /// State onsets of a session's trials
    States {
        #[command(flatten)]
        trials: TrialArgs,
    },
    /// Trial conditions joined from one schema
    Conditions {
        #[command(flatten)]
        trials: TrialArgs,
        #[arg(long, value_enum, default_value = "experiment")]
        kind: ConditionKind,
    },
    /// Lick events of a session's trials
    Licks {
        #[command(flatten)]
        trials: TrialArgs,
    },
    /// Proximity events of a session's trials
    Proximity {
        #[command(flatten)]
        trials: TrialArgs,
    },
    /// Overview of one session, or of every session in a date range
    Summary {
        #[command(flatten)]
        range: RangeArgs,
        /// Only this session (not combinable with --from, --to or --min-trials)
        #[arg(short, long, conflicts_with_all = ["from", "to", "min_trials"])]
        session: Option<i64>,
    },
    /// Performance per session
    Performance {
        #[command(flatten)]
        range: RangeArgs,
    },
}

#[derive(Args, Debug)]
struct RangeArgs {
    /// Animal ID
    #[arg(short, long)]
    animal: i64,
    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
    /// Skip sessions with fewer trials (default from config)
    #[arg(long)]
    min_trials: Option<usize>,
}

impl RangeArgs {
    fn range(&self) -> DateRange {
        DateRange::new(self.from, self.to)
    }
}

#[derive(Args, Debug)]
struct TrialArgs {
    /// Animal ID
    #[arg(short, long)]
    animal: i64,
    /// Session number
    #[arg(short, long)]
    session: i64,
    /// Comma-separated trial indices (default: all)
    #[arg(short, long, value_delimiter = ',')]
    trials: Option<Vec<i64>>,
    /// Print the query instead of running it
    #[arg(long)]
    sql: bool,
}

impl TrialArgs {
    fn key(&self) -> SessionKey {
        SessionKey::new(self.animal, self.session)
    }

    fn selection(&self) -> TrialSelection {
        TrialSelection::from(self.trials.clone())
    }

    fn format(&self) -> Format {
        if self.sql {
            Format::Query
        } else {
            Format::Table
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ConditionKind {
    Experiment,
    Behavior,
    Stimulus,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path).context("failed to load configuration")?,
        None => Config::load().context("failed to load configuration")?,
    };
    let _log_guard = etholog_core::logging::init(&config.logging).ok();

    let db_config = match &cli.data_dir {
        Some(dir) => DatabaseConfig::in_dir(dir),
        None => config.database.clone(),
    };
    let db = Database::open(&db_config)
        .context("failed to open experiment database")?
        .with_analysis(config.analysis.clone());

    tracing::info!(command = ?cli.command, "Running command");
    let min_trials_default = config.analysis.min_trials;

    match &cli.command {
        Command::Sessions { range, sql } => {
            let format = if *sql { Format::Query } else { Format::Table };
            let frame = db.sessions(
                range.animal,
                &range.range(),
                range.min_trials.unwrap_or(min_trials_default),
                format,
            )?;
            print_frame(&frame, cli.json)?;
        }
        Command::Trials {
            trials,
            remove_aborted,
        } => {
            let frame = db.trials(
                &trials.key(),
                &trials.selection(),
                *remove_aborted,
                trials.format(),
            )?;
            print_frame(&frame, cli.json)?;
        }
        Command::States { trials } => {
            let frame = db.trial_states(&trials.key(), &trials.selection(), trials.format())?;
            print_frame(&frame, cli.json)?;
        }
        Command::Conditions { trials, kind } => {
            let (key, selection, format) = (trials.key(), trials.selection(), trials.format());
            let frame = match kind {
                ConditionKind::Experiment => db.trial_experiment(&key, &selection, format)?,
                ConditionKind::Behavior => db.trial_behavior(&key, &selection, format)?,
                ConditionKind::Stimulus => db.trial_stimulus(&key, &selection, format)?,
            };
            print_frame(&frame, cli.json)?;
        }
        Command::Licks { trials } => {
            let frame = db.trial_licks(&trials.key(), &trials.selection(), trials.format())?;
            print_frame(&frame, cli.json)?;
        }
        Command::Proximity { trials } => {
            let frame =
                db.trial_proximities(&trials.key(), &trials.selection(), trials.format())?;
            print_frame(&frame, cli.json)?;
        }
        Command::Summary { range, session } => {
            let summaries = match session {
                Some(session) => db
                    .session_summary(&SessionKey::new(range.animal, *session))?
                    .into_iter()
                    .collect(),
                None => db.animal_summary(
                    range.animal,
                    &range.range(),
                    range.min_trials.unwrap_or(min_trials_default),
                )?,
            };

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else if summaries.is_empty() {
                println!("No sessions found.");
            } else {
                for summary in &summaries {
                    println!("{}", render_summary(summary));
                }
            }
        }
        Command::Performance { range } => {
            let series = db.performance_per_session(
                range.animal,
                &range.range(),
                range.min_trials.unwrap_or(min_trials_default),
            )?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&series)?);
            } else if series.is_empty() {
                println!("No sessions found.");
            } else {
                print!("{}", render_performance(&series));
            }
        }
    }

    Ok(())
}

/// JSON form of a lazy query
#[derive(Serialize)]
struct QueryOutput<'a> {
    sql: &'a str,
    params: Vec<serde_json::Value>,
}

/// Print a loader result: rows for tables, SQL and parameters for queries
fn print_frame(frame: &Frame, json: bool) -> Result<()> {
    match frame {
        Frame::Table(table) if json => {
            println!("{}", serde_json::to_string_pretty(&table.to_json())?);
        }
        Frame::Table(table) => print!("{}", render_table(table)),
        Frame::Query(query) if json => {
            let out = QueryOutput {
                sql: query.sql(),
                params: query.params().iter().map(value_to_json).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Frame::Query(query) => {
            println!("{}", query.sql());
            let params: Vec<String> = query
                .params()
                .iter()
                .map(|p| value_to_json(p).to_string())
                .collect();
            println!("-- params: [{}]", params.join(", "));
        }
    }
    Ok(())
}
