use etholog_core::config::DatabaseConfig;
use etholog_core::Database;
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    data_dir: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let data_dir = base.join("lab");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        seed_fixture(&data_dir);

        Self {
            _temp_dir: temp_dir,
            home,
            data_dir,
            xdg_config,
            xdg_state,
        }
    }
}

fn seed_fixture(data_dir: &PathBuf) {
    let seed = fs::read_to_string(
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../etholog-core/tests/fixtures/seed.sql"),
    )
    .expect("failed to read seed fixture");

    let db = Database::create(&DatabaseConfig::in_dir(data_dir)).expect("failed to create db");
    db.connection()
        .execute_batch(&seed)
        .expect("failed to seed db");
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("etholog"));

    Command::new(bin_path)
        .arg("--data-dir")
        .arg(&env.data_dir)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute etholog: {e}"))
}

fn assert_success(args: &[&str], output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if output.status.success() {
        return stdout;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "etholog {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

#[test]
fn sessions_lists_range_as_text() {
    let env = CliTestEnv::new();
    let args = ["sessions", "-a", "1", "--from", "2024-03-02", "--to", "2024-03-05"];

    let stdout = assert_success(&args, &run_bin(&env, &args));
    assert!(stdout.contains("session_tmst"));
    assert!(stdout.contains("2024-03-02 09:30:00"));
    assert!(stdout.contains("2024-03-05 14:00:00"));
    assert!(!stdout.contains("2024-03-01"));
    assert!(stdout.contains("(2 rows)"), "unexpected output:\n{stdout}");
}

#[test]
fn trials_sql_flag_prints_lazy_query() {
    let env = CliTestEnv::new();
    let args = ["trials", "-a", "1", "-s", "1", "--trials", "1,3", "--sql"];

    let stdout = assert_success(&args, &run_bin(&env, &args));
    assert!(stdout.contains("FROM experiment.trial t"));
    assert!(stdout.contains("-- params: [1, 1, 1, 3]"), "unexpected output:\n{stdout}");
}

#[test]
fn licks_json_output() {
    let env = CliTestEnv::new();
    let args = ["--json", "licks", "-a", "1", "-s", "1", "-t", "1"];

    let stdout = assert_success(&args, &run_bin(&env, &args));
    let rows: serde_json::Value = serde_json::from_str(&stdout).expect("stdout should be JSON");
    assert_eq!(rows.as_array().map(Vec::len), Some(2));
    assert_eq!(rows[0]["port"], 1);
}

#[test]
fn summary_reports_duration_and_performance() {
    let env = CliTestEnv::new();
    let args = ["summary", "-a", "1", "-s", "1"];

    let stdout = assert_success(&args, &run_bin(&env, &args));
    assert!(stdout.contains("Duration:    1:02:05"));
    assert!(stdout.contains("Trials:      4 (1 aborted)"));
    assert!(stdout.contains("Performance: 66.7%"), "unexpected output:\n{stdout}");
}

#[test]
fn performance_series_as_json() {
    let env = CliTestEnv::new();
    let args = ["--json", "performance", "-a", "1", "--min-trials", "1"];

    let stdout = assert_success(&args, &run_bin(&env, &args));
    let series: serde_json::Value = serde_json::from_str(&stdout).expect("stdout should be JSON");
    let series = series.as_array().expect("expected an array");
    assert_eq!(series.len(), 3);
    assert_eq!(series[1]["performance"], 0.0);
    assert!(series[2]["performance"].is_null());
}

#[test]
fn states_lists_onsets_in_time_order() {
    let env = CliTestEnv::new();
    let args = ["states", "-a", "1", "-s", "1", "-t", "2"];

    let stdout = assert_success(&args, &run_bin(&env, &args));
    let pre = stdout.find("PreTrial").expect("missing PreTrial");
    let punish = stdout.find("Punish").expect("missing Punish");
    assert!(pre < punish);
    assert!(stdout.contains("(3 rows)"), "unexpected output:\n{stdout}");
}

#[test]
fn conditions_behavior_joins_ports() {
    let env = CliTestEnv::new();
    let args = ["--json", "conditions", "-a", "1", "-s", "1", "--kind", "behavior"];

    let stdout = assert_success(&args, &run_bin(&env, &args));
    let rows: serde_json::Value = serde_json::from_str(&stdout).expect("stdout should be JSON");
    assert_eq!(rows.as_array().map(Vec::len), Some(4));
    assert_eq!(rows[1]["beh_hash"], "b2");
    assert_eq!(rows[1]["response_port"], 2);
    assert_eq!(rows[1]["reward_type"], "water");
}

#[test]
fn conditions_stimulus_includes_params() {
    let env = CliTestEnv::new();
    let args = ["--json", "conditions", "-a", "1", "-s", "1", "--kind", "stimulus", "-t", "3"];

    let stdout = assert_success(&args, &run_bin(&env, &args));
    let rows: serde_json::Value = serde_json::from_str(&stdout).expect("stdout should be JSON");
    assert_eq!(rows.as_array().map(Vec::len), Some(1));
    assert_eq!(rows[0]["stim_hash"], "s1");
    assert_eq!(rows[0]["stimulus_class"], "Grating");
    assert!(rows[0]["params"].as_str().unwrap_or_default().contains("theta"));
}

#[test]
fn proximity_json_output() {
    let env = CliTestEnv::new();
    let args = ["--json", "proximity", "-a", "1", "-s", "1"];

    let stdout = assert_success(&args, &run_bin(&env, &args));
    let rows: serde_json::Value = serde_json::from_str(&stdout).expect("stdout should be JSON");
    assert_eq!(rows.as_array().map(Vec::len), Some(3));
    assert_eq!(rows[0]["in_position"], 1);
    assert_eq!(rows[1]["in_position"], 0);
    assert_eq!(rows[2]["trial_idx"], 2);
}

#[test]
fn summary_session_rejects_range_flags() {
    let env = CliTestEnv::new();

    for extra in [["--from", "2024-03-01"], ["--to", "2024-03-01"], ["--min-trials", "1"]] {
        let mut args = vec!["summary", "-a", "1", "-s", "1"];
        args.extend(extra);
        let output = run_bin(&env, &args);
        assert!(!output.status.success(), "{args:?} should be rejected");
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("cannot be used with"), "unexpected stderr:\n{stderr}");
    }
}

#[test]
fn writes_dated_log_file() {
    let env = CliTestEnv::new();
    let before = chrono::Utc::now().date_naive();
    let args = ["sessions", "-a", "1"];
    assert_success(&args, &run_bin(&env, &args));
    let after = chrono::Utc::now().date_naive();

    let log_dir = env.xdg_state.join("etholog");
    let written = [before, after].iter().any(|day| {
        log_dir
            .join(format!("etholog.{}.log", day.format("%Y-%m-%d")))
            .is_file()
    });
    assert!(written, "no dated log file in {}", log_dir.display());
    assert!(!log_dir.join("etholog.log").exists());
}

#[test]
fn missing_database_fails() {
    let env = CliTestEnv::new();
    let output = Command::new(PathBuf::from(assert_cmd::cargo::cargo_bin!("etholog")))
        .args(["--data-dir", "/nonexistent/etholog", "sessions", "-a", "1"])
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .output()
        .expect("failed to execute etholog");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to open experiment database"));
}
