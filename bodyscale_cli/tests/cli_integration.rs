use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use assert_cmd::Command;
use tempfile::tempdir;

// Fast simulated session: 1-step countdown, 50 ms ticks, settled frames every 5 ms.
fn write_config(dir: &Path, extra: &str) -> PathBuf {
    let store = dir.join("readings.csv");
    let toml = format!(
        r#"
[profile]
id = "alex"
age_years = 35
height_cm = 178.0
sex = "male"

[session]
step_countdown_s = 1
calibration_countdown_s = 5
tick_ms = 50
disconnect_delay_ms = 10

[link]
poll_ms = 10

[link.sim]
weight_kg = 72.4
impedance_ohm = 480
frame_interval_ms = 5
settle_frames = 0

[store]
path = '{}'

{extra}
"#,
        store.display()
    );
    let path = dir.join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn bodyscale(cfg: &Path) -> Command {
    let mut cmd = Command::cargo_bin("bodyscale").unwrap();
    cmd.arg("--config").arg(cfg);
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["decode", "62 02 00 00 00 00 00 00 00 f4 01 98 3a"], 0, "weight 75.0 kg, impedance 500 ohm", "stdout")]
#[case(&["decode", "02 96"], 0, "no reading: frame too short", "stdout")]
#[case(&["decode", "0g"], 1, "invalid hex", "stderr")]
#[case(&["estimate", "--weight", "75"], 2, "--impedance", "stderr")]
#[case(&["estimate", "--weight", "75", "--impedance", "0"], 1, "impedance must be", "stderr")]
#[case(&["history"], 0, "no readings for profile 'alex'", "stdout")]
#[case(&["self-check"], 0, "self-check ok", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "");
    let assert = bodyscale(&cfg).args(args).assert().code(exit_code);
    match stream {
        "stdout" => assert.stdout(predicate::str::contains(needle)),
        _ => assert.stderr(predicate::str::contains(needle)),
    };
}

#[test]
fn measure_saves_reading_then_history_lists_it() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "");

    bodyscale(&cfg)
        .args(["measure", "--yes"])
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved 72.4 kg"));

    let out = bodyscale(&cfg)
        .args(["--json", "history"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let rows: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["profile_id"], "alex");
    assert_eq!(rows[0]["origin"], "scale");
    assert_eq!(rows[0]["impedance_ohm"], 480);
    assert!(rows[0]["body_fat_pct"].as_f64().is_some());

    let text = fs::read_to_string(dir.path().join("readings.csv")).unwrap();
    assert!(text.starts_with("profile_id,weight_kg,bmi,"));
}

#[test]
fn measure_json_emits_event_lines() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "");
    let out = bodyscale(&cfg)
        .args(["--json", "measure", "--yes"])
        .timeout(std::time::Duration::from_secs(20))
        .output()
        .unwrap();
    assert!(out.status.success());
    let events: Vec<String> = String::from_utf8_lossy(&out.stdout)
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap())
        .map(|v| v["event"].as_str().unwrap().to_string())
        .collect();
    let pos = |name: &str| events.iter().position(|e| e == name).unwrap();
    assert!(pos("connected") < pos("sample_captured"));
    assert!(pos("sample_captured") < pos("committed"));
    assert!(pos("committed") < pos("disconnected"));
}

#[test]
fn unmatched_name_filter_exits_with_device_not_found() {
    let dir = tempdir().unwrap();
    let cfg = write_config(
        dir.path(),
        "",
    );
    // Rewrite the link filters so the simulator's name no longer matches.
    let text = fs::read_to_string(&cfg)
        .unwrap()
        .replace("[link]\n", "[link]\nname_prefixes = [\"Polar\"]\nnames = []\n");
    fs::write(&cfg, text).unwrap();

    bodyscale(&cfg)
        .args(["measure", "--yes"])
        .assert()
        .code(12)
        .stderr(predicate::str::contains("No matching scale"));
}

#[cfg(not(feature = "ble"))]
#[test]
fn ble_backend_without_feature_is_unsupported() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "");
    let text = fs::read_to_string(&cfg)
        .unwrap()
        .replace("[link]\n", "[link]\nbackend = \"ble\"\n");
    fs::write(&cfg, text).unwrap();

    bodyscale(&cfg)
        .args(["--json", "measure", "--yes"])
        .assert()
        .code(11)
        .stderr(predicate::str::contains("\"reason\":\"unsupported\""));
}

#[rstest]
#[case("[profile]\nage_years = 0\n", "age_years")]
#[case("[session]\ntick_ms = 0\n", "tick_ms")]
#[case("[logging]\nrotation = \"weekly\"\n", "rotation")]
fn invalid_config_exits_with_config_code(#[case] toml: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(&cfg, toml).unwrap();
    bodyscale(&cfg)
        .arg("self-check")
        .assert()
        .code(3)
        .stderr(predicate::str::contains(needle));
}

#[test]
fn rules_csv_with_bad_header_is_a_config_error() {
    let dir = tempdir().unwrap();
    let csv = dir.path().join("rules.csv");
    fs::write(&csv, "offset,divisor\n11,200\n").unwrap();
    let cfg = write_config(
        dir.path(),
        &format!("[decoder]\nrules_csv = '{}'\n", csv.display()),
    );
    bodyscale(&cfg)
        .args(["decode", "02 96"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("headers"));
}

#[test]
fn estimate_json_reports_composition() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "");
    let out = bodyscale(&cfg)
        .args(["--json", "estimate", "--weight", "60", "--impedance", "550"])
        .args(["--sex", "female", "--age", "40", "--height", "160"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["composition"]["bmr_kcal"], 1239);
    assert_eq!(v["composition"]["body_type"], "obese");
    assert_eq!(v["bmi"].as_f64().unwrap(), 23.44);
}
