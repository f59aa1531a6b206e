use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::error::Error;
use std::path::Path;
use tempfile::{tempdir, TempDir};

/// Empty config file so a user-level nsyn.toml never leaks into the tests
fn isolated_config(dir: &TempDir, contents: &str) -> Result<String, Box<dyn Error>> {
    let path = dir.path().join("nsyn.toml");
    std::fs::write(&path, contents)?;
    Ok(path.to_str().ok_or("non-utf8 temp path")?.to_string())
}

fn run_json(config: &str, args: &[&str]) -> Result<Value, Box<dyn Error>> {
    let output = Command::cargo_bin("nsyn")?
        .args(["--config", config])
        .args(args)
        .arg("--json")
        .output()?;
    assert!(
        output.status.success(),
        "nsyn {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(serde_json::from_slice(&output.stdout)?)
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn build_delivers_every_edge_once() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let config = isolated_config(&tmp, "")?;

    let summary = run_json(
        &config,
        &["build", "--threads", "2", "--units", "20", "--fanout", "5"],
    )?;
    assert_eq!(summary["connections"], 100);
    assert_eq!(summary["delivered"], 100);
    assert_eq!(summary["received_events"], 100);
    assert_eq!(summary["delivery_errors"], 0);
    assert!(summary["checkpoint"].is_null());
    Ok(())
}

#[test]
fn chunked_checkpoint_matches_plain() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let config = isolated_config(&tmp, "")?;
    let plain = tmp.path().join("plain.ckpt");
    let chunked = tmp.path().join("chunked.ckpt");

    let common = ["build", "--threads", "3", "--units", "30", "--fanout", "4", "--seed", "7"];
    let mut args = common.to_vec();
    args.extend(["--out", path_str(&plain)]);
    let a = run_json(&config, &args)?;

    let mut args = common.to_vec();
    args.extend(["--out", path_str(&chunked), "--chunk-size", "50"]);
    let b = run_json(&config, &args)?;

    assert_eq!(a["checkpoint"]["written"], 120);
    assert_eq!(b["checkpoint"]["written"], 120);
    assert_eq!(b["checkpoint"]["chunk_size"], 50);
    assert_eq!(std::fs::read(&plain)?, std::fs::read(&chunked)?);
    assert_eq!(std::fs::metadata(&plain)?.len(), 120 * 21);
    Ok(())
}

#[test]
fn inspect_reads_back_checkpoint() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let config = isolated_config(&tmp, "")?;
    let out = tmp.path().join("net.ckpt");

    run_json(
        &config,
        &[
            "build", "--threads", "2", "--units", "10", "--fanout", "3",
            "--max-weight", "0.5", "--out", path_str(&out),
        ],
    )?;

    let report = run_json(&config, &["inspect", path_str(&out), "--head", "2"])?;
    assert_eq!(report["stats"]["records"], 30);
    assert_eq!(report["stats"]["unweighted"], 0);
    assert!(report["stats"]["weight_max"].as_f64().unwrap() <= 0.5);
    assert!(report["stats"]["delay_min_ms"].as_f64().unwrap() >= 1.0);
    assert_eq!(report["head"].as_array().unwrap().len(), 2);

    let threads = report["stats"]["per_thread"].as_object().unwrap();
    let total: u64 = threads.values().map(|v| v.as_u64().unwrap()).sum();
    assert_eq!(total, 30);
    Ok(())
}

#[test]
fn resolution_change_rescales_delays() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let config = isolated_config(&tmp, "")?;

    let summary = run_json(
        &config,
        &[
            "build", "--units", "8", "--fanout", "2", "--resolution-ms", "0.1",
            "--rescale-ms", "0.05",
        ],
    )?;
    assert_eq!(summary["resolution_ms"], 0.05);
    let min = summary["min_delay_steps"].as_i64().unwrap();
    let max = summary["max_delay_steps"].as_i64().unwrap();
    assert!(min >= 20, "min delay {} steps", min);
    assert!(max <= 40, "max delay {} steps", max);
    Ok(())
}

#[test]
fn weight_recording_counts_deliveries() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let config = isolated_config(&tmp, "")?;

    let summary = run_json(
        &config,
        &["build", "--threads", "4", "--units", "12", "--fanout", "3", "--record-weights"],
    )?;
    assert_eq!(summary["delivered"], 36);
    assert_eq!(summary["recorded"], 36);
    assert_eq!(summary["weight_records"], 36);
    Ok(())
}

#[test]
fn config_file_sets_kernel() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let config = isolated_config(&tmp, "[kernel]\nnum_threads = 3\nresolution_ms = 0.2\n")?;

    let summary = run_json(&config, &["build", "--units", "6", "--fanout", "1"])?;
    assert_eq!(summary["threads"], 3);
    assert_eq!(summary["resolution_ms"], 0.2);
    Ok(())
}

#[test]
fn delay_above_user_bound_fails() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let config = isolated_config(&tmp, "[kernel]\nmax_delay_ms = 1.5\n")?;

    Command::cargo_bin("nsyn")?
        .args(["--config", &config, "build", "--units", "4", "--fanout", "2"])
        .args(["--min-delay-ms", "2.0", "--max-delay-ms", "3.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Command failed"));
    Ok(())
}

#[test]
fn invalid_arguments_rejected() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let config = isolated_config(&tmp, "")?;

    Command::cargo_bin("nsyn")?
        .args(["--config", &config, "build", "--units", "1", "--fanout", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least two units"));

    Command::cargo_bin("nsyn")?
        .args(["--config", &config, "inspect"])
        .arg(tmp.path().join("absent.ckpt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
    Ok(())
}

#[test]
fn unwritable_checkpoint_names_the_path() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let config = isolated_config(&tmp, "")?;
    let out = tmp.path().join("missing").join("net.ckpt");

    Command::cargo_bin("nsyn")?
        .args(["--config", &config, "build", "--units", "4", "--fanout", "1"])
        .args(["--out", path_str(&out)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot create checkpoint"));
    Ok(())
}
