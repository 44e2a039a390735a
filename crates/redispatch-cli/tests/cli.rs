use assert_cmd::Command;
use predicates::prelude::*;
use redispatch_core::{Bus, Generator, Line, Load, Network};
use redispatch_io::export_csv_folder;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn two_bus(country_b: Option<&str>) -> Network {
    let mut network = Network::new("two-bus");
    network
        .add_bus(Bus::new("a").with_country("DE").with_coordinates(10.0, 53.0))
        .unwrap();
    let mut b = Bus::new("b").with_coordinates(11.0, 48.0);
    b.country = country_b.map(str::to_string);
    network.add_bus(b).unwrap();
    network
        .add_generator(Generator::new("cheap", "a", 100.0).with_marginal_cost(10.0))
        .unwrap();
    network
        .add_generator(Generator::new("dear", "b", 100.0).with_marginal_cost(50.0))
        .unwrap();
    network.add_load(Load::new("demand", "b", 50.0)).unwrap();
    network.add_line(Line::new("a-b", "a", "b", 0.1)).unwrap();
    network
}

/// `<tmp>/networks/two-bus` plus an empty working folder `<tmp>/work`.
fn workspace(network: &Network) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    export_csv_folder(network, dir.path().join("networks").join("two-bus")).unwrap();
    let work = dir.path().join("work");
    fs::create_dir_all(&work).unwrap();
    (dir, work)
}

fn redispatch() -> Command {
    Command::cargo_bin("redispatch").unwrap()
}

fn results(work: &Path) -> PathBuf {
    work.join("results_redispatch").join("two-bus")
}

#[test]
fn run_exports_every_stage() {
    let (_dir, work) = workspace(&two_bus(Some("DE")));
    let output = redispatch()
        .args(["run", "two-bus", "--folder", work.to_str().unwrap(), "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let summary: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(summary["model"], "two-bus");
    assert_eq!(summary["zones"], serde_json::json!(["DE"]));
    assert_eq!(summary["removed_branches"], 1);
    let premium = summary["redispatch_premium"].as_f64().unwrap();
    assert!(premium.abs() < 1e-2, "premium {premium}");
    let ramped_up = summary["redispatch_volume"]["up"].as_f64().unwrap();
    assert!(ramped_up.abs() < 1e-2, "ramp up {ramped_up}");

    for stage in ["network_model", "market_model", "redispatch_model"] {
        assert!(results(&work).join(stage).join("objective.json").exists(), "{stage}");
    }
}

#[test]
fn run_prints_plain_summary() {
    let (_dir, work) = workspace(&two_bus(Some("DE")));
    redispatch()
        .args(["run", "two-bus", "--folder", work.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("redispatch_model"))
        .stdout(predicate::str::contains("Redispatch premium"))
        .stdout(predicate::str::contains("Redispatch volume"));
}

#[test]
fn run_with_latitude_zones_from_config() {
    let (dir, work) = workspace(&two_bus(None));
    let config = dir.path().join("redispatch.toml");
    fs::write(&config, "[zones]\nstrategy = \"latitude\"\nlatitude = 50.0\n").unwrap();

    let output = redispatch()
        .args([
            "run",
            "two-bus",
            "--folder",
            work.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
            "--format",
            "json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let summary: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(summary["zones"], serde_json::json!(["North", "South"]));
    assert_eq!(summary["removed_branches"], 0);
}

#[test]
fn run_rejects_unmapped_bus() {
    let (_dir, work) = workspace(&two_bus(None));
    redispatch()
        .args(["run", "two-bus", "--folder", work.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bus 'b' has no bidding zone"));
    assert!(!results(&work).exists());
}

#[test]
fn run_rejects_unknown_solver() {
    let (_dir, work) = workspace(&two_bus(Some("DE")));
    redispatch()
        .args(["run", "two-bus", "--folder", work.to_str().unwrap(), "--solver", "gurobi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown lp solver 'gurobi'"));
}

#[test]
fn run_requires_network_folder() {
    let (_dir, work) = workspace(&two_bus(Some("DE")));
    redispatch()
        .args(["run", "elec_s_6", "--folder", work.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn inspect_reports_stats() {
    let (dir, _work) = workspace(&two_bus(Some("DE")));
    let network = dir.path().join("networks").join("two-bus");
    redispatch()
        .args(["inspect", network.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 buses"))
        .stdout(predicate::str::contains("0 errors"));
}
