use std::io::Write;
use std::process::Command;

use swarmsim_app::{ExperimentConfig, ReportRow, load_swarm_config, run_experiment};
use swarmsim_core::{AgentConfig, IndexKind, SwarmConfig, Vector2D};

fn write_config(json: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(json.as_bytes()).expect("write config");
    file
}

#[test]
fn partial_config_file_is_merged_with_defaults() {
    let file = write_config(
        r#"{"width": 400.0, "rng_seed": 5, "neighbor_index": {"kind": "uniform_grid", "cell_size": 40.0}}"#,
    );
    let config = load_swarm_config(file.path()).expect("load");
    assert_eq!(config.width, 400.0);
    assert_eq!(config.height, 600.0);
    assert_eq!(config.rng_seed, Some(5));
    assert_eq!(
        config.neighbor_index,
        IndexKind::UniformGrid { cell_size: 40.0 }
    );
}

#[test]
fn invalid_config_files_report_their_path() {
    let garbage = write_config("{ not json");
    let err = load_swarm_config(garbage.path()).unwrap_err();
    assert!(format!("{err:#}").contains("did not contain valid JSON"));

    let rejected = write_config(r#"{"width": -1.0}"#);
    let err = load_swarm_config(rejected.path()).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("rejected"));
    assert!(message.contains("arena dimensions"));
}

#[test]
fn seeded_experiments_repeat_exactly() {
    let config = ExperimentConfig {
        swarm: SwarmConfig {
            rng_seed: Some(0x5EED),
            ..SwarmConfig::default()
        },
        agents: 40,
        ticks: 30,
        report_every: 10,
        initial_agents: vec![AgentConfig::at(
            Vector2D::new(400.0, 300.0),
            Vector2D::new(1.0, 0.0),
        )],
    };
    let first = run_experiment(&config).expect("first");
    let second = run_experiment(&config).expect("second");
    assert_eq!(first, second);
    assert_eq!(first.rows.len(), 4);
    assert_eq!(first.final_metrics.agent_count, 41);
    for row in &first.rows {
        assert!((0.0..=2.0).contains(&row.metrics.collective_intelligence_index));
    }
}

#[test]
fn invalid_initial_agent_fails_the_run() {
    let config = ExperimentConfig {
        initial_agents: vec![AgentConfig::default().with_max_force(-1.0)],
        ..ExperimentConfig::default()
    };
    let err = run_experiment(&config).unwrap_err();
    assert!(format!("{err:#}").contains("initial agent 0 rejected"));
}

#[test]
fn binary_emits_json_rows() {
    let bin = env!("CARGO_BIN_EXE_swarmsim");
    let output = Command::new(bin)
        .args([
            "--agents",
            "15",
            "--ticks",
            "6",
            "--report-every",
            "3",
            "--seed",
            "11",
            "--grid-cell",
            "50",
            "--json",
        ])
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run swarmsim binary");
    assert!(output.status.success(), "swarmsim exited with failure");

    let stdout = String::from_utf8(output.stdout).expect("utf8 stdout");
    let rows: Vec<ReportRow> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("json row"))
        .collect();
    let generations: Vec<u64> = rows.iter().map(|row| row.generation.0).collect();
    assert_eq!(generations, vec![0, 3, 6]);
    assert!(rows.iter().all(|row| row.metrics.agent_count == 15));
}
