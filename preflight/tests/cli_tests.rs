//! CLI parsing and dependency-file loading tests.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use clap::Parser;
use preflight::{Cli, Command, not_ready_errors, render_json, supported_backends};
use preflight_core::error::ErrorClass;
use preflight_core::{Backoff, BackendKind, ReadinessReport};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

const DEPENDENCIES: &str = r#"{
    "policy": { "max_attempts": 5, "backoff": { "type": "fixed", "delay_ms": 250 } },
    "dependencies": [
        { "name": "zk", "kind": "coordination", "addresses": ["zk1:2181"] },
        { "name": "kafka", "kind": "broker", "addresses": ["k1:9092"] }
    ]
}"#;

fn dependency_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write temp file");
    file
}

fn check_args(cli: Cli) -> preflight::CheckArgs {
    match cli.command {
        Command::Check(args) => args,
        Command::List => panic!("expected check subcommand"),
    }
}

#[test]
fn test_cli_parses_check_overrides() {
    let cli = Cli::try_parse_from([
        "preflight",
        "-vv",
        "check",
        "--config",
        "deps.json",
        "--max-attempts",
        "9",
        "--delay-ms",
        "100",
        "--json",
    ])
    .unwrap();

    assert_eq!(cli.global.verbose, 2);
    let args = check_args(cli);
    assert_eq!(args.max_attempts, Some(9));
    assert_eq!(args.delay_ms, Some(100));
    assert!(args.json);
}

#[test]
fn test_cli_requires_subcommand() {
    assert!(Cli::try_parse_from(["preflight"]).is_err());
}

#[tokio::test]
async fn test_cli_load_applies_overrides() {
    let file = dependency_file(DEPENDENCIES);
    let path = file.path().to_str().unwrap();
    let args = check_args(
        Cli::try_parse_from([
            "preflight",
            "check",
            "--config",
            path,
            "--max-attempts",
            "2",
            "--deadline-ms",
            "10000",
        ])
        .unwrap(),
    );

    let set = args.load().await.unwrap();

    assert_eq!(set.dependencies.len(), 2);
    assert_eq!(set.policy.max_attempts, 2);
    assert_eq!(set.policy.deadline, Some(Duration::from_secs(10)));
    // untouched by the flags
    assert_eq!(
        set.policy.backoff,
        Backoff::Fixed {
            delay: Duration::from_millis(250)
        }
    );
}

#[tokio::test]
async fn test_cli_load_rejects_zero_attempts() {
    let file = dependency_file(DEPENDENCIES);
    let path = file.path().to_str().unwrap();
    let args = check_args(
        Cli::try_parse_from(["preflight", "check", "--config", path, "--max-attempts", "0"])
            .unwrap(),
    );

    assert!(args.load().await.is_err());
}

#[tokio::test]
async fn test_cli_load_reports_malformed_file() {
    let file = dependency_file("{ \"dependencies\": [ { \"name\": \"x\" } ] }");
    let path = file.path().to_str().unwrap();
    let args = check_args(Cli::try_parse_from(["preflight", "check", "--config", path]).unwrap());

    assert!(args.load().await.is_err());
}

#[test]
fn test_cli_json_rendering() {
    let reports = vec![ReadinessReport::ready(
        BackendKind::Coordination,
        "zk://zk1:2181",
        1,
        Duration::from_millis(12),
    )
    .with_name("zk")];

    let json: serde_json::Value = serde_json::from_str(&render_json(&reports).unwrap()).unwrap();
    assert_eq!(json[0]["name"], "zk");
    assert_eq!(json[0]["elapsed_ms"], 12);
}

#[test]
fn test_cli_list_covers_every_kind() {
    let lines = supported_backends().join("\n");
    for kind in ["document_store", "broker", "coordination", "object_store"] {
        assert!(lines.contains(kind), "missing {}", kind);
    }
}

#[test]
fn test_cli_not_ready_errors_keep_report_order() {
    let reports = vec![
        ReadinessReport::ready(BackendKind::Coordination, "zk://zk1:2181", 1, Duration::ZERO),
        ReadinessReport::not_ready(
            BackendKind::Broker,
            "kafka://k1:9092",
            5,
            Duration::from_secs(2),
            ErrorClass::TimeoutExceeded,
            "deadline of 2000ms exceeded",
        )
        .with_name("kafka"),
        ReadinessReport::not_ready(
            BackendKind::ObjectStore,
            "http://minio:9000",
            1,
            Duration::ZERO,
            ErrorClass::FatalConnection,
            "health check returned 403 Forbidden",
        )
        .with_name("minio"),
    ];

    let errors = not_ready_errors(&reports);

    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].class(), ErrorClass::TimeoutExceeded);
    assert!(errors[0].to_string().contains("kafka (kafka://k1:9092)"));
    assert_eq!(errors[1].class(), ErrorClass::FatalConnection);
}
