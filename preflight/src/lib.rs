//! Library module for the `preflight` binary.
//!
//! Exposes the CLI definition and the policy/rendering helpers so they can
//! be tested without spawning the binary. `main.rs` only wires them up.

use clap::{Args, Parser, Subcommand};
use preflight_core::{DependencySet, PreflightError, ReadinessReport, RetryPolicy};
use std::path::PathBuf;
use std::time::Duration;

/// CLI argument structure
#[derive(Parser, Debug)]
#[command(name = "preflight")]
#[command(about = "Verify external dependencies before a service starts")]
#[command(version)]
#[command(long_about = "
preflight - dependency readiness gate

Reads a JSON dependency file, attempts a bounded connection to every listed
dependency with retries, and exits non-zero unless all of them are ready.

SUPPORTED BACKENDS:
- document_store  (MongoDB)      [if compiled with --features mongodb]
- broker          (Kafka)        [TCP reachability unless compiled with --features kafka]
- coordination    (ZooKeeper)
- object_store    (MinIO/S3)     [if compiled with --features object-store]

EXAMPLES:
  preflight check --config deps.json
  preflight check --config deps.json --max-attempts 10 --delay-ms 500 --json
  PREFLIGHT_CONFIG=deps.json preflight check --deadline-ms 30000
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Verify every dependency in a dependency file
    Check(CheckArgs),
    /// List supported backend kinds
    List,
}

/// Arguments for `check`
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Dependency file path
    #[arg(
        short,
        long,
        env = "PREFLIGHT_CONFIG",
        value_name = "FILE",
        help = "JSON dependency file"
    )]
    pub config: PathBuf,

    /// Override the shared attempt budget
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Override the shared delay with a fixed delay (ms)
    #[arg(long, value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Override the overall deadline (ms)
    #[arg(long, value_name = "MS")]
    pub deadline_ms: Option<u64>,

    /// Override the per-attempt timeout (ms)
    #[arg(long, value_name = "MS")]
    pub attempt_timeout_ms: Option<u64>,

    /// Print reports as JSON instead of summary lines
    #[arg(long)]
    pub json: bool,
}

/// Flags shared by every subcommand
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(
        short,
        long,
        global = true,
        help = "Suppress all output except errors"
    )]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,
}

impl CheckArgs {
    /// Applies the command-line overrides to a policy.
    pub fn apply_overrides(&self, mut policy: RetryPolicy) -> RetryPolicy {
        if let Some(max) = self.max_attempts {
            policy.max_attempts = max;
        }
        if let Some(ms) = self.delay_ms {
            policy = policy.with_fixed_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = self.deadline_ms {
            policy = policy.with_deadline(Duration::from_millis(ms));
        }
        if let Some(ms) = self.attempt_timeout_ms {
            policy = policy.with_attempt_timeout(Duration::from_millis(ms));
        }
        policy
    }

    /// Loads the dependency file and applies the overrides to its shared policy.
    ///
    /// # Errors
    /// Fails when the file cannot be read or parsed, or when the resulting
    /// policy is invalid.
    pub async fn load(&self) -> preflight_core::Result<DependencySet> {
        let mut set = DependencySet::from_json_file(&self.config).await?;
        set.policy = self.apply_overrides(set.policy);
        set.validate()?;
        Ok(set)
    }
}

/// Renders reports as pretty JSON.
///
/// # Errors
/// Fails only if serialization fails.
pub fn render_json(reports: &[ReadinessReport]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(reports)
}

/// Errors for every dependency that is not ready, in report order.
pub fn not_ready_errors(reports: &[ReadinessReport]) -> Vec<PreflightError> {
    reports.iter().filter_map(ReadinessReport::to_error).collect()
}

/// Lines printed by `list`, one per config `kind` value.
pub fn supported_backends() -> Vec<String> {
    let broker_check = if cfg!(feature = "kafka") {
        "Kafka metadata request"
    } else {
        "bootstrap TCP reachability"
    };
    let entries = [
        ("document_store", "MongoDB ping", cfg!(feature = "mongodb")),
        ("broker", broker_check, true),
        ("coordination", "ZooKeeper session", true),
        (
            "object_store",
            "MinIO health endpoint",
            cfg!(feature = "object-store"),
        ),
    ];

    entries
        .into_iter()
        .map(|(kind, check, compiled)| {
            let status = if compiled { "" } else { " (not compiled in)" };
            format!("  {:<16} {}{}", kind, check, status)
        })
        .collect()
}
