//! Dependency readiness gate.
//!
//! This binary reads a JSON dependency file, verifies every dependency with
//! bounded retries, prints one report line per dependency and exits non-zero
//! unless all of them are ready. Ctrl-C cancels in-flight attempts.
//!
//! # Security Guarantees
//! - No credentials in output: targets and messages are redacted
//! - Every connection opened by a probe is closed before exit

use anyhow::Context;
use clap::Parser;
use preflight::{Cli, Command, not_ready_errors, render_json, supported_backends};
use preflight_core::logging::init_logging;
use preflight_core::{
    CancellationToken, ConsoleSink, SharedSink, TracingSink, all_ready, check_all,
};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.global.verbose, cli.global.quiet)?;

    match &cli.command {
        Command::Check(args) => {
            let set = args
                .load()
                .await
                .with_context(|| format!("Failed to load {}", args.config.display()))?;

            if set.dependencies.is_empty() {
                warn!("{} lists no dependencies", args.config.display());
            }

            let sink: SharedSink = if args.json {
                Arc::new(TracingSink)
            } else {
                Arc::new(ConsoleSink::new(!cli.global.no_color).with_quiet(cli.global.quiet))
            };

            let cancel = CancellationToken::new();
            spawn_interrupt_handler(cancel.clone());

            let reports = check_all(&set, sink, &cancel).await;

            if args.json {
                println!("{}", render_json(&reports).context("Failed to render reports")?);
            }

            if all_ready(&reports) {
                info!("✓ All dependencies ready");
                Ok(ExitCode::SUCCESS)
            } else {
                let failures = not_ready_errors(&reports);
                warn!(
                    "{} of {} dependencies not ready",
                    failures.len(),
                    reports.len()
                );
                for failure in &failures {
                    debug!("{}", failure);
                }
                Ok(ExitCode::FAILURE)
            }
        }
        Command::List => {
            println!("Supported backends:");
            for line in supported_backends() {
                println!("{}", line);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Cancels verification on the first Ctrl-C.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupted, cancelling verification");
                cancel.cancel();
            }
            Err(e) => warn!("Failed to install interrupt handler: {}", e),
        }
    });
}
