//! Composition root: resolve, probe, verify, report.
//!
//! [`check_dependency`] runs one dependency end to end and never fails; a
//! resolution error becomes a not-ready report without any probe attempt.
//! [`check_all`] runs every dependency of a set concurrently. Coordinators
//! share nothing but the sink and the cancellation token.

use crate::config::{DependencySet, DependencySpec, RetryPolicy};
use crate::probe::{Probe, default_probe};
use crate::report::ReadinessReport;
use crate::resolver::resolve;
use crate::retry::verify;
use crate::sink::SharedSink;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Verifies one dependency with the compiled-in probe for its kind.
///
/// The report is emitted to `sink` before it is returned.
pub async fn check_dependency(
    dependency: &DependencySpec,
    shared: &RetryPolicy,
    sink: SharedSink,
    cancel: &CancellationToken,
) -> ReadinessReport {
    let probe = default_probe(dependency.connection.kind(), sink.clone());
    check_with_probe(dependency, shared, probe.as_ref(), sink, cancel).await
}

/// Verifies one dependency with an explicit probe.
pub async fn check_with_probe(
    dependency: &DependencySpec,
    shared: &RetryPolicy,
    probe: &dyn Probe,
    sink: SharedSink,
    cancel: &CancellationToken,
) -> ReadinessReport {
    let kind = dependency.connection.kind();

    let report = match resolve(&dependency.connection) {
        Ok(target) => {
            let policy = dependency.effective_policy(shared);
            debug!(
                "Checking '{}' at {} with {:?}",
                dependency.name,
                target.redacted(),
                policy
            );
            verify(probe, &target, &policy, cancel).await
        }
        Err(e) => {
            debug!("Resolution of '{}' failed: {}", dependency.name, e);
            ReadinessReport::from_error(kind, &e)
        }
    };

    let report = report.with_name(dependency.name.as_str());
    report.emit(sink.as_ref());
    report
}

/// Verifies every dependency of a set concurrently.
///
/// Reports come back in the order the dependencies were declared.
pub async fn check_all(
    set: &DependencySet,
    sink: SharedSink,
    cancel: &CancellationToken,
) -> Vec<ReadinessReport> {
    info!("Checking {} dependencies", set.dependencies.len());

    let checks = set
        .dependencies
        .iter()
        .map(|dependency| check_dependency(dependency, &set.policy, sink.clone(), cancel));
    let reports = join_all(checks).await;

    let ready = reports.iter().filter(|r| r.ready).count();
    info!("{}/{} dependencies ready", ready, reports.len());
    reports
}

/// Whether every report is ready. An empty set is trivially ready.
pub fn all_ready(reports: &[ReadinessReport]) -> bool {
    reports.iter().all(|r| r.ready)
}
