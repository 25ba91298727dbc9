//! Document-store probe against a real MongoDB using testcontainers.

#![cfg(feature = "mongodb")]
#![allow(clippy::expect_used)]

use preflight_core::config::DocumentStoreConfig;
use preflight_core::error::ErrorClass;
use preflight_core::{
    CancellationToken, DependencySpec, MemorySink, RetryPolicy, check_dependency,
};
use std::sync::Arc;
use std::time::Duration;
use testcontainers_modules::mongo::Mongo;
use testcontainers_modules::testcontainers::ImageExt;
use testcontainers_modules::testcontainers::runners::AsyncRunner;

const ROOT_USER: &str = "root";
const ROOT_PASSWORD: &str = "container-secret";

fn policy() -> RetryPolicy {
    // The image restarts mongod once after creating the root user
    RetryPolicy::new(15)
        .with_fixed_delay(Duration::from_secs(1))
        .with_attempt_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_container_document_store_ready() {
    let container = Mongo::default()
        .with_env_var("MONGO_INITDB_ROOT_USERNAME", ROOT_USER)
        .with_env_var("MONGO_INITDB_ROOT_PASSWORD", ROOT_PASSWORD)
        .start()
        .await
        .expect("Failed to start MongoDB container");

    let port = container
        .get_host_port_ipv4(27017)
        .await
        .expect("Failed to get MongoDB port");

    let dependency = DependencySpec::new(
        "mongo",
        DocumentStoreConfig::new(vec![format!("localhost:{}", port)], "app")
            .with_credentials(ROOT_USER, ROOT_PASSWORD),
    );

    let report = check_dependency(
        &dependency,
        &policy(),
        Arc::new(MemorySink::new()),
        &CancellationToken::new(),
    )
    .await;

    assert!(report.ready, "{}", report);
    assert!(!report.target.contains(ROOT_PASSWORD));
}

#[tokio::test]
async fn test_container_wrong_password_is_fatal() {
    let container = Mongo::default()
        .with_env_var("MONGO_INITDB_ROOT_USERNAME", ROOT_USER)
        .with_env_var("MONGO_INITDB_ROOT_PASSWORD", ROOT_PASSWORD)
        .start()
        .await
        .expect("Failed to start MongoDB container");

    let port = container
        .get_host_port_ipv4(27017)
        .await
        .expect("Failed to get MongoDB port");

    let dependency = DependencySpec::new(
        "mongo",
        DocumentStoreConfig::new(vec![format!("localhost:{}", port)], "app")
            .with_credentials(ROOT_USER, "wrong-password"),
    );

    let report = check_dependency(
        &dependency,
        &policy(),
        Arc::new(MemorySink::new()),
        &CancellationToken::new(),
    )
    .await;

    assert!(!report.ready);
    assert_eq!(report.failure, Some(ErrorClass::FatalConnection), "{}", report);
    assert!(report.attempts < 15);
    assert!(!report.to_string().contains("wrong-password"));
}
