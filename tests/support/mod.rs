// ABOUTME: Test support utilities shared by integration tests.
// ABOUTME: Tracing setup and a local engine connection that skips when none exists.

use nestkeeper::runtime::{BollardRuntime, detect_local};
use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("nestkeeper=debug".parse().unwrap())
            .add_directive("bollard=info".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Local engine, or `None` when no Docker/Podman socket is reachable.
#[allow(dead_code)]
pub fn local_runtime() -> Option<BollardRuntime> {
    let socket = detect_local().ok()?;
    BollardRuntime::connect(&socket).ok()
}

/// Skip the test if no local runtime is available.
#[allow(unused_macros)]
macro_rules! require_runtime {
    () => {
        match support::local_runtime() {
            Some(rt) => rt,
            None => {
                eprintln!("Skipping test: no local container runtime found");
                return;
            }
        }
    };
}
