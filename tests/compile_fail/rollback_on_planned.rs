// ABOUTME: Compile-fail test verifying rollback needs a created container.
// ABOUTME: This test should fail to compile, validating state machine safety.

use nestkeeper::runtime::ContainerOps;
use nestkeeper::supervisor::{Launch, Planned};

async fn try_rollback_without_container<R: ContainerOps>(launch: Launch<Planned>, runtime: &R) {
    // ERROR: Planned does not implement HasContainer
    let _ = launch.rollback(runtime).await;
}

fn main() {}
