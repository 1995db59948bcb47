// ABOUTME: Compile-fail test verifying a launch cannot start before the container exists.
// ABOUTME: This test should fail to compile, validating state machine safety.

use nestkeeper::runtime::ContainerOps;
use nestkeeper::supervisor::{Launch, Planned};

async fn try_start_without_create<R: ContainerOps>(launch: Launch<Planned>, runtime: &R) {
    // ERROR: start() only exists on Launch<Created>
    let _ = launch.start(runtime).await;
}

fn main() {}
