// ABOUTME: Compile-fail test verifying a launch only finishes once the engine answers.
// ABOUTME: This test should fail to compile, validating state machine safety.

use nestkeeper::supervisor::{Launch, Started};

fn try_finish_early(launch: Launch<Started>) {
    // ERROR: finish() only exists on Launch<EngineReady>
    let _id = launch.finish();
}

fn main() {}
