// ABOUTME: Supervise command implementation.
// ABOUTME: Reconciles continuously, printing events until Ctrl-C.

use super::connection::{acquire_lock, build_supervisor, release_lock};
use nestkeeper::config::Config;
use nestkeeper::diagnostics::{Diagnostics, Warning};
use nestkeeper::error::Result;
use nestkeeper::output::Output;
use nestkeeper::supervisor::LOCK_HEARTBEAT;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

pub async fn supervise(config: Config, stop_on_exit: bool, force: bool, output: Output) -> Result<()> {
    let mut diag = Diagnostics::default();

    let supervisor = Arc::new(build_supervisor(&config, &output).await?);
    let mut lock = acquire_lock(&config, force, &output)?;
    output.progress(&format!(
        "Supervising {} container(s); press Ctrl-C to stop",
        supervisor.specs().len()
    ));

    let mut events = supervisor.bus().subscribe();
    let shutdown = CancellationToken::new();
    let runner = {
        let supervisor = Arc::clone(&supervisor);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { supervisor.run(shutdown).await })
    };

    let mut heartbeat = tokio::time::interval_at(
        tokio::time::Instant::now() + LOCK_HEARTBEAT,
        LOCK_HEARTBEAT,
    );
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                if let Err(e) = signal {
                    tracing::error!(error = %e, "cannot listen for Ctrl-C");
                }
                break;
            }
            _ = heartbeat.tick() => {
                if let Err(e) = lock.refresh() {
                    tracing::warn!(error = %e, "cannot refresh supervisor lock");
                    diag.warn(Warning::lock_heartbeat(format!(
                        "failed to refresh supervisor lock: {e}"
                    )));
                }
            }
            event = events.recv() => match event {
                Ok(event) => output.event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    diag.warn(Warning::event_stream(format!(
                        "{skipped} supervision event(s) were dropped"
                    )));
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    output.progress("  → Shutting down...");
    shutdown.cancel();
    if let Err(e) = runner.await {
        tracing::warn!(error = %e, "supervisor task ended abnormally");
    }

    let stopped = if stop_on_exit {
        output.progress("  → Stopping managed containers...");
        supervisor.shutdown_all().await.map(Some)
    } else {
        Ok(None)
    };
    release_lock(lock, &mut diag);

    if let Some(summary) = stopped? {
        for failure in &summary.failures {
            output.error(&format!("{}: {}", failure.action, failure.error));
        }
    }
    output.diagnostics(&diag);
    output.success("Supervisor stopped");
    Ok(())
}
