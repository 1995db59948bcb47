// ABOUTME: Probe command implementation.
// ABOUTME: Reports host capabilities and the nesting mode each container would get.

use super::connection::connect_to_runtime;
use nestkeeper::config::Config;
use nestkeeper::error::Result;
use nestkeeper::nesting::{HostCapabilities, InnerEngine, NestingMode, negotiate};
use nestkeeper::output::Output;
use nestkeeper::runtime::RuntimeType;
use serde::Serialize;

#[derive(Serialize)]
struct ProbeReport {
    host: HostCapabilities,
    outer: OuterSummary,
    containers: Vec<ContainerProbe>,
}

#[derive(Serialize)]
struct OuterSummary {
    runtime: String,
    rootless: bool,
}

#[derive(Serialize)]
struct ContainerProbe {
    name: String,
    engine: InnerEngine,
    requested: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<NestingMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage_driver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn probe(config: Config, output: Output) -> Result<()> {
    let connection = connect_to_runtime(&config, &output).await?;
    let host = HostCapabilities::probe();

    let containers = config
        .to_specs()?
        .into_iter()
        .map(|spec| {
            let negotiated = negotiate(&spec.nesting, &host, &connection.outer);
            let (mode, storage_driver, error) = match negotiated {
                Ok(plan) => (Some(plan.mode), Some(plan.storage_driver), None),
                Err(e) => (None, None, Some(e.to_string())),
            };
            ContainerProbe {
                name: spec.name.to_string(),
                engine: spec.nesting.engine,
                requested: spec.nesting.mode.to_string(),
                mode,
                storage_driver,
                error,
            }
        })
        .collect();

    output.data(&ProbeReport {
        host,
        outer: OuterSummary {
            runtime: runtime_label(connection.outer.runtime_type),
            rootless: connection.outer.rootless,
        },
        containers,
    });
    Ok(())
}

fn runtime_label(runtime: RuntimeType) -> String {
    runtime.to_string().to_lowercase()
}
