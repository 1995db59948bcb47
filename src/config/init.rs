// ABOUTME: Config scaffolding for new setups.
// ABOUTME: Writes a commented nestkeeper.yml template.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{ContainerName, ImageRef};

use super::CONFIG_FILENAME;

const DEFAULT_NAME: &str = "ci-docker";
const DEFAULT_IMAGE: &str = "docker:27-dind";

/// Write `nestkeeper.yml` into `dir`, refusing to overwrite unless `force`.
pub fn init_config(dir: &Path, name: Option<&str>, image: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let name = ContainerName::new(name.unwrap_or(DEFAULT_NAME))
        .map_err(|e| Error::InvalidConfig(e.to_string()))?;
    let image =
        ImageRef::parse(image.unwrap_or(DEFAULT_IMAGE)).map_err(|e| Error::InvalidConfig(e.to_string()))?;

    std::fs::write(&config_path, generate_template_yaml(&name, &image))?;
    Ok(())
}

fn generate_template_yaml(name: &ContainerName, image: &ImageRef) -> String {
    let engine = if image.to_string().contains("podman") {
        "podman"
    } else {
        "docker"
    };
    format!(
        r#"# Reconcile period and shutdown grace.
# interval: 10s
# stop_timeout: 30s

# Lock file and exposed inner sockets. Defaults to $XDG_STATE_HOME/nestkeeper.
# state_dir: /var/lib/nestkeeper

# Outer engine override; detected from DOCKER_HOST, CONTAINER_HOST or the
# default sockets otherwise.
# runtime:
#   runtime: docker
#   socket: /var/run/docker.sock

containers:
  - name: {name}
    image: {image}
    engine: {engine}
    # auto picks the least privileged mode the host supports.
    mode: auto
    # Privileged mode is never chosen unless allowed here.
    allow_privileged: false
    # restart: never | always | on-failure[:N]
    restart: always
    ready_timeout: 60s
    # env:
    #   HTTP_PROXY: {{ env: HTTP_PROXY, default: "" }}
"#
    )
}
