// ABOUTME: Cp command implementation.
// ABOUTME: Copies files between the host and a managed container using NAME:PATH syntax.

use super::connection::{connect_to_runtime, ensure_configured, find_container};
use nestkeeper::config::Config;
use nestkeeper::error::{Error, Result};
use nestkeeper::output::Output;
use nestkeeper::transfer::{pull_file, push_file};
use std::path::PathBuf;

#[derive(Debug, PartialEq, Eq)]
enum Location {
    Host(PathBuf),
    Container { name: String, path: String },
}

/// `NAME:/abs/path` is a container location; anything else is a host path.
fn parse_location(arg: &str) -> Location {
    if let Some((name, path)) = arg.split_once(':')
        && !name.is_empty()
        && !name.contains('/')
        && path.starts_with('/')
    {
        return Location::Container {
            name: name.to_string(),
            path: path.to_string(),
        };
    }
    Location::Host(PathBuf::from(arg))
}

pub async fn cp(config: Config, src: &str, dst: &str, output: Output) -> Result<()> {
    let (name, path, host, pushing) = match (parse_location(src), parse_location(dst)) {
        (Location::Host(host), Location::Container { name, path }) => (name, path, host, true),
        (Location::Container { name, path }, Location::Host(host)) => (name, path, host, false),
        (Location::Host(_), Location::Host(_)) => {
            return Err(Error::InvalidArgument(
                "one side must be a container path (NAME:/path)".into(),
            ));
        }
        (Location::Container { .. }, Location::Container { .. }) => {
            return Err(Error::InvalidArgument(
                "copying between two containers is not supported".into(),
            ));
        }
    };

    ensure_configured(&config, &name)?;
    let connection = connect_to_runtime(&config, &output).await?;
    let container = find_container(&connection.runtime, &name)
        .await?
        .ok_or_else(|| Error::Missing(name.clone()))?;

    let runtime = connection.runtime.as_ref();
    if pushing {
        push_file(runtime, &container.id, &host, &path).await?;
        output.success(&format!("Copied {} to {name}:{path}", host.display()));
    } else {
        pull_file(runtime, &container.id, &path, &host).await?;
        output.success(&format!("Copied {name}:{path} to {}", host.display()));
    }
    Ok(())
}
