// ABOUTME: File transfer between the host and container filesystems.
// ABOUTME: Builds and unpacks tar archives for the engine's archive endpoints.

use crate::runtime::{ArchiveError, ArchiveOps};
use crate::types::ContainerId;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("invalid host path `{path}`: {reason}")]
    InvalidHostPath { path: String, reason: &'static str },

    #[error("container path `{0}` must be absolute and name a file or directory")]
    InvalidContainerPath(String),

    #[error("the requested path `{0}` is a directory")]
    IsDirectory(String),

    #[error("archive for `{0}` is empty")]
    EmptyArchive(String),

    #[error("archive entry escapes the destination: {0}")]
    UnsafeEntry(String),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reject host paths the engine CLI would interpret differently.
///
/// `-` means stdin/stdout and `name:path` names a container. Only the first
/// colon decides: at index 1 it is a drive letter and the path is allowed.
pub fn check_host_path(path: &str) -> Result<(), TransferError> {
    let invalid = |reason| TransferError::InvalidHostPath {
        path: path.to_string(),
        reason,
    };
    if path.is_empty() {
        return Err(invalid("path is empty"));
    }
    if path == "-" {
        return Err(invalid("streaming from stdin or to stdout is not supported"));
    }
    if path.find(':').is_some_and(|i| i != 1) {
        return Err(invalid("a colon would be read as a container specifier"));
    }
    Ok(())
}

/// Split `/a/b/c` into (`/a/b`, `c`).
fn split_container_path(path: &str) -> Result<(String, String), TransferError> {
    let trimmed = path.trim_end_matches('/');
    let invalid = || TransferError::InvalidContainerPath(path.to_string());
    if !path.starts_with('/') || trimmed.is_empty() {
        return Err(invalid());
    }
    let (parent, name) = trimmed.rsplit_once('/').ok_or_else(invalid)?;
    if name.is_empty() || name == "." || name == ".." {
        return Err(invalid());
    }
    let parent = if parent.is_empty() { "/" } else { parent };
    Ok((parent.to_string(), name.to_string()))
}

fn join_error(e: tokio::task::JoinError) -> TransferError {
    TransferError::Io(std::io::Error::other(e))
}

/// Copy a host file or directory to `container_path`.
pub async fn push_file(
    runtime: &impl ArchiveOps,
    id: &ContainerId,
    host_path: &Path,
    container_path: &str,
) -> Result<(), TransferError> {
    check_host_path(&host_path.to_string_lossy())?;
    let (parent, name) = split_container_path(container_path)?;

    let source = host_path.to_path_buf();
    let tar = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, TransferError> {
        let mut builder = tar::Builder::new(Vec::new());
        if source.is_dir() {
            builder.append_dir_all(&name, &source)?;
        } else {
            builder.append_path_with_name(&source, &name)?;
        }
        Ok(builder.into_inner()?)
    })
    .await
    .map_err(join_error)??;

    tracing::debug!(
        container = %id.short(),
        host = %host_path.display(),
        dest = container_path,
        bytes = tar.len(),
        "pushing archive"
    );
    runtime.upload_archive(id, &parent, tar).await?;
    Ok(())
}

/// Copy `container_path` (file or directory) to `host_path`.
pub async fn pull_file(
    runtime: &impl ArchiveOps,
    id: &ContainerId,
    container_path: &str,
    host_path: &Path,
) -> Result<(), TransferError> {
    check_host_path(&host_path.to_string_lossy())?;
    split_container_path(container_path)?;

    let tar = runtime.download_archive(id, container_path).await?;
    let dest = host_path.to_path_buf();
    let source = container_path.to_string();
    tokio::task::spawn_blocking(move || unpack_renamed(&tar, &dest, &source))
        .await
        .map_err(join_error)?
}

/// Map an archive path onto `dest`, dropping its top-level component.
fn renamed_target(dest: &Path, path: &Path) -> Result<PathBuf, TransferError> {
    if path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(TransferError::UnsafeEntry(path.display().to_string()));
    }
    let rest: PathBuf = path.components().skip(1).collect();
    if rest.as_os_str().is_empty() {
        return Ok(dest.to_path_buf());
    }
    // Earlier entries may have planted symlinks below `dest`.
    let mut at = dest.to_path_buf();
    if let Some(parents) = rest.parent() {
        for part in parents.components() {
            at.push(part);
            match std::fs::symlink_metadata(&at) {
                Ok(meta) if meta.file_type().is_symlink() => {
                    return Err(TransferError::UnsafeEntry(path.display().to_string()));
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => break,
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(dest.join(rest))
}

/// Unpack an archive whose single top-level entry is placed at `dest`.
fn unpack_renamed(tar: &[u8], dest: &Path, source: &str) -> Result<(), TransferError> {
    let mut archive = tar::Archive::new(tar);
    let mut unpacked = false;
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        let target = renamed_target(dest, &path)?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if entry.header().entry_type().is_hard_link() {
            // Hard link names are archive paths too.
            let link = entry
                .link_name()?
                .ok_or_else(|| TransferError::UnsafeEntry(path.display().to_string()))?
                .into_owned();
            let original = renamed_target(dest, &link)?;
            std::fs::hard_link(original, &target)?;
        } else {
            entry.unpack(&target)?;
        }
        unpacked = true;
    }
    if !unpacked {
        return Err(TransferError::EmptyArchive(source.to_string()));
    }
    Ok(())
}

/// Read a regular file from the container into memory.
pub async fn read_file(
    runtime: &impl ArchiveOps,
    id: &ContainerId,
    container_path: &str,
) -> Result<Vec<u8>, TransferError> {
    let tar = runtime.download_archive(id, container_path).await?;
    let mut archive = tar::Archive::new(tar.as_slice());
    let mut entries = archive.entries()?;
    let mut entry = entries
        .next()
        .ok_or_else(|| TransferError::EmptyArchive(container_path.to_string()))??;

    if entry.header().entry_type().is_dir() {
        return Err(TransferError::IsDirectory(container_path.to_string()));
    }

    let mut content = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut content)?;
    Ok(content)
}

/// Write `content` to `container_path` with mode 0644, replacing any file there.
pub async fn write_file(
    runtime: &impl ArchiveOps,
    id: &ContainerId,
    container_path: &str,
    content: &[u8],
) -> Result<(), TransferError> {
    let (parent, name) = split_container_path(container_path)?;

    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(chrono::Utc::now().timestamp().max(0) as u64);
    header.set_entry_type(tar::EntryType::Regular);

    let mut builder = tar::Builder::new(Vec::new());
    builder.append_data(&mut header, &name, content)?;
    let tar = builder.into_inner()?;

    runtime.upload_archive(id, &parent, tar).await?;
    Ok(())
}
