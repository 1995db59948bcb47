// ABOUTME: Single-supervisor lock per state directory.
// ABOUTME: Atomic create of supervisor.lock holding JSON about the holder and its heartbeat.

use super::error::SuperviseError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const LOCK_FILENAME: &str = "supervisor.lock";

/// How often a running supervisor refreshes its lock.
pub const LOCK_HEARTBEAT: Duration = Duration::from_secs(60);

/// A lock with no heartbeat for this long is assumed abandoned.
pub const LOCK_STALE_AFTER: Duration = Duration::from_secs(60 * 60);

/// Information about who holds the supervisor lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    /// Last refresh by the holder. Absent in files that were never refreshed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_at: Option<DateTime<Utc>>,
}

impl LockInfo {
    pub fn current() -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            heartbeat_at: None,
        }
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.heartbeat_at.unwrap_or(self.started_at).max(self.started_at)
    }

    /// No sign of life from the holder for [`LOCK_STALE_AFTER`].
    pub fn is_stale(&self) -> bool {
        (Utc::now() - self.last_seen())
            .to_std()
            .is_ok_and(|age| age >= LOCK_STALE_AFTER)
    }

    fn same_holder(&self, other: &LockInfo) -> bool {
        self.holder == other.holder && self.pid == other.pid && self.started_at == other.started_at
    }
}

/// A held supervisor lock. Call [`SupervisorLock::release`] when done.
#[derive(Debug)]
pub struct SupervisorLock {
    path: PathBuf,
    info: LockInfo,
}

impl SupervisorLock {
    pub fn path_in(state_dir: &Path) -> PathBuf {
        state_dir.join(LOCK_FILENAME)
    }

    /// Take the lock for `state_dir`.
    ///
    /// A stale or unreadable lock is broken with a warning; `force` breaks a
    /// live one too.
    pub fn acquire(state_dir: &Path, force: bool) -> Result<Self, SuperviseError> {
        std::fs::create_dir_all(state_dir)?;
        let path = Self::path_in(state_dir);
        let info = LockInfo::current();

        if Self::try_create(&path, &info)? {
            return Ok(Self { path, info });
        }

        match Self::read(&path) {
            Some(existing) if !force && !existing.is_stale() => {
                return Err(SuperviseError::LockHeld {
                    holder: existing.holder,
                    pid: existing.pid,
                    started_at: existing.started_at,
                });
            }
            Some(existing) => tracing::warn!(
                holder = %existing.holder,
                pid = existing.pid,
                since = %existing.started_at,
                forced = force,
                "breaking supervisor lock"
            ),
            None => tracing::warn!(path = %path.display(), "lock info unreadable, breaking lock"),
        }

        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if Self::try_create(&path, &info)? {
            Ok(Self { path, info })
        } else {
            Err(SuperviseError::Lock(
                "lock acquired by another process during break".to_string(),
            ))
        }
    }

    /// `Ok(false)` when the file already exists.
    fn try_create(path: &Path, info: &LockInfo) -> Result<bool, SuperviseError> {
        let json = serde_json::to_string(info)
            .map_err(|e| SuperviseError::Lock(format!("failed to serialize lock: {e}")))?;
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                file.write_all(json.as_bytes())?;
                file.sync_all()?;
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Current holder, if the lock file exists and parses.
    pub fn read(path: &Path) -> Option<LockInfo> {
        let content = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn info(&self) -> &LockInfo {
        &self.info
    }

    /// Record a heartbeat so the lock does not go stale while held.
    ///
    /// Fails without writing if the file now names another holder.
    pub fn refresh(&mut self) -> Result<(), SuperviseError> {
        if let Some(current) = Self::read(&self.path)
            && !current.same_holder(&self.info)
        {
            return Err(Self::taken_over(&self.path, &current));
        }
        let mut info = self.info.clone();
        info.heartbeat_at = Some(Utc::now());
        let json = serde_json::to_string(&info)
            .map_err(|e| SuperviseError::Lock(format!("failed to serialize lock: {e}")))?;

        let tmp = self.path.with_extension("lock.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        tracing::trace!(path = %self.path.display(), "supervisor lock refreshed");
        self.info = info;
        Ok(())
    }

    fn taken_over(path: &Path, current: &LockInfo) -> SuperviseError {
        SuperviseError::Lock(format!(
            "lock at {} now belongs to {} (pid {})",
            path.display(),
            current.holder,
            current.pid
        ))
    }

    /// Remove the lock file, unless someone else has taken it over.
    pub fn release(self) -> Result<(), SuperviseError> {
        match Self::read(&self.path) {
            Some(current) if !current.same_holder(&self.info) => {
                Err(Self::taken_over(&self.path, &current))
            }
            _ => match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            },
        }
    }
}
