// ABOUTME: Restart policy for crashed managed containers and a crash tracker.
// ABOUTME: Supports never, always, and on-failure[:max-restarts] within a window.

use super::retry::RetryPolicy;
use serde::de::{self, Deserialize, Deserializer};
use serde::{Serialize, Serializer};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Restarts older than this no longer count against `max_restarts`.
pub const DEFAULT_CRASH_WINDOW: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RestartPolicy {
    Never,
    #[default]
    Always,
    OnFailure {
        max_restarts: Option<u32>,
    },
}

impl FromStr for RestartPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "never" | "no" => Ok(RestartPolicy::Never),
            "always" => Ok(RestartPolicy::Always),
            "on-failure" => Ok(RestartPolicy::OnFailure { max_restarts: None }),
            s if s.starts_with("on-failure:") => {
                let count = &s["on-failure:".len()..];
                let max = count
                    .parse::<u32>()
                    .map_err(|_| format!("invalid max restarts: {count}"))?;
                Ok(RestartPolicy::OnFailure {
                    max_restarts: Some(max),
                })
            }
            _ => Err(format!("unknown restart policy: {s}")),
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartPolicy::Never => write!(f, "never"),
            RestartPolicy::Always => write!(f, "always"),
            RestartPolicy::OnFailure { max_restarts: None } => write!(f, "on-failure"),
            RestartPolicy::OnFailure {
                max_restarts: Some(n),
            } => write!(f, "on-failure:{n}"),
        }
    }
}

impl<'de> Deserialize<'de> for RestartPolicy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

impl Serialize for RestartPolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Start the container again after the delay.
    Restart(Duration),
    GiveUp,
}

/// Recent restarts of one managed container.
#[derive(Debug, Clone)]
pub struct CrashTracker {
    window: Duration,
    recent: VecDeque<Instant>,
    total: u32,
}

impl Default for CrashTracker {
    fn default() -> Self {
        Self::new(DEFAULT_CRASH_WINDOW)
    }
}

impl CrashTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            recent: VecDeque::new(),
            total: 0,
        }
    }

    /// Restarts granted over the tracker's lifetime.
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Restarts granted within the window ending at `now`.
    pub fn recent(&mut self, now: Instant) -> u32 {
        while let Some(&first) = self.recent.front() {
            if now.saturating_duration_since(first) >= self.window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
        self.recent.len() as u32
    }

    /// Decide what to do about a container that exited with `exit_code`.
    ///
    /// The backoff grows with the number of restarts still inside the window,
    /// so a container that crashes in a tight loop is restarted ever more slowly.
    pub fn record_exit(
        &mut self,
        now: Instant,
        exit_code: Option<i64>,
        policy: RestartPolicy,
        backoff: &RetryPolicy,
    ) -> RestartDecision {
        let recent = self.recent(now);
        let allowed = match policy {
            RestartPolicy::Never => false,
            RestartPolicy::Always => true,
            RestartPolicy::OnFailure { max_restarts } => {
                exit_code != Some(0) && max_restarts.is_none_or(|max| recent < max)
            }
        };
        if !allowed {
            return RestartDecision::GiveUp;
        }
        self.recent.push_back(now);
        self.total += 1;
        RestartDecision::Restart(backoff.delay(recent))
    }

    pub fn reset(&mut self) {
        self.recent.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(8),
            multiplier: 2.0,
        }
    }

    #[test]
    fn parses_policies() {
        assert_eq!("never".parse::<RestartPolicy>(), Ok(RestartPolicy::Never));
        assert_eq!("always".parse::<RestartPolicy>(), Ok(RestartPolicy::Always));
        assert_eq!(
            "on-failure:3".parse::<RestartPolicy>(),
            Ok(RestartPolicy::OnFailure {
                max_restarts: Some(3)
            })
        );
        assert!("on-failure:x".parse::<RestartPolicy>().is_err());
        assert!("sometimes".parse::<RestartPolicy>().is_err());
        assert_eq!(
            RestartPolicy::OnFailure {
                max_restarts: Some(2)
            }
            .to_string(),
            "on-failure:2"
        );
    }

    #[test]
    fn never_gives_up_immediately() {
        let mut tracker = CrashTracker::default();
        let decision = tracker.record_exit(Instant::now(), Some(1), RestartPolicy::Never, &backoff());
        assert_eq!(decision, RestartDecision::GiveUp);
        assert_eq!(tracker.total(), 0);
    }

    #[test]
    fn on_failure_ignores_clean_exit() {
        let mut tracker = CrashTracker::default();
        let policy = RestartPolicy::OnFailure { max_restarts: None };
        assert_eq!(
            tracker.record_exit(Instant::now(), Some(0), policy, &backoff()),
            RestartDecision::GiveUp
        );
        assert_eq!(
            tracker.record_exit(Instant::now(), Some(137), policy, &backoff()),
            RestartDecision::Restart(Duration::from_secs(1))
        );
    }

    #[test]
    fn on_failure_stops_at_max_within_window() {
        let mut tracker = CrashTracker::new(Duration::from_secs(60));
        let policy = RestartPolicy::OnFailure {
            max_restarts: Some(2),
        };
        let start = Instant::now();
        assert_eq!(
            tracker.record_exit(start, Some(1), policy, &backoff()),
            RestartDecision::Restart(Duration::from_secs(1))
        );
        assert_eq!(
            tracker.record_exit(start + Duration::from_secs(1), Some(1), policy, &backoff()),
            RestartDecision::Restart(Duration::from_secs(2))
        );
        assert_eq!(
            tracker.record_exit(start + Duration::from_secs(2), Some(1), policy, &backoff()),
            RestartDecision::GiveUp
        );

        // Once the early crashes age out, restarts are allowed again.
        assert_eq!(
            tracker.record_exit(start + Duration::from_secs(90), Some(1), policy, &backoff()),
            RestartDecision::Restart(Duration::from_secs(1))
        );
        assert_eq!(tracker.total(), 3);
    }

    #[test]
    fn always_backoff_is_capped() {
        let mut tracker = CrashTracker::default();
        let start = Instant::now();
        let mut last = RestartDecision::GiveUp;
        for i in 0..10 {
            last = tracker.record_exit(
                start + Duration::from_secs(i),
                Some(0),
                RestartPolicy::Always,
                &backoff(),
            );
        }
        assert_eq!(last, RestartDecision::Restart(Duration::from_secs(8)));
    }
}
