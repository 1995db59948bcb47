// ABOUTME: Pure reconciliation planner from desired specs and observed containers.
// ABOUTME: Produces the engine actions that converge the two; empty when converged.

use super::managed::{DesiredState, LABEL_FINGERPRINT, LABEL_NAME, ManagedSpec};
use crate::runtime::{ContainerState, ContainerSummary};
use crate::types::{ContainerId, ContainerName};
use std::fmt;

/// A managed container as the engine reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observed {
    pub id: ContainerId,
    /// Value of the name label.
    pub name: String,
    pub state: ContainerState,
    pub fingerprint: Option<String>,
}

impl Observed {
    /// `None` when the container lacks the name label.
    pub fn from_summary(summary: &ContainerSummary) -> Option<Self> {
        Some(Self {
            id: summary.id.clone(),
            name: summary.labels.get(LABEL_NAME)?.clone(),
            state: summary.state,
            fingerprint: summary.labels.get(LABEL_FINGERPRINT).cloned(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Create and start a new container.
    Create { name: ContainerName },
    /// Start an existing container that never ran.
    Start { name: ContainerName, id: ContainerId },
    Stop { name: ContainerName, id: ContainerId },
    /// Remove a drifted container and create its replacement.
    Recreate { name: ContainerName, id: ContainerId },
    Remove { name: String, id: ContainerId },
    /// Start a container whose process exited, subject to its restart policy.
    Restart { name: ContainerName, id: ContainerId },
}

impl Action {
    pub fn verb(&self) -> &'static str {
        match self {
            Action::Create { .. } => "create",
            Action::Start { .. } => "start",
            Action::Stop { .. } => "stop",
            Action::Recreate { .. } => "recreate",
            Action::Remove { .. } => "remove",
            Action::Restart { .. } => "restart",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Create { name } => write!(f, "create {name}"),
            Action::Remove { name, id } => write!(f, "remove {name} ({})", id.short()),
            Action::Start { name, id }
            | Action::Stop { name, id }
            | Action::Recreate { name, id }
            | Action::Restart { name, id } => write!(f, "{} {name} ({})", self.verb(), id.short()),
        }
    }
}

/// Rank used to pick the container to keep among duplicates.
fn keep_rank(o: &Observed) -> u8 {
    match o.state {
        ContainerState::Running | ContainerState::Restarting => 0,
        ContainerState::Paused => 1,
        ContainerState::Created => 2,
        ContainerState::Exited | ContainerState::Dead | ContainerState::Removing => 3,
    }
}

/// Compute the actions converging `observed` onto `desired`.
///
/// Containers whose name matches no spec are ignored here; orphan cleanup
/// handles them. Removals come first so recreated names are free.
pub fn plan_actions(desired: &[ManagedSpec], observed: &[Observed]) -> Vec<Action> {
    let mut removals = Vec::new();
    let mut actions = Vec::new();

    for spec in desired {
        let mut mine: Vec<&Observed> = observed
            .iter()
            .filter(|o| o.name == spec.name.as_str())
            .collect();
        mine.sort_by(|a, b| {
            keep_rank(a)
                .cmp(&keep_rank(b))
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });

        if spec.desired == DesiredState::Absent {
            removals.extend(mine.into_iter().map(|o| Action::Remove {
                name: o.name.clone(),
                id: o.id.clone(),
            }));
            continue;
        }

        let Some((keep, extras)) = mine.split_first() else {
            if spec.desired == DesiredState::Running {
                actions.push(Action::Create {
                    name: spec.name.clone(),
                });
            }
            continue;
        };
        removals.extend(extras.iter().map(|o| Action::Remove {
            name: o.name.clone(),
            id: o.id.clone(),
        }));

        let name = spec.name.clone();
        let id = keep.id.clone();
        let drifted = keep.fingerprint.as_deref() != Some(spec.fingerprint().as_str());

        match (spec.desired, drifted, keep.state) {
            (DesiredState::Running, true, _) => actions.push(Action::Recreate { name, id }),
            (DesiredState::Stopped, true, _) => removals.push(Action::Remove {
                name: keep.name.clone(),
                id,
            }),
            (DesiredState::Running, false, ContainerState::Created) => {
                actions.push(Action::Start { name, id })
            }
            (DesiredState::Running, false, ContainerState::Exited | ContainerState::Dead) => {
                actions.push(Action::Restart { name, id })
            }
            (DesiredState::Stopped, false, state) if state.is_running() => {
                actions.push(Action::Stop { name, id })
            }
            _ => {}
        }
    }

    removals.extend(actions);
    removals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nesting::InnerEngine;
    use crate::types::ImageRef;

    fn spec(name: &str, desired: DesiredState) -> ManagedSpec {
        let mut s = ManagedSpec::new(
            ContainerName::new(name).unwrap(),
            ImageRef::parse("docker:27-dind").unwrap(),
            InnerEngine::Docker,
        );
        s.desired = desired;
        s
    }

    fn observed(id: &str, spec: &ManagedSpec, state: ContainerState) -> Observed {
        Observed {
            id: ContainerId::new(id),
            name: spec.name.to_string(),
            state,
            fingerprint: Some(spec.fingerprint()),
        }
    }

    #[test]
    fn converged_plans_nothing() {
        let running = spec("a", DesiredState::Running);
        let stopped = spec("b", DesiredState::Stopped);
        let observed = vec![
            observed("1", &running, ContainerState::Running),
            observed("2", &stopped, ContainerState::Exited),
        ];
        assert!(plan_actions(&[running, stopped], &observed).is_empty());
    }

    #[test]
    fn missing_running_container_is_created() {
        let a = spec("a", DesiredState::Running);
        let b = spec("b", DesiredState::Stopped);
        let actions = plan_actions(&[a.clone(), b], &[]);
        assert_eq!(actions, vec![Action::Create { name: a.name }]);
    }

    #[test]
    fn drift_recreates() {
        let a = spec("a", DesiredState::Running);
        let mut stale = observed("1", &a, ContainerState::Running);
        stale.fingerprint = Some("0000000000000000".into());
        let actions = plan_actions(std::slice::from_ref(&a), &[stale]);
        assert_eq!(
            actions,
            vec![Action::Recreate {
                name: a.name.clone(),
                id: ContainerId::new("1")
            }]
        );
    }

    #[test]
    fn missing_fingerprint_counts_as_drift() {
        let a = spec("a", DesiredState::Running);
        let mut unlabeled = observed("1", &a, ContainerState::Running);
        unlabeled.fingerprint = None;
        let actions = plan_actions(&[a], &[unlabeled]);
        assert!(matches!(actions[0], Action::Recreate { .. }));
    }

    #[test]
    fn duplicates_keep_the_running_one() {
        let a = spec("a", DesiredState::Running);
        let observed = vec![
            observed("1", &a, ContainerState::Exited),
            observed("2", &a, ContainerState::Running),
            observed("3", &a, ContainerState::Created),
        ];
        let actions = plan_actions(&[a], &observed);
        let removed: Vec<_> = actions
            .iter()
            .filter_map(|a| match a {
                Action::Remove { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(removed, vec!["3", "1"]);
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn state_mismatches_map_to_actions() {
        let a = spec("a", DesiredState::Running);
        let b = spec("b", DesiredState::Running);
        let c = spec("c", DesiredState::Stopped);
        let observed = vec![
            observed("1", &a, ContainerState::Created),
            observed("2", &b, ContainerState::Exited),
            observed("3", &c, ContainerState::Running),
        ];
        let verbs: Vec<_> = plan_actions(&[a, b, c], &observed)
            .iter()
            .map(Action::verb)
            .collect();
        assert_eq!(verbs, vec!["start", "restart", "stop"]);
    }

    #[test]
    fn absent_removes_everything_first() {
        let gone = spec("gone", DesiredState::Absent);
        let fresh = spec("fresh", DesiredState::Running);
        let observed = vec![
            observed("1", &gone, ContainerState::Running),
            observed("2", &gone, ContainerState::Exited),
        ];
        let actions = plan_actions(&[fresh, gone], &observed);
        let verbs: Vec<_> = actions.iter().map(Action::verb).collect();
        assert_eq!(verbs, vec!["remove", "remove", "create"]);
    }

    #[test]
    fn unknown_names_are_left_for_orphan_cleanup() {
        let a = spec("a", DesiredState::Running);
        let stranger = Observed {
            id: ContainerId::new("9"),
            name: "stranger".into(),
            state: ContainerState::Running,
            fingerprint: None,
        };
        let actions = plan_actions(std::slice::from_ref(&a), &[observed("1", &a, ContainerState::Running), stranger]);
        assert!(actions.is_empty());
    }
}
