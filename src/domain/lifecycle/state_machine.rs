//! Table-driven lifecycle guard evaluator

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::permission::{capabilities as cap, CapabilitySet};
use crate::domain::principal::PrincipalRef;
use crate::domain::team::{Team, TeamStatus};

/// Named lifecycle transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionName {
    Activate,
    Suspend,
    Resume,
    Archive,
    Restore,
}

impl TransitionName {
    pub const ALL: [TransitionName; 5] = [
        TransitionName::Activate,
        TransitionName::Suspend,
        TransitionName::Resume,
        TransitionName::Archive,
        TransitionName::Restore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activate => "activate",
            Self::Suspend => "suspend",
            Self::Resume => "resume",
            Self::Archive => "archive",
            Self::Restore => "restore",
        }
    }
}

impl std::fmt::Display for TransitionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the transition table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub name: TransitionName,
    pub from: Vec<TeamStatus>,
    pub to: TeamStatus,
    /// Holding any one of these unlocks the transition
    pub required_permissions: Vec<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Cannot {transition} a team that is {from}")]
    InvalidTransition {
        transition: TransitionName,
        from: TeamStatus,
    },

    #[error("Missing permission to {transition} this team (requires one of: {})", required.join(", "))]
    Forbidden {
        transition: TransitionName,
        required: Vec<String>,
    },
}

/// Pure guard evaluator over the transition table
#[derive(Debug, Clone)]
pub struct StateMachine {
    transitions: Vec<Transition>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::with_permissions(&HashMap::new())
    }
}

impl StateMachine {
    /// Builds the standard table, overriding required permissions per
    /// transition where `overrides` has an entry
    pub fn with_permissions(overrides: &HashMap<TransitionName, Vec<String>>) -> Self {
        use TeamStatus::*;

        let row = |name: TransitionName, from: &[TeamStatus], to: TeamStatus, extra: &str| {
            let required = overrides.get(&name).cloned().unwrap_or_else(|| {
                vec![cap::MANAGE_TEAM.to_string(), extra.to_string()]
            });
            Transition {
                name,
                from: from.to_vec(),
                to,
                required_permissions: required,
            }
        };

        Self {
            transitions: vec![
                row(TransitionName::Activate, &[Draft, Suspended], Active, cap::ACTIVATE_TEAM),
                row(TransitionName::Suspend, &[Active], Suspended, cap::SUSPEND_TEAM),
                row(TransitionName::Resume, &[Suspended], Active, cap::ACTIVATE_TEAM),
                row(TransitionName::Archive, &[Active, Suspended], Archived, cap::ARCHIVE_TEAM),
                row(TransitionName::Restore, &[Archived], Active, cap::RESTORE_TEAM),
            ],
        }
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn get(&self, name: TransitionName) -> &Transition {
        // Rows are laid out in `TransitionName` declaration order.
        &self.transitions[name as usize]
    }

    /// Source-state guard; returns the target state
    pub fn check_state(
        &self,
        name: TransitionName,
        current: TeamStatus,
    ) -> Result<TeamStatus, TransitionError> {
        let transition = self.get(name);
        if transition.from.contains(&current) {
            Ok(transition.to)
        } else {
            Err(TransitionError::InvalidTransition {
                transition: name,
                from: current,
            })
        }
    }

    /// Permission guard; fails only when the actor holds none of the required capabilities
    pub fn check_permissions(
        &self,
        name: TransitionName,
        capabilities: &CapabilitySet,
    ) -> Result<(), TransitionError> {
        let transition = self.get(name);
        let required: Vec<&str> = transition
            .required_permissions
            .iter()
            .map(String::as_str)
            .collect();

        if required.is_empty() || capabilities.allows_any(&required) {
            Ok(())
        } else {
            Err(TransitionError::Forbidden {
                transition: name,
                required: transition.required_permissions.clone(),
            })
        }
    }

    /// State guard then permission guard
    pub fn evaluate(
        &self,
        name: TransitionName,
        current: TeamStatus,
        capabilities: &CapabilitySet,
    ) -> Result<TeamStatus, TransitionError> {
        let target = self.check_state(name, current)?;
        self.check_permissions(name, capabilities)?;
        Ok(target)
    }

    /// Transitions the actor could perform right now
    pub fn available(&self, current: TeamStatus, capabilities: &CapabilitySet) -> Vec<TransitionName> {
        self.transitions
            .iter()
            .filter(|t| self.evaluate(t.name, current, capabilities).is_ok())
            .map(|t| t.name)
            .collect()
    }

    /// Guards the transition and, on success, writes the new status and the
    /// audit record into `team`. Returns the previous status.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        team: &mut Team,
        name: TransitionName,
        capabilities: &CapabilitySet,
        actor: &PrincipalRef,
        reason: Option<&str>,
        details: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<TeamStatus, TransitionError> {
        let previous = team.status();
        let target = self.evaluate(name, previous, capabilities)?;

        let mut audit = Map::new();
        audit.insert("previous_status".into(), Value::from(previous.as_str()));
        audit.insert("actor".into(), Value::from(actor.to_string()));
        audit.insert(
            "reason".into(),
            reason.map(Value::from).unwrap_or(Value::Null),
        );
        audit.insert("at".into(), Value::from(now.to_rfc3339()));
        audit.extend(details);

        team.apply_transition(name.as_str(), target, Value::Object(audit), now);
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::TeamId;
    use crate::domain::team::TeamType;
    use serde_json::json;

    fn team_in(status: TeamStatus) -> Team {
        let mut team =
            Team::new(TeamId::generate(), "Lifecycle", TeamType::Project, Utc::now()).unwrap();
        if status != TeamStatus::Draft {
            team.apply_transition("seed", status, Value::Null, Utc::now());
        }
        team
    }

    #[test]
    fn test_transition_table() {
        use TeamStatus::*;
        let machine = StateMachine::default();

        let expected = [
            (TransitionName::Activate, vec![Draft, Suspended], Active),
            (TransitionName::Suspend, vec![Active], Suspended),
            (TransitionName::Resume, vec![Suspended], Active),
            (TransitionName::Archive, vec![Active, Suspended], Archived),
            (TransitionName::Restore, vec![Archived], Active),
        ];

        for (name, from, to) in expected {
            for state in TeamStatus::ALL {
                let result = machine.check_state(name, state);
                if from.contains(&state) {
                    assert_eq!(result, Ok(to), "{name} from {state}");
                } else {
                    assert_eq!(
                        result,
                        Err(TransitionError::InvalidTransition {
                            transition: name,
                            from: state
                        }),
                        "{name} from {state}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_targets_are_defined_states() {
        let machine = StateMachine::default();
        for transition in machine.transitions() {
            assert!(TeamStatus::ALL.contains(&transition.to));
        }
        assert_eq!(machine.transitions().len(), TransitionName::ALL.len());
    }

    #[test]
    fn test_archive_from_draft_rejected() {
        let machine = StateMachine::default();
        let result = machine.evaluate(
            TransitionName::Archive,
            TeamStatus::Draft,
            &CapabilitySet::everything(),
        );
        assert!(matches!(result, Err(TransitionError::InvalidTransition { .. })));
    }

    #[test]
    fn test_any_required_permission_suffices() {
        let machine = StateMachine::default();
        let caps = CapabilitySet::from_names(["suspend_team"]);
        assert!(machine.check_permissions(TransitionName::Suspend, &caps).is_ok());

        let caps = CapabilitySet::from_names(["view_team"]);
        let err = machine
            .check_permissions(TransitionName::Suspend, &caps)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing permission to suspend this team (requires one of: manage_team, suspend_team)"
        );
    }

    #[test]
    fn test_state_guard_runs_first() {
        let machine = StateMachine::default();
        let result = machine.evaluate(
            TransitionName::Restore,
            TeamStatus::Active,
            &CapabilitySet::empty(),
        );
        assert!(matches!(result, Err(TransitionError::InvalidTransition { .. })));
    }

    #[test]
    fn test_overridden_permissions() {
        let overrides =
            HashMap::from([(TransitionName::Activate, vec!["launch".to_string()])]);
        let machine = StateMachine::with_permissions(&overrides);

        let caps = CapabilitySet::from_names(["manage_team"]);
        assert!(machine.check_permissions(TransitionName::Activate, &caps).is_err());
        assert!(machine.check_permissions(TransitionName::Suspend, &caps).is_ok());
    }

    #[test]
    fn test_available_transitions() {
        let machine = StateMachine::default();
        let all = CapabilitySet::everything();

        assert_eq!(
            machine.available(TeamStatus::Suspended, &all),
            vec![
                TransitionName::Activate,
                TransitionName::Resume,
                TransitionName::Archive
            ]
        );
        assert!(machine
            .available(TeamStatus::Active, &CapabilitySet::empty())
            .is_empty());
    }

    #[test]
    fn test_apply_writes_audit_record() {
        let machine = StateMachine::default();
        let mut team = team_in(TeamStatus::Active);
        let actor = PrincipalRef::user("9");
        let mut details = Map::new();
        details.insert("suspension_until".into(), json!(null));

        let previous = machine
            .apply(
                &mut team,
                TransitionName::Suspend,
                &CapabilitySet::everything(),
                &actor,
                Some("billing"),
                details,
                Utc::now(),
            )
            .unwrap();

        assert_eq!(previous, TeamStatus::Active);
        assert_eq!(team.status(), TeamStatus::Suspended);
        let record = team.lifecycle_record("suspend").unwrap();
        assert_eq!(record["previous_status"], "active");
        assert_eq!(record["actor"], "user:9");
        assert_eq!(record["reason"], "billing");
        assert!(record.get("suspension_until").is_some());
    }

    #[test]
    fn test_apply_leaves_team_untouched_on_failure() {
        let machine = StateMachine::default();
        let mut team = team_in(TeamStatus::Draft);
        let before = team.clone();

        let result = machine.apply(
            &mut team,
            TransitionName::Archive,
            &CapabilitySet::everything(),
            &PrincipalRef::user("1"),
            None,
            Map::new(),
            Utc::now(),
        );

        assert!(result.is_err());
        assert_eq!(team, before);
    }
}
