//! Action: a single invocation of a device action.
//!
//! An action moves strictly forward through `created → pending → completed`.
//! Completed actions are terminal records: no further transition is accepted
//! and neither `status` nor `time_requested` may change afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Timestamp;
use crate::error::TransitionError;
use crate::id::{ActionId, DeviceId};

/// Lifecycle stage of an [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    #[default]
    Created,
    Pending,
    Completed,
}

impl ActionStatus {
    /// The only status reachable from `self`, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Created => Some(Self::Pending),
            Self::Pending => Some(Self::Completed),
            Self::Completed => None,
        }
    }

    /// Whether the action reached its terminal state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Pending => f.write_str("pending"),
            Self::Completed => f.write_str("completed"),
        }
    }
}

/// A requested invocation of a named action on a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: ActionId,
    /// Non-owning back-reference to the hosting device.
    #[serde(skip)]
    pub device_id: DeviceId,
    pub name: String,
    #[serde(default)]
    pub input: BTreeMap<String, String>,
    status: ActionStatus,
    time_requested: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_completed: Option<Timestamp>,
}

impl Action {
    /// Create an action in the `created` state, stamped with the request time.
    #[must_use]
    pub fn new(
        id: ActionId,
        device_id: DeviceId,
        name: impl Into<String>,
        input: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id,
            device_id,
            name: name.into(),
            input,
            status: ActionStatus::Created,
            time_requested: chrono::Utc::now(),
            time_completed: None,
        }
    }

    #[must_use]
    pub fn status(&self) -> ActionStatus {
        self.status
    }

    #[must_use]
    pub fn time_requested(&self) -> Timestamp {
        self.time_requested
    }

    /// Set exactly once, on the transition into `completed`.
    #[must_use]
    pub fn time_completed(&self) -> Option<Timestamp> {
        self.time_completed
    }

    /// Move from `created` to `pending`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] (leaving the action untouched) when the
    /// action is not in the `created` state.
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.advance(ActionStatus::Pending)
    }

    /// Move from `pending` to `completed` and stamp the completion time.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] (leaving the action untouched) when the
    /// action is not in the `pending` state.
    pub fn finish(&mut self) -> Result<(), TransitionError> {
        self.advance(ActionStatus::Completed)?;
        self.time_completed = Some(chrono::Utc::now());
        Ok(())
    }

    fn advance(&mut self, to: ActionStatus) -> Result<(), TransitionError> {
        if self.status.next() != Some(to) {
            return Err(TransitionError {
                id: self.id.to_string(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_action() -> Action {
        let mut input = BTreeMap::new();
        input.insert("duration".to_string(), "5".to_string());
        Action::new(ActionId::new("act-1"), DeviceId::new("d1"), "fade", input)
    }

    #[test]
    fn should_start_in_created_state_without_completion_time() {
        let action = make_action();
        assert_eq!(action.status(), ActionStatus::Created);
        assert!(action.time_completed().is_none());
    }

    #[test]
    fn should_move_forward_through_every_state() {
        let mut action = make_action();
        action.start().unwrap();
        assert_eq!(action.status(), ActionStatus::Pending);
        assert!(action.time_completed().is_none());

        action.finish().unwrap();
        assert_eq!(action.status(), ActionStatus::Completed);
        assert!(action.time_completed().is_some());
    }

    #[test]
    fn should_reject_finish_when_not_started() {
        let mut action = make_action();
        let err = action.finish().unwrap_err();
        assert_eq!(err.from, ActionStatus::Created);
        assert_eq!(err.to, ActionStatus::Completed);
        assert_eq!(action.status(), ActionStatus::Created);
        assert!(action.time_completed().is_none());
    }

    #[test]
    fn should_freeze_completed_action_when_start_or_finish_called_again() {
        let mut action = make_action();
        action.start().unwrap();
        action.finish().unwrap();
        let requested = action.time_requested();
        let completed = action.time_completed();

        assert!(action.start().is_err());
        assert!(action.finish().is_err());

        assert_eq!(action.status(), ActionStatus::Completed);
        assert_eq!(action.time_requested(), requested);
        assert_eq!(action.time_completed(), completed);
    }

    #[test]
    fn should_reject_second_start() {
        let mut action = make_action();
        action.start().unwrap();
        assert!(action.start().is_err());
        assert_eq!(action.status(), ActionStatus::Pending);
    }

    #[test]
    fn should_omit_completion_time_until_completed() {
        let mut action = make_action();
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["status"], "created");
        assert!(json.get("timeCompleted").is_none());
        assert!(json.get("timeRequested").is_some());
        assert!(json.get("deviceId").is_none());

        action.start().unwrap();
        action.finish().unwrap();
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["status"], "completed");
        assert!(json.get("timeCompleted").is_some());
    }

    #[test]
    fn should_have_no_successor_when_completed() {
        assert_eq!(ActionStatus::Created.next(), Some(ActionStatus::Pending));
        assert_eq!(ActionStatus::Pending.next(), Some(ActionStatus::Completed));
        assert_eq!(ActionStatus::Completed.next(), None);
        assert!(ActionStatus::Completed.is_terminal());
    }
}
