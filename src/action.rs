//! Operator actions and the per-control state machine.
//!
//! Every control moves through the same lifecycle:
//!
//! ```text
//! Idle --Trigger--> Pending --Resolve--> Succeeded   (page reload follows)
//!                           --Reject---> Failed --Revert--> Idle
//! ```
//!
//! [`transition`] is the only way to change state; [`present`] maps a state
//! to what the control should look like. Neither has side effects.

use std::time::Duration;

/// Every mutation the panel can trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Flip a boolean feature.
    ToggleFeature { key: String, current: bool },
    /// Submit a new value typed into a feature input.
    UpdateFeatureValue {
        key: String,
        value: String,
        original: String,
    },
    /// Set the token balance from the raw input text.
    UpdateTokens { amount: String },
    ActivateSubscription,
    DeleteUser,
    ClearSiteData,
}

/// Identity of the control an action belongs to.
///
/// Exclusion is per control: two features may be pending at once, but one
/// feature cannot be pending twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ControlId {
    Feature(String),
    Tokens,
    Subscription,
    DeleteUser,
    ClearSiteData,
}

/// Delays after an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionTiming {
    /// From Succeeded to page reload.
    pub reload_after: Duration,
    /// From Failed back to Idle.
    pub revert_after: Duration,
}

impl ActionTiming {
    const fn millis(reload_after: u64, revert_after: u64) -> Self {
        Self {
            reload_after: Duration::from_millis(reload_after),
            revert_after: Duration::from_millis(revert_after),
        }
    }
}

impl Action {
    #[must_use]
    pub fn control_id(&self) -> ControlId {
        match self {
            Self::ToggleFeature { key, .. } | Self::UpdateFeatureValue { key, .. } => {
                ControlId::Feature(key.clone())
            }
            Self::UpdateTokens { .. } => ControlId::Tokens,
            Self::ActivateSubscription => ControlId::Subscription,
            Self::DeleteUser => ControlId::DeleteUser,
            Self::ClearSiteData => ControlId::ClearSiteData,
        }
    }

    #[must_use]
    pub fn timing(&self) -> ActionTiming {
        match self {
            Self::ToggleFeature { .. } | Self::UpdateFeatureValue { .. } | Self::DeleteUser => {
                ActionTiming::millis(500, 3000)
            }
            Self::UpdateTokens { .. } => ActionTiming::millis(1000, 2000),
            Self::ActivateSubscription => ActionTiming::millis(1000, 5000),
            Self::ClearSiteData => ActionTiming::millis(800, 1500),
        }
    }

    /// Short name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ToggleFeature { .. } => "toggle feature",
            Self::UpdateFeatureValue { .. } => "update feature value",
            Self::UpdateTokens { .. } => "update tokens",
            Self::ActivateSubscription => "activate subscription",
            Self::DeleteUser => "delete user",
            Self::ClearSiteData => "clear site data",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActionState {
    #[default]
    Idle,
    Pending,
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionEvent {
    Trigger,
    Resolve,
    Reject(String),
    Revert,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition: {event:?} in state {state:?}")]
pub struct InvalidTransition {
    pub state: ActionState,
    pub event: ActionEvent,
}

/// Apply `event` to `state`.
///
/// # Errors
///
/// Returns [`InvalidTransition`] for any pair outside the lifecycle, e.g. a
/// second `Trigger` while Pending.
pub fn transition(state: &ActionState, event: ActionEvent) -> Result<ActionState, InvalidTransition> {
    match (state, event) {
        (ActionState::Idle, ActionEvent::Trigger) => Ok(ActionState::Pending),
        (ActionState::Pending, ActionEvent::Resolve) => Ok(ActionState::Succeeded),
        (ActionState::Pending, ActionEvent::Reject(message)) => Ok(ActionState::Failed(message)),
        (ActionState::Failed(_), ActionEvent::Revert) => Ok(ActionState::Idle),
        (state, event) => Err(InvalidTransition {
            state: state.clone(),
            event,
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Neutral,
    Busy,
    Success,
    Failure,
}

/// Visual attributes of a control in a given state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPresentation {
    pub disabled: bool,
    pub label: String,
    pub tone: Tone,
    /// Diagnostic text (tooltip), set on failure.
    pub detail: Option<String>,
}

/// What `action`'s control looks like in `state`.
///
/// Idle restores the pre-trigger label, so a revert puts the original
/// value back.
#[must_use]
pub fn present(action: &Action, state: &ActionState) -> ControlPresentation {
    let (label, tone, detail) = match state {
        ActionState::Idle => (idle_label(action), Tone::Neutral, None),
        ActionState::Pending => {
            let label = match action {
                Action::UpdateFeatureValue { value, .. } => value.clone(),
                _ => "⏳".to_owned(),
            };
            (label, Tone::Busy, None)
        }
        ActionState::Succeeded => {
            let label = match action {
                Action::UpdateFeatureValue { value, .. } => value.clone(),
                Action::ActivateSubscription => "🎉".to_owned(),
                Action::ClearSiteData => "✅ Cleared!".to_owned(),
                _ => "✅".to_owned(),
            };
            (label, Tone::Success, None)
        }
        ActionState::Failed(message) => {
            let label = match action {
                Action::UpdateFeatureValue { .. } => message.clone(),
                Action::UpdateTokens { .. } => "🤦‍♂️".to_owned(),
                Action::ActivateSubscription => format!("🤦‍♂️ {message}"),
                Action::ClearSiteData => format!("❌ {message}"),
                _ => "❌".to_owned(),
            };
            (label, Tone::Failure, Some(message.clone()))
        }
    };

    ControlPresentation {
        disabled: !matches!(state, ActionState::Idle),
        label,
        tone,
        detail,
    }
}

fn idle_label(action: &Action) -> String {
    match action {
        Action::ToggleFeature { current, .. } => current.to_string(),
        Action::UpdateFeatureValue { original, .. } => original.clone(),
        Action::UpdateTokens { .. } => "🔄 Update".to_owned(),
        Action::ActivateSubscription => "activate 1 month?".to_owned(),
        Action::DeleteUser => "☠️".to_owned(),
        Action::ClearSiteData => "🧹 Clear site data".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toggle() -> Action {
        Action::ToggleFeature {
            key: "betaFlag".into(),
            current: false,
        }
    }

    #[test]
    fn happy_path() {
        let s = transition(&ActionState::Idle, ActionEvent::Trigger).unwrap();
        assert_eq!(s, ActionState::Pending);
        let s = transition(&s, ActionEvent::Resolve).unwrap();
        assert_eq!(s, ActionState::Succeeded);
    }

    #[test]
    fn failure_reverts_to_idle() {
        let s = transition(&ActionState::Pending, ActionEvent::Reject("500: boom".into())).unwrap();
        assert_eq!(s, ActionState::Failed("500: boom".into()));
        assert_eq!(transition(&s, ActionEvent::Revert).unwrap(), ActionState::Idle);
    }

    #[test]
    fn no_transition_skips_pending() {
        assert!(transition(&ActionState::Idle, ActionEvent::Resolve).is_err());
        assert!(transition(&ActionState::Idle, ActionEvent::Reject("x".into())).is_err());
        assert!(transition(&ActionState::Idle, ActionEvent::Revert).is_err());
    }

    #[test]
    fn pending_rejects_second_trigger() {
        let err = transition(&ActionState::Pending, ActionEvent::Trigger).unwrap_err();
        assert_eq!(err.state, ActionState::Pending);
    }

    #[test]
    fn succeeded_is_terminal() {
        for event in [
            ActionEvent::Trigger,
            ActionEvent::Resolve,
            ActionEvent::Reject("x".into()),
            ActionEvent::Revert,
        ] {
            assert!(transition(&ActionState::Succeeded, event).is_err());
        }
    }

    #[test]
    fn control_ids_group_by_feature_key() {
        let value = Action::UpdateFeatureValue {
            key: "betaFlag".into(),
            value: "1".into(),
            original: "0".into(),
        };
        assert_eq!(toggle().control_id(), value.control_id());
        assert_ne!(toggle().control_id(), ControlId::Tokens);
    }

    #[test]
    fn timings() {
        assert_eq!(toggle().timing().reload_after, Duration::from_millis(500));
        assert_eq!(toggle().timing().revert_after, Duration::from_millis(3000));
        let sub = Action::ActivateSubscription.timing();
        assert_eq!(sub.reload_after, Duration::from_millis(1000));
        assert_eq!(sub.revert_after, Duration::from_millis(5000));
        let tokens = Action::UpdateTokens { amount: "1".into() }.timing();
        assert_eq!(tokens.revert_after, Duration::from_millis(2000));
    }

    #[test]
    fn presentation_follows_state() {
        let idle = present(&toggle(), &ActionState::Idle);
        assert!(!idle.disabled);
        assert_eq!(idle.label, "false");

        let pending = present(&toggle(), &ActionState::Pending);
        assert!(pending.disabled);
        assert_eq!(pending.tone, Tone::Busy);

        let failed = present(&toggle(), &ActionState::Failed("403: nope".into()));
        assert!(failed.disabled);
        assert_eq!(failed.tone, Tone::Failure);
        assert_eq!(failed.detail.as_deref(), Some("403: nope"));
    }

    #[test]
    fn feature_input_restores_original_on_idle() {
        let action = Action::UpdateFeatureValue {
            key: "featureChatExperiment".into(),
            value: "test_b".into(),
            original: "test_a".into(),
        };
        assert_eq!(present(&action, &ActionState::Pending).label, "test_b");
        assert_eq!(
            present(&action, &ActionState::Failed("500: x".into())).label,
            "500: x"
        );
        assert_eq!(present(&action, &ActionState::Idle).label, "test_a");
    }

    #[test]
    fn subscription_failure_shows_message_inline() {
        let p = present(
            &Action::ActivateSubscription,
            &ActionState::Failed("Unsupported domain".into()),
        );
        assert_eq!(p.label, "🤦‍♂️ Unsupported domain");
    }
}
