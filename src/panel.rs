//! View model handed to the host's panel renderer.
//!
//! Layout, styling, dragging, and clipboard copy belong to the host. This
//! module decides *what* the panel shows: which features are editable,
//! which controls exist on this host, how long strings are shortened.

use crate::action::Action;
use crate::config::OverlayConfig;
use crate::error::Error;
use crate::store::KeyValueStore;
use crate::types::{FeatureValue, PanelPosition, SessionRecord, SubscriptionInfo, UserId};

const URL_DISPLAY_LIMIT: usize = 77;
const KEY_DISPLAY_LIMIT: usize = 37;
const CHAT_EXPERIMENT_FEATURE: &str = "featureChatExperiment";
const STATUS_FEATURES: [&str; 2] = ["hasConfirmedAge", "isRomanceModeActive"];

/// Draws the panel. Implemented by the host.
pub trait PanelRenderer: Send + Sync + 'static {
    /// Show the "loading" indicator shown before the first render.
    fn show_loader(&self);
    fn hide_loader(&self);
    /// Replace any existing panel with one for `model`.
    fn render(&self, model: &PanelModel);
    /// Remove the panel (logout or close).
    fn remove(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
    Positive,
    Negative,
    Plain,
}

/// Read-only status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    pub label: String,
    pub value: String,
    pub highlight: Highlight,
}

impl StatusRow {
    fn flag(label: &str, value: Option<&FeatureValue>) -> Self {
        let highlight = match value.and_then(FeatureValue::as_bool) {
            Some(true) => Highlight::Positive,
            Some(false) => Highlight::Negative,
            None => Highlight::Plain,
        };
        Self {
            label: label.to_owned(),
            value: value.map_or_else(|| "-".to_owned(), ToString::to_string),
            highlight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureControlKind {
    Toggle(bool),
    Text(String),
    /// Free text with a dropdown of preset values.
    Preset { value: String, options: Vec<PresetOption> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetOption {
    pub value: String,
    pub label: String,
}

/// One editable feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureControl {
    pub key: String,
    pub display_key: String,
    pub kind: FeatureControlKind,
}

impl FeatureControl {
    /// Action for activating this control. `input` is the text currently
    /// in the field; ignored for toggles.
    #[must_use]
    pub fn action(&self, input: Option<String>) -> Action {
        match &self.kind {
            FeatureControlKind::Toggle(current) => Action::ToggleFeature {
                key: self.key.clone(),
                current: *current,
            },
            FeatureControlKind::Text(original)
            | FeatureControlKind::Preset {
                value: original, ..
            } => Action::UpdateFeatureValue {
                key: self.key.clone(),
                value: input.unwrap_or_else(|| original.clone()),
                original: original.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionSection {
    Active {
        info: SubscriptionInfo,
        /// Token-balance control shown.
        can_update_tokens: bool,
    },
    Inactive {
        /// Activate-subscription control shown.
        can_activate: bool,
    },
}

/// Everything the panel displays for one decoded record.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelModel {
    pub user_id: UserId,
    pub email: String,
    pub subscription: SubscriptionSection,
    pub utm_source: String,
    pub url: String,
    pub status: Vec<StatusRow>,
    pub features: Vec<FeatureControl>,
    pub read_only: bool,
    pub position: Option<PanelPosition>,
    /// Body hidden, header only.
    pub collapsed: bool,
}

impl PanelModel {
    #[must_use]
    pub fn build(
        record: &SessionRecord,
        config: &OverlayConfig,
        read_only: bool,
        position: Option<PanelPosition>,
    ) -> Self {
        let subscription = match &record.active_subscription {
            Some(info) => SubscriptionSection::Active {
                info: info.clone(),
                can_update_tokens: !read_only,
            },
            None => SubscriptionSection::Inactive {
                can_activate: !read_only,
            },
        };

        let is_t_user = record.is_t_user.map(FeatureValue::Bool);
        let mut status = vec![StatusRow::flag("isTUser", is_t_user.as_ref())];
        if let Some(n) = record.n_enabled {
            status.push(StatusRow::flag("nEnabled", Some(&FeatureValue::Bool(n))));
        }
        for key in STATUS_FEATURES {
            if let Some(value) = record.feature(key) {
                status.push(StatusRow::flag(key, Some(value)));
            }
        }

        let features = record
            .user_features
            .iter()
            .flatten()
            .filter(|(key, _)| !config.is_non_interactive(key))
            .map(|(key, value)| feature_control(key, value, config))
            .collect();

        Self {
            user_id: record.id.clone(),
            email: dash_if_empty(record.email.as_deref()),
            subscription,
            utm_source: dash_if_empty(record.utm_source.as_deref()),
            url: record
                .url
                .as_deref()
                .filter(|u| !u.is_empty())
                .map_or_else(|| "-".to_owned(), |u| truncate(u, URL_DISPLAY_LIMIT, URL_DISPLAY_LIMIT)),
            status,
            features,
            read_only,
            position,
            collapsed: false,
        }
    }

    /// Look up the control for a feature key.
    #[must_use]
    pub fn feature(&self, key: &str) -> Option<&FeatureControl> {
        self.features.iter().find(|f| f.key == key)
    }
}

fn feature_control(key: &str, value: &FeatureValue, config: &OverlayConfig) -> FeatureControl {
    let kind = if key == CHAT_EXPERIMENT_FEATURE {
        FeatureControlKind::Preset {
            value: value.to_string(),
            options: config
                .chat_experiment_options
                .iter()
                .map(|option| PresetOption {
                    value: option.clone(),
                    label: option.replacen("test_", "", 1),
                })
                .collect(),
        }
    } else if let FeatureValue::Bool(b) = value {
        FeatureControlKind::Toggle(*b)
    } else {
        FeatureControlKind::Text(value.to_string())
    };

    FeatureControl {
        key: key.to_owned(),
        display_key: truncate(key, KEY_DISPLAY_LIMIT, KEY_DISPLAY_LIMIT - 1),
        kind,
    }
}

/// Shorten to `keep` chars plus `...` when longer than `limit` chars.
fn truncate(s: &str, limit: usize, keep: usize) -> String {
    if s.chars().count() > limit {
        let mut out: String = s.chars().take(keep).collect();
        out.push_str("...");
        out
    } else {
        s.to_owned()
    }
}

fn dash_if_empty(s: Option<&str>) -> String {
    s.filter(|s| !s.is_empty()).unwrap_or("-").to_owned()
}

/// Saved panel position, if any. Unreadable records are ignored.
#[must_use]
pub fn load_position(store: &dyn KeyValueStore, key: &str) -> Option<PanelPosition> {
    let raw = store.get(key)?;
    serde_json::from_str(&raw)
        .inspect_err(|e| tracing::debug!(error = %e, "Ignoring unreadable panel position"))
        .ok()
}

/// Persist the panel position after a drag.
///
/// # Errors
///
/// Store write failures.
pub fn save_position(store: &dyn KeyValueStore, key: &str, position: PanelPosition) -> Result<(), Error> {
    let encoded = serde_json::to_string(&position).map_err(|e| Error::Store(e.to_string()))?;
    store.set(key, encoded)
}

/// Saved collapsed flag; expanded when absent or unreadable.
#[must_use]
pub fn load_collapsed(store: &dyn KeyValueStore, key: &str) -> bool {
    store
        .get(key)
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or(false)
}

/// Persist the collapsed flag.
///
/// # Errors
///
/// Store write failures.
pub fn save_collapsed(store: &dyn KeyValueStore, key: &str, collapsed: bool) -> Result<(), Error> {
    store.set(key, collapsed.to_string())
}
