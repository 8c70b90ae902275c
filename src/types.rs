use std::collections::BTreeMap;

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use time::OffsetDateTime;

/// Backend user identifier, as stored in the session record's `id` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct UserId(pub String);

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Typed value of a user feature flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Bool(bool),
    Number(Number),
    Text(String),
}

impl FeatureValue {
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl std::fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for FeatureValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<String> for FeatureValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for FeatureValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

/// Active subscription attached to a user record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Decoded user entity from the persisted session.
///
/// Rebuilt from scratch whenever the raw session string changes; never
/// mutated in place. Fields the panel does not know about are kept in
/// `extra` so re-encoding loses nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, rename = "isTUser", skip_serializing_if = "Option::is_none")]
    pub is_t_user: Option<bool>,
    #[serde(default, rename = "nEnabled", skip_serializing_if = "Option::is_none")]
    pub n_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_features: Option<BTreeMap<String, FeatureValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_subscription: Option<SubscriptionInfo>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionRecord {
    /// Create a record with only the required `id`.
    #[must_use]
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            email: None,
            utm_source: None,
            url: None,
            is_t_user: None,
            n_enabled: None,
            user_features: None,
            active_subscription: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_feature(mut self, key: impl Into<String>, value: impl Into<FeatureValue>) -> Self {
        self.user_features
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_subscription(mut self, subscription: SubscriptionInfo) -> Self {
        self.active_subscription = Some(subscription);
        self
    }

    /// Look up a feature by its session-side key.
    #[must_use]
    pub fn feature(&self, key: &str) -> Option<&FeatureValue> {
        self.user_features.as_ref().and_then(|f| f.get(key))
    }
}

/// Cached admin bearer token.
///
/// `expiry` is an absolute Unix time in milliseconds, matching the JSON
/// shape `{ "token": ..., "expiry": ... }` kept in the operator store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminToken {
    pub token: String,
    pub expiry: i64,
}

impl AdminToken {
    /// Issue a token valid for `ttl` from `now`.
    #[must_use]
    pub fn issued_at(token: impl Into<String>, now: OffsetDateTime, ttl: std::time::Duration) -> Self {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Self {
            token: token.into(),
            expiry: unix_millis(now).saturating_add(ttl_ms),
        }
    }

    /// A cached token is usable only while `now < expiry`.
    #[must_use]
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        unix_millis(now) < self.expiry
    }
}

/// Saved screen position of the panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PanelPosition {
    pub left: f64,
    pub top: f64,
}

pub(crate) fn unix_millis(t: OffsetDateTime) -> i64 {
    i64::try_from(t.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}
