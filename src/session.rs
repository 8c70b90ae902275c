use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;
use crate::store::KeyValueStore;
use crate::types::SessionRecord;

/// Outcome of one poll of the session key.
#[derive(Debug)]
pub enum SessionEvent {
    /// Key absent or raw value identical to the last one seen.
    Unchanged,
    /// A new user record was decoded.
    Updated(SessionRecord),
    /// The envelope says nobody is logged in.
    LoggedOut,
    /// The new raw value could not be decoded.
    DecodeFailed(Error),
}

#[derive(Deserialize)]
struct UserEnvelope {
    #[serde(default)]
    user: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthEnvelope {
    #[serde(default)]
    access_token: Option<String>,
}

/// Decode the double-encoded session value.
///
/// The outer value is a JSON object whose `user` field is itself a JSON
/// string. `Ok(None)` means logged out: `user` missing, `null`, or the
/// literal string `"null"`.
///
/// # Errors
///
/// Returns [`Error::Decode`] if either level is not valid JSON of the
/// expected shape.
pub fn decode_session(raw: &str) -> Result<Option<SessionRecord>, Error> {
    let outer: UserEnvelope =
        serde_json::from_str(raw).map_err(|e| Error::Decode(format!("outer envelope: {e}")))?;

    let inner = match outer.user {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s == "null" => return Ok(None),
        Some(Value::String(s)) => s,
        Some(other) => {
            return Err(Error::Decode(format!(
                "user field is not a string: {other}"
            )));
        }
    };

    serde_json::from_str::<SessionRecord>(&inner)
        .map(Some)
        .map_err(|e| Error::Decode(format!("user record: {e}")))
}

/// Read the end user's own access token from the auth key.
///
/// The auth value mirrors the user envelope: `{ "accessToken": "<json>" }`
/// where the inner string is itself JSON-encoded.
///
/// # Errors
///
/// - [`Error::MissingToken`] if the key or its `accessToken` is absent.
/// - [`Error::Decode`] if either level is not valid JSON.
pub fn read_user_access_token(store: &dyn KeyValueStore, auth_key: &str) -> Result<String, Error> {
    let raw = store
        .get(auth_key)
        .ok_or(Error::MissingToken("user auth data not found"))?;
    let envelope: AuthEnvelope =
        serde_json::from_str(&raw).map_err(|e| Error::Decode(format!("auth envelope: {e}")))?;
    let encoded = envelope
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or(Error::MissingToken("user accessToken not found in auth data"))?;
    serde_json::from_str::<String>(&encoded)
        .map_err(|e| Error::Decode(format!("user accessToken: {e}")))
}

/// Watches the session key for changes by raw-string comparison.
///
/// There is no push notification from the host; [`poll`](Self::poll) is
/// called on a fixed interval and the last raw value seen is the only
/// de-duplication state.
pub struct SessionWatcher {
    store: Arc<dyn KeyValueStore>,
    key: String,
    last_seen: Option<String>,
}

impl SessionWatcher {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            last_seen: None,
        }
    }

    /// Read the key once and report what changed.
    ///
    /// The raw value is remembered before decoding, so a value that fails
    /// to decode is reported once and then ignored until it changes.
    pub fn poll(&mut self) -> SessionEvent {
        let Some(raw) = self.store.get(&self.key).filter(|r| !r.is_empty()) else {
            return SessionEvent::Unchanged;
        };
        if self.last_seen.as_deref() == Some(raw.as_str()) {
            return SessionEvent::Unchanged;
        }

        tracing::debug!(key = %self.key, "Session value changed");
        let decoded = decode_session(&raw);
        self.last_seen = Some(raw);

        match decoded {
            Ok(Some(record)) => SessionEvent::Updated(record),
            Ok(None) => SessionEvent::LoggedOut,
            Err(e) => SessionEvent::DecodeFailed(e),
        }
    }

    /// Forget the last seen value so the next poll re-decodes.
    pub fn reset(&mut self) {
        self.last_seen = None;
    }
}
