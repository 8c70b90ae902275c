#![doc = include_str!("../README.md")]

pub mod action;
pub mod config;
pub mod control;
pub mod credential;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod host;
pub mod overlay;
pub mod panel;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use action::{Action, ActionState, ControlId, ControlPresentation, Tone};
pub use config::{AdminCredentials, ApiPaths, OverlayConfig, StorageKeys};
pub use control::{ControlBoard, ControlView};
pub use credential::AdminCredentialCache;
pub use domain::{DomainGroup, DomainProfile, DomainResolver};
pub use error::Error;
pub use gateway::{MutationGateway, capitalize_key, parse_token_amount};
pub use host::{Clock, HostPage, SystemClock};
pub use overlay::{HostBindings, Overlay};
pub use panel::{PanelModel, PanelRenderer};
pub use session::{SessionEvent, SessionWatcher, decode_session};
pub use store::{KeyValueStore, MemoryStore};
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method};
pub use types::{AdminToken, FeatureValue, PanelPosition, SessionRecord, SubscriptionInfo, UserId};
