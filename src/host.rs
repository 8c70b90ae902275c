use time::OffsetDateTime;

use crate::error::Error;

/// The page the overlay is injected into.
///
/// Everything here is a thin I/O boundary: the engine decides *when* to
/// reload or wipe local state, the host decides *how*.
pub trait HostPage: Send + Sync + 'static {
    /// Current network host name (e.g. `www.example.com`).
    fn hostname(&self) -> String;

    /// Full page reload. The engine does not survive this call.
    fn reload(&self);

    /// Wipe browser-persisted state for the site: local and session
    /// storage plus cookies.
    fn clear_site_data(&self) -> Result<(), Error>;

    /// Ask the operator to confirm a destructive action.
    fn confirm(&self, prompt: &str) -> bool;
}

/// Wall-clock source for token expiry.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> OffsetDateTime;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
