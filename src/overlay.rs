use std::sync::{Arc, Mutex, PoisonError};

use tokio::time::MissedTickBehavior;

use crate::action::{Action, ActionState};
use crate::config::OverlayConfig;
use crate::control::{ControlBoard, ControlView};
use crate::error::Error;
use crate::gateway::MutationGateway;
use crate::host::{Clock, HostPage, SystemClock};
use crate::panel::{
    PanelModel, PanelRenderer, load_collapsed, load_position, save_collapsed, save_position,
};
use crate::session::{SessionEvent, SessionWatcher};
use crate::store::KeyValueStore;
use crate::transport::HttpTransport;
use crate::types::{FeatureValue, PanelPosition, SessionRecord, UserId};

const DELETE_PROMPT: &str =
    "Are you sure you want to permanently delete this user? This cannot be undone.";

/// Host-side collaborators the overlay runs against.
#[derive(Clone)]
pub struct HostBindings {
    /// Page session scope (`persist:user`, `persist:auth`).
    pub session_store: Arc<dyn KeyValueStore>,
    /// Scope that outlives reloads (token cache, panel position).
    pub operator_store: Arc<dyn KeyValueStore>,
    pub page: Arc<dyn HostPage>,
    pub panel: Arc<dyn PanelRenderer>,
    pub controls: Arc<dyn ControlView>,
    pub clock: Arc<dyn Clock>,
}

impl HostBindings {
    #[must_use]
    pub fn new(
        session_store: Arc<dyn KeyValueStore>,
        operator_store: Arc<dyn KeyValueStore>,
        page: Arc<dyn HostPage>,
        panel: Arc<dyn PanelRenderer>,
        controls: Arc<dyn ControlView>,
    ) -> Self {
        Self {
            session_store,
            operator_store,
            page,
            panel,
            controls,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// The overlay for one page lifetime.
///
/// Owns the session watcher, the currently displayed record, the mutation
/// gateway, and the control board. Construct once per page; share behind
/// an `Arc` between the poll loop and UI event handlers.
pub struct Overlay<T> {
    config: OverlayConfig,
    gateway: MutationGateway<T>,
    board: Arc<ControlBoard>,
    watcher: Mutex<SessionWatcher>,
    current: Mutex<Option<SessionRecord>>,
    host: HostBindings,
}

impl<T: HttpTransport> Overlay<T> {
    #[must_use]
    pub fn new(config: OverlayConfig, transport: T, host: HostBindings) -> Self {
        let gateway = MutationGateway::new(
            &config,
            transport,
            Arc::clone(&host.session_store),
            Arc::clone(&host.operator_store),
            Arc::clone(&host.page),
            Arc::clone(&host.clock),
        );
        let watcher = SessionWatcher::new(
            Arc::clone(&host.session_store),
            config.storage.user_key.clone(),
        );
        let board = ControlBoard::new(Arc::clone(&host.controls), Arc::clone(&host.page));
        Self {
            config,
            gateway,
            board,
            watcher: Mutex::new(watcher),
            current: Mutex::new(None),
            host,
        }
    }

    /// Show the loader, wait for the page to settle, then poll the session
    /// key on a fixed interval for as long as the task lives.
    pub async fn run(self: Arc<Self>) {
        self.host.panel.show_loader();
        tokio::time::sleep(self.config.startup_delay).await;

        let mut interval = tokio::time::interval(self.config.check_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.tick();
        }
    }

    /// One poll of the session key. Never fails: decode problems are
    /// logged and retried when the value changes.
    pub fn tick(&self) {
        let event = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .poll();

        match event {
            SessionEvent::Unchanged => {}
            SessionEvent::Updated(record) => {
                self.board.teardown();
                let model = self.model_for(&record);
                *self.lock_current() = Some(record);
                self.host.panel.hide_loader();
                self.host.panel.render(&model);
                self.board.replay();
            }
            SessionEvent::LoggedOut => {
                self.board.teardown();
                *self.lock_current() = None;
                self.host.panel.remove();
            }
            SessionEvent::DecodeFailed(e) => {
                tracing::warn!(error = %e, key = %self.config.storage.user_key, "Error parsing session user");
                self.host.panel.hide_loader();
            }
        }
    }

    /// Run one operator action through its control's lifecycle.
    ///
    /// The outcome is rendered into the triggering control; the returned
    /// result mirrors it for callers that want it. A declined delete
    /// confirmation returns `Ok(())` without touching the control.
    ///
    /// # Errors
    ///
    /// [`Error::Busy`] if the control is already pending, otherwise
    /// whatever the mutation failed with.
    pub async fn trigger(&self, action: Action) -> Result<(), Error> {
        if matches!(action, Action::DeleteUser) {
            if self.board.state(&action.control_id()) != ActionState::Idle {
                return Err(Error::Busy);
            }
            if !self.host.page.confirm(DELETE_PROMPT) {
                return Ok(());
            }
        }

        self.board.begin(&action)?;
        let user = self.current_user_id();

        match self.execute(user.as_ref(), &action).await {
            Ok(()) => {
                tracing::info!(action = action.name(), user = ?user, "Action succeeded");
                self.board.resolve(&action);
                Ok(())
            }
            Err(e) => {
                tracing::error!(action = action.name(), error = %e, "Action failed");
                self.board.reject(&action, e.to_string());
                Err(e)
            }
        }
    }

    async fn execute(&self, user: Option<&UserId>, action: &Action) -> Result<(), Error> {
        let hostname = self.host.page.hostname();
        match action {
            Action::ToggleFeature { key, current } => {
                self.gateway
                    .update_feature(require_user(user)?, key, FeatureValue::Bool(!current))
                    .await
            }
            Action::UpdateFeatureValue { key, value, .. } => {
                self.gateway
                    .update_feature(require_user(user)?, key, FeatureValue::Text(value.clone()))
                    .await
            }
            Action::UpdateTokens { amount } => {
                self.ensure_writable(&hostname)?;
                self.gateway
                    .update_token_balance(require_user(user)?, amount)
                    .await
                    .map(|_| ())
            }
            Action::ActivateSubscription => {
                self.ensure_writable(&hostname)?;
                self.gateway
                    .activate_subscription(require_user(user)?)
                    .await
            }
            Action::DeleteUser => {
                self.gateway.delete_user(require_user(user)?).await?;
                // the session is gone server-side; a failed wipe only leaves stale local data
                if let Err(e) = self.host.page.clear_site_data() {
                    tracing::warn!(error = %e, "Error clearing site data after user deletion");
                }
                Ok(())
            }
            Action::ClearSiteData => {
                if !self.gateway.resolver().is_supported(&hostname) {
                    return Err(Error::Validation("Invalid domain!".into()));
                }
                let cleared = self.host.page.clear_site_data();
                if cleared.is_err() {
                    // partial wipes still leave the page stale
                    self.board.schedule_reload(action.timing().reload_after);
                }
                cleared
            }
        }
    }

    /// Close the panel: cancel pending reverts and remove it.
    pub fn close(&self) {
        self.board.teardown();
        self.host.panel.remove();
    }

    /// Cancel every timer, scheduled reloads included. For page unload.
    pub fn shutdown(&self) {
        self.board.shutdown();
    }

    /// Persist where the operator dragged the panel.
    ///
    /// # Errors
    ///
    /// Store write failures.
    pub fn save_position(&self, position: PanelPosition) -> Result<(), Error> {
        save_position(
            self.host.operator_store.as_ref(),
            &self.config.storage.position_key,
            position,
        )
    }

    /// Flip the panel between collapsed and expanded and remember the
    /// choice across reloads. Returns the new collapsed flag.
    ///
    /// # Errors
    ///
    /// Store write failures.
    pub fn toggle_collapsed(&self) -> Result<bool, Error> {
        let store = self.host.operator_store.as_ref();
        let key = &self.config.storage.collapsed_key;
        let collapsed = !load_collapsed(store, key);
        save_collapsed(store, key, collapsed)?;
        Ok(collapsed)
    }

    /// Record currently displayed, if any.
    #[must_use]
    pub fn current(&self) -> Option<SessionRecord> {
        self.lock_current().clone()
    }

    #[must_use]
    pub fn board(&self) -> &Arc<ControlBoard> {
        &self.board
    }

    fn model_for(&self, record: &SessionRecord) -> PanelModel {
        let hostname = self.host.page.hostname();
        let read_only = self.gateway.resolver().is_read_only(&hostname);
        let position = load_position(
            self.host.operator_store.as_ref(),
            &self.config.storage.position_key,
        );
        let mut model = PanelModel::build(record, &self.config, read_only, position);
        model.collapsed = load_collapsed(
            self.host.operator_store.as_ref(),
            &self.config.storage.collapsed_key,
        );
        model
    }

    fn ensure_writable(&self, hostname: &str) -> Result<(), Error> {
        if self.gateway.resolver().is_read_only(hostname) {
            return Err(Error::Validation("Read-only domain".into()));
        }
        Ok(())
    }

    fn current_user_id(&self) -> Option<UserId> {
        self.lock_current().as_ref().map(|r| r.id.clone())
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<SessionRecord>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn require_user(user: Option<&UserId>) -> Result<&UserId, Error> {
    user.ok_or_else(|| Error::Validation("No user loaded".into()))
}
