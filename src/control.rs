use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::action::{
    Action, ActionEvent, ActionState, ControlId, ControlPresentation, present, transition,
};
use crate::error::Error;
use crate::host::HostPage;

/// Draws a control in its current state.
pub trait ControlView: Send + Sync + 'static {
    fn render(&self, id: &ControlId, presentation: &ControlPresentation);
}

struct Slot {
    action: Action,
    state: ActionState,
    epoch: u64,
    revert: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Slots {
    by_id: HashMap<ControlId, Slot>,
    next_epoch: u64,
    reloads: Vec<JoinHandle<()>>,
}

/// Runtime side of the per-control state machine.
///
/// Holds one slot per control, applies [`transition`]s, renders through the
/// [`ControlView`], and owns the timers that follow an outcome. Revert
/// timers are cancelled on [`teardown`](Self::teardown); a revert that
/// fires for a forgotten slot does nothing. In-flight controls outlive a
/// teardown so a late outcome still resolves and stays exclusive.
pub struct ControlBoard {
    view: Arc<dyn ControlView>,
    page: Arc<dyn HostPage>,
    slots: Mutex<Slots>,
}

impl ControlBoard {
    #[must_use]
    pub fn new(view: Arc<dyn ControlView>, page: Arc<dyn HostPage>) -> Arc<Self> {
        Arc::new(Self {
            view,
            page,
            slots: Mutex::new(Slots::default()),
        })
    }

    /// Current state of a control; unknown controls are Idle.
    #[must_use]
    pub fn state(&self, id: &ControlId) -> ActionState {
        self.lock()
            .by_id
            .get(id)
            .map(|slot| slot.state.clone())
            .unwrap_or_default()
    }

    /// Move the action's control from Idle to Pending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if the control is not Idle, which keeps at
    /// most one request in flight per control.
    pub fn begin(&self, action: &Action) -> Result<(), Error> {
        let id = action.control_id();
        let presentation = {
            let mut slots = self.lock();
            let epoch = slots.next_epoch;
            slots.next_epoch += 1;

            let current = slots
                .by_id
                .get(&id)
                .map(|slot| slot.state.clone())
                .unwrap_or_default();
            let next = transition(&current, ActionEvent::Trigger).map_err(|_| Error::Busy)?;

            let presentation = present(action, &next);
            slots.by_id.insert(
                id.clone(),
                Slot {
                    action: action.clone(),
                    state: next,
                    epoch,
                    revert: None,
                },
            );
            presentation
        };
        self.view.render(&id, &presentation);
        Ok(())
    }

    /// Pending → Succeeded, then reload the page after the action's delay.
    pub fn resolve(&self, action: &Action) {
        let id = action.control_id();
        let Some(presentation) = self.apply(&id, ActionEvent::Resolve) else {
            return;
        };
        self.view.render(&id, &presentation);
        self.schedule_reload(action.timing().reload_after);
    }

    /// Reload the page after `delay`, whatever the controls are doing.
    pub fn schedule_reload(&self, delay: Duration) {
        let page = Arc::clone(&self.page);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            page.reload();
        });
        self.lock().reloads.push(handle);
    }

    /// Pending → Failed with `message`, then revert to Idle after the
    /// action's delay.
    pub fn reject(self: &Arc<Self>, action: &Action, message: impl Into<String>) {
        let id = action.control_id();
        let Some(presentation) = self.apply(&id, ActionEvent::Reject(message.into())) else {
            return;
        };
        self.view.render(&id, &presentation);

        let board: Weak<Self> = Arc::downgrade(self);
        let delay = action.timing().revert_after;
        let mut slots = self.lock();
        let Some(slot) = slots.by_id.get_mut(&id) else {
            return;
        };
        let epoch = slot.epoch;
        let timer_id = id.clone();
        slot.revert = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(board) = board.upgrade() {
                board.revert(&timer_id, epoch);
            }
        }));
    }

    /// Forget controls that are Idle or Failed, cancelling their revert
    /// timers. Pending and Succeeded controls survive: their request is
    /// still in flight or their reload is already scheduled, so the control
    /// stays busy and the outcome still lands.
    pub fn teardown(&self) {
        let mut slots = self.lock();
        slots.by_id.retain(|_, slot| {
            let keep = matches!(slot.state, ActionState::Pending | ActionState::Succeeded);
            if !keep {
                if let Some(timer) = slot.revert.take() {
                    timer.abort();
                }
            }
            keep
        });
    }

    /// Render every control that survived a [`teardown`](Self::teardown)
    /// into a freshly drawn panel.
    pub fn replay(&self) {
        let frames: Vec<(ControlId, ControlPresentation)> = self
            .lock()
            .by_id
            .iter()
            .map(|(id, slot)| (id.clone(), present(&slot.action, &slot.state)))
            .collect();
        for (id, presentation) in &frames {
            self.view.render(id, presentation);
        }
    }

    /// Cancel everything, scheduled reloads included, and forget every
    /// control.
    pub fn shutdown(&self) {
        let mut slots = self.lock();
        for (_, slot) in slots.by_id.drain() {
            if let Some(timer) = slot.revert {
                timer.abort();
            }
        }
        for reload in slots.reloads.drain(..) {
            reload.abort();
        }
    }

    fn revert(&self, id: &ControlId, epoch: u64) {
        let presentation = {
            let mut slots = self.lock();
            let Some(slot) = slots.by_id.get_mut(id) else {
                return;
            };
            if slot.epoch != epoch {
                return;
            }
            let Ok(next) = transition(&slot.state, ActionEvent::Revert) else {
                return;
            };
            slot.state = next;
            slot.revert = None;
            present(&slot.action, &slot.state)
        };
        self.view.render(id, &presentation);
    }

    fn apply(&self, id: &ControlId, event: ActionEvent) -> Option<ControlPresentation> {
        let mut slots = self.lock();
        let slot = slots.by_id.get_mut(id)?;
        match transition(&slot.state, event) {
            Ok(next) => {
                slot.state = next;
                Some(present(&slot.action, &slot.state))
            }
            Err(e) => {
                tracing::warn!(error = %e, control = ?id, "Ignoring out-of-order control event");
                None
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ControlBoard {
    fn drop(&mut self) {
        let slots = self.slots.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, slot) in slots.by_id.drain() {
            if let Some(timer) = slot.revert {
                timer.abort();
            }
        }
        for reload in slots.reloads.drain(..) {
            reload.abort();
        }
    }
}
