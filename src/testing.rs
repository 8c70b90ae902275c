//! Fakes shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::OffsetDateTime;

use crate::action::{ControlId, ControlPresentation};
use crate::control::ControlView;
use crate::error::Error;
use crate::host::{Clock, HostPage};
use crate::panel::{PanelModel, PanelRenderer};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport};

/// Transport that records requests and answers from a script.
///
/// Unscripted requests get `200 {}`.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    requests: Mutex<Vec<ApiRequest>>,
    script: Mutex<VecDeque<ApiResponse>>,
    latency: Option<Duration>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn with_latency(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency: Some(latency),
            ..Self::default()
        })
    }

    pub(crate) fn respond(&self, response: ApiResponse) {
        self.script.lock().unwrap().push_back(response);
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn count_path(&self, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.url.path() == path)
            .count()
    }
}

impl HttpTransport for RecordingTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        self.requests.lock().unwrap().push(request);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| ApiResponse::new(200, "{}")))
    }
}

pub(crate) struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(OffsetDateTime::from_unix_timestamp(1_750_000_000).unwrap()),
        })
    }

    pub(crate) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap()
    }
}

pub(crate) struct RecordingPage {
    host: Mutex<String>,
    reloads: AtomicUsize,
    clears: AtomicUsize,
    confirms: AtomicUsize,
    confirm_answer: AtomicBool,
    clear_fails: AtomicBool,
}

impl RecordingPage {
    pub(crate) fn new(host: &str) -> Arc<Self> {
        Arc::new(Self {
            host: Mutex::new(host.to_owned()),
            reloads: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
            confirms: AtomicUsize::new(0),
            confirm_answer: AtomicBool::new(true),
            clear_fails: AtomicBool::new(false),
        })
    }

    pub(crate) fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    pub(crate) fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub(crate) fn confirms(&self) -> usize {
        self.confirms.load(Ordering::SeqCst)
    }

    pub(crate) fn answer_confirm(&self, answer: bool) {
        self.confirm_answer.store(answer, Ordering::SeqCst);
    }

    pub(crate) fn fail_clear(&self) {
        self.clear_fails.store(true, Ordering::SeqCst);
    }
}

impl HostPage for RecordingPage {
    fn hostname(&self) -> String {
        self.host.lock().unwrap().clone()
    }

    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }

    fn clear_site_data(&self) -> Result<(), Error> {
        if self.clear_fails.load(Ordering::SeqCst) {
            return Err(Error::Store("cookies locked".into()));
        }
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn confirm(&self, _prompt: &str) -> bool {
        self.confirms.fetch_add(1, Ordering::SeqCst);
        self.confirm_answer.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PanelEvent {
    ShowLoader,
    HideLoader,
    Render(PanelModel),
    Remove,
}

#[derive(Default)]
pub(crate) struct RecordingPanel {
    events: Mutex<Vec<PanelEvent>>,
}

impl RecordingPanel {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn events(&self) -> Vec<PanelEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn renders(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, PanelEvent::Render(_)))
            .count()
    }
}

impl PanelRenderer for RecordingPanel {
    fn show_loader(&self) {
        self.events.lock().unwrap().push(PanelEvent::ShowLoader);
    }

    fn hide_loader(&self) {
        self.events.lock().unwrap().push(PanelEvent::HideLoader);
    }

    fn render(&self, model: &PanelModel) {
        self.events
            .lock()
            .unwrap()
            .push(PanelEvent::Render(model.clone()));
    }

    fn remove(&self) {
        self.events.lock().unwrap().push(PanelEvent::Remove);
    }
}

#[derive(Default)]
pub(crate) struct RecordingControls {
    frames: Mutex<Vec<(ControlId, ControlPresentation)>>,
}

impl RecordingControls {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn frames_for(&self, id: &ControlId) -> Vec<ControlPresentation> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == id)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub(crate) fn last(&self, id: &ControlId) -> Option<ControlPresentation> {
        self.frames_for(id).pop()
    }
}

impl ControlView for RecordingControls {
    fn render(&self, id: &ControlId, presentation: &ControlPresentation) {
        self.frames
            .lock()
            .unwrap()
            .push((id.clone(), presentation.clone()));
    }
}
