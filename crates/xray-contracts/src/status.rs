use serde::Serialize;
use tracing::{debug, warn};

use crate::events::{EngineEvent, EventLog};

/// User-facing state of the current action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum AnalysisStatus {
    #[default]
    Idle,
    Loading(String),
    Success(String),
    Error(String),
}

impl AnalysisStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading(_) => "loading",
            Self::Success(_) => "success",
            Self::Error(_) => "error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Idle => "",
            Self::Loading(message) | Self::Success(message) | Self::Error(message) => message,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl From<&AnalysisStatus> for EngineEvent {
    fn from(status: &AnalysisStatus) -> Self {
        Self::Status {
            status: status.label().to_string(),
            message: status.message().to_string(),
        }
    }
}

type StatusListener = Box<dyn FnMut(&AnalysisStatus) + Send>;

/// Holds the current status and fans every transition out to an optional
/// listener and an optional event log.
#[derive(Default)]
pub struct StatusChannel {
    current: AnalysisStatus,
    listener: Option<StatusListener>,
    events: Option<EventLog>,
}

impl StatusChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_listener(&mut self, listener: impl FnMut(&AnalysisStatus) + Send + 'static) {
        self.listener = Some(Box::new(listener));
    }

    pub fn set_event_log(&mut self, events: EventLog) {
        self.events = Some(events);
    }

    pub fn event_log(&self) -> Option<&EventLog> {
        self.events.as_ref()
    }

    pub fn current(&self) -> &AnalysisStatus {
        &self.current
    }

    pub fn publish(&mut self, status: AnalysisStatus) {
        debug!(status = status.label(), message = status.message(), "status update");
        if let Some(listener) = self.listener.as_mut() {
            listener(&status);
        }
        if let Some(events) = self.events.as_ref() {
            if let Err(err) = events.append(&EngineEvent::from(&status)) {
                let message = format!("{err:#}");
                warn!(error = %message, "failed to append status event");
            }
        }
        self.current = status;
    }
}
