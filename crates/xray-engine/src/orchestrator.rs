use tracing::{info, warn};
use xray_contracts::events::{EngineEvent, EventLog, TurnPhase};
use xray_contracts::knowledge::{KnowledgeItem, KnowledgeStore, PersistenceError};
use xray_contracts::prompts::{compile_initial_prompt, compile_refinement_prompt};
use xray_contracts::status::{AnalysisStatus, StatusChannel};
use xray_contracts::uploads::UploadSet;

use crate::client::AnalysisSession;
use crate::error::EngineError;
use crate::ingest::ingest_uploads;
use crate::session::{SessionEngine, SessionState};

pub const NO_IMAGES_MESSAGE: &str = "Please upload at least one X-ray image.";
pub const ANALYSIS_STARTED_MESSAGE: &str = "Starting analysis...";
pub const ANALYSIS_SUCCESS_MESSAGE: &str = "Report generated successfully.";
pub const REFINEMENT_STARTED_MESSAGE: &str = "Refining report with feedback...";
pub const REFINEMENT_SUCCESS_MESSAGE: &str = "Report refined successfully.";

/// Result of a successful refinement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackOutcome {
    pub report: String,
    pub previous_report: String,
    /// The knowledge item created from the feedback, `None` when the same
    /// content was already stored.
    pub knowledge_item: Option<KnowledgeItem>,
    /// Set when the report was refined but the knowledge base could not be
    /// saved.
    pub persistence_warning: Option<PersistenceError>,
}

/// Sequences analysis and feedback over the uploads, knowledge base and
/// model session. Actions take `&mut self`, so at most one is in flight.
pub struct Orchestrator {
    engine: SessionEngine,
    knowledge: KnowledgeStore,
    uploads: UploadSet,
    report: String,
    feedback: String,
    session: Option<AnalysisSession>,
    state: SessionState,
    status: StatusChannel,
}

impl Orchestrator {
    pub fn new(engine: SessionEngine, knowledge: KnowledgeStore) -> Self {
        Self {
            engine,
            knowledge,
            uploads: UploadSet::new(),
            report: String::new(),
            feedback: String::new(),
            session: None,
            state: SessionState::NoSession,
            status: StatusChannel::new(),
        }
    }

    pub fn set_status_listener(&mut self, listener: impl FnMut(&AnalysisStatus) + Send + 'static) {
        self.status.set_listener(listener);
    }

    pub fn set_event_log(&mut self, events: EventLog) {
        self.status.set_event_log(events);
    }

    pub fn engine(&self) -> &SessionEngine {
        &self.engine
    }

    pub fn status(&self) -> &AnalysisStatus {
        self.status.current()
    }

    pub fn report(&self) -> &str {
        &self.report
    }

    pub fn feedback(&self) -> &str {
        &self.feedback
    }

    pub fn set_feedback(&mut self, feedback: impl Into<String>) {
        self.feedback = feedback.into();
    }

    pub fn session(&self) -> Option<&AnalysisSession> {
        self.session.as_ref()
    }

    pub fn session_state(&self) -> SessionState {
        self.state
    }

    pub fn uploads(&self) -> &UploadSet {
        &self.uploads
    }

    pub fn uploads_mut(&mut self) -> &mut UploadSet {
        &mut self.uploads
    }

    pub fn knowledge(&self) -> &KnowledgeStore {
        &self.knowledge
    }

    pub fn knowledge_mut(&mut self) -> &mut KnowledgeStore {
        &mut self.knowledge
    }

    /// Generates a fresh report from the current uploads and knowledge.
    ///
    /// Fails with a validation error before any I/O when no image is
    /// uploaded. Any previous report, session and feedback are discarded
    /// first.
    pub async fn analyze(&mut self) -> Result<String, EngineError> {
        if self.uploads.is_empty() {
            let err = EngineError::Validation(NO_IMAGES_MESSAGE.to_string());
            self.status.publish(AnalysisStatus::Error(err.to_string()));
            return Err(err);
        }

        self.status
            .publish(AnalysisStatus::Loading(ANALYSIS_STARTED_MESSAGE.to_string()));
        self.report.clear();
        self.feedback.clear();
        self.session = None;
        self.state = SessionState::NoSession;

        match self.run_analysis().await {
            Ok((report, session)) => {
                info!(
                    session_id = session.id(),
                    images = self.uploads.len(),
                    "report generated"
                );
                self.log_turn(&session, TurnPhase::Analysis);
                self.report = report.clone();
                self.session = Some(session);
                self.state = SessionState::Active;
                self.status
                    .publish(AnalysisStatus::Success(ANALYSIS_SUCCESS_MESSAGE.to_string()));
                Ok(report)
            }
            Err(err) => {
                self.state = SessionState::Failed;
                self.status.publish(AnalysisStatus::Error(err.to_string()));
                Err(err)
            }
        }
    }

    async fn run_analysis(&mut self) -> Result<(String, AnalysisSession), EngineError> {
        let images = ingest_uploads(self.uploads.entries()).await?;
        let prompt = compile_initial_prompt(&self.knowledge.list());
        let engine = &self.engine;
        let status = &mut self.status;
        engine
            .start(&images, &prompt, |message| {
                status.publish(AnalysisStatus::Loading(message.to_string()))
            })
            .await
    }

    /// Refines the report with the pending feedback text.
    ///
    /// Returns `Ok(None)` without side effects when the feedback is blank or
    /// no session is active. On failure the feedback text is kept so the
    /// caller can retry.
    pub async fn submit_feedback(&mut self) -> Result<Option<FeedbackOutcome>, EngineError> {
        let feedback = self.feedback.clone();
        if feedback.trim().is_empty() || self.state != SessionState::Active {
            return Ok(None);
        }
        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };

        self.status
            .publish(AnalysisStatus::Loading(REFINEMENT_STARTED_MESSAGE.to_string()));
        let prompt = compile_refinement_prompt(&feedback);
        let report = match self.engine.refine(session, &prompt).await {
            Ok(report) => report,
            Err(err) => {
                self.status.publish(AnalysisStatus::Error(format!(
                    "An error occurred while refining the report: {err}"
                )));
                return Err(err);
            }
        };

        let previous_report = std::mem::replace(&mut self.report, report.clone());
        if let Some(session) = self.session.as_ref() {
            self.log_turn(session, TurnPhase::Refinement);
        }

        let (knowledge_item, persistence_warning) = match self.knowledge.add("", &feedback) {
            Ok(item) => (item, None),
            Err(err) => {
                warn!(error = %err, "refined report kept; feedback not saved to knowledge base");
                (None, Some(err))
            }
        };
        self.feedback.clear();
        self.status
            .publish(AnalysisStatus::Success(REFINEMENT_SUCCESS_MESSAGE.to_string()));

        Ok(Some(FeedbackOutcome {
            report,
            previous_report,
            knowledge_item,
            persistence_warning,
        }))
    }

    /// Sets the feedback text and submits it in one step.
    pub async fn submit_feedback_text(
        &mut self,
        feedback: &str,
    ) -> Result<Option<FeedbackOutcome>, EngineError> {
        self.set_feedback(feedback);
        self.submit_feedback().await
    }

    fn log_turn(&self, session: &AnalysisSession, phase: TurnPhase) {
        let Some(events) = self.status.event_log() else {
            return;
        };
        let event = EngineEvent::Turn {
            phase,
            session_id: session.id().to_string(),
            provider: session.provider().to_string(),
            model: session.model().to_string(),
            exchanges: session.exchange_count(),
        };
        if let Err(err) = events.append(&event) {
            let message = format!("{err:#}");
            warn!(error = %message, "failed to append turn event");
        }
    }
}
