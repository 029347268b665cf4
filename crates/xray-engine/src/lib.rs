//! Report generation and refinement over a remote multimodal model.
//!
//! The [`Orchestrator`] owns the upload set, the knowledge store and the
//! model session. [`SessionEngine`] runs the initial multi-image call with
//! bounded exponential backoff and the text-only refinement turns.

pub mod client;
pub mod config;
pub mod dryrun;
pub mod error;
pub mod gemini;
pub mod ingest;
pub mod orchestrator;
pub mod registry;
pub mod session;

pub use client::{AnalysisSession, ContentPart, ModelClient, Role, Turn};
pub use config::{request_timeout, GeminiConfig, DEFAULT_API_BASE, DEFAULT_MODEL};
pub use dryrun::{DryrunClient, DRYRUN_MODEL};
pub use error::{EngineError, ErrorKind, IngestError, ModelError, SERVICE_OVERLOADED_MESSAGE};
pub use gemini::GeminiClient;
pub use ingest::{encode_upload, ingest_uploads, EncodedImage};
pub use orchestrator::{FeedbackOutcome, Orchestrator};
pub use registry::{default_client_registry, ModelClientRegistry};
pub use session::{retry_status_message, RetryPolicy, SessionEngine, SessionState};
