use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

/// Which exchange of a session a turn event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Analysis,
    Refinement,
}

/// Records appended to the event log, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    Status {
        status: String,
        message: String,
    },
    Turn {
        phase: TurnPhase,
        session_id: String,
        provider: String,
        model: String,
        exchanges: usize,
    },
}

#[derive(Serialize)]
struct Envelope<'a> {
    run_id: &'a str,
    ts: String,
    #[serde(flatten)]
    event: &'a EngineEvent,
}

/// Append-only JSONL log shared between clones. Every line carries the
/// `run_id` and a UTC timestamp next to the event fields.
#[derive(Debug, Clone)]
pub struct EventLog {
    inner: Arc<EventLogInner>,
}

#[derive(Debug)]
struct EventLogInner {
    path: PathBuf,
    run_id: String,
    lock: Mutex<()>,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventLogInner {
                path: path.into(),
                run_id: run_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn run_id(&self) -> &str {
        &self.inner.run_id
    }

    pub fn append(&self, event: &EngineEvent) -> anyhow::Result<()> {
        let line = serde_json::to_string(&Envelope {
            run_id: &self.inner.run_id,
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            event,
        })?;

        let path = &self.inner.path;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let _guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed opening {}", path.display()))?;
        writeln!(file, "{line}").with_context(|| format!("failed writing {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use serde_json::{json, Value};

    use super::{EngineEvent, EventLog, TurnPhase};

    fn read_lines(path: &std::path::Path) -> anyhow::Result<Vec<Value>> {
        std::fs::read_to_string(path)?
            .lines()
            .map(|line| Ok(serde_json::from_str(line)?))
            .collect()
    }

    #[test]
    fn status_event_is_one_tagged_line() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("logs").join("events.jsonl");
        let log = EventLog::new(&path, "run-123");

        log.append(&EngineEvent::Status {
            status: "loading".into(),
            message: "Starting analysis...".into(),
        })?;

        let lines = read_lines(&path)?;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["type"], json!("status"));
        assert_eq!(lines[0]["run_id"], json!("run-123"));
        assert_eq!(lines[0]["message"], json!("Starting analysis..."));
        DateTime::parse_from_rfc3339(lines[0]["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[test]
    fn clones_append_to_the_same_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let log = EventLog::new(&path, "run-1");
        let other = log.clone();

        log.append(&EngineEvent::Turn {
            phase: TurnPhase::Analysis,
            session_id: "s-1".into(),
            provider: "dryrun".into(),
            model: "dryrun-report".into(),
            exchanges: 1,
        })?;
        other.append(&EngineEvent::Turn {
            phase: TurnPhase::Refinement,
            session_id: "s-1".into(),
            provider: "dryrun".into(),
            model: "dryrun-report".into(),
            exchanges: 2,
        })?;

        let lines = read_lines(&path)?;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["phase"], json!("analysis"));
        assert_eq!(lines[1]["phase"], json!("refinement"));
        assert_eq!(lines[1]["exchanges"], json!(2));
        Ok(())
    }
}
