use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{bail, Context};
use serde_json::{Map, Value};

/// Key under which the serialized knowledge list is stored.
pub const KNOWLEDGE_BASE_KEY: &str = "xray_feedback_knowledge_base_v2";

/// Persistence port for the knowledge list.
///
/// A slot holds one serialized value. `read` returning `Ok(None)` means the
/// slot has never been written; an `Err` means it exists but could not be
/// read or parsed. `write` always replaces the whole value.
pub trait KnowledgeSlot: Send {
    fn read(&self) -> anyhow::Result<Option<Value>>;
    fn write(&self, value: Value) -> anyhow::Result<()>;
}

/// A JSON object file holding the knowledge list under a fixed key.
///
/// Writes re-read the file and replace only this slot's key, so other keys
/// written by other processes survive.
#[derive(Debug, Clone)]
pub struct JsonFileSlot {
    path: PathBuf,
    key: String,
}

impl JsonFileSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_key(path, KNOWLEDGE_BASE_KEY)
    }

    pub fn with_key(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl KnowledgeSlot for JsonFileSlot {
    fn read(&self) -> anyhow::Result<Option<Value>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed reading {}", self.path.display()))?;
        let parsed: Value = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not valid JSON", self.path.display()))?;
        let Some(object) = parsed.as_object() else {
            bail!("{} does not hold a JSON object", self.path.display());
        };
        Ok(object.get(&self.key).cloned())
    }

    fn write(&self, value: Value) -> anyhow::Result<()> {
        let mut on_disk = read_json_object(&self.path).unwrap_or_default();
        on_disk.insert(self.key.clone(), value);
        write_json_object(&self.path, &on_disk)
    }
}

/// In-process slot, shared between clones. Used by tests and by callers that
/// do not want anything written to disk.
#[derive(Debug, Clone, Default)]
pub struct MemorySlot {
    value: Arc<Mutex<Option<Value>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: Value) -> Self {
        let slot = Self::default();
        *slot.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
        slot
    }

    pub fn snapshot(&self) -> Option<Value> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Makes every following `write` fail until switched back.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl KnowledgeSlot for MemorySlot {
    fn read(&self) -> anyhow::Result<Option<Value>> {
        Ok(self.snapshot())
    }

    fn write(&self, value: Value) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("memory slot rejected write");
        }
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
        Ok(())
    }
}

fn read_json_object(path: &Path) -> Option<Map<String, Value>> {
    let raw = std::fs::read_to_string(path).ok()?;
    let parsed: Value = serde_json::from_str(&raw).ok()?;
    parsed.as_object().cloned()
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(
        path,
        serde_json::to_string_pretty(&Value::Object(payload.clone()))?,
    )
    .with_context(|| format!("failed writing {}", path.display()))?;
    Ok(())
}
