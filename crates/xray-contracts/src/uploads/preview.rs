use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use sha2::{Digest, Sha256};

/// Issues display handles for uploaded images and tracks which are live.
///
/// Clones share the same set of live handles.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    live: Arc<Mutex<BTreeSet<String>>>,
    issued: Arc<AtomicU64>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, file_name: &str) -> PreviewHandle {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst);
        let id = preview_id(file_name, seq);
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone());
        PreviewHandle {
            id,
            registry: self.clone(),
            released: false,
        }
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_live(&self, id: &str) -> bool {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    fn revoke(&self, id: &str) {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }
}

/// A live preview handle. Released exactly once, either explicitly through
/// [`PreviewHandle::release`] or when dropped.
#[derive(Debug)]
pub struct PreviewHandle {
    id: String,
    registry: PreviewRegistry,
    released: bool,
}

impl PreviewHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn release(mut self) {
        self.revoke();
    }

    fn revoke(&mut self) {
        if self.released {
            return;
        }
        self.registry.revoke(&self.id);
        self.released = true;
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.revoke();
    }
}

fn preview_id(file_name: &str, seq: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_name.as_bytes());
    hasher.update(seq.to_be_bytes());
    let digest = hasher.finalize();
    format!("preview:{}", hex::encode(&digest[..6]))
}
