use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::client::{ContentPart, ModelClient, Turn};
use crate::error::ModelError;

pub const DRYRUN_MODEL: &str = "dryrun-report";

/// Offline client that answers with a deterministic placeholder report.
/// The same history and turn always produce the same text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryrunClient;

impl DryrunClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ModelClient for DryrunClient {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn model(&self) -> &str {
        DRYRUN_MODEL
    }

    async fn send_turn(&self, history: &[Turn], turn: &Turn) -> Result<String, ModelError> {
        let id = short_id(history, turn);
        let images = turn
            .parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Image(image) => Some(image.name.as_str()),
                ContentPart::Text(_) => None,
            })
            .collect::<Vec<_>>();

        if !images.is_empty() {
            return Ok(format!(
                "Examination: {count} image(s) reviewed ({names}). Dry run {id}.\n\
                 Findings: No model was called; this is a placeholder report.\n\
                 Impression: Not assessed.\n\
                 Recommendations: Re-run with a live provider for a real read.",
                count = images.len(),
                names = images.join(", "),
            ));
        }

        let revision = history.len() / 2;
        Ok(format!(
            "Examination: unchanged. Dry run {id}.\n\
             Findings: Revision {revision} incorporates the radiologist feedback.\n\
             Impression: Not assessed.\n\
             Recommendations: Re-run with a live provider for a real read."
        ))
    }
}

fn short_id(history: &[Turn], turn: &Turn) -> String {
    let mut hasher = Sha256::new();
    hasher.update((history.len() as u64).to_be_bytes());
    for part in &turn.parts {
        match part {
            ContentPart::Text(text) => hasher.update(text.as_bytes()),
            ContentPart::Image(image) => hasher.update(image.data.as_bytes()),
        }
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..4])
}
