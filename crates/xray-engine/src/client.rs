use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ModelError;
use crate::ingest::EncodedImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentPart {
    Text(String),
    Image(EncodedImage),
}

/// One side of an exchange: the parts sent by the user or the model's reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

impl Turn {
    pub fn user(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![ContentPart::Text(text.into())])
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![ContentPart::Text(text.into())],
        }
    }

    /// Text parts joined by newlines.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text(text) => Some(text.as_str()),
                ContentPart::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn image_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|part| matches!(part, ContentPart::Image(_)))
            .count()
    }
}

/// Handle to one multi-turn conversation.
///
/// Holds the append-only log of completed exchanges, which is what clients
/// replay to continue the conversation. Only successful turns are recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisSession {
    id: String,
    provider: String,
    model: String,
    turns: Vec<Turn>,
}

impl AnalysisSession {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            provider: provider.into(),
            model: model.into(),
            turns: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of completed request/response exchanges.
    pub fn exchange_count(&self) -> usize {
        self.turns.len() / 2
    }

    pub(crate) fn record_exchange(&mut self, request: Turn, reply: &str) {
        self.turns.push(request);
        self.turns.push(Turn::model(reply));
    }
}

/// Remote conversational model.
///
/// `send_turn` receives the history of completed turns and the new user turn
/// and returns the model's text. It must not assume the history is stored
/// server-side.
#[async_trait]
pub trait ModelClient: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    fn create_session(&self) -> AnalysisSession {
        AnalysisSession::new(self.name(), self.model())
    }

    async fn send_turn(&self, history: &[Turn], turn: &Turn) -> Result<String, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::{AnalysisSession, ContentPart, Role, Turn};
    use crate::ingest::EncodedImage;

    #[test]
    fn turn_text_skips_images() {
        let turn = Turn::user(vec![
            ContentPart::Image(EncodedImage {
                name: "pa.png".into(),
                mime_type: "image/png".into(),
                data: "AQID".into(),
            }),
            ContentPart::Text("describe".into()),
        ]);
        assert_eq!(turn.text(), "describe");
        assert_eq!(turn.image_count(), 1);
        assert_eq!(turn.role, Role::User);
    }

    #[test]
    fn session_records_exchanges_in_pairs() {
        let mut session = AnalysisSession::new("dryrun", "dryrun-report");
        assert_eq!(session.exchange_count(), 0);
        session.record_exchange(Turn::user_text("first"), "report v1");
        session.record_exchange(Turn::user_text("second"), "report v2");

        assert_eq!(session.exchange_count(), 2);
        assert_eq!(session.turns()[1], Turn::model("report v1"));
        assert_eq!(session.turns()[3].text(), "report v2");
        assert_eq!(session.provider(), "dryrun");
        assert!(!session.id().is_empty());
    }
}
