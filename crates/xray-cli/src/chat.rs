use std::io::Write;
use std::path::Path;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use xray_contracts::chat::{help_lines, parse_command, ChatCommand};
use xray_contracts::knowledge::find_template;
use xray_contracts::report::report_diff;
use xray_engine::{FeedbackOutcome, Orchestrator, SessionState};

use crate::{export_report, print_knowledge, print_templates, upload_paths};

const NO_ACTIVE_REPORT_MESSAGE: &str =
    "No active report to refine. Add images and run /analyze first.";

pub(crate) async fn run_chat(mut orchestrator: Orchestrator) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("X-ray report chat started. Type /help for commands.");

    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_command(&line) {
            ChatCommand::Noop => continue,
            ChatCommand::Quit => break,
            ChatCommand::Help => println!("Commands: {}", help_lines().join(" ")),
            ChatCommand::AddImages(paths) => add_images(&mut orchestrator, paths),
            ChatCommand::RemoveImage(name) => {
                if orchestrator.uploads_mut().remove(&name) {
                    println!("Removed {name}");
                } else {
                    println!("No uploaded image named '{name}'");
                }
            }
            ChatCommand::ListImages => {
                let names = orchestrator.uploads().names();
                if names.is_empty() {
                    println!("No images uploaded.");
                }
                for name in names {
                    println!("  {name}");
                }
            }
            ChatCommand::ClearImages => {
                orchestrator.uploads_mut().clear();
                println!("Uploads cleared.");
            }
            ChatCommand::Analyze => match orchestrator.analyze().await {
                Ok(report) => println!("{report}"),
                Err(err) => println!("Analysis failed: {err}"),
            },
            ChatCommand::Feedback(text) => {
                for line in submit_feedback(&mut orchestrator, &text).await {
                    println!("{line}");
                }
            }
            ChatCommand::ShowReport => {
                if orchestrator.report().is_empty() {
                    println!("No report yet. Add images and run /analyze.");
                } else {
                    println!("{}", orchestrator.report());
                }
            }
            ChatCommand::Export(path) => {
                if path.is_empty() {
                    println!("/export requires a path");
                    continue;
                }
                match export_report(Path::new(&path), orchestrator.report()) {
                    Ok(()) => println!("Report written to {path}"),
                    Err(err) => println!("Export failed: {err:#}"),
                }
            }
            ChatCommand::KbList => print_knowledge(&orchestrator.knowledge().list()),
            ChatCommand::KbAdd { name, content } => {
                match orchestrator.knowledge_mut().add(&name, &content) {
                    Ok(Some(item)) => println!("Added {} ({})", item.name, item.id),
                    Ok(None) => println!("Nothing added: content is empty or already stored."),
                    Err(err) => println!("{err}"),
                }
            }
            ChatCommand::KbUpdate { id, name, content } => {
                match orchestrator.knowledge_mut().update(&id, &name, &content) {
                    Ok(true) => println!("Updated {id}"),
                    Ok(false) => println!("No update applied to '{id}'"),
                    Err(err) => println!("{err}"),
                }
            }
            ChatCommand::KbRemove(id) => match orchestrator.knowledge_mut().remove(&id) {
                Ok(true) => println!("Removed {id}"),
                Ok(false) => println!("No knowledge item with id '{id}'"),
                Err(err) => println!("{err}"),
            },
            ChatCommand::KbTemplate(key) => {
                let Some(template) = find_template(&key) else {
                    println!("Unknown template '{key}'. Try /templates.");
                    continue;
                };
                match orchestrator.knowledge_mut().add_template(template) {
                    Ok(Some(item)) => println!("Added {}", item.name),
                    Ok(None) => println!("Template already stored."),
                    Err(err) => println!("{err}"),
                }
            }
            ChatCommand::ListTemplates => print_templates(),
            ChatCommand::ShowStatus => print_status_line(&orchestrator),
            ChatCommand::Unknown { command, .. } => {
                println!("Unknown command: /{command}. Type /help for commands.")
            }
        }
    }
    Ok(())
}

fn add_images(orchestrator: &mut Orchestrator, paths: Vec<String>) {
    if paths.is_empty() {
        println!("/add requires at least one path");
        return;
    }
    let upload = upload_paths(orchestrator, paths);
    println!(
        "Added {} image(s); {} uploaded.",
        upload.added,
        orchestrator.uploads().len()
    );
    if let Some(message) = upload.skipped_message() {
        println!("{message}");
    }
}

async fn submit_feedback(orchestrator: &mut Orchestrator, text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return vec!["Feedback is empty.".to_string()];
    }
    if orchestrator.session_state() != SessionState::Active {
        return vec![NO_ACTIVE_REPORT_MESSAGE.to_string()];
    }
    match orchestrator.submit_feedback_text(text).await {
        Ok(Some(outcome)) => outcome_lines(&outcome),
        Ok(None) => vec!["Nothing to refine.".to_string()],
        Err(err) => vec![format!(
            "An error occurred while refining the report: {err}. Your feedback was kept; \
             resend it to retry."
        )],
    }
}

fn print_status_line(orchestrator: &Orchestrator) {
    let status = orchestrator.status();
    let session = match orchestrator.session_state() {
        SessionState::NoSession => "none",
        SessionState::Active => "active",
        SessionState::Failed => "failed",
    };
    println!(
        "Status: {} {} | images: {} | knowledge items: {} | session: {}",
        status.label(),
        status.message(),
        orchestrator.uploads().len(),
        orchestrator.knowledge().len(),
        session
    );
}

fn outcome_lines(outcome: &FeedbackOutcome) -> Vec<String> {
    let mut lines = report_diff(&outcome.previous_report, &outcome.report);
    lines.push(match (&outcome.knowledge_item, &outcome.persistence_warning) {
        (_, Some(warning)) => format!("Warning: {warning}"),
        (Some(item), None) => format!("Feedback saved to knowledge base as '{}'", item.name),
        (None, None) => "Feedback already in knowledge base.".to_string(),
    });
    lines
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use xray_contracts::knowledge::{KnowledgeItem, KnowledgeStore, MemorySlot, PersistenceError};
    use xray_contracts::uploads::CandidateFile;
    use xray_engine::{DryrunClient, FeedbackOutcome, Orchestrator, SessionEngine};

    use super::{outcome_lines, submit_feedback, NO_ACTIVE_REPORT_MESSAGE};

    fn orchestrator(slot: MemorySlot) -> Orchestrator {
        Orchestrator::new(
            SessionEngine::new(Arc::new(DryrunClient::new())),
            KnowledgeStore::open(slot),
        )
    }

    fn outcome(
        knowledge_item: Option<KnowledgeItem>,
        persistence_warning: Option<PersistenceError>,
    ) -> FeedbackOutcome {
        FeedbackOutcome {
            report: "Impression: fracture.".to_string(),
            previous_report: "Impression: normal.".to_string(),
            knowledge_item,
            persistence_warning,
        }
    }

    #[tokio::test]
    async fn feedback_needs_an_active_report() {
        let slot = MemorySlot::new();
        let mut orchestrator = orchestrator(slot.clone());

        let lines = submit_feedback(&mut orchestrator, "Left rib fracture.").await;
        assert_eq!(lines, vec![NO_ACTIVE_REPORT_MESSAGE.to_string()]);
        assert_eq!(submit_feedback(&mut orchestrator, "   ").await, vec!["Feedback is empty."]);
        assert_eq!(orchestrator.feedback(), "");
        assert_eq!(slot.snapshot(), None);
    }

    #[tokio::test]
    async fn feedback_after_analysis_reports_the_saved_item() -> anyhow::Result<()> {
        let slot = MemorySlot::new();
        let mut orchestrator = orchestrator(slot);
        orchestrator
            .uploads_mut()
            .add_batch(vec![CandidateFile::from_bytes("pa.png", "image/png", vec![1])]);
        orchestrator.analyze().await?;

        let lines = submit_feedback(&mut orchestrator, "Left rib fracture.").await;
        assert_eq!(
            lines.last().map(String::as_str),
            Some("Feedback saved to knowledge base as 'Left rib fracture....'")
        );
        assert!(lines.len() > 1);
        Ok(())
    }

    #[test]
    fn outcome_lines_cover_saved_duplicate_and_warning() {
        let item = KnowledgeItem {
            id: "id-1".to_string(),
            name: "Rib note".to_string(),
            content: "Left rib fracture.".to_string(),
        };
        let saved = outcome_lines(&outcome(Some(item.clone()), None));
        assert!(saved.iter().any(|line| line.starts_with('-') && line.contains("normal")));
        assert!(saved.iter().any(|line| line.starts_with('+') && line.contains("fracture")));
        assert_eq!(
            saved.last().map(String::as_str),
            Some("Feedback saved to knowledge base as 'Rib note'")
        );

        let duplicate = outcome_lines(&outcome(None, None));
        assert_eq!(
            duplicate.last().map(String::as_str),
            Some("Feedback already in knowledge base.")
        );

        let warning = PersistenceError {
            message: "disk full".to_string(),
        };
        let warned = outcome_lines(&outcome(Some(item), Some(warning)));
        assert_eq!(
            warned.last().map(String::as_str),
            Some("Warning: knowledge base could not be saved: disk full")
        );
    }
}
