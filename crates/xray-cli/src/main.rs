mod chat;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use xray_contracts::events::EventLog;
use xray_contracts::knowledge::{
    find_template, JsonFileSlot, KnowledgeItem, KnowledgeStore, KNOWLEDGE_TEMPLATES,
};
use xray_contracts::report::write_report_export;
use xray_contracts::status::AnalysisStatus;
use xray_contracts::uploads::CandidateFile;
use xray_engine::{
    default_client_registry, GeminiConfig, ModelClient, Orchestrator, SessionEngine,
};

#[derive(Debug, Parser)]
#[command(
    name = "xray-rs",
    version,
    about = "X-ray report generation with radiologist feedback"
)]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct EngineArgs {
    /// Model provider: `gemini` or `dryrun`.
    #[arg(long, global = true, default_value = "gemini")]
    provider: String,
    /// Overrides XRAY_MODEL.
    #[arg(long, global = true)]
    model: Option<String>,
    /// Knowledge base file (defaults to the user data directory).
    #[arg(long, global = true)]
    knowledge: Option<PathBuf>,
    /// Append status and turn events to this JSONL file.
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    /// Per-request timeout in seconds, clamped to 15..=300.
    #[arg(long, global = true)]
    request_timeout: Option<f64>,
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a report for the given images, optionally refining it.
    Analyze(AnalyzeArgs),
    /// Interactive session with slash commands.
    Chat,
    /// Manage the expert knowledge base.
    Knowledge {
        #[command(subcommand)]
        action: KnowledgeCommand,
    },
}

#[derive(Debug, Args)]
struct AnalyzeArgs {
    #[arg(long = "image", required = true)]
    images: Vec<PathBuf>,
    /// Feedback rounds applied in order after the initial report.
    #[arg(long)]
    feedback: Vec<String>,
    /// Write the final report as a plain-text export.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum KnowledgeCommand {
    List {
        #[arg(long)]
        json: bool,
    },
    Add {
        #[arg(long, default_value = "")]
        name: String,
        content: String,
    },
    Update {
        id: String,
        #[arg(long, default_value = "")]
        name: String,
        content: String,
    },
    Remove {
        id: String,
    },
    /// Add a built-in template by key.
    Template {
        key: String,
    },
    /// List the built-in templates.
    Templates,
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("xray-rs error: {err:#}");
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.engine.verbose);
    match cli.command {
        Command::Analyze(args) => run_analyze(&cli.engine, args).await,
        Command::Chat => {
            let orchestrator = build_orchestrator(&cli.engine)?;
            chat::run_chat(orchestrator).await?;
            Ok(0)
        }
        Command::Knowledge { action } => run_knowledge(&cli.engine, action),
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn default_knowledge_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().context("no user data directory; pass --knowledge")?;
    Ok(data_dir.join("xray-report").join("knowledge.json"))
}

fn open_knowledge(args: &EngineArgs) -> Result<KnowledgeStore> {
    let path = match args.knowledge.clone() {
        Some(path) => path,
        None => default_knowledge_path()?,
    };
    Ok(KnowledgeStore::open(JsonFileSlot::new(path)))
}

fn build_client(args: &EngineArgs) -> Result<Arc<dyn ModelClient>> {
    let mut config = GeminiConfig::from_env().with_request_timeout(args.request_timeout);
    if let Some(model) = args.model.as_deref() {
        config = config.with_model(model);
    }
    let registry = default_client_registry(config)?;
    registry.get(&args.provider).with_context(|| {
        format!(
            "unknown provider '{}' (available: {})",
            args.provider,
            registry.names().join(", ")
        )
    })
}

fn build_orchestrator(args: &EngineArgs) -> Result<Orchestrator> {
    let client = build_client(args)?;
    debug!(provider = client.name(), model = client.model(), "model client selected");
    let engine = SessionEngine::new(client);
    let mut orchestrator = Orchestrator::new(engine, open_knowledge(args)?);
    if let Some(path) = args.events.as_ref() {
        orchestrator.set_event_log(EventLog::new(path, Uuid::new_v4().to_string()));
    }
    orchestrator.set_status_listener(print_status);
    Ok(orchestrator)
}

fn print_status(status: &AnalysisStatus) {
    if status.is_loading() {
        eprintln!("… {}", status.message());
    }
}

async fn run_analyze(engine_args: &EngineArgs, args: AnalyzeArgs) -> Result<i32> {
    let mut orchestrator = build_orchestrator(engine_args)?;
    let upload = upload_paths(&mut orchestrator, args.images.clone());
    if let Some(message) = upload.skipped_message() {
        eprintln!("{message}");
    }

    orchestrator.analyze().await?;
    for feedback in &args.feedback {
        let Some(outcome) = orchestrator.submit_feedback_text(feedback).await? else {
            eprintln!("Skipped empty feedback.");
            continue;
        };
        if let Some(warning) = outcome.persistence_warning {
            eprintln!("Warning: {warning}");
        }
    }

    println!("{}", orchestrator.report());
    if let Some(out) = args.out.as_deref() {
        export_report(out, orchestrator.report())?;
        eprintln!("Report written to {}", out.display());
    }
    Ok(0)
}

/// Counts from offering a batch of paths to the upload set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UploadCount {
    pub added: usize,
    pub skipped: usize,
}

impl UploadCount {
    pub(crate) fn skipped_message(&self) -> Option<String> {
        (self.skipped > 0).then(|| {
            format!(
                "Skipped {} file(s) that are not images or repeat a file name.",
                self.skipped
            )
        })
    }
}

pub(crate) fn upload_paths<P: Into<PathBuf>>(
    orchestrator: &mut Orchestrator,
    paths: Vec<P>,
) -> UploadCount {
    let requested = paths.len();
    let added = orchestrator
        .uploads_mut()
        .add_batch(paths.into_iter().map(CandidateFile::from_path).collect());
    UploadCount {
        added,
        skipped: requested - added,
    }
}

fn run_knowledge(args: &EngineArgs, action: KnowledgeCommand) -> Result<i32> {
    let mut store = open_knowledge(args)?;
    match action {
        KnowledgeCommand::List { json } => {
            let items = store.list();
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                print_knowledge(&items);
            }
        }
        KnowledgeCommand::Add { name, content } => match store.add(&name, &content)? {
            Some(item) => println!("Added {} ({})", item.name, item.id),
            None => println!("Nothing added: content is empty or already stored."),
        },
        KnowledgeCommand::Update { id, name, content } => {
            if !store.update(&id, &name, &content)? {
                bail!("no update applied to '{id}' (unknown id, empty or duplicate content)");
            }
            println!("Updated {id}");
        }
        KnowledgeCommand::Remove { id } => {
            if !store.remove(&id)? {
                bail!("no knowledge item with id '{id}'");
            }
            println!("Removed {id}");
        }
        KnowledgeCommand::Template { key } => {
            let template = find_template(&key).with_context(|| {
                format!("unknown template '{key}'; run `knowledge templates`")
            })?;
            match store.add_template(template)? {
                Some(item) => println!("Added {} ({})", item.name, item.id),
                None => println!("Template already stored."),
            }
        }
        KnowledgeCommand::Templates => print_templates(),
    }
    Ok(0)
}

pub(crate) fn print_knowledge(items: &[KnowledgeItem]) {
    if items.is_empty() {
        println!("Knowledge base is empty.");
        return;
    }
    for item in items {
        println!("{}  {}", item.id, item.name);
        for line in item.content.lines() {
            println!("    {line}");
        }
    }
}

pub(crate) fn print_templates() {
    for template in KNOWLEDGE_TEMPLATES {
        println!("{}  {}", template.key, template.name);
    }
}

pub(crate) fn export_report(path: &Path, report: &str) -> Result<()> {
    write_report_export(path, report)
        .with_context(|| format!("export to {} failed", path.display()))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use xray_contracts::knowledge::{JsonFileSlot, KnowledgeStore};
    use xray_engine::ModelClient;

    use super::{
        build_client, build_orchestrator, run_knowledge, upload_paths, EngineArgs,
        KnowledgeCommand,
    };

    fn engine_args(provider: &str, knowledge: PathBuf) -> EngineArgs {
        EngineArgs {
            provider: provider.to_string(),
            model: None,
            knowledge: Some(knowledge),
            events: None,
            request_timeout: None,
            verbose: false,
        }
    }

    #[test]
    fn unknown_provider_lists_available_clients() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let args = engine_args("openai", temp.path().join("knowledge.json"));
        let message = build_client(&args)
            .err()
            .map(|err| format!("{err:#}"))
            .unwrap_or_default();
        assert!(message.contains("unknown provider 'openai'"));
        assert!(message.contains("available: dryrun, gemini"));
        Ok(())
    }

    #[test]
    fn model_flag_overrides_default_model() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut args = engine_args("gemini", temp.path().join("knowledge.json"));
        args.model = Some("gemini-test-model".to_string());
        let client = build_client(&args)?;
        assert_eq!(client.name(), "gemini");
        assert_eq!(client.model(), "gemini-test-model");
        Ok(())
    }

    #[tokio::test]
    async fn dryrun_analysis_counts_skipped_paths_and_logs_events() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let scan = temp.path().join("chest.png");
        std::fs::write(&scan, [1, 2, 3])?;
        let notes = temp.path().join("notes.txt");
        std::fs::write(&notes, "not an image")?;
        let events = temp.path().join("events.jsonl");

        let mut args = engine_args("dryrun", temp.path().join("knowledge.json"));
        args.events = Some(events.clone());
        let mut orchestrator = build_orchestrator(&args)?;

        let upload = upload_paths(&mut orchestrator, vec![scan.clone(), notes, scan]);
        assert_eq!(upload.added, 1);
        assert_eq!(upload.skipped, 2);
        assert_eq!(
            upload.skipped_message().as_deref(),
            Some("Skipped 2 file(s) that are not images or repeat a file name.")
        );

        let report = orchestrator.analyze().await?;
        assert!(report.contains("1 image(s) reviewed (chest.png)"));
        let logged = std::fs::read_to_string(&events)?;
        assert!(logged.lines().any(|line| line.contains("\"type\":\"turn\"")));
        Ok(())
    }

    #[test]
    fn upload_without_skips_has_no_message() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let args = engine_args("dryrun", temp.path().join("knowledge.json"));
        let mut orchestrator = build_orchestrator(&args)?;
        let upload = upload_paths(&mut orchestrator, vec!["a.png", "b.jpg"]);
        assert_eq!(upload.added, 2);
        assert_eq!(upload.skipped_message(), None);
        Ok(())
    }

    #[test]
    fn knowledge_commands_persist_to_the_given_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("kb").join("knowledge.json");
        let args = engine_args("dryrun", path.clone());

        run_knowledge(
            &args,
            KnowledgeCommand::Add {
                name: "Ribs".to_string(),
                content: "Count ribs on both sides.".to_string(),
            },
        )?;
        run_knowledge(
            &args,
            KnowledgeCommand::Template {
                key: "multiple_myeloma".to_string(),
            },
        )?;

        let store = KnowledgeStore::open(JsonFileSlot::new(&path));
        assert_eq!(store.len(), 2);
        let ribs = store
            .list()
            .into_iter()
            .find(|item| item.name == "Ribs")
            .unwrap_or_else(|| panic!("added item missing"));

        run_knowledge(
            &args,
            KnowledgeCommand::Update {
                id: ribs.id.clone(),
                name: String::new(),
                content: "Count ribs from the top.".to_string(),
            },
        )?;
        let store = KnowledgeStore::open(JsonFileSlot::new(&path));
        assert_eq!(
            store.get(&ribs.id).map(|item| item.content.as_str()),
            Some("Count ribs from the top.")
        );

        run_knowledge(&args, KnowledgeCommand::Remove { id: ribs.id })?;
        assert_eq!(KnowledgeStore::open(JsonFileSlot::new(&path)).len(), 1);
        Ok(())
    }

    #[test]
    fn knowledge_errors_name_the_missing_target() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let args = engine_args("dryrun", temp.path().join("knowledge.json"));

        let removed = run_knowledge(
            &args,
            KnowledgeCommand::Remove {
                id: "missing".to_string(),
            },
        );
        let message = removed.err().map(|err| format!("{err:#}")).unwrap_or_default();
        assert!(message.contains("no knowledge item with id 'missing'"));

        let template = run_knowledge(
            &args,
            KnowledgeCommand::Template {
                key: "nope".to_string(),
            },
        );
        let message = template.err().map(|err| format!("{err:#}")).unwrap_or_default();
        assert!(message.contains("unknown template 'nope'"));
        Ok(())
    }
}
