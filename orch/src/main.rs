//! orch — CLI entry point.
//!
//! Entity CRUD and the interactive REPL run against a real
//! `statestore::StateManager` at the configured storage path. `run` and
//! `execute` additionally need an implementer agent and a validator model;
//! those transports are registered by an embedding application (the registry
//! ships empty here, so an unregistered `agent.type`/`model.type` surfaces
//! as a configuration error).

use std::collections::HashMap;
use std::io::BufRead;
use std::path::PathBuf;

use clap::Parser;
use eyre::{Context, Result};
use serde_json::json;
use tracing::{debug, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use orch::cli::{Cli, Command, EntityCommand, OutputFormat};
use orch::config::Config;
use orch::error::OrchError;
use orch::events::{create_event_bus, spawn_event_logger, ProductionLog, ProductionRecordType};
use orch::nl::{execute, ExecutionOutcome, NlPipeline, NlPipelineConfig};
use orch::orchestrator::{CancellationToken, Orchestrator, OrchestratorConfig, TaskStatus};
use orch::ports::PortRegistry;
use orch::repl::{parse_line, prompt_indicator, ReplInput, SlashCommand};
use orch::turn_budget::{TurnBudgetBounds, TurnBudgeter};
use orch::validation::{DecisionThresholds, ValidationConfig};
use statestore::{generate_id, Priority, StateManager, WorkItem, WorkItemKind, WorkItemStatus};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            let code = err.downcast_ref::<OrchError>().map(OrchError::exit_code).unwrap_or(1);
            std::process::ExitCode::from(code as u8)
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("failed to load configuration")?;
    setup_logging(cli.log_level.as_deref())?;

    let mut production = ProductionLog::open(&config.monitoring.production_logging).context("failed to open production log")?;
    if let Some(log) = production.as_mut() {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut fields = serde_json::Map::new();
        fields.insert("text".to_string(), json!(args.join(" ")));
        let _ = log.log(ProductionRecordType::UserInput, fields);
    }

    // Embedding applications register concrete transports here before
    // dispatch; this binary ships none of its own.
    let registry = PortRegistry::new();

    debug!(command = ?cli.command, "main: dispatching command");
    let outcome = match cli.command {
        Some(Command::Project { command }) => cmd_entity(&config, &registry, None, command).await,
        Some(Command::Epic { command }) => cmd_entity(&config, &registry, Some(WorkItemKind::Epic), command).await,
        Some(Command::Story { command }) => cmd_entity(&config, &registry, Some(WorkItemKind::Story), command).await,
        Some(Command::Task { command }) => cmd_entity(&config, &registry, Some(WorkItemKind::Task), command).await,
        Some(Command::Subtask { command }) => cmd_entity(&config, &registry, Some(WorkItemKind::Subtask), command).await,
        Some(Command::Milestone { command }) => cmd_entity(&config, &registry, Some(WorkItemKind::Milestone), command).await,
        Some(Command::Interactive) => cmd_interactive(&config, production.as_mut()).await,
        Some(Command::Run { task_id, max_iterations }) => cmd_run(&config, &registry, &task_id, max_iterations).await,
        None => {
            println!("orch: supervised code-agent orchestrator. Try `orch --help`.");
            Ok(())
        }
    };

    if let Some(log) = production.as_mut() {
        let mut fields = serde_json::Map::new();
        match &outcome {
            Ok(()) => {
                fields.insert("status".to_string(), json!("ok"));
                let _ = log.log(ProductionRecordType::ExecutionResult, fields);
            }
            Err(err) => {
                fields.insert("message".to_string(), json!(format!("{err:#}")));
                let _ = log.log(ProductionRecordType::Error, fields);
            }
        }
    }

    outcome
}

fn setup_logging(cli_log_level: Option<&str>) -> Result<()> {
    let filter = cli_log_level
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_filter(filter))
        .init();
    Ok(())
}

async fn open_store(config: &Config) -> Result<StateManager> {
    let store_path = config.storage.resolve_path();
    if let Some(parent) = store_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context("failed to create storage directory")?;
    }
    let (store, report) = StateManager::spawn(store_path).await.map_err(OrchError::from)?;
    if !report.orphaned_sessions.is_empty() {
        warn!(count = report.orphaned_sessions.len(), "orphaned sessions found at startup; breakpoints opened for each");
    }
    Ok(store)
}

async fn cmd_entity(config: &Config, registry: &PortRegistry, kind: Option<WorkItemKind>, command: EntityCommand) -> Result<()> {
    let store = open_store(config).await?;
    let result = match kind {
        None => project_command(&store, command).await,
        Some(kind) => work_item_command(config, registry, &store, kind, command).await,
    };
    store.shutdown().await;
    result
}

async fn project_command(store: &StateManager, command: EntityCommand) -> Result<()> {
    match command {
        EntityCommand::Create { title, workdir, .. } => {
            let workdir = match workdir {
                Some(dir) => dir,
                None => std::env::current_dir().context("failed to resolve current directory")?,
            };
            let project = store.create_project(&title, &workdir.display().to_string()).await.map_err(OrchError::from)?;
            println!("created project '{}' ({})", project.name, project.id);
        }
        EntityCommand::List { format, .. } => {
            let projects = store.list_projects(false).await.map_err(OrchError::from)?;
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&projects)?);
            } else {
                for project in projects {
                    println!("{}  {}  {:?}", project.id, project.name, project.status);
                }
            }
        }
        EntityCommand::Show { id, format } => {
            let project = store.get_project(&id).await.map_err(OrchError::from)?;
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&project)?);
            } else {
                println!("{}  {}  {:?}  ({})", project.id, project.name, project.status, project.working_directory);
            }
        }
        EntityCommand::Update { id, title, status, .. } => {
            let mut updates: HashMap<String, serde_json::Value> = HashMap::new();
            if let Some(title) = title {
                updates.insert("name".to_string(), json!(title));
            }
            if let Some(status) = status {
                updates.insert("status".to_string(), json!(status.to_uppercase()));
            }
            let project = store.update_project(&id, updates).await.map_err(OrchError::from)?;
            println!("updated project '{}' ({})", project.name, project.id);
        }
        EntityCommand::Delete { id, hard } => {
            if hard {
                return Err(OrchError::UserError("projects are soft-delete only".to_string()).into());
            }
            store.soft_delete_project(&id).await.map_err(OrchError::from)?;
            println!("deleted project {id}");
        }
        EntityCommand::Execute { .. } => {
            return Err(OrchError::UserError("projects cannot be executed; run a task id instead".to_string()).into());
        }
    }
    Ok(())
}

async fn work_item_command(
    config: &Config,
    registry: &PortRegistry,
    store: &StateManager,
    kind: WorkItemKind,
    command: EntityCommand,
) -> Result<()> {
    match command {
        EntityCommand::Create { title, project, description, priority, .. } => {
            let project_id = project.ok_or_else(|| OrchError::UserError(format!("--project is required to create a {kind:?}")))?;
            let now = chrono::Utc::now().timestamp_millis();
            let item = WorkItem {
                id: generate_id(),
                project_id,
                kind,
                title,
                description: description.unwrap_or_default(),
                priority: parse_priority(priority)?,
                status: WorkItemStatus::Pending,
                parent_id: None,
                dependencies: vec![],
                required_epics: vec![],
                is_deleted: false,
                created_at: now,
                updated_at: now,
            };
            let created = store.create_work_item(item).await.map_err(OrchError::from)?;
            println!("created {kind:?} '{}' ({})", created.title, created.id);
        }
        EntityCommand::List { project, format } => {
            let project_id = project.ok_or_else(|| OrchError::UserError("--project is required to list work items".to_string()))?;
            let items = store.list_work_items(&project_id, kind, false).await.map_err(OrchError::from)?;
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                for item in items {
                    println!("{}  {}  {:?}", item.id, item.title, item.status);
                }
            }
        }
        EntityCommand::Show { id, format } => {
            let item = store.get_work_item(&id).await.map_err(OrchError::from)?;
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&item)?);
            } else {
                println!("{}  {}  {:?}  priority={}", item.id, item.title, item.status, item.priority.0);
            }
        }
        EntityCommand::Update { id, title, description, status, priority } => {
            let mut updates: HashMap<String, serde_json::Value> = HashMap::new();
            if let Some(title) = title {
                updates.insert("title".to_string(), json!(title));
            }
            if let Some(description) = description {
                updates.insert("description".to_string(), json!(description));
            }
            if let Some(status) = status {
                let status = WorkItemStatus::parse(&status.to_uppercase())
                    .ok_or_else(|| OrchError::UserError(format!("unrecognized status '{status}'")))?;
                updates.insert("status".to_string(), json!(status.as_str()));
            }
            if let Some(priority) = priority {
                updates.insert("priority".to_string(), json!(parse_priority(Some(priority))?.0));
            }
            let item = store.update_work_item(&id, updates).await.map_err(OrchError::from)?;
            println!("updated {kind:?} '{}' ({})", item.title, item.id);
        }
        EntityCommand::Delete { id, hard } => {
            store.delete_work_item(&id, !hard).await.map_err(OrchError::from)?;
            println!("deleted {kind:?} {id}");
        }
        EntityCommand::Execute { id, max_iterations } => {
            run_task(config, registry, store, &id, max_iterations).await?;
        }
    }
    Ok(())
}

fn parse_priority(word: Option<String>) -> std::result::Result<Priority, OrchError> {
    match word {
        None => Ok(Priority::MEDIUM),
        Some(word) => Priority::from_word(&word)
            .or_else(|| word.parse::<u8>().ok().map(Priority::clamped))
            .ok_or_else(|| OrchError::UserError(format!("unrecognized priority '{word}' (expected high/medium/low or 1-10)"))),
    }
}

async fn cmd_run(config: &Config, registry: &PortRegistry, task_id: &str, max_iterations: Option<u32>) -> Result<()> {
    let store = open_store(config).await?;
    let result = run_task(config, registry, &store, task_id, max_iterations).await;
    store.shutdown().await;
    result
}

async fn run_task(
    config: &Config,
    registry: &PortRegistry,
    store: &StateManager,
    task_id: &str,
    max_iterations: Option<u32>,
) -> Result<()> {
    let agent = registry.agent(&config.agent.agent_type)?;
    let model = registry.model(&config.model.model_type)?;

    let task = store.get_work_item(task_id).await.map_err(OrchError::from)?;
    let project = store.get_project(&task.project_id).await.map_err(OrchError::from)?;

    let bus = create_event_bus();
    let _logger = spawn_event_logger(bus.clone())?;

    let mt = &config.orchestration.max_turns;
    let orchestrator = Orchestrator::new(
        store,
        agent.as_ref(),
        model.as_ref(),
        TurnBudgeter::new(TurnBudgetBounds { min_turns: mt.min, max_turns: mt.max, default_turns: mt.default }),
        ValidationConfig {
            thresholds: DecisionThresholds {
                quality_floor: config.validation.quality_floor,
                quality_target: config.validation.quality_target,
                confidence_floor: config.validation.confidence_floor,
                confidence_target: config.validation.confidence_target,
            },
            breakpoint_confidence_threshold: config.validation.breakpoint_confidence_threshold,
            breakpoint_quality_floor: 20,
        },
        bus.emitter_for(task_id.to_string()),
        OrchestratorConfig {
            max_iterations: max_iterations.unwrap_or(config.orchestration.max_iterations),
            max_retries: mt.max_retries,
            retry_multiplier: mt.retry_multiplier,
            working_directory: PathBuf::from(&project.working_directory),
            context_window: config.model.context_window,
        },
    );

    let result = orchestrator.execute_task(task_id, &CancellationToken::new()).await?;
    println!("task {task_id}: {:?} after {} iteration(s)", result.status, result.iterations);

    match result.status {
        TaskStatus::Completed | TaskStatus::Blocked | TaskStatus::Cancelled => Ok(()),
        TaskStatus::Paused | TaskStatus::WaitingUser | TaskStatus::Escalated => Err(OrchError::Escalation {
            reason: format!("task ended {:?}; resolve the breakpoint or clarification before re-running", result.status),
        }
        .into()),
        TaskStatus::Failed => Err(eyre::eyre!("task {task_id} failed")),
    }
}

async fn cmd_interactive(config: &Config, mut production: Option<&mut ProductionLog>) -> Result<()> {
    let store = open_store(config).await?;

    let projects = store.list_projects(false).await.map_err(OrchError::from)?;
    let Some(project) = projects.into_iter().next() else {
        store.shutdown().await;
        return Err(OrchError::UserError("no projects exist yet; create one with `orch project create <name>`".to_string()).into());
    };

    let mut nl = NlPipeline::new(NlPipelineConfig {
        confidence_threshold: config.nl.confidence_threshold,
        confirmation_timeout_secs: config.nl.confirmation_timeout,
        bulk_require_confirmation: config.nl.bulk_require_confirmation,
    });

    println!("orch interactive — natural language, or /help for commands. /stop exits.");
    let stdin = std::io::stdin();
    loop {
        use std::io::Write;
        print!("{}", prompt_indicator(&project.name));
        std::io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).context("failed to read input")? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_line(line) {
            ReplInput::Slash(SlashCommand::Help) => {
                println!("slash commands: /help /status /pause /resume /stop /send-to-implementer <text> /override-decision <proceed|retry|clarify|escalate>");
                println!("anything else is natural language (create/list/update/delete projects, epics, stories, tasks, subtasks, milestones)");
            }
            ReplInput::Slash(SlashCommand::Status) => {
                let tasks = store.list_work_items(&project.id, WorkItemKind::Task, false).await.map_err(OrchError::from)?;
                println!("project '{}': {} task(s), no orchestrator run active", project.name, tasks.len());
            }
            ReplInput::Slash(SlashCommand::Stop) => {
                println!("stopping.");
                break;
            }
            ReplInput::Slash(SlashCommand::Pause) | ReplInput::Slash(SlashCommand::Resume) => {
                println!("no orchestrator run is active in this session");
            }
            ReplInput::Slash(SlashCommand::SendToImplementer(_)) => {
                println!("no implementer session is active; start one with `orch run <task-id>`");
            }
            ReplInput::Slash(SlashCommand::OverrideDecision(_)) => {
                println!("no pending decision to override");
            }
            ReplInput::UnknownSlash { input, available } => {
                eprintln!("unknown command '{input}'; available: {}", available.join(", "));
            }
            ReplInput::NaturalLanguage(text) => {
                if let Some(log) = production.as_deref_mut() {
                    let mut fields = serde_json::Map::new();
                    fields.insert("text".to_string(), json!(text));
                    let _ = log.log(ProductionRecordType::UserInput, fields);
                }

                let outcome = nl.process(&text, &project.id, chrono::Utc::now().timestamp());
                if let Some(log) = production.as_deref_mut() {
                    let mut fields = serde_json::Map::new();
                    fields.insert("intent".to_string(), json!(format!("{:?}", outcome.intent)));
                    fields.insert("confidence".to_string(), json!(outcome.confidence));
                    fields.insert("response".to_string(), json!(outcome.response_text));
                    let _ = log.log(ProductionRecordType::NlResult, fields);
                }

                match outcome.operation_context {
                    Some(ctx) => match execute(&store, &ctx).await {
                        Ok(result) => {
                            let text = describe_outcome(&result);
                            println!("{text}");
                            if let Some(log) = production.as_deref_mut() {
                                let mut fields = serde_json::Map::new();
                                fields.insert("result".to_string(), json!(text));
                                let _ = log.log(ProductionRecordType::ExecutionResult, fields);
                            }
                        }
                        Err(err) => eprintln!("error: {err}"),
                    },
                    None => println!("{}", outcome.response_text),
                }
            }
        }
    }

    store.shutdown().await;
    Ok(())
}

fn describe_outcome(outcome: &ExecutionOutcome) -> String {
    match outcome {
        ExecutionOutcome::Created { kind, id } => format!("created {} {id}", kind_noun(*kind)),
        ExecutionOutcome::Updated { kind, id } => format!("updated {} {id}", kind_noun(*kind)),
        ExecutionOutcome::Deleted { kind, id } => format!("deleted {} {id}", kind_noun(*kind)),
        ExecutionOutcome::BulkDeleted { counts } => {
            let parts: Vec<String> = counts
                .iter()
                .filter(|(_, count)| *count > 0)
                .map(|(kind, count)| format!("{count} {}", kind_noun_counted(*kind, *count)))
                .collect();
            if parts.is_empty() {
                "Nothing to delete".to_string()
            } else {
                format!("Deleted {}", parts.join(", "))
            }
        }
        ExecutionOutcome::Listed { items } => {
            if items.is_empty() {
                "no matching items".to_string()
            } else {
                items.iter().map(|i| format!("{}  {}  {:?}", i.id, i.title, i.status)).collect::<Vec<_>>().join("\n")
            }
        }
    }
}

fn kind_noun(kind: WorkItemKind) -> &'static str {
    match kind {
        WorkItemKind::Epic => "epic",
        WorkItemKind::Story => "story",
        WorkItemKind::Task => "task",
        WorkItemKind::Subtask => "subtask",
        WorkItemKind::Milestone => "milestone",
    }
}

fn kind_noun_counted(kind: WorkItemKind, count: usize) -> String {
    let noun = kind_noun(kind);
    if count == 1 {
        noun.to_string()
    } else if kind == WorkItemKind::Story {
        "stories".to_string()
    } else {
        format!("{noun}s")
    }
}
