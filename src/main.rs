//! feedctl - replay feed operations through the session stack
//!
//! `feedctl replay ops.jsonl` reads one `StreamDataOperation` per line, feeds
//! them to a `FeedSessionManager` backed by the in-memory store, opens a
//! session, and prints the resulting tree and provider dump as JSON.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use feed_session::concurrent::{SystemClock, TokioMainThreadRunner, TokioTaskQueue};
use feed_session::config::{default as config_default, xdg, Config, ConfigLoader};
use feed_session::error::TracingErrorReporter;
use feed_session::model::{ChildType, ModelChild, ModelProvider};
use feed_session::proto::{Model, MutationContext, StreamDataOperation, StreamToken, UiContext};
use feed_session::session::{FeedSessionManager, ModelConsumer, RequestManager, SessionManagerDeps};
use feed_session::store::InMemoryStore;
use feed_session::{logging, RequestError, RequestReason};

/// Feed session tools
#[derive(Parser)]
#[command(name = "feedctl")]
#[command(version, about = "Inspect and replay feed session operations")]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON Lines file of stream operations and print the result
    Replay {
        /// File with one StreamDataOperation per line
        file: PathBuf,

        /// Override model.initial_page_size
        #[arg(long)]
        initial_page_size: Option<usize>,
    },
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file (the old one is kept as .backup)
        #[arg(long)]
        force: bool,
    },
    /// Print the configuration file path
    Path,
    /// Check that the configuration file parses
    Validate,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            file,
            initial_page_size,
        } => {
            let config = match ConfigLoader::load(cli.config.as_deref()) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            logging::init(&config.logging.level);
            run_replay(&file, config, initial_page_size).await
        }
        Commands::Config { action } => {
            logging::init("info");
            run_config_command(action, cli.config.as_deref())
        }
    }
}

fn run_config_command(action: ConfigAction, explicit: Option<&Path>) -> ExitCode {
    let path = explicit.map(Path::to_path_buf).unwrap_or_else(xdg::config_path);
    match action {
        ConfigAction::Init { force } => {
            let result = match explicit {
                Some(path) => config_default::create_default_config_at(path, force)
                    .map(|()| path.to_path_buf()),
                None => config_default::create_default_config(force),
            };
            match result {
                Ok(path) => {
                    println!("Created {}", path.display());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        ConfigAction::Path => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        ConfigAction::Validate => match ConfigLoader::load(explicit) {
            Ok(_) if path.exists() => {
                println!("Configuration OK: {}", path.display());
                ExitCode::SUCCESS
            }
            Ok(_) => {
                println!("No configuration file at {}, using defaults", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}

/// Answers every request with a failure; replay only uses the recorded ops.
struct OfflineRequestManager;

impl RequestManager for OfflineRequestManager {
    fn load_more(&self, token: StreamToken, consumer: ModelConsumer) {
        tracing::info!(content_id = %token.content_id, "replay cannot load more pages");
        consumer(Err(RequestError::Network("offline replay".to_string())));
    }

    fn trigger_refresh(&self, reason: RequestReason, consumer: ModelConsumer) {
        tracing::info!(%reason, "replay cannot refresh");
        consumer(Err(RequestError::Network("offline replay".to_string())));
    }
}

fn read_operations(path: &Path) -> Result<Vec<StreamDataOperation>, String> {
    let text =
        fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let mut operations = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let operation = serde_json::from_str(line)
            .map_err(|e| format!("{}:{}: {}", path.display(), index + 1, e))?;
        operations.push(operation);
    }
    Ok(operations)
}

async fn run_replay(path: &Path, config: Config, initial_page_size: Option<usize>) -> ExitCode {
    let operations = match read_operations(path) {
        Ok(operations) => operations,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let session_config = match config.session_config() {
        Ok(session_config) => session_config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let mut paging = config.paging();
    if let Some(size) = initial_page_size {
        paging.initial_page_size = size;
    }

    let handle = tokio::runtime::Handle::current();
    let task_queue = Arc::new(TokioTaskQueue::new(&handle));
    let main_runner = Arc::new(TokioMainThreadRunner::new(&handle));
    let deps = SessionManagerDeps {
        store: Arc::new(InMemoryStore::new()),
        task_queue: task_queue.clone(),
        main_runner: main_runner.clone(),
        clock: Arc::new(SystemClock),
        request_manager: Arc::new(OfflineRequestManager),
        error_reporter: Arc::new(TracingErrorReporter),
    };
    let manager = FeedSessionManager::new(deps, session_config, paging);
    if !manager.initialize() {
        eprintln!("Error: session cache failed to initialize");
        return ExitCode::FAILURE;
    }

    let count = operations.len();
    let consumer = manager.update_consumer(MutationContext::default());
    consumer(Ok(Model {
        operations,
        schema_version: session_config.schema_version,
    }));
    settle(&task_queue, &main_runner).await;

    let provider = manager.get_new_session(UiContext::default(), None);
    settle(&task_queue, &main_runner).await;

    let dump = provider.dump();
    let tree = provider.root_feature().map(|root| {
        let children = collect_children(&root.cursor());
        json!({ "id": root.stream_feature().content_id, "type": "feature", "children": children })
    });
    let report = json!({
        "operations": count,
        "session_id": provider.session_id(),
        "tree": tree,
        "dump": dump,
    });
    match serde_json::to_string_pretty(&report) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Drains work that hops between the task queue and the main runner.
async fn settle(task_queue: &TokioTaskQueue, main_runner: &TokioMainThreadRunner) {
    for _ in 0..4 {
        task_queue.wait_until_idle().await;
        main_runner.wait_until_idle().await;
    }
}

fn collect_children(cursor: &feed_session::model::ModelCursor) -> Vec<Value> {
    let mut out = Vec::new();
    while let Some(child) = cursor.next_item() {
        out.push(child_json(&child));
    }
    out
}

fn child_json(child: &ModelChild) -> Value {
    match child.child_type() {
        ChildType::Feature => {
            let children = child
                .feature()
                .map(|feature| collect_children(&feature.cursor()))
                .unwrap_or_default();
            json!({ "id": child.content_id(), "type": "feature", "children": children })
        }
        ChildType::Token => {
            let synthetic = child.token().map(|t| t.is_synthetic()).unwrap_or(false);
            json!({ "id": child.content_id(), "type": "token", "synthetic": synthetic })
        }
        ChildType::Unbound => json!({ "id": child.content_id(), "type": "unbound" }),
    }
}
