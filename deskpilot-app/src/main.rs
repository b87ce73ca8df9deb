use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use deskpilot_app::config::{AppConfig, ProviderKind, DEFAULT_CONFIG_FILE};
use deskpilot_app::credentials::{env_var_for, FileCredentialStore};
use deskpilot_app::prepare_run;
use deskpilot_core::CredentialCache;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "deskpilot", version, about = "Drive the desktop with a vision-capable model")]
struct Cli {
    /// Configuration file
    #[arg(long, short, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Debug logging for deskpilot crates
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one automation task
    Run {
        /// Task description
        task: Option<String>,

        /// Read the task from a file
        #[arg(long, conflicts_with = "task")]
        task_file: Option<PathBuf>,

        /// Provider override (anthropic or openai)
        #[arg(long)]
        provider: Option<String>,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        max_turns: Option<u32>,
    },
    /// Manage provider API keys
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
}

#[derive(Subcommand, Debug)]
enum KeyAction {
    /// Store a key read from stdin
    Set { provider: String },
    /// Show which providers have a key
    Status,
}

fn initialize_logging(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("DESKPILOT_LOG").unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,deskpilot={level},deskpilot_app={level},deskpilot_core={level},\
             deskpilot_providers={level},deskpilot_tools={level},deskpilot_executor={level}"
        ))
    });

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn read_task(task: Option<String>, task_file: Option<PathBuf>) -> Result<String> {
    let task = match (task, task_file) {
        (Some(task), _) => task,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read task file {}", path.display()))?,
        (None, None) => bail!("Provide a task or --task-file"),
    };
    let task = task.trim().to_string();
    if task.is_empty() {
        bail!("Task cannot be empty");
    }
    Ok(task)
}

async fn run_command(
    mut config: AppConfig,
    credentials: Arc<CredentialCache>,
    task: String,
    provider: Option<String>,
    model: Option<String>,
    max_turns: Option<u32>,
) -> Result<bool> {
    if let Some(provider) = provider {
        config.provider = ProviderKind::parse(&provider)?;
    }
    if model.is_some() {
        config.model = model;
    }
    if let Some(max_turns) = max_turns {
        config.max_turns = max_turns;
    }
    config.validate()?;

    let prepared = prepare_run(&config, credentials)?;
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            ctrl_c.cancel();
        }
    });

    info!("Task: {}", task);
    let result = prepared.orchestrator.run(&task, &cancel).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    if let Some(dir) = prepared.log_dir {
        info!("Logs written to {}", dir.display());
    }
    Ok(result.is_success())
}

fn key_command(credentials: &CredentialCache, action: KeyAction) -> Result<()> {
    match action {
        KeyAction::Set { provider } => {
            let provider = ProviderKind::parse(&provider)?;
            let mut secret = String::new();
            std::io::stdin()
                .read_to_string(&mut secret)
                .context("Failed to read key from stdin")?;
            if secret.trim().is_empty() {
                bail!("Empty key on stdin");
            }
            credentials.write_key(provider.id(), secret.trim())?;
            println!("Stored key for {}", provider.id());
        }
        KeyAction::Status => {
            for provider in [ProviderKind::Anthropic, ProviderKind::Openai] {
                let state = if credentials.has_key(provider.id())? {
                    "configured"
                } else {
                    "missing"
                };
                println!(
                    "{:<10} {} (file or {})",
                    provider.id(),
                    state,
                    env_var_for(provider.id())
                );
            }
        }
    }
    Ok(())
}

async fn dispatch(cli: Cli) -> Result<bool> {
    let config = AppConfig::load(&cli.config)?;
    let store = FileCredentialStore::new(config.credentials_file.clone());
    let credentials = Arc::new(CredentialCache::new(Arc::new(store)));

    match cli.command {
        Command::Run {
            task,
            task_file,
            provider,
            model,
            max_turns,
        } => {
            let task = read_task(task, task_file)?;
            run_command(config, credentials, task, provider, model, max_turns).await
        }
        Command::Key { action } => key_command(&credentials, action).map(|_| true),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    initialize_logging(cli.verbose);

    match dispatch(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(2);
        }
    }
}
