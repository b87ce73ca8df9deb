pub mod config;
pub mod credentials;
pub mod prompts;
pub mod screen;
pub mod sinks;
pub mod wayland;

use anyhow::{Context, Result};
use config::AppConfig;
use deskpilot_core::{CredentialCache, RunConfig, ToolLoopOrchestrator};
use deskpilot_executor::{CommandExecutor, EnvironmentSnapshot};
use deskpilot_providers::{HttpTransport, TransportRetrier};
use deskpilot_tools::{ActionDispatcher, DispatchOptions, ScreenshotPipeline};
use prompts::FilePromptCatalog;
use screen::GrimScreenshotProvider;
use sinks::RunLogs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use wayland::WaylandDesktop;

/// A wired orchestrator plus the directory its logs land in, if any.
pub struct PreparedRun {
    pub orchestrator: ToolLoopOrchestrator,
    pub log_dir: Option<PathBuf>,
}

/// Wire the Wayland desktop, grim capture, HTTP transport and file sinks
/// into an orchestrator for one run.
pub fn prepare_run(config: &AppConfig, credentials: Arc<CredentialCache>) -> Result<PreparedRun> {
    let logs = match &config.log_dir {
        Some(dir) => Some(
            RunLogs::create(dir)
                .with_context(|| format!("Failed to create log directory under {}", dir.display()))?,
        ),
        None => None,
    };

    let mut transport = HttpTransport::new();
    let mut dispatcher = ActionDispatcher::new(
        Arc::new(WaylandDesktop::new()),
        Arc::new(GrimScreenshotProvider::new()),
        ScreenshotPipeline::new(config.max_screenshot_bytes),
        CommandExecutor::new(config.sandbox_limits()),
    )
    .with_options(DispatchOptions {
        attach_screenshots: config.attach_screenshots,
        ..DispatchOptions::default()
    });
    if let Some(logs) = &logs {
        transport = transport.with_call_log(logs.calls.clone());
        dispatcher = dispatcher.with_screenshot_log(logs.screenshots.clone());
    }

    let environment = EnvironmentSnapshot::capture();
    let mut run_config = RunConfig::new(config.prompt_name.clone(), environment.os_version);
    run_config.model = config.model.clone();
    run_config.max_turns = config.max_turns;

    let mut orchestrator = ToolLoopOrchestrator::new(
        config.provider.adapter(),
        Arc::new(transport),
        TransportRetrier::new(config.retry_policy()),
        credentials,
        Arc::new(FilePromptCatalog::new(config.prompt_dir.clone())),
        dispatcher,
        run_config,
    );
    if let Some(logs) = &logs {
        orchestrator = orchestrator.with_trace(logs.trace.clone());
        info!("Run logs: {}", logs.dir.display());
    } else {
        debug!("log_dir not set; trace and screenshot logs disabled");
    }

    Ok(PreparedRun {
        orchestrator,
        log_dir: logs.map(|l| l.dir),
    })
}
