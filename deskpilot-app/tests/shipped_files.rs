use deskpilot_app::config::{AppConfig, ProviderKind};
use deskpilot_app::prompts::FilePromptCatalog;
use deskpilot_core::{PromptCatalog, PromptVariables};
use std::path::PathBuf;

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(PathBuf::from)
        .unwrap_or_default()
}

#[tokio::test]
async fn default_prompt_renders_every_placeholder() {
    let catalog = FilePromptCatalog::new(workspace_root().join("prompts"));
    let prompt = catalog.load_prompt("default").await.unwrap();
    assert!(!prompt.config.model_id.is_empty());

    let rendered = prompt.render(&PromptVariables {
        os_version: "Arch Linux",
        task: "Open the calculator",
        screen_width: 1440,
        screen_height: 900,
    });
    assert!(rendered.contains("Arch Linux"));
    assert!(rendered.contains("1440x900"));
    assert!(rendered.ends_with("Open the calculator\n"));
    assert!(!rendered.contains("{{"));
}

#[test]
fn sample_config_parses() {
    let content = std::fs::read_to_string(workspace_root().join("deskpilot.yaml")).unwrap();
    let mut config: AppConfig = serde_yaml::from_str(&content).unwrap();
    config.validate().unwrap();
    assert_eq!(config.provider, ProviderKind::Anthropic);
    assert_eq!(config.retry_policy().max_attempts, 3);
    assert_eq!(config.sandbox_limits().max_timeout.as_secs(), 120);
    assert!(config.log_dir.is_none());
}
