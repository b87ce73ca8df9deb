use async_trait::async_trait;
use deskpilot_core::{PromptCatalog, PromptConfig, PromptError, PromptTemplate};
use std::path::PathBuf;

/// Prompts stored as `<dir>/<name>.md` with a `<dir>/<name>.yaml` config.
#[derive(Debug, Clone)]
pub struct FilePromptCatalog {
    dir: PathBuf,
}

impl FilePromptCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn is_safe_name(name: &str) -> bool {
        !name.is_empty()
            && name
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_'))
    }
}

#[async_trait]
impl PromptCatalog for FilePromptCatalog {
    async fn load_prompt(&self, name: &str) -> Result<PromptTemplate, PromptError> {
        if !Self::is_safe_name(name) {
            return Err(PromptError::Invalid {
                name: name.to_string(),
                reason: "name may only contain letters, digits, '-' and '_'".to_string(),
            });
        }

        let text_path = self.dir.join(format!("{}.md", name));
        let config_path = self.dir.join(format!("{}.yaml", name));
        if !text_path.exists() || !config_path.exists() {
            return Err(PromptError::NotFound(name.to_string()));
        }

        let text = tokio::fs::read_to_string(&text_path).await?;
        let raw_config = tokio::fs::read_to_string(&config_path).await?;
        let config: PromptConfig =
            serde_yaml::from_str(&raw_config).map_err(|e| PromptError::Invalid {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        if text.trim().is_empty() {
            return Err(PromptError::Invalid {
                name: name.to_string(),
                reason: "prompt text is empty".to_string(),
            });
        }
        if config.model_id.trim().is_empty() {
            return Err(PromptError::Invalid {
                name: name.to_string(),
                reason: "model_id cannot be empty".to_string(),
            });
        }

        Ok(PromptTemplate { text, config })
    }
}
