use serde::{Deserialize, Serialize};

pub const PLACEHOLDER_OS_VERSION: &str = "{{OS_VERSION}}";
pub const PLACEHOLDER_TASK: &str = "{{TASK}}";
pub const PLACEHOLDER_SCREEN_WIDTH: &str = "{{SCREEN_WIDTH}}";
pub const PLACEHOLDER_SCREEN_HEIGHT: &str = "{{SCREEN_HEIGHT}}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    pub version: String,
    pub model_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    pub text: String,
    pub config: PromptConfig,
}

#[derive(Debug, Clone)]
pub struct PromptVariables<'a> {
    pub os_version: &'a str,
    pub task: &'a str,
    pub screen_width: u32,
    pub screen_height: u32,
}

impl PromptTemplate {
    pub fn render(&self, vars: &PromptVariables<'_>) -> String {
        // Task last, so placeholder-like text inside the task survives.
        self.text
            .replace(PLACEHOLDER_OS_VERSION, vars.os_version)
            .replace(PLACEHOLDER_SCREEN_WIDTH, &vars.screen_width.to_string())
            .replace(PLACEHOLDER_SCREEN_HEIGHT, &vars.screen_height.to_string())
            .replace(PLACEHOLDER_TASK, vars.task)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_all() {
        let template = PromptTemplate {
            text: "OS {{OS_VERSION}} screen {{SCREEN_WIDTH}}x{{SCREEN_HEIGHT}}\n{{TASK}}".into(),
            config: PromptConfig {
                version: "1".into(),
                model_id: "m".into(),
            },
        };
        let rendered = template.render(&PromptVariables {
            os_version: "Linux 6.1",
            task: "open {{OS_VERSION}} notes",
            screen_width: 1280,
            screen_height: 800,
        });
        assert_eq!(
            rendered,
            "OS Linux 6.1 screen 1280x800\nopen {{OS_VERSION}} notes"
        );
    }
}
