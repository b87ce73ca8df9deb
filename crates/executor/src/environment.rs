use sysinfo::System;

/// Host facts substituted into the task prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentSnapshot {
    pub os_version: String,
}

impl EnvironmentSnapshot {
    pub fn capture() -> Self {
        Self {
            os_version: os_version_from(System::long_os_version(), System::name()),
        }
    }
}

fn os_version_from(long_version: Option<String>, name: Option<String>) -> String {
    long_version
        .or(name)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| std::env::consts::OS.to_string())
}
