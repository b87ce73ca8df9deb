use crate::error::SandboxError;
use std::path::Path;

/// Automation runners that would bypass the structured desktop actions.
const DENYLIST: &[&str] = &[
    "osascript",
    "automator",
    "shortcuts",
    "cliclick",
    "xdotool",
    "ydotool",
    "dotool",
    "wtype",
    "wlrctl",
    "xte",
    "sikulix",
];

/// Command-line fragments that indicate UI automation.
const UI_KEYWORDS: &[&str] = &[
    "window",
    "menu",
    "click",
    "keystroke",
    "key code",
    "mouse",
    "cursor",
    "screenshot",
    "screencapture",
    "system events",
    "tell application",
    "accessibility",
];

pub struct CommandGuard;

impl CommandGuard {
    /// Reject denylisted executables and UI-automation command lines.
    ///
    /// Runs before executable resolution, so a denylisted name is rejected
    /// even when it is not installed.
    pub fn validate(executable: &str, args: &[String]) -> Result<(), SandboxError> {
        let base = Path::new(executable)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(executable)
            .to_lowercase();

        if DENYLIST.iter().any(|denied| *denied == base) {
            return Err(SandboxError::PolicyViolation(format!(
                "'{}' is an automation runner; use the desktop actions instead",
                base
            )));
        }

        let command_line = std::iter::once(executable)
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        if let Some(keyword) = UI_KEYWORDS.iter().find(|k| command_line.contains(*k)) {
            return Err(SandboxError::PolicyViolation(format!(
                "command line mentions '{}'; UI automation must go through the desktop actions",
                keyword
            )));
        }

        Ok(())
    }
}
