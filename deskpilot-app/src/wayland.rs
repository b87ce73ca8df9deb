//! Input injection on wlroots/Hyprland desktops via wtype, ydotool and wlrctl.

use async_trait::async_trait;
use deskpilot_tools::{ActionError, DesktopActionExecutor, Modifier, Shortcut};
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

const CLICK_SETTLE: Duration = Duration::from_millis(30);

fn validate_app_name(app: &str) -> Result<(), ActionError> {
    if app.trim().is_empty() {
        return Err(ActionError::Malformed("app cannot be empty".to_string()));
    }
    if !app
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
    {
        return Err(ActionError::Malformed(format!(
            "app '{}' contains invalid characters",
            app
        )));
    }
    Ok(())
}

fn validate_url(url: &str) -> Result<(), ActionError> {
    let lower = url.trim().to_lowercase();
    if lower.is_empty() {
        return Err(ActionError::Malformed("url cannot be empty".to_string()));
    }
    if !(lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("mailto:")
        || lower.starts_with("file://"))
    {
        return Err(ActionError::Malformed(
            "url must start with http://, https://, mailto:, or file://".to_string(),
        ));
    }
    Ok(())
}

fn validate_text(text: &str) -> Result<(), ActionError> {
    if text.contains('\0') {
        return Err(ActionError::Malformed("text contains null byte".to_string()));
    }
    Ok(())
}

/// wtype modifier names.
fn modifier_name(modifier: Modifier) -> &'static str {
    match modifier {
        Modifier::Command => "logo",
        Modifier::Control => "ctrl",
        Modifier::Option => "alt",
        Modifier::Shift => "shift",
    }
}

/// XKB keysym for a normalized key token.
fn keysym(key: &str) -> String {
    let name = match key {
        "return" => "Return",
        "escape" => "Escape",
        "space" => "space",
        "delete" => "Delete",
        "backspace" => "BackSpace",
        "tab" => "Tab",
        "page_up" => "Prior",
        "page_down" => "Next",
        "home" => "Home",
        "end" => "End",
        "up" => "Up",
        "down" => "Down",
        "left" => "Left",
        "right" => "Right",
        "+" => "plus",
        "-" => "minus",
        other => {
            if let Some(n) = other.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
                return format!("F{}", n);
            }
            other
        }
    };
    name.to_string()
}

/// `wtype -M mod... -k key -m mod...` arguments.
fn shortcut_args(shortcut: &Shortcut) -> Vec<String> {
    let mut args = Vec::new();
    for modifier in &shortcut.modifiers {
        args.push("-M".to_string());
        args.push(modifier_name(*modifier).to_string());
    }
    args.push("-k".to_string());
    args.push(keysym(&shortcut.key));
    for modifier in shortcut.modifiers.iter().rev() {
        args.push("-m".to_string());
        args.push(modifier_name(*modifier).to_string());
    }
    args
}

async fn command_exists(command: &str) -> bool {
    Command::new("which")
        .arg(command)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

async fn run_checked(command: &str, args: &[&str]) -> Result<(), ActionError> {
    debug!("Running {} {:?}", command, args);
    let output = Command::new(command)
        .args(args)
        .output()
        .await
        .map_err(|e| ActionError::Injection(format!("{}: {}", command, e)))?;
    if output.status.success() {
        return Ok(());
    }
    Err(ActionError::Injection(format!(
        "{} failed: {}",
        command,
        String::from_utf8_lossy(&output.stderr).trim()
    )))
}

async fn run_output(command: &str, args: &[&str]) -> Result<Vec<u8>, ActionError> {
    let output = Command::new(command)
        .args(args)
        .output()
        .await
        .map_err(|e| ActionError::Injection(format!("{}: {}", command, e)))?;
    if output.status.success() {
        return Ok(output.stdout);
    }
    Err(ActionError::Injection(format!(
        "{} failed: {}",
        command,
        String::from_utf8_lossy(&output.stderr).trim()
    )))
}

/// Start a long-lived program without waiting for it. A background task
/// reaps the child when it exits.
fn launch_detached(command: &str) -> Result<(), ActionError> {
    let mut child = Command::new(command)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ActionError::Injection(format!("Failed to launch {}: {}", command, e)))?;
    let name = command.to_string();
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) if !status.success() => debug!("{} exited with {}", name, status),
            Ok(_) => {}
            Err(e) => warn!("Failed to wait for {}: {}", name, e),
        }
    });
    Ok(())
}

#[derive(Debug, Deserialize)]
struct CursorPos {
    x: i32,
    y: i32,
}

/// Desktop executor for Wayland compositors. Coordinates are logical pixels.
#[derive(Debug, Default)]
pub struct WaylandDesktop;

impl WaylandDesktop {
    pub fn new() -> Self {
        Self
    }

    async fn click_button(&self, x: i32, y: i32, button: &str, code: &str) -> Result<(), ActionError> {
        self.move_mouse(x, y).await?;
        sleep(CLICK_SETTLE).await;
        if command_exists("ydotool").await {
            return run_checked("ydotool", &["click", code]).await;
        }
        if command_exists("wlrctl").await {
            return run_checked("wlrctl", &["pointer", "click", button]).await;
        }
        Err(ActionError::Injection(
            "No click backend found (install 'ydotool' or 'wlrctl')".to_string(),
        ))
    }
}

#[async_trait]
impl DesktopActionExecutor for WaylandDesktop {
    async fn open_app(&self, name: &str) -> Result<(), ActionError> {
        validate_app_name(name)?;
        if command_exists("hyprctl").await {
            return run_checked("hyprctl", &["dispatch", "exec", name]).await;
        }
        launch_detached(name)
    }

    async fn open_url(&self, url: &str) -> Result<(), ActionError> {
        validate_url(url)?;
        // xdg-open hands the URL to the handler and exits.
        run_checked("xdg-open", &[url.trim()]).await
    }

    async fn send_shortcut(&self, shortcut: &Shortcut) -> Result<(), ActionError> {
        if !command_exists("wtype").await {
            return Err(ActionError::Injection(
                "wtype not found for key presses".to_string(),
            ));
        }
        let args = shortcut_args(shortcut);
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        run_checked("wtype", &refs).await
    }

    async fn type_text(&self, text: &str) -> Result<(), ActionError> {
        validate_text(text)?;
        if command_exists("wtype").await {
            return run_checked("wtype", &["--", text]).await;
        }
        if command_exists("ydotool").await {
            return run_checked("ydotool", &["type", "--", text]).await;
        }
        Err(ActionError::Injection(
            "No text input backend found (install 'wtype' or 'ydotool')".to_string(),
        ))
    }

    async fn move_mouse(&self, x: i32, y: i32) -> Result<(), ActionError> {
        let xs = x.max(0).to_string();
        let ys = y.max(0).to_string();
        if command_exists("hyprctl").await {
            let target = format!("{} {}", xs, ys);
            return run_checked("hyprctl", &["dispatch", "movecursor", &target]).await;
        }
        if command_exists("ydotool").await {
            return run_checked("ydotool", &["mousemove", "--absolute", "-x", &xs, "-y", &ys])
                .await;
        }
        Err(ActionError::Injection(
            "No mouse move backend found (install 'hyprctl' or 'ydotool')".to_string(),
        ))
    }

    async fn click(&self, x: i32, y: i32) -> Result<(), ActionError> {
        self.click_button(x, y, "left", "0xC0").await
    }

    async fn right_click(&self, x: i32, y: i32) -> Result<(), ActionError> {
        self.click_button(x, y, "right", "0xC1").await
    }

    async fn scroll(&self, dx: i32, dy: i32) -> Result<(), ActionError> {
        if !command_exists("wlrctl").await {
            return Err(ActionError::Injection(
                "wlrctl not found for scrolling".to_string(),
            ));
        }
        // wlrctl counts down and right as positive.
        let vertical = (-dy).to_string();
        let horizontal = dx.to_string();
        run_checked("wlrctl", &["pointer", "scroll", &vertical, &horizontal]).await
    }

    async fn cursor_position(&self) -> Result<(i32, i32), ActionError> {
        let stdout = run_output("hyprctl", &["cursorpos", "-j"]).await?;
        let pos: CursorPos = serde_json::from_slice(&stdout)
            .map_err(|e| ActionError::Injection(format!("Unreadable cursor position: {}", e)))?;
        Ok((pos.x, pos.y))
    }
}
