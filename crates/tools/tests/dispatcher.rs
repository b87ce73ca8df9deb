#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use async_trait::async_trait;
use deskpilot_executor::CommandExecutor;
use deskpilot_providers::{ContentBlock, ToolCall};
use deskpilot_tools::{
    ActionDispatcher, ActionError, DesktopActionExecutor, Dimensions, DispatchError,
    DispatchOptions, RawCapture, ScreenshotError, ScreenshotPipeline, ScreenshotProvider, Shortcut,
};
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct RecordingDesktop {
    calls: Mutex<Vec<String>>,
    fail_injection: bool,
}

impl RecordingDesktop {
    fn push(&self, call: String) -> Result<(), ActionError> {
        if self.fail_injection {
            return Err(ActionError::Injection("backend unavailable".into()));
        }
        self.calls.lock().push(call);
        Ok(())
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl DesktopActionExecutor for RecordingDesktop {
    async fn open_app(&self, name: &str) -> Result<(), ActionError> {
        self.push(format!("open_app {name}"))
    }

    async fn open_url(&self, url: &str) -> Result<(), ActionError> {
        self.push(format!("open_url {url}"))
    }

    async fn send_shortcut(&self, shortcut: &Shortcut) -> Result<(), ActionError> {
        self.push(format!("shortcut {shortcut}"))
    }

    async fn type_text(&self, text: &str) -> Result<(), ActionError> {
        self.push(format!("type {text}"))
    }

    async fn move_mouse(&self, x: i32, y: i32) -> Result<(), ActionError> {
        self.push(format!("move {x},{y}"))
    }

    async fn click(&self, x: i32, y: i32) -> Result<(), ActionError> {
        self.push(format!("click {x},{y}"))
    }

    async fn right_click(&self, x: i32, y: i32) -> Result<(), ActionError> {
        self.push(format!("right_click {x},{y}"))
    }

    async fn scroll(&self, dx: i32, dy: i32) -> Result<(), ActionError> {
        self.push(format!("scroll {dx},{dy}"))
    }

    async fn cursor_position(&self) -> Result<(i32, i32), ActionError> {
        Ok((400, 300))
    }
}

/// Small solid PNG whose screen is twice as large in logical pixels.
struct FixedScreen {
    captures: Mutex<u32>,
}

#[async_trait]
impl ScreenshotProvider for FixedScreen {
    async fn capture(&self) -> Result<RawCapture, ScreenshotError> {
        *self.captures.lock() += 1;
        let pixels = vec![200u8; 100 * 50 * 3];
        let mut png = Vec::new();
        PngEncoder::new(&mut png)
            .write_image(&pixels, 100, 50, ColorType::Rgb8)
            .map_err(|e| ScreenshotError::Image(e.to_string()))?;
        Ok(RawCapture {
            png,
            capture: Dimensions::new(100, 50),
            coordinate: Dimensions::new(200, 100),
        })
    }
}

fn dispatcher(attach: bool) -> (ActionDispatcher, Arc<RecordingDesktop>, Arc<FixedScreen>) {
    let desktop = Arc::new(RecordingDesktop::default());
    let screen = Arc::new(FixedScreen {
        captures: Mutex::new(0),
    });
    let dispatcher = ActionDispatcher::new(
        desktop.clone(),
        screen.clone(),
        ScreenshotPipeline::default(),
        CommandExecutor::default(),
    )
    .with_options(DispatchOptions {
        attach_screenshots: attach,
        max_wait: Duration::from_millis(200),
        default_wait: Duration::from_millis(10),
        settle_delay: Duration::ZERO,
    });
    (dispatcher, desktop, screen)
}

fn call(name: &str, input: Value) -> ToolCall {
    ToolCall {
        id: "call_1".to_string(),
        name: name.to_string(),
        input,
    }
}

fn text_of(block: &ContentBlock) -> &str {
    match block {
        ContentBlock::Text { text } => text,
        other => panic!("expected text block, got {other:?}"),
    }
}

#[tokio::test]
async fn test_type_records_step() {
    let (mut d, desktop, _) = dispatcher(false);
    let result = d
        .dispatch(
            &call("computer", json!({"action": "type", "text": "hello world"})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(result.step.as_deref(), Some("Type text 'hello world'"));
    assert_eq!(desktop.calls(), vec!["type hello world"]);
    assert_eq!(result.content.len(), 1);
}

#[tokio::test]
async fn test_click_maps_to_screen_and_attaches_screenshot() {
    let (mut d, desktop, screen) = dispatcher(true);
    let result = d
        .dispatch(
            &call("computer", json!({"action": "left_click", "coordinate": [10, 20]})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(desktop.calls(), vec!["click 20,40"]);
    assert!(result.content.iter().any(ContentBlock::is_image));
    assert_eq!(d.mapper().unwrap().scale(), (2.0, 2.0));
    // one capture to fix the scale, one to verify the click
    assert_eq!(*screen.captures.lock(), 2);
}

#[tokio::test]
async fn test_cursor_position_reported_in_tool_space() {
    let (mut d, _, _) = dispatcher(false);
    d.capture().await.unwrap();
    let result = d
        .dispatch(
            &call("computer", json!({"action": "cursor_position"})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(text_of(&result.content[0]), "Cursor is at (99, 49)");
    assert!(result.step.is_none());
}

#[tokio::test]
async fn test_key_and_scroll() {
    let (mut d, desktop, _) = dispatcher(false);
    let cancel = CancellationToken::new();
    d.dispatch(&call("computer", json!({"action": "key", "text": "Ctrl+Enter"})), &cancel)
        .await
        .unwrap();
    let scroll = d
        .dispatch(
            &call(
                "computer",
                json!({"action": "scroll", "x": 5, "y": 5, "direction": "down", "amount": 2}),
            ),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(
        desktop.calls(),
        vec!["shortcut ctrl+return", "move 10,10", "scroll 0,-2"]
    );
    assert_eq!(scroll.step.as_deref(), Some("Scroll (0, -2) at (10, 10)"));
}

#[tokio::test]
async fn test_unknown_action_yields_question() {
    let (mut d, desktop, _) = dispatcher(true);
    let result = d
        .dispatch(
            &call("computer", json!({"action": "teleport"})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(result.is_error);
    assert_eq!(result.questions.len(), 1);
    assert!(desktop.calls().is_empty());
}

#[tokio::test]
async fn test_malformed_input_yields_question() {
    let (mut d, _, _) = dispatcher(false);
    let result = d
        .dispatch(
            &call("computer", json!({"action": "left_click"})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(result.is_error);
    assert_eq!(result.questions.len(), 1);
}

#[tokio::test]
async fn test_injection_failure_is_non_fatal() {
    let desktop = Arc::new(RecordingDesktop {
        fail_injection: true,
        ..RecordingDesktop::default()
    });
    let mut d = ActionDispatcher::new(
        desktop,
        Arc::new(FixedScreen {
            captures: Mutex::new(0),
        }),
        ScreenshotPipeline::default(),
        CommandExecutor::default(),
    );
    let result = d
        .dispatch(
            &call("computer", json!({"action": "open_app", "app": "firefox"})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(result.is_error);
    assert!(result.questions.is_empty());
}

#[tokio::test]
async fn test_wait_ends_on_cancel() {
    let (mut d, _, _) = dispatcher(false);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = d
        .dispatch(&call("computer", json!({"action": "wait", "seconds": 5})), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Cancelled));
}

#[tokio::test]
async fn test_wait_is_bounded() {
    let (mut d, _, _) = dispatcher(false);
    let result = d
        .dispatch(
            &call("computer", json!({"action": "wait", "seconds": 60})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(result.step.as_deref(), Some("Wait 0.2s"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_terminal_exec_reports_json() {
    let (mut d, _, _) = dispatcher(true);
    let result = d
        .dispatch(
            &call("terminal_exec", json!({"executable": "echo", "args": ["hello"]})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(!result.is_error);
    let body: Value = serde_json::from_str(text_of(&result.content[0])).unwrap();
    assert_eq!(body["exit_code"], 0);
    assert!(body["stdout"].as_str().unwrap().contains("hello"));
    assert_eq!(result.content.len(), 1);
}

#[tokio::test]
async fn test_terminal_policy_violation_is_non_fatal() {
    let (mut d, _, _) = dispatcher(false);
    let result = d
        .dispatch(
            &call("terminal_exec", json!({"executable": "xdotool", "args": ["click", "1"]})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(result.is_error);
    let body: Value = serde_json::from_str(text_of(&result.content[0])).unwrap();
    assert_eq!(body["status"], "policy_violation");
    assert_eq!(result.questions.len(), 1);
    assert!(result.questions[0].contains("xdotool click 1"));
    assert!(result.step.is_none());
}

#[tokio::test]
async fn test_terminal_missing_executable_yields_question() {
    let (mut d, _, _) = dispatcher(false);
    let result = d
        .dispatch(
            &call("terminal_exec", json!({"executable": "definitely-not-installed-xyz"})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(result.is_error);
    let body: Value = serde_json::from_str(text_of(&result.content[0])).unwrap();
    assert_eq!(body["status"], "executable_not_found");
    assert_eq!(result.questions.len(), 1);
    assert!(result.questions[0].contains("definitely-not-installed-xyz"));
}

#[tokio::test]
async fn test_unknown_tool() {
    let (mut d, _, _) = dispatcher(false);
    let result = d
        .dispatch(&call("browser", json!({})), &CancellationToken::new())
        .await
        .unwrap();
    assert!(result.is_error);
    assert!(text_of(&result.content[0]).contains("browser"));
}
