use crate::args::{ArgValue, ToolArgs};
use crate::coordinates::CoordinateMapper;
use crate::definitions::{DESKTOP_TOOL_NAME, TERMINAL_TOOL_NAME};
use crate::error::{ActionError, DispatchError, ScreenshotError};
use crate::keys::parse_shortcut;
use crate::screenshot::{CapturedScreenshot, ScreenshotPipeline};
use crate::traits::{DesktopActionExecutor, ScreenshotLogSink, ScreenshotProvider};
use deskpilot_executor::{CommandExecutor, SandboxError, TerminalRequest};
use deskpilot_providers::{ContentBlock, ToolCall};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of one tool call, folded back into the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExecutionResult {
    pub content: Vec<ContentBlock>,
    pub is_error: bool,
    /// Human-readable description of what was done, if anything.
    pub step: Option<String>,
    pub questions: Vec<String>,
}

impl ToolExecutionResult {
    pub fn success(content: Vec<ContentBlock>, step: Option<String>) -> Self {
        Self {
            content,
            is_error: false,
            step,
            questions: Vec::new(),
        }
    }

    pub fn failure(error: &ActionError) -> Self {
        Self {
            content: vec![ContentBlock::text(error.to_string())],
            is_error: true,
            step: None,
            questions: error.clarifying_question().into_iter().collect(),
        }
    }

    pub fn to_block(&self, tool_use_id: &str) -> ContentBlock {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.to_string(),
            content: self.content.clone(),
            is_error: self.is_error,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Attach a fresh screenshot to the result of every mutating action.
    pub attach_screenshots: bool,
    pub max_wait: Duration,
    pub default_wait: Duration,
    /// Pause before the follow-up screenshot so the UI can settle.
    pub settle_delay: Duration,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            attach_screenshots: true,
            max_wait: Duration::from_secs(10),
            default_wait: Duration::from_secs(1),
            settle_delay: Duration::from_millis(300),
        }
    }
}

enum Failure {
    Action(ActionError),
    Fatal(DispatchError),
}

impl From<ActionError> for Failure {
    fn from(e: ActionError) -> Self {
        Self::Action(e)
    }
}

impl From<ScreenshotError> for Failure {
    fn from(e: ScreenshotError) -> Self {
        Self::Fatal(DispatchError::Screenshot(e))
    }
}

struct Done {
    text: String,
    step: Option<String>,
    is_error: bool,
    /// Mutating actions get a verification screenshot when enabled.
    mutating: bool,
    image: Option<CapturedScreenshot>,
    questions: Vec<String>,
}

impl Done {
    fn mutating(text: String, step: String) -> Self {
        Self {
            text,
            step: Some(step),
            is_error: false,
            mutating: true,
            image: None,
            questions: Vec::new(),
        }
    }

    fn observing(text: String) -> Self {
        Self {
            text,
            step: None,
            is_error: false,
            mutating: false,
            image: None,
            questions: Vec::new(),
        }
    }
}

/// Maps one tool call onto a desktop primitive or the terminal sandbox.
///
/// Holds the run's coordinate mapper, derived from the first screenshot and
/// never changed afterwards.
pub struct ActionDispatcher {
    desktop: Arc<dyn DesktopActionExecutor>,
    screenshots: Arc<dyn ScreenshotProvider>,
    pipeline: ScreenshotPipeline,
    terminal: CommandExecutor,
    options: DispatchOptions,
    screenshot_log: Option<Arc<dyn ScreenshotLogSink>>,
    mapper: Option<CoordinateMapper>,
}

impl ActionDispatcher {
    pub fn new(
        desktop: Arc<dyn DesktopActionExecutor>,
        screenshots: Arc<dyn ScreenshotProvider>,
        pipeline: ScreenshotPipeline,
        terminal: CommandExecutor,
    ) -> Self {
        Self {
            desktop,
            screenshots,
            pipeline,
            terminal,
            options: DispatchOptions::default(),
            screenshot_log: None,
            mapper: None,
        }
    }

    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_screenshot_log(mut self, sink: Arc<dyn ScreenshotLogSink>) -> Self {
        self.screenshot_log = Some(sink);
        self
    }

    pub fn mapper(&self) -> Option<&CoordinateMapper> {
        self.mapper.as_ref()
    }

    /// Capture a screenshot that will be transmitted to the model.
    pub async fn capture(&mut self) -> Result<CapturedScreenshot, ScreenshotError> {
        let shot = self.capture_untracked().await?;
        if let Some(sink) = &self.screenshot_log {
            sink.record(&shot);
        }
        Ok(shot)
    }

    async fn capture_untracked(&mut self) -> Result<CapturedScreenshot, ScreenshotError> {
        let shot = self.pipeline.capture(self.screenshots.as_ref()).await?;
        if self.mapper.is_none() {
            let mapper = CoordinateMapper::new(shot.tool, shot.coordinate);
            info!(
                "Coordinate scale fixed at {:?} (tool {}x{}, screen {}x{})",
                mapper.scale(),
                shot.tool.width,
                shot.tool.height,
                shot.coordinate.width,
                shot.coordinate.height
            );
            self.mapper = Some(mapper);
        }
        Ok(shot)
    }

    async fn ensure_mapper(&mut self) -> Result<CoordinateMapper, ScreenshotError> {
        if let Some(mapper) = self.mapper {
            return Ok(mapper);
        }
        self.capture_untracked().await?;
        self.mapper
            .ok_or_else(|| ScreenshotError::Capture("coordinate mapping unavailable".into()))
    }

    /// Run one tool call. Only cancellation and screenshot failures escape;
    /// everything else becomes an error result the model can react to.
    pub async fn dispatch(
        &mut self,
        call: &ToolCall,
        cancel: &CancellationToken,
    ) -> Result<ToolExecutionResult, DispatchError> {
        info!("Dispatching tool: {} ({})", call.name, call.id);

        let outcome = match ToolArgs::from_json(&call.input) {
            Err(e) => Err(Failure::Action(e)),
            Ok(args) => match call.name.as_str() {
                DESKTOP_TOOL_NAME => self.run_desktop(&args, cancel).await,
                TERMINAL_TOOL_NAME => self.run_terminal(&args).await,
                other => Err(Failure::Action(ActionError::UnknownTool(other.to_string()))),
            },
        };

        match outcome {
            Ok(done) => self.finish(done).await,
            Err(Failure::Action(e)) => {
                warn!("Tool call {} failed: {}", call.id, e);
                Ok(ToolExecutionResult::failure(&e))
            }
            Err(Failure::Fatal(e)) => Err(e),
        }
    }

    async fn finish(&mut self, done: Done) -> Result<ToolExecutionResult, DispatchError> {
        let mut content = vec![ContentBlock::text(done.text)];

        let image = match done.image {
            Some(image) => Some(image),
            None if done.mutating && self.options.attach_screenshots => {
                if !self.options.settle_delay.is_zero() {
                    tokio::time::sleep(self.options.settle_delay).await;
                }
                Some(self.capture_untracked().await?)
            }
            None => None,
        };
        if let Some(image) = image {
            if let Some(sink) = &self.screenshot_log {
                sink.record(&image);
            }
            content.push(image.to_content_block());
        }

        Ok(ToolExecutionResult {
            content,
            is_error: done.is_error,
            step: done.step,
            questions: done.questions,
        })
    }

    async fn screen_point(&mut self, args: &ToolArgs) -> Result<(i32, i32), Failure> {
        let (x, y) = args.require_point()?;
        let mapper = self.ensure_mapper().await?;
        Ok(mapper.to_screen(x, y))
    }

    async fn run_desktop(
        &mut self,
        args: &ToolArgs,
        cancel: &CancellationToken,
    ) -> Result<Done, Failure> {
        let action = args
            .require_str("action")?
            .trim()
            .to_ascii_lowercase();
        debug!("Desktop action: {}", action);

        match action.as_str() {
            "screenshot" => {
                let shot = self.capture_untracked().await?;
                let mut done = Done::observing(format!(
                    "Screenshot captured ({}x{})",
                    shot.tool.width, shot.tool.height
                ));
                done.image = Some(shot);
                Ok(done)
            }
            "cursor_position" => {
                let (sx, sy) = self.desktop.cursor_position().await?;
                let mapper = self.ensure_mapper().await?;
                let (x, y) = mapper.to_tool(sx as f64, sy as f64);
                Ok(Done::observing(format!("Cursor is at ({}, {})", x, y)))
            }
            "mouse_move" => {
                let (x, y) = self.screen_point(args).await?;
                self.desktop.move_mouse(x, y).await?;
                Ok(Done::mutating(
                    format!("Moved mouse to ({}, {})", x, y),
                    format!("Move mouse to ({}, {})", x, y),
                ))
            }
            "left_click" | "click" => {
                let (x, y) = self.screen_point(args).await?;
                self.desktop.click(x, y).await?;
                Ok(Done::mutating(
                    format!("Clicked at ({}, {})", x, y),
                    format!("Click at ({}, {})", x, y),
                ))
            }
            "right_click" => {
                let (x, y) = self.screen_point(args).await?;
                self.desktop.right_click(x, y).await?;
                Ok(Done::mutating(
                    format!("Right-clicked at ({}, {})", x, y),
                    format!("Right-click at ({}, {})", x, y),
                ))
            }
            "double_click" => {
                let (x, y) = self.screen_point(args).await?;
                self.desktop.double_click(x, y).await?;
                Ok(Done::mutating(
                    format!("Double-clicked at ({}, {})", x, y),
                    format!("Double-click at ({}, {})", x, y),
                ))
            }
            "type" => {
                let text = args.require_str("text")?;
                self.desktop.type_text(text).await?;
                Ok(Done::mutating(
                    format!("Typed {} characters", text.chars().count()),
                    format!("Type text '{}'", text),
                ))
            }
            "key" => {
                let combo = args
                    .str("keys")
                    .or_else(|| args.str("key"))
                    .or_else(|| args.str("text"))
                    .ok_or_else(|| ActionError::Malformed("missing key combination".into()))?;
                let shortcut = parse_shortcut(combo)?;
                self.desktop.send_shortcut(&shortcut).await?;
                Ok(Done::mutating(
                    format!("Pressed {}", shortcut),
                    format!("Press key {}", shortcut),
                ))
            }
            "open_app" => {
                let app = args
                    .str("app")
                    .or_else(|| args.str("name"))
                    .or_else(|| args.str("text"))
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| ActionError::Malformed("missing application name".into()))?;
                self.desktop.open_app(app).await?;
                Ok(Done::mutating(
                    format!("Opened {}", app),
                    format!("Open app {}", app),
                ))
            }
            "open_url" => {
                let url = args
                    .str("url")
                    .or_else(|| args.str("text"))
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| ActionError::Malformed("missing url".into()))?;
                self.desktop.open_url(url).await?;
                Ok(Done::mutating(
                    format!("Opened {}", url),
                    format!("Open URL {}", url),
                ))
            }
            "scroll" => {
                let (dx, dy) = args.delta()?;
                let (dx, dy) = (dx.round() as i32, dy.round() as i32);
                let mut step = format!("Scroll ({}, {})", dx, dy);
                if args.point().is_some() {
                    let (x, y) = self.screen_point(args).await?;
                    self.desktop.move_mouse(x, y).await?;
                    step.push_str(&format!(" at ({}, {})", x, y));
                }
                self.desktop.scroll(dx, dy).await?;
                Ok(Done::mutating(format!("Scrolled ({}, {})", dx, dy), step))
            }
            "wait" => {
                let requested = args
                    .f64("seconds")
                    .or_else(|| args.f64("duration"))
                    .filter(|s| *s >= 0.0)
                    .map(Duration::from_secs_f64)
                    .unwrap_or(self.options.default_wait);
                let wait = requested.min(self.options.max_wait);
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(Failure::Fatal(DispatchError::Cancelled));
                    }
                    _ = tokio::time::sleep(wait) => {}
                }
                let mut done = Done::observing(format!("Waited {:.1}s", wait.as_secs_f64()));
                done.step = Some(format!("Wait {:.1}s", wait.as_secs_f64()));
                Ok(done)
            }
            "terminal_exec" => self.run_terminal(args).await,
            other => Err(ActionError::UnknownAction(other.to_string()).into()),
        }
    }

    async fn run_terminal(&mut self, args: &ToolArgs) -> Result<Done, Failure> {
        let executable = args.require_str("executable")?.to_string();
        let argv = match args.get("args") {
            None => Vec::new(),
            Some(ArgValue::Array(items)) => items
                .iter()
                .map(|item| match item {
                    ArgValue::String(s) => Ok(s.clone()),
                    ArgValue::Number(n) => Ok(n.to_string()),
                    ArgValue::Bool(b) => Ok(b.to_string()),
                    _ => Err(ActionError::Malformed("args must be strings".into())),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(ActionError::Malformed("args must be an array".into()).into()),
        };
        let timeout = args
            .f64("timeout_seconds")
            .or_else(|| args.f64("timeout"))
            .filter(|s| *s > 0.0)
            .map(Duration::from_secs_f64);

        let request = TerminalRequest {
            executable,
            args: argv,
            timeout,
        };
        let command_line = std::iter::once(request.executable.as_str())
            .chain(request.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");

        match self.terminal.execute(&request).await {
            Ok(output) => {
                let body = json!({
                    "status": if output.timed_out { "timed_out" } else { "ok" },
                    "executable": output.executable,
                    "exit_code": output.exit_code,
                    "timed_out": output.timed_out,
                    "truncated": output.truncated,
                    "duration_ms": output.duration_ms,
                    "stdout": output.stdout,
                    "stderr": output.stderr,
                });
                Ok(Done {
                    text: body.to_string(),
                    step: Some(format!("Run terminal command: {}", command_line)),
                    is_error: output.timed_out,
                    mutating: false,
                    image: None,
                    questions: Vec::new(),
                })
            }
            Err(e) => {
                warn!("Terminal command rejected: {}", e);
                let body = json!({ "status": e.status(), "error": e.to_string() });
                Ok(Done {
                    text: body.to_string(),
                    step: None,
                    is_error: true,
                    mutating: false,
                    image: None,
                    questions: sandbox_question(&e, &command_line).into_iter().collect(),
                })
            }
        }
    }
}

/// Rejections the model cannot work around on its own.
fn sandbox_question(error: &SandboxError, command_line: &str) -> Option<String> {
    match error {
        SandboxError::PolicyViolation(_) => Some(format!(
            "The command '{}' is blocked for desktop control. Should the task be done through the computer tool instead?",
            command_line
        )),
        SandboxError::ExecutableNotFound(name) => Some(format!(
            "'{}' is not installed. Should it be installed, or is there another tool to use?",
            name
        )),
        SandboxError::InvalidRequest(_) | SandboxError::SpawnFailed(_) => None,
    }
}

impl std::fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDispatcher")
            .field("options", &self.options)
            .field("mapper", &self.mapper)
            .finish()
    }
}
