pub mod args;
pub mod coordinates;
pub mod definitions;
pub mod dispatcher;
pub mod error;
pub mod keys;
pub mod screenshot;
pub mod traits;

pub use args::{ArgValue, ToolArgs};
pub use coordinates::{CoordinateMapper, Dimensions};
pub use definitions::{tool_definitions, DESKTOP_TOOL_NAME, TERMINAL_TOOL_NAME};
pub use dispatcher::{ActionDispatcher, DispatchOptions, ToolExecutionResult};
pub use error::{ActionError, DispatchError, ScreenshotError};
pub use keys::{parse_shortcut, Modifier, Shortcut};
pub use screenshot::{CapturedScreenshot, RawCapture, ScreenshotPipeline};
pub use traits::{DesktopActionExecutor, ScreenshotLogSink, ScreenshotProvider};
