use crate::error::{ActionError, ScreenshotError};
use crate::keys::Shortcut;
use crate::screenshot::{CapturedScreenshot, RawCapture};
use async_trait::async_trait;

/// Low-level input injection. All points are coordinate-space pixels.
#[async_trait]
pub trait DesktopActionExecutor: Send + Sync {
    async fn open_app(&self, name: &str) -> Result<(), ActionError>;

    async fn open_url(&self, url: &str) -> Result<(), ActionError>;

    async fn send_shortcut(&self, shortcut: &Shortcut) -> Result<(), ActionError>;

    async fn type_text(&self, text: &str) -> Result<(), ActionError>;

    async fn move_mouse(&self, x: i32, y: i32) -> Result<(), ActionError>;

    async fn click(&self, x: i32, y: i32) -> Result<(), ActionError>;

    async fn right_click(&self, x: i32, y: i32) -> Result<(), ActionError>;

    async fn double_click(&self, x: i32, y: i32) -> Result<(), ActionError> {
        self.click(x, y).await?;
        self.click(x, y).await
    }

    async fn scroll(&self, dx: i32, dy: i32) -> Result<(), ActionError>;

    async fn cursor_position(&self) -> Result<(i32, i32), ActionError>;
}

/// OS-level screen capture.
#[async_trait]
pub trait ScreenshotProvider: Send + Sync {
    async fn capture(&self) -> Result<RawCapture, ScreenshotError>;
}

/// Fire-and-forget receiver of every screenshot actually transmitted.
pub trait ScreenshotLogSink: Send + Sync {
    fn record(&self, screenshot: &CapturedScreenshot);
}
