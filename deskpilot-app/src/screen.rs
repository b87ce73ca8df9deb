//! Screen capture through grim, sized with Hyprland monitor metadata.

use async_trait::async_trait;
use deskpilot_tools::{Dimensions, RawCapture, ScreenshotError, ScreenshotProvider};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Clone, Deserialize)]
struct Monitor {
    name: String,
    width: u32,
    height: u32,
    #[serde(default = "default_scale")]
    scale: f64,
    #[serde(default)]
    transform: u8,
    #[serde(default)]
    focused: bool,
}

fn default_scale() -> f64 {
    1.0
}

impl Monitor {
    /// Logical size the compositor uses for pointer coordinates.
    fn logical(&self) -> Dimensions {
        let scale = if self.scale > 0.0 { self.scale } else { 1.0 };
        let (w, h) = if self.transform % 2 == 1 {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        };
        Dimensions::new(
            (w as f64 / scale).round() as u32,
            (h as f64 / scale).round() as u32,
        )
    }
}

fn focused_monitor(json: &[u8]) -> Option<Monitor> {
    let monitors: Vec<Monitor> = serde_json::from_slice(json).ok()?;
    monitors
        .iter()
        .find(|m| m.focused)
        .or_else(|| monitors.first())
        .cloned()
}

/// Pixel size from the PNG header.
fn png_dimensions(png: &[u8]) -> Result<Dimensions, ScreenshotError> {
    let reader = image::io::Reader::with_format(
        std::io::Cursor::new(png),
        image::ImageFormat::Png,
    );
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| ScreenshotError::Image(e.to_string()))?;
    Ok(Dimensions::new(width, height))
}

#[derive(Debug, Default)]
pub struct GrimScreenshotProvider;

impl GrimScreenshotProvider {
    pub fn new() -> Self {
        Self
    }

    async fn monitor(&self) -> Option<Monitor> {
        let output = Command::new("hyprctl")
            .args(["monitors", "-j"])
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            warn!("hyprctl monitors failed; assuming unscaled output");
            return None;
        }
        focused_monitor(&output.stdout)
    }
}

#[async_trait]
impl ScreenshotProvider for GrimScreenshotProvider {
    async fn capture(&self) -> Result<RawCapture, ScreenshotError> {
        let monitor = self.monitor().await;
        let mut command = Command::new("grim");
        if let Some(monitor) = &monitor {
            command.args(["-o", &monitor.name]);
        }
        let output = command
            .arg("-")
            .output()
            .await
            .map_err(|e| ScreenshotError::Capture(format!("grim: {}", e)))?;
        if !output.status.success() {
            return Err(ScreenshotError::Capture(format!(
                "grim failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let capture = png_dimensions(&output.stdout)?;
        let coordinate = monitor.map(|m| m.logical()).unwrap_or(capture);
        debug!(
            "Captured {}x{} (coordinate space {}x{})",
            capture.width, capture.height, coordinate.width, coordinate.height
        );
        Ok(RawCapture {
            png: output.stdout,
            capture,
            coordinate,
        })
    }
}
