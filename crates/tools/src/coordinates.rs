use serde::Serialize;
use tracing::warn;

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Converts between the screenshot the model sees (tool-space) and the
/// logical pixels used for input injection (coordinate-space).
///
/// Scale factors are fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    tool: Dimensions,
    coordinate: Dimensions,
    scale_x: f64,
    scale_y: f64,
}

impl CoordinateMapper {
    pub fn new(tool: Dimensions, coordinate: Dimensions) -> Self {
        let (scale_x, scale_y) = if tool.is_empty() || coordinate.is_empty() {
            (1.0, 1.0)
        } else {
            (
                coordinate.width as f64 / tool.width as f64,
                coordinate.height as f64 / tool.height as f64,
            )
        };
        Self {
            tool,
            coordinate,
            scale_x,
            scale_y,
        }
    }

    pub fn scale(&self) -> (f64, f64) {
        (self.scale_x, self.scale_y)
    }

    /// Tool-space point to injectable screen pixels.
    pub fn to_screen(&self, x: f64, y: f64) -> (i32, i32) {
        let sx = clamp_axis((x * self.scale_x).round(), self.coordinate.width);
        let sy = clamp_axis((y * self.scale_y).round(), self.coordinate.height);
        if sx.1 || sy.1 {
            warn!(
                "Clamped screen point ({:.1}, {:.1}) to ({}, {})",
                x * self.scale_x,
                y * self.scale_y,
                sx.0,
                sy.0
            );
        }
        (sx.0, sy.0)
    }

    /// Screen pixels back to tool-space, for reporting the cursor to the model.
    pub fn to_tool(&self, x: f64, y: f64) -> (i32, i32) {
        let tx = clamp_axis((x / self.scale_x).round(), self.tool.width);
        let ty = clamp_axis((y / self.scale_y).round(), self.tool.height);
        (tx.0, ty.0)
    }
}

/// Clamp into `[0, extent-1]`; the flag is set when the value moved.
fn clamp_axis(value: f64, extent: u32) -> (i32, bool) {
    let max = extent.saturating_sub(1) as f64;
    let clamped = if value.is_nan() { 0.0 } else { value.clamp(0.0, max) };
    (clamped as i32, clamped != value)
}
