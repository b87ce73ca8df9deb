use crate::coordinates::Dimensions;
use deskpilot_providers::ToolDefinition;
use serde_json::json;

pub const DESKTOP_TOOL_NAME: &str = "computer";
pub const TERMINAL_TOOL_NAME: &str = "terminal_exec";

pub const DESKTOP_ACTIONS: [&str; 13] = [
    "screenshot",
    "cursor_position",
    "mouse_move",
    "left_click",
    "right_click",
    "double_click",
    "type",
    "key",
    "open_app",
    "open_url",
    "scroll",
    "wait",
    "terminal_exec",
];

/// Desktop action tool, sized to the screenshot the model is looking at.
pub fn desktop_tool(screen: Dimensions) -> ToolDefinition {
    ToolDefinition {
        name: DESKTOP_TOOL_NAME.to_string(),
        description: format!(
            "Control the desktop with mouse, keyboard and app launching. \
             The screen is {}x{} pixels; coordinates are in that space with \
             the origin at the top-left. Call with action=screenshot to look \
             at the screen again.",
            screen.width, screen.height
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": DESKTOP_ACTIONS,
                },
                "x": { "type": "number", "description": "Horizontal pixel" },
                "y": { "type": "number", "description": "Vertical pixel" },
                "coordinate": {
                    "type": "array",
                    "items": { "type": "number" },
                    "minItems": 2,
                    "maxItems": 2,
                    "description": "[x, y] alternative to x and y"
                },
                "text": { "type": "string", "description": "Text for type, or combination for key such as cmd+shift+t" },
                "keys": { "type": "string", "description": "Key combination for key" },
                "app": { "type": "string", "description": "Application name for open_app" },
                "url": { "type": "string", "description": "URL for open_url" },
                "dx": { "type": "number" },
                "dy": { "type": "number", "description": "Positive scrolls up" },
                "direction": { "type": "string", "enum": ["up", "down", "left", "right"] },
                "amount": { "type": "number" },
                "seconds": { "type": "number", "description": "Duration for wait" },
                "executable": { "type": "string" },
                "args": { "type": "array", "items": { "type": "string" } },
                "timeout_seconds": { "type": "number" }
            },
            "required": ["action"]
        }),
    }
}

pub fn terminal_tool() -> ToolDefinition {
    ToolDefinition {
        name: TERMINAL_TOOL_NAME.to_string(),
        description: "Run one non-interactive command without a shell and return its \
                      exit code and output. Use the computer tool for anything that \
                      touches windows, menus, the mouse or the keyboard."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "executable": {
                    "type": "string",
                    "description": "Absolute path or a name found on PATH"
                },
                "args": { "type": "array", "items": { "type": "string" } },
                "timeout_seconds": {
                    "type": "number",
                    "description": "Defaults to 30, capped at 120"
                }
            },
            "required": ["executable"]
        }),
    }
}

/// Both tools, in the order they are advertised.
pub fn tool_definitions(screen: Dimensions) -> Vec<ToolDefinition> {
    vec![desktop_tool(screen), terminal_tool()]
}
