use crate::markup::input::DegeneratePolicy;
use crate::markup::model::Color;
use crate::markup::render::{Renderer, DEFAULT_ARROWHEAD_LENGTH, DEFAULT_TEXT_SCALE};
use crate::markup::session::SessionConfig;
use crate::markup::tools::{clamp_stroke_width, Tool, ToolController, ToolState};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageSettings {
    /// HTTP endpoint for finished records. Takes precedence over `export_dir`.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub export_dir: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            export_dir: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarkupSettings {
    #[serde(default = "default_lock_duration_ms")]
    pub lock_duration_ms: u64,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_surface_init_backoff_ms")]
    pub surface_init_backoff_ms: Vec<u64>,
    #[serde(default = "default_quick_colors")]
    pub quick_colors: Vec<Color>,
    #[serde(default = "default_tool")]
    pub default_tool: Tool,
    #[serde(default = "default_color")]
    pub default_color: Color,
    #[serde(default = "default_stroke_width")]
    pub default_stroke_width: u32,
    #[serde(default = "default_arrowhead_length")]
    pub arrowhead_length: f64,
    #[serde(default = "default_text_scale")]
    pub text_scale: f64,
    #[serde(default)]
    pub degenerate_policy: DegeneratePolicy,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub debug_logging: bool,
}

fn default_lock_duration_ms() -> u64 {
    10_000
}

fn default_heartbeat_interval_ms() -> u64 {
    10_000
}

fn default_surface_init_backoff_ms() -> Vec<u64> {
    vec![50, 100, 200, 400, 800]
}

fn default_quick_colors() -> Vec<Color> {
    vec![
        Color::rgb(255, 0, 0),
        Color::rgb(255, 214, 0),
        Color::rgb(0, 200, 83),
        Color::rgb(41, 121, 255),
        Color::rgb(255, 255, 255),
        Color::rgb(0, 0, 0),
    ]
}

fn default_tool() -> Tool {
    Tool::Freehand
}

fn default_color() -> Color {
    Color::RED
}

fn default_stroke_width() -> u32 {
    3
}

fn default_arrowhead_length() -> f64 {
    DEFAULT_ARROWHEAD_LENGTH
}

fn default_text_scale() -> f64 {
    DEFAULT_TEXT_SCALE
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for MarkupSettings {
    fn default() -> Self {
        Self {
            lock_duration_ms: default_lock_duration_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            surface_init_backoff_ms: default_surface_init_backoff_ms(),
            quick_colors: default_quick_colors(),
            default_tool: default_tool(),
            default_color: default_color(),
            default_stroke_width: default_stroke_width(),
            arrowhead_length: default_arrowhead_length(),
            text_scale: default_text_scale(),
            degenerate_policy: DegeneratePolicy::default(),
            storage: StorageSettings::default(),
            debug_logging: false,
        }
    }
}

impl MarkupSettings {
    /// Repair values a hand-edited file can get wrong. Returns whether
    /// anything changed.
    pub fn sanitize(&mut self) -> bool {
        let mut changed = false;
        let width = clamp_stroke_width(self.default_stroke_width);
        if width != self.default_stroke_width {
            self.default_stroke_width = width;
            changed = true;
        }
        if self.quick_colors.is_empty() {
            self.quick_colors = default_quick_colors();
            changed = true;
        }
        if self.surface_init_backoff_ms.is_empty() {
            self.surface_init_backoff_ms = default_surface_init_backoff_ms();
            changed = true;
        }
        if !(self.arrowhead_length.is_finite() && self.arrowhead_length > 0.0) {
            self.arrowhead_length = default_arrowhead_length();
            changed = true;
        }
        if !(self.text_scale.is_finite() && self.text_scale > 0.0) {
            self.text_scale = default_text_scale();
            changed = true;
        }
        if self.heartbeat_interval_ms == 0 {
            self.heartbeat_interval_ms = default_heartbeat_interval_ms();
            changed = true;
        }
        changed
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            lock_duration: Duration::from_millis(self.lock_duration_ms),
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
        }
    }

    pub fn backoff_schedule(&self) -> Vec<Duration> {
        self.surface_init_backoff_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect()
    }

    pub fn tool_controller(&self) -> ToolController {
        ToolController::new(
            ToolState {
                tool: self.default_tool,
                color: self.default_color,
                stroke_width: self.default_stroke_width,
            },
            self.quick_colors.clone(),
        )
    }

    pub fn renderer(&self) -> Renderer {
        Renderer {
            arrowhead_length: self.arrowhead_length,
            text_scale: self.text_scale,
        }
    }
}
