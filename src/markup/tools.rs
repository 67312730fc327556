use crate::markup::error::MarkupError;
use crate::markup::model::Color;
use serde::{Deserialize, Serialize};

pub const MIN_STROKE_WIDTH: u32 = 1;
pub const MAX_STROKE_WIDTH: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Freehand,
    Line,
    Arrow,
    Circle,
    Rectangle,
    Text,
    Eraser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolState {
    pub tool: Tool,
    pub color: Color,
    pub stroke_width: u32,
}

impl Default for ToolState {
    fn default() -> Self {
        Self {
            tool: Tool::Freehand,
            color: Color::RED,
            stroke_width: 3,
        }
    }
}

pub fn clamp_stroke_width(width: u32) -> u32 {
    width.clamp(MIN_STROKE_WIDTH, MAX_STROKE_WIDTH)
}

/// Active tool, color and stroke width. Plain setters; the drawing engine
/// decides when a change takes effect.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolController {
    state: ToolState,
    palette: Vec<Color>,
}

impl ToolController {
    pub fn new(initial: ToolState, palette: Vec<Color>) -> Self {
        Self {
            state: ToolState {
                stroke_width: clamp_stroke_width(initial.stroke_width),
                ..initial
            },
            palette,
        }
    }

    pub fn state(&self) -> ToolState {
        self.state
    }

    pub fn palette(&self) -> &[Color] {
        &self.palette
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.state.tool = tool;
    }

    pub fn set_color(&mut self, color: Color) {
        self.state.color = color;
    }

    pub fn set_color_hex(&mut self, hex: &str) -> Result<(), MarkupError> {
        self.state.color = Color::from_hex(hex)?;
        Ok(())
    }

    /// Pick a palette entry. Out-of-range indices leave the color unchanged.
    pub fn select_palette(&mut self, index: usize) -> Option<Color> {
        let color = self.palette.get(index).copied()?;
        self.state.color = color;
        Some(color)
    }

    /// Set the stroke width, clamped into `[1, 20]`. Returns the applied width.
    pub fn set_stroke_width(&mut self, width: u32) -> u32 {
        self.state.stroke_width = clamp_stroke_width(width);
        self.state.stroke_width
    }
}

impl Default for ToolController {
    fn default() -> Self {
        Self::new(ToolState::default(), Vec::new())
    }
}
