//! Full-redraw render pipeline.
//!
//! [`Renderer::redraw`] depends only on its inputs: the surface is cleared,
//! the base asset drawn, then every committed annotation in store order.
//! Surfaces are abstract so the same pass drives a pixel buffer or a
//! command recorder.

use crate::markup::input::RenderRequest;
use crate::markup::model::{Annotation, Color, Markup, Point, Rect, Shape};
use std::f64::consts::FRAC_PI_6;

pub const DEFAULT_ARROWHEAD_LENGTH: f64 = 15.0;
pub const DEFAULT_TEXT_SCALE: f64 = 6.0;

pub trait Surface {
    fn clear(&mut self);
    fn draw_base(&mut self);
    fn stroke_segment(&mut self, from: Point, to: Point, color: Color, stroke_width: u32);
    fn stroke_rect(&mut self, rect: Rect, color: Color, stroke_width: u32);
    fn stroke_circle(&mut self, center: Point, radius: f64, color: Color, stroke_width: u32);
    fn fill_text(&mut self, anchor: Point, text: &str, color: Color, font_px: f64);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Renderer {
    pub arrowhead_length: f64,
    pub text_scale: f64,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            arrowhead_length: DEFAULT_ARROWHEAD_LENGTH,
            text_scale: DEFAULT_TEXT_SCALE,
        }
    }
}

impl Renderer {
    pub fn redraw<S: Surface + ?Sized>(&self, surface: &mut S, annotations: &[Annotation]) {
        self.redraw_with_preview(surface, annotations, None);
    }

    pub fn redraw_with_preview<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        annotations: &[Annotation],
        preview: Option<&Markup>,
    ) {
        surface.clear();
        surface.draw_base();
        for annotation in annotations {
            self.draw_markup(surface, &annotation.markup);
        }
        if let Some(preview) = preview {
            self.draw_markup(surface, preview);
        }
    }

    /// Carry out a [`RenderRequest`] from the drawing engine. `Segment`
    /// strokes on top of the current frame; everything else redraws.
    pub fn apply<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        request: &RenderRequest,
        annotations: &[Annotation],
    ) {
        match request {
            RenderRequest::Nothing => {}
            RenderRequest::Segment {
                from,
                to,
                color,
                stroke_width,
            } => surface.stroke_segment(*from, *to, *color, *stroke_width),
            RenderRequest::Preview(markup) => {
                self.redraw_with_preview(surface, annotations, Some(markup))
            }
            RenderRequest::Full => self.redraw(surface, annotations),
        }
    }

    pub fn draw_markup<S: Surface + ?Sized>(&self, surface: &mut S, markup: &Markup) {
        let color = markup.color;
        let width = markup.stroke_width;
        match &markup.shape {
            Shape::Freehand { points } => {
                for pair in points.windows(2) {
                    surface.stroke_segment(pair[0], pair[1], color, width);
                }
            }
            Shape::Line { start, end } => surface.stroke_segment(*start, *end, color, width),
            Shape::Arrow { start, end } => {
                surface.stroke_segment(*start, *end, color, width);
                for barb in arrowhead(*start, *end, self.arrowhead_length) {
                    surface.stroke_segment(*end, barb, color, width);
                }
            }
            Shape::Circle { center, edge } => {
                surface.stroke_circle(*center, center.distance_to(*edge), color, width)
            }
            Shape::Rectangle { corner1, corner2 } => {
                surface.stroke_rect(Rect::from_corners(*corner1, *corner2), color, width)
            }
            Shape::Text { anchor, text } => {
                surface.fill_text(*anchor, text, color, self.font_px(width))
            }
        }
    }

    pub fn font_px(&self, stroke_width: u32) -> f64 {
        stroke_width as f64 * self.text_scale
    }
}

/// Barb end points of an arrowhead at `end`, at `θ - 30°` and `θ + 30°`
/// from the shaft angle.
pub fn arrowhead(start: Point, end: Point, length: f64) -> [Point; 2] {
    let theta = (end.y - start.y).atan2(end.x - start.x);
    let barb =
        |angle: f64| Point::new(end.x - length * angle.cos(), end.y - length * angle.sin());
    [barb(theta - FRAC_PI_6), barb(theta + FRAC_PI_6)]
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear,
    Base,
    Segment {
        from: Point,
        to: Point,
        color: Color,
        stroke_width: u32,
    },
    Rect {
        rect: Rect,
        color: Color,
        stroke_width: u32,
    },
    Circle {
        center: Point,
        radius: f64,
        color: Color,
        stroke_width: u32,
    },
    Text {
        anchor: Point,
        text: String,
        color: Color,
        font_px: f64,
    },
}

/// Surface that records the geometry it is asked to draw. `clear` drops the
/// previous frame, so `commands()` is always the current frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingSurface {
    commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }
}

impl Surface for RecordingSurface {
    fn clear(&mut self) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear);
    }

    fn draw_base(&mut self) {
        self.commands.push(DrawCommand::Base);
    }

    fn stroke_segment(&mut self, from: Point, to: Point, color: Color, stroke_width: u32) {
        self.commands.push(DrawCommand::Segment {
            from,
            to,
            color,
            stroke_width,
        });
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, stroke_width: u32) {
        self.commands.push(DrawCommand::Rect {
            rect,
            color,
            stroke_width,
        });
    }

    fn stroke_circle(&mut self, center: Point, radius: f64, color: Color, stroke_width: u32) {
        self.commands.push(DrawCommand::Circle {
            center,
            radius,
            color,
            stroke_width,
        });
    }

    fn fill_text(&mut self, anchor: Point, text: &str, color: Color, font_px: f64) {
        self.commands.push(DrawCommand::Text {
            anchor,
            text: text.to_string(),
            color,
            font_px,
        });
    }
}
