use crate::markup::model::{Color, Markup, PixelSize, Point, Rect};
use crate::markup::render::{Renderer, Surface};
use crate::markup::store::AnnotationStore;
use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::{ImageFormat, RgbaImage};
use std::path::Path;

const WIDE_STROKE_THRESHOLD: u32 = 10;
const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

/// RGBA pixel surface in native asset resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    base: Option<Vec<u8>>,
    background: Color,
}

impl RasterSurface {
    /// Surface without a base image; `draw_base` fills with `background`.
    pub fn new(size: PixelSize, background: Color) -> Result<Self> {
        let len = buffer_len(size)
            .ok_or_else(|| anyhow!("{}x{} surface is too large", size.width, size.height))?;
        Ok(Self {
            width: size.width,
            height: size.height,
            pixels: vec![0u8; len],
            base: None,
            background,
        })
    }

    /// Surface over a decoded asset. The image is resized when its
    /// dimensions do not match the native size the mapper works in.
    pub fn with_base(base: &RgbaImage, size: PixelSize) -> Result<Self> {
        let base = if base.dimensions() == (size.width, size.height) {
            base.clone()
        } else {
            tracing::debug!(
                from_width = base.width(),
                from_height = base.height(),
                to_width = size.width,
                to_height = size.height,
                "resizing base image to native size"
            );
            image::imageops::resize(base, size.width, size.height, FilterType::Triangle)
        };
        let mut surface = Self::new(size, Color::BLACK)?;
        surface.base = Some(base.into_raw());
        Ok(surface)
    }

    pub fn size(&self) -> PixelSize {
        PixelSize {
            width: self.width,
            height: self.height,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = self.index(x, y);
        Some(Color::rgba(
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ))
    }

    pub fn copy_from(&mut self, other: &RasterSurface) {
        if self.pixels.len() == other.pixels.len() {
            self.pixels.copy_from_slice(&other.pixels);
        } else {
            self.pixels = other.pixels.clone();
        }
        self.width = other.width;
        self.height = other.height;
    }

    pub fn to_image(&self) -> Result<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| anyhow!("pixel buffer does not match {}x{}", self.width, self.height))
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create export folder {}", parent.display()))?;
        }
        self.to_image()?
            .save_with_format(path, ImageFormat::Png)
            .with_context(|| format!("write png {}", path.display()))
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    fn fill(&mut self, color: Color) {
        for px in self.pixels.chunks_exact_mut(4) {
            px[0] = color.r;
            px[1] = color.g;
            px[2] = color.b;
            px[3] = color.a;
        }
    }

    fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let idx = self.index(x as u32, y as u32);
        let out = if color.a == 255 {
            color
        } else {
            let bottom = Color::rgba(
                self.pixels[idx],
                self.pixels[idx + 1],
                self.pixels[idx + 2],
                self.pixels[idx + 3],
            );
            blend_pixel(bottom, color)
        };
        self.pixels[idx] = out.r;
        self.pixels[idx + 1] = out.g;
        self.pixels[idx + 2] = out.b;
        self.pixels[idx + 3] = out.a;
    }

    fn draw_brush(&mut self, center: (i32, i32), color: Color, stroke_width: u32) {
        let radius = (stroke_width.saturating_sub(1) / 2) as i32;
        for y in (center.1 - radius)..=(center.1 + radius) {
            for x in (center.0 - radius)..=(center.0 + radius) {
                let dx = x - center.0;
                let dy = y - center.1;
                if dx * dx + dy * dy <= radius * radius {
                    self.set_pixel(x, y, color);
                }
            }
        }
    }

    fn draw_segment_dense(&mut self, start: (i32, i32), end: (i32, i32), color: Color, w: u32) {
        let (mut x0, mut y0) = start;
        let (x1, y1) = end;
        let dx = (x1 - x0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let dy = -(y1 - y0).abs();
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.draw_brush((x0, y0), color, w);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    fn draw_segment_capsule(&mut self, start: (i32, i32), end: (i32, i32), color: Color, w: u32) {
        let radius = (w.saturating_sub(1) / 2) as f32;
        let pad = radius.ceil() as i32 + 1;
        let x0 = (start.0.min(end.0) - pad).max(0);
        let y0 = (start.1.min(end.1) - pad).max(0);
        let x1 = (start.0.max(end.0) + pad).min(self.width as i32 - 1);
        let y1 = (start.1.max(end.1) + pad).min(self.height as i32 - 1);
        let radius_sq = radius * radius;
        for y in y0..=y1 {
            for x in x0..=x1 {
                if point_segment_distance_sq((x, y), start, end) <= radius_sq {
                    self.set_pixel(x, y, color);
                }
            }
        }
    }
}

impl Surface for RasterSurface {
    fn clear(&mut self) {
        self.fill(TRANSPARENT);
    }

    fn draw_base(&mut self) {
        let len = self.pixels.len();
        if let Some(base) = self.base.as_ref().filter(|base| base.len() == len) {
            self.pixels.copy_from_slice(base);
            return;
        }
        self.fill(self.background);
    }

    fn stroke_segment(&mut self, from: Point, to: Point, color: Color, stroke_width: u32) {
        let start = to_pixel(from);
        let end = to_pixel(to);
        if stroke_width >= WIDE_STROKE_THRESHOLD && start != end {
            self.draw_segment_capsule(start, end, color, stroke_width);
        } else {
            self.draw_segment_dense(start, end, color, stroke_width);
        }
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, stroke_width: u32) {
        let tl = Point::new(rect.x, rect.y);
        let tr = Point::new(rect.x + rect.width, rect.y);
        let br = Point::new(rect.x + rect.width, rect.y + rect.height);
        let bl = Point::new(rect.x, rect.y + rect.height);
        for (from, to) in [(tl, tr), (tr, br), (br, bl), (bl, tl)] {
            self.stroke_segment(from, to, color, stroke_width);
        }
    }

    fn stroke_circle(&mut self, center: Point, radius: f64, color: Color, stroke_width: u32) {
        let circumference = std::f64::consts::TAU * radius;
        let steps = circumference.max(12.0) as usize;
        for step in 0..=steps {
            let t = (step as f64 / steps as f64) * std::f64::consts::TAU;
            let x = (center.x + radius * t.cos()).round() as i32;
            let y = (center.y + radius * t.sin()).round() as i32;
            self.draw_brush((x, y), color, stroke_width);
        }
    }

    /// No glyph rasterizer: text is drawn as a baseline bar as wide as the
    /// string would be, so exports still show where the callout sits.
    fn fill_text(&mut self, anchor: Point, text: &str, color: Color, font_px: f64) {
        let advance = text.chars().count() as f64 * font_px * 0.6;
        let thickness = (font_px / 6.0).round().max(1.0) as u32;
        let end = Point::new(anchor.x + advance, anchor.y);
        self.stroke_segment(anchor, end, color, thickness);
    }
}

/// Committed annotations rasterized once per store revision; each frame
/// only copies that layer and strokes the live preview on top.
#[derive(Debug, Clone)]
pub struct LayeredRaster {
    committed: RasterSurface,
    composed: RasterSurface,
    renderer: Renderer,
    committed_revision: Option<u64>,
    committed_rebuilds: usize,
}

impl LayeredRaster {
    pub fn new(surface: RasterSurface, renderer: Renderer) -> Self {
        Self {
            committed: surface.clone(),
            composed: surface,
            renderer,
            committed_revision: None,
            committed_rebuilds: 0,
        }
    }

    pub fn render(&mut self, store: &AnnotationStore, preview: Option<&Markup>) -> &RasterSurface {
        if self.committed_revision != Some(store.revision()) {
            self.renderer.redraw(&mut self.committed, store.annotations());
            self.committed_revision = Some(store.revision());
            self.committed_rebuilds += 1;
        }
        self.composed.copy_from(&self.committed);
        if let Some(preview) = preview {
            self.renderer.draw_markup(&mut self.composed, preview);
        }
        &self.composed
    }

    /// Stroke a freehand segment straight onto the presented frame.
    pub fn stroke_segment(&mut self, from: Point, to: Point, color: Color, stroke_width: u32) {
        self.composed.stroke_segment(from, to, color, stroke_width);
    }

    /// Force the committed layer to rebuild, e.g. after the base changed.
    pub fn invalidate(&mut self) {
        self.committed_revision = None;
    }

    pub fn frame(&self) -> &RasterSurface {
        &self.composed
    }

    pub fn committed_rebuilds(&self) -> usize {
        self.committed_rebuilds
    }
}

fn buffer_len(size: PixelSize) -> Option<usize> {
    (size.width as usize)
        .checked_mul(size.height as usize)?
        .checked_mul(4)
}

fn to_pixel(point: Point) -> (i32, i32) {
    (point.x.round() as i32, point.y.round() as i32)
}

fn point_segment_distance_sq(point: (i32, i32), start: (i32, i32), end: (i32, i32)) -> f32 {
    let (px, py) = (point.0 as f32, point.1 as f32);
    let (x0, y0) = (start.0 as f32, start.1 as f32);
    let (vx, vy) = ((end.0 - start.0) as f32, (end.1 - start.1) as f32);
    let len_sq = vx * vx + vy * vy;
    let t = if len_sq <= f32::EPSILON {
        0.0
    } else {
        (((px - x0) * vx + (py - y0) * vy) / len_sq).clamp(0.0, 1.0)
    };
    let dx = px - (x0 + vx * t);
    let dy = py - (y0 + vy * t);
    dx * dx + dy * dy
}

fn blend_pixel(bottom: Color, top: Color) -> Color {
    let sa = top.a as f32 / 255.0;
    let da = bottom.a as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= f32::EPSILON {
        return TRANSPARENT;
    }

    let blend = |s: u8, d: u8| -> u8 {
        (((s as f32 * sa) + (d as f32 * da * (1.0 - sa))) / out_a)
            .round()
            .clamp(0.0, 255.0) as u8
    };
    Color::rgba(
        blend(top.r, bottom.r),
        blend(top.g, bottom.g),
        blend(top.b, bottom.b),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    )
}
