use crate::markup::error::MarkupError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Stroke color. Serialized as `#rrggbb`, or `#rrggbbaa` when not opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub fn from_hex(value: &str) -> Result<Self, MarkupError> {
        let invalid = || MarkupError::InvalidColor(value.to_string());
        let digits = value.strip_prefix('#').ok_or_else(invalid)?;
        if !(digits.len() == 6 || digits.len() == 8)
            || !digits.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| invalid());
        let a = if digits.len() == 8 { channel(6)? } else { 255 };
        Ok(Self::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }

    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl TryFrom<String> for Color {
    type Error = MarkupError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

/// Pixel dimensions of a media asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

/// A media asset as rendered by the host. `native` stays `None` until the
/// asset finishes loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: String,
    pub kind: MediaKind,
    pub url: String,
    pub display_width: f64,
    pub display_height: f64,
    #[serde(default)]
    pub native: Option<PixelSize>,
}

impl MediaAsset {
    pub fn image(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: MediaKind::Image,
            url: url.into(),
            display_width: 0.0,
            display_height: 0.0,
            native: None,
        }
    }

    pub fn with_display_size(mut self, width: f64, height: f64) -> Self {
        self.display_width = width;
        self.display_height = height;
        self
    }

    /// Record the native resolution once loading completes. Later calls are
    /// ignored; a loaded asset does not change size.
    pub fn mark_loaded(&mut self, width: u32, height: u32) {
        if self.native.is_none() {
            self.native = Some(PixelSize { width, height });
        }
    }

    pub fn is_drawable(&self) -> bool {
        self.kind == MediaKind::Image
    }
}

/// Axis-aligned box with non-negative extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Freehand,
    Line,
    Arrow,
    Circle,
    Rectangle,
    Text,
}

impl AnnotationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Freehand => "freehand",
            Self::Line => "line",
            Self::Arrow => "arrow",
            Self::Circle => "circle",
            Self::Rectangle => "rectangle",
            Self::Text => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Freehand { points: Vec<Point> },
    Line { start: Point, end: Point },
    Arrow { start: Point, end: Point },
    Circle { center: Point, edge: Point },
    Rectangle { corner1: Point, corner2: Point },
    Text { anchor: Point, text: String },
}

impl Shape {
    pub fn kind(&self) -> AnnotationKind {
        match self {
            Shape::Freehand { .. } => AnnotationKind::Freehand,
            Shape::Line { .. } => AnnotationKind::Line,
            Shape::Arrow { .. } => AnnotationKind::Arrow,
            Shape::Circle { .. } => AnnotationKind::Circle,
            Shape::Rectangle { .. } => AnnotationKind::Rectangle,
            Shape::Text { .. } => AnnotationKind::Text,
        }
    }

    /// Points in persisted order.
    pub fn points(&self) -> Vec<Point> {
        match self {
            Shape::Freehand { points } => points.clone(),
            Shape::Line { start, end } | Shape::Arrow { start, end } => vec![*start, *end],
            Shape::Circle { center, edge } => vec![*center, *edge],
            Shape::Rectangle { corner1, corner2 } => vec![*corner1, *corner2],
            Shape::Text { anchor, .. } => vec![*anchor],
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Shape::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Rebuild a shape from its persisted `(type, points, text)` triple.
    pub fn from_parts(
        kind: AnnotationKind,
        points: &[Point],
        text: Option<&str>,
    ) -> Result<Self, MarkupError> {
        let pair = || -> Result<(Point, Point), MarkupError> {
            match points {
                [a, b] => Ok((*a, *b)),
                _ => Err(MarkupError::InvalidAnnotation(format!(
                    "{} needs exactly 2 points, got {}",
                    kind.as_str(),
                    points.len()
                ))),
            }
        };
        match kind {
            AnnotationKind::Freehand => {
                if points.len() < 2 {
                    return Err(MarkupError::InvalidAnnotation(format!(
                        "freehand needs at least 2 points, got {}",
                        points.len()
                    )));
                }
                Ok(Shape::Freehand {
                    points: points.to_vec(),
                })
            }
            AnnotationKind::Line => pair().map(|(start, end)| Shape::Line { start, end }),
            AnnotationKind::Arrow => pair().map(|(start, end)| Shape::Arrow { start, end }),
            AnnotationKind::Circle => pair().map(|(center, edge)| Shape::Circle { center, edge }),
            AnnotationKind::Rectangle => {
                pair().map(|(corner1, corner2)| Shape::Rectangle { corner1, corner2 })
            }
            AnnotationKind::Text => {
                let [anchor] = points else {
                    return Err(MarkupError::InvalidAnnotation(format!(
                        "text needs exactly 1 anchor point, got {}",
                        points.len()
                    )));
                };
                let text = text.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
                    MarkupError::InvalidAnnotation("text annotation without text".to_string())
                })?;
                Ok(Shape::Text {
                    anchor: *anchor,
                    text: text.to_string(),
                })
            }
        }
    }

    /// True for shapes with no visible extent: zero-length lines and arrows,
    /// zero-radius circles, zero-area rectangles and single-spot freehand.
    pub fn is_degenerate(&self) -> bool {
        match self {
            Shape::Freehand { points } => points.windows(2).all(|w| w[0] == w[1]),
            Shape::Line { start, end } | Shape::Arrow { start, end } => start == end,
            Shape::Circle { center, edge } => center.distance_to(*edge) == 0.0,
            Shape::Rectangle { corner1, corner2 } => {
                let rect = Rect::from_corners(*corner1, *corner2);
                rect.width == 0.0 || rect.height == 0.0
            }
            Shape::Text { .. } => false,
        }
    }
}

/// Geometry plus style, committed or still being drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct Markup {
    pub shape: Shape,
    pub color: Color,
    pub stroke_width: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnnotationId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub id: AnnotationId,
    pub markup: Markup,
    pub created_at: DateTime<Utc>,
}

impl Annotation {
    pub fn kind(&self) -> AnnotationKind {
        self.markup.shape.kind()
    }
}

/// Coach rating on the 0-5 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Result<Self, MarkupError> {
        if value > Self::MAX {
            return Err(MarkupError::InvalidRating(value));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = MarkupError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Rating::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub strengths: String,
    pub improvements: String,
    pub overall_rating: Rating,
}

impl Feedback {
    pub fn is_empty(&self) -> bool {
        self.strengths.is_empty()
            && self.improvements.is_empty()
            && self.overall_rating.value() == 0
    }
}
