//! Parameter structs for Canvas 2D drawing operations.
//!
//! These structs replace long positional argument lists with named fields,
//! grouping semantically related parameters together.

use crate::error::{Canvas2dError, Canvas2dResult};

/// Parameters for a circular arc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcParams {
    /// X coordinate of the arc center.
    pub x: f64,
    /// Y coordinate of the arc center.
    pub y: f64,
    /// Radius of the arc.
    pub radius: f64,
    /// Starting angle in radians.
    pub start_angle: f64,
    /// Ending angle in radians.
    pub end_angle: f64,
    /// If true, draw arc counterclockwise.
    pub anticlockwise: bool,
}

/// Parameters for an elliptical arc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipseParams {
    /// X coordinate of the ellipse center.
    pub x: f64,
    /// Y coordinate of the ellipse center.
    pub y: f64,
    /// X-axis radius of the ellipse.
    pub radius_x: f64,
    /// Y-axis radius of the ellipse.
    pub radius_y: f64,
    /// Rotation of the ellipse in radians.
    pub rotation: f64,
    /// Starting angle in radians.
    pub start_angle: f64,
    /// Ending angle in radians.
    pub end_angle: f64,
    /// If true, draw arc counterclockwise.
    pub anticlockwise: bool,
}

impl From<&ArcParams> for EllipseParams {
    fn from(arc: &ArcParams) -> Self {
        Self {
            x: arc.x,
            y: arc.y,
            radius_x: arc.radius,
            radius_y: arc.radius,
            rotation: 0.0,
            start_angle: arc.start_angle,
            end_angle: arc.end_angle,
            anticlockwise: arc.anticlockwise,
        }
    }
}

/// Parameters for an arcTo operation.
///
/// The arc is drawn from the current point through a tangent defined by
/// two control points with a given radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcToParams {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub radius: f64,
}

/// Parameters for a cubic Bezier curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezierParams {
    pub cp1x: f64,
    pub cp1y: f64,
    pub cp2x: f64,
    pub cp2y: f64,
    pub x: f64,
    pub y: f64,
}

/// Parameters for a quadratic Bezier curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadraticBezierParams {
    pub cpx: f64,
    pub cpy: f64,
    pub x: f64,
    pub y: f64,
}

/// Parameters for a rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectParams {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RectParams {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The same rectangle shifted by a content offset.
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0.0 || self.height == 0.0
    }

    /// Normalized kurbo rectangle (negative sizes flip the origin).
    pub fn to_kurbo(&self) -> kurbo::Rect {
        kurbo::Rect::new(self.x, self.y, self.x + self.width, self.y + self.height).abs()
    }
}

/// An independent x/y corner radius for rounded rectangles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerRadius {
    pub x: f64,
    pub y: f64,
}

impl CornerRadius {
    /// Create a corner radius with equal x and y values.
    pub const fn uniform(r: f64) -> Self {
        Self { x: r, y: r }
    }
}

/// Parameters for a rounded rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundRectParams {
    pub rect: RectParams,
    /// Corner radii in order: [top-left, top-right, bottom-right, bottom-left].
    pub radii: [CornerRadius; 4],
}

/// Source and destination rectangles for a cropped image draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageCropParams {
    pub sx: f64,
    pub sy: f64,
    pub sw: f64,
    pub sh: f64,
    pub dx: f64,
    pub dy: f64,
    pub dw: f64,
    pub dh: f64,
}

/// How a whole image or a sub-image is addressed by an image draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageDrawMode {
    /// Whole image at its natural size with its top-left corner at `(dx, dy)`.
    At { dx: f64, dy: f64 },
    /// Whole image scaled into a destination rectangle.
    Scaled(RectParams),
    /// Explicit source rectangle mapped onto a destination rectangle.
    Cropped(ImageCropParams),
}

/// A dirty rectangle for partial image data writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRect {
    /// X offset into the source data.
    pub x: i32,
    /// Y offset into the source data.
    pub y: i32,
    /// Width of region to copy.
    pub width: i32,
    /// Height of region to copy.
    pub height: i32,
}

/// Parameters for creating a linear gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearGradientParams {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

/// Parameters for creating a radial gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialGradientParams {
    /// Inner circle center X.
    pub x0: f64,
    /// Inner circle center Y.
    pub y0: f64,
    /// Inner circle radius.
    pub r0: f64,
    /// Outer circle center X.
    pub x1: f64,
    /// Outer circle center Y.
    pub y1: f64,
    /// Outer circle radius.
    pub r1: f64,
}

/// Parameters for creating a conic (sweep) gradient.
///
/// All three fields must be present for a shader to be produced.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConicGradientParams {
    pub center_x: Option<f64>,
    pub center_y: Option<f64>,
    /// Start angle in radians.
    pub start_angle: Option<f64>,
}

/// A backend-neutral RGBA color with 8-bit components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanvasColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl CanvasColor {
    pub const BLACK: CanvasColor = CanvasColor::from_rgba8(0, 0, 0, 255);
    pub const TRANSPARENT: CanvasColor = CanvasColor::from_rgba8(0, 0, 0, 0);

    /// Create a color from 8-bit RGBA components.
    pub const fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse a CSS color string (`"red"`, `"#ff000080"`, `"rgba(0,0,0,0.5)"`).
    pub fn parse(value: &str) -> Canvas2dResult<Self> {
        let color = csscolorparser::parse(value)
            .map_err(|e| Canvas2dError::ColorParseError(format!("{value}: {e}")))?;
        let [r, g, b, a] = color.to_rgba8();
        Ok(Self { r, g, b, a })
    }

    /// Alpha channel normalized to `[0, 1]`.
    pub fn alpha_f64(&self) -> f64 {
        self.a as f64 / 255.0
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }
}

impl Default for CanvasColor {
    fn default() -> Self {
        Self::BLACK
    }
}

/// A reference to non-premultiplied RGBA image data.
#[derive(Debug, Clone, Copy)]
pub struct CanvasImageDataRef<'a> {
    /// RGBA pixel data, non-premultiplied, 4 bytes per pixel.
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
}

/// Owned non-premultiplied RGBA pixels, as returned by `get_image_data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl ImageData {
    /// Transparent black image data of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0; width as usize * height as usize * 4],
            width,
            height,
        }
    }

    pub fn as_data_ref(&self) -> CanvasImageDataRef<'_> {
        CanvasImageDataRef {
            data: &self.data,
            width: self.width,
            height: self.height,
        }
    }
}

/// Content-local origin and size of the node that owns the canvas, as
/// reported for a single draw call.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContentFrame {
    pub offset_x: f64,
    pub offset_y: f64,
    pub width: f64,
    pub height: f64,
}

impl ContentFrame {
    pub fn is_finite(&self) -> bool {
        self.offset_x.is_finite()
            && self.offset_y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }
}

/// Supplies the content offset and size for each draw call.
///
/// Returning `None` means the hosting node is gone; the engine treats the
/// operation as a no-op.
pub trait ContentHost {
    fn content_frame(&self) -> Option<ContentFrame>;
}

/// A host with a fixed content frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FixedContentHost(pub ContentFrame);

impl ContentHost for FixedContentHost {
    fn content_frame(&self) -> Option<ContentFrame> {
        Some(self.0)
    }
}
