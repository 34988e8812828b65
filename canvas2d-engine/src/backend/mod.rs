//! The rasterizer seam.
//!
//! Everything above this module builds backend-neutral draw objects
//! ([`Paint`], [`Shader`], [`ShadowSpec`], [`ImagePaint`]) and hands them to a
//! [`RenderBackend`]. Exactly one backend is injected into an engine at
//! construction; [`SkiaBackend`] is the default.

mod effects;
mod pattern_cache;
mod skia;

pub use skia::SkiaBackend;

use crate::error::Canvas2dResult;
use crate::filter::Filter;
use crate::geometry::{CanvasColor, ImageData};
use crate::image::{RasterImage, SvgImage};
use crate::matrix::Matrix;
use crate::path::CanvasPath;
use crate::pattern::PatternRepetition;
use crate::style::{CompositeOperation, LineCap, LineJoin, SamplingQuality};
use kurbo::{Point, Rect};
use std::rc::Rc;

/// Premultiplied RGBA8 pixels written with [`RenderBackend::write_pixels`].
pub type Bitmap = RasterImage;

/// A dash pattern with its phase.
#[derive(Debug, Clone, PartialEq)]
pub struct LineDash {
    pub intervals: Vec<f64>,
    pub offset: f64,
}

/// Stroke parameters, in user space.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeGeometry {
    pub width: f64,
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: f64,
    pub dash: Option<LineDash>,
}

/// Whether a paint fills the path or strokes its outline.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawTarget {
    Fill,
    Stroke(StrokeGeometry),
}

impl DrawTarget {
    pub fn is_stroke(&self) -> bool {
        matches!(self, DrawTarget::Stroke(_))
    }
}

/// A gradient stop in sorted order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShaderStop {
    pub offset: f64,
    pub color: CanvasColor,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RadialShape {
    /// One circle; stops run from its center outward.
    Single { center: Point, radius: f64 },
    /// Two circles, interpolated from the start circle to the end circle.
    TwoPoint {
        start: Point,
        start_radius: f64,
        end: Point,
        end_radius: f64,
    },
}

/// Source of color for a paint other than a solid color. Geometry is in
/// user space unless stated otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Shader {
    Linear {
        start: Point,
        end: Point,
        stops: Vec<ShaderStop>,
    },
    Radial {
        shape: RadialShape,
        stops: Vec<ShaderStop>,
    },
    /// Angular gradient. Angles are in degrees; `rotation` pre-rotates the
    /// frame about `center`.
    Sweep {
        center: Point,
        rotation: f64,
        start_angle: f64,
        end_angle: f64,
        stops: Vec<ShaderStop>,
    },
    /// Image tiling. `matrix` maps pattern space to device space;
    /// `pattern_id` keys backend-side caches.
    Pattern {
        image: Rc<RasterImage>,
        pattern_id: u64,
        repetition: PatternRepetition,
        matrix: Matrix,
        sampling: SamplingQuality,
    },
}

/// A complete fill or stroke description.
///
/// `alpha` is the effective paint opacity: for a solid color it already
/// includes the color's own alpha; for a shader it is the global alpha.
#[derive(Debug, Clone, PartialEq)]
pub struct Paint {
    pub target: DrawTarget,
    pub color: CanvasColor,
    pub shader: Option<Shader>,
    pub alpha: f64,
    pub composite: CompositeOperation,
    pub filter: Option<Filter>,
    pub sampling: SamplingQuality,
    pub anti_alias: bool,
}

impl Paint {
    pub fn fill() -> Self {
        Self {
            target: DrawTarget::Fill,
            color: CanvasColor::BLACK,
            shader: None,
            alpha: 1.0,
            composite: CompositeOperation::SourceOver,
            filter: None,
            sampling: SamplingQuality::default(),
            anti_alias: true,
        }
    }
}

/// A shadow pass. Offsets and blur are in device pixels. The shadow's
/// opacity is `color`'s alpha times the alpha of the paint casting it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSpec {
    pub color: CanvasColor,
    pub offset_x: f64,
    pub offset_y: f64,
    pub blur: f64,
}

/// Paint used for image and vector-image draws.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePaint {
    pub alpha: f64,
    pub composite: CompositeOperation,
    pub sampling: SamplingQuality,
    pub filter: Option<Filter>,
}

impl Default for ImagePaint {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            composite: CompositeOperation::SourceOver,
            sampling: SamplingQuality::default(),
            filter: None,
        }
    }
}

/// Drawing primitives the engine needs from a rasterizer.
///
/// The backend owns a matrix and clip stack. Paths arrive in user space and
/// are mapped through the current matrix; pixel reads and writes bypass both.
pub trait RenderBackend {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    fn save(&mut self);
    /// Pop one save. Restoring a layer composites it onto the surface below.
    fn restore(&mut self);
    /// Save, then redirect drawing into a transparent layer covering
    /// `bounds` (device space). The layer is composited with `composite`
    /// on the matching restore.
    fn save_layer(&mut self, bounds: Rect, composite: CompositeOperation);

    fn concat(&mut self, matrix: &Matrix);
    fn set_matrix(&mut self, matrix: &Matrix);
    fn matrix(&self) -> Matrix;

    /// Intersect the clip with `path` under the current matrix.
    fn clip_path(&mut self, path: &CanvasPath);

    fn draw_path(&mut self, path: &CanvasPath, paint: &Paint);
    /// Draw the shadow of `path` as `paint` would cover it.
    fn draw_shadow(&mut self, path: &CanvasPath, paint: &Paint, shadow: &ShadowSpec);
    /// Clear `rect` (user space) to transparent black, respecting the clip.
    fn clear_rect(&mut self, rect: Rect);

    /// Draw the `src` region of `image` into `dst` (user space).
    fn draw_image(&mut self, image: &RasterImage, src: Rect, dst: Rect, paint: &ImagePaint);
    /// Render a vector image through `matrix`, clipped to `clip` (user space).
    fn draw_svg(&mut self, image: &SvgImage, clip: Rect, matrix: &Matrix, paint: &ImagePaint);

    /// Overwrite device pixels starting at `(x, y)`; no blending, no clip.
    fn write_pixels(&mut self, bitmap: &Bitmap, x: i32, y: i32);
    /// Read device pixels as non-premultiplied RGBA. Pixels outside the
    /// surface read as transparent black.
    fn read_pixels(&self, x: i32, y: i32, width: u32, height: u32) -> ImageData;

    fn encode_png(&self, ppi: Option<f64>) -> Canvas2dResult<Vec<u8>>;

    /// Clear the surface and drop all saved state.
    fn reset(&mut self);
}
