//! Backend-agnostic immediate-mode Canvas 2D engine.
//!
//! The engine keeps paint state, an independent logical transform and the
//! live path, and turns each canvas operation into draw objects for a single
//! injected [`RenderBackend`]. It uses:
//! - `tiny-skia` for the default raster backend
//! - `kurbo` for path geometry, arc lowering and hit testing
//! - `cosmic-text` for text shaping and glyph outlines
//! - `usvg`/`resvg` and `png` for image decoding
//!
//! # Example
//!
//! ```rust,ignore
//! use canvas2d_engine::{Canvas2dEngine, RectParams};
//!
//! let mut engine = Canvas2dEngine::new(400, 300)?;
//! engine.set_fill_style("#ff0000")?;
//! engine.set_shadow_color("rgba(0, 0, 0, 0.5)")?;
//! engine.set_shadow_offset_x(2.0);
//! engine.fill_rect(&RectParams::new(10.0, 10.0, 100.0, 50.0));
//! let png_data = engine.to_png(None)?;
//! ```

mod arc;
pub mod backend;
mod brush;
mod config;
mod context;
mod error;
mod filter;
mod font_parser;
mod geometry;
mod gradient;
pub mod image;
mod matrix;
mod paint_state;
mod path;
mod path2d;
mod pattern;
mod style;
pub mod text;
mod transform;

pub use arc::{fold_sweep, plan_arc, ArcPiece};
pub use backend::{RenderBackend, SkiaBackend};
pub use brush::{build_brush, shadow_spec, Brush, BrushContext, PaintTarget, PatternResolver};
pub use config::{EngineConfig, FontConfig, FontSet, FontSource, GenericFamily};
pub use context::Canvas2dEngine;
pub use error::{Canvas2dError, Canvas2dResult};
pub use filter::{is_percent_str, parse_filter, ColorMatrix, Filter, FilterUpdate};
pub use font_parser::{parse_font, FontSpec};
pub use geometry::{
    ArcParams, ArcToParams, CanvasColor, CanvasImageDataRef, ConicGradientParams, ContentFrame,
    ContentHost, CornerRadius, CubicBezierParams, DirtyRect, EllipseParams, FixedContentHost,
    ImageCropParams, ImageData, ImageDrawMode, LinearGradientParams, QuadraticBezierParams,
    RadialGradientParams, RectParams, RoundRectParams,
};
pub use gradient::{CanvasGradient, GradientKind, GradientStop};
pub use image::{DecodedImage, ImageProvider, ImageSource, RasterImage, SvgImage};
pub use matrix::Matrix;
pub use paint_state::{
    GlobalState, PaintSource, PaintState, PaintStateStack, SaveState, Shadow, StrokeState,
    TextStyle,
};
pub use path::CanvasPath;
pub use path2d::{parse_path2d, Path2D, PathCommand};
pub use pattern::{CanvasPattern, PatternImage, PatternRepetition};
pub use style::{
    CanvasFillRule, CompositeOperation, FontStyle, FontWeight, ImageSmoothingQuality, LineCap,
    LineJoin, SamplingQuality, TextAlign, TextBaseline, TextDirection,
};
pub use text::{CosmicTextShaper, Paragraph, ShapedParagraph, TextMetrics, TextShaper};
pub use transform::TransformEngine;
