//! The canvas engine: the public operation set, sequencing paint state,
//! transforms, brushes, text and images onto one [`RenderBackend`].

mod drawing;
mod image_ops;
mod path_ops;
mod text_rendering;
mod transform;

use crate::backend::{RenderBackend, SkiaBackend};
use crate::config::EngineConfig;
use crate::error::Canvas2dResult;
use crate::filter::{parse_filter, FilterUpdate};
use crate::geometry::{
    CanvasColor, ConicGradientParams, ContentFrame, ContentHost, FixedContentHost,
    LinearGradientParams, RadialGradientParams,
};
use crate::gradient::CanvasGradient;
use crate::image::{FileImageProvider, ImageProvider, ImagePipeline, ImageSource};
use crate::paint_state::{PaintSource, PaintStateStack};
use crate::path::CanvasPath;
use crate::pattern::CanvasPattern;
use crate::style::{CompositeOperation, ImageSmoothingQuality, LineCap, LineJoin};
use crate::text::{CosmicTextShaper, TextShaper};
use crate::transform::TransformEngine;
use std::rc::Rc;

/// Canvas 2D engine over a rendering backend.
///
/// Every operation asks the content host for the current frame first; with
/// no host, or a host that reports no frame, the operation does nothing.
/// Path coordinates are content-local and have the frame's offset added once
/// as they enter the live path.
pub struct Canvas2dEngine<B: RenderBackend = SkiaBackend> {
    pub(crate) backend: B,
    host: Option<Box<dyn ContentHost>>,
    pub(crate) paint: PaintStateStack,
    pub(crate) transform: TransformEngine,
    /// Live path, offset already applied.
    pub(crate) path: CanvasPath,
    pub(crate) images: ImagePipeline,
    pub(crate) shaper: Box<dyn TextShaper>,
    pub(crate) view_scale: f64,
    pub(crate) anti_alias: bool,
}

impl Canvas2dEngine<SkiaBackend> {
    /// Create a raster engine with default configuration.
    ///
    /// Loads system fonts; see [`Canvas2dEngine::with_config`] to control
    /// font discovery.
    pub fn new(width: u32, height: u32) -> Canvas2dResult<Self> {
        Self::with_config(width, height, &EngineConfig::default())
    }

    pub fn with_config(width: u32, height: u32, config: &EngineConfig) -> Canvas2dResult<Self> {
        let backend = SkiaBackend::new(width, height)?;
        Ok(Self::with_backend(backend, config))
    }

    /// The raster surface.
    pub fn pixmap(&self) -> &tiny_skia::Pixmap {
        self.backend.pixmap()
    }
}

impl<B: RenderBackend> Canvas2dEngine<B> {
    /// Create an engine over `backend`, decoding images from the filesystem
    /// and shaping text with cosmic-text.
    pub fn with_backend(backend: B, config: &EngineConfig) -> Self {
        let shaper = CosmicTextShaper::new(&config.font.load());
        Self::with_parts(
            backend,
            config,
            Rc::new(FileImageProvider::new()),
            Box::new(shaper),
        )
    }

    /// Create an engine from explicit collaborators.
    pub fn with_parts(
        backend: B,
        config: &EngineConfig,
        provider: Rc<dyn ImageProvider>,
        shaper: Box<dyn TextShaper>,
    ) -> Self {
        let frame = ContentFrame {
            offset_x: 0.0,
            offset_y: 0.0,
            width: backend.width() as f64,
            height: backend.height() as f64,
        };
        let view_scale = if config.view_scale.is_finite() && config.view_scale > 0.0 {
            config.view_scale
        } else {
            log::warn!("invalid view scale {}, using 1.0", config.view_scale);
            1.0
        };
        let mut engine = Self {
            backend,
            host: Some(Box::new(FixedContentHost(frame))),
            paint: PaintStateStack::new(),
            transform: TransformEngine::new(),
            path: CanvasPath::new(),
            images: ImagePipeline::new(provider, config.image_cache_capacity),
            shaper,
            view_scale,
            anti_alias: config.anti_alias,
        };
        engine.sync_matrix();
        engine
    }

    pub fn width(&self) -> u32 {
        self.backend.width()
    }

    pub fn height(&self) -> u32 {
        self.backend.height()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Replace the content host.
    pub fn set_host(&mut self, host: Box<dyn ContentHost>) {
        self.host = Some(host);
    }

    /// Detach the content host; every operation becomes a no-op until a new
    /// host is set.
    pub fn clear_host(&mut self) {
        self.host = None;
    }

    pub fn paint_state(&self) -> &PaintStateStack {
        &self.paint
    }

    /// The image decode cache and load tracker, for registering completion
    /// callbacks.
    pub fn images(&self) -> &ImagePipeline {
        &self.images
    }

    pub fn view_scale(&self) -> f64 {
        self.view_scale
    }

    /// Frame for the current operation, or `None` when the host is gone or
    /// reports a non-finite frame.
    pub(crate) fn frame(&self, op: &str) -> Option<ContentFrame> {
        let Some(frame) = self.host.as_ref().and_then(|host| host.content_frame()) else {
            log::debug!(target: "canvas", "{}: no content host, skipped", op);
            return None;
        };
        if !frame.is_finite() {
            log::warn!(target: "canvas", "{}: non-finite content frame {:?}, skipped", op, frame);
            return None;
        }
        Some(frame)
    }

    pub(crate) fn sync_matrix(&mut self) {
        let matrix = self.transform.device_matrix(self.view_scale);
        self.backend.set_matrix(&matrix);
    }

    /// Push paint state, the logical transform and the backend state.
    pub fn save(&mut self) {
        if self.frame("save").is_none() {
            return;
        }
        log::debug!(target: "canvas", "save");
        self.paint.save();
        self.transform.save();
        self.backend.save();
    }

    /// Pop the most recent save; with nothing saved this does nothing.
    pub fn restore(&mut self) {
        if self.frame("restore").is_none() {
            return;
        }
        log::debug!(target: "canvas", "restore");
        if !self.paint.restore() {
            log::debug!(target: "canvas", "restore with empty stack ignored");
            return;
        }
        self.transform.restore();
        self.backend.restore();
    }

    /// Clear the surface and return every piece of state to its default.
    /// The image cache is kept.
    pub fn reset(&mut self) {
        log::debug!(target: "canvas", "reset");
        self.backend.reset();
        self.paint.reset();
        self.transform.reset();
        self.path.clear();
        self.sync_matrix();
    }

    // --- Paint sources ---

    /// Set the fill to a CSS color. Unparseable colors leave the fill
    /// unchanged.
    pub fn set_fill_style(&mut self, style: &str) -> Canvas2dResult<()> {
        let color = CanvasColor::parse(style)?;
        self.set_fill_style_color(color);
        Ok(())
    }

    pub fn set_fill_style_color(&mut self, color: CanvasColor) {
        log::debug!(target: "canvas", "set_fill_style {:?}", color);
        self.paint.set_fill_source(PaintSource::Color(color));
    }

    pub fn set_fill_style_gradient(&mut self, gradient: CanvasGradient) {
        log::debug!(target: "canvas", "set_fill_style gradient");
        self.paint.set_fill_source(PaintSource::Gradient(gradient));
    }

    pub fn set_fill_style_pattern(&mut self, pattern: CanvasPattern) {
        log::debug!(target: "canvas", "set_fill_style pattern {}", pattern.id());
        self.paint.set_fill_source(PaintSource::Pattern(pattern));
    }

    pub fn set_stroke_style(&mut self, style: &str) -> Canvas2dResult<()> {
        let color = CanvasColor::parse(style)?;
        self.set_stroke_style_color(color);
        Ok(())
    }

    pub fn set_stroke_style_color(&mut self, color: CanvasColor) {
        log::debug!(target: "canvas", "set_stroke_style {:?}", color);
        self.paint.set_stroke_source(PaintSource::Color(color));
    }

    pub fn set_stroke_style_gradient(&mut self, gradient: CanvasGradient) {
        log::debug!(target: "canvas", "set_stroke_style gradient");
        self.paint.set_stroke_source(PaintSource::Gradient(gradient));
    }

    pub fn set_stroke_style_pattern(&mut self, pattern: CanvasPattern) {
        log::debug!(target: "canvas", "set_stroke_style pattern {}", pattern.id());
        self.paint.set_stroke_source(PaintSource::Pattern(pattern));
    }

    pub fn create_linear_gradient(&self, x0: f64, y0: f64, x1: f64, y1: f64) -> CanvasGradient {
        CanvasGradient::linear(LinearGradientParams { x0, y0, x1, y1 })
    }

    pub fn create_radial_gradient(&self, params: &RadialGradientParams) -> CanvasGradient {
        CanvasGradient::radial(*params)
    }

    /// A conic gradient missing any parameter paints nothing until used
    /// with complete parameters.
    pub fn create_conic_gradient(&self, params: &ConicGradientParams) -> CanvasGradient {
        CanvasGradient::conic(*params)
    }

    /// Pattern over an image source resolved through the image pipeline at
    /// draw time.
    pub fn create_pattern(
        &self,
        source: impl Into<ImageSource>,
        repetition: &str,
    ) -> Canvas2dResult<CanvasPattern> {
        CanvasPattern::from_source(source, repetition)
    }

    /// Pattern over caller-owned non-premultiplied RGBA pixels.
    pub fn create_pattern_from_rgba(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        repetition: &str,
    ) -> Canvas2dResult<CanvasPattern> {
        CanvasPattern::from_rgba(data, width, height, repetition)
    }

    // --- Line style ---

    pub fn set_line_width(&mut self, width: f64) {
        if !self.paint.set_line_width(width) {
            log::debug!(target: "canvas", "ignoring line width {}", width);
        }
    }

    pub fn set_line_cap(&mut self, cap: LineCap) {
        self.paint.set_line_cap(cap);
    }

    pub fn set_line_join(&mut self, join: LineJoin) {
        self.paint.set_line_join(join);
    }

    pub fn set_miter_limit(&mut self, limit: f64) {
        if !self.paint.set_miter_limit(limit) {
            log::debug!(target: "canvas", "ignoring miter limit {}", limit);
        }
    }

    /// Odd-length arrays are repeated; arrays with a negative or non-finite
    /// entry are ignored.
    pub fn set_line_dash(&mut self, segments: Vec<f64>) {
        if !self.paint.set_line_dash(segments) {
            log::debug!(target: "canvas", "ignoring invalid line dash");
        }
    }

    pub fn get_line_dash(&self) -> &[f64] {
        &self.paint.stroke().line_dash
    }

    pub fn set_line_dash_offset(&mut self, offset: f64) {
        if !self.paint.set_line_dash_offset(offset) {
            log::debug!(target: "canvas", "ignoring line dash offset {}", offset);
        }
    }

    // --- Global state ---

    pub fn set_global_alpha(&mut self, alpha: f64) {
        if !self.paint.set_alpha(alpha) {
            log::debug!(target: "canvas", "ignoring global alpha {}", alpha);
        }
    }

    /// Set the composite operation by its CSS name. Unknown names are
    /// ignored. Returns true if the value was accepted.
    pub fn set_global_composite_operation(&mut self, op: &str) -> bool {
        match op.parse::<CompositeOperation>() {
            Ok(op) => {
                self.paint.set_composite(op);
                true
            }
            Err(_) => {
                log::debug!(target: "canvas", "ignoring composite operation {:?}", op);
                false
            }
        }
    }

    pub fn set_composite_operation(&mut self, op: CompositeOperation) {
        self.paint.set_composite(op);
    }

    // --- Shadow ---

    pub fn set_shadow_color(&mut self, color: &str) -> Canvas2dResult<()> {
        let color = CanvasColor::parse(color)?;
        self.set_shadow_color_value(color);
        Ok(())
    }

    pub fn set_shadow_color_value(&mut self, color: CanvasColor) {
        self.paint.set_shadow_color(color);
    }

    pub fn set_shadow_blur(&mut self, blur: f64) {
        if !self.paint.set_shadow_blur(blur) {
            log::debug!(target: "canvas", "ignoring shadow blur {}", blur);
        }
    }

    pub fn set_shadow_offset_x(&mut self, x: f64) {
        if !self.paint.set_shadow_offset_x(x) {
            log::debug!(target: "canvas", "ignoring shadow offset x {}", x);
        }
    }

    pub fn set_shadow_offset_y(&mut self, y: f64) {
        if !self.paint.set_shadow_offset_y(y) {
            log::debug!(target: "canvas", "ignoring shadow offset y {}", y);
        }
    }

    // --- Filters and smoothing ---

    /// Set the filter from a CSS filter string such as
    /// `"grayscale(50%) blur(2px)"`.
    pub fn set_filter(&mut self, filter: &str) {
        log::debug!(target: "canvas", "set_filter {:?}", filter);
        match parse_filter(filter) {
            FilterUpdate::Clear => self.paint.set_filter(None),
            FilterUpdate::Set(filter) => self.paint.set_filter(Some(filter)),
            FilterUpdate::Ignore => {
                log::debug!(target: "canvas", "ignoring invalid filter {:?}", filter);
            }
        }
    }

    pub fn set_image_smoothing_enabled(&mut self, enabled: bool) {
        self.paint.set_smoothing_enabled(enabled);
    }

    pub fn get_image_smoothing_enabled(&self) -> bool {
        self.paint.smoothing_enabled()
    }

    pub fn set_image_smoothing_quality(&mut self, quality: ImageSmoothingQuality) {
        self.paint.set_smoothing_quality(quality);
    }

    pub fn get_image_smoothing_quality(&self) -> ImageSmoothingQuality {
        self.paint.smoothing_quality()
    }
}
