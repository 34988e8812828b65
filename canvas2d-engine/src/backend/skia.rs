//! The tiny-skia backend.

use super::effects::{self, SweepRaster};
use super::pattern_cache::{self, PatternCacheKey, PatternPixmapCache};
use super::{
    Bitmap, DrawTarget, ImagePaint, Paint, RadialShape, RenderBackend, ShadowSpec, Shader,
    ShaderStop,
};
use crate::error::{Canvas2dError, Canvas2dResult};
use crate::filter::Filter;
use crate::geometry::{CanvasColor, ImageData};
use crate::image::{unpremultiply, RasterImage, SvgImage};
use crate::matrix::Matrix;
use crate::path::CanvasPath;
use crate::pattern::PatternRepetition;
use crate::style::{CanvasFillRule, CompositeOperation, LineCap, LineJoin, SamplingQuality};
use kurbo::{PathEl, Rect};
use std::rc::Rc;
use std::sync::Arc;
use tiny_skia::{Mask, Pixmap, PixmapPaint, Transform};

/// Maximum surface dimension.
const MAX_DIMENSION: u32 = 32767;

/// Maximum number of bytes retained by the pattern pixmap cache.
const PATTERN_CACHE_MAX_BYTES: usize = 64 * 1024 * 1024;

impl From<LineCap> for tiny_skia::LineCap {
    fn from(cap: LineCap) -> Self {
        match cap {
            LineCap::Butt => tiny_skia::LineCap::Butt,
            LineCap::Round => tiny_skia::LineCap::Round,
            LineCap::Square => tiny_skia::LineCap::Square,
        }
    }
}

impl From<LineJoin> for tiny_skia::LineJoin {
    fn from(join: LineJoin) -> Self {
        match join {
            LineJoin::Miter => tiny_skia::LineJoin::Miter,
            LineJoin::Round => tiny_skia::LineJoin::Round,
            LineJoin::Bevel => tiny_skia::LineJoin::Bevel,
        }
    }
}

impl From<CanvasFillRule> for tiny_skia::FillRule {
    fn from(rule: CanvasFillRule) -> Self {
        match rule {
            CanvasFillRule::NonZero => tiny_skia::FillRule::Winding,
            CanvasFillRule::EvenOdd => tiny_skia::FillRule::EvenOdd,
        }
    }
}

impl From<SamplingQuality> for tiny_skia::FilterQuality {
    fn from(quality: SamplingQuality) -> Self {
        match quality {
            SamplingQuality::Nearest => tiny_skia::FilterQuality::Nearest,
            SamplingQuality::Bilinear => tiny_skia::FilterQuality::Bilinear,
            SamplingQuality::Bicubic => tiny_skia::FilterQuality::Bicubic,
        }
    }
}

impl From<CompositeOperation> for tiny_skia::BlendMode {
    fn from(op: CompositeOperation) -> Self {
        use tiny_skia::BlendMode;
        match op {
            CompositeOperation::SourceOver => BlendMode::SourceOver,
            CompositeOperation::SourceIn => BlendMode::SourceIn,
            CompositeOperation::SourceOut => BlendMode::SourceOut,
            CompositeOperation::SourceAtop => BlendMode::SourceAtop,
            CompositeOperation::DestinationOver => BlendMode::DestinationOver,
            CompositeOperation::DestinationIn => BlendMode::DestinationIn,
            CompositeOperation::DestinationOut => BlendMode::DestinationOut,
            CompositeOperation::DestinationAtop => BlendMode::DestinationAtop,
            CompositeOperation::Lighter => BlendMode::Plus,
            CompositeOperation::Copy => BlendMode::Source,
            CompositeOperation::Xor => BlendMode::Xor,
            CompositeOperation::Multiply => BlendMode::Multiply,
            CompositeOperation::Screen => BlendMode::Screen,
            CompositeOperation::Overlay => BlendMode::Overlay,
            CompositeOperation::Darken => BlendMode::Darken,
            CompositeOperation::Lighten => BlendMode::Lighten,
            CompositeOperation::ColorDodge => BlendMode::ColorDodge,
            CompositeOperation::ColorBurn => BlendMode::ColorBurn,
            CompositeOperation::HardLight => BlendMode::HardLight,
            CompositeOperation::SoftLight => BlendMode::SoftLight,
            CompositeOperation::Difference => BlendMode::Difference,
            CompositeOperation::Exclusion => BlendMode::Exclusion,
            CompositeOperation::Hue => BlendMode::Hue,
            CompositeOperation::Saturation => BlendMode::Saturation,
            CompositeOperation::Color => BlendMode::Color,
            CompositeOperation::Luminosity => BlendMode::Luminosity,
        }
    }
}

impl From<&Matrix> for Transform {
    fn from(m: &Matrix) -> Self {
        Transform::from_row(
            m.scale_x as f32,
            m.skew_y as f32,
            m.skew_x as f32,
            m.scale_y as f32,
            m.translate_x as f32,
            m.translate_y as f32,
        )
    }
}

fn skia_color(color: CanvasColor, alpha: f64) -> tiny_skia::Color {
    let mut c = tiny_skia::Color::from_rgba8(color.r, color.g, color.b, 255);
    c.set_alpha(alpha.clamp(0.0, 1.0) as f32);
    c
}

/// Convert a path to tiny-skia. Returns `None` for paths without geometry.
pub(crate) fn to_skia_path(path: &CanvasPath) -> Option<tiny_skia::Path> {
    let mut pb = tiny_skia::PathBuilder::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => pb.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => pb.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(c, p) => pb.quad_to(c.x as f32, c.y as f32, p.x as f32, p.y as f32),
            PathEl::CurveTo(c1, c2, p) => pb.cubic_to(
                c1.x as f32,
                c1.y as f32,
                c2.x as f32,
                c2.y as f32,
                p.x as f32,
                p.y as f32,
            ),
            PathEl::ClosePath => pb.close(),
        }
    }
    pb.finish()
}

fn rect_path(rect: Rect) -> Option<tiny_skia::Path> {
    let r = tiny_skia::Rect::from_ltrb(rect.x0 as f32, rect.y0 as f32, rect.x1 as f32, rect.y1 as f32)?;
    Some(tiny_skia::PathBuilder::from_rect(r))
}

fn gradient_stops(stops: &[ShaderStop], alpha: f64) -> Vec<tiny_skia::GradientStop> {
    stops
        .iter()
        .map(|s| {
            tiny_skia::GradientStop::new(
                s.offset as f32,
                skia_color(s.color, s.color.alpha_f64() * alpha),
            )
        })
        .collect()
}

/// Apply a filter's color matrix and blur in place.
fn apply_filter(pixmap: &mut Pixmap, filter: &Filter) {
    if let Some(matrix) = &filter.color_matrix {
        effects::apply_matrix(pixmap, matrix);
    }
    if let Some(radius) = filter.blur_radius.filter(|r| *r > 0.0) {
        effects::gaussian_blur(pixmap, radius);
    }
}

/// Pixels kept alive for the lifetime of a tiny-skia shader.
enum ShaderBacking {
    Image(Rc<RasterImage>),
    Pixmap(Arc<Pixmap>),
}

impl ShaderBacking {
    fn pixmap_ref(&self) -> Option<tiny_skia::PixmapRef<'_>> {
        match self {
            ShaderBacking::Image(image) => {
                tiny_skia::PixmapRef::from_bytes(image.data(), image.width(), image.height())
            }
            ShaderBacking::Pixmap(pixmap) => Some(pixmap.as_ref().as_ref()),
        }
    }
}

#[derive(Clone)]
struct SurfaceState {
    transform: Transform,
    clip: Option<Rc<Mask>>,
}

struct Layer {
    pixmap: Pixmap,
    composite: tiny_skia::BlendMode,
    bounds: Rect,
    /// Stack depth right after the layer's save.
    depth: usize,
}

/// Raster surface with a matrix/clip stack and composite layers.
pub struct SkiaBackend {
    pixmap: Pixmap,
    state: SurfaceState,
    stack: Vec<SurfaceState>,
    layers: Vec<Layer>,
    pattern_cache: PatternPixmapCache,
}

impl SkiaBackend {
    pub fn new(width: u32, height: u32) -> Canvas2dResult<Self> {
        if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(Canvas2dError::InvalidDimensions { width, height });
        }
        let pixmap =
            Pixmap::new(width, height).ok_or(Canvas2dError::InvalidDimensions { width, height })?;
        Ok(Self {
            pixmap,
            state: SurfaceState {
                transform: Transform::identity(),
                clip: None,
            },
            stack: Vec::new(),
            layers: Vec::new(),
            pattern_cache: PatternPixmapCache::new(PATTERN_CACHE_MAX_BYTES),
        })
    }

    /// The base surface, premultiplied RGBA.
    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    fn target(&mut self) -> &mut Pixmap {
        match self.layers.last_mut() {
            Some(layer) => &mut layer.pixmap,
            None => &mut self.pixmap,
        }
    }

    fn scratch(&self) -> Option<Pixmap> {
        Pixmap::new(self.pixmap.width(), self.pixmap.height())
    }

    /// Run `draw` against the current target, or against a scratch surface
    /// that is filtered and then composited when a filter is active.
    fn render(
        &mut self,
        filter: Option<&Filter>,
        composite: CompositeOperation,
        draw: impl FnOnce(&mut Pixmap, Option<&Mask>, tiny_skia::BlendMode),
    ) {
        let clip = self.state.clip.clone();
        match filter.filter(|f| !f.is_none()) {
            Some(filter) => {
                let Some(mut scratch) = self.scratch() else {
                    return;
                };
                draw(&mut scratch, None, tiny_skia::BlendMode::SourceOver);
                apply_filter(&mut scratch, filter);
                let paint = PixmapPaint {
                    opacity: 1.0,
                    blend_mode: composite.into(),
                    quality: tiny_skia::FilterQuality::Nearest,
                };
                self.target().draw_pixmap(
                    0,
                    0,
                    scratch.as_ref(),
                    &paint,
                    Transform::identity(),
                    clip.as_deref(),
                );
            }
            None => draw(self.target(), clip.as_deref(), composite.into()),
        }
    }

    /// Resolve the pixels behind a shader that samples an image.
    fn shader_backing(&mut self, shader: &Shader, path: &CanvasPath) -> Option<(ShaderBacking, Transform)> {
        let inverse_ctm = self.state.transform.invert()?;
        match shader {
            Shader::Pattern {
                image,
                repetition,
                matrix,
                pattern_id,
                ..
            } => {
                let device: Transform = matrix.into();
                match repetition {
                    PatternRepetition::Repeat
                    | PatternRepetition::Mirror
                    | PatternRepetition::Clamp => Some((
                        ShaderBacking::Image(Rc::clone(image)),
                        inverse_ctm.pre_concat(device),
                    )),
                    PatternRepetition::NoRepeat => {
                        let key = PatternCacheKey {
                            pattern_id: *pattern_id,
                            repetition: *repetition,
                            first_tile: 0,
                            tile_count: 1,
                        };
                        let pixmap = self.pattern_cache.get_or_insert(key, || {
                            pattern_cache::build_backing(image, *repetition, 1)
                        })?;
                        Some((
                            ShaderBacking::Pixmap(pixmap),
                            inverse_ctm
                                .pre_concat(device)
                                .pre_translate(-1.0, -1.0),
                        ))
                    }
                    PatternRepetition::RepeatX | PatternRepetition::RepeatY => {
                        // Cover the surface as seen from pattern space.
                        let to_pattern = device.invert()?;
                        let corners = [
                            (0.0, 0.0),
                            (self.pixmap.width() as f32, 0.0),
                            (0.0, self.pixmap.height() as f32),
                            (self.pixmap.width() as f32, self.pixmap.height() as f32),
                        ];
                        let mut mapped: Vec<tiny_skia::Point> = corners
                            .iter()
                            .map(|&(x, y)| tiny_skia::Point::from_xy(x, y))
                            .collect();
                        to_pattern.map_points(&mut mapped);
                        let horizontal = *repetition == PatternRepetition::RepeatX;
                        let axis = |p: &tiny_skia::Point| f64::from(if horizontal { p.x } else { p.y });
                        let min = mapped.iter().map(axis).fold(f64::INFINITY, f64::min);
                        let max = mapped.iter().map(axis).fold(f64::NEG_INFINITY, f64::max);
                        let extent = if horizontal { image.width() } else { image.height() };
                        let (first_tile, tile_count) = pattern_cache::tile_range(min, max, extent);
                        let key = PatternCacheKey {
                            pattern_id: *pattern_id,
                            repetition: *repetition,
                            first_tile,
                            tile_count,
                        };
                        let pixmap = self.pattern_cache.get_or_insert(key, || {
                            pattern_cache::build_backing(image, *repetition, tile_count)
                        })?;
                        let start = (first_tile as i64 * extent as i64) as f32;
                        let (tx, ty) = if horizontal { (start, -1.0) } else { (-1.0, start) };
                        Some((
                            ShaderBacking::Pixmap(pixmap),
                            inverse_ctm.pre_concat(device).pre_translate(tx, ty),
                        ))
                    }
                }
            }
            Shader::Sweep {
                center,
                rotation,
                start_angle,
                end_angle,
                stops,
            } => {
                // Rasterize over the device bounds of the path.
                let bounds = path.bounds()?;
                let ctm = &self.state.transform;
                let device_bounds = kurbo::Affine::new([
                    ctm.sx as f64,
                    ctm.ky as f64,
                    ctm.kx as f64,
                    ctm.sy as f64,
                    ctm.tx as f64,
                    ctm.ty as f64,
                ])
                .transform_rect_bbox(bounds)
                .intersect(Rect::new(
                    0.0,
                    0.0,
                    self.pixmap.width() as f64,
                    self.pixmap.height() as f64,
                ));
                let x0 = device_bounds.x0.floor() as i32;
                let y0 = device_bounds.y0.floor() as i32;
                let width = (device_bounds.x1.ceil() as i32 - x0).max(1) as u32;
                let height = (device_bounds.y1.ceil() as i32 - y0).max(1) as u32;
                let device_to_user = kurbo::Affine::new([
                    inverse_ctm.sx as f64,
                    inverse_ctm.ky as f64,
                    inverse_ctm.kx as f64,
                    inverse_ctm.sy as f64,
                    inverse_ctm.tx as f64,
                    inverse_ctm.ty as f64,
                ]);
                let sweep = SweepRaster {
                    center: *center,
                    rotation: *rotation,
                    start_angle: *start_angle,
                    end_angle: *end_angle,
                    stops,
                    alpha: 1.0,
                };
                let pixmap =
                    effects::rasterize_sweep(&sweep, device_to_user, x0, y0, width, height)?;
                Some((
                    ShaderBacking::Pixmap(Arc::new(pixmap)),
                    inverse_ctm.pre_translate(x0 as f32, y0 as f32),
                ))
            }
            Shader::Linear { .. } | Shader::Radial { .. } => None,
        }
    }

    fn gradient_shader(shader: &Shader, alpha: f64) -> Option<tiny_skia::Shader<'static>> {
        match shader {
            Shader::Linear { start, end, stops } => tiny_skia::LinearGradient::new(
                tiny_skia::Point::from_xy(start.x as f32, start.y as f32),
                tiny_skia::Point::from_xy(end.x as f32, end.y as f32),
                gradient_stops(stops, alpha),
                tiny_skia::SpreadMode::Pad,
                Transform::identity(),
            ),
            Shader::Radial { shape, stops } => match *shape {
                RadialShape::Single { center, radius } => {
                    let c = tiny_skia::Point::from_xy(center.x as f32, center.y as f32);
                    tiny_skia::RadialGradient::new(
                        c,
                        c,
                        radius as f32,
                        gradient_stops(stops, alpha),
                        tiny_skia::SpreadMode::Pad,
                        Transform::identity(),
                    )
                }
                RadialShape::TwoPoint {
                    start,
                    start_radius,
                    end,
                    end_radius,
                } => {
                    // The rasterizer's focal gradient starts at a point;
                    // a start circle is emulated by compressing the stops.
                    let ratio = if end_radius > 0.0 {
                        (start_radius / end_radius).clamp(0.0, 1.0)
                    } else {
                        0.0
                    };
                    let remapped: Vec<ShaderStop> = stops
                        .iter()
                        .map(|s| ShaderStop {
                            offset: ratio + s.offset * (1.0 - ratio),
                            color: s.color,
                        })
                        .collect();
                    tiny_skia::RadialGradient::new(
                        tiny_skia::Point::from_xy(start.x as f32, start.y as f32),
                        tiny_skia::Point::from_xy(end.x as f32, end.y as f32),
                        end_radius as f32,
                        gradient_stops(&remapped, alpha),
                        tiny_skia::SpreadMode::Pad,
                        Transform::identity(),
                    )
                }
            },
            Shader::Sweep { .. } | Shader::Pattern { .. } => None,
        }
    }

    fn skia_stroke(target: &DrawTarget) -> Option<tiny_skia::Stroke> {
        let DrawTarget::Stroke(geometry) = target else {
            return None;
        };
        Some(tiny_skia::Stroke {
            width: geometry.width as f32,
            miter_limit: geometry.miter_limit as f32,
            line_cap: geometry.cap.into(),
            line_join: geometry.join.into(),
            dash: geometry.dash.as_ref().and_then(|dash| {
                tiny_skia::StrokeDash::new(
                    dash.intervals.iter().map(|d| *d as f32).collect(),
                    dash.offset as f32,
                )
            }),
        })
    }

    fn fill_or_stroke(
        pixmap: &mut Pixmap,
        path: &tiny_skia::Path,
        paint: &tiny_skia::Paint<'_>,
        target: &DrawTarget,
        fill_rule: CanvasFillRule,
        transform: Transform,
        mask: Option<&Mask>,
    ) {
        match Self::skia_stroke(target) {
            Some(stroke) => pixmap.stroke_path(path, paint, &stroke, transform, mask),
            None => pixmap.fill_path(path, paint, fill_rule.into(), transform, mask),
        }
    }

    /// Mask covering `rect` under the current matrix, intersected with the
    /// current clip.
    fn clip_with_rect(&self, rect: Rect) -> Option<Mask> {
        let path = rect_path(rect)?;
        match self.state.clip.as_deref() {
            Some(clip) => {
                let mut mask = clip.clone();
                mask.intersect_path(&path, tiny_skia::FillRule::Winding, true, self.state.transform);
                Some(mask)
            }
            None => {
                let mut mask = Mask::new(self.pixmap.width(), self.pixmap.height())?;
                mask.fill_path(&path, tiny_skia::FillRule::Winding, true, self.state.transform);
                Some(mask)
            }
        }
    }
}

impl RenderBackend for SkiaBackend {
    fn width(&self) -> u32 {
        self.pixmap.width()
    }

    fn height(&self) -> u32 {
        self.pixmap.height()
    }

    fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    fn restore(&mut self) {
        let Some(state) = self.stack.pop() else {
            return;
        };
        if self
            .layers
            .last()
            .is_some_and(|layer| layer.depth == self.stack.len() + 1)
        {
            if let Some(layer) = self.layers.pop() {
                let canvas = Rect::new(0.0, 0.0, self.width() as f64, self.height() as f64);
                let b = layer.bounds;
                let covers_canvas =
                    b.x0 <= canvas.x0 && b.y0 <= canvas.y0 && b.x1 >= canvas.x1 && b.y1 >= canvas.y1;
                let bounds_mask = if covers_canvas {
                    None
                } else {
                    let mut mask = Mask::new(self.width(), self.height());
                    if let (Some(mask), Some(path)) = (mask.as_mut(), rect_path(layer.bounds)) {
                        mask.fill_path(&path, tiny_skia::FillRule::Winding, false, Transform::identity());
                    }
                    mask
                };
                let mask = match (state.clip.as_deref(), bounds_mask) {
                    (_, Some(bounds)) => Some(bounds),
                    (Some(clip), None) => Some(clip.clone()),
                    (None, None) => None,
                };
                let paint = PixmapPaint {
                    opacity: 1.0,
                    blend_mode: layer.composite,
                    quality: tiny_skia::FilterQuality::Nearest,
                };
                self.target().draw_pixmap(
                    0,
                    0,
                    layer.pixmap.as_ref(),
                    &paint,
                    Transform::identity(),
                    mask.as_ref(),
                );
            }
        }
        self.state = state;
    }

    fn save_layer(&mut self, bounds: Rect, composite: CompositeOperation) {
        self.save();
        match Pixmap::new(self.width(), self.height()) {
            Some(pixmap) => self.layers.push(Layer {
                pixmap,
                composite: composite.into(),
                bounds,
                depth: self.stack.len(),
            }),
            None => log::warn!("failed to allocate composite layer"),
        }
    }

    fn concat(&mut self, matrix: &Matrix) {
        self.state.transform = self.state.transform.pre_concat(matrix.into());
    }

    fn set_matrix(&mut self, matrix: &Matrix) {
        self.state.transform = matrix.into();
    }

    fn matrix(&self) -> Matrix {
        let t = self.state.transform;
        Matrix::new(
            t.sx as f64,
            t.ky as f64,
            t.kx as f64,
            t.sy as f64,
            t.tx as f64,
            t.ty as f64,
        )
    }

    fn clip_path(&mut self, path: &CanvasPath) {
        let rule: tiny_skia::FillRule = path.fill_rule().into();
        let mask = match (to_skia_path(path), self.state.clip.as_deref()) {
            (Some(p), Some(clip)) => {
                let mut mask = clip.clone();
                mask.intersect_path(&p, rule, true, self.state.transform);
                Some(mask)
            }
            (Some(p), None) => Mask::new(self.width(), self.height()).map(|mut mask| {
                mask.fill_path(&p, rule, true, self.state.transform);
                mask
            }),
            // An empty clip region excludes everything.
            (None, _) => Mask::new(self.width(), self.height()),
        };
        self.state.clip = mask.map(Rc::new);
    }

    fn draw_path(&mut self, path: &CanvasPath, paint: &Paint) {
        let Some(skia_path) = to_skia_path(path) else {
            return;
        };
        let transform = self.state.transform;

        // Image-backed shaders need their pixels to outlive the paint.
        let backing = match &paint.shader {
            Some(shader @ (Shader::Pattern { .. } | Shader::Sweep { .. })) => {
                match self.shader_backing(shader, path) {
                    Some(backing) => Some(backing),
                    None => {
                        log::debug!(target: "canvas", "shader could not be built, draw skipped");
                        return;
                    }
                }
            }
            _ => None,
        };

        let mut skia_paint = tiny_skia::Paint {
            anti_alias: paint.anti_alias,
            ..Default::default()
        };
        match (&paint.shader, &backing) {
            (None, _) => skia_paint.set_color(skia_color(paint.color, paint.alpha)),
            (Some(shader), None) => match Self::gradient_shader(shader, paint.alpha) {
                Some(shader) => skia_paint.shader = shader,
                None => {
                    log::debug!(target: "canvas", "degenerate gradient, draw skipped");
                    return;
                }
            },
            (Some(shader), Some((pixels, local))) => {
                let Some(pixmap_ref) = pixels.pixmap_ref() else {
                    return;
                };
                let (spread, quality) = match shader {
                    Shader::Pattern {
                        repetition,
                        sampling,
                        ..
                    } => (
                        match repetition {
                            PatternRepetition::Repeat => tiny_skia::SpreadMode::Repeat,
                            PatternRepetition::Mirror => tiny_skia::SpreadMode::Reflect,
                            _ => tiny_skia::SpreadMode::Pad,
                        },
                        (*sampling).into(),
                    ),
                    _ => (tiny_skia::SpreadMode::Pad, tiny_skia::FilterQuality::Nearest),
                };
                skia_paint.shader =
                    tiny_skia::Pattern::new(pixmap_ref, spread, quality, paint.alpha as f32, *local);
            }
        }

        let target = &paint.target;
        let fill_rule = path.fill_rule();
        self.render(paint.filter.as_ref(), paint.composite, |pixmap, mask, blend| {
            skia_paint.blend_mode = blend;
            Self::fill_or_stroke(pixmap, &skia_path, &skia_paint, target, fill_rule, transform, mask);
        });
    }

    fn draw_shadow(&mut self, path: &CanvasPath, paint: &Paint, shadow: &ShadowSpec) {
        let Some(skia_path) = to_skia_path(path) else {
            return;
        };
        let Some(mut scratch) = self.scratch() else {
            return;
        };
        let mut coverage = tiny_skia::Paint {
            anti_alias: paint.anti_alias,
            ..Default::default()
        };
        coverage.set_color(skia_color(CanvasColor::BLACK, paint.alpha));
        Self::fill_or_stroke(
            &mut scratch,
            &skia_path,
            &coverage,
            &paint.target,
            path.fill_rule(),
            self.state.transform,
            None,
        );
        let c = shadow.color;
        effects::tint_by_alpha(&mut scratch, [c.r, c.g, c.b, c.a]);
        if shadow.blur > 0.0 {
            // Canvas shadow blur is twice the gaussian sigma.
            effects::gaussian_blur(&mut scratch, shadow.blur / 2.0);
        }

        let clip = self.state.clip.clone();
        let pixmap_paint = PixmapPaint {
            opacity: 1.0,
            blend_mode: paint.composite.into(),
            quality: tiny_skia::FilterQuality::Nearest,
        };
        self.target().draw_pixmap(
            0,
            0,
            scratch.as_ref(),
            &pixmap_paint,
            Transform::from_translate(shadow.offset_x as f32, shadow.offset_y as f32),
            clip.as_deref(),
        );
    }

    fn clear_rect(&mut self, rect: Rect) {
        let Some(path) = rect_path(rect) else {
            return;
        };
        let paint = tiny_skia::Paint {
            blend_mode: tiny_skia::BlendMode::Clear,
            ..Default::default()
        };
        let transform = self.state.transform;
        let clip = self.state.clip.clone();
        self.target().fill_path(
            &path,
            &paint,
            tiny_skia::FillRule::Winding,
            transform,
            clip.as_deref(),
        );
    }

    fn draw_image(&mut self, image: &RasterImage, src: Rect, dst: Rect, paint: &ImagePaint) {
        if src.width() <= 0.0 || src.height() <= 0.0 {
            return;
        }
        // Clamp the source to the image and shrink the destination to match.
        let bounds = Rect::new(0.0, 0.0, image.width() as f64, image.height() as f64);
        let clamped = src.intersect(bounds);
        if clamped.width() <= 0.0 || clamped.height() <= 0.0 {
            return;
        }
        let sx = dst.width() / src.width();
        let sy = dst.height() / src.height();
        let dst = Rect::new(
            dst.x0 + (clamped.x0 - src.x0) * sx,
            dst.y0 + (clamped.y0 - src.y0) * sy,
            dst.x0 + (clamped.x1 - src.x0) * sx,
            dst.y0 + (clamped.y1 - src.y0) * sy,
        );
        let Some(path) = rect_path(dst) else {
            return;
        };
        let Some(pixmap_ref) =
            tiny_skia::PixmapRef::from_bytes(image.data(), image.width(), image.height())
        else {
            return;
        };
        let image_to_user = Transform::from_row(
            sx as f32,
            0.0,
            0.0,
            sy as f32,
            (dst.x0 - clamped.x0 * sx) as f32,
            (dst.y0 - clamped.y0 * sy) as f32,
        );
        let transform = self.state.transform;
        let (quality, alpha) = (paint.sampling, paint.alpha);
        self.render(paint.filter.as_ref(), paint.composite, |pixmap, mask, blend| {
            let skia_paint = tiny_skia::Paint {
                shader: tiny_skia::Pattern::new(
                    pixmap_ref,
                    tiny_skia::SpreadMode::Pad,
                    quality.into(),
                    alpha as f32,
                    image_to_user,
                ),
                blend_mode: blend,
                anti_alias: false,
                ..Default::default()
            };
            pixmap.fill_path(&path, &skia_paint, tiny_skia::FillRule::Winding, transform, mask);
        });
    }

    fn draw_svg(&mut self, image: &SvgImage, clip: Rect, matrix: &Matrix, paint: &ImagePaint) {
        let Some(mut scratch) = self.scratch() else {
            return;
        };
        let transform = self.state.transform.pre_concat(matrix.into());
        resvg::render(image.tree(), transform, &mut scratch.as_mut());
        if let Some(filter) = paint.filter.as_ref().filter(|f| !f.is_none()) {
            apply_filter(&mut scratch, filter);
        }
        let mask = self.clip_with_rect(clip);
        let pixmap_paint = PixmapPaint {
            opacity: paint.alpha as f32,
            blend_mode: paint.composite.into(),
            quality: tiny_skia::FilterQuality::Nearest,
        };
        self.target().draw_pixmap(
            0,
            0,
            scratch.as_ref(),
            &pixmap_paint,
            Transform::identity(),
            mask.as_ref(),
        );
    }

    fn write_pixels(&mut self, bitmap: &Bitmap, x: i32, y: i32) {
        let (canvas_width, canvas_height) = (i64::from(self.width()), i64::from(self.height()));
        let row_len = bitmap.width() as usize * 4;
        let data = self.pixmap.data_mut();
        for row in 0..i64::from(bitmap.height()) {
            let dst_row = i64::from(y) + row;
            if dst_row < 0 || dst_row >= canvas_height {
                continue;
            }
            let src_row = &bitmap.data()[row as usize * row_len..(row as usize + 1) * row_len];
            for col in 0..i64::from(bitmap.width()) {
                let dst_col = i64::from(x) + col;
                if dst_col < 0 || dst_col >= canvas_width {
                    continue;
                }
                let src = col as usize * 4;
                let dst = (dst_row * canvas_width + dst_col) as usize * 4;
                data[dst..dst + 4].copy_from_slice(&src_row[src..src + 4]);
            }
        }
    }

    fn read_pixels(&self, x: i32, y: i32, width: u32, height: u32) -> ImageData {
        let mut out = ImageData::new(width, height);
        let (canvas_width, canvas_height) = (i64::from(self.width()), i64::from(self.height()));
        let data = self.pixmap.data();
        for dy in 0..i64::from(height) {
            let src_y = i64::from(y) + dy;
            if src_y < 0 || src_y >= canvas_height {
                continue;
            }
            for dx in 0..i64::from(width) {
                let src_x = i64::from(x) + dx;
                if src_x < 0 || src_x >= canvas_width {
                    continue;
                }
                let src = (src_y * canvas_width + src_x) as usize * 4;
                let dst = (dy * i64::from(width) + dx) as usize * 4;
                let px = unpremultiply([data[src], data[src + 1], data[src + 2], data[src + 3]]);
                out.data[dst..dst + 4].copy_from_slice(&px);
            }
        }
        out
    }

    fn encode_png(&self, ppi: Option<f64>) -> Canvas2dResult<Vec<u8>> {
        let ppi = ppi.unwrap_or(72.0);
        let (width, height) = (self.width(), self.height());

        let mut buf = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut buf, width, height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);

            // Pixel density metadata is stored in pixels per meter.
            let ppm = (ppi.max(0.0) / 0.0254).round() as u32;
            encoder.set_pixel_dims(Some(png::PixelDimensions {
                xppu: ppm,
                yppu: ppm,
                unit: png::Unit::Meter,
            }));

            let mut writer = encoder.write_header()?;
            let data = self.read_pixels(0, 0, width, height);
            writer.write_image_data(&data.data)?;
        }
        Ok(buf)
    }

    fn reset(&mut self) {
        self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
        self.state = SurfaceState {
            transform: Transform::identity(),
            clip: None,
        };
        self.stack.clear();
        self.layers.clear();
        self.pattern_cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LineDash, StrokeGeometry};

    const RED: CanvasColor = CanvasColor::from_rgba8(255, 0, 0, 255);

    fn rect(x: f64, y: f64, w: f64, h: f64) -> CanvasPath {
        let mut path = CanvasPath::new();
        path.rect(x, y, w, h);
        path
    }

    fn solid(color: CanvasColor) -> Paint {
        Paint {
            color,
            ..Paint::fill()
        }
    }

    fn pixel(backend: &SkiaBackend, x: i32, y: i32) -> [u8; 4] {
        let data = backend.read_pixels(x, y, 1, 1).data;
        [data[0], data[1], data[2], data[3]]
    }

    #[test]
    fn test_invalid_dimensions() {
        assert!(SkiaBackend::new(0, 10).is_err());
        assert!(SkiaBackend::new(10, 40000).is_err());
    }

    #[test]
    fn test_fill_respects_matrix() {
        let mut backend = SkiaBackend::new(20, 20).unwrap();
        backend.set_matrix(&Matrix::translation(10.0, 0.0));
        backend.draw_path(&rect(0.0, 0.0, 5.0, 5.0), &solid(RED));
        assert_eq!(pixel(&backend, 12, 2), [255, 0, 0, 255]);
        assert_eq!(pixel(&backend, 2, 2), [0, 0, 0, 0]);
    }

    #[test]
    fn test_paint_alpha_applies_to_color() {
        let mut backend = SkiaBackend::new(4, 4).unwrap();
        let paint = Paint {
            alpha: 0.5,
            ..solid(RED)
        };
        backend.draw_path(&rect(0.0, 0.0, 4.0, 4.0), &paint);
        let [r, _, _, a] = pixel(&backend, 1, 1);
        assert!((a as i32 - 128).abs() <= 1);
        assert_eq!(r, 255);
    }

    #[test]
    fn test_clip_restricts_drawing_and_restores() {
        let mut backend = SkiaBackend::new(20, 20).unwrap();
        backend.save();
        backend.clip_path(&rect(0.0, 0.0, 10.0, 20.0));
        backend.draw_path(&rect(0.0, 0.0, 20.0, 20.0), &solid(RED));
        assert_eq!(pixel(&backend, 15, 5)[3], 0);
        assert_eq!(pixel(&backend, 5, 5)[3], 255);
        backend.restore();
        backend.draw_path(&rect(0.0, 0.0, 20.0, 20.0), &solid(RED));
        assert_eq!(pixel(&backend, 15, 5)[3], 255);
    }

    #[test]
    fn test_destination_out_layer() {
        let mut backend = SkiaBackend::new(10, 10).unwrap();
        backend.draw_path(&rect(0.0, 0.0, 10.0, 10.0), &solid(RED));
        backend.save_layer(
            Rect::new(0.0, 0.0, 10.0, 10.0),
            CompositeOperation::DestinationOut,
        );
        backend.draw_path(&rect(0.0, 0.0, 5.0, 10.0), &solid(CanvasColor::BLACK));
        backend.restore();
        assert_eq!(pixel(&backend, 2, 2)[3], 0);
        assert_eq!(pixel(&backend, 7, 2), [255, 0, 0, 255]);
    }

    #[test]
    fn test_clear_rect() {
        let mut backend = SkiaBackend::new(10, 10).unwrap();
        backend.draw_path(&rect(0.0, 0.0, 10.0, 10.0), &solid(RED));
        backend.clear_rect(Rect::new(0.0, 0.0, 5.0, 5.0));
        assert_eq!(pixel(&backend, 2, 2), [0, 0, 0, 0]);
        assert_eq!(pixel(&backend, 7, 7)[3], 255);
    }

    #[test]
    fn test_stroke_with_dash() {
        let mut backend = SkiaBackend::new(40, 10).unwrap();
        let mut path = CanvasPath::new();
        path.move_to(0.0, 5.0);
        path.line_to(40.0, 5.0);
        let paint = Paint {
            target: DrawTarget::Stroke(StrokeGeometry {
                width: 4.0,
                cap: LineCap::Butt,
                join: LineJoin::Miter,
                miter_limit: 10.0,
                dash: Some(LineDash {
                    intervals: vec![10.0, 10.0],
                    offset: 0.0,
                }),
            }),
            ..solid(RED)
        };
        backend.draw_path(&path, &paint);
        assert_eq!(pixel(&backend, 5, 5)[3], 255);
        assert_eq!(pixel(&backend, 15, 5)[3], 0);
        assert_eq!(pixel(&backend, 25, 5)[3], 255);
    }

    #[test]
    fn test_shadow_is_offset() {
        let mut backend = SkiaBackend::new(20, 20).unwrap();
        let shadow = ShadowSpec {
            color: CanvasColor::from_rgba8(0, 0, 255, 255),
            offset_x: 10.0,
            offset_y: 0.0,
            blur: 0.0,
        };
        backend.draw_shadow(&rect(0.0, 0.0, 5.0, 5.0), &solid(RED), &shadow);
        assert_eq!(pixel(&backend, 12, 2), [0, 0, 255, 255]);
        assert_eq!(pixel(&backend, 2, 2)[3], 0);
    }

    #[test]
    fn test_shadow_scales_with_paint_alpha() {
        let shadow = ShadowSpec {
            color: CanvasColor::from_rgba8(0, 0, 0, 255),
            offset_x: 10.0,
            offset_y: 0.0,
            blur: 0.0,
        };
        let shadow_alpha = |alpha: f64| {
            let mut backend = SkiaBackend::new(20, 20).unwrap();
            let paint = Paint {
                alpha,
                ..solid(RED)
            };
            backend.draw_shadow(&rect(0.0, 0.0, 5.0, 5.0), &paint, &shadow);
            pixel(&backend, 12, 2)[3]
        };
        assert_eq!(shadow_alpha(1.0), 255);
        let half = shadow_alpha(0.5);
        assert!((127..=128).contains(&half), "half alpha was {half}");
    }

    #[test]
    fn test_write_and_read_pixels_skip_out_of_bounds() {
        let mut backend = SkiaBackend::new(4, 4).unwrap();
        let bitmap = RasterImage::from_rgba(&[10, 20, 30, 255].repeat(4), 2, 2).unwrap();
        backend.write_pixels(&bitmap, 3, 3);
        assert_eq!(pixel(&backend, 3, 3), [10, 20, 30, 255]);
        assert_eq!(pixel(&backend, 2, 2), [0, 0, 0, 0]);
        assert_eq!(backend.read_pixels(-1, -1, 2, 2).data[..4], [0, 0, 0, 0]);
    }

    #[test]
    fn test_repeat_pattern_tiles() {
        let mut backend = SkiaBackend::new(8, 8).unwrap();
        let mut tile = vec![0u8; 2 * 2 * 4];
        tile[..4].copy_from_slice(&[255, 0, 0, 255]);
        let image = Rc::new(RasterImage::from_rgba(&tile, 2, 2).unwrap());
        let paint = Paint {
            shader: Some(Shader::Pattern {
                image,
                pattern_id: 1,
                repetition: PatternRepetition::Repeat,
                matrix: Matrix::identity(),
                sampling: SamplingQuality::Nearest,
            }),
            ..Paint::fill()
        };
        backend.draw_path(&rect(0.0, 0.0, 8.0, 8.0), &paint);
        assert_eq!(pixel(&backend, 4, 4), [255, 0, 0, 255]);
        assert_eq!(pixel(&backend, 5, 4)[3], 0);
    }

    #[test]
    fn test_no_repeat_pattern_leaves_outside_transparent() {
        let mut backend = SkiaBackend::new(8, 8).unwrap();
        let image = Rc::new(RasterImage::from_rgba(&[0, 255, 0, 255].repeat(4), 2, 2).unwrap());
        let paint = Paint {
            shader: Some(Shader::Pattern {
                image,
                pattern_id: 2,
                repetition: PatternRepetition::NoRepeat,
                matrix: Matrix::translation(2.0, 2.0),
                sampling: SamplingQuality::Nearest,
            }),
            ..Paint::fill()
        };
        backend.draw_path(&rect(0.0, 0.0, 8.0, 8.0), &paint);
        assert_eq!(pixel(&backend, 2, 2), [0, 255, 0, 255]);
        assert_eq!(pixel(&backend, 0, 0)[3], 0);
        assert_eq!(pixel(&backend, 6, 6)[3], 0);
    }

    #[test]
    fn test_png_encoding() {
        let backend = SkiaBackend::new(3, 2).unwrap();
        let png = backend.encode_png(None).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
