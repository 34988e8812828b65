//! Turns the live paint state into backend draw objects.
//!
//! Fill and stroke share one construction routine that branches once on
//! [`PaintTarget`].

use crate::backend::{DrawTarget, LineDash, Paint, Shader, ShadowSpec, StrokeGeometry};
use crate::image::RasterImage;
use crate::matrix::Matrix;
use crate::paint_state::{PaintSource, PaintStateStack, Shadow};
use crate::pattern::CanvasPattern;
use crate::transform::TransformEngine;
use std::rc::Rc;

/// Which of the two paint states a draw uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintTarget {
    Fill,
    Stroke,
}

/// Everything one draw needs from the brush.
#[derive(Debug, Clone, PartialEq)]
pub struct Brush {
    pub paint: Paint,
    /// Shadow pass to issue before the primary pass.
    pub shadow: Option<ShadowSpec>,
}

/// Per-draw inputs that do not live in the paint state.
#[derive(Debug, Clone, Copy)]
pub struct BrushContext<'a> {
    /// Content origin of the current draw.
    pub origin: (f64, f64),
    /// Pattern alignment is relative to the logical transform.
    pub transform: &'a TransformEngine,
    pub view_scale: f64,
    pub anti_alias: bool,
}

/// Resolves a pattern's pixels; `None` skips the draw.
pub trait PatternResolver {
    fn resolve(&mut self, pattern: &CanvasPattern) -> Option<Rc<RasterImage>>;
}

impl<F: FnMut(&CanvasPattern) -> Option<Rc<RasterImage>>> PatternResolver for F {
    fn resolve(&mut self, pattern: &CanvasPattern) -> Option<Rc<RasterImage>> {
        self(pattern)
    }
}

/// Build the brush for `target`.
///
/// Order matters: filter and sampling first, then the color or shader, then
/// alpha, then stroke geometry, then the shadow. Returns `None` when the
/// paint has nothing to draw with (an unresolvable pattern).
pub fn build_brush(
    state: &PaintStateStack,
    target: PaintTarget,
    ctx: &BrushContext<'_>,
    patterns: &mut dyn PatternResolver,
) -> Option<Brush> {
    let mut paint = Paint::fill();
    paint.anti_alias = ctx.anti_alias;
    paint.filter = state.filter().cloned();
    paint.sampling = state.sampling();
    paint.composite = state.global().composite;

    let source = match target {
        PaintTarget::Fill => &state.fill().source,
        PaintTarget::Stroke => &state.stroke().paint.source,
    };
    let global_alpha = state.global().effective_alpha();
    let (dx, dy) = ctx.origin;

    match source {
        PaintSource::Color(color) => {
            paint.color = *color;
            paint.alpha = global_alpha * color.alpha_f64();
        }
        PaintSource::Gradient(gradient) => {
            match gradient.to_shader(dx, dy) {
                Some(shader) => paint.shader = Some(shader),
                None => log::debug!(target: "canvas", "gradient produced no shader"),
            }
            paint.alpha = global_alpha;
        }
        PaintSource::Pattern(pattern) => {
            let Some(image) = patterns.resolve(pattern) else {
                log::warn!(target: "canvas", "pattern image unavailable, draw skipped");
                return None;
            };
            let local = if pattern.is_transformable() {
                pattern.transform()
            } else {
                Matrix::identity()
            };
            paint.shader = Some(Shader::Pattern {
                image,
                pattern_id: pattern.id(),
                repetition: pattern.repetition(),
                matrix: ctx.transform.pattern_matrix(ctx.view_scale, dx, dy, &local),
                sampling: paint.sampling,
            });
            paint.alpha = global_alpha;
        }
    }

    if target == PaintTarget::Stroke {
        let stroke = state.stroke();
        paint.target = DrawTarget::Stroke(StrokeGeometry {
            width: stroke.line_width,
            cap: stroke.line_cap,
            join: stroke.line_join,
            miter_limit: stroke.miter_limit,
            dash: (!stroke.line_dash.is_empty()).then(|| LineDash {
                intervals: stroke.line_dash.clone(),
                offset: stroke.line_dash_offset,
            }),
        });
    }

    let shadow = shadow_spec(state.shadow(), ctx.view_scale);
    Some(Brush { paint, shadow })
}

/// The shadow pass for the current shadow state, if it has offset or blur.
///
/// The shadow color is passed through as set; the backend scales it by the
/// paint's alpha, which already includes the global alpha.
pub fn shadow_spec(shadow: &Shadow, view_scale: f64) -> Option<ShadowSpec> {
    if !shadow.has_shadow() {
        return None;
    }
    Some(ShadowSpec {
        color: shadow.color,
        offset_x: shadow.offset_x * view_scale,
        offset_y: shadow.offset_y * view_scale,
        blur: shadow.blur * view_scale,
    })
}
