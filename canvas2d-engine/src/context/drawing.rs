//! Fill, stroke, clip and rectangle operations.

use super::Canvas2dEngine;
use crate::backend::RenderBackend;
use crate::brush::{build_brush, Brush, BrushContext, PaintTarget};
use crate::geometry::RectParams;
use crate::image::RasterImage;
use crate::path::CanvasPath;
use crate::path2d::Path2D;
use crate::pattern::{CanvasPattern, PatternImage};
use crate::style::CompositeOperation;
use kurbo::Rect;
use std::rc::Rc;

impl<B: RenderBackend> Canvas2dEngine<B> {
    /// Fill the live path with its fill rule.
    pub fn fill(&mut self) {
        let Some(frame) = self.frame("fill") else {
            return;
        };
        log::debug!(target: "canvas", "fill {:?}", self.path.fill_rule());
        let path = std::mem::take(&mut self.path);
        self.draw_path_with(&path, PaintTarget::Fill, (frame.offset_x, frame.offset_y));
        self.path = path;
    }

    pub fn stroke(&mut self) {
        let Some(frame) = self.frame("stroke") else {
            return;
        };
        log::debug!(target: "canvas", "stroke");
        let path = std::mem::take(&mut self.path);
        self.draw_path_with(&path, PaintTarget::Stroke, (frame.offset_x, frame.offset_y));
        self.path = path;
    }

    /// Intersect the clip region with the live path.
    pub fn clip(&mut self) {
        if self.frame("clip").is_none() {
            return;
        }
        log::debug!(target: "canvas", "clip {:?}", self.path.fill_rule());
        self.backend.clip_path(&self.path);
    }

    pub fn fill_path2d(&mut self, path: &Path2D) {
        let Some(frame) = self.frame("fill_path2d") else {
            return;
        };
        if let Some(replayed) = self.replay_path2d("fill_path2d", path) {
            self.draw_path_with(&replayed, PaintTarget::Fill, (frame.offset_x, frame.offset_y));
        }
    }

    pub fn stroke_path2d(&mut self, path: &Path2D) {
        let Some(frame) = self.frame("stroke_path2d") else {
            return;
        };
        if let Some(replayed) = self.replay_path2d("stroke_path2d", path) {
            self.draw_path_with(&replayed, PaintTarget::Stroke, (frame.offset_x, frame.offset_y));
        }
    }

    pub fn clip_path2d(&mut self, path: &Path2D) {
        if let Some(replayed) = self.replay_path2d("clip_path2d", path) {
            self.backend.clip_path(&replayed);
        }
    }

    /// Fill a rectangle without touching the live path.
    pub fn fill_rect(&mut self, params: &RectParams) {
        let Some(frame) = self.frame("fill_rect") else {
            return;
        };
        log::debug!(target: "canvas", "fill_rect {:?}", params);
        if !params.is_finite() || params.is_empty() {
            return;
        }
        let r = params.offset(frame.offset_x, frame.offset_y);
        let mut path = CanvasPath::new();
        path.rect(r.x, r.y, r.width, r.height);
        self.draw_path_with(&path, PaintTarget::Fill, (frame.offset_x, frame.offset_y));
    }

    /// Stroke a rectangle outline. A rectangle with one zero side strokes
    /// as a line.
    pub fn stroke_rect(&mut self, params: &RectParams) {
        let Some(frame) = self.frame("stroke_rect") else {
            return;
        };
        log::debug!(target: "canvas", "stroke_rect {:?}", params);
        if !params.is_finite() || (params.width == 0.0 && params.height == 0.0) {
            return;
        }
        let r = params.offset(frame.offset_x, frame.offset_y);
        let mut path = CanvasPath::new();
        path.rect(r.x, r.y, r.width, r.height);
        self.draw_path_with(&path, PaintTarget::Stroke, (frame.offset_x, frame.offset_y));
    }

    /// Clear a rectangle to transparent black, respecting the clip.
    pub fn clear_rect(&mut self, params: &RectParams) {
        let Some(frame) = self.frame("clear_rect") else {
            return;
        };
        log::debug!(target: "canvas", "clear_rect {:?}", params);
        if !params.is_finite() {
            return;
        }
        self.backend
            .clear_rect(params.offset(frame.offset_x, frame.offset_y).to_kurbo());
    }

    /// Build the brush for `target` and draw `path` with it.
    pub(crate) fn draw_path_with(
        &mut self,
        path: &CanvasPath,
        target: PaintTarget,
        origin: (f64, f64),
    ) {
        if path.is_empty() {
            return;
        }
        let images = &self.images;
        let mut resolve = |pattern: &CanvasPattern| -> Option<Rc<RasterImage>> {
            match pattern.image() {
                PatternImage::Raster(raster) => Some(Rc::clone(raster)),
                PatternImage::Source(source) => images.get_image(source)?.to_raster(),
            }
        };
        let ctx = BrushContext {
            origin,
            transform: &self.transform,
            view_scale: self.view_scale,
            anti_alias: self.anti_alias,
        };
        let Some(brush) = build_brush(&self.paint, target, &ctx, &mut resolve) else {
            return;
        };
        self.render_brush(path, &brush);
    }

    /// Shadow pass, then the primary pass, through a full-canvas layer when
    /// the composite operation is not source-over.
    fn render_brush(&mut self, path: &CanvasPath, brush: &Brush) {
        if let Some(shadow) = &brush.shadow {
            self.backend.draw_shadow(path, &brush.paint, shadow);
        }
        let composite = brush.paint.composite;
        if composite.is_source_over() {
            self.backend.draw_path(path, &brush.paint);
            return;
        }
        let bounds = Rect::new(
            0.0,
            0.0,
            self.backend.width() as f64,
            self.backend.height() as f64,
        );
        let mut paint = brush.paint.clone();
        paint.composite = CompositeOperation::SourceOver;
        self.backend.save_layer(bounds, composite);
        self.backend.draw_path(path, &paint);
        self.backend.restore();
    }
}
