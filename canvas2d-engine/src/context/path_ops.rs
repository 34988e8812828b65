//! Live path construction and hit testing.

use super::Canvas2dEngine;
use crate::backend::RenderBackend;
use crate::geometry::{
    ArcParams, ArcToParams, ContentFrame, CubicBezierParams, EllipseParams, QuadraticBezierParams,
    RectParams, RoundRectParams,
};
use crate::path::{CanvasPath, PathWriter};
use crate::path2d::{parse_path2d, Path2D};
use crate::style::CanvasFillRule;

impl<B: RenderBackend> Canvas2dEngine<B> {
    /// Append to the live path through a writer carrying the frame offset.
    fn write_path(&mut self, op: &str, build: impl FnOnce(&mut PathWriter<'_>)) {
        let Some(frame) = self.frame(op) else {
            return;
        };
        log::debug!(target: "canvas", "{}", op);
        let mut writer = PathWriter::new(&mut self.path, frame.offset_x, frame.offset_y);
        build(&mut writer);
    }

    /// Start a new path. The fill rule tag is kept.
    pub fn begin_path(&mut self) {
        if self.frame("begin_path").is_none() {
            return;
        }
        log::debug!(target: "canvas", "begin_path");
        self.path.clear();
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.write_path("move_to", |w| w.move_to(x, y));
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        self.write_path("line_to", |w| w.line_to(x, y));
    }

    pub fn close_path(&mut self) {
        self.write_path("close_path", |w| w.close_path());
    }

    pub fn bezier_curve_to(&mut self, params: &CubicBezierParams) {
        self.write_path("bezier_curve_to", |w| w.bezier_curve_to(params));
    }

    pub fn quadratic_curve_to(&mut self, params: &QuadraticBezierParams) {
        self.write_path("quadratic_curve_to", |w| w.quadratic_curve_to(params));
    }

    /// Circular arc; angles in radians.
    pub fn arc(&mut self, params: &ArcParams) {
        self.write_path("arc", |w| w.arc(params));
    }

    pub fn arc_to(&mut self, params: &ArcToParams) {
        self.write_path("arc_to", |w| w.arc_to(params));
    }

    pub fn ellipse(&mut self, params: &EllipseParams) {
        self.write_path("ellipse", |w| w.ellipse(params));
    }

    /// Append a closed rectangle subpath.
    pub fn rect(&mut self, params: &RectParams) {
        self.write_path("rect", |w| w.rect(params));
    }

    pub fn round_rect(&mut self, params: &RoundRectParams) {
        self.write_path("round_rect", |w| w.round_rect(params));
    }

    /// Tag the live path with a fill rule used by fill, clip and hit tests.
    pub fn set_fill_rule_for_path(&mut self, rule: CanvasFillRule) {
        log::debug!(target: "canvas", "set_fill_rule_for_path {:?}", rule);
        self.path.set_fill_rule(rule);
    }

    /// Tag a `Path2D` with a fill rule; the live path is not affected.
    pub fn set_fill_rule_for_path2d(&self, path: &mut Path2D, rule: CanvasFillRule) {
        log::debug!(target: "canvas", "set_fill_rule_for_path2d {:?}", rule);
        path.set_fill_rule(rule);
    }

    /// Regenerate a `Path2D` at the current frame offset.
    pub(crate) fn replay_path2d(&self, op: &str, path: &Path2D) -> Option<CanvasPath> {
        let frame = self.frame(op)?;
        log::debug!(target: "canvas", "{} ({} commands)", op, path.commands().len());
        Some(parse_path2d(path, frame.offset_x, frame.offset_y))
    }

    /// Whether canvas point `(x, y)`, relative to the content origin, lies
    /// inside the live path under the current transform.
    pub fn is_point_in_path(&self, x: f64, y: f64) -> bool {
        let Some(frame) = self.frame("is_point_in_path") else {
            return false;
        };
        self.hit_test(&self.path, &frame, x, y)
    }

    pub fn is_point_in_path2d(&self, path: &Path2D, x: f64, y: f64) -> bool {
        let Some(frame) = self.frame("is_point_in_path2d") else {
            return false;
        };
        let replayed = parse_path2d(path, frame.offset_x, frame.offset_y);
        self.hit_test(&replayed, &frame, x, y)
    }

    /// Stored paths carry the frame offset, so the query point is moved into
    /// the same space before testing.
    fn hit_test(&self, path: &CanvasPath, frame: &ContentFrame, x: f64, y: f64) -> bool {
        if !x.is_finite() || !y.is_finite() {
            return false;
        }
        let (px, py) = (x + frame.offset_x, y + frame.offset_y);
        let matrix = self.transform.matrix();
        if matrix.is_identity() {
            return path.contains(px, py);
        }
        let mut mapped = path.clone();
        mapped.transform(&matrix);
        mapped.contains(px, py)
    }
}
