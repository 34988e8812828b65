//! The live drawing path.
//!
//! Coordinates stored here are absolute: callers go through [`PathWriter`],
//! which adds the content offset exactly once per coordinate before the
//! segment is appended.

use crate::arc::{self, TangentArc};
use crate::geometry::{
    ArcParams, ArcToParams, CornerRadius, CubicBezierParams, EllipseParams, QuadraticBezierParams,
    RectParams, RoundRectParams,
};
use crate::matrix::Matrix;
use crate::style::CanvasFillRule;
use kurbo::{BezPath, PathEl, Point, Shape, Vec2};

/// An ordered list of move/line/quad/cubic/close segments plus a fill rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanvasPath {
    path: BezPath,
    fill_rule: CanvasFillRule,
    current: Option<Point>,
    subpath_start: Option<Point>,
}

impl CanvasPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all segments. The fill rule tag is kept.
    pub fn clear(&mut self) {
        self.path = BezPath::new();
        self.current = None;
        self.subpath_start = None;
    }

    pub fn fill_rule(&self) -> CanvasFillRule {
        self.fill_rule
    }

    pub fn set_fill_rule(&mut self, rule: CanvasFillRule) {
        self.fill_rule = rule;
    }

    pub fn is_empty(&self) -> bool {
        self.path.elements().is_empty()
    }

    pub fn elements(&self) -> &[PathEl] {
        self.path.elements()
    }

    pub fn bez_path(&self) -> &BezPath {
        &self.path
    }

    pub fn current_point(&self) -> Option<Point> {
        self.current
    }

    /// Bounding box of all segments, or `None` for an empty path.
    pub fn bounds(&self) -> Option<kurbo::Rect> {
        if self.is_empty() {
            None
        } else {
            Some(self.path.bounding_box())
        }
    }

    /// Whether the path has at least one segment that encloses or strokes
    /// something (a lone move-to does not).
    pub fn has_geometry(&self) -> bool {
        self.path
            .elements()
            .iter()
            .any(|el| !matches!(el, PathEl::MoveTo(_) | PathEl::ClosePath))
    }

    /// Hit-test `(x, y)` using the path's fill rule. Open subpaths are
    /// implicitly closed.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let winding = self.closed_copy().winding(Point::new(x, y));
        match self.fill_rule {
            CanvasFillRule::NonZero => winding != 0,
            CanvasFillRule::EvenOdd => winding % 2 != 0,
        }
    }

    fn closed_copy(&self) -> BezPath {
        let mut closed = BezPath::new();
        let mut open = false;
        for el in self.path.elements() {
            if open && matches!(el, PathEl::MoveTo(_)) {
                closed.close_path();
            }
            open = !matches!(el, PathEl::ClosePath);
            closed.push(*el);
        }
        if open {
            closed.close_path();
        }
        closed
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        let p = Point::new(x, y);
        self.path.move_to(p);
        self.current = Some(p);
        self.subpath_start = Some(p);
    }

    /// Line to `(x, y)`; with no current point this starts a subpath there.
    pub fn line_to(&mut self, x: f64, y: f64) {
        if self.current.is_none() {
            self.move_to(x, y);
            return;
        }
        let p = Point::new(x, y);
        self.path.line_to(p);
        self.current = Some(p);
    }

    fn ensure_subpath(&mut self, x: f64, y: f64) {
        if self.current.is_none() {
            self.move_to(x, y);
        }
    }

    pub fn quad_to(&mut self, cpx: f64, cpy: f64, x: f64, y: f64) {
        self.ensure_subpath(cpx, cpy);
        let p = Point::new(x, y);
        self.path.quad_to(Point::new(cpx, cpy), p);
        self.current = Some(p);
    }

    pub fn cubic_to(&mut self, cp1x: f64, cp1y: f64, cp2x: f64, cp2y: f64, x: f64, y: f64) {
        self.ensure_subpath(cp1x, cp1y);
        let p = Point::new(x, y);
        self.path
            .curve_to(Point::new(cp1x, cp1y), Point::new(cp2x, cp2y), p);
        self.current = Some(p);
    }

    /// Close the current subpath. The segments are kept and the current
    /// point returns to the subpath start.
    pub fn close(&mut self) {
        if self.current.is_none() {
            return;
        }
        self.path.close_path();
        self.current = self.subpath_start;
    }

    /// Append a closed rectangle subpath.
    pub fn rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.move_to(x, y);
        self.path.line_to((x + width, y));
        self.path.line_to((x + width, y + height));
        self.path.line_to((x, y + height));
        self.close();
    }

    /// Append an elliptical arc. Angles are radians, `rotation` rotates the
    /// ellipse about its center.
    pub fn ellipse(&mut self, params: &EllipseParams) {
        let EllipseParams {
            x,
            y,
            radius_x,
            radius_y,
            rotation,
            start_angle,
            end_angle,
            anticlockwise,
        } = *params;
        if radius_x < 0.0 || radius_y < 0.0 {
            log::debug!(target: "canvas", "ellipse: negative radius ignored");
            return;
        }
        let pieces = arc::plan_arc(start_angle.to_degrees(), end_angle.to_degrees(), anticlockwise);
        if pieces.is_empty() {
            return;
        }

        let center = Point::new(x, y);
        let rotated = rotation != 0.0 && rotation.is_finite();
        if rotated {
            self.transform(&Matrix::rotation_about(-rotation, x, y));
        }

        let radii = Vec2::new(radius_x, radius_y);
        let start = arc::ellipse_point(center, radii, 0.0, pieces[0].start.to_radians());
        match self.current {
            Some(_) => self.line_to(start.x, start.y),
            None => self.move_to(start.x, start.y),
        }
        for piece in &pieces {
            arc::append_arc_piece(&mut self.path, center, radii, *piece);
        }
        self.current = self.path.elements().last().and_then(|el| el.end_point());

        if rotated {
            self.transform(&Matrix::rotation_about(rotation, x, y));
        }
    }

    pub fn arc(&mut self, params: &ArcParams) {
        self.ellipse(&EllipseParams::from(params));
    }

    /// Append a tangent arc between the current point, `(x1, y1)` and
    /// `(x2, y2)`.
    pub fn arc_to(&mut self, params: &ArcToParams) {
        let ArcToParams {
            x1,
            y1,
            x2,
            y2,
            radius,
        } = *params;
        if radius < 0.0 {
            log::debug!(target: "canvas", "arcTo: negative radius ignored");
            return;
        }
        let Some(p0) = self.current else {
            self.move_to(x1, y1);
            return;
        };
        match arc::tangent_arc(p0, Point::new(x1, y1), Point::new(x2, y2), radius) {
            TangentArc::Line(p) => self.line_to(p.x, p.y),
            TangentArc::Arc {
                tangent_start,
                center,
                radius,
                start_angle,
                sweep,
            } => {
                self.line_to(tangent_start.x, tangent_start.y);
                let piece = arc::ArcPiece {
                    start: start_angle.to_degrees(),
                    sweep: sweep.to_degrees(),
                };
                arc::append_arc_piece(&mut self.path, center, Vec2::new(radius, radius), piece);
                self.current = self.path.elements().last().and_then(|el| el.end_point());
            }
        }
    }

    /// Append a rounded rectangle. Radii that do not fit are scaled down
    /// uniformly.
    pub fn round_rect(&mut self, params: &RoundRectParams) {
        let r = params.rect.to_kurbo();
        let (w, h) = (r.width(), r.height());
        if params
            .radii
            .iter()
            .any(|c| c.x < 0.0 || c.y < 0.0 || !c.x.is_finite() || !c.y.is_finite())
        {
            log::debug!(target: "canvas", "roundRect: invalid radii ignored");
            return;
        }
        let [tl, tr, br, bl] = params.radii;
        let mut scale: f64 = 1.0;
        for (sum, side) in [
            (tl.x + tr.x, w),
            (bl.x + br.x, w),
            (tl.y + bl.y, h),
            (tr.y + br.y, h),
        ] {
            if sum > 0.0 {
                scale = scale.min(side / sum);
            }
        }
        let fit = |c: CornerRadius| Vec2::new(c.x * scale, c.y * scale);
        let (tl, tr, br, bl) = (fit(tl), fit(tr), fit(br), fit(bl));

        let corner = |path: &mut BezPath, center: Point, radii: Vec2, start: f64| {
            if radii.x > 0.0 && radii.y > 0.0 {
                arc::append_arc_piece(path, center, radii, arc::ArcPiece { start, sweep: 90.0 });
            } else {
                path.line_to(center);
            }
        };

        self.move_to(r.x0 + tl.x, r.y0);
        self.path.line_to((r.x1 - tr.x, r.y0));
        corner(&mut self.path, Point::new(r.x1 - tr.x, r.y0 + tr.y), tr, 270.0);
        self.path.line_to((r.x1, r.y1 - br.y));
        corner(&mut self.path, Point::new(r.x1 - br.x, r.y1 - br.y), br, 0.0);
        self.path.line_to((r.x0 + bl.x, r.y1));
        corner(&mut self.path, Point::new(r.x0 + bl.x, r.y1 - bl.y), bl, 90.0);
        self.path.line_to((r.x0, r.y0 + tl.y));
        corner(&mut self.path, Point::new(r.x0 + tl.x, r.y0 + tl.y), tl, 180.0);
        self.close();
        self.move_to(params.rect.x, params.rect.y);
    }

    /// Append every segment of `other`, optionally mapped through `matrix`.
    pub fn append(&mut self, other: &CanvasPath, matrix: Option<&Matrix>) {
        let mut segments = other.path.clone();
        if let Some(m) = matrix {
            segments.apply_affine(m.to_affine());
        }
        for el in segments.elements() {
            self.path.push(*el);
        }
        if let Some(last) = segments.elements().last() {
            self.current = last.end_point().or(self.current);
        }
        self.subpath_start = segments
            .elements()
            .iter()
            .rev()
            .find_map(|el| match el {
                PathEl::MoveTo(p) => Some(*p),
                _ => None,
            })
            .or(self.subpath_start);
    }

    /// Map every segment of the path through `matrix`.
    pub fn transform(&mut self, matrix: &Matrix) {
        let affine = matrix.to_affine();
        self.path.apply_affine(affine);
        self.current = self.current.map(|p| affine * p);
        self.subpath_start = self.subpath_start.map(|p| affine * p);
    }

    /// A copy of the path with every coordinate shifted by `(dx, dy)`.
    pub fn translated(&self, dx: f64, dy: f64) -> CanvasPath {
        let mut copy = self.clone();
        copy.transform(&Matrix::translation(dx, dy));
        copy
    }
}

/// Appends segments to a [`CanvasPath`] after adding a content offset.
///
/// Both the live path operations and `Path2D` replay go through this type,
/// so identical verbs with an identical offset produce identical geometry.
pub struct PathWriter<'a> {
    path: &'a mut CanvasPath,
    dx: f64,
    dy: f64,
}

impl<'a> PathWriter<'a> {
    pub fn new(path: &'a mut CanvasPath, dx: f64, dy: f64) -> Self {
        Self { path, dx, dy }
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.path.move_to(x + self.dx, y + self.dy);
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        self.path.line_to(x + self.dx, y + self.dy);
    }

    pub fn bezier_curve_to(&mut self, p: &CubicBezierParams) {
        let (dx, dy) = (self.dx, self.dy);
        self.path.cubic_to(
            p.cp1x + dx,
            p.cp1y + dy,
            p.cp2x + dx,
            p.cp2y + dy,
            p.x + dx,
            p.y + dy,
        );
    }

    pub fn quadratic_curve_to(&mut self, p: &QuadraticBezierParams) {
        self.path
            .quad_to(p.cpx + self.dx, p.cpy + self.dy, p.x + self.dx, p.y + self.dy);
    }

    pub fn arc(&mut self, p: &ArcParams) {
        self.path.arc(&ArcParams {
            x: p.x + self.dx,
            y: p.y + self.dy,
            ..*p
        });
    }

    pub fn arc_to(&mut self, p: &ArcToParams) {
        self.path.arc_to(&ArcToParams {
            x1: p.x1 + self.dx,
            y1: p.y1 + self.dy,
            x2: p.x2 + self.dx,
            y2: p.y2 + self.dy,
            radius: p.radius,
        });
    }

    pub fn ellipse(&mut self, p: &EllipseParams) {
        self.path.ellipse(&EllipseParams {
            x: p.x + self.dx,
            y: p.y + self.dy,
            ..*p
        });
    }

    pub fn rect(&mut self, r: &RectParams) {
        let r = r.offset(self.dx, self.dy);
        self.path.rect(r.x, r.y, r.width, r.height);
    }

    pub fn round_rect(&mut self, p: &RoundRectParams) {
        self.path.round_rect(&RoundRectParams {
            rect: p.rect.offset(self.dx, self.dy),
            radii: p.radii,
        });
    }

    pub fn close_path(&mut self) {
        self.path.close();
    }

    /// Append already-offset geometry verbatim.
    pub fn append_absolute(&mut self, other: &CanvasPath) {
        self.path.append(other, None);
    }

    /// The target path, for operations that work on absolute geometry.
    pub fn path_mut(&mut self) -> &mut CanvasPath {
        self.path
    }

    pub fn offset(&self) -> (f64, f64) {
        (self.dx, self.dy)
    }
}
