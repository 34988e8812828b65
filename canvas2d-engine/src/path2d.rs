//! Path2D: a reusable, replayable recording of path commands.
//!
//! A `Path2D` never holds geometry. It keeps the commands it was given and
//! regenerates a [`CanvasPath`] on demand through [`parse_path2d`], applying
//! the content offset of the draw call that uses it.

use crate::error::{Canvas2dError, Canvas2dResult};
use crate::geometry::{
    ArcParams, ArcToParams, CubicBezierParams, EllipseParams, QuadraticBezierParams, RectParams,
    RoundRectParams,
};
use crate::matrix::Matrix;
use crate::path::{CanvasPath, PathWriter};
use crate::style::CanvasFillRule;
use std::rc::Rc;

/// One recorded path command, in content-local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum PathCommand {
    MoveTo { x: f64, y: f64 },
    LineTo { x: f64, y: f64 },
    BezierCurveTo(CubicBezierParams),
    QuadraticCurveTo(QuadraticBezierParams),
    Arc(ArcParams),
    ArcTo(ArcToParams),
    Ellipse(EllipseParams),
    Rect(RectParams),
    RoundRect(RoundRectParams),
    ClosePath,
    /// Another path, optionally transformed, appended in one step.
    AddPath {
        path: Rc<Path2D>,
        matrix: Option<Matrix>,
    },
    /// SVG path data; validated when recorded.
    SvgPath(String),
    /// Transform everything recorded so far.
    SetTransform(Matrix),
}

/// A reusable path object for fill, stroke, clip and hit testing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path2D {
    commands: Vec<PathCommand>,
    fill_rule: CanvasFillRule,
}

impl Path2D {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a Path2D from SVG path data.
    ///
    /// All SVG commands are accepted (M, L, H, V, Q, T, C, S, A, Z); arcs
    /// become cubic curves on replay.
    ///
    /// ```
    /// use canvas2d_engine::Path2D;
    ///
    /// let path = Path2D::from_svg_path_data("M10,10 L50,50 A10,10 0 0 1 100,100 Z").unwrap();
    /// assert_eq!(path.commands().len(), 1);
    /// ```
    pub fn from_svg_path_data(path_data: &str) -> Canvas2dResult<Self> {
        let mut path = Path2D::new();
        path.add_svg_path_data(path_data)?;
        Ok(path)
    }

    /// Append SVG path data after checking that it parses.
    pub fn add_svg_path_data(&mut self, path_data: &str) -> Canvas2dResult<()> {
        for segment in svgtypes::SimplifyingPathParser::from(path_data) {
            segment.map_err(|e| {
                Canvas2dError::InvalidArgument(format!("Invalid SVG path data: {e:?}"))
            })?;
        }
        self.commands
            .push(PathCommand::SvgPath(path_data.to_string()));
        Ok(())
    }

    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn fill_rule(&self) -> CanvasFillRule {
        self.fill_rule
    }

    /// Tag this path's fill rule. Independent of the live path's rule.
    pub fn set_fill_rule(&mut self, rule: CanvasFillRule) {
        self.fill_rule = rule;
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.commands.push(PathCommand::MoveTo { x, y });
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        self.commands.push(PathCommand::LineTo { x, y });
    }

    pub fn bezier_curve_to(&mut self, params: &CubicBezierParams) {
        self.commands.push(PathCommand::BezierCurveTo(*params));
    }

    pub fn quadratic_curve_to(&mut self, params: &QuadraticBezierParams) {
        self.commands.push(PathCommand::QuadraticCurveTo(*params));
    }

    pub fn arc(&mut self, params: &ArcParams) {
        self.commands.push(PathCommand::Arc(*params));
    }

    pub fn arc_to(&mut self, params: &ArcToParams) {
        self.commands.push(PathCommand::ArcTo(*params));
    }

    pub fn ellipse(&mut self, params: &EllipseParams) {
        self.commands.push(PathCommand::Ellipse(*params));
    }

    pub fn rect(&mut self, params: &RectParams) {
        self.commands.push(PathCommand::Rect(*params));
    }

    pub fn round_rect(&mut self, params: &RoundRectParams) {
        self.commands.push(PathCommand::RoundRect(*params));
    }

    pub fn close_path(&mut self) {
        self.commands.push(PathCommand::ClosePath);
    }

    /// Append `path`, mapped through `matrix` when given.
    pub fn add_path(&mut self, path: &Path2D, matrix: Option<Matrix>) {
        self.commands.push(PathCommand::AddPath {
            path: Rc::new(path.clone()),
            matrix,
        });
    }

    /// Transform the geometry recorded so far.
    pub fn set_transform(&mut self, matrix: Matrix) {
        self.commands.push(PathCommand::SetTransform(matrix));
    }
}

/// Replay `path` into a fresh [`CanvasPath`] with every coordinate shifted
/// by `(dx, dy)`. The result carries the Path2D's fill rule.
pub fn parse_path2d(path: &Path2D, dx: f64, dy: f64) -> CanvasPath {
    let mut out = CanvasPath::new();
    out.set_fill_rule(path.fill_rule);
    replay(&mut PathWriter::new(&mut out, dx, dy), &path.commands);
    out
}

fn replay(writer: &mut PathWriter<'_>, commands: &[PathCommand]) {
    for command in commands {
        match command {
            PathCommand::MoveTo { x, y } => writer.move_to(*x, *y),
            PathCommand::LineTo { x, y } => writer.line_to(*x, *y),
            PathCommand::BezierCurveTo(p) => writer.bezier_curve_to(p),
            PathCommand::QuadraticCurveTo(p) => writer.quadratic_curve_to(p),
            PathCommand::Arc(p) => writer.arc(p),
            PathCommand::ArcTo(p) => writer.arc_to(p),
            PathCommand::Ellipse(p) => writer.ellipse(p),
            PathCommand::Rect(p) => writer.rect(p),
            PathCommand::RoundRect(p) => writer.round_rect(p),
            PathCommand::ClosePath => writer.close_path(),
            PathCommand::AddPath { path, matrix } => {
                let (dx, dy) = writer.offset();
                let mut sub = parse_path2d(path, 0.0, 0.0);
                if let Some(m) = matrix {
                    sub.transform(m);
                }
                sub.transform(&Matrix::translation(dx, dy));
                writer.append_absolute(&sub);
            }
            PathCommand::SvgPath(data) => replay_svg(writer, data),
            PathCommand::SetTransform(m) => {
                let (dx, dy) = writer.offset();
                let local = Matrix::translation(dx, dy)
                    .pre_concat(m)
                    .pre_concat(&Matrix::translation(-dx, -dy));
                writer.path_mut().transform(&local);
            }
        }
    }
}

fn replay_svg(writer: &mut PathWriter<'_>, data: &str) {
    for segment in svgtypes::SimplifyingPathParser::from(data) {
        let Ok(segment) = segment else {
            log::debug!(target: "canvas", "svg path data stopped parsing during replay");
            return;
        };
        match segment {
            svgtypes::SimplePathSegment::MoveTo { x, y } => writer.move_to(x, y),
            svgtypes::SimplePathSegment::LineTo { x, y } => writer.line_to(x, y),
            svgtypes::SimplePathSegment::Quadratic { x1, y1, x, y } => {
                writer.quadratic_curve_to(&QuadraticBezierParams {
                    cpx: x1,
                    cpy: y1,
                    x,
                    y,
                })
            }
            svgtypes::SimplePathSegment::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => writer.bezier_curve_to(&CubicBezierParams {
                cp1x: x1,
                cp1y: y1,
                cp2x: x2,
                cp2y: y2,
                x,
                y,
            }),
            svgtypes::SimplePathSegment::ClosePath => writer.close_path(),
        }
    }
}
