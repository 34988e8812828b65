//! Gradient types and shader construction.

use crate::backend::{RadialShape, Shader, ShaderStop};
use crate::error::{Canvas2dError, Canvas2dResult};
use crate::geometry::{
    CanvasColor, ConicGradientParams, LinearGradientParams, RadialGradientParams,
};
use kurbo::Point;

/// Sweep range of conic gradients, in degrees. Stops short of a full turn
/// so the wrap point does not produce a seam.
pub const SWEEP_END_DEGREES: f64 = 359.9;

/// A color stop in a gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    /// Offset position (0.0 to 1.0).
    pub offset: f64,
    pub color: CanvasColor,
}

/// Type of gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GradientKind {
    Linear(LinearGradientParams),
    Radial(RadialGradientParams),
    Conic(ConicGradientParams),
}

/// Canvas gradient (linear, radial or conic).
///
/// Stops are kept in insertion order and stably sorted when a shader is
/// built, so the result never depends on the order stops were added in.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasGradient {
    pub kind: GradientKind,
    stops: Vec<GradientStop>,
}

impl CanvasGradient {
    pub fn linear(params: LinearGradientParams) -> Self {
        Self {
            kind: GradientKind::Linear(params),
            stops: Vec::new(),
        }
    }

    pub fn radial(params: RadialGradientParams) -> Self {
        Self {
            kind: GradientKind::Radial(params),
            stops: Vec::new(),
        }
    }

    pub fn conic(params: ConicGradientParams) -> Self {
        Self {
            kind: GradientKind::Conic(params),
            stops: Vec::new(),
        }
    }

    /// Add a color stop. Offsets outside `[0, 1]` are rejected.
    pub fn add_color_stop(&mut self, offset: f64, color: CanvasColor) -> Canvas2dResult<()> {
        if !offset.is_finite() || !(0.0..=1.0).contains(&offset) {
            return Err(Canvas2dError::InvalidGradientStop(offset));
        }
        self.stops.push(GradientStop { offset, color });
        Ok(())
    }

    /// Add a color stop from a CSS color string.
    pub fn add_color_stop_str(&mut self, offset: f64, color: &str) -> Canvas2dResult<()> {
        self.add_color_stop(offset, CanvasColor::parse(color)?)
    }

    /// Stops in insertion order.
    pub fn stops(&self) -> &[GradientStop] {
        &self.stops
    }

    /// Stops sorted by offset; equal offsets keep their insertion order.
    pub fn sorted_stops(&self) -> Vec<GradientStop> {
        let mut stops = self.stops.clone();
        stops.sort_by(|a, b| a.offset.total_cmp(&b.offset));
        stops
    }

    /// Build the shader for this gradient with the content origin at
    /// `(dx, dy)`. Returns `None` when the gradient cannot produce one.
    pub fn to_shader(&self, dx: f64, dy: f64) -> Option<Shader> {
        let stops: Vec<ShaderStop> = self
            .sorted_stops()
            .into_iter()
            .map(|s| ShaderStop {
                offset: s.offset,
                color: s.color,
            })
            .collect();
        if stops.is_empty() {
            return None;
        }

        match self.kind {
            GradientKind::Linear(p) => Some(Shader::Linear {
                start: Point::new(p.x0 + dx, p.y0 + dy),
                end: Point::new(p.x1 + dx, p.y1 + dy),
                stops,
            }),
            GradientKind::Radial(p) => {
                let start = Point::new(p.x0 + dx, p.y0 + dy);
                let end = Point::new(p.x1 + dx, p.y1 + dy);
                let shape = if p.r0 <= 0.0 && start == end {
                    RadialShape::Single {
                        center: end,
                        radius: p.r1,
                    }
                } else {
                    RadialShape::TwoPoint {
                        start,
                        start_radius: p.r0,
                        end,
                        end_radius: p.r1,
                    }
                };
                Some(Shader::Radial { shape, stops })
            }
            GradientKind::Conic(p) => {
                let (Some(cx), Some(cy), Some(start_angle)) =
                    (p.center_x, p.center_y, p.start_angle)
                else {
                    log::debug!(target: "canvas", "conic gradient without center or start angle");
                    return None;
                };
                Some(Shader::Sweep {
                    center: Point::new(cx + dx, cy + dy),
                    rotation: start_angle.to_degrees(),
                    start_angle: 0.0,
                    end_angle: SWEEP_END_DEGREES,
                    stops,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: CanvasColor = CanvasColor::from_rgba8(255, 0, 0, 255);
    const GREEN: CanvasColor = CanvasColor::from_rgba8(0, 255, 0, 255);
    const BLUE: CanvasColor = CanvasColor::from_rgba8(0, 0, 255, 255);

    fn linear() -> CanvasGradient {
        CanvasGradient::linear(LinearGradientParams {
            x0: 0.0,
            y0: 0.0,
            x1: 100.0,
            y1: 0.0,
        })
    }

    #[test]
    fn test_stop_order_does_not_matter() {
        let mut a = linear();
        a.add_color_stop(0.0, RED).unwrap();
        a.add_color_stop(0.5, GREEN).unwrap();
        a.add_color_stop(1.0, BLUE).unwrap();

        let mut b = linear();
        b.add_color_stop(1.0, BLUE).unwrap();
        b.add_color_stop(0.0, RED).unwrap();
        b.add_color_stop(0.5, GREEN).unwrap();

        assert_eq!(a.to_shader(0.0, 0.0), b.to_shader(0.0, 0.0));
    }

    #[test]
    fn test_equal_offsets_keep_insertion_order() {
        let mut g = linear();
        g.add_color_stop(0.5, BLUE).unwrap();
        g.add_color_stop(0.5, RED).unwrap();
        g.add_color_stop(0.0, GREEN).unwrap();
        let colors: Vec<_> = g.sorted_stops().iter().map(|s| s.color).collect();
        assert_eq!(colors, vec![GREEN, BLUE, RED]);
    }

    #[test]
    fn test_invalid_stop_offset() {
        let mut g = linear();
        assert!(matches!(
            g.add_color_stop(1.5, RED),
            Err(Canvas2dError::InvalidGradientStop(_))
        ));
        assert!(g.add_color_stop(f64::NAN, RED).is_err());
        assert!(g.stops().is_empty());
    }

    #[test]
    fn test_linear_endpoints_are_offset() {
        let mut g = linear();
        g.add_color_stop(0.0, RED).unwrap();
        match g.to_shader(5.0, 7.0) {
            Some(Shader::Linear { start, end, .. }) => {
                assert_eq!(start, Point::new(5.0, 7.0));
                assert_eq!(end, Point::new(105.0, 7.0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_radial_single_vs_two_point() {
        let mut g = CanvasGradient::radial(RadialGradientParams {
            x0: 10.0,
            y0: 10.0,
            r0: 0.0,
            x1: 10.0,
            y1: 10.0,
            r1: 20.0,
        });
        g.add_color_stop(0.0, RED).unwrap();
        assert!(matches!(
            g.to_shader(0.0, 0.0),
            Some(Shader::Radial {
                shape: RadialShape::Single { radius, .. },
                ..
            }) if radius == 20.0
        ));

        g.kind = GradientKind::Radial(RadialGradientParams {
            x0: 10.0,
            y0: 10.0,
            r0: 5.0,
            x1: 10.0,
            y1: 10.0,
            r1: 20.0,
        });
        assert!(matches!(
            g.to_shader(0.0, 0.0),
            Some(Shader::Radial {
                shape: RadialShape::TwoPoint { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_conic_requires_all_params() {
        let mut g = CanvasGradient::conic(ConicGradientParams {
            center_x: Some(50.0),
            center_y: None,
            start_angle: Some(0.0),
        });
        g.add_color_stop(0.0, RED).unwrap();
        assert!(g.to_shader(0.0, 0.0).is_none());

        g.kind = GradientKind::Conic(ConicGradientParams {
            center_x: Some(50.0),
            center_y: Some(50.0),
            start_angle: Some(std::f64::consts::FRAC_PI_2),
        });
        match g.to_shader(0.0, 0.0) {
            Some(Shader::Sweep {
                rotation,
                start_angle,
                end_angle,
                ..
            }) => {
                assert!((rotation - 90.0).abs() < 1e-9);
                assert_eq!(start_angle, 0.0);
                assert_eq!(end_angle, SWEEP_END_DEGREES);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
