//! Arc sweep-angle conventions and tangent-arc construction.
//!
//! Angles arrive in radians but are folded in degrees, then each planned
//! piece is lowered to cubic segments through `kurbo::Arc`.

use kurbo::{Arc, BezPath, Point, Vec2};

/// Flattening tolerance used when lowering arcs to cubics.
const ARC_TOLERANCE: f64 = 0.01;

const SWEEP_EPSILON: f64 = 1e-9;

/// Fold the raw sweep of an arc into the canvas direction convention.
///
/// `start` and `end` are in degrees. An anticlockwise arc whose end lies
/// past its start wraps into a negative sweep, and a clockwise arc whose
/// end lies at or before its start wraps into a positive one.
pub fn fold_sweep(start: f64, end: f64, anticlockwise: bool) -> f64 {
    let sweep = end - start;
    if anticlockwise && end > start {
        sweep % 360.0 - 360.0
    } else if !anticlockwise && end <= start {
        sweep % 360.0 + 360.0
    } else {
        sweep
    }
}

/// One arc primitive in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcPiece {
    pub start: f64,
    pub sweep: f64,
}

fn is_whole_turn(sweep: f64) -> bool {
    let rem = (sweep % 360.0).abs();
    sweep.abs() > SWEEP_EPSILON && (rem < SWEEP_EPSILON || 360.0 - rem < SWEEP_EPSILON)
}

/// Split a folded sweep into the arc primitives that draw it.
///
/// A whole number of turns becomes two half circles, a sweep beyond one
/// turn becomes two half circles plus the signed remainder, and anything
/// else is a single arc. Equal start and end angles draw nothing.
pub fn plan_arc(start: f64, end: f64, anticlockwise: bool) -> Vec<ArcPiece> {
    if start == end || !start.is_finite() || !end.is_finite() {
        return Vec::new();
    }
    let sweep = fold_sweep(start, end, anticlockwise);
    let half = 180.0_f64.copysign(sweep);
    if is_whole_turn(sweep) {
        vec![
            ArcPiece { start, sweep: half },
            ArcPiece {
                start: start + half,
                sweep: half,
            },
        ]
    } else if sweep.abs() > 360.0 {
        vec![
            ArcPiece { start, sweep: half },
            ArcPiece {
                start: start + half,
                sweep: half,
            },
            ArcPiece {
                start: start + 2.0 * half,
                sweep: sweep % 360.0,
            },
        ]
    } else if sweep.abs() < SWEEP_EPSILON {
        Vec::new()
    } else {
        vec![ArcPiece { start, sweep }]
    }
}

/// Point on an (optionally rotated) ellipse at `angle` radians.
pub fn ellipse_point(center: Point, radii: Vec2, x_rotation: f64, angle: f64) -> Point {
    let (sin, cos) = angle.sin_cos();
    let (rot_sin, rot_cos) = x_rotation.sin_cos();
    let (px, py) = (radii.x * cos, radii.y * sin);
    Point::new(
        center.x + px * rot_cos - py * rot_sin,
        center.y + px * rot_sin + py * rot_cos,
    )
}

/// Append the cubic segments of one arc piece. The path must already be
/// positioned at the piece's start point.
pub fn append_arc_piece(path: &mut BezPath, center: Point, radii: Vec2, piece: ArcPiece) {
    let arc = Arc {
        center,
        radii,
        start_angle: piece.start.to_radians(),
        sweep_angle: piece.sweep.to_radians(),
        x_rotation: 0.0,
    };
    for el in arc.append_iter(ARC_TOLERANCE) {
        path.push(el);
    }
}

/// Result of the tangent-circle construction used by `arcTo`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TangentArc {
    /// The construction degenerates to a straight line to the given point.
    Line(Point),
    /// Line to `tangent_start`, then arc around `center`.
    Arc {
        tangent_start: Point,
        center: Point,
        radius: f64,
        /// Start angle in radians.
        start_angle: f64,
        /// Signed sweep in radians, always less than half a turn.
        sweep: f64,
    },
}

/// Build the arc tangent to the lines `p0→p1` and `p1→p2` with `radius`.
pub fn tangent_arc(p0: Point, p1: Point, p2: Point, radius: f64) -> TangentArc {
    if radius == 0.0 || p0 == p1 || p1 == p2 {
        return TangentArc::Line(p1);
    }

    let v1 = p0 - p1;
    let v2 = p2 - p1;
    let (len1, len2) = (v1.hypot(), v2.hypot());
    if len1 < 1e-12 || len2 < 1e-12 {
        return TangentArc::Line(p1);
    }
    let (v1, v2) = (v1 / len1, v2 / len2);

    let cross = v1.cross(v2);
    let dot = v1.dot(v2);
    let angle = cross.atan2(dot);
    // Collinear control points
    if angle.abs() < 1e-9 || (angle.abs() - std::f64::consts::PI).abs() < 1e-9 {
        return TangentArc::Line(p1);
    }

    let seg_len = radius / (angle / 2.0).tan().abs();
    let tangent_start = p1 + v1 * seg_len;
    let tangent_end = p1 + v2 * seg_len;

    let sign = if cross < 0.0 { -1.0 } else { 1.0 };
    let normal = Vec2::new(-v1.y * sign, v1.x * sign);
    let center = tangent_start + normal * radius;

    let start_angle = (tangent_start - center).atan2();
    let end_angle = (tangent_end - center).atan2();
    let mut sweep = end_angle - start_angle;
    while sweep > std::f64::consts::PI {
        sweep -= 2.0 * std::f64::consts::PI;
    }
    while sweep < -std::f64::consts::PI {
        sweep += 2.0 * std::f64::consts::PI;
    }

    TangentArc::Arc {
        tangent_start,
        center,
        radius,
        start_angle,
        sweep,
    }
}

#[cfg(test)]
pub(crate) fn curve_count(path: &BezPath) -> usize {
    path.elements()
        .iter()
        .filter(|el| matches!(el, kurbo::PathEl::CurveTo(..)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::f64::consts::PI;

    #[rstest]
    #[case(0.0, 90.0, false, 90.0)]
    #[case(0.0, 90.0, true, -270.0)]
    #[case(90.0, 0.0, false, 270.0)]
    #[case(90.0, 0.0, true, -90.0)]
    #[case(0.0, 720.0, false, 720.0)]
    fn test_fold_sweep(
        #[case] start: f64,
        #[case] end: f64,
        #[case] anticlockwise: bool,
        #[case] expected: f64,
    ) {
        assert!((fold_sweep(start, end, anticlockwise) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_full_circle_is_two_half_arcs() {
        let pieces = plan_arc((1.5 * PI).to_degrees(), (3.5 * PI).to_degrees(), false);
        assert_eq!(pieces.len(), 2);
        assert!((pieces[0].sweep - 180.0).abs() < 1e-9);
        assert!((pieces[1].sweep - 180.0).abs() < 1e-9);
        assert!((pieces[1].start - (pieces[0].start + 180.0)).abs() < 1e-9);
    }

    #[test]
    fn test_clockwise_wrap_is_single_arc() {
        let start = (3.5 * PI).to_degrees();
        let end = (1.3 * PI).to_degrees();
        let pieces = plan_arc(start, end, false);
        assert_eq!(pieces.len(), 1);
        let expected = (end - start) % 360.0 + 360.0;
        assert!((pieces[0].sweep - expected).abs() < 1e-9);
        assert!((pieces[0].sweep - 324.0).abs() < 1e-6);
    }

    #[test]
    fn test_sweep_beyond_one_turn_splits_in_three() {
        let pieces = plan_arc(0.0, 450.0, false);
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[2].start, 360.0);
        assert!((pieces[2].sweep - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_anticlockwise_full_circle_is_negative() {
        let pieces = plan_arc(0.0, -360.0, true);
        assert_eq!(pieces.len(), 2);
        assert!(pieces.iter().all(|p| p.sweep < 0.0));
    }

    #[test]
    fn test_equal_angles_draw_nothing() {
        assert!(plan_arc(45.0, 45.0, false).is_empty());
        assert!(plan_arc(45.0, 45.0, true).is_empty());
    }

    #[test]
    fn test_arc_piece_ends_on_circle() {
        let mut path = BezPath::new();
        let center = Point::new(50.0, 50.0);
        let radii = Vec2::new(20.0, 20.0);
        path.move_to(ellipse_point(center, radii, 0.0, 0.0));
        append_arc_piece(
            &mut path,
            center,
            radii,
            ArcPiece {
                start: 0.0,
                sweep: 90.0,
            },
        );
        assert!(curve_count(&path) >= 1);
        let end = path.elements().last().and_then(|el| el.end_point()).unwrap();
        assert!((end.x - 50.0).abs() < 1e-9);
        assert!((end.y - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_tangent_arc_right_angle() {
        let arc = tangent_arc(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            5.0,
        );
        match arc {
            TangentArc::Arc {
                tangent_start,
                center,
                sweep,
                ..
            } => {
                assert!((tangent_start.x - 5.0).abs() < 1e-9);
                assert!(tangent_start.y.abs() < 1e-9);
                assert!((center.x - 5.0).abs() < 1e-9);
                assert!((center.y - 5.0).abs() < 1e-9);
                assert!((sweep - PI / 2.0).abs() < 1e-9);
            }
            other => panic!("expected arc, got {other:?}"),
        }
    }

    #[test]
    fn test_tangent_arc_degenerates_to_line() {
        let collinear = tangent_arc(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(20.0, 0.0),
            5.0,
        );
        assert_eq!(collinear, TangentArc::Line(Point::new(10.0, 0.0)));
        let zero_radius = tangent_arc(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            0.0,
        );
        assert_eq!(zero_radius, TangentArc::Line(Point::new(10.0, 0.0)));
    }
}
