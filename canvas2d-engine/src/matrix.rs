//! 2D affine matrix used by the transform engine and the backend interface.

use kurbo::Affine;

/// A 3×2 affine matrix.
///
/// ```text
/// | scale_x  skew_x   translate_x |
/// | skew_y   scale_y  translate_y |
/// |   0        0          1       |
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub scale_x: f64,
    pub skew_x: f64,
    pub translate_x: f64,
    pub skew_y: f64,
    pub scale_y: f64,
    pub translate_y: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    /// Create a matrix in canvas `transform(a, b, c, d, e, f)` argument order.
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self {
            scale_x: a,
            skew_y: b,
            skew_x: c,
            scale_y: d,
            translate_x: e,
            translate_y: f,
        }
    }

    pub const fn identity() -> Self {
        Self {
            scale_x: 1.0,
            skew_x: 0.0,
            translate_x: 0.0,
            skew_y: 0.0,
            scale_y: 1.0,
            translate_y: 0.0,
        }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scaling(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Rotation by `angle` radians, clockwise in a y-down coordinate system.
    pub fn rotation(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// Rotation by `angle` radians about `(cx, cy)`.
    pub fn rotation_about(angle: f64, cx: f64, cy: f64) -> Self {
        Self::translation(cx, cy)
            .pre_concat(&Self::rotation(angle))
            .pre_concat(&Self::translation(-cx, -cy))
    }

    /// Returns `self × other`: `other` is applied to points first.
    pub fn pre_concat(&self, other: &Matrix) -> Matrix {
        Matrix::from(self.to_affine() * other.to_affine())
    }

    /// Returns `other × self`: `self` is applied to points first.
    pub fn post_concat(&self, other: &Matrix) -> Matrix {
        other.pre_concat(self)
    }

    pub fn invert(&self) -> Option<Matrix> {
        let det = self.scale_x * self.scale_y - self.skew_x * self.skew_y;
        if det.abs() < f64::EPSILON || !det.is_finite() {
            return None;
        }
        Some(Matrix::from(self.to_affine().inverse()))
    }

    pub fn map_point(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.scale_x * x + self.skew_x * y + self.translate_x,
            self.skew_y * x + self.scale_y * y + self.translate_y,
        )
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    pub fn is_finite(&self) -> bool {
        self.to_affine().as_coeffs().iter().all(|v| v.is_finite())
    }

    pub fn to_affine(&self) -> Affine {
        Affine::new([
            self.scale_x,
            self.skew_y,
            self.skew_x,
            self.scale_y,
            self.translate_x,
            self.translate_y,
        ])
    }
}

impl From<Affine> for Matrix {
    fn from(affine: Affine) -> Self {
        let [a, b, c, d, e, f] = affine.as_coeffs();
        Matrix::new(a, b, c, d, e, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &Matrix, b: &Matrix) {
        let (ca, cb) = (a.to_affine().as_coeffs(), b.to_affine().as_coeffs());
        for (x, y) in ca.iter().zip(cb.iter()) {
            assert!((x - y).abs() < 1e-9, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn test_pre_concat_applies_argument_first() {
        let m = Matrix::translation(10.0, 0.0).pre_concat(&Matrix::scaling(2.0, 2.0));
        assert_eq!(m.map_point(1.0, 1.0), (12.0, 2.0));
    }

    #[test]
    fn test_rotation_about_center_keeps_center_fixed() {
        let m = Matrix::rotation_about(std::f64::consts::FRAC_PI_2, 5.0, 5.0);
        let (x, y) = m.map_point(5.0, 5.0);
        assert!((x - 5.0).abs() < 1e-9 && (y - 5.0).abs() < 1e-9);
        let (x, y) = m.map_point(6.0, 5.0);
        assert!((x - 5.0).abs() < 1e-9 && (y - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_invert_round_trip() {
        let m = Matrix::new(2.0, 0.5, -0.25, 3.0, 7.0, -4.0);
        let inv = m.invert().unwrap();
        assert_close(&m.pre_concat(&inv), &Matrix::identity());
    }

    #[test]
    fn test_singular_matrix_has_no_inverse() {
        assert!(Matrix::scaling(0.0, 1.0).invert().is_none());
    }

    #[test]
    fn test_affine_coefficient_order() {
        let m = Matrix::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        assert_eq!(m.skew_y, 2.0);
        assert_eq!(m.skew_x, 3.0);
        assert_eq!(m.to_affine().as_coeffs(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(Matrix::from(m.to_affine()), m);
    }
}
