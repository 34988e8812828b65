//! The engine's logical transform, kept apart from the backend's matrix.

use crate::matrix::Matrix;

/// Logical user transform with its own save/restore stack.
///
/// The backend receives `S(view_scale) · M`; callers and pattern alignment
/// read `M` from here without querying the backend.
#[derive(Debug, Clone, Default)]
pub struct TransformEngine {
    current: Matrix,
    stack: Vec<Matrix>,
}

impl TransformEngine {
    pub const fn new() -> Self {
        Self {
            current: Matrix::identity(),
            stack: Vec::new(),
        }
    }

    pub fn matrix(&self) -> Matrix {
        self.current
    }

    /// The matrix handed to the backend.
    pub fn device_matrix(&self, view_scale: f64) -> Matrix {
        Matrix::scaling(view_scale, view_scale).pre_concat(&self.current)
    }

    /// Pattern space to device space for a pattern drawn at content origin
    /// `(dx, dy)`.
    pub fn pattern_matrix(&self, view_scale: f64, dx: f64, dy: f64, pattern: &Matrix) -> Matrix {
        self.device_matrix(view_scale)
            .pre_concat(&Matrix::translation(dx, dy))
            .pre_concat(pattern)
    }

    pub fn scale(&mut self, sx: f64, sy: f64) {
        self.transform(&Matrix::scaling(sx, sy));
    }

    /// Rotate by `angle` radians.
    pub fn rotate(&mut self, angle: f64) {
        self.transform(&Matrix::rotation(angle));
    }

    pub fn translate(&mut self, tx: f64, ty: f64) {
        self.transform(&Matrix::translation(tx, ty));
    }

    pub fn transform(&mut self, matrix: &Matrix) {
        self.current = self.current.pre_concat(matrix);
    }

    pub fn set_transform(&mut self, matrix: Matrix) {
        self.current = matrix;
    }

    pub fn reset_transform(&mut self) {
        self.current = Matrix::identity();
    }

    pub fn save(&mut self) {
        self.stack.push(self.current);
    }

    /// Returns false when there was nothing to restore.
    pub fn restore(&mut self) -> bool {
        match self.stack.pop() {
            Some(m) => {
                self.current = m;
                true
            }
            None => false,
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn reset(&mut self) {
        self.current = Matrix::identity();
        self.stack.clear();
    }
}
