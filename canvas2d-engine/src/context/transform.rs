//! Transform operations.
//!
//! The logical matrix lives in the [`TransformEngine`](crate::transform::TransformEngine);
//! after each change the backend receives it pre-scaled by the view scale.

use super::Canvas2dEngine;
use crate::backend::RenderBackend;
use crate::matrix::Matrix;

impl<B: RenderBackend> Canvas2dEngine<B> {
    pub fn translate(&mut self, x: f64, y: f64) {
        if self.frame("translate").is_none() {
            return;
        }
        log::debug!(target: "canvas", "translate {} {}", x, y);
        self.transform.translate(x, y);
        self.sync_matrix();
    }

    /// Rotate by `angle` radians.
    pub fn rotate(&mut self, angle: f64) {
        if self.frame("rotate").is_none() {
            return;
        }
        log::debug!(target: "canvas", "rotate {}", angle);
        self.transform.rotate(angle);
        self.sync_matrix();
    }

    pub fn scale(&mut self, x: f64, y: f64) {
        if self.frame("scale").is_none() {
            return;
        }
        log::debug!(target: "canvas", "scale {} {}", x, y);
        self.transform.scale(x, y);
        self.sync_matrix();
    }

    /// Multiply the current matrix by `matrix`. Non-finite matrices are
    /// ignored.
    pub fn transform(&mut self, matrix: Matrix) {
        if self.frame("transform").is_none() || !matrix.is_finite() {
            return;
        }
        log::debug!(target: "canvas", "transform {:?}", matrix);
        self.transform.transform(&matrix);
        self.sync_matrix();
    }

    pub fn set_transform(&mut self, matrix: Matrix) {
        if self.frame("set_transform").is_none() || !matrix.is_finite() {
            return;
        }
        log::debug!(target: "canvas", "set_transform {:?}", matrix);
        self.transform.set_transform(matrix);
        self.sync_matrix();
    }

    pub fn reset_transform(&mut self) {
        if self.frame("reset_transform").is_none() {
            return;
        }
        log::debug!(target: "canvas", "reset_transform");
        self.transform.reset_transform();
        self.sync_matrix();
    }

    /// The logical transform, without the view scale.
    pub fn get_transform(&self) -> Matrix {
        self.transform.matrix()
    }
}
