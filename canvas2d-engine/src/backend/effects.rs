//! Pixel effects for the skia backend: gaussian blur, color matrices and
//! sweep gradient rasterization.

use super::ShaderStop;
use crate::filter::{apply_color_matrix, ColorMatrix};
use crate::image::{premultiply, unpremultiply};
use kurbo::{Affine, Point};
use tiny_skia::Pixmap;

/// Normalized gaussian weights in 16.16 fixed point, summing to exactly 1.
fn gaussian_kernel_q16(sigma: f64) -> Vec<u32> {
    let radius = (sigma * 3.0).ceil() as i32;
    if radius <= 0 || !sigma.is_finite() {
        return vec![1 << 16];
    }
    let denom = 2.0 * sigma * sigma;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|i| (-(i * i) as f64 / denom).exp())
        .collect();
    let sum: f64 = weights.iter().sum();

    let mut kernel: Vec<u32> = weights
        .iter()
        .map(|w| ((w / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();
    let total: i64 = kernel.iter().map(|&k| k as i64).sum();
    let mid = kernel.len() / 2;
    kernel[mid] = (kernel[mid] as i64 + 65536 - total).clamp(0, 65536) as u32;
    kernel
}

fn q16_to_u8(acc: u64) -> u8 {
    ((acc + 32768) >> 16).min(255) as u8
}

/// One separable pass along x or y.
fn blur_pass(src: &[u8], dst: &mut [u8], width: usize, height: usize, kernel: &[u32], horizontal: bool) {
    let radius = (kernel.len() / 2) as i64;
    for y in 0..height {
        for x in 0..width {
            let mut acc = [0u64; 4];
            for (ki, &kw) in kernel.iter().enumerate() {
                let d = ki as i64 - radius;
                let idx = if horizontal {
                    let sx = x as i64 + d;
                    if sx < 0 || sx >= width as i64 {
                        continue;
                    }
                    (y * width + sx as usize) * 4
                } else {
                    let sy = y as i64 + d;
                    if sy < 0 || sy >= height as i64 {
                        continue;
                    }
                    (sy as usize * width + x) * 4
                };
                for c in 0..4 {
                    acc[c] += kw as u64 * src[idx + c] as u64;
                }
            }
            let out = (y * width + x) * 4;
            for c in 0..4 {
                dst[out + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

/// Gaussian blur of premultiplied pixels. Pixels outside the pixmap count
/// as transparent.
pub(crate) fn gaussian_blur(pixmap: &mut Pixmap, sigma: f64) {
    let kernel = gaussian_kernel_q16(sigma);
    if kernel.len() == 1 {
        return;
    }
    let (width, height) = (pixmap.width() as usize, pixmap.height() as usize);
    let src = pixmap.data().to_vec();
    let mut tmp = vec![0u8; src.len()];
    blur_pass(&src, &mut tmp, width, height, &kernel, true);
    blur_pass(&tmp, pixmap.data_mut(), width, height, &kernel, false);
}

/// Apply a color matrix to every pixel, working in non-premultiplied space.
pub(crate) fn apply_matrix(pixmap: &mut Pixmap, matrix: &ColorMatrix) {
    for px in pixmap.data_mut().chunks_exact_mut(4) {
        let [r, g, b, a] = unpremultiply([px[0], px[1], px[2], px[3]]);
        let out = apply_color_matrix(
            matrix,
            [
                r as f64 / 255.0,
                g as f64 / 255.0,
                b as f64 / 255.0,
                a as f64 / 255.0,
            ],
        );
        let to_u8 = |v: f64| (v * 255.0).round() as u8;
        px.copy_from_slice(&premultiply([
            to_u8(out[0]),
            to_u8(out[1]),
            to_u8(out[2]),
            to_u8(out[3]),
        ]));
    }
}

/// Replace every pixel's color with `color` (non-premultiplied RGBA),
/// scaling by the pixel's coverage. Used to turn a drawn shape into its
/// shadow.
pub(crate) fn tint_by_alpha(pixmap: &mut Pixmap, color: [u8; 4]) {
    for px in pixmap.data_mut().chunks_exact_mut(4) {
        let coverage = px[3] as u32;
        let a = ((color[3] as u32 * coverage + 127) / 255) as u8;
        px.copy_from_slice(&premultiply([color[0], color[1], color[2], a]));
    }
}

/// Interpolate sorted stops at `t`, returning non-premultiplied RGBA.
fn sample_stops(stops: &[ShaderStop], t: f64) -> [f64; 4] {
    let rgba = |s: &ShaderStop| {
        [
            s.color.r as f64,
            s.color.g as f64,
            s.color.b as f64,
            s.color.a as f64,
        ]
    };
    let Some(first) = stops.first() else {
        return [0.0; 4];
    };
    if t <= first.offset {
        return rgba(first);
    }
    for pair in stops.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if t <= b.offset {
            let span = b.offset - a.offset;
            let f = if span <= 0.0 { 1.0 } else { (t - a.offset) / span };
            let (ca, cb) = (rgba(a), rgba(b));
            return [
                ca[0] + (cb[0] - ca[0]) * f,
                ca[1] + (cb[1] - ca[1]) * f,
                ca[2] + (cb[2] - ca[2]) * f,
                ca[3] + (cb[3] - ca[3]) * f,
            ];
        }
    }
    stops.last().map(rgba).unwrap_or([0.0; 4])
}

/// Parameters for rasterizing an angular gradient.
pub(crate) struct SweepRaster<'a> {
    pub center: Point,
    /// Pre-rotation of the frame, degrees.
    pub rotation: f64,
    pub start_angle: f64,
    pub end_angle: f64,
    pub stops: &'a [ShaderStop],
    pub alpha: f64,
}

/// Rasterize a sweep gradient into a `width`×`height` pixmap whose origin
/// sits at device `(origin_x, origin_y)`. `device_to_user` maps device
/// coordinates into the gradient's space.
pub(crate) fn rasterize_sweep(
    sweep: &SweepRaster<'_>,
    device_to_user: Affine,
    origin_x: i32,
    origin_y: i32,
    width: u32,
    height: u32,
) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(width, height)?;
    let range = (sweep.end_angle - sweep.start_angle).max(f64::EPSILON);
    let alpha = sweep.alpha.clamp(0.0, 1.0);
    let data = pixmap.data_mut();
    for y in 0..height {
        for x in 0..width {
            let device = Point::new(
                (origin_x + x as i32) as f64 + 0.5,
                (origin_y + y as i32) as f64 + 0.5,
            );
            let p = device_to_user * device;
            let angle = (p.y - sweep.center.y)
                .atan2(p.x - sweep.center.x)
                .to_degrees()
                - sweep.rotation;
            let angle = angle.rem_euclid(360.0);
            let t = ((angle - sweep.start_angle) / range).clamp(0.0, 1.0);
            let [r, g, b, a] = sample_stops(sweep.stops, t);
            let idx = ((y * width + x) * 4) as usize;
            data[idx..idx + 4].copy_from_slice(&premultiply([
                r.round() as u8,
                g.round() as u8,
                b.round() as u8,
                (a * alpha).round() as u8,
            ]));
        }
    }
    Some(pixmap)
}
