//! Image drawing and pixel I/O.

use super::Canvas2dEngine;
use crate::backend::{ImagePaint, RenderBackend};
use crate::error::Canvas2dResult;
use crate::geometry::{CanvasImageDataRef, ContentFrame, DirtyRect, ImageData, ImageDrawMode};
use crate::image::{pack_image_data, DecodedImage, ImageSource, RasterImage, SvgPlacement};
use base64::Engine;

impl<B: RenderBackend> Canvas2dEngine<B> {
    fn image_paint(&self) -> ImagePaint {
        ImagePaint {
            alpha: self.paint.global().effective_alpha(),
            composite: self.paint.global().composite,
            sampling: self.paint.sampling(),
            filter: self.paint.filter().cloned(),
        }
    }

    fn draw_decoded(&mut self, image: &DecodedImage, mode: &ImageDrawMode, frame: ContentFrame) {
        let Some(placement) = SvgPlacement::compute(mode, image.width(), image.height()) else {
            log::debug!(target: "canvas", "empty image placement, skipped");
            return;
        };
        let placement = placement.offset(frame.offset_x, frame.offset_y);
        let paint = self.image_paint();
        match image {
            DecodedImage::Raster(raster) => {
                self.backend
                    .draw_image(raster, placement.src, placement.dst, &paint);
            }
            DecodedImage::Svg(svg) => {
                self.backend
                    .draw_svg(svg, placement.dst, &placement.matrix(), &paint);
            }
        }
    }

    /// Draw an image through the decode cache, decoding synchronously on a
    /// miss. Decode failures skip the draw.
    pub fn draw_image(&mut self, source: &ImageSource, mode: &ImageDrawMode) {
        let Some(frame) = self.frame("draw_image") else {
            return;
        };
        log::debug!(target: "canvas", "draw_image {} {:?}", source, mode);
        let Some(image) = self.images.get_image(source) else {
            return;
        };
        self.draw_decoded(&image, mode, frame);
    }

    /// Draw a vector image, loading it asynchronously when not cached.
    ///
    /// While the load is in flight nothing is drawn; the host re-issues the
    /// draw from the load-success callback.
    pub fn draw_svg_image(&mut self, source: &ImageSource, mode: &ImageDrawMode) {
        let Some(frame) = self.frame("draw_svg_image") else {
            return;
        };
        log::debug!(target: "canvas", "draw_svg_image {} {:?}", source, mode);
        match self.images.request_image(source) {
            Some(image) => self.draw_decoded(&image, mode, frame),
            None => log::debug!(target: "canvas", "image {} pending", source),
        }
    }

    /// Draw caller-owned pixels.
    pub fn draw_pixel_map(&mut self, pixel_map: &RasterImage, mode: &ImageDrawMode) {
        let Some(frame) = self.frame("draw_pixel_map") else {
            return;
        };
        log::debug!(
            target: "canvas",
            "draw_pixel_map {}x{} {:?}",
            pixel_map.width(),
            pixel_map.height(),
            mode
        );
        let Some(placement) = SvgPlacement::compute(
            mode,
            pixel_map.width() as f64,
            pixel_map.height() as f64,
        ) else {
            return;
        };
        let placement = placement.offset(frame.offset_x, frame.offset_y);
        let paint = self.image_paint();
        self.backend
            .draw_image(pixel_map, placement.src, placement.dst, &paint);
    }

    /// Release a decoded image. Returns whether it was cached.
    pub fn close_image_bitmap(&mut self, source: &ImageSource) -> bool {
        log::debug!(target: "canvas", "close_image_bitmap {}", source);
        self.images.evict(source)
    }

    /// Transparent black image data.
    pub fn create_image_data(&self, width: u32, height: u32) -> ImageData {
        ImageData::new(width, height)
    }

    /// Read non-premultiplied RGBA pixels at `(x, y)` relative to the content
    /// origin. Returns `None` for an empty region or a missing host.
    pub fn get_image_data(&self, x: i32, y: i32, width: u32, height: u32) -> Option<ImageData> {
        let frame = self.frame("get_image_data")?;
        log::debug!(target: "canvas", "get_image_data {} {} {} {}", x, y, width, height);
        if width == 0 || height == 0 {
            return None;
        }
        let (ox, oy) = frame_origin(&frame);
        Some(
            self.backend
                .read_pixels(x.saturating_add(ox), y.saturating_add(oy), width, height),
        )
    }

    /// Overwrite pixels at `(dx, dy)` relative to the content origin.
    pub fn put_image_data(&mut self, image: &CanvasImageDataRef<'_>, dx: i32, dy: i32) {
        self.put_pixels("put_image_data", image, dx, dy, None);
    }

    /// Overwrite only the dirty rectangle of `image` (clamped to the data).
    pub fn put_image_data_dirty(
        &mut self,
        image: &CanvasImageDataRef<'_>,
        dx: i32,
        dy: i32,
        dirty: &DirtyRect,
    ) {
        self.put_pixels("put_image_data_dirty", image, dx, dy, Some(dirty));
    }

    fn put_pixels(
        &mut self,
        op: &str,
        image: &CanvasImageDataRef<'_>,
        dx: i32,
        dy: i32,
        dirty: Option<&DirtyRect>,
    ) {
        let Some(frame) = self.frame(op) else {
            return;
        };
        log::debug!(target: "canvas", "{} {}x{} at {} {}", op, image.width, image.height, dx, dy);
        let Some((bitmap, x0, y0)) = pack_image_data(image, dirty) else {
            log::debug!(target: "canvas", "{}: no pixels to write", op);
            return;
        };
        let (ox, oy) = frame_origin(&frame);
        self.backend.write_pixels(
            &bitmap,
            dx.saturating_add(x0).saturating_add(ox),
            dy.saturating_add(y0).saturating_add(oy),
        );
    }

    /// Encode the surface as PNG, optionally tagging its resolution.
    pub fn to_png(&self, ppi: Option<f64>) -> Canvas2dResult<Vec<u8>> {
        log::debug!(target: "canvas", "to_png");
        self.backend.encode_png(ppi)
    }

    /// Encode the surface as a `data:` URL. Only PNG is produced; other
    /// MIME types fall back to it and `quality` is ignored.
    pub fn to_data_url(&self, mime: &str, quality: Option<f64>) -> Canvas2dResult<String> {
        log::debug!(target: "canvas", "to_data_url {} {:?}", mime, quality);
        if mime != "image/png" {
            log::debug!(target: "canvas", "{} not supported, encoding PNG", mime);
        }
        let png = self.backend.encode_png(None)?;
        Ok(format!(
            "data:image/png;base64,{}",
            base64::prelude::BASE64_STANDARD.encode(png)
        ))
    }
}

/// Whole-pixel content origin. Frames are finite here; huge offsets clamp to
/// the `i32` range.
fn frame_origin(frame: &ContentFrame) -> (i32, i32) {
    (frame.offset_x.round() as i32, frame.offset_y.round() as i32)
}
