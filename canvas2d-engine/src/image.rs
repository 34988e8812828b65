//! Image pipeline: image sources, decoded rasters and vector images, the
//! decode provider seam, a bounded decode cache and asynchronous load
//! tracking.
//!
//! Decoding itself belongs to an [`ImageProvider`]. The pipeline only
//! caches what providers return and correlates asynchronous completions to
//! the source that is currently loading; a completion for any other source
//! is discarded.

use crate::error::{Canvas2dError, Canvas2dResult};
use crate::geometry::{CanvasImageDataRef, DirtyRect, ImageDrawMode};
use crate::matrix::Matrix;
use base64::Engine;
use lru::LruCache;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

/// Default number of decoded images kept per engine.
pub const DEFAULT_IMAGE_CACHE_CAPACITY: usize = 30;

/// Maximum raster dimension accepted from decoders.
const MAX_IMAGE_DIMENSION: u32 = 32767;

/// Identifier of an image: a file path, a `data:` URL or any key a custom
/// provider understands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageSource(String);

impl ImageSource {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ImageSource {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ImageSource {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Premultiply one non-premultiplied RGBA pixel.
pub fn premultiply(px: [u8; 4]) -> [u8; 4] {
    let [r, g, b, a] = px;
    match a {
        255 => px,
        0 => [0, 0, 0, 0],
        _ => {
            let a16 = a as u16;
            [
                ((r as u16 * a16 + 127) / 255) as u8,
                ((g as u16 * a16 + 127) / 255) as u8,
                ((b as u16 * a16 + 127) / 255) as u8,
                a,
            ]
        }
    }
}

/// Convert one premultiplied RGBA pixel back to straight alpha.
pub fn unpremultiply(px: [u8; 4]) -> [u8; 4] {
    let [r, g, b, a] = px;
    match a {
        255 => px,
        0 => [0, 0, 0, 0],
        _ => {
            let alpha = a as f32 / 255.0;
            [
                (r as f32 / alpha).min(255.0) as u8,
                (g as f32 / alpha).min(255.0) as u8,
                (b as f32 / alpha).min(255.0) as u8,
                a,
            ]
        }
    }
}

/// A decoded raster in premultiplied RGBA8, the fixed pixel format shared by
/// the engine and its backend.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

fn check_raster_size(len: usize, width: u32, height: u32) -> Canvas2dResult<()> {
    if width == 0 || height == 0 || width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
        return Err(Canvas2dError::InvalidDimensions { width, height });
    }
    let expected = width as usize * height as usize * 4;
    if len != expected {
        return Err(Canvas2dError::InvalidArgument(format!(
            "Data length {len} does not match expected {expected} for {width}x{height} RGBA image"
        )));
    }
    Ok(())
}

impl RasterImage {
    /// Build from non-premultiplied RGBA pixels.
    pub fn from_rgba(data: &[u8], width: u32, height: u32) -> Canvas2dResult<Self> {
        check_raster_size(data.len(), width, height)?;
        let data = data
            .chunks_exact(4)
            .flat_map(|px| premultiply([px[0], px[1], px[2], px[3]]))
            .collect();
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build from pixels that are already premultiplied.
    pub fn from_premultiplied(data: Vec<u8>, width: u32, height: u32) -> Canvas2dResult<Self> {
        check_raster_size(data.len(), width, height)?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Premultiplied RGBA bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Non-premultiplied RGBA bytes.
    pub fn to_rgba(&self) -> Vec<u8> {
        self.data
            .chunks_exact(4)
            .flat_map(|px| unpremultiply([px[0], px[1], px[2], px[3]]))
            .collect()
    }
}

/// A parsed vector image.
pub struct SvgImage {
    tree: usvg::Tree,
}

impl fmt::Debug for SvgImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SvgImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

impl SvgImage {
    pub fn from_data(source: &ImageSource, bytes: &[u8]) -> Canvas2dResult<Self> {
        let tree = usvg::Tree::from_data(bytes, &usvg::Options::default()).map_err(|e| {
            Canvas2dError::ImageDecodeError {
                source_id: source.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self { tree })
    }

    pub fn tree(&self) -> &usvg::Tree {
        &self.tree
    }

    pub fn width(&self) -> f64 {
        self.tree.size().width() as f64
    }

    pub fn height(&self) -> f64 {
        self.tree.size().height() as f64
    }

    /// Render at natural size, rounded up to whole pixels.
    pub fn rasterize(&self) -> Option<RasterImage> {
        let size = self.tree.size().to_int_size();
        let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height())?;
        resvg::render(&self.tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());
        RasterImage::from_premultiplied(pixmap.take(), size.width(), size.height()).ok()
    }
}

/// What a provider hands back for a source.
#[derive(Debug, Clone)]
pub enum DecodedImage {
    Raster(Rc<RasterImage>),
    Svg(Rc<SvgImage>),
}

impl DecodedImage {
    pub fn width(&self) -> f64 {
        match self {
            DecodedImage::Raster(r) => r.width() as f64,
            DecodedImage::Svg(s) => s.width(),
        }
    }

    pub fn height(&self) -> f64 {
        match self {
            DecodedImage::Raster(r) => r.height() as f64,
            DecodedImage::Svg(s) => s.height(),
        }
    }

    /// The pixels of this image; vector images are rendered at natural size.
    pub fn to_raster(&self) -> Option<Rc<RasterImage>> {
        match self {
            DecodedImage::Raster(r) => Some(Rc::clone(r)),
            DecodedImage::Svg(s) => s.rasterize().map(Rc::new),
        }
    }
}

/// Completion callback for asynchronous image requests.
pub type ImageCallback = Box<dyn FnOnce(Canvas2dResult<DecodedImage>)>;

/// Decodes image sources on behalf of the engine.
pub trait ImageProvider {
    /// Decode synchronously.
    fn decode(&self, source: &ImageSource) -> Canvas2dResult<DecodedImage>;

    /// Decode asynchronously. The callback may run later or before this
    /// call returns; the default runs [`ImageProvider::decode`] inline.
    fn request(&self, source: &ImageSource, on_complete: ImageCallback) {
        on_complete(self.decode(source));
    }
}

/// Decode PNG bytes into a premultiplied raster.
pub fn decode_png(source: &ImageSource, bytes: &[u8]) -> Canvas2dResult<RasterImage> {
    let decode_err = |reason: String| Canvas2dError::ImageDecodeError {
        source_id: source.to_string(),
        reason,
    };

    let mut decoder = png::Decoder::new(bytes);
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info().map_err(|e| decode_err(e.to_string()))?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| decode_err(e.to_string()))?;
    let buf = &buf[..info.buffer_size()];

    let rgba: Vec<u8> = match info.color_type {
        png::ColorType::Rgba => buf.to_vec(),
        png::ColorType::Rgb => buf
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        png::ColorType::GrayscaleAlpha => buf
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[0], p[0], p[1]])
            .collect(),
        png::ColorType::Grayscale => buf.iter().flat_map(|&g| [g, g, g, 255]).collect(),
        png::ColorType::Indexed => {
            return Err(decode_err("unexpanded indexed color".to_string()));
        }
    };
    RasterImage::from_rgba(&rgba, info.width, info.height)
}

/// Decode PNG or SVG bytes, sniffing the format from the content.
pub fn decode_image_bytes(source: &ImageSource, bytes: &[u8]) -> Canvas2dResult<DecodedImage> {
    const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
    if bytes.starts_with(PNG_SIGNATURE) {
        return Ok(DecodedImage::Raster(Rc::new(decode_png(source, bytes)?)));
    }
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]);
    if head.contains("<svg") || head.trim_start().starts_with("<?xml") {
        return Ok(DecodedImage::Svg(Rc::new(SvgImage::from_data(
            source, bytes,
        )?)));
    }
    Err(Canvas2dError::ImageDecodeError {
        source_id: source.to_string(),
        reason: "unsupported image format".to_string(),
    })
}

/// Extract the payload of a `data:` URL.
pub fn decode_data_url(url: &str) -> Canvas2dResult<Vec<u8>> {
    let invalid = |reason: &str| Canvas2dError::InvalidArgument(format!("{reason}: {url}"));
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| invalid("not a data URL"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| invalid("data URL without payload"))?;
    if meta.ends_with(";base64") {
        base64::prelude::BASE64_STANDARD
            .decode(payload.trim())
            .map_err(|e| invalid(&format!("invalid base64 ({e})")))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

/// Provider that reads files (relative to an optional base directory) and
/// `data:` URLs, decoding PNG and SVG content.
#[derive(Debug, Clone, Default)]
pub struct FileImageProvider {
    base_dir: Option<PathBuf>,
}

impl FileImageProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, id: &str) -> PathBuf {
        let path = Path::new(id);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ImageProvider for FileImageProvider {
    fn decode(&self, source: &ImageSource) -> Canvas2dResult<DecodedImage> {
        let bytes = if source.as_str().starts_with("data:") {
            decode_data_url(source.as_str())?
        } else {
            let path = self.resolve(source.as_str());
            std::fs::read(&path).map_err(|e| {
                log::warn!("failed to read image {}: {}", path.display(), e);
                Canvas2dError::ImageNotFound(source.to_string())
            })?
        };
        decode_image_bytes(source, &bytes)
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Current number of cached images.
    pub count: usize,
}

/// Fixed-capacity LRU cache of decoded images, keyed by source.
pub struct ImageCache {
    cache: LruCache<ImageSource, DecodedImage>,
    stats: CacheStats,
}

impl ImageCache {
    /// Create a cache holding at most `capacity` images (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            stats: CacheStats::default(),
        }
    }

    /// Look up a source, refreshing its recency and recording a hit or miss.
    pub fn get(&mut self, source: &ImageSource) -> Option<DecodedImage> {
        match self.cache.get(source) {
            Some(image) => {
                self.stats.hits += 1;
                Some(image.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, source: ImageSource, image: DecodedImage) {
        self.cache.put(source, image);
        self.stats.count = self.cache.len();
    }

    pub fn remove(&mut self, source: &ImageSource) -> Option<DecodedImage> {
        let removed = self.cache.pop(source);
        self.stats.count = self.cache.len();
        removed
    }

    pub fn contains(&self, source: &ImageSource) -> bool {
        self.cache.contains(source)
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        self.stats.count = 0;
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }
}

pub type LoadSuccessCallback = Rc<dyn Fn(&ImageSource)>;
pub type LoadFailureCallback = Rc<dyn Fn(&ImageSource, &Canvas2dError)>;

struct PipelineState {
    cache: ImageCache,
    /// Source of the most recent asynchronous request.
    loading_source: Option<ImageSource>,
    /// Source of the most recent accepted completion.
    current_source: Option<ImageSource>,
    outstanding: HashSet<ImageSource>,
    on_success: Option<LoadSuccessCallback>,
    on_failure: Option<LoadFailureCallback>,
}

impl PipelineState {
    /// Record a completion. Returns the callback to fire, if the completion
    /// is still wanted.
    fn complete(
        &mut self,
        source: &ImageSource,
        result: &Canvas2dResult<DecodedImage>,
    ) -> Option<Completion> {
        self.outstanding.remove(source);
        if self.loading_source.as_ref() != Some(source) {
            log::debug!(target: "canvas", "discarding stale image completion for {}", source);
            return None;
        }
        self.loading_source = None;
        match result {
            Ok(image) => {
                self.cache.insert(source.clone(), image.clone());
                self.current_source = Some(source.clone());
                self.on_success.clone().map(Completion::Success)
            }
            Err(_) => self.on_failure.clone().map(Completion::Failure),
        }
    }
}

enum Completion {
    Success(LoadSuccessCallback),
    Failure(LoadFailureCallback),
}

/// Decode cache plus asynchronous load tracking for one engine instance.
pub struct ImagePipeline {
    provider: Rc<dyn ImageProvider>,
    state: Rc<RefCell<PipelineState>>,
}

impl ImagePipeline {
    pub fn new(provider: Rc<dyn ImageProvider>, cache_capacity: usize) -> Self {
        Self {
            provider,
            state: Rc::new(RefCell::new(PipelineState {
                cache: ImageCache::new(cache_capacity),
                loading_source: None,
                current_source: None,
                outstanding: HashSet::new(),
                on_success: None,
                on_failure: None,
            })),
        }
    }

    /// Register the callback fired when an asynchronous load completes for
    /// the source that is still loading.
    pub fn set_on_load_success(&self, callback: impl Fn(&ImageSource) + 'static) {
        self.state.borrow_mut().on_success = Some(Rc::new(callback));
    }

    /// Register the callback fired when a load for the current source fails.
    pub fn set_on_load_failure(&self, callback: impl Fn(&ImageSource, &Canvas2dError) + 'static) {
        self.state.borrow_mut().on_failure = Some(Rc::new(callback));
    }

    /// Cache lookup, falling back to a synchronous decode whose result is
    /// cached. Decode failures fire the failure callback and yield `None`.
    pub fn get_image(&self, source: &ImageSource) -> Option<DecodedImage> {
        if let Some(image) = self.state.borrow_mut().cache.get(source) {
            return Some(image);
        }
        match self.provider.decode(source) {
            Ok(image) => {
                self.state
                    .borrow_mut()
                    .cache
                    .insert(source.clone(), image.clone());
                Some(image)
            }
            Err(err) => {
                log::warn!("failed to decode image {}: {}", source, err);
                let on_failure = self.state.borrow().on_failure.clone();
                if let Some(callback) = on_failure {
                    callback(source, &err);
                }
                None
            }
        }
    }

    /// Return the cached image for `source`, or mark it loading and issue an
    /// asynchronous request unless one is already outstanding.
    pub fn request_image(&self, source: &ImageSource) -> Option<DecodedImage> {
        let issue = {
            let mut state = self.state.borrow_mut();
            if let Some(image) = state.cache.get(source) {
                state.current_source = Some(source.clone());
                return Some(image);
            }
            state.loading_source = Some(source.clone());
            state.outstanding.insert(source.clone())
        };
        if !issue {
            log::debug!(target: "canvas", "image request for {} already outstanding", source);
            return None;
        }

        log::debug!(target: "canvas", "requesting image {}", source);
        let weak: Weak<RefCell<PipelineState>> = Rc::downgrade(&self.state);
        let completed = source.clone();
        self.provider.request(
            source,
            Box::new(move |result| {
                let Some(state) = weak.upgrade() else {
                    return;
                };
                let completion = state.borrow_mut().complete(&completed, &result);
                match (completion, result) {
                    (Some(Completion::Success(callback)), Ok(_)) => callback(&completed),
                    (Some(Completion::Failure(callback)), Err(err)) => {
                        log::warn!("failed to load image {}: {}", completed, err);
                        callback(&completed, &err)
                    }
                    (None, Err(err)) => {
                        log::warn!("failed to load image {}: {}", completed, err);
                    }
                    _ => {}
                }
            }),
        );
        None
    }

    pub fn loading_source(&self) -> Option<ImageSource> {
        self.state.borrow().loading_source.clone()
    }

    pub fn current_source(&self) -> Option<ImageSource> {
        self.state.borrow().current_source.clone()
    }

    pub fn is_outstanding(&self, source: &ImageSource) -> bool {
        self.state.borrow().outstanding.contains(source)
    }

    /// Drop a source from the cache.
    pub fn evict(&self, source: &ImageSource) -> bool {
        self.state.borrow_mut().cache.remove(source).is_some()
    }

    pub fn is_cached(&self, source: &ImageSource) -> bool {
        self.state.borrow().cache.contains(source)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.state.borrow().cache.stats()
    }

    pub fn cache_capacity(&self) -> usize {
        self.state.borrow().cache.capacity()
    }

    /// Clear the cache and forget any in-flight load.
    pub fn reset(&self) {
        let mut state = self.state.borrow_mut();
        state.cache.clear();
        state.loading_source = None;
        state.current_source = None;
    }
}

/// Source and destination rectangles for drawing a vector image, with the
/// scale mapping one onto the other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvgPlacement {
    pub src: kurbo::Rect,
    pub dst: kurbo::Rect,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl SvgPlacement {
    /// Derive the placement for an image of `width`×`height`. Returns `None`
    /// for an empty source or destination.
    pub fn compute(mode: &ImageDrawMode, width: f64, height: f64) -> Option<Self> {
        let whole = kurbo::Rect::new(0.0, 0.0, width, height);
        let (src, dst) = match *mode {
            ImageDrawMode::At { dx, dy } => (whole, whole + kurbo::Vec2::new(dx, dy)),
            ImageDrawMode::Scaled(r) => (
                whole,
                kurbo::Rect::new(r.x, r.y, r.x + r.width, r.y + r.height),
            ),
            ImageDrawMode::Cropped(c) => (
                kurbo::Rect::new(c.sx, c.sy, c.sx + c.sw, c.sy + c.sh),
                kurbo::Rect::new(c.dx, c.dy, c.dx + c.dw, c.dy + c.dh),
            ),
        };
        if src.width() <= 0.0 || src.height() <= 0.0 || dst.width() <= 0.0 || dst.height() <= 0.0
        {
            return None;
        }
        Some(Self {
            src,
            dst,
            scale_x: dst.width() / src.width(),
            scale_y: dst.height() / src.height(),
        })
    }

    /// Matrix mapping image space onto the destination rectangle.
    pub fn matrix(&self) -> Matrix {
        Matrix::translation(
            self.dst.x0 - self.src.x0 * self.scale_x,
            self.dst.y0 - self.src.y0 * self.scale_y,
        )
        .pre_concat(&Matrix::scaling(self.scale_x, self.scale_y))
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self {
            dst: self.dst + kurbo::Vec2::new(dx, dy),
            ..*self
        }
    }
}

/// Pack caller image data into the backend bitmap format, restricted to the
/// dirty rectangle (clamped to the data). Returns the bitmap and the dirty
/// rectangle's origin within the source, or `None` when there is nothing to
/// write.
pub fn pack_image_data(
    image: &CanvasImageDataRef<'_>,
    dirty: Option<&DirtyRect>,
) -> Option<(RasterImage, i32, i32)> {
    let (width, height) = (image.width as i32, image.height as i32);
    if image.data.is_empty()
        || width <= 0
        || height <= 0
        || image.data.len() != image.width as usize * image.height as usize * 4
    {
        return None;
    }
    let dirty = dirty.copied().unwrap_or(DirtyRect {
        x: 0,
        y: 0,
        width,
        height,
    });
    // Negative dirty sizes extend to the left/up, as in the canvas API.
    let (mut x, mut y, mut w, mut h) = (dirty.x, dirty.y, dirty.width, dirty.height);
    if w < 0 {
        x = x.saturating_add(w);
        w = w.saturating_neg();
    }
    if h < 0 {
        y = y.saturating_add(h);
        h = h.saturating_neg();
    }
    let x0 = x.clamp(0, width);
    let y0 = y.clamp(0, height);
    let x1 = x.saturating_add(w).clamp(0, width);
    let y1 = y.saturating_add(h).clamp(0, height);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    let row_bytes = (x1 - x0) as usize * 4;
    let mut rgba = Vec::with_capacity(row_bytes * (y1 - y0) as usize);
    for row in y0..y1 {
        let start = (row as usize * image.width as usize + x0 as usize) * 4;
        rgba.extend_from_slice(&image.data[start..start + row_bytes]);
    }
    let raster = RasterImage::from_rgba(&rgba, (x1 - x0) as u32, (y1 - y0) as u32).ok()?;
    Some((raster, x0, y0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ImageCropParams, RectParams};
    use std::cell::Cell;

    fn raster(w: u32, h: u32) -> DecodedImage {
        DecodedImage::Raster(Rc::new(
            RasterImage::from_rgba(&vec![255; (w * h * 4) as usize], w, h).unwrap(),
        ))
    }

    /// Provider that counts requests and holds callbacks until released.
    #[derive(Default)]
    struct DeferredProvider {
        requests: Cell<usize>,
        pending: RefCell<Vec<(ImageSource, ImageCallback)>>,
    }

    impl ImageProvider for DeferredProvider {
        fn decode(&self, _source: &ImageSource) -> Canvas2dResult<DecodedImage> {
            Ok(raster(2, 2))
        }

        fn request(&self, source: &ImageSource, on_complete: ImageCallback) {
            self.requests.set(self.requests.get() + 1);
            self.pending
                .borrow_mut()
                .push((source.clone(), on_complete));
        }
    }

    impl DeferredProvider {
        fn release(&self, source: &str, result: Canvas2dResult<DecodedImage>) {
            let index = self
                .pending
                .borrow()
                .iter()
                .position(|(s, _)| s.as_str() == source)
                .unwrap();
            let (_, callback) = self.pending.borrow_mut().remove(index);
            callback(result);
        }
    }

    #[test]
    fn test_premultiply_round_trip() {
        assert_eq!(premultiply([255, 0, 0, 128]), [128, 0, 0, 128]);
        assert_eq!(premultiply([10, 20, 30, 0]), [0, 0, 0, 0]);
        let back = unpremultiply(premultiply([200, 100, 50, 200]));
        for (a, b) in back.iter().zip([200u8, 100, 50, 200].iter()) {
            assert!((*a as i32 - *b as i32).abs() <= 1);
        }
    }

    #[test]
    fn test_cache_is_bounded_lru() {
        let mut cache = ImageCache::new(2);
        cache.insert("a".into(), raster(1, 1));
        cache.insert("b".into(), raster(1, 1));
        assert!(cache.get(&"a".into()).is_some());
        cache.insert("c".into(), raster(1, 1));
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&"a".into()));
        assert!(!cache.contains(&"b".into()));
        assert!(cache.get(&"b".into()).is_none());
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.count), (1, 1, 2));
    }

    #[test]
    fn test_zero_capacity_is_promoted() {
        assert_eq!(ImageCache::new(0).capacity(), 1);
    }

    #[test]
    fn test_duplicate_request_is_not_reissued() {
        let provider = Rc::new(DeferredProvider::default());
        let pipeline = ImagePipeline::new(provider.clone(), 4);
        assert!(pipeline.request_image(&"logo.svg".into()).is_none());
        assert!(pipeline.request_image(&"logo.svg".into()).is_none());
        assert_eq!(provider.requests.get(), 1);
        assert!(pipeline.is_outstanding(&"logo.svg".into()));
    }

    #[test]
    fn test_completion_fires_success_and_caches() {
        let provider = Rc::new(DeferredProvider::default());
        let pipeline = ImagePipeline::new(provider.clone(), 4);
        let loaded = Rc::new(RefCell::new(Vec::new()));
        let sink = loaded.clone();
        pipeline.set_on_load_success(move |s| sink.borrow_mut().push(s.to_string()));

        pipeline.request_image(&"a.png".into());
        assert_eq!(pipeline.loading_source(), Some("a.png".into()));
        provider.release("a.png", Ok(raster(3, 3)));

        assert_eq!(*loaded.borrow(), vec!["a.png".to_string()]);
        assert_eq!(pipeline.current_source(), Some("a.png".into()));
        assert_eq!(pipeline.loading_source(), None);
        assert!(pipeline.request_image(&"a.png".into()).is_some());
        assert_eq!(provider.requests.get(), 1);
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let provider = Rc::new(DeferredProvider::default());
        let pipeline = ImagePipeline::new(provider.clone(), 4);
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        pipeline.set_on_load_success(move |_| counter.set(counter.get() + 1));

        pipeline.request_image(&"first.svg".into());
        pipeline.request_image(&"second.svg".into());
        provider.release("first.svg", Ok(raster(1, 1)));

        assert_eq!(fired.get(), 0);
        assert_eq!(pipeline.current_source(), None);
        assert_eq!(pipeline.loading_source(), Some("second.svg".into()));
        assert!(!pipeline.is_cached(&"first.svg".into()));

        provider.release("second.svg", Ok(raster(1, 1)));
        assert_eq!(fired.get(), 1);
        assert_eq!(pipeline.current_source(), Some("second.svg".into()));
    }

    #[test]
    fn test_failure_callback_fires_for_current_source() {
        let provider = Rc::new(DeferredProvider::default());
        let pipeline = ImagePipeline::new(provider.clone(), 4);
        let failed = Rc::new(Cell::new(false));
        let flag = failed.clone();
        pipeline.set_on_load_failure(move |_, _| flag.set(true));

        pipeline.request_image(&"broken.png".into());
        provider.release(
            "broken.png",
            Err(Canvas2dError::ImageNotFound("broken.png".to_string())),
        );
        assert!(failed.get());
        assert!(!pipeline.is_outstanding(&"broken.png".into()));
    }

    #[test]
    fn test_inline_provider_completes_during_request() {
        let pipeline = ImagePipeline::new(Rc::new(DeferredProviderInline), 4);
        assert!(pipeline.request_image(&"x".into()).is_none());
        assert!(pipeline.is_cached(&"x".into()));
        assert_eq!(pipeline.current_source(), Some("x".into()));
    }

    struct DeferredProviderInline;

    impl ImageProvider for DeferredProviderInline {
        fn decode(&self, _source: &ImageSource) -> Canvas2dResult<DecodedImage> {
            Ok(raster(1, 1))
        }
    }

    #[test]
    fn test_svg_placement_modes() {
        let at = SvgPlacement::compute(&ImageDrawMode::At { dx: 5.0, dy: 6.0 }, 10.0, 20.0)
            .unwrap();
        assert_eq!((at.scale_x, at.scale_y), (1.0, 1.0));
        assert_eq!(at.dst, kurbo::Rect::new(5.0, 6.0, 15.0, 26.0));

        let scaled = SvgPlacement::compute(
            &ImageDrawMode::Scaled(RectParams::new(0.0, 0.0, 20.0, 10.0)),
            10.0,
            20.0,
        )
        .unwrap();
        assert_eq!((scaled.scale_x, scaled.scale_y), (2.0, 0.5));

        let cropped = SvgPlacement::compute(
            &ImageDrawMode::Cropped(ImageCropParams {
                sx: 5.0,
                sy: 5.0,
                sw: 5.0,
                sh: 5.0,
                dx: 100.0,
                dy: 100.0,
                dw: 20.0,
                dh: 10.0,
            }),
            10.0,
            20.0,
        )
        .unwrap();
        assert_eq!((cropped.scale_x, cropped.scale_y), (4.0, 2.0));
        assert_eq!(cropped.matrix().map_point(5.0, 5.0), (100.0, 100.0));
        assert_eq!(cropped.matrix().map_point(10.0, 10.0), (120.0, 110.0));
    }

    #[test]
    fn test_svg_placement_rejects_empty_rects() {
        assert!(SvgPlacement::compute(
            &ImageDrawMode::Scaled(RectParams::new(0.0, 0.0, 0.0, 10.0)),
            10.0,
            10.0
        )
        .is_none());
    }

    #[test]
    fn test_pack_image_data_dirty_rect() {
        let data: Vec<u8> = (0..16).flat_map(|i| [i as u8, 0, 0, 255]).collect();
        let image = CanvasImageDataRef {
            data: &data,
            width: 4,
            height: 4,
        };
        let (bitmap, x, y) = pack_image_data(
            &image,
            Some(&DirtyRect {
                x: 1,
                y: 2,
                width: 10,
                height: 1,
            }),
        )
        .unwrap();
        assert_eq!((x, y), (1, 2));
        assert_eq!((bitmap.width(), bitmap.height()), (3, 1));
        assert_eq!(bitmap.data()[0], 9);
    }

    #[test]
    fn test_pack_image_data_rejects_empty() {
        let image = CanvasImageDataRef {
            data: &[],
            width: 0,
            height: 0,
        };
        assert!(pack_image_data(&image, None).is_none());
    }

    #[test]
    fn test_data_url_decoding() {
        assert_eq!(decode_data_url("data:text/plain;base64,aGk=").unwrap(), b"hi");
        assert_eq!(decode_data_url("data:,plain").unwrap(), b"plain");
        assert!(decode_data_url("file.png").is_err());
    }

    #[test]
    fn test_svg_bytes_decode() {
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="30"></svg>"#;
        let decoded = decode_image_bytes(&"inline".into(), svg).unwrap();
        assert!(matches!(decoded, DecodedImage::Svg(_)));
        assert_eq!((decoded.width(), decoded.height()), (40.0, 30.0));
    }

    #[test]
    fn test_unknown_bytes_are_rejected() {
        assert!(matches!(
            decode_image_bytes(&"junk".into(), b"GIF89a"),
            Err(Canvas2dError::ImageDecodeError { .. })
        ));
    }
}
