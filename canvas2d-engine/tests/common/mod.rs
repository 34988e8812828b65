//! Shared fixtures: a backend that records calls, a deterministic text
//! shaper and an image provider whose completions are released by hand.

#![allow(dead_code)]

use canvas2d_engine::backend::{Bitmap, ImagePaint, Paint, RenderBackend, ShadowSpec};
use canvas2d_engine::image::{ImageCallback, ImageProvider};
use canvas2d_engine::text::{Paragraph, ShapedParagraph, TextShaper};
use canvas2d_engine::{
    Canvas2dEngine, Canvas2dError, Canvas2dResult, CanvasPath, CompositeOperation, DecodedImage,
    EngineConfig, ImageData, ImageSource, Matrix, RasterImage, SvgImage, TextStyle,
};
use kurbo::Rect;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One backend call, in the order it was issued.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Save,
    Restore,
    SaveLayer(Rect, CompositeOperation),
    SetMatrix(Matrix),
    Concat(Matrix),
    ClipPath(CanvasPath),
    DrawPath(CanvasPath, Paint),
    DrawShadow(CanvasPath, ShadowSpec),
    ClearRect(Rect),
    DrawImage { src: Rect, dst: Rect, paint: ImagePaint },
    DrawSvg { clip: Rect, matrix: Matrix },
    WritePixels { x: i32, y: i32, width: u32, height: u32 },
    Reset,
}

pub struct RecordingBackend {
    width: u32,
    height: u32,
    matrix: Matrix,
    matrices: Vec<Matrix>,
    pub calls: Vec<Call>,
}

impl RecordingBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            matrix: Matrix::identity(),
            matrices: Vec::new(),
            calls: Vec::new(),
        }
    }

    /// Calls other than matrix updates.
    pub fn draw_calls(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|c| !matches!(c, Call::SetMatrix(_)))
            .collect()
    }

    pub fn paths_drawn(&self) -> Vec<(&CanvasPath, &Paint)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::DrawPath(path, paint) => Some((path, paint)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl RenderBackend for RecordingBackend {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn save(&mut self) {
        self.matrices.push(self.matrix);
        self.calls.push(Call::Save);
    }

    fn restore(&mut self) {
        if let Some(m) = self.matrices.pop() {
            self.matrix = m;
        }
        self.calls.push(Call::Restore);
    }

    fn save_layer(&mut self, bounds: Rect, composite: CompositeOperation) {
        self.matrices.push(self.matrix);
        self.calls.push(Call::SaveLayer(bounds, composite));
    }

    fn concat(&mut self, matrix: &Matrix) {
        self.matrix = self.matrix.pre_concat(matrix);
        self.calls.push(Call::Concat(*matrix));
    }

    fn set_matrix(&mut self, matrix: &Matrix) {
        self.matrix = *matrix;
        self.calls.push(Call::SetMatrix(*matrix));
    }

    fn matrix(&self) -> Matrix {
        self.matrix
    }

    fn clip_path(&mut self, path: &CanvasPath) {
        self.calls.push(Call::ClipPath(path.clone()));
    }

    fn draw_path(&mut self, path: &CanvasPath, paint: &Paint) {
        self.calls.push(Call::DrawPath(path.clone(), paint.clone()));
    }

    fn draw_shadow(&mut self, path: &CanvasPath, _paint: &Paint, shadow: &ShadowSpec) {
        self.calls.push(Call::DrawShadow(path.clone(), *shadow));
    }

    fn clear_rect(&mut self, rect: Rect) {
        self.calls.push(Call::ClearRect(rect));
    }

    fn draw_image(&mut self, _image: &RasterImage, src: Rect, dst: Rect, paint: &ImagePaint) {
        self.calls.push(Call::DrawImage {
            src,
            dst,
            paint: paint.clone(),
        });
    }

    fn draw_svg(&mut self, _image: &SvgImage, clip: Rect, matrix: &Matrix, _paint: &ImagePaint) {
        self.calls.push(Call::DrawSvg {
            clip,
            matrix: *matrix,
        });
    }

    fn write_pixels(&mut self, bitmap: &Bitmap, x: i32, y: i32) {
        self.calls.push(Call::WritePixels {
            x,
            y,
            width: bitmap.width(),
            height: bitmap.height(),
        });
    }

    fn read_pixels(&self, _x: i32, _y: i32, width: u32, height: u32) -> ImageData {
        ImageData::new(width, height)
    }

    fn encode_png(&self, _ppi: Option<f64>) -> Canvas2dResult<Vec<u8>> {
        Ok(Vec::new())
    }

    fn reset(&mut self) {
        self.matrix = Matrix::identity();
        self.matrices.clear();
        self.calls.push(Call::Reset);
    }
}

/// Every character advances half the font size; each glyph is a box from
/// the em top down to the baseline.
pub struct BoxShaper;

impl BoxShaper {
    pub fn paragraph(text: &str, style: &TextStyle) -> Paragraph {
        let size = style.font.size_px;
        let height = size * 1.2;
        let baseline = (height - size) / 2.0 + size * 0.8;
        let width = text.chars().count() as f64 * size * 0.5;
        Paragraph::new(width, size, height, baseline)
    }
}

impl TextShaper for BoxShaper {
    fn layout(&mut self, text: &str, style: &TextStyle) -> Paragraph {
        Self::paragraph(text, style)
    }

    fn shape(&mut self, text: &str, style: &TextStyle) -> ShapedParagraph {
        let mut paragraph = Self::paragraph(text, style);
        let advance = style.font.size_px * 0.5;
        let top = (paragraph.height - paragraph.font_size) / 2.0;
        let mut outline = CanvasPath::new();
        for (i, c) in text.chars().enumerate() {
            if c.is_whitespace() {
                continue;
            }
            outline.rect(
                i as f64 * advance,
                top,
                advance,
                paragraph.alphabetic_baseline - top,
            );
        }
        paragraph.ink_bounds = outline.bounds();
        ShapedParagraph { paragraph, outline }
    }
}

/// Provider that decodes from an in-memory table. Asynchronous requests
/// are held until [`DeferredProvider::release`].
#[derive(Default)]
pub struct DeferredProvider {
    images: RefCell<Vec<(ImageSource, DecodedImage)>>,
    pending: RefCell<Vec<(ImageSource, ImageCallback)>>,
    pub decodes: Cell<usize>,
    pub requests: Cell<usize>,
}

impl DeferredProvider {
    pub fn with_image(self, source: &str, image: DecodedImage) -> Self {
        self.images
            .borrow_mut()
            .push((ImageSource::from(source), image));
        self
    }

    fn lookup(&self, source: &ImageSource) -> Canvas2dResult<DecodedImage> {
        self.images
            .borrow()
            .iter()
            .find(|(s, _)| s == source)
            .map(|(_, image)| image.clone())
            .ok_or_else(|| Canvas2dError::ImageNotFound(source.to_string()))
    }

    /// Complete every held request for `source`.
    pub fn release(&self, source: &str) {
        let source = ImageSource::from(source);
        let ready: Vec<_> = {
            let mut pending = self.pending.borrow_mut();
            let (ready, rest): (Vec<_>, Vec<_>) =
                pending.drain(..).partition(|(s, _)| *s == source);
            *pending = rest;
            ready
        };
        for (s, callback) in ready {
            callback(self.lookup(&s));
        }
    }
}

impl ImageProvider for DeferredProvider {
    fn decode(&self, source: &ImageSource) -> Canvas2dResult<DecodedImage> {
        self.decodes.set(self.decodes.get() + 1);
        self.lookup(source)
    }

    fn request(&self, source: &ImageSource, on_complete: ImageCallback) {
        self.requests.set(self.requests.get() + 1);
        self.pending
            .borrow_mut()
            .push((source.clone(), on_complete));
    }
}

pub const SQUARE_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="20" height="10"><rect width="20" height="10" fill="red"/></svg>"#;

pub fn svg_image() -> DecodedImage {
    let source = ImageSource::from("square.svg");
    DecodedImage::Svg(Rc::new(
        SvgImage::from_data(&source, SQUARE_SVG.as_bytes()).expect("valid svg"),
    ))
}

pub fn raster_image(width: u32, height: u32, rgba: [u8; 4]) -> DecodedImage {
    let data: Vec<u8> = rgba
        .iter()
        .copied()
        .cycle()
        .take((width * height * 4) as usize)
        .collect();
    DecodedImage::Raster(Rc::new(
        RasterImage::from_rgba(&data, width, height).expect("valid raster"),
    ))
}

pub fn recording_engine(
    width: u32,
    height: u32,
    provider: Rc<DeferredProvider>,
) -> Canvas2dEngine<RecordingBackend> {
    init_logging();
    Canvas2dEngine::with_parts(
        RecordingBackend::new(width, height),
        &EngineConfig::default(),
        provider,
        Box::new(BoxShaper),
    )
}
