//! Paragraph layout for text drawing and measurement.
//!
//! Shaping is delegated to a [`TextShaper`]; the engine only reads back a
//! [`Paragraph`] (intrinsic width and baseline metrics) and, for painting,
//! the glyph outlines. [`CosmicTextShaper`] is the cosmic-text
//! implementation.

use crate::config::{FontSet, GenericFamily};
use crate::font_parser::FontSpec;
use crate::paint_state::TextStyle;
use crate::path::CanvasPath;
use crate::style::{FontStyle, TextAlign, TextBaseline, TextDirection};
use cosmic_text::{
    Attrs, Buffer, CacheKeyFlags, Command, Family, FontSystem, Metrics, Shaping, Style,
    SwashCache, Weight,
};
use kurbo::Rect;

/// Line height as a multiple of the font size.
const LINE_HEIGHT_FACTOR: f64 = 1.2;

/// Laid-out metrics of a single line of text. Vertical positions are
/// measured down from the top of the line box.
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    pub max_intrinsic_width: f64,
    pub height: f64,
    pub font_size: f64,
    pub alphabetic_baseline: f64,
    /// Bottom of the em box.
    pub ideographic_baseline: f64,
    pub hanging_baseline: f64,
    /// Ink extent, in the same coordinates; `None` for blank text.
    pub ink_bounds: Option<Rect>,
}

impl Paragraph {
    /// Metrics for a line box of `font_size` with the baseline at
    /// `alphabetic_baseline`.
    pub fn new(width: f64, font_size: f64, height: f64, alphabetic_baseline: f64) -> Self {
        let em_top = (height - font_size) / 2.0;
        Self {
            max_intrinsic_width: width,
            height,
            font_size,
            alphabetic_baseline,
            ideographic_baseline: em_top + font_size,
            hanging_baseline: alphabetic_baseline - 0.8 * (alphabetic_baseline - em_top),
            ink_bounds: None,
        }
    }

    fn em_top(&self) -> f64 {
        (self.height - self.font_size) / 2.0
    }
}

/// A paragraph plus its glyph outlines, positioned with the line box's
/// top-left corner at the origin.
#[derive(Debug, Clone)]
pub struct ShapedParagraph {
    pub paragraph: Paragraph,
    pub outline: CanvasPath,
}

/// Builds paragraphs from text and a text style.
pub trait TextShaper {
    fn layout(&mut self, text: &str, style: &TextStyle) -> Paragraph;
    fn shape(&mut self, text: &str, style: &TextStyle) -> ShapedParagraph;
}

/// Result of `measure_text_metrics`. Vertical values are relative to the
/// current baseline setting; baseline distances are positive above it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextMetrics {
    pub width: f64,
    pub actual_bounding_box_left: f64,
    pub actual_bounding_box_right: f64,
    pub actual_bounding_box_ascent: f64,
    pub actual_bounding_box_descent: f64,
    pub font_bounding_box_ascent: f64,
    pub font_bounding_box_descent: f64,
    pub em_height_ascent: f64,
    pub em_height_descent: f64,
    pub alphabetic_baseline: f64,
    pub hanging_baseline: f64,
    pub ideographic_baseline: f64,
}

/// Resolve `start`/`end` against the writing direction.
fn resolve_align(align: TextAlign, direction: TextDirection) -> TextAlign {
    match (align, direction) {
        (TextAlign::Start, TextDirection::Ltr) | (TextAlign::End, TextDirection::Rtl) => {
            TextAlign::Left
        }
        (TextAlign::Start, TextDirection::Rtl) | (TextAlign::End, TextDirection::Ltr) => {
            TextAlign::Right
        }
        (other, _) => other,
    }
}

/// Horizontal offset from the anchor to the paragraph's left edge.
pub fn align_offset(width: f64, align: TextAlign, direction: TextDirection) -> f64 {
    match resolve_align(align, direction) {
        TextAlign::Right => -width,
        TextAlign::Center => -width / 2.0,
        _ => 0.0,
    }
}

/// Vertical offset from the anchor to the paragraph's top edge.
pub fn baseline_offset(paragraph: &Paragraph, baseline: TextBaseline) -> f64 {
    match baseline {
        TextBaseline::Alphabetic => -paragraph.alphabetic_baseline,
        TextBaseline::Ideographic | TextBaseline::Bottom => -paragraph.ideographic_baseline,
        TextBaseline::Top | TextBaseline::Hanging => 0.0,
        TextBaseline::Middle => -paragraph.height / 2.0,
    }
}

/// Horizontal shrink factor for a caller-supplied maximum width.
///
/// `None` means nothing should be drawn (non-positive or NaN width, or a
/// vanishing scale).
pub fn shrink_scale(width: f64, max_width: Option<f64>) -> Option<f64> {
    match max_width {
        None => Some(1.0),
        Some(mw) if mw.is_nan() || mw <= 0.0 => None,
        Some(mw) if mw.is_infinite() || width <= mw => Some(1.0),
        Some(mw) => {
            let scale = mw / width;
            (scale >= 0.001).then_some(scale)
        }
    }
}

/// Metrics relative to the anchor for the given style.
pub fn text_metrics(paragraph: &Paragraph, style: &TextStyle) -> TextMetrics {
    let width = paragraph.max_intrinsic_width;
    let hoff = align_offset(width, style.align, style.direction);
    // Distance from the top of the line box down to the anchor.
    let anchor_y = -baseline_offset(paragraph, style.baseline);
    let (left, right, ascent, descent) = match paragraph.ink_bounds {
        Some(ink) => (
            -hoff - ink.x0,
            ink.x1 + hoff,
            anchor_y - ink.y0,
            ink.y1 - anchor_y,
        ),
        None => (0.0, 0.0, 0.0, 0.0),
    };
    let em_top = paragraph.em_top();
    TextMetrics {
        width,
        actual_bounding_box_left: left,
        actual_bounding_box_right: right,
        actual_bounding_box_ascent: ascent,
        actual_bounding_box_descent: descent,
        font_bounding_box_ascent: anchor_y,
        font_bounding_box_descent: paragraph.height - anchor_y,
        em_height_ascent: anchor_y - em_top,
        em_height_descent: em_top + paragraph.font_size - anchor_y,
        alphabetic_baseline: anchor_y - paragraph.alphabetic_baseline,
        hanging_baseline: anchor_y - paragraph.hanging_baseline,
        ideographic_baseline: anchor_y - paragraph.ideographic_baseline,
    }
}

/// cosmic-text backed shaper with vector glyph outlines.
pub struct CosmicTextShaper {
    font_system: FontSystem,
    swash_cache: SwashCache,
    hinting: bool,
}

impl CosmicTextShaper {
    pub fn new(fonts: &FontSet) -> Self {
        Self {
            font_system: FontSystem::new_with_locale_and_db(
                "en".to_string(),
                fonts.db.clone(),
            ),
            swash_cache: SwashCache::new(),
            hinting: fonts.hinting,
        }
    }

    /// First family of `font` the database can satisfy; generic names always
    /// resolve.
    fn pick_family<'a>(&self, font: &'a FontSpec) -> Family<'a> {
        let db = self.font_system.db();
        font.families
            .iter()
            .find_map(|name| match GenericFamily::parse(name) {
                Some(generic) => Some(generic.family()),
                None => db
                    .faces()
                    .any(|face| face.families.iter().any(|(n, _)| n.eq_ignore_ascii_case(name)))
                    .then_some(Family::Name(name.as_str())),
            })
            .unwrap_or(Family::SansSerif)
    }

    fn buffer(&mut self, text: &str, style: &TextStyle) -> Buffer {
        let font = &style.font;
        let size = font.size_px as f32;
        let metrics = Metrics::new(size, size * LINE_HEIGHT_FACTOR as f32);
        let mut buffer = Buffer::new(&mut self.font_system, metrics);

        let mut attrs = Attrs::new()
            .family(self.pick_family(font))
            .weight(Weight(font.weight.0))
            .style(match font.style {
                FontStyle::Normal => Style::Normal,
                FontStyle::Italic => Style::Italic,
                FontStyle::Oblique => Style::Oblique,
            })
            .letter_spacing(style.letter_spacing as f32);
        if !self.hinting {
            attrs = attrs.cache_key_flags(CacheKeyFlags::DISABLE_HINTING);
        }

        buffer.set_text(&mut self.font_system, text, &attrs, Shaping::Advanced, None);
        buffer.shape_until_scroll(&mut self.font_system, false);
        buffer
    }

    fn paragraph_of(buffer: &Buffer, font_size: f64) -> Paragraph {
        let mut width: f64 = 0.0;
        let mut line: Option<(f64, f64)> = None;
        for run in buffer.layout_runs() {
            width = width.max(run.line_w as f64);
            if line.is_none() {
                line = Some((
                    (run.line_y - run.line_top) as f64,
                    run.line_height as f64,
                ));
            }
        }
        let height = line.map_or(font_size * LINE_HEIGHT_FACTOR, |(_, h)| h);
        let baseline = line.map_or((height - font_size) / 2.0 + font_size * 0.8, |(b, _)| b);
        Paragraph::new(width, font_size, height, baseline)
    }
}

impl TextShaper for CosmicTextShaper {
    fn layout(&mut self, text: &str, style: &TextStyle) -> Paragraph {
        let buffer = self.buffer(text, style);
        Self::paragraph_of(&buffer, style.font.size_px)
    }

    fn shape(&mut self, text: &str, style: &TextStyle) -> ShapedParagraph {
        let buffer = self.buffer(text, style);
        let mut paragraph = Self::paragraph_of(&buffer, style.font.size_px);
        let mut outline = CanvasPath::new();

        for run in buffer.layout_runs() {
            let line_top = run.line_top as f64;
            for glyph in run.glyphs.iter() {
                let physical = glyph.physical((0.0, 0.0), 1.0);
                let x = (glyph.x + glyph.font_size * glyph.x_offset) as f64;
                let y = (run.line_y + glyph.y - glyph.font_size * glyph.y_offset) as f64 - line_top;
                let Some(commands) = self
                    .swash_cache
                    .get_outline_commands(&mut self.font_system, physical.cache_key)
                else {
                    continue;
                };
                // Font outlines are y-up.
                let p = |px: f32, py: f32| (x + px as f64, y - py as f64);
                for command in commands {
                    match command {
                        Command::MoveTo(v) => {
                            let (px, py) = p(v.x, v.y);
                            outline.move_to(px, py);
                        }
                        Command::LineTo(v) => {
                            let (px, py) = p(v.x, v.y);
                            outline.line_to(px, py);
                        }
                        Command::QuadTo(c, v) => {
                            let ((cx, cy), (px, py)) = (p(c.x, c.y), p(v.x, v.y));
                            outline.quad_to(cx, cy, px, py);
                        }
                        Command::CurveTo(c1, c2, v) => {
                            let (c1x, c1y) = p(c1.x, c1.y);
                            let (c2x, c2y) = p(c2.x, c2.y);
                            let (px, py) = p(v.x, v.y);
                            outline.cubic_to(c1x, c1y, c2x, c2y, px, py);
                        }
                        Command::Close => outline.close(),
                    }
                }
            }
        }

        paragraph.ink_bounds = outline.bounds();
        ShapedParagraph { paragraph, outline }
    }
}
