//! Fill, stroke, global and shadow state with save/restore snapshots.

use crate::filter::Filter;
use crate::font_parser::FontSpec;
use crate::geometry::CanvasColor;
use crate::gradient::CanvasGradient;
use crate::pattern::CanvasPattern;
use crate::style::{
    CompositeOperation, FontStyle, FontWeight, ImageSmoothingQuality, LineCap, LineJoin,
    SamplingQuality, TextAlign, TextBaseline, TextDirection,
};

const SHADOW_EPSILON: f64 = 1e-6;

/// The one active source of color for a paint.
#[derive(Debug, Clone)]
pub enum PaintSource {
    Color(CanvasColor),
    Gradient(CanvasGradient),
    Pattern(CanvasPattern),
}

impl Default for PaintSource {
    fn default() -> Self {
        PaintSource::Color(CanvasColor::BLACK)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextStyle {
    pub font: FontSpec,
    pub align: TextAlign,
    pub baseline: TextBaseline,
    pub direction: TextDirection,
    pub letter_spacing: f64,
}

/// Fill state: paint source plus the text style used by `fill_text`.
#[derive(Debug, Clone, Default)]
pub struct PaintState {
    pub source: PaintSource,
    pub text: TextStyle,
}

/// Stroke state: a paint state plus line styles.
#[derive(Debug, Clone)]
pub struct StrokeState {
    pub paint: PaintState,
    pub line_width: f64,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f64,
    /// Always even-length.
    pub line_dash: Vec<f64>,
    pub line_dash_offset: f64,
}

impl Default for StrokeState {
    fn default() -> Self {
        Self {
            paint: PaintState::default(),
            line_width: 1.0,
            line_cap: LineCap::default(),
            line_join: LineJoin::default(),
            miter_limit: 10.0,
            line_dash: Vec::new(),
            line_dash_offset: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GlobalState {
    /// `None` until an alpha is set; reads as 1.
    pub alpha: Option<f64>,
    pub composite: CompositeOperation,
}

impl GlobalState {
    pub fn effective_alpha(&self) -> f64 {
        self.alpha.unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub color: CanvasColor,
    pub offset_x: f64,
    pub offset_y: f64,
    pub blur: f64,
}

impl Default for Shadow {
    fn default() -> Self {
        Self {
            color: CanvasColor::BLACK,
            offset_x: 0.0,
            offset_y: 0.0,
            blur: 0.0,
        }
    }
}

impl Shadow {
    /// True unless offset and blur are all (nearly) zero.
    pub fn has_shadow(&self) -> bool {
        !(self.offset_x.abs() < SHADOW_EPSILON
            && self.offset_y.abs() < SHADOW_EPSILON
            && self.blur.abs() < SHADOW_EPSILON)
    }
}

/// The snapshot pushed by `save`.
#[derive(Debug, Clone, Default)]
pub struct SaveState {
    pub shadow: Shadow,
    pub fill: PaintState,
    pub stroke: StrokeState,
    pub global: GlobalState,
}

/// Live paint state plus the stack of saved snapshots.
///
/// Setters only touch the live state. The filter and smoothing settings are
/// live-only and survive `restore`.
#[derive(Debug, Clone)]
pub struct PaintStateStack {
    live: SaveState,
    filter: Option<Filter>,
    smoothing_enabled: bool,
    smoothing_quality: ImageSmoothingQuality,
    stack: Vec<SaveState>,
}

impl Default for PaintStateStack {
    fn default() -> Self {
        Self {
            live: SaveState::default(),
            filter: None,
            smoothing_enabled: true,
            smoothing_quality: ImageSmoothingQuality::default(),
            stack: Vec::new(),
        }
    }
}

impl PaintStateStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&mut self) {
        self.stack.push(self.live.clone());
    }

    /// Pop the last snapshot. Returns false (and changes nothing) when the
    /// stack is empty.
    pub fn restore(&mut self) -> bool {
        match self.stack.pop() {
            Some(state) => {
                self.live = state;
                true
            }
            None => false,
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn live(&self) -> &SaveState {
        &self.live
    }

    pub fn fill(&self) -> &PaintState {
        &self.live.fill
    }

    pub fn stroke(&self) -> &StrokeState {
        &self.live.stroke
    }

    pub fn global(&self) -> &GlobalState {
        &self.live.global
    }

    pub fn shadow(&self) -> &Shadow {
        &self.live.shadow
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn smoothing_enabled(&self) -> bool {
        self.smoothing_enabled
    }

    pub fn smoothing_quality(&self) -> ImageSmoothingQuality {
        self.smoothing_quality
    }

    pub fn sampling(&self) -> SamplingQuality {
        SamplingQuality::from_smoothing(self.smoothing_enabled, self.smoothing_quality)
    }

    // --- paint sources ---

    pub fn set_fill_source(&mut self, source: PaintSource) {
        self.live.fill.source = source;
    }

    pub fn set_stroke_source(&mut self, source: PaintSource) {
        self.live.stroke.paint.source = source;
    }

    // --- line styles; invalid values are rejected and reported ---

    pub fn set_line_width(&mut self, width: f64) -> bool {
        let ok = width.is_finite() && width > 0.0;
        if ok {
            self.live.stroke.line_width = width;
        }
        ok
    }

    pub fn set_line_cap(&mut self, cap: LineCap) {
        self.live.stroke.line_cap = cap;
    }

    pub fn set_line_join(&mut self, join: LineJoin) {
        self.live.stroke.line_join = join;
    }

    pub fn set_miter_limit(&mut self, limit: f64) -> bool {
        let ok = limit.is_finite() && limit > 0.0;
        if ok {
            self.live.stroke.miter_limit = limit;
        }
        ok
    }

    /// Odd-length arrays are duplicated to make them even.
    pub fn set_line_dash(&mut self, mut segments: Vec<f64>) -> bool {
        if segments.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return false;
        }
        if segments.len() % 2 != 0 {
            segments.extend_from_within(..);
        }
        self.live.stroke.line_dash = segments;
        true
    }

    pub fn set_line_dash_offset(&mut self, offset: f64) -> bool {
        let ok = offset.is_finite();
        if ok {
            self.live.stroke.line_dash_offset = offset;
        }
        ok
    }

    // --- global ---

    pub fn set_alpha(&mut self, alpha: f64) -> bool {
        let ok = alpha.is_finite() && (0.0..=1.0).contains(&alpha);
        if ok {
            self.live.global.alpha = Some(alpha);
        }
        ok
    }

    pub fn set_composite(&mut self, op: CompositeOperation) {
        self.live.global.composite = op;
    }

    // --- shadow ---

    pub fn set_shadow_color(&mut self, color: CanvasColor) {
        self.live.shadow.color = color;
    }

    pub fn set_shadow_blur(&mut self, blur: f64) -> bool {
        let ok = blur.is_finite() && blur >= 0.0;
        if ok {
            self.live.shadow.blur = blur;
        }
        ok
    }

    pub fn set_shadow_offset_x(&mut self, x: f64) -> bool {
        let ok = x.is_finite();
        if ok {
            self.live.shadow.offset_x = x;
        }
        ok
    }

    pub fn set_shadow_offset_y(&mut self, y: f64) -> bool {
        let ok = y.is_finite();
        if ok {
            self.live.shadow.offset_y = y;
        }
        ok
    }

    // --- live-only settings ---

    pub fn set_filter(&mut self, filter: Option<Filter>) {
        self.filter = filter.filter(|f| !f.is_none());
    }

    pub fn set_smoothing_enabled(&mut self, enabled: bool) {
        self.smoothing_enabled = enabled;
    }

    pub fn set_smoothing_quality(&mut self, quality: ImageSmoothingQuality) {
        self.smoothing_quality = quality;
    }

    // --- text: fill and stroke text styles move together ---

    fn for_each_text(&mut self, mut update: impl FnMut(&mut TextStyle)) {
        update(&mut self.live.fill.text);
        update(&mut self.live.stroke.paint.text);
    }

    pub fn set_font(&mut self, font: FontSpec) {
        self.for_each_text(|t| t.font = font.clone());
    }

    pub fn set_font_size(&mut self, size_px: f64) -> bool {
        let ok = size_px.is_finite() && size_px > 0.0;
        if ok {
            self.for_each_text(|t| t.font.size_px = size_px);
        }
        ok
    }

    pub fn set_font_weight(&mut self, weight: FontWeight) {
        self.for_each_text(|t| t.font.weight = weight);
    }

    pub fn set_font_style(&mut self, style: FontStyle) {
        self.for_each_text(|t| t.font.style = style);
    }

    pub fn set_font_families(&mut self, families: Vec<String>) -> bool {
        let ok = !families.is_empty();
        if ok {
            self.for_each_text(|t| t.font.families = families.clone());
        }
        ok
    }

    pub fn set_text_align(&mut self, align: TextAlign) {
        self.for_each_text(|t| t.align = align);
    }

    pub fn set_text_baseline(&mut self, baseline: TextBaseline) {
        self.for_each_text(|t| t.baseline = baseline);
    }

    pub fn set_text_direction(&mut self, direction: TextDirection) {
        self.for_each_text(|t| t.direction = direction);
    }

    pub fn set_letter_spacing(&mut self, spacing: f64) -> bool {
        let ok = spacing.is_finite();
        if ok {
            self.for_each_text(|t| t.letter_spacing = spacing);
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{parse_filter, FilterUpdate};

    #[test]
    fn test_defaults() {
        let state = PaintStateStack::new();
        assert!(matches!(
            state.fill().source,
            PaintSource::Color(CanvasColor::BLACK)
        ));
        assert_eq!(state.stroke().line_width, 1.0);
        assert_eq!(state.stroke().miter_limit, 10.0);
        assert_eq!(state.global().alpha, None);
        assert_eq!(state.global().effective_alpha(), 1.0);
        assert_eq!(state.fill().text.font.size_px, 14.0);
        assert_eq!(state.fill().text.font.families, vec!["sans-serif"]);
        assert!(!state.shadow().has_shadow());
        assert_eq!(state.sampling(), SamplingQuality::Bilinear);
    }

    #[test]
    fn test_balanced_save_restore() {
        let mut state = PaintStateStack::new();
        state.set_alpha(0.25);
        for i in 0..3 {
            state.save();
            state.set_line_width(i as f64 + 2.0);
            state.set_alpha(0.5);
        }
        for _ in 0..3 {
            assert!(state.restore());
        }
        assert_eq!(state.global().alpha, Some(0.25));
        assert_eq!(state.stroke().line_width, 1.0);
        assert!(!state.restore());
        assert_eq!(state.global().alpha, Some(0.25));
    }

    #[test]
    fn test_restore_keeps_filter_and_smoothing() {
        let mut state = PaintStateStack::new();
        state.save();
        let FilterUpdate::Set(filter) = parse_filter("grayscale(1)") else {
            panic!("expected a filter");
        };
        state.set_filter(Some(filter));
        state.set_smoothing_enabled(false);
        state.restore();
        assert!(state.filter().is_some());
        assert!(!state.smoothing_enabled());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut state = PaintStateStack::new();
        assert!(!state.set_line_width(0.0));
        assert!(!state.set_line_width(f64::NAN));
        assert!(!state.set_miter_limit(-1.0));
        assert!(!state.set_alpha(1.5));
        assert!(!state.set_shadow_blur(-2.0));
        assert!(!state.set_line_dash(vec![1.0, -1.0]));
        assert_eq!(state.stroke().line_width, 1.0);
        assert_eq!(state.global().alpha, None);
    }

    #[test]
    fn test_odd_dash_is_duplicated() {
        let mut state = PaintStateStack::new();
        assert!(state.set_line_dash(vec![5.0, 10.0, 15.0]));
        assert_eq!(
            state.stroke().line_dash,
            vec![5.0, 10.0, 15.0, 5.0, 10.0, 15.0]
        );
    }

    #[test]
    fn test_has_shadow() {
        let mut shadow = Shadow::default();
        assert!(!shadow.has_shadow());
        assert_eq!(shadow.color, CanvasColor::BLACK);
        shadow.blur = 4.0;
        assert!(shadow.has_shadow());
        shadow.blur = 0.0;
        shadow.offset_y = -1.0;
        assert!(shadow.has_shadow());
    }

    #[test]
    fn test_font_setters_update_fill_and_stroke() {
        let mut state = PaintStateStack::new();
        state.set_font_size(20.0);
        state.set_text_align(TextAlign::Center);
        assert_eq!(state.fill().text.font.size_px, 20.0);
        assert_eq!(state.stroke().paint.text.font.size_px, 20.0);
        assert_eq!(state.stroke().paint.text.align, TextAlign::Center);
    }
}
