//! Text state, drawing and measurement.

use super::Canvas2dEngine;
use crate::backend::RenderBackend;
use crate::brush::PaintTarget;
use crate::error::Canvas2dResult;
use crate::font_parser::{parse_font, parse_font_families};
use crate::matrix::Matrix;
use crate::paint_state::TextStyle;
use crate::style::{FontStyle, FontWeight, TextAlign, TextBaseline, TextDirection};
use crate::text::{align_offset, baseline_offset, shrink_scale, text_metrics, TextMetrics};

impl<B: RenderBackend> Canvas2dEngine<B> {
    /// Set the font from a CSS `font` shorthand such as `"bold 12px Arial"`.
    pub fn set_font(&mut self, font: &str) -> Canvas2dResult<()> {
        log::debug!(target: "canvas", "set_font {:?}", font);
        let spec = parse_font(font)?;
        self.paint.set_font(spec);
        Ok(())
    }

    pub fn set_font_size(&mut self, size_px: f64) {
        if !self.paint.set_font_size(size_px) {
            log::debug!(target: "canvas", "ignoring font size {}", size_px);
        }
    }

    pub fn set_font_weight(&mut self, weight: FontWeight) {
        self.paint.set_font_weight(weight);
    }

    pub fn set_font_style(&mut self, style: FontStyle) {
        self.paint.set_font_style(style);
    }

    /// Set the family list from a comma-separated CSS family string.
    pub fn set_font_family(&mut self, families: &str) {
        if !self.paint.set_font_families(parse_font_families(families)) {
            log::debug!(target: "canvas", "ignoring empty font family {:?}", families);
        }
    }

    pub fn set_text_align(&mut self, align: TextAlign) {
        self.paint.set_text_align(align);
    }

    pub fn set_text_baseline(&mut self, baseline: TextBaseline) {
        self.paint.set_text_baseline(baseline);
    }

    pub fn set_text_direction(&mut self, direction: TextDirection) {
        self.paint.set_text_direction(direction);
    }

    pub fn set_letter_spacing(&mut self, spacing: f64) {
        if !self.paint.set_letter_spacing(spacing) {
            log::debug!(target: "canvas", "ignoring letter spacing {}", spacing);
        }
    }

    pub fn get_letter_spacing(&self) -> f64 {
        self.paint.fill().text.letter_spacing
    }

    pub fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        self.render_text(text, x, y, None, PaintTarget::Fill);
    }

    /// Fill text, squeezed horizontally to fit `max_width`.
    pub fn fill_text_max_width(&mut self, text: &str, x: f64, y: f64, max_width: f64) {
        self.render_text(text, x, y, Some(max_width), PaintTarget::Fill);
    }

    pub fn stroke_text(&mut self, text: &str, x: f64, y: f64) {
        self.render_text(text, x, y, None, PaintTarget::Stroke);
    }

    pub fn stroke_text_max_width(&mut self, text: &str, x: f64, y: f64, max_width: f64) {
        self.render_text(text, x, y, Some(max_width), PaintTarget::Stroke);
    }

    /// Advance width of `text` with the current font.
    pub fn measure_text(&mut self, text: &str) -> f64 {
        log::debug!(target: "canvas", "measure_text {:?}", text);
        let style = self.paint.fill().text.clone();
        self.shaper.layout(text, &style).max_intrinsic_width
    }

    /// Line height of `text` with the current font.
    pub fn measure_text_height(&mut self, text: &str) -> f64 {
        log::debug!(target: "canvas", "measure_text_height {:?}", text);
        let style = self.paint.fill().text.clone();
        self.shaper.layout(text, &style).height
    }

    /// Full metrics of `text`, relative to the current baseline setting.
    pub fn measure_text_metrics(&mut self, text: &str) -> TextMetrics {
        log::debug!(target: "canvas", "measure_text_metrics {:?}", text);
        let style = self.paint.fill().text.clone();
        let shaped = self.shaper.shape(text, &style);
        text_metrics(&shaped.paragraph, &style)
    }

    fn text_style(&self, target: PaintTarget) -> TextStyle {
        match target {
            PaintTarget::Fill => self.paint.fill().text.clone(),
            PaintTarget::Stroke => self.paint.stroke().paint.text.clone(),
        }
    }

    fn render_text(
        &mut self,
        text: &str,
        x: f64,
        y: f64,
        max_width: Option<f64>,
        target: PaintTarget,
    ) {
        let op = match target {
            PaintTarget::Fill => "fill_text",
            PaintTarget::Stroke => "stroke_text",
        };
        let Some(frame) = self.frame(op) else {
            return;
        };
        log::debug!(target: "canvas", "{} {:?} at ({}, {})", op, text, x, y);
        if text.is_empty() || !x.is_finite() || !y.is_finite() {
            return;
        }

        let style = self.text_style(target);
        let shaped = self.shaper.shape(text, &style);
        let paragraph = &shaped.paragraph;
        let Some(scale) = shrink_scale(paragraph.max_intrinsic_width, max_width) else {
            log::debug!(target: "canvas", "{}: max width {:?} draws nothing", op, max_width);
            return;
        };
        if shaped.outline.is_empty() {
            return;
        }

        let hoff = align_offset(paragraph.max_intrinsic_width, style.align, style.direction);
        let voff = baseline_offset(paragraph, style.baseline);
        let (ax, ay) = (x + frame.offset_x, y + frame.offset_y);
        // Squeeze about the anchor, after alignment.
        let placement = Matrix::translation(ax, ay + voff)
            .pre_concat(&Matrix::scaling(scale, 1.0))
            .pre_concat(&Matrix::translation(hoff, 0.0));

        let mut outline = shaped.outline;
        outline.transform(&placement);
        self.draw_path_with(&outline, target, (frame.offset_x, frame.offset_y));
    }
}
