//! Style types and enums for Canvas 2D operations.
//!
//! All of these are backend-neutral; the skia backend converts them into
//! tiny-skia types.

use crate::error::{Canvas2dError, Canvas2dResult};
use std::str::FromStr;

/// Line cap style for stroke operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    /// Flat edge at the endpoint.
    #[default]
    Butt,
    /// Rounded edge extending past the endpoint.
    Round,
    /// Square edge extending past the endpoint.
    Square,
}

/// Line join style for stroke operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    /// Sharp corner.
    #[default]
    Miter,
    /// Rounded corner.
    Round,
    /// Beveled corner.
    Bevel,
}

/// Text alignment for text rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    Left,
    Right,
    Center,
    /// Left for LTR, right for RTL.
    #[default]
    Start,
    /// Right for LTR, left for RTL.
    End,
}

/// Text baseline for text rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextBaseline {
    Top,
    Hanging,
    Middle,
    #[default]
    Alphabetic,
    Ideographic,
    Bottom,
}

/// Writing direction used to resolve `start`/`end` alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextDirection {
    #[default]
    Ltr,
    Rtl,
}

/// Fill rule for path operations.
///
/// Determines how the interior of a path is calculated when filling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CanvasFillRule {
    /// Non-zero winding rule (default).
    #[default]
    NonZero,
    /// Even-odd rule.
    EvenOdd,
}

impl FromStr for CanvasFillRule {
    type Err = Canvas2dError;

    fn from_str(s: &str) -> Canvas2dResult<Self> {
        match s {
            "nonzero" => Ok(CanvasFillRule::NonZero),
            "evenodd" => Ok(CanvasFillRule::EvenOdd),
            other => Err(Canvas2dError::InvalidArgument(format!(
                "unknown fill rule '{other}'"
            ))),
        }
    }
}

/// Image smoothing quality levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageSmoothingQuality {
    #[default]
    Low,
    Medium,
    High,
}

impl FromStr for ImageSmoothingQuality {
    type Err = Canvas2dError;

    fn from_str(s: &str) -> Canvas2dResult<Self> {
        match s {
            "low" => Ok(ImageSmoothingQuality::Low),
            "medium" => Ok(ImageSmoothingQuality::Medium),
            "high" => Ok(ImageSmoothingQuality::High),
            other => Err(Canvas2dError::InvalidArgument(format!(
                "unknown smoothing quality '{other}'"
            ))),
        }
    }
}

/// Sampling mode used when a paint reads from an image or pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplingQuality {
    Nearest,
    #[default]
    Bilinear,
    Bicubic,
}

impl SamplingQuality {
    /// Map the smoothing settings to a sampling mode.
    pub fn from_smoothing(enabled: bool, quality: ImageSmoothingQuality) -> Self {
        if !enabled {
            return SamplingQuality::Nearest;
        }
        match quality {
            ImageSmoothingQuality::Low | ImageSmoothingQuality::Medium => {
                SamplingQuality::Bilinear
            }
            ImageSmoothingQuality::High => SamplingQuality::Bicubic,
        }
    }
}

/// Compositing and blending operations (`globalCompositeOperation`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositeOperation {
    #[default]
    SourceOver,
    SourceIn,
    SourceOut,
    SourceAtop,
    DestinationOver,
    DestinationIn,
    DestinationOut,
    DestinationAtop,
    Lighter,
    Copy,
    Xor,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

impl CompositeOperation {
    pub fn is_source_over(&self) -> bool {
        *self == CompositeOperation::SourceOver
    }
}

impl FromStr for CompositeOperation {
    type Err = Canvas2dError;

    fn from_str(op: &str) -> Canvas2dResult<Self> {
        Ok(match op {
            "source-over" => CompositeOperation::SourceOver,
            "source-in" => CompositeOperation::SourceIn,
            "source-out" => CompositeOperation::SourceOut,
            "source-atop" => CompositeOperation::SourceAtop,
            "destination-over" => CompositeOperation::DestinationOver,
            "destination-in" => CompositeOperation::DestinationIn,
            "destination-out" => CompositeOperation::DestinationOut,
            "destination-atop" => CompositeOperation::DestinationAtop,
            "lighter" => CompositeOperation::Lighter,
            "copy" => CompositeOperation::Copy,
            "xor" => CompositeOperation::Xor,
            "multiply" => CompositeOperation::Multiply,
            "screen" => CompositeOperation::Screen,
            "overlay" => CompositeOperation::Overlay,
            "darken" => CompositeOperation::Darken,
            "lighten" => CompositeOperation::Lighten,
            "color-dodge" => CompositeOperation::ColorDodge,
            "color-burn" => CompositeOperation::ColorBurn,
            "hard-light" => CompositeOperation::HardLight,
            "soft-light" => CompositeOperation::SoftLight,
            "difference" => CompositeOperation::Difference,
            "exclusion" => CompositeOperation::Exclusion,
            "hue" => CompositeOperation::Hue,
            "saturation" => CompositeOperation::Saturation,
            "color" => CompositeOperation::Color,
            "luminosity" => CompositeOperation::Luminosity,
            other => {
                return Err(Canvas2dError::InvalidArgument(format!(
                    "unknown composite operation '{other}'"
                )))
            }
        })
    }
}

/// Font style (italic / oblique).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
    Oblique,
}

impl FromStr for FontStyle {
    type Err = Canvas2dError;

    fn from_str(s: &str) -> Canvas2dResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(FontStyle::Normal),
            "italic" => Ok(FontStyle::Italic),
            "oblique" => Ok(FontStyle::Oblique),
            other => Err(Canvas2dError::FontParseError(format!(
                "unknown font style '{other}'"
            ))),
        }
    }
}

/// Numeric font weight (100..=900).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FontWeight(pub u16);

impl FontWeight {
    pub const NORMAL: FontWeight = FontWeight(400);
    pub const BOLD: FontWeight = FontWeight(700);
}

impl Default for FontWeight {
    fn default() -> Self {
        FontWeight::NORMAL
    }
}

impl FromStr for FontWeight {
    type Err = Canvas2dError;

    fn from_str(s: &str) -> Canvas2dResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(FontWeight::NORMAL),
            "bold" => Ok(FontWeight::BOLD),
            "lighter" => Ok(FontWeight(300)),
            "bolder" => Ok(FontWeight(800)),
            other => other
                .parse::<u16>()
                .ok()
                .filter(|w| (1..=1000).contains(w))
                .map(FontWeight)
                .ok_or_else(|| {
                    Canvas2dError::FontParseError(format!("invalid font weight '{other}'"))
                }),
        }
    }
}
