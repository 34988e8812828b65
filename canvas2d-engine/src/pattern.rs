//! Pattern types for Canvas 2D operations.

use crate::error::{Canvas2dError, Canvas2dResult};
use crate::image::{ImageSource, RasterImage};
use crate::matrix::Matrix;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for pattern IDs.
static PATTERN_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Pattern repetition mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PatternRepetition {
    /// Repeat in both directions (default).
    #[default]
    Repeat,
    /// Repeat only horizontally.
    RepeatX,
    /// Repeat only vertically.
    RepeatY,
    /// A single instance, transparent elsewhere.
    NoRepeat,
    /// Edge pixels extend outward.
    Clamp,
    /// Tiles alternate with mirrored copies.
    Mirror,
}

impl std::str::FromStr for PatternRepetition {
    type Err = Canvas2dError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "repeat" | "" => Ok(PatternRepetition::Repeat),
            "repeat-x" => Ok(PatternRepetition::RepeatX),
            "repeat-y" => Ok(PatternRepetition::RepeatY),
            "no-repeat" => Ok(PatternRepetition::NoRepeat),
            "clamp" => Ok(PatternRepetition::Clamp),
            "mirror" => Ok(PatternRepetition::Mirror),
            _ => Err(Canvas2dError::InvalidArgument(format!(
                "Invalid repetition mode: '{}'",
                s
            ))),
        }
    }
}

/// Where a pattern's pixels come from.
#[derive(Debug, Clone)]
pub enum PatternImage {
    /// Resolved through the image pipeline when the pattern is painted.
    Source(ImageSource),
    /// Pixels supplied directly by the caller.
    Raster(Rc<RasterImage>),
}

/// Canvas pattern for fill/stroke operations.
#[derive(Debug, Clone)]
pub struct CanvasPattern {
    /// Unique identifier for this pattern (used for caching).
    id: u64,
    image: PatternImage,
    repetition: PatternRepetition,
    transform: Matrix,
    transformable: bool,
}

impl CanvasPattern {
    pub fn new(image: PatternImage, repetition: PatternRepetition) -> Self {
        Self {
            id: PATTERN_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            image,
            repetition,
            transform: Matrix::identity(),
            transformable: false,
        }
    }

    /// Pattern over an image source, with a repetition string such as
    /// `"repeat-x"`.
    pub fn from_source(source: impl Into<ImageSource>, repetition: &str) -> Canvas2dResult<Self> {
        Ok(Self::new(
            PatternImage::Source(source.into()),
            repetition.parse()?,
        ))
    }

    /// Pattern over caller-supplied non-premultiplied RGBA pixels.
    pub fn from_rgba(
        data: &[u8],
        width: u32,
        height: u32,
        repetition: &str,
    ) -> Canvas2dResult<Self> {
        let raster = RasterImage::from_rgba(data, width, height)?;
        Ok(Self::new(
            PatternImage::Raster(Rc::new(raster)),
            repetition.parse()?,
        ))
    }

    /// Set the pattern transform and mark the pattern transformable.
    pub fn set_transform(&mut self, transform: Matrix) {
        self.transform = transform;
        self.transformable = true;
    }

    pub fn transform(&self) -> Matrix {
        self.transform
    }

    pub fn is_transformable(&self) -> bool {
        self.transformable
    }

    pub fn repetition(&self) -> PatternRepetition {
        self.repetition
    }

    pub fn image(&self) -> &PatternImage {
        &self.image
    }

    /// Get the unique pattern ID used by caches.
    pub fn id(&self) -> u64 {
        self.id
    }
}
