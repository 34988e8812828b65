//! Bounded LRU cache for pattern backing pixmaps.
//!
//! `repeat`, `mirror` and `clamp` patterns sample the image directly. The
//! other modes need a backing pixmap with transparent margins (and, for
//! single-axis repetition, a strip of tiles) so that pad sampling leaves
//! the uncovered area transparent. Those pixmaps are kept here.

use crate::image::RasterImage;
use crate::pattern::PatternRepetition;
use std::collections::HashMap;
use std::sync::Arc;
use tiny_skia::Pixmap;

/// Largest strip the cache will build along the repeated axis.
const MAX_STRIP_EXTENT: u32 = 16384;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PatternCacheKey {
    pub(crate) pattern_id: u64,
    pub(crate) repetition: PatternRepetition,
    /// Index of the first tile in the strip (0 for no-repeat).
    pub(crate) first_tile: i32,
    pub(crate) tile_count: u32,
}

#[derive(Debug)]
struct PatternCacheEntry {
    pixmap: Arc<Pixmap>,
    size_bytes: usize,
    last_used: u64,
}

#[derive(Debug)]
pub(crate) struct PatternPixmapCache {
    max_bytes: usize,
    total_bytes: usize,
    clock: u64,
    entries: HashMap<PatternCacheKey, PatternCacheEntry>,
}

impl PatternPixmapCache {
    pub(crate) fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            total_bytes: 0,
            clock: 0,
            entries: HashMap::new(),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.total_bytes = 0;
        self.clock = 0;
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    fn next_tick(&mut self) -> u64 {
        self.clock = self.clock.wrapping_add(1);
        self.clock
    }

    pub(crate) fn get_or_insert(
        &mut self,
        key: PatternCacheKey,
        create: impl FnOnce() -> Option<Pixmap>,
    ) -> Option<Arc<Pixmap>> {
        if self.entries.contains_key(&key) {
            let tick = self.next_tick();
            let entry = self.entries.get_mut(&key)?;
            entry.last_used = tick;
            return Some(Arc::clone(&entry.pixmap));
        }

        let pixmap = Arc::new(create()?);
        let size_bytes = pixmap.data().len();

        // Oversize pixmaps are handed out but never pinned.
        if size_bytes > self.max_bytes {
            return Some(pixmap);
        }

        let tick = self.next_tick();
        self.total_bytes += size_bytes;
        self.entries.insert(
            key,
            PatternCacheEntry {
                pixmap: Arc::clone(&pixmap),
                size_bytes,
                last_used: tick,
            },
        );
        self.evict_to_budget();
        Some(pixmap)
    }

    fn evict_to_budget(&mut self) {
        while self.total_bytes > self.max_bytes {
            let Some(key) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| *key)
            else {
                break;
            };
            match self.entries.remove(&key) {
                Some(entry) => {
                    self.total_bytes = self.total_bytes.saturating_sub(entry.size_bytes);
                }
                None => break,
            }
        }
    }
}

/// Tile range `[first, first + count)` along one axis needed to cover the
/// pattern-space interval `[min, max]` with tiles of `extent` pixels.
pub(crate) fn tile_range(min: f64, max: f64, extent: u32) -> (i32, u32) {
    let extent_f = extent.max(1) as f64;
    let first = (min / extent_f).floor();
    let last = (max / extent_f).ceil();
    if !first.is_finite() || !last.is_finite() {
        return (0, 1);
    }
    let max_count = (MAX_STRIP_EXTENT / extent.max(1)).max(1);
    let count = ((last - first) as i64).clamp(1, max_count as i64) as u32;
    (first as i32, count)
}

/// Copy `image` into `dst` with its top-left pixel at `(x, y)`.
fn blit(dst: &mut Pixmap, image: &RasterImage, x: u32, y: u32) {
    let dst_width = dst.width() as usize;
    let row_bytes = image.width() as usize * 4;
    let data = dst.data_mut();
    for row in 0..image.height() as usize {
        let src = &image.data()[row * row_bytes..(row + 1) * row_bytes];
        let start = ((y as usize + row) * dst_width + x as usize) * 4;
        data[start..start + row_bytes].copy_from_slice(src);
    }
}

/// Build the backing pixmap for a pad-sampled pattern.
///
/// No-repeat gets a one pixel transparent margin on every side. Repeat-x
/// lays `tile_count` tiles side by side with a transparent row above and
/// below; repeat-y is the transpose. The pattern origin sits at `(1, 1)`
/// relative to the first tile.
pub(crate) fn build_backing(
    image: &RasterImage,
    repetition: PatternRepetition,
    tile_count: u32,
) -> Option<Pixmap> {
    let (w, h) = (image.width(), image.height());
    match repetition {
        PatternRepetition::NoRepeat => {
            let mut pixmap = Pixmap::new(w + 2, h + 2)?;
            blit(&mut pixmap, image, 1, 1);
            Some(pixmap)
        }
        PatternRepetition::RepeatX => {
            let mut pixmap = Pixmap::new(w * tile_count, h + 2)?;
            for tile in 0..tile_count {
                blit(&mut pixmap, image, tile * w, 1);
            }
            Some(pixmap)
        }
        PatternRepetition::RepeatY => {
            let mut pixmap = Pixmap::new(w + 2, h * tile_count)?;
            for tile in 0..tile_count {
                blit(&mut pixmap, image, 1, tile * h);
            }
            Some(pixmap)
        }
        PatternRepetition::Repeat | PatternRepetition::Mirror | PatternRepetition::Clamp => None,
    }
}
