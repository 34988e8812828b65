//! Engine settings and the font set handed to the text shaper.

use crate::image::DEFAULT_IMAGE_CACHE_CAPACITY;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

/// Settings consumed by [`Canvas2dEngine`](crate::Canvas2dEngine) at
/// construction.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Number of decoded images kept in the per-engine cache. Zero is
    /// treated as one.
    pub image_cache_capacity: usize,
    /// External view-scale factor applied on top of the user transform.
    pub view_scale: f64,
    /// Anti-alias path edges.
    pub anti_alias: bool,
    pub font: FontConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            image_cache_capacity: DEFAULT_IMAGE_CACHE_CAPACITY,
            view_scale: 1.0,
            anti_alias: true,
            font: FontConfig::default(),
        }
    }
}

/// A place the shaper loads faces from.
#[derive(Clone, Debug)]
pub enum FontSource {
    /// Every font file under a directory.
    Dir(PathBuf),
    File(PathBuf),
    /// In-memory font data, shared between config clones.
    Data(Arc<Vec<u8>>),
}

/// The CSS generic families a `font` shorthand may name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GenericFamily {
    Serif,
    SansSerif,
    Monospace,
    Cursive,
    Fantasy,
}

impl GenericFamily {
    pub const ALL: [GenericFamily; 5] = [
        GenericFamily::Serif,
        GenericFamily::SansSerif,
        GenericFamily::Monospace,
        GenericFamily::Cursive,
        GenericFamily::Fantasy,
    ];

    /// Match a family name from a font string, ignoring ASCII case.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "serif" => Some(Self::Serif),
            "sans-serif" => Some(Self::SansSerif),
            "monospace" => Some(Self::Monospace),
            "cursive" => Some(Self::Cursive),
            "fantasy" => Some(Self::Fantasy),
            _ => None,
        }
    }

    pub fn family(self) -> fontdb::Family<'static> {
        match self {
            Self::Serif => fontdb::Family::Serif,
            Self::SansSerif => fontdb::Family::SansSerif,
            Self::Monospace => fontdb::Family::Monospace,
            Self::Cursive => fontdb::Family::Cursive,
            Self::Fantasy => fontdb::Family::Fantasy,
        }
    }

    /// Installed families tried, in order, when the config has no override.
    fn fallbacks(self) -> &'static [&'static str] {
        match self {
            Self::Serif => &["Times New Roman", "Times", "Liberation Serif", "DejaVu Serif"],
            Self::SansSerif => &["Arial", "Helvetica", "Liberation Sans", "DejaVu Sans"],
            Self::Monospace => &["Courier New", "Courier", "Liberation Mono", "DejaVu Sans Mono"],
            Self::Cursive => &["Comic Sans MS", "Apple Chancery"],
            Self::Fantasy => &["Impact", "Papyrus"],
        }
    }

    fn bind(self, db: &mut fontdb::Database, name: String) {
        match self {
            Self::Serif => db.set_serif_family(name),
            Self::SansSerif => db.set_sans_serif_family(name),
            Self::Monospace => db.set_monospace_family(name),
            Self::Cursive => db.set_cursive_family(name),
            Self::Fantasy => db.set_fantasy_family(name),
        }
    }
}

/// Where faces come from and how generic families are bound to them.
#[derive(Clone, Debug)]
pub struct FontConfig {
    /// Scan the platform's font directories.
    pub system_fonts: bool,
    pub sources: Vec<FontSource>,
    /// Replacement candidate lists for individual generic families.
    pub family_overrides: HashMap<GenericFamily, Vec<String>>,
    /// Hint glyph outlines.
    pub hinting: bool,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            system_fonts: true,
            sources: Vec::new(),
            family_overrides: HashMap::new(),
            hinting: false,
        }
    }
}

impl FontConfig {
    /// Candidate families for `generic`, highest priority first.
    pub fn candidates(&self, generic: GenericFamily) -> Vec<&str> {
        match self.family_overrides.get(&generic) {
            Some(names) => names.iter().map(String::as_str).collect(),
            None => generic.fallbacks().to_vec(),
        }
    }

    /// Load every source into a font set. The scan is the expensive part;
    /// the result clones cheaply into further engines.
    pub fn load(&self) -> FontSet {
        let mut db = fontdb::Database::new();
        if self.system_fonts {
            db.load_system_fonts();
        }
        for source in &self.sources {
            match source {
                FontSource::Dir(dir) => db.load_fonts_dir(dir),
                FontSource::File(path) => {
                    if let Err(e) = db.load_font_file(path) {
                        log::warn!("failed to load font {}: {}", path.display(), e);
                    }
                }
                FontSource::Data(data) => db.load_font_data(data.as_ref().clone()),
            }
        }

        let installed: HashSet<String> = db
            .faces()
            .flat_map(|face| face.families.iter().map(|(name, _)| name.clone()))
            .collect();
        for generic in GenericFamily::ALL {
            let found = self
                .candidates(generic)
                .into_iter()
                .find(|name| installed.contains(*name));
            if let Some(name) = found {
                generic.bind(&mut db, name.to_string());
            }
        }

        log::debug!(target: "canvas", "loaded {} font faces", db.faces().count());
        FontSet {
            db,
            hinting: self.hinting,
        }
    }
}

/// Loaded faces plus the shaping options that travel with them.
#[derive(Clone)]
pub struct FontSet {
    pub(crate) db: fontdb::Database,
    pub(crate) hinting: bool,
}

impl FontSet {
    pub fn face_count(&self) -> usize {
        self.db.faces().count()
    }
}
