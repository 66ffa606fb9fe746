use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Cell height of the atlas, in pixels.
pub const GLYPH_SIZE: u32 = 32;
const ATLAS_COLUMNS: u32 = 16;

/// Where one character lives in the atlas, and how far it advances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Horizontal advance in units of the line height.
    pub advance: f32,
}

/// Grid layout of every character in a charset. Hosts rasterize into it;
/// commands use it to measure text.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphAtlas {
    key: String,
    glyphs: HashMap<char, GlyphRect>,
    width: u32,
    height: u32,
}

/// Advance of `c` relative to the line height. A coarse proportional model:
/// narrow punctuation, wide capitals, everything else average.
fn advance_of(c: char) -> f32 {
    match c {
        ' ' => 0.3,
        'i' | 'l' | 'j' | '.' | ',' | ':' | ';' | '!' | '|' | '\'' => 0.3,
        'm' | 'w' | 'M' | 'W' => 0.85,
        c if c.is_uppercase() => 0.65,
        c if c.is_ascii_digit() => 0.55,
        _ => 0.55,
    }
}

impl GlyphAtlas {
    fn build(key: String, chars: &BTreeSet<char>) -> Self {
        let mut glyphs = HashMap::with_capacity(chars.len());
        for (i, c) in chars.iter().enumerate() {
            let i = i as u32;
            glyphs.insert(
                *c,
                GlyphRect {
                    x: (i % ATLAS_COLUMNS) * GLYPH_SIZE,
                    y: (i / ATLAS_COLUMNS) * GLYPH_SIZE,
                    width: (advance_of(*c) * GLYPH_SIZE as f32).ceil() as u32,
                    height: GLYPH_SIZE,
                    advance: advance_of(*c),
                },
            );
        }
        let rows = (chars.len() as u32).div_ceil(ATLAS_COLUMNS).max(1);
        Self {
            key,
            glyphs,
            width: ATLAS_COLUMNS * GLYPH_SIZE,
            height: rows * GLYPH_SIZE,
        }
    }

    /// Hex SHA-256 of the sorted charset.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn glyph(&self, c: char) -> Option<&GlyphRect> {
        self.glyphs.get(&c)
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Width and height of `text` for a line height of 1. Lines split on
    /// `\n`; unknown characters measure as average glyphs.
    pub fn measure(&self, text: &str) -> (f32, f32) {
        let mut width: f32 = 0.0;
        let mut lines = 0;
        for line in text.split('\n') {
            lines += 1;
            let w: f32 = line
                .chars()
                .map(|c| self.glyph(c).map_or(advance_of(c), |g| g.advance))
                .sum();
            width = width.max(w);
        }
        (width, lines as f32)
    }
}

fn charset_key(chars: &BTreeSet<char>) -> String {
    let mut hasher = Sha256::new();
    for c in chars {
        let mut buf = [0u8; 4];
        hasher.update(c.encode_utf8(&mut buf).as_bytes());
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Holds the atlas for the most recent charset and rebuilds it only when
/// the set of characters changes.
#[derive(Debug, Default)]
pub struct GlyphAtlasCache {
    atlas: Option<Arc<GlyphAtlas>>,
    builds: u64,
}

impl GlyphAtlasCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atlas covering every character of `texts`.
    pub fn atlas_for<'a>(&mut self, texts: impl IntoIterator<Item = &'a str>) -> Arc<GlyphAtlas> {
        let chars: BTreeSet<char> = texts
            .into_iter()
            .flat_map(str::chars)
            .filter(|c| *c != '\n')
            .collect();
        let key = charset_key(&chars);
        if let Some(atlas) = &self.atlas {
            if atlas.key == key {
                return atlas.clone();
            }
        }
        debug!(chars = chars.len(), key = %&key[..12], "building glyph atlas");
        let atlas = Arc::new(GlyphAtlas::build(key, &chars));
        self.atlas = Some(atlas.clone());
        self.builds += 1;
        atlas
    }

    /// Number of atlases built so far.
    pub fn builds(&self) -> u64 {
        self.builds
    }

    pub fn clear(&mut self) {
        self.atlas = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_charset_reuses_atlas() {
        let mut cache = GlyphAtlasCache::new();
        let a = cache.atlas_for(["hello"]);
        let b = cache.atlas_for(["olleh", "hel"]);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.builds(), 1);
        assert_eq!(a.len(), 4);
    }

    #[test]
    fn new_character_rebuilds() {
        let mut cache = GlyphAtlasCache::new();
        let a = cache.atlas_for(["abc"]);
        let b = cache.atlas_for(["abcd"]);
        assert_ne!(a.key(), b.key());
        assert_eq!(cache.builds(), 2);
        assert!(b.glyph('d').is_some());
    }

    #[test]
    fn glyphs_do_not_overlap() {
        let mut cache = GlyphAtlasCache::new();
        let text: String = ('a'..='z').chain('A'..='Z').collect();
        let atlas = cache.atlas_for([text.as_str()]);
        let mut cells: Vec<(u32, u32)> = ('a'..='z')
            .chain('A'..='Z')
            .map(|c| {
                let g = atlas.glyph(c).unwrap();
                (g.x, g.y)
            })
            .collect();
        cells.sort();
        cells.dedup();
        assert_eq!(cells.len(), 52);
        assert_eq!(atlas.size(), (16 * GLYPH_SIZE, 4 * GLYPH_SIZE));
    }

    #[test]
    fn measures_multiline_text() {
        let mut cache = GlyphAtlasCache::new();
        let atlas = cache.atlas_for(["ab\nc"]);
        let (w, h) = atlas.measure("ab\nc");
        assert!((w - 1.1).abs() < 1e-5);
        assert_eq!(h, 2.0);
    }

    #[test]
    fn empty_charset_has_one_row() {
        let mut cache = GlyphAtlasCache::new();
        let atlas = cache.atlas_for(std::iter::empty());
        assert!(atlas.is_empty());
        assert_eq!(atlas.size().1, GLYPH_SIZE);
    }
}
