//! Name-keyed texture cache
//!
//! The cache holds textures weakly by default: it never keeps a texture
//! alive on its own, and an entry whose last external owner is dropped
//! simply stops resolving. While preloading mode is on, additions are
//! held strongly until removed, so assets loaded up front survive
//! until the scene takes ownership.

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use super::{Texture, TextureError, TextureKind, TextureRef};

#[derive(Debug)]
struct CacheEntry {
    weak: Weak<std::cell::RefCell<Texture>>,
    strong: Option<TextureRef>,
    kind: TextureKind,
}

/// The scene-wide texture cache, keyed by texture name.
#[derive(Debug, Default)]
pub struct TextureCache {
    entries: HashMap<String, CacheEntry>,
    preloading: bool,
}

impl TextureCache {
    /// Create an empty cache in weak mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether additions are currently held strongly.
    pub fn is_preloading(&self) -> bool {
        self.preloading
    }

    /// Switch preloading mode. Textures added while preloading stay
    /// strongly held until removed, regardless of later mode changes.
    pub fn set_preloading(&mut self, preloading: bool) {
        self.preloading = preloading;
    }

    /// Add a texture under its name.
    ///
    /// Unnamed textures are not cached (callers own them directly).
    /// Inserting a second live texture under an existing name is an
    /// error; a dead weak entry under the same name is replaced.
    pub fn add(&mut self, texture: &TextureRef) -> Result<(), TextureError> {
        let Some(name) = texture.borrow().identity.name.clone() else {
            return Ok(());
        };
        if let Some(existing) = self.entries.get(&name) {
            if existing.weak.upgrade().is_some() {
                return Err(TextureError::DuplicateName(name));
            }
        }
        let kind = texture.borrow().kind();
        log::debug!("caching texture {name:?} ({})", if self.preloading { "strong" } else { "weak" });
        self.entries.insert(
            name,
            CacheEntry {
                weak: Rc::downgrade(texture),
                strong: self.preloading.then(|| Rc::clone(texture)),
                kind,
            },
        );
        Ok(())
    }

    /// Look up a live texture by name.
    pub fn texture_named(&self, name: &str) -> Option<TextureRef> {
        self.entries.get(name).and_then(|e| e.weak.upgrade())
    }

    /// Remove the entry under `name`, dropping any strong hold.
    pub fn remove_texture_named(&mut self, name: &str) -> Option<TextureRef> {
        self.entries.remove(name).and_then(|e| e.weak.upgrade())
    }

    /// Remove every entry.
    pub fn remove_all(&mut self) {
        self.entries.clear();
    }

    /// Remove every entry of the given kind, leaving the rest cached.
    pub fn remove_all_of_kind(&mut self, kind: TextureKind) {
        self.entries.retain(|_, e| e.kind != kind);
    }

    /// Number of entries, counting dead weak entries until purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries whose textures are no longer alive.
    pub fn purge_dead_entries(&mut self) {
        self.entries
            .retain(|_, e| e.strong.is_some() || e.weak.upgrade().is_some());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{GlStateCache, RecordingContext};
    use crate::settings::SceneSettings;
    use std::cell::RefCell;

    fn make_texture(name: &str) -> TextureRef {
        let mut ctx = RecordingContext::new();
        let mut state = GlStateCache::new();
        let settings = SceneSettings::default();
        let rgba = vec![0u8; 4 * 4 * 4];
        Rc::new(RefCell::new(
            Texture::from_rgba8(&mut ctx, &mut state, &settings, name, 4, 4, rgba).unwrap(),
        ))
    }

    #[test]
    fn weak_entry_dies_with_last_owner() {
        let mut cache = TextureCache::new();
        let tex = make_texture("brick");
        cache.add(&tex).unwrap();
        assert!(cache.texture_named("brick").is_some());
        drop(tex);
        assert!(cache.texture_named("brick").is_none());
    }

    #[test]
    fn preloading_holds_strongly_until_removed() {
        let mut cache = TextureCache::new();
        cache.set_preloading(true);
        let tex = make_texture("sky");
        cache.add(&tex).unwrap();
        cache.set_preloading(false);
        drop(tex);
        assert!(cache.texture_named("sky").is_some());
        cache.remove_texture_named("sky");
        assert!(cache.texture_named("sky").is_none());
    }

    #[test]
    fn duplicate_live_name_is_rejected() {
        let mut cache = TextureCache::new();
        let tex = make_texture("grass");
        cache.add(&tex).unwrap();
        let other = make_texture("grass");
        assert!(matches!(
            cache.add(&other),
            Err(TextureError::DuplicateName(_))
        ));
        // A dead entry under the same name is replaceable.
        drop(tex);
        assert!(cache.add(&other).is_ok());
    }

    #[test]
    fn removal_by_kind_spares_other_kinds() {
        let mut cache = TextureCache::new();
        cache.set_preloading(true);
        let tex = make_texture("flat");
        cache.add(&tex).unwrap();
        cache.remove_all_of_kind(TextureKind::Cube);
        assert!(cache.texture_named("flat").is_some());
        cache.remove_all_of_kind(TextureKind::TwoD);
        assert!(cache.texture_named("flat").is_none());
    }
}
