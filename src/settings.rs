//! Scene configuration surface
//!
//! Replaces the original class-side defaults (`shouldGenerateMipmaps`,
//! `capacityExpansionFactor`, ...) with an explicit settings value owned
//! by the scene and passed by reference into loaders and visitors.
//! Loadable from TOML so an application can ship a settings file next to
//! its assets.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Settings-file errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file could not be parsed
    #[error("failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// The enumerated configuration surface of the scene-graph core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    /// Generate mipmaps after loading power-of-two textures.
    pub generate_mipmaps: bool,

    /// Hold newly loaded textures strongly until preloading ends.
    pub cache_textures_while_preloading: bool,

    /// Default vertical flip on load for 2D textures.
    pub flip_2d_vertically_on_load: bool,

    /// Default horizontal flip on load for 2D textures.
    pub flip_2d_horizontally_on_load: bool,

    /// Default vertical flip on load for cube textures.
    pub flip_cube_vertically_on_load: bool,

    /// Default horizontal flip on load for cube textures.
    pub flip_cube_horizontally_on_load: bool,

    /// Stop and release a node's actions when it is removed.
    pub stop_actions_when_removed: bool,

    /// Growth factor applied when a mesh must expand vertex capacity.
    pub capacity_expansion_factor: f32,

    /// Re-sort the drawing order every frame. When false, the
    /// application calls `check_drawing_order` on nodes it has mutated.
    pub allow_sequence_updates: bool,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            generate_mipmaps: true,
            cache_textures_while_preloading: false,
            flip_2d_vertically_on_load: true,
            flip_2d_horizontally_on_load: false,
            flip_cube_vertically_on_load: false,
            flip_cube_horizontally_on_load: true,
            stop_actions_when_removed: true,
            capacity_expansion_factor: 1.25,
            allow_sequence_updates: true,
        }
    }
}

impl SceneSettings {
    /// Load settings from a TOML file. Missing keys take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let settings = toml::from_str(&text)?;
        log::info!("Loaded scene settings from {:?}", path.as_ref());
        Ok(settings)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = SceneSettings::default();
        assert!(s.generate_mipmaps);
        assert!(!s.cache_textures_while_preloading);
        assert!(s.flip_2d_vertically_on_load);
        assert!(!s.flip_2d_horizontally_on_load);
        assert!(!s.flip_cube_vertically_on_load);
        assert!(s.flip_cube_horizontally_on_load);
        assert!(s.stop_actions_when_removed);
        assert!((s.capacity_expansion_factor - 1.25).abs() < f32::EPSILON);
        assert!(s.allow_sequence_updates);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let s: SceneSettings = toml::from_str("capacity_expansion_factor = 2.0").unwrap();
        assert!((s.capacity_expansion_factor - 2.0).abs() < f32::EPSILON);
        assert!(s.generate_mipmaps);
    }

    #[test]
    fn round_trips_through_toml() {
        let s = SceneSettings::default();
        let back: SceneSettings = toml::from_str(&s.to_toml()).unwrap();
        assert_eq!(s, back);
    }
}
