//! Light node content
//!
//! Lights have no drawable geometry; their contribution is looked up by
//! materials and by the bump-map tracking hook, which feeds a tracked
//! light's global location into a mesh uniform.

use crate::foundation::math::Vec4;

/// Whether the light illuminates from a point or a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightKind {
    /// Illuminates from the node's location
    #[default]
    Positional,
    /// Illuminates along the node's forward direction, from infinity
    Directional,
}

/// Light parameters carried by a light node.
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    /// Point or directional
    pub kind: LightKind,
    /// Ambient contribution
    pub ambient: Vec4,
    /// Diffuse contribution
    pub diffuse: Vec4,
    /// Specular contribution
    pub specular: Vec4,
    /// Constant, linear, and quadratic attenuation coefficients
    pub attenuation: (f32, f32, f32),
}

impl Default for Light {
    fn default() -> Self {
        Self {
            kind: LightKind::default(),
            ambient: Vec4::new(0.0, 0.0, 0.0, 1.0),
            diffuse: Vec4::new(1.0, 1.0, 1.0, 1.0),
            specular: Vec4::new(1.0, 1.0, 1.0, 1.0),
            attenuation: (1.0, 0.0, 0.0),
        }
    }
}

impl Light {
    /// Attenuation factor at `distance` from the light. Directional
    /// lights do not attenuate.
    pub fn attenuation_at(&self, distance: f32) -> f32 {
        match self.kind {
            LightKind::Directional => 1.0,
            LightKind::Positional => {
                let (c, l, q) = self.attenuation;
                let denom = c + l * distance + q * distance * distance;
                if denom > 0.0 {
                    (1.0 / denom).min(1.0)
                } else {
                    1.0
                }
            }
        }
    }
}
