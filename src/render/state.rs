//! GL state shadowing
//!
//! Caches the GL state the core mutates so redundant binds and attribute
//! toggles are skipped. The drawing visitor owns one of these per frame;
//! it also remembers the last mesh whose streams were bound so a node
//! reusing the same mesh can draw without rebinding anything.

use std::collections::HashMap;

use super::context::{BufferTarget, GlContext, GlId, TextureTarget};

/// Shadow copy of the GL binding state managed by the core.
#[derive(Debug, Default)]
pub struct GlStateCache {
    bound_buffers: HashMap<BufferTarget, GlId>,
    bound_textures: HashMap<TextureTarget, GlId>,
    enabled_attributes: u32,
    last_drawn_mesh: Option<u32>,
}

impl GlStateCache {
    /// Create an empty cache (no bindings assumed).
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `id` to `target` unless it is already bound.
    pub fn bind_buffer(&mut self, ctx: &mut dyn GlContext, target: BufferTarget, id: GlId) {
        if self.bound_buffers.get(&target) != Some(&id) {
            ctx.bind_buffer(target, id);
            self.bound_buffers.insert(target, id);
        }
    }

    /// Bind `id` to `target` unless it is already bound.
    pub fn bind_texture(&mut self, ctx: &mut dyn GlContext, target: TextureTarget, id: GlId) {
        if self.bound_textures.get(&target) != Some(&id) {
            ctx.bind_texture(target, id);
            self.bound_textures.insert(target, id);
        }
    }

    /// Forget the binding for a deleted buffer.
    pub fn forget_buffer(&mut self, id: GlId) {
        self.bound_buffers.retain(|_, bound| *bound != id);
    }

    /// Forget the binding for a deleted texture.
    pub fn forget_texture(&mut self, id: GlId) {
        self.bound_textures.retain(|_, bound| *bound != id);
    }

    /// Enable exactly the attribute slots in `wanted` (a bit per slot),
    /// disabling every other slot currently enabled.
    pub fn set_enabled_attributes(&mut self, ctx: &mut dyn GlContext, wanted: u32) {
        let to_enable = wanted & !self.enabled_attributes;
        let to_disable = self.enabled_attributes & !wanted;
        for slot in 0..32 {
            let bit = 1u32 << slot;
            if to_enable & bit != 0 {
                ctx.enable_vertex_attribute(slot);
            } else if to_disable & bit != 0 {
                ctx.disable_vertex_attribute(slot);
            }
        }
        self.enabled_attributes = wanted;
    }

    /// The mesh tag whose streams are currently bound, if any.
    pub fn last_drawn_mesh(&self) -> Option<u32> {
        self.last_drawn_mesh
    }

    /// Record the mesh whose streams were just bound.
    pub fn set_last_drawn_mesh(&mut self, tag: u32) {
        self.last_drawn_mesh = Some(tag);
    }

    /// Forget the last-drawn mesh (its buffers changed under the binding).
    pub fn invalidate_last_drawn_mesh(&mut self) {
        self.last_drawn_mesh = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::recording::{GlCommand, RecordingContext};

    #[test]
    fn redundant_binds_are_skipped() {
        let mut cache = GlStateCache::new();
        let mut ctx = RecordingContext::new();
        cache.bind_buffer(&mut ctx, BufferTarget::Array, 7);
        cache.bind_buffer(&mut ctx, BufferTarget::Array, 7);
        cache.bind_buffer(&mut ctx, BufferTarget::Array, 8);
        let binds: Vec<_> = ctx
            .commands
            .iter()
            .filter(|c| matches!(c, GlCommand::BindBuffer(..)))
            .collect();
        assert_eq!(binds.len(), 2);
    }

    #[test]
    fn attribute_set_diffs_against_current_state() {
        let mut cache = GlStateCache::new();
        let mut ctx = RecordingContext::new();
        cache.set_enabled_attributes(&mut ctx, 0b0011);
        cache.set_enabled_attributes(&mut ctx, 0b0110);
        // 0 and 1 enabled, then 0 disabled and 2 enabled.
        assert_eq!(
            ctx.commands,
            vec![
                GlCommand::EnableAttribute(0),
                GlCommand::EnableAttribute(1),
                GlCommand::DisableAttribute(0),
                GlCommand::EnableAttribute(2),
            ]
        );
    }
}
