use super::{is_default_id, BlockState, ConfigSource, DefaultKind, Material, VariantBase, VariantHooks};

/// A note block with one fixed state. Like a log without axis or stripping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoteBlockVariant {
    base: VariantBase,
}

impl NoteBlockVariant {
    pub fn new(base: VariantBase) -> Self {
        Self { base }
    }

    pub(crate) fn base(&self) -> &VariantBase {
        &self.base
    }

    pub fn new_state(&self, hooks: &VariantHooks) -> BlockState {
        let send_id = hooks
            .remap(self.base.id())
            .unwrap_or_else(|| self.base.send_block_id());
        BlockState::by_global_id(send_id)
    }

    pub fn is_world_type_same(&self, world_material: &Material, hooks: &VariantHooks) -> bool {
        let sent_material = hooks.palette().material_of(self.new_state(hooks).global_id);
        sent_material.as_ref() == Some(world_material) || self.base.real_material() == world_material
    }

    pub fn should_save(&self, defaults: &dyn ConfigSource) -> bool {
        !is_default_id(
            defaults,
            DefaultKind::NoteBlock,
            self.base.real_material(),
            None,
            self.base.id(),
        )
    }
}
