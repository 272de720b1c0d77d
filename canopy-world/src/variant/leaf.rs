use super::{is_default_id, BlockState, ConfigSource, DefaultKind, Material, VariantBase};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafVariant {
    base: VariantBase,
    display_distance: u8,
    display_persistence: bool,
    world_persistence: bool,
    waterlogged: bool,
}

impl LeafVariant {
    pub fn new(
        base: VariantBase,
        display_distance: u8,
        display_persistence: bool,
        world_persistence: bool,
    ) -> Self {
        Self {
            base,
            display_distance,
            display_persistence,
            world_persistence,
            waterlogged: false,
        }
    }

    pub(crate) fn base(&self) -> &VariantBase {
        &self.base
    }

    pub fn display_distance(&self) -> u8 {
        self.display_distance
    }

    pub fn display_persistence(&self) -> bool {
        self.display_persistence
    }

    pub fn world_persistence(&self) -> bool {
        self.world_persistence
    }

    pub fn waterlogged(&self) -> bool {
        self.waterlogged
    }

    pub fn with_waterlogged(&self, waterlogged: bool) -> Self {
        Self {
            waterlogged,
            ..self.clone()
        }
    }

    pub fn new_state(&self) -> BlockState {
        BlockState::by_global_id(self.base.send_block_id()).with_waterlogged(self.waterlogged)
    }

    pub fn is_world_type_same(&self, world_material: &Material) -> bool {
        self.base.real_material() == world_material
    }

    /// Waterlogged leaves are always stored, the world default is the dry leaf.
    pub fn should_save(&self, defaults: &dyn ConfigSource) -> bool {
        self.waterlogged
            || !is_default_id(
                defaults,
                DefaultKind::Leaf,
                self.base.real_material(),
                None,
                self.base.id(),
            )
    }
}
