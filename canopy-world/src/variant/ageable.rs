use std::collections::BTreeSet;

use super::{is_default_id, BlockState, ConfigSource, DefaultKind, Material, VariantBase, VariantHooks};

/// Column plants whose top block renders the tipped state.
const TIP_MATERIALS: [Material; 4] = [
    Material::CAVE_VINES,
    Material::KELP,
    Material::TWISTING_VINES,
    Material::WEEPING_VINES,
];

/// Stackable plants such as sugar cane or kelp.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgeableVariant {
    base: VariantBase,
    tipped_send_block_id: i32,
    default_lower_material: Material,
    stack_limit: u32,
    break_replacement: Material,
    same_world_materials: BTreeSet<Material>,
}

impl AgeableVariant {
    pub fn new(
        base: VariantBase,
        tipped_send_block_id: i32,
        default_lower_material: Material,
        stack_limit: u32,
        break_replacement: Material,
        same_world_materials: impl IntoIterator<Item = Material>,
    ) -> Self {
        Self {
            base,
            tipped_send_block_id,
            default_lower_material,
            stack_limit,
            break_replacement,
            same_world_materials: same_world_materials.into_iter().collect(),
        }
    }

    pub(crate) fn base(&self) -> &VariantBase {
        &self.base
    }

    pub fn tipped_send_block_id(&self) -> i32 {
        self.tipped_send_block_id
    }

    pub fn default_lower_material(&self) -> &Material {
        &self.default_lower_material
    }

    pub fn stack_limit(&self) -> u32 {
        self.stack_limit
    }

    pub fn break_replacement(&self) -> &Material {
        &self.break_replacement
    }

    /// Age of the sent state.
    pub fn age(&self, hooks: &VariantHooks) -> Option<u8> {
        hooks.palette().age_of(self.base.send_block_id())
    }

    fn is_default(&self, defaults: &dyn ConfigSource) -> bool {
        is_default_id(
            defaults,
            DefaultKind::Ageable,
            self.base.real_material(),
            None,
            self.base.id(),
        )
    }

    pub fn new_state(
        &self,
        world_material: Option<&Material>,
        hooks: &VariantHooks,
    ) -> Option<BlockState> {
        match world_material {
            Some(material)
                if *material == self.default_lower_material && self.is_default(hooks.defaults()) =>
            {
                hooks
                    .palette()
                    .default_state_of(&self.default_lower_material)
                    .map(BlockState::by_global_id)
            }
            Some(material) if TIP_MATERIALS.contains(material) => {
                Some(BlockState::by_global_id(self.tipped_send_block_id))
            }
            _ => Some(BlockState::by_global_id(self.base.send_block_id())),
        }
    }

    pub fn is_world_type_same(&self, world_material: &Material) -> bool {
        self.same_world_materials.contains(world_material)
    }

    pub fn should_save(&self, defaults: &dyn ConfigSource) -> bool {
        !self.is_default(defaults)
    }
}
