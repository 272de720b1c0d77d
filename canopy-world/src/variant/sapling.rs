use super::{is_default_id, BlockState, ConfigSource, DefaultKind, Material, VariantBase};

/// A sapling growing into one of its schematics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaplingVariant {
    base: VariantBase,
    schematic_files: Vec<String>,
    random_paste_rotation: bool,
}

impl SaplingVariant {
    pub fn new(base: VariantBase, schematic_files: Vec<String>, random_paste_rotation: bool) -> Self {
        Self {
            base,
            schematic_files,
            random_paste_rotation,
        }
    }

    pub(crate) fn base(&self) -> &VariantBase {
        &self.base
    }

    pub fn schematic_files(&self) -> &[String] {
        &self.schematic_files
    }

    pub fn random_paste_rotation(&self) -> bool {
        self.random_paste_rotation
    }

    pub fn new_state(&self) -> BlockState {
        BlockState::by_global_id(self.base.send_block_id())
    }

    pub fn is_world_type_same(&self, world_material: &Material) -> bool {
        self.base.real_material() == world_material
    }

    pub fn should_save(&self, defaults: &dyn ConfigSource) -> bool {
        !is_default_id(
            defaults,
            DefaultKind::Sapling,
            self.base.real_material(),
            None,
            self.base.id(),
        )
    }
}
