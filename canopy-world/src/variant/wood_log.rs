use canopy_util::Axis;

use super::{is_default_id, BlockState, ConfigSource, DefaultKind, Material, VariantBase, VariantHooks};

pub(crate) const WOOD_PLACE_SOUND: &str = "minecraft:block.wood.place";

/// A log that may be stripped. Stripping swaps the id, the sent state and the real material.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogVariant {
    base: VariantBase,
    stripped_id: String,
    stripped_material: Material,
    stripped_send_block_id: i32,
    stripped: bool,
    axis: Axis,
}

impl LogVariant {
    pub fn new(
        base: VariantBase,
        stripped_id: impl Into<String>,
        stripped_material: Material,
        stripped_send_block_id: i32,
        axis: Axis,
    ) -> Self {
        Self {
            base,
            stripped_id: stripped_id.into(),
            stripped_material,
            stripped_send_block_id,
            stripped: false,
            axis,
        }
    }

    pub(crate) fn base(&self) -> &VariantBase {
        &self.base
    }

    pub fn stripped(&self) -> bool {
        self.stripped
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn stripped_id(&self) -> &str {
        &self.stripped_id
    }

    pub fn stripped_material(&self) -> &Material {
        &self.stripped_material
    }

    pub fn strip(&self) -> Self {
        self.with_stripped(true)
    }

    pub fn with_stripped(&self, stripped: bool) -> Self {
        Self {
            stripped,
            ..self.clone()
        }
    }

    pub fn with_axis(&self, axis: Axis) -> Self {
        Self {
            axis,
            ..self.clone()
        }
    }

    pub fn current_id(&self) -> &str {
        if self.stripped {
            &self.stripped_id
        } else {
            self.base.id()
        }
    }

    pub fn send_block_id(&self) -> i32 {
        if self.stripped {
            self.stripped_send_block_id
        } else {
            self.base.send_block_id()
        }
    }

    pub fn world_material(&self) -> &Material {
        if self.stripped {
            &self.stripped_material
        } else {
            self.base.real_material()
        }
    }

    pub fn new_state(&self, hooks: &VariantHooks) -> BlockState {
        let send_id = hooks
            .remap(self.current_id())
            .unwrap_or_else(|| self.send_block_id());
        BlockState::by_global_id(send_id).with_axis(self.axis)
    }

    pub fn is_world_type_same(&self, world_material: &Material, hooks: &VariantHooks) -> bool {
        let sent_material = hooks.palette().material_of(self.new_state(hooks).global_id);
        sent_material.as_ref() == Some(world_material) || self.world_material() == world_material
    }

    /// Compares the current form against the default of the same form and axis.
    pub fn should_save(&self, defaults: &dyn ConfigSource) -> bool {
        if self.stripped {
            return !self.is_default_stripped(defaults);
        }
        !is_default_id(
            defaults,
            DefaultKind::Log,
            self.base.real_material(),
            Some(self.axis),
            self.base.id(),
        )
    }

    /// Whether the stripped form on its own matches the stripped default.
    pub fn is_default_stripped(&self, defaults: &dyn ConfigSource) -> bool {
        is_default_id(
            defaults,
            DefaultKind::StrippedLog,
            &self.stripped_material,
            Some(self.axis),
            &self.stripped_id,
        )
    }
}
