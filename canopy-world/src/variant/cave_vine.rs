use super::{is_default_id, BlockState, ConfigSource, DefaultKind, Material, VariantBase, VariantHooks};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaveVineVariant {
    base: VariantBase,
    with_glow_berry_id: String,
    stack_limit: u32,
    glow_berry: bool,
}

impl CaveVineVariant {
    pub fn new(base: VariantBase, with_glow_berry_id: impl Into<String>, stack_limit: u32) -> Self {
        Self {
            base,
            with_glow_berry_id: with_glow_berry_id.into(),
            stack_limit,
            glow_berry: false,
        }
    }

    pub(crate) fn base(&self) -> &VariantBase {
        &self.base
    }

    pub fn glow_berry(&self) -> bool {
        self.glow_berry
    }

    pub fn stack_limit(&self) -> u32 {
        self.stack_limit
    }

    pub fn with_glow_berry(&self, glow_berry: bool) -> Self {
        Self {
            glow_berry,
            ..self.clone()
        }
    }

    pub fn current_id(&self) -> &str {
        if self.glow_berry {
            &self.with_glow_berry_id
        } else {
            self.base.id()
        }
    }

    pub fn new_state(&self, hooks: &VariantHooks) -> BlockState {
        let send_id = hooks
            .remap(self.current_id())
            .unwrap_or_else(|| self.base.send_block_id());
        BlockState::by_global_id(send_id).with_berries(self.glow_berry)
    }

    pub fn is_world_type_same(&self, world_material: &Material) -> bool {
        *world_material == Material::CAVE_VINES || *world_material == Material::CAVE_VINES_PLANT
    }

    /// Vines carrying berries are always stored, the world default is the bare vine.
    pub fn should_save(&self, defaults: &dyn ConfigSource) -> bool {
        self.glow_berry
            || !is_default_id(
                defaults,
                DefaultKind::CaveVine,
                self.base.real_material(),
                None,
                self.base.id(),
            )
    }
}
