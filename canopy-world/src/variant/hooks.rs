use std::sync::Arc;

use canopy_config::DefaultVariantsConfig;
use canopy_util::Axis;

use super::Material;

/// Runtime remap of a variant id to a fake-state id, lets compatibility shims
/// change what is sent without touching stored data.
pub trait IdOverrideHook: Send + Sync {
    fn remap(&self, variant_id: &str) -> Option<i32>;
}

pub struct NoIdOverride;

impl IdOverrideHook for NoIdOverride {
    fn remap(&self, _variant_id: &str) -> Option<i32> {
        None
    }
}

/// Which default table to consult.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DefaultKind {
    Ageable,
    CaveVine,
    Leaf,
    Log,
    StrippedLog,
    NoteBlock,
    Sapling,
}

/// Tells which variant id a material shows when nothing overrides it.
pub trait ConfigSource: Send + Sync {
    fn default_variant_id(
        &self,
        kind: DefaultKind,
        material: &Material,
        axis: Option<Axis>,
    ) -> Option<&str>;
}

impl ConfigSource for DefaultVariantsConfig {
    fn default_variant_id(
        &self,
        kind: DefaultKind,
        material: &Material,
        axis: Option<Axis>,
    ) -> Option<&str> {
        let name = material.name();
        match kind {
            DefaultKind::Ageable => self.ageable.get(name).map(String::as_str),
            DefaultKind::CaveVine => self.cave_vine.get(name).map(String::as_str),
            DefaultKind::Leaf => self.leaf.get(name).map(String::as_str),
            DefaultKind::NoteBlock => self.note_block.get(name).map(String::as_str),
            DefaultKind::Sapling => self.sapling.get(name).map(String::as_str),
            DefaultKind::Log => axis.and_then(|axis| self.log_id(name, axis)),
            DefaultKind::StrippedLog => axis.and_then(|axis| self.stripped_log_id(name, axis)),
        }
    }
}

/// Lookups into the game's block-state registry.
pub trait StatePalette: Send + Sync {
    /// Material rendered by a global state id.
    fn material_of(&self, global_id: i32) -> Option<Material>;

    /// Global id of the material's default state.
    fn default_state_of(&self, material: &Material) -> Option<i32>;

    /// Age property of a state, if it has one.
    fn age_of(&self, global_id: i32) -> Option<u8>;
}

/// The external capabilities variants need, bundled so they can be injected once.
#[derive(Clone)]
pub struct VariantHooks {
    id_override: Arc<dyn IdOverrideHook>,
    defaults: Arc<dyn ConfigSource>,
    palette: Arc<dyn StatePalette>,
}

impl VariantHooks {
    pub fn new(defaults: Arc<dyn ConfigSource>, palette: Arc<dyn StatePalette>) -> Self {
        Self {
            id_override: Arc::new(NoIdOverride),
            defaults,
            palette,
        }
    }

    pub fn with_id_override(mut self, id_override: Arc<dyn IdOverrideHook>) -> Self {
        self.id_override = id_override;
        self
    }

    pub fn remap(&self, variant_id: &str) -> Option<i32> {
        self.id_override.remap(variant_id)
    }

    pub fn defaults(&self) -> &dyn ConfigSource {
        self.defaults.as_ref()
    }

    pub fn palette(&self) -> &dyn StatePalette {
        self.palette.as_ref()
    }
}
