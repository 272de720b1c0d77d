use std::collections::HashMap;

use super::{BlockVariant, VariantKind, EMPTY_ID};

/// Builds the base variant a persisted block refers to.
///
/// Stored toggles (stripped, waterlogged, glow berry) are applied by the caller.
pub trait VariantRegistry: Send + Sync {
    fn resolve(&self, kind: VariantKind, id: &str) -> Option<BlockVariant>;
}

/// A registry backed by a plain map of id to variant.
#[derive(Default, Clone, Debug)]
pub struct MapVariantRegistry {
    variants: HashMap<String, BlockVariant>,
}

impl MapVariantRegistry {
    /// Registers the variant under its id, replacing any previous one.
    pub fn register(&mut self, variant: BlockVariant) -> Option<BlockVariant> {
        if variant.id() == EMPTY_ID {
            log::warn!("Refusing to register a variant under the reserved id {EMPTY_ID}");
            return None;
        }
        self.variants.insert(variant.id().to_string(), variant)
    }

    pub fn get(&self, id: &str) -> Option<&BlockVariant> {
        self.variants.get(id)
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

impl VariantRegistry for MapVariantRegistry {
    fn resolve(&self, kind: VariantKind, id: &str) -> Option<BlockVariant> {
        self.variants
            .get(id)
            .filter(|variant| variant.kind() == kind)
            .cloned()
    }
}

#[cfg(test)]
mod test {
    use super::{MapVariantRegistry, VariantRegistry};
    use crate::variant::{
        test_support::{oak_leaves, registry},
        VariantKind,
    };

    #[test]
    fn resolve_checks_kind() {
        let registry = registry();
        assert!(registry.resolve(VariantKind::Log, "mossy_oak_log").is_some());
        assert!(registry.resolve(VariantKind::Leaf, "mossy_oak_log").is_none());
        assert!(registry.resolve(VariantKind::Leaf, "unknown").is_none());
    }

    #[test]
    fn empty_id_is_reserved() {
        let mut registry = MapVariantRegistry::default();
        assert!(registry.register(oak_leaves("empty").into()).is_none());
        assert!(registry.is_empty());
    }
}
