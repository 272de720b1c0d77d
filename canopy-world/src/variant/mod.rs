use std::{borrow::Cow, collections::BTreeSet, fmt};

use canopy_util::{Axis, BlockFace};

pub mod ageable;
pub mod cave_vine;
pub mod hooks;
pub mod leaf;
pub mod note_block;
pub mod registry;
pub mod sapling;
pub mod wood_log;

pub use ageable::AgeableVariant;
pub use cave_vine::CaveVineVariant;
pub use hooks::{ConfigSource, DefaultKind, IdOverrideHook, NoIdOverride, StatePalette, VariantHooks};
pub use leaf::LeafVariant;
pub use note_block::NoteBlockVariant;
pub use registry::{MapVariantRegistry, VariantRegistry};
pub use sapling::SaplingVariant;
pub use wood_log::LogVariant;

/// Reserved id of "no override", never resolved by a registry.
pub const EMPTY_ID: &str = "empty";

static AIR: Material = Material::AIR;

/// Name of a real block type, such as `minecraft:oak_log`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Material(Cow<'static, str>);

impl Material {
    pub const AIR: Material = Material::from_static("minecraft:air");
    pub const CAVE_VINES: Material = Material::from_static("minecraft:cave_vines");
    pub const CAVE_VINES_PLANT: Material = Material::from_static("minecraft:cave_vines_plant");
    pub const KELP: Material = Material::from_static("minecraft:kelp");
    pub const TWISTING_VINES: Material = Material::from_static("minecraft:twisting_vines");
    pub const WEEPING_VINES: Material = Material::from_static("minecraft:weeping_vines");

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fake state sent to a client in place of the real block.
///
/// The protocol encoding is not our concern, this only carries the global state id
/// and the properties the variants care about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockState {
    pub global_id: i32,
    pub axis: Option<Axis>,
    pub waterlogged: Option<bool>,
    pub berries: Option<bool>,
}

impl BlockState {
    pub const fn by_global_id(global_id: i32) -> Self {
        Self {
            global_id,
            axis: None,
            waterlogged: None,
            berries: None,
        }
    }

    pub const fn with_axis(mut self, axis: Axis) -> Self {
        self.axis = Some(axis);
        self
    }

    pub const fn with_waterlogged(mut self, waterlogged: bool) -> Self {
        self.waterlogged = Some(waterlogged);
        self
    }

    pub const fn with_berries(mut self, berries: bool) -> Self {
        self.berries = Some(berries);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoundBundle {
    pub place: String,
    pub break_sound: String,
    pub step: String,
    pub hit: String,
    pub fall: String,
}

/// Tag stored next to every persisted block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VariantKind {
    Ageable,
    CaveVine,
    Leaf,
    Log,
    NoteBlock,
    Sapling,
}

impl VariantKind {
    pub const ALL: [VariantKind; 6] = [
        VariantKind::Ageable,
        VariantKind::CaveVine,
        VariantKind::Leaf,
        VariantKind::Log,
        VariantKind::NoteBlock,
        VariantKind::Sapling,
    ];

    pub const fn tag(&self) -> &'static str {
        match self {
            VariantKind::Ageable => "ageable",
            VariantKind::CaveVine => "caveVine",
            VariantKind::Leaf => "leaf",
            VariantKind::Log => "log",
            VariantKind::NoteBlock => "noteBlock",
            VariantKind::Sapling => "sapling",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Fields every variant kind carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantBase {
    id: String,
    send_block_id: i32,
    real_material: Material,
    model_path: Option<String>,
    supportable_faces: BTreeSet<BlockFace>,
    sound: Option<SoundBundle>,
}

impl VariantBase {
    /// A base supported from every face, without model or sounds.
    pub fn new(id: impl Into<String>, send_block_id: i32, real_material: Material) -> Self {
        Self {
            id: id.into(),
            send_block_id,
            real_material,
            model_path: None,
            supportable_faces: BlockFace::all().into_iter().collect(),
            sound: None,
        }
    }

    pub fn with_model_path(mut self, model_path: impl Into<String>) -> Self {
        self.model_path = Some(model_path.into());
        self
    }

    pub fn with_supportable_faces(mut self, faces: impl IntoIterator<Item = BlockFace>) -> Self {
        self.supportable_faces = faces.into_iter().collect();
        self
    }

    pub fn with_sound(mut self, sound: SoundBundle) -> Self {
        self.sound = Some(sound);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn send_block_id(&self) -> i32 {
        self.send_block_id
    }

    pub fn real_material(&self) -> &Material {
        &self.real_material
    }

    pub fn model_path(&self) -> Option<&str> {
        self.model_path.as_deref()
    }

    pub fn supportable_faces(&self) -> &BTreeSet<BlockFace> {
        &self.supportable_faces
    }

    pub fn sound(&self) -> Option<&SoundBundle> {
        self.sound.as_ref()
    }
}

/// How a real block should be shown differently to clients.
///
/// Values never change once built, the `with_*` toggles return a new value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockVariant {
    Ageable(AgeableVariant),
    CaveVine(CaveVineVariant),
    Leaf(LeafVariant),
    Log(LogVariant),
    NoteBlock(NoteBlockVariant),
    Sapling(SaplingVariant),
}

impl BlockVariant {
    fn base(&self) -> &VariantBase {
        match self {
            BlockVariant::Ageable(variant) => variant.base(),
            BlockVariant::CaveVine(variant) => variant.base(),
            BlockVariant::Leaf(variant) => variant.base(),
            BlockVariant::Log(variant) => variant.base(),
            BlockVariant::NoteBlock(variant) => variant.base(),
            BlockVariant::Sapling(variant) => variant.base(),
        }
    }

    pub const fn kind(&self) -> VariantKind {
        match self {
            BlockVariant::Ageable(_) => VariantKind::Ageable,
            BlockVariant::CaveVine(_) => VariantKind::CaveVine,
            BlockVariant::Leaf(_) => VariantKind::Leaf,
            BlockVariant::Log(_) => VariantKind::Log,
            BlockVariant::NoteBlock(_) => VariantKind::NoteBlock,
            BlockVariant::Sapling(_) => VariantKind::Sapling,
        }
    }

    /// The id this variant was registered under, used to resolve it again on load.
    pub fn id(&self) -> &str {
        self.base().id()
    }

    /// The id describing the variant in its current toggled state.
    pub fn current_id(&self) -> &str {
        match self {
            BlockVariant::CaveVine(variant) => variant.current_id(),
            BlockVariant::Log(variant) => variant.current_id(),
            _ => self.id(),
        }
    }

    pub fn send_block_id(&self) -> i32 {
        match self {
            BlockVariant::Log(variant) => variant.send_block_id(),
            _ => self.base().send_block_id(),
        }
    }

    pub fn real_material(&self) -> &Material {
        self.base().real_material()
    }

    /// The material the world actually holds at this position.
    pub fn world_material(&self) -> &Material {
        match self {
            BlockVariant::Log(variant) => variant.world_material(),
            _ => self.real_material(),
        }
    }

    pub fn model_path(&self) -> Option<&str> {
        self.base().model_path()
    }

    pub fn supportable_faces(&self) -> &BTreeSet<BlockFace> {
        self.base().supportable_faces()
    }

    /// Whether a neighbour on `face` may hold this block up.
    pub fn can_be_supported_by(&self, face: BlockFace) -> bool {
        self.supportable_faces().contains(&face)
    }

    pub fn sound(&self) -> Option<&SoundBundle> {
        self.base().sound()
    }

    pub fn place_sound(&self) -> Option<&str> {
        match self {
            BlockVariant::Log(_) | BlockVariant::NoteBlock(_) => Some(
                self.sound()
                    .map_or(wood_log::WOOD_PLACE_SOUND, |sound| sound.place.as_str()),
            ),
            _ => self.sound().map(|sound| sound.place.as_str()),
        }
    }

    pub fn break_replacement(&self) -> &Material {
        match self {
            BlockVariant::Ageable(variant) => variant.break_replacement(),
            _ => &AIR,
        }
    }

    pub fn stack_limit(&self) -> Option<u32> {
        match self {
            BlockVariant::Ageable(variant) => Some(variant.stack_limit()),
            BlockVariant::CaveVine(variant) => Some(variant.stack_limit()),
            _ => None,
        }
    }

    /// The fake state to present given what the world holds,
    /// `None` when the real block should be shown as is.
    pub fn new_state(
        &self,
        world_material: Option<&Material>,
        hooks: &VariantHooks,
    ) -> Option<BlockState> {
        match self {
            BlockVariant::Ageable(variant) => variant.new_state(world_material, hooks),
            BlockVariant::CaveVine(variant) => Some(variant.new_state(hooks)),
            BlockVariant::Leaf(variant) => Some(variant.new_state()),
            BlockVariant::Log(variant) => Some(variant.new_state(hooks)),
            BlockVariant::NoteBlock(variant) => Some(variant.new_state(hooks)),
            BlockVariant::Sapling(variant) => Some(variant.new_state()),
        }
    }

    /// Whether the observed real block is already consistent with this variant.
    pub fn is_world_type_same(&self, world_material: &Material, hooks: &VariantHooks) -> bool {
        match self {
            BlockVariant::Ageable(variant) => variant.is_world_type_same(world_material),
            BlockVariant::CaveVine(variant) => variant.is_world_type_same(world_material),
            BlockVariant::Leaf(variant) => variant.is_world_type_same(world_material),
            BlockVariant::Log(variant) => variant.is_world_type_same(world_material, hooks),
            BlockVariant::NoteBlock(variant) => variant.is_world_type_same(world_material, hooks),
            BlockVariant::Sapling(variant) => variant.is_world_type_same(world_material),
        }
    }

    /// `false` exactly when the world already implies this variant.
    pub fn should_save(&self, defaults: &dyn ConfigSource) -> bool {
        match self {
            BlockVariant::Ageable(variant) => variant.should_save(defaults),
            BlockVariant::CaveVine(variant) => variant.should_save(defaults),
            BlockVariant::Leaf(variant) => variant.should_save(defaults),
            BlockVariant::Log(variant) => variant.should_save(defaults),
            BlockVariant::NoteBlock(variant) => variant.should_save(defaults),
            BlockVariant::Sapling(variant) => variant.should_save(defaults),
        }
    }
}

macro_rules! impl_from_variant {
    ($($kind:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for BlockVariant {
                fn from(variant: $ty) -> Self {
                    BlockVariant::$kind(variant)
                }
            }
        )*
    };
}

impl_from_variant! {
    Ageable => AgeableVariant,
    CaveVine => CaveVineVariant,
    Leaf => LeafVariant,
    Log => LogVariant,
    NoteBlock => NoteBlockVariant,
    Sapling => SaplingVariant,
}

/// Whether `id` is the configured default for this material and axis.
fn is_default_id(
    defaults: &dyn ConfigSource,
    kind: DefaultKind,
    material: &Material,
    axis: Option<Axis>,
    id: &str,
) -> bool {
    defaults.default_variant_id(kind, material, axis) == Some(id)
}
