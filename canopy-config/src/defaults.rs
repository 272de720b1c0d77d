use std::collections::BTreeMap;

use canopy_util::Axis;
use serde::{Deserialize, Serialize};

/// The variant id a material shows when nobody overrode it.
///
/// Blocks whose variant matches these ids are never written to storage,
/// the world itself already describes them.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(default)]
pub struct DefaultVariantsConfig {
    pub ageable: BTreeMap<String, String>,
    pub leaf: BTreeMap<String, String>,
    pub note_block: BTreeMap<String, String>,
    pub cave_vine: BTreeMap<String, String>,
    pub sapling: BTreeMap<String, String>,
    pub log: BTreeMap<String, AxisIds>,
    pub stripped_log: BTreeMap<String, AxisIds>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AxisIds {
    pub x: Option<String>,
    pub y: Option<String>,
    pub z: Option<String>,
}

impl AxisIds {
    pub fn get(&self, axis: Axis) -> Option<&str> {
        match axis {
            Axis::X => self.x.as_deref(),
            Axis::Y => self.y.as_deref(),
            Axis::Z => self.z.as_deref(),
        }
    }

    pub fn set(&mut self, axis: Axis, id: impl Into<String>) {
        let id = Some(id.into());
        match axis {
            Axis::X => self.x = id,
            Axis::Y => self.y = id,
            Axis::Z => self.z = id,
        }
    }
}

impl DefaultVariantsConfig {
    pub fn log_id(&self, material: &str, axis: Axis) -> Option<&str> {
        self.log.get(material).and_then(|ids| ids.get(axis))
    }

    pub fn stripped_log_id(&self, material: &str, axis: Axis) -> Option<&str> {
        self.stripped_log.get(material).and_then(|ids| ids.get(axis))
    }
}
