//! Synchronized registries.
//!
//! Servers leave out the payload of entries that come from a pack both
//! sides know. Those payloads are filled in from a snapshot of the vanilla
//! core pack bundled with the binary.

use std::collections::HashMap;
use std::io::Read;
use std::sync::OnceLock;

use flate2::read::GzDecoder;
use serde::Deserialize;
use tracing::{debug, error};

use mc_swarm_nbt::{NbtCompound, NbtTag};
use mc_swarm_proto::packets::common::KnownPack;
use mc_swarm_proto::packets::configuration::{RegistryData, RegistryEntry};
use mc_swarm_proto::types::Identifier;
use mc_swarm_world::{DimensionType, TagsState, WorldError};

use crate::error::BotError;

pub const DIMENSION_TYPE: &str = "dimension_type";
pub const BIOME: &str = "worldgen/biome";

const SNAPSHOT_GZ: &[u8] = include_bytes!("../resources/known_packs.json.gz");

static SNAPSHOT: OnceLock<KnownPackSnapshot> = OnceLock::new();

#[derive(Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    registries: HashMap<Identifier, HashMap<Identifier, serde_json::Value>>,
    #[serde(default)]
    tags: HashMap<Identifier, HashMap<Identifier, Vec<i32>>>,
}

/// Registry payloads and default tags of the vanilla core pack.
#[derive(Debug, Default)]
pub struct KnownPackSnapshot {
    registries: HashMap<Identifier, HashMap<Identifier, NbtTag>>,
    tags: HashMap<Identifier, HashMap<Identifier, Vec<i32>>>,
}

impl KnownPackSnapshot {
    /// The bundled snapshot, decoded on first use. A broken resource is
    /// logged once and treated as empty.
    pub fn bundled() -> &'static Self {
        SNAPSHOT.get_or_init(|| match Self::decode(SNAPSHOT_GZ) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Failed to load bundled registry snapshot: {e}");
                Self::default()
            }
        })
    }

    /// Decode gzip-compressed snapshot JSON.
    pub fn decode(gz: &[u8]) -> Result<Self, BotError> {
        let mut json = String::new();
        GzDecoder::new(gz).read_to_string(&mut json)?;
        let raw: RawSnapshot = serde_json::from_str(&json)?;
        let registries = raw
            .registries
            .into_iter()
            .map(|(registry, entries)| {
                let entries = entries
                    .into_iter()
                    .map(|(id, value)| (id, json_to_nbt(&value)))
                    .collect();
                (registry, entries)
            })
            .collect();
        Ok(Self {
            registries,
            tags: raw.tags,
        })
    }

    pub fn entry(&self, registry: &Identifier, id: &Identifier) -> Option<&NbtTag> {
        self.registries.get(registry)?.get(id)
    }

    pub fn entry_count(&self, registry: &Identifier) -> usize {
        self.registries.get(registry).map_or(0, HashMap::len)
    }

    /// Tags in effect before the server sends its own.
    pub fn default_tags(&self) -> TagsState {
        let mut tags = TagsState::new();
        for (registry, entries) in &self.tags {
            for (tag, ids) in entries {
                tags.set_tag(registry.clone(), tag.clone(), ids.clone());
            }
        }
        tags
    }

    /// Whether the snapshot can stand in for `pack`.
    pub fn covers(&self, pack: &KnownPack) -> bool {
        *pack == KnownPack::core()
    }
}

/// JSON to NBT the way vanilla's JSON ops map values: integers become ints
/// (longs when they do not fit), other numbers doubles, booleans bytes.
pub fn json_to_nbt(value: &serde_json::Value) -> NbtTag {
    use serde_json::Value;
    match value {
        Value::Null => NbtTag::Byte(0),
        Value::Bool(b) => NbtTag::Byte(i8::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i32::try_from(i).map_or(NbtTag::Long(i), NbtTag::Int),
            None => NbtTag::Double(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => NbtTag::String(s.clone()),
        Value::Array(items) => NbtTag::List(items.iter().map(json_to_nbt).collect()),
        Value::Object(map) => NbtTag::Compound(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_nbt(v)))
                .collect::<NbtCompound>(),
        ),
    }
}

/// Registries in the order the server sent them. Network ids are indexes.
#[derive(Debug, Default)]
pub struct RegistryStore {
    registries: HashMap<Identifier, Vec<RegistryEntry>>,
}

impl RegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a registry with the received entries.
    pub fn handle_registry_data(&mut self, packet: RegistryData, snapshot: &KnownPackSnapshot) {
        let registry = packet.registry;
        let mut filled = 0;
        let entries: Vec<RegistryEntry> = packet
            .entries
            .into_iter()
            .map(|mut entry| {
                if entry.data.is_none() {
                    entry.data = snapshot.entry(&registry, &entry.id).cloned();
                    if entry.data.is_some() {
                        filled += 1;
                    } else {
                        debug!("No data for {} in registry {registry}", entry.id);
                    }
                }
                entry
            })
            .collect();
        debug!(
            "Registry {registry}: {} entries, {filled} from known packs",
            entries.len()
        );
        self.registries.insert(registry, entries);
    }

    pub fn entries(&self, registry: &Identifier) -> &[RegistryEntry] {
        self.registries.get(registry).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, registry: &Identifier, index: i32) -> Option<&RegistryEntry> {
        let index = usize::try_from(index).ok()?;
        self.registries.get(registry)?.get(index)
    }

    pub fn index_of(&self, registry: &Identifier, id: &Identifier) -> Option<usize> {
        self.registries
            .get(registry)?
            .iter()
            .position(|entry| entry.id == *id)
    }

    pub fn registry_count(&self) -> usize {
        self.registries.len()
    }

    /// Dimension type by network id.
    pub fn dimension_type(&self, index: i32) -> Result<DimensionType, BotError> {
        let registry = Identifier::vanilla(DIMENSION_TYPE);
        let entry = self
            .get(&registry, index)
            .ok_or_else(|| WorldError::UnknownDimension(format!("#{index}")))?;
        let data = entry
            .data
            .as_ref()
            .ok_or_else(|| WorldError::UnknownDimension(entry.id.to_string()))?;
        Ok(DimensionType::from_nbt(&entry.id.to_string(), data)?)
    }

    pub fn clear(&mut self) {
        self.registries.clear();
    }
}
