//! Registry tags (`#minecraft:logs` and friends).

use std::collections::HashMap;

use mc_swarm_proto::packets::common::UpdateTags;
use mc_swarm_proto::types::Identifier;

/// Registry -> tag -> member ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagsState {
    registries: HashMap<Identifier, HashMap<Identifier, Vec<i32>>>,
}

impl TagsState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tags of every registry named in the packet. Registries
    /// the packet does not mention keep their current tags.
    pub fn handle_update(&mut self, update: &UpdateTags) {
        for registry in &update.registries {
            let tags = registry
                .tags
                .iter()
                .map(|tag| (tag.name.clone(), tag.entries.clone()))
                .collect();
            self.registries.insert(registry.registry.clone(), tags);
        }
    }

    pub fn set_tag(&mut self, registry: Identifier, tag: Identifier, ids: Vec<i32>) {
        self.registries.entry(registry).or_default().insert(tag, ids);
    }

    pub fn get(&self, registry: &Identifier, tag: &Identifier) -> Option<&[i32]> {
        self.registries
            .get(registry)
            .and_then(|tags| tags.get(tag))
            .map(Vec::as_slice)
    }

    pub fn is_in(&self, registry: &Identifier, tag: &Identifier, id: i32) -> bool {
        self.get(registry, tag).is_some_and(|ids| ids.contains(&id))
    }

    pub fn registry_count(&self) -> usize {
        self.registries.len()
    }

    pub fn tag_count(&self) -> usize {
        self.registries.values().map(HashMap::len).sum()
    }
}
