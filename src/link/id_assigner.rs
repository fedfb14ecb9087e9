//! Deterministic resource id assignment.
//!
//! Three tiers: the package id comes from the link context (`0x01` for the
//! framework package, `0x7f` otherwise); type ids are consecutive 8-bit
//! values in declaration order; entry ids are consecutive 16-bit values in
//! declaration order. A user-provided stable-id map pins names to specific
//! ids first, and pinned ids are skipped (reserved) during consecutive
//! assignment whether or not the pinned name exists in this build.
//!
//! The stable map is validated in full before any id is written, so an
//! id conflict never leaves the table partially assigned.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::link::context::LinkContext;
use crate::resources::{ResourceId, ResourceName, ResourceTable, ResourceType};

/// Assigns ids, honoring a stable-id map.
pub struct IdAssigner<'a> {
    stable_ids: &'a FxHashMap<ResourceName, ResourceId>,
}

impl<'a> IdAssigner<'a> {
    /// Create an assigner over the given stable map (may be empty).
    #[must_use]
    pub fn new(stable_ids: &'a FxHashMap<ResourceName, ResourceId>) -> Self {
        IdAssigner { stable_ids }
    }

    /// Assign ids across `table`. Returns `false` on any conflict.
    pub fn consume(&self, context: &LinkContext, table: &mut ResourceTable) -> bool {
        for package_ix in 0..table.packages.len() {
            if !self.assign_package(context, table, package_ix) {
                return false;
            }
        }
        true
    }

    fn assign_package(
        &self,
        context: &LinkContext,
        table: &mut ResourceTable,
        package_ix: usize,
    ) -> bool {
        let package_name = table.packages[package_ix].name.clone();
        let package_id = table.packages[package_ix]
            .id
            .unwrap_or(context.package_id);

        // Validate the stable map for this package before touching the table.
        let mut type_pins: FxHashMap<ResourceType, u8> = FxHashMap::default();
        let mut entry_pins: FxHashMap<(ResourceType, &str), u16> = FxHashMap::default();
        let mut used_full_ids: FxHashMap<ResourceId, &ResourceName> = FxHashMap::default();

        for (name, id) in self
            .stable_ids
            .iter()
            .filter(|(name, _)| name.package == package_name)
        {
            if id.package_id() != package_id {
                context.diagnostics.error(
                    None,
                    format!(
                        "stable ID {id} for resource '{name}' has package ID 0x{:02x}, \
                         expected 0x{package_id:02x}",
                        id.package_id()
                    ),
                );
                return false;
            }
            match type_pins.get(&name.type_tag) {
                Some(&pinned) if pinned != id.type_id() => {
                    context.diagnostics.error(
                        None,
                        format!(
                            "stable ID {id} for resource '{name}' assigns type ID 0x{:02x}, \
                             but type '{}' is already pinned to 0x{pinned:02x}",
                            id.type_id(),
                            name.type_tag
                        ),
                    );
                    return false;
                }
                _ => {
                    type_pins.insert(name.type_tag, id.type_id());
                }
            }
            if let Some(other) = used_full_ids.insert(*id, name) {
                context.diagnostics.error(
                    None,
                    format!("stable ID {id} is assigned to both '{other}' and '{name}'"),
                );
                return false;
            }
            entry_pins.insert((name.type_tag, name.entry.as_str()), id.entry_id());
        }

        // Two distinct type tags must not share a pinned type id.
        let mut seen_type_ids: FxHashMap<u8, ResourceType> = FxHashMap::default();
        for (&tag, &type_id) in &type_pins {
            if let Some(other) = seen_type_ids.insert(type_id, tag) {
                context.diagnostics.error(
                    None,
                    format!(
                        "stable IDs assign type ID 0x{type_id:02x} to both '{other}' and '{tag}'"
                    ),
                );
                return false;
            }
        }

        let package = &mut table.packages[package_ix];
        package.id = Some(package_id);

        // Pinned ids first, then consecutive assignment skipping reserved ids.
        let reserved_type_ids: FxHashSet<u8> = type_pins.values().copied().collect();
        for type_group in &mut package.types {
            if let Some(&pinned) = type_pins.get(&type_group.tag) {
                if let Some(existing) = type_group.id {
                    if existing != pinned {
                        context.diagnostics.error(
                            None,
                            format!(
                                "can't assign ID 0x{pinned:02x} to type '{}' already using \
                                 0x{existing:02x}",
                                type_group.tag
                            ),
                        );
                        return false;
                    }
                }
                type_group.id = Some(pinned);
            }
        }
        let mut next_type_id: u8 = 1;
        for type_group in &mut package.types {
            if type_group.id.is_none() {
                while reserved_type_ids.contains(&next_type_id) {
                    next_type_id += 1;
                }
                type_group.id = Some(next_type_id);
                next_type_id += 1;
            }

            let reserved_entry_ids: FxHashSet<u16> = entry_pins
                .iter()
                .filter(|((tag, _), _)| *tag == type_group.tag)
                .map(|(_, &entry_id)| entry_id)
                .collect();

            for entry in &mut type_group.entries {
                if let Some(&pinned) = entry_pins.get(&(type_group.tag, entry.name.as_str())) {
                    if let Some(existing) = entry.id {
                        if existing != pinned {
                            context.diagnostics.error(
                                None,
                                format!(
                                    "can't assign ID 0x{pinned:04x} to entry '{}' already using \
                                     0x{existing:04x}",
                                    entry.name
                                ),
                            );
                            return false;
                        }
                    }
                    entry.id = Some(pinned);
                }
            }
            let mut next_entry_id: u16 = 0;
            for entry in &mut type_group.entries {
                if entry.id.is_none() {
                    while reserved_entry_ids.contains(&next_entry_id) {
                        next_entry_id += 1;
                    }
                    entry.id = Some(next_entry_id);
                    next_entry_id += 1;
                }
            }
        }
        true
    }
}
