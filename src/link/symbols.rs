//! The symbol source stack.
//!
//! Reference resolution consults an ordered list of [`SymbolSource`]s: the
//! final in-memory table (prepended last, so it wins), static-library include
//! tables, and platform include archives. The stack memoizes lookups per
//! pass; [`SymbolTable::start_pass`] resets the memos.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::resources::{
    Attribute, ResourceId, ResourceName, ResourceTable, Value, Visibility,
};

/// What a symbol source knows about one resource.
#[derive(Debug, Clone)]
pub struct SymbolRecord {
    /// Resolved id, when the declaring table has one.
    pub id: Option<ResourceId>,
    /// Attribute metadata, for `attr` symbols.
    pub attribute: Option<Arc<Attribute>>,
    /// True when the symbol is declared public.
    pub is_public: bool,
}

impl SymbolRecord {
    /// True for attribute symbols.
    #[must_use]
    pub fn is_attribute(&self) -> bool {
        self.attribute.is_some()
    }
}

/// One provider of symbol records.
pub trait SymbolSource {
    /// Exact-name lookup.
    fn find_by_name(&self, name: &ResourceName) -> Option<Arc<SymbolRecord>>;

    /// Lookup by resolved id.
    fn find_by_id(&self, id: ResourceId) -> Option<Arc<SymbolRecord>>;
}

/// Priority-ordered stack of symbol sources with per-pass memoization.
#[derive(Default)]
pub struct SymbolTable {
    sources: Vec<Box<dyn SymbolSource>>,
    name_cache: FxHashMap<ResourceName, Option<Arc<SymbolRecord>>>,
    id_cache: FxHashMap<ResourceId, Option<Arc<SymbolRecord>>>,
}

impl SymbolTable {
    /// An empty stack.
    #[must_use]
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Add a source with higher priority than all existing ones.
    pub fn prepend_source(&mut self, source: Box<dyn SymbolSource>) {
        self.sources.insert(0, source);
        self.name_cache.clear();
        self.id_cache.clear();
    }

    /// Add a source with lower priority than all existing ones.
    pub fn append_source(&mut self, source: Box<dyn SymbolSource>) {
        self.sources.push(source);
        self.name_cache.clear();
        self.id_cache.clear();
    }

    /// Reset per-pass memoization.
    pub fn start_pass(&mut self) {
        self.name_cache.clear();
        self.id_cache.clear();
    }

    /// End-of-pass hook; memos stay valid until the next [`SymbolTable::start_pass`].
    pub fn end_pass(&mut self) {}

    /// Find a record by exact name; first source wins.
    pub fn find_by_name(&mut self, name: &ResourceName) -> Option<Arc<SymbolRecord>> {
        if let Some(memo) = self.name_cache.get(name) {
            return memo.clone();
        }
        let found = self
            .sources
            .iter()
            .find_map(|source| source.find_by_name(name));
        self.name_cache.insert(name.clone(), found.clone());
        found
    }

    /// Find a record by resolved id; first source wins.
    pub fn find_by_id(&mut self, id: ResourceId) -> Option<Arc<SymbolRecord>> {
        if let Some(memo) = self.id_cache.get(&id) {
            return memo.clone();
        }
        let found = self.sources.iter().find_map(|source| source.find_by_id(id));
        self.id_cache.insert(id, found.clone());
        found
    }
}

/// An immutable snapshot of a resource table, queryable as a symbol source.
///
/// The snapshot is taken eagerly so the table itself stays free to mutate
/// while lookups continue; the reference linker rebuilds the snapshot of the
/// final table at the start of its pass.
pub struct TableSymbolSource {
    by_name: FxHashMap<ResourceName, Arc<SymbolRecord>>,
    by_id: FxHashMap<ResourceId, Arc<SymbolRecord>>,
}

impl TableSymbolSource {
    /// Snapshot `table`.
    #[must_use]
    pub fn new(table: &ResourceTable) -> Self {
        let mut by_name = FxHashMap::default();
        let mut by_id = FxHashMap::default();

        for package in &table.packages {
            for type_group in &package.types {
                for entry in &type_group.entries {
                    let id = match (package.id, type_group.id, entry.id) {
                        (Some(p), Some(t), Some(e)) => Some(ResourceId::new(p, t, e)),
                        _ => None,
                    };
                    let attribute = entry.values.iter().find_map(|cv| match &cv.value {
                        Value::Attribute(attr) => Some(Arc::new(attr.clone())),
                        _ => None,
                    });
                    let record = Arc::new(SymbolRecord {
                        id,
                        attribute,
                        is_public: entry.visibility == Visibility::Public,
                    });

                    let name =
                        ResourceName::new(package.name.clone(), type_group.tag, entry.name.clone());
                    if let Some(id) = id {
                        by_id.insert(id, Arc::clone(&record));
                    }
                    by_name.insert(name, record);
                }
            }
        }

        TableSymbolSource { by_name, by_id }
    }
}

impl SymbolSource for TableSymbolSource {
    fn find_by_name(&self, name: &ResourceName) -> Option<Arc<SymbolRecord>> {
        self.by_name.get(name).map(Arc::clone)
    }

    fn find_by_id(&self, id: ResourceId) -> Option<Arc<SymbolRecord>> {
        self.by_id.get(&id).map(Arc::clone)
    }
}
