//! The mutable multi-package resource table.
//!
//! Ordering is significant everywhere: packages, type groups, entries and
//! config values all preserve first-insertion order, and merges append
//! unknown entries at the end. Within one entry no two config values may
//! share a (configuration, product) key; the conflict policy chosen by the
//! caller decides whether a collision is an error or an overlay replacement.
//!
//! Visibility upgrades to `public` are sticky: once public, an entry cannot
//! be made private again.

use std::fmt;

use crate::diagnostics::{Diagnostics, Source};
use crate::resources::config::ConfigDescription;
use crate::resources::name::{ResourceName, ResourceType};
use crate::resources::value::Value;

/// Entry visibility level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Visibility {
    /// Never declared.
    #[default]
    Undefined,
    /// Declared private to its package.
    Private,
    /// Declared public; sticky.
    Public,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Undefined => write!(f, "undefined"),
            Visibility::Private => write!(f, "private"),
            Visibility::Public => write!(f, "public"),
        }
    }
}

/// What to do when a value addition collides with an existing config value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Report a merge conflict.
    Error,
    /// Later wins: replace the existing value.
    OverlayReplace,
    /// Like [`ConflictPolicy::Error`], but the entry name is a mangled form
    /// and may contain characters plain resource names reject.
    MangleNewName,
}

/// One (configuration, product)-keyed value of an entry.
#[derive(Debug, Clone)]
pub struct ConfigValue {
    /// The configuration this value applies to.
    pub config: ConfigDescription,
    /// Product name, empty for the default product.
    pub product: String,
    /// The value itself.
    pub value: Value,
    /// Where the value was defined.
    pub source: Source,
}

/// A named entry within a type group.
#[derive(Debug, Clone, Default)]
pub struct Entry {
    /// Entry name, unique within its type group.
    pub name: String,
    /// 16-bit id once assigned.
    pub id: Option<u16>,
    /// Visibility level.
    pub visibility: Visibility,
    /// Where the visibility was last raised, for conflict messages.
    pub visibility_source: Option<Source>,
    /// Config values in first-insertion order.
    pub values: Vec<ConfigValue>,
}

impl Entry {
    /// Find the value for exactly (`config`, `product`).
    #[must_use]
    pub fn find_value(&self, config: &ConfigDescription, product: &str) -> Option<&ConfigValue> {
        self.values
            .iter()
            .find(|cv| cv.config == *config && cv.product == product)
    }

    /// Mutable variant of [`Entry::find_value`].
    pub fn find_value_mut(
        &mut self,
        config: &ConfigDescription,
        product: &str,
    ) -> Option<&mut ConfigValue> {
        self.values
            .iter_mut()
            .find(|cv| cv.config == *config && cv.product == product)
    }
}

/// All entries of one resource type within a package.
#[derive(Debug, Clone)]
pub struct TypeGroup {
    /// The type tag.
    pub tag: ResourceType,
    /// 8-bit id once assigned.
    pub id: Option<u8>,
    /// Entries in first-insertion order.
    pub entries: Vec<Entry>,
}

impl TypeGroup {
    /// Find an entry by name.
    #[must_use]
    pub fn find_entry(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Find or append an entry by name.
    pub fn find_or_create_entry(&mut self, name: &str) -> &mut Entry {
        if let Some(ix) = self.entries.iter().position(|e| e.name == name) {
            return &mut self.entries[ix];
        }
        self.entries.push(Entry {
            name: name.to_string(),
            ..Entry::default()
        });
        self.entries.last_mut().expect("just pushed")
    }
}

/// One package within the table.
#[derive(Debug, Clone, Default)]
pub struct Package {
    /// Package name; may be empty for the compilation package in legacy mode.
    pub name: String,
    /// 8-bit package id once known.
    pub id: Option<u8>,
    /// Type groups in first-insertion order.
    pub types: Vec<TypeGroup>,
}

impl Package {
    /// Find a type group by tag.
    #[must_use]
    pub fn find_type(&self, tag: ResourceType) -> Option<&TypeGroup> {
        self.types.iter().find(|t| t.tag == tag)
    }

    /// Mutable variant of [`Package::find_type`].
    pub fn find_type_mut(&mut self, tag: ResourceType) -> Option<&mut TypeGroup> {
        self.types.iter_mut().find(|t| t.tag == tag)
    }

    /// Find or append a type group by tag.
    pub fn find_or_create_type(&mut self, tag: ResourceType) -> &mut TypeGroup {
        if let Some(ix) = self.types.iter().position(|t| t.tag == tag) {
            return &mut self.types[ix];
        }
        self.types.push(TypeGroup {
            tag,
            id: None,
            entries: Vec::new(),
        });
        self.types.last_mut().expect("just pushed")
    }
}

/// The multi-package resource table the whole pipeline mutates.
#[derive(Debug, Clone, Default)]
pub struct ResourceTable {
    /// Packages in first-insertion order.
    pub packages: Vec<Package>,
}

impl ResourceTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        ResourceTable::default()
    }

    /// Find a package by name.
    #[must_use]
    pub fn find_package(&self, name: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Mutable variant of [`ResourceTable::find_package`].
    pub fn find_package_mut(&mut self, name: &str) -> Option<&mut Package> {
        self.packages.iter_mut().find(|p| p.name == name)
    }

    /// Find a package by assigned id.
    #[must_use]
    pub fn find_package_by_id(&self, id: u8) -> Option<&Package> {
        self.packages.iter().find(|p| p.id == Some(id))
    }

    /// Mutable variant of [`ResourceTable::find_package_by_id`].
    pub fn find_package_by_id_mut(&mut self, id: u8) -> Option<&mut Package> {
        self.packages.iter_mut().find(|p| p.id == Some(id))
    }

    /// Find or append a package by name.
    pub fn find_or_create_package(&mut self, name: &str) -> &mut Package {
        if let Some(ix) = self.packages.iter().position(|p| p.name == name) {
            return &mut self.packages[ix];
        }
        self.packages.push(Package {
            name: name.to_string(),
            ..Package::default()
        });
        self.packages.last_mut().expect("just pushed")
    }

    /// Look up an entry by fully qualified name.
    #[must_use]
    pub fn find_entry(&self, name: &ResourceName) -> Option<&Entry> {
        self.find_package(&name.package)?
            .find_type(name.type_tag)?
            .find_entry(&name.entry)
    }

    /// Add a value for `name` at (`config`, `product`).
    ///
    /// Reports conflicts (with both source locations) and invalid entry
    /// names through `diag`; returns `false` when the addition failed.
    pub fn add_resource(
        &mut self,
        name: &ResourceName,
        config: &ConfigDescription,
        product: &str,
        value: Value,
        source: Source,
        policy: ConflictPolicy,
        diag: &Diagnostics,
    ) -> bool {
        if !is_valid_entry_name(&name.entry, policy == ConflictPolicy::MangleNewName) {
            diag.error(
                source,
                format!("resource '{name}' has an invalid entry name"),
            );
            return false;
        }

        let entry = self
            .find_or_create_package(&name.package)
            .find_or_create_type(name.type_tag)
            .find_or_create_entry(&name.entry);

        match entry.find_value_mut(config, product) {
            None => {
                entry.values.push(ConfigValue {
                    config: config.clone(),
                    product: product.to_string(),
                    value,
                    source,
                });
                true
            }
            Some(existing) => match policy {
                ConflictPolicy::OverlayReplace => {
                    existing.value = value;
                    existing.source = source;
                    true
                }
                ConflictPolicy::Error | ConflictPolicy::MangleNewName => {
                    let original = existing.source.clone();
                    diag.error(
                        source,
                        format!(
                            "duplicate value for resource '{name}' with config '{config}'; \
                             originally defined here: {original}"
                        ),
                    );
                    false
                }
            },
        }
    }

    /// Set the visibility of `name`, honoring the sticky-public rule.
    ///
    /// Returns `false` (with a diagnostic) on an attempted downgrade.
    pub fn set_visibility(
        &mut self,
        name: &ResourceName,
        visibility: Visibility,
        source: Source,
        diag: &Diagnostics,
    ) -> bool {
        let entry = self
            .find_or_create_package(&name.package)
            .find_or_create_type(name.type_tag)
            .find_or_create_entry(&name.entry);

        if entry.visibility == Visibility::Public && visibility != Visibility::Public {
            let original = entry
                .visibility_source
                .clone()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "<unknown>".to_string());
            diag.error(
                source,
                format!(
                    "can't change visibility of public resource '{name}'; \
                     declared public here: {original}"
                ),
            );
            return false;
        }

        if visibility > entry.visibility {
            entry.visibility = visibility;
            entry.visibility_source = Some(source);
        }
        true
    }
}

fn is_valid_entry_name(name: &str, allow_mangled: bool) -> bool {
    !name.is_empty()
        && name.chars().all(|c| {
            c.is_ascii_alphanumeric() || c == '_' || c == '.' || (allow_mangled && c == '$')
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::value::{Item, Primitive};

    fn string_value(s: &str) -> Value {
        Value::Item(Item::String(s.to_string()))
    }

    fn name(s: &str) -> ResourceName {
        ResourceName::parse(s).unwrap()
    }

    #[test]
    fn duplicate_config_value_is_a_conflict() {
        let mut table = ResourceTable::new();
        let diag = Diagnostics::new();
        let default = ConfigDescription::default();

        assert!(table.add_resource(
            &name("com.app:string/foo"),
            &default,
            "",
            string_value("hello"),
            Source::new("a.arsc.flat"),
            ConflictPolicy::Error,
            &diag,
        ));
        assert!(!table.add_resource(
            &name("com.app:string/foo"),
            &default,
            "",
            string_value("bye"),
            Source::new("b.arsc.flat"),
            ConflictPolicy::Error,
            &diag,
        ));
        assert_eq!(diag.error_count(), 1);
    }

    #[test]
    fn overlay_replaces_value() {
        let mut table = ResourceTable::new();
        let diag = Diagnostics::new();
        let default = ConfigDescription::default();
        let foo = name("com.app:string/foo");

        table.add_resource(
            &foo,
            &default,
            "",
            string_value("hello"),
            Source::new("base"),
            ConflictPolicy::Error,
            &diag,
        );
        assert!(table.add_resource(
            &foo,
            &default,
            "",
            string_value("hi"),
            Source::new("overlay"),
            ConflictPolicy::OverlayReplace,
            &diag,
        ));

        let entry = table.find_entry(&foo).unwrap();
        assert_eq!(entry.values.len(), 1);
        assert_eq!(entry.values[0].value, string_value("hi"));
        assert!(!diag.has_errors());
    }

    #[test]
    fn distinct_configs_coexist() {
        let mut table = ResourceTable::new();
        let diag = Diagnostics::new();
        let foo = name("com.app:string/foo");

        table.add_resource(
            &foo,
            &ConfigDescription::default(),
            "",
            string_value("hello"),
            Source::new("a"),
            ConflictPolicy::Error,
            &diag,
        );
        table.add_resource(
            &foo,
            &ConfigDescription::parse("en").unwrap(),
            "",
            string_value("hello en"),
            Source::new("a"),
            ConflictPolicy::Error,
            &diag,
        );
        assert_eq!(table.find_entry(&foo).unwrap().values.len(), 2);
    }

    #[test]
    fn public_visibility_is_sticky() {
        let mut table = ResourceTable::new();
        let diag = Diagnostics::new();
        let foo = name("com.app:string/foo");

        assert!(table.set_visibility(&foo, Visibility::Public, Source::new("public.arsc"), &diag));
        assert!(!table.set_visibility(&foo, Visibility::Private, Source::new("later.arsc"), &diag));
        assert_eq!(
            table.find_entry(&foo).unwrap().visibility,
            Visibility::Public
        );
        // Re-declaring public is fine.
        let diag = Diagnostics::new();
        assert!(table.set_visibility(&foo, Visibility::Public, Source::new("again.arsc"), &diag));
        assert!(!diag.has_errors());
    }

    #[test]
    fn entry_order_is_first_insertion() {
        let mut table = ResourceTable::new();
        let diag = Diagnostics::new();
        let default = ConfigDescription::default();
        for entry in ["zebra", "apple", "mango"] {
            table.add_resource(
                &ResourceName::new("com.app", ResourceType::Id, entry),
                &default,
                "",
                Value::Item(Item::Id),
                Source::new("ids.arsc"),
                ConflictPolicy::Error,
                &diag,
            );
        }
        let names: Vec<_> = table.packages[0].types[0]
            .entries
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, ["zebra", "apple", "mango"]);
    }

    #[test]
    fn mangled_names_need_the_mangle_policy() {
        let mut table = ResourceTable::new();
        let diag = Diagnostics::new();
        let default = ConfigDescription::default();
        let mangled = ResourceName::new("com.app", ResourceType::String, "lib$msg");

        assert!(!table.add_resource(
            &mangled,
            &default,
            "",
            string_value("x"),
            Source::new("lib.apk"),
            ConflictPolicy::Error,
            &diag,
        ));
        assert!(table.add_resource(
            &mangled,
            &default,
            "",
            string_value("x"),
            Source::new("lib.apk"),
            ConflictPolicy::MangleNewName,
            &diag,
        ));
    }

    #[test]
    fn primitive_values_coexist_with_strings() {
        let mut table = ResourceTable::new();
        let diag = Diagnostics::new();
        table.add_resource(
            &name("com.app:integer/max"),
            &ConfigDescription::default(),
            "",
            Value::Item(Item::Primitive(Primitive::Int(10))),
            Source::new("values.arsc"),
            ConflictPolicy::Error,
            &diag,
        );
        assert!(table.find_entry(&name("com.app:integer/max")).is_some());
    }
}
