//! Merging compilation units into the final table.
//!
//! Three merge modes:
//!
//! - [`TableMerger::merge`] appends: duplicate (entry, config) values in the
//!   compilation package are conflicts
//! - [`TableMerger::merge_overlay`] is later-wins: duplicates replace, and
//!   entries that do not override anything are rejected unless
//!   `auto_add_overlay` is set
//! - [`TableMerger::merge_and_mangle`] merges a library package into the
//!   compilation package under mangled entry names
//!
//! Foreign packages are copied through verbatim; the external-package
//! verification pass decides their fate after all inputs are merged. File
//! references keep their payload handles: handles already attached move with
//! the value, detached ones are looked up in the collection the table
//! arrived with.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::diagnostics::Source;
use crate::format::container::CompiledFileDesc;
use crate::io::file::{FileCollection, InputFile};
use crate::link::context::LinkContext;
use crate::resources::{
    ConfigValue, Entry, FileReference, Item, NameMangler, ResourceName, ResourceTable, Value,
    Visibility,
};

/// Merge behavior switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableMergerOptions {
    /// Allow overlays to introduce resources that override nothing.
    pub auto_add_overlay: bool,
}

/// Merges incoming tables and compiled files into the final table.
pub struct TableMerger<'a> {
    context: &'a LinkContext,
    master: &'a mut ResourceTable,
    options: TableMergerOptions,
    merged_packages: FxHashSet<String>,
}

impl<'a> TableMerger<'a> {
    /// Create a merger writing into `master`.
    pub fn new(
        context: &'a LinkContext,
        master: &'a mut ResourceTable,
        options: TableMergerOptions,
    ) -> Self {
        TableMerger {
            context,
            master,
            options,
            merged_packages: FxHashSet::default(),
        }
    }

    /// Packages merged under mangled names so far.
    #[must_use]
    pub fn merged_packages(&self) -> &FxHashSet<String> {
        &self.merged_packages
    }

    /// Append-merge `table`.
    pub fn merge(
        &mut self,
        src: &Source,
        table: ResourceTable,
        collection: Option<&dyn FileCollection>,
    ) -> bool {
        self.do_merge(src, table, collection, None, false, true)
    }

    /// Overlay-merge `table`; later values win.
    pub fn merge_overlay(
        &mut self,
        src: &Source,
        table: ResourceTable,
        collection: Option<&dyn FileCollection>,
    ) -> bool {
        let allow_new = self.options.auto_add_overlay;
        self.do_merge(src, table, collection, None, true, allow_new)
    }

    /// Merge the library package `package_name` from `table` into the
    /// compilation package with mangled entry names.
    pub fn merge_and_mangle(
        &mut self,
        src: &Source,
        package_name: &str,
        table: ResourceTable,
        collection: Option<&dyn FileCollection>,
    ) -> bool {
        self.do_merge(src, table, collection, Some(package_name), false, true)
    }

    /// Merge one compiled file as a file reference value.
    pub fn merge_file(
        &mut self,
        desc: &CompiledFileDesc,
        overlay: bool,
        file: Arc<dyn InputFile>,
    ) -> bool {
        let name = desc
            .name
            .with_default_package(&self.context.compilation_package);
        let dst_path = build_resource_file_name(&name, &desc.config, &desc.source.path);
        let value = Value::Item(Item::FileReference(FileReference::new(
            dst_path,
            Some(file),
        )));

        let allow_new = !overlay || self.options.auto_add_overlay;
        let package = self.master.find_or_create_package(&name.package);
        if package.name == self.context.compilation_package && package.id.is_none() {
            package.id = Some(self.context.package_id);
        }
        let type_group = package.find_or_create_type(name.type_tag);
        let existed = type_group.find_entry(&name.entry).is_some();
        if !existed && !allow_new {
            self.context.diagnostics.error(
                desc.source.clone(),
                format!("resource '{name}' does not override an existing resource"),
            );
            self.context.diagnostics.note(
                None,
                "define an <add-resource> tag or use --auto-add-overlay".to_string(),
            );
            return false;
        }
        let entry = type_group.find_or_create_entry(&name.entry);
        if !merge_config_value(
            entry,
            &name,
            desc.config.clone(),
            String::new(),
            value,
            desc.source.clone(),
            overlay,
            self.context,
        ) {
            return false;
        }

        // Register the symbols the file exports (inline id declarations).
        let mut ok = true;
        for symbol in &desc.exported_symbols {
            let symbol_name = symbol
                .name
                .with_default_package(&self.context.compilation_package);
            let package = self.master.find_or_create_package(&symbol_name.package);
            let entry = package
                .find_or_create_type(symbol_name.type_tag)
                .find_or_create_entry(&symbol_name.entry);
            ok &= merge_config_value(
                entry,
                &symbol_name,
                crate::resources::ConfigDescription::default(),
                String::new(),
                Value::Item(Item::Id),
                desc.source.at_line(symbol.line),
                false,
                self.context,
            );
        }
        ok
    }

    fn do_merge(
        &mut self,
        src: &Source,
        table: ResourceTable,
        collection: Option<&dyn FileCollection>,
        mangle_package: Option<&str>,
        overlay: bool,
        allow_new_resources: bool,
    ) -> bool {
        let mut error = false;

        for src_package in table.packages {
            let mangle_this = mangle_package == Some(src_package.name.as_str());
            let target_name = if src_package.name.is_empty() || mangle_this {
                self.context.compilation_package.clone()
            } else {
                src_package.name.clone()
            };
            if mangle_this {
                self.merged_packages.insert(src_package.name.clone());
            }

            for src_type in src_package.types {
                let target_package = self.master.find_or_create_package(&target_name);
                if target_package.name == self.context.compilation_package
                    && target_package.id.is_none()
                {
                    target_package.id = Some(self.context.package_id);
                }
                if target_package.id.is_none() {
                    target_package.id = src_package.id;
                }
                let target_type = target_package.find_or_create_type(src_type.tag);
                if let Some(id) = src_type.id {
                    if target_type.id.is_none() {
                        target_type.id = Some(id);
                    } else if target_type.id != Some(id) {
                        self.context.diagnostics.error(
                            src.clone(),
                            format!(
                                "type '{}' has conflicting ids 0x{:02x} and 0x{id:02x}",
                                src_type.tag,
                                target_type.id.expect("checked above")
                            ),
                        );
                        error = true;
                        continue;
                    }
                }

                for src_entry in src_type.entries {
                    let entry_name = if mangle_this {
                        NameMangler::mangle_entry(&src_package.name, &src_entry.name)
                    } else {
                        src_entry.name.clone()
                    };
                    let res_name =
                        ResourceName::new(target_name.clone(), src_type.tag, entry_name.clone());

                    let existed = target_type.find_entry(&entry_name).is_some();
                    if overlay && !existed && !allow_new_resources {
                        self.context.diagnostics.error(
                            src.clone(),
                            format!(
                                "resource '{res_name}' does not override an existing resource"
                            ),
                        );
                        self.context.diagnostics.note(
                            None,
                            "define an <add-resource> tag or use --auto-add-overlay".to_string(),
                        );
                        error = true;
                        continue;
                    }

                    let target_entry = target_type.find_or_create_entry(&entry_name);

                    if let Some(id) = src_entry.id {
                        if target_entry.id.is_none() {
                            target_entry.id = Some(id);
                        } else if target_entry.id != Some(id) {
                            self.context.diagnostics.error(
                                src.clone(),
                                format!(
                                    "resource '{res_name}' has conflicting ids 0x{:04x} \
                                     and 0x{id:04x}",
                                    target_entry.id.expect("checked above")
                                ),
                            );
                            error = true;
                            continue;
                        }
                    }

                    // Visibility merges with the sticky-public rule.
                    if src_entry.visibility == Visibility::Public {
                        target_entry.visibility = Visibility::Public;
                        target_entry.visibility_source =
                            src_entry.visibility_source.clone().or(Some(src.clone()));
                    } else if src_entry.visibility == Visibility::Private
                        && target_entry.visibility == Visibility::Public
                    {
                        self.context.diagnostics.error(
                            src.clone(),
                            format!("can't change visibility of public resource '{res_name}'"),
                        );
                        error = true;
                        continue;
                    } else if src_entry.visibility > target_entry.visibility {
                        target_entry.visibility = src_entry.visibility;
                        target_entry.visibility_source = src_entry.visibility_source.clone();
                    }

                    for mut config_value in src_entry.values {
                        // Re-attach payload handles from the unit's collection.
                        if let Some(file_ref) = config_value.value.as_file_reference_mut() {
                            if file_ref.file.is_none() {
                                if let Some(collection) = collection {
                                    file_ref.file = collection.find(&file_ref.path);
                                }
                            }
                        }

                        if !merge_config_value(
                            target_entry,
                            &res_name,
                            config_value.config,
                            config_value.product,
                            config_value.value,
                            config_value.source,
                            overlay,
                            self.context,
                        ) {
                            error = true;
                        }
                    }
                }
            }
        }

        !error
    }
}

#[allow(clippy::too_many_arguments)]
fn merge_config_value(
    entry: &mut Entry,
    name: &ResourceName,
    config: crate::resources::ConfigDescription,
    product: String,
    value: Value,
    source: Source,
    overlay: bool,
    context: &LinkContext,
) -> bool {
    match entry.find_value_mut(&config, &product) {
        None => {
            entry.values.push(ConfigValue {
                config,
                product,
                value,
                source,
            });
            true
        }
        Some(existing) => {
            if overlay {
                existing.value = value;
                existing.source = source;
                true
            } else if value.is_id() {
                // Id placeholders are weak: any existing value wins.
                true
            } else if existing.value.is_id() {
                existing.value = value;
                existing.source = source;
                true
            } else {
                let original = existing.source.clone();
                context.diagnostics.error(
                    source,
                    format!("duplicate value for resource '{name}' with config '{config}'"),
                );
                context
                    .diagnostics
                    .note(original, "resource previously defined here".to_string());
                false
            }
        }
    }
}

/// The destination archive path for a file-typed resource:
/// `res/<type>[-<config>]/<entry><extension>`.
///
/// Compiled XML sources keep a plain `.xml` extension; everything else keeps
/// the extension of its original source.
#[must_use]
pub fn build_resource_file_name(
    name: &ResourceName,
    config: &crate::resources::ConfigDescription,
    source_path: &str,
) -> String {
    let extension = if source_path.ends_with(".xml") || source_path.ends_with(".xml.flat") {
        ".xml".to_string()
    } else {
        let file_name = source_path.rsplit('/').next().unwrap_or(source_path);
        match file_name.find('.') {
            Some(ix) => {
                let ext = &file_name[ix..];
                ext.strip_suffix(".flat").unwrap_or(ext).to_string()
            }
            None => String::new(),
        }
    };

    let config_part = if config.is_default() {
        String::new()
    } else {
        format!("-{config}")
    };
    format!(
        "res/{}{}/{}{}",
        name.type_tag, config_part, name.entry, extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::resources::{ConfigDescription, ResourceType};

    fn context() -> LinkContext {
        let mut ctx = LinkContext::new();
        ctx.compilation_package = "com.app".to_string();
        ctx.package_id = 0x7f;
        ctx
    }

    fn table_with(entries: &[(&str, &str, &str)]) -> ResourceTable {
        let mut table = ResourceTable::new();
        let diag = Diagnostics::new();
        for (name, config, value) in entries {
            table.add_resource(
                &ResourceName::parse(name).unwrap(),
                &ConfigDescription::parse(config).unwrap(),
                "",
                Value::Item(Item::String((*value).to_string())),
                Source::new("unit.arsc.flat"),
                crate::resources::ConflictPolicy::Error,
                &diag,
            );
        }
        table
    }

    #[test]
    fn append_then_overlay_wins() {
        let ctx = context();
        let mut master = ResourceTable::new();
        let mut merger = TableMerger::new(&ctx, &mut master, TableMergerOptions::default());

        assert!(merger.merge(
            &Source::new("base"),
            table_with(&[("com.app:string/foo", "", "hello")]),
            None,
        ));
        assert!(merger.merge_overlay(
            &Source::new("overlay"),
            table_with(&[("com.app:string/foo", "", "hi")]),
            None,
        ));

        let entry = master
            .find_entry(&ResourceName::parse("com.app:string/foo").unwrap())
            .unwrap();
        assert_eq!(entry.values.len(), 1);
        assert_eq!(
            entry.values[0].value,
            Value::Item(Item::String("hi".into()))
        );
        assert!(!ctx.diagnostics.has_errors());
    }

    #[test]
    fn duplicate_append_is_a_conflict() {
        let ctx = context();
        let mut master = ResourceTable::new();
        let mut merger = TableMerger::new(&ctx, &mut master, TableMergerOptions::default());

        assert!(merger.merge(
            &Source::new("a"),
            table_with(&[("com.app:string/foo", "", "one")]),
            None,
        ));
        assert!(!merger.merge(
            &Source::new("b"),
            table_with(&[("com.app:string/foo", "", "two")]),
            None,
        ));
        assert!(ctx.diagnostics.has_errors());
    }

    #[test]
    fn overlay_of_new_entry_needs_auto_add() {
        let ctx = context();
        let mut master = ResourceTable::new();
        let mut merger = TableMerger::new(&ctx, &mut master, TableMergerOptions::default());
        assert!(!merger.merge_overlay(
            &Source::new("overlay"),
            table_with(&[("com.app:string/brand_new", "", "x")]),
            None,
        ));
        assert!(ctx.diagnostics.has_errors());

        let ctx = context();
        let mut master = ResourceTable::new();
        let mut merger = TableMerger::new(
            &ctx,
            &mut master,
            TableMergerOptions {
                auto_add_overlay: true,
            },
        );
        assert!(merger.merge_overlay(
            &Source::new("overlay"),
            table_with(&[("com.app:string/brand_new", "", "x")]),
            None,
        ));
        assert!(master
            .find_entry(&ResourceName::parse("com.app:string/brand_new").unwrap())
            .is_some());
    }

    #[test]
    fn mangle_merges_into_compilation_package() {
        let ctx = context();
        let mut master = ResourceTable::new();
        let mut merger = TableMerger::new(&ctx, &mut master, TableMergerOptions::default());

        assert!(merger.merge_and_mangle(
            &Source::new("lib.apk"),
            "com.lib",
            table_with(&[("com.lib:string/msg", "", "from lib")]),
            None,
        ));
        assert!(merger.merged_packages().contains("com.lib"));

        let mangled = ResourceName::new("com.app", ResourceType::String, "com.lib$msg");
        assert!(master.find_entry(&mangled).is_some());
        assert!(master.find_package("com.lib").is_none());
    }

    #[test]
    fn empty_package_name_lands_in_compilation_package() {
        let ctx = context();
        let mut master = ResourceTable::new();
        let mut merger = TableMerger::new(&ctx, &mut master, TableMergerOptions::default());

        assert!(merger.merge(
            &Source::new("legacy"),
            table_with(&[("string/foo", "", "legacy")]),
            None,
        ));
        assert!(master
            .find_entry(&ResourceName::parse("com.app:string/foo").unwrap())
            .is_some());
    }

    #[test]
    fn file_name_building() {
        let name = ResourceName::parse("com.app:layout/main").unwrap();
        assert_eq!(
            build_resource_file_name(&name, &ConfigDescription::default(), "res/layout/main.xml"),
            "res/layout/main.xml"
        );
        assert_eq!(
            build_resource_file_name(
                &name,
                &ConfigDescription::parse("v21").unwrap(),
                "res/layout/main.xml.flat"
            ),
            "res/layout-v21/main.xml"
        );
        let png = ResourceName::parse("com.app:drawable/icon").unwrap();
        assert_eq!(
            build_resource_file_name(
                &png,
                &ConfigDescription::parse("hdpi").unwrap(),
                "res/drawable-hdpi/icon.png"
            ),
            "res/drawable-hdpi/icon.png"
        );
    }
}
