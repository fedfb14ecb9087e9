//! R-class source generation.
//!
//! Emits the `R.java` file consumers compile against: one nested class per
//! resource type, one `int` field per entry, carrying the assigned resource
//! id. Mangled entries are unmangled and emitted only into the R file of
//! their original library package, which is how `--extra-packages` gets each
//! library its own view of the shared id space.

use std::collections::BTreeMap;
use std::io::Write;

use crate::resources::{NameMangler, ResourceTable, ResourceType, Visibility};

/// Which symbols to include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolTypes {
    /// Everything.
    All,
    /// Public symbols only.
    Public,
    /// Public and private (same set as [`SymbolTypes::All`], kept distinct
    /// for the private-symbols flow).
    PublicPrivate,
}

/// Generation switches.
#[derive(Debug, Clone)]
pub struct JavaClassGeneratorOptions {
    /// Which symbols to emit.
    pub types: SymbolTypes,
    /// Emit `final` fields (inlineable ids).
    pub use_final: bool,
    /// Extra javadoc annotations on every class.
    pub javadoc_annotations: Vec<String>,
}

impl Default for JavaClassGeneratorOptions {
    fn default() -> Self {
        JavaClassGeneratorOptions {
            types: SymbolTypes::All,
            use_final: true,
            javadoc_annotations: Vec::new(),
        }
    }
}

/// Generates R classes from a linked table.
pub struct JavaClassGenerator<'a> {
    table: &'a ResourceTable,
    options: JavaClassGeneratorOptions,
}

impl<'a> JavaClassGenerator<'a> {
    /// Create a generator over `table`.
    #[must_use]
    pub fn new(table: &'a ResourceTable, options: JavaClassGeneratorOptions) -> Self {
        JavaClassGenerator { table, options }
    }

    /// Write the R class for symbols of `package_name_to_generate`, under
    /// Java package `out_package`.
    ///
    /// # Errors
    /// Propagates writer failures.
    pub fn generate(
        &self,
        package_name_to_generate: &str,
        out_package: &str,
        out: &mut impl Write,
    ) -> std::io::Result<()> {
        writeln!(
            out,
            "/* AUTO-GENERATED FILE. DO NOT MODIFY.\n *\n * This class was automatically generated by the\n * resource linker from the resource data it found. It\n * should not be modified by hand.\n */"
        )?;
        writeln!(out)?;
        writeln!(out, "package {out_package};")?;
        writeln!(out)?;
        writeln!(out, "public final class R {{")?;

        // class name -> field name -> (id, public)
        let mut classes: BTreeMap<String, BTreeMap<String, (u32, Visibility)>> = BTreeMap::new();

        for package in &self.table.packages {
            for type_group in &package.types {
                let class_name = java_class_name(type_group.tag);
                for entry in &type_group.entries {
                    let field_owner;
                    let field_entry;
                    match NameMangler::unmangle_entry(&entry.name) {
                        Some((original_package, original_entry)) => {
                            field_owner = original_package;
                            field_entry = original_entry;
                        }
                        None => {
                            field_owner = package.name.as_str();
                            field_entry = entry.name.as_str();
                        }
                    }
                    if field_owner != package_name_to_generate {
                        continue;
                    }
                    if self.options.types == SymbolTypes::Public
                        && entry.visibility != Visibility::Public
                    {
                        continue;
                    }

                    let id = match (package.id, type_group.id, entry.id) {
                        (Some(p), Some(t), Some(e)) => {
                            crate::resources::ResourceId::new(p, t, e).0
                        }
                        _ => 0,
                    };
                    classes
                        .entry(class_name.to_string())
                        .or_default()
                        .insert(java_field_name(field_entry), (id, entry.visibility));
                }
            }
        }

        let modifier = if self.options.use_final {
            "public static final int"
        } else {
            "public static int"
        };
        for (class_name, fields) in &classes {
            for annotation in &self.options.javadoc_annotations {
                writeln!(out, "    /** @{annotation} */")?;
            }
            writeln!(out, "    public static final class {class_name} {{")?;
            for (field, (id, _)) in fields {
                writeln!(out, "        {modifier} {field}=0x{id:08x};")?;
            }
            writeln!(out, "    }}")?;
        }

        writeln!(out, "}}")?;
        Ok(())
    }
}

// The '^' prefix is not a valid Java identifier; private attributes share
// the public attr class.
fn java_class_name(tag: ResourceType) -> &'static str {
    match tag {
        ResourceType::AttrPrivate => "attr",
        ResourceType::Anim => "anim",
        ResourceType::Animator => "animator",
        ResourceType::Array => "array",
        ResourceType::Attr => "attr",
        ResourceType::Bool => "bool",
        ResourceType::Color => "color",
        ResourceType::Dimen => "dimen",
        ResourceType::Drawable => "drawable",
        ResourceType::Font => "font",
        ResourceType::Id => "id",
        ResourceType::Integer => "integer",
        ResourceType::Interpolator => "interpolator",
        ResourceType::Layout => "layout",
        ResourceType::Menu => "menu",
        ResourceType::Mipmap => "mipmap",
        ResourceType::Plurals => "plurals",
        ResourceType::Raw => "raw",
        ResourceType::String => "string",
        ResourceType::Style => "style",
        ResourceType::Transition => "transition",
        ResourceType::Xml => "xml",
    }
}

fn java_field_name(entry: &str) -> String {
    entry.replace('.', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{Diagnostics, Source};
    use crate::resources::{
        ConfigDescription, ConflictPolicy, Item, ResourceName, Value,
    };

    fn linked_table() -> ResourceTable {
        let mut table = ResourceTable::new();
        let diag = Diagnostics::new();
        for (name, policy) in [
            ("com.app:string/app_name", ConflictPolicy::Error),
            ("com.app:string/com.lib$msg", ConflictPolicy::MangleNewName),
            ("com.app:drawable/icon.round", ConflictPolicy::Error),
        ] {
            table.add_resource(
                &ResourceName::parse(name).unwrap(),
                &ConfigDescription::default(),
                "",
                Value::Item(Item::String("v".into())),
                Source::new("t"),
                policy,
                &diag,
            );
        }
        let package = table.find_package_mut("com.app").unwrap();
        package.id = Some(0x7f);
        for (type_ix, type_group) in package.types.iter_mut().enumerate() {
            type_group.id = Some((type_ix + 1) as u8);
            for (entry_ix, entry) in type_group.entries.iter_mut().enumerate() {
                entry.id = Some(entry_ix as u16);
            }
        }
        table
    }

    #[test]
    fn generates_fields_with_ids() {
        let table = linked_table();
        let generator = JavaClassGenerator::new(&table, JavaClassGeneratorOptions::default());
        let mut out = Vec::new();
        generator.generate("com.app", "com.app", &mut out).unwrap();
        let java = String::from_utf8(out).unwrap();

        assert!(java.contains("package com.app;"));
        assert!(java.contains("public static final class string"));
        assert!(java.contains("public static final int app_name=0x7f010000;"));
        // Dots become underscores.
        assert!(java.contains("public static final int icon_round=0x7f020000;"));
        // Mangled entries belong to the library package's R, not ours.
        assert!(!java.contains("msg"));
    }

    #[test]
    fn mangled_entries_unmangle_into_library_r() {
        let table = linked_table();
        let generator = JavaClassGenerator::new(&table, JavaClassGeneratorOptions::default());
        let mut out = Vec::new();
        generator.generate("com.lib", "com.lib", &mut out).unwrap();
        let java = String::from_utf8(out).unwrap();
        assert!(java.contains("public static final int msg=0x7f010001;"));
        assert!(!java.contains("app_name"));
    }

    #[test]
    fn non_final_ids() {
        let table = linked_table();
        let generator = JavaClassGenerator::new(
            &table,
            JavaClassGeneratorOptions {
                use_final: false,
                ..JavaClassGeneratorOptions::default()
            },
        );
        let mut out = Vec::new();
        generator.generate("com.app", "com.app", &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("public static int app_name"));
    }
}
