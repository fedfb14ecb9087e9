//! Per-document XML reference linking.
//!
//! Walks a document tree, resolves each resource-schema attribute to its
//! attribute resource id, compiles attribute values that are references or
//! primitives into typed items, and records the set of platform API levels
//! implied by the framework attributes used; the file-level auto versioner
//! consumes that set.

use std::collections::BTreeSet;

use crate::diagnostics::Source;
use crate::link::context::LinkContext;
use crate::link::reference_linker::link_reference;
use crate::link::sdk::find_attribute_sdk_level;
use crate::resources::{
    Item, Primitive, Reference, ReferenceType, ResourceName, ResourceType,
};
use crate::xml::{Element, XmlResource, SCHEMA_ANDROID, SCHEMA_RES_AUTO};

const SCHEMA_PREFIX: &str = "http://schemas.android.com/apk/res/";

/// Links one XML document and collects its implied platform levels.
#[derive(Default)]
pub struct XmlReferenceLinker {
    sdk_levels: BTreeSet<u16>,
}

impl XmlReferenceLinker {
    /// A fresh linker with no collected levels.
    #[must_use]
    pub fn new() -> Self {
        XmlReferenceLinker::default()
    }

    /// Platform levels implied by the last linked document, ascending.
    pub fn sdk_levels(&self) -> impl Iterator<Item = u16> + '_ {
        self.sdk_levels.iter().copied()
    }

    /// Link `doc` in place. Returns `false` on any resolution failure.
    pub fn consume(&mut self, context: &mut LinkContext, doc: &mut XmlResource) -> bool {
        self.sdk_levels.clear();
        context.symbols.start_pass();

        let callsite_package = if doc.name.package.is_empty() {
            context.compilation_package.clone()
        } else {
            doc.name.package.clone()
        };
        let source = doc.source.clone();
        let ok = self.link_element(context, &mut doc.root, &callsite_package, &source);

        context.symbols.end_pass();
        ok
    }

    fn link_element(
        &mut self,
        context: &mut LinkContext,
        element: &mut Element,
        callsite_package: &str,
        source: &Source,
    ) -> bool {
        let mut ok = true;
        let element_source = if element.line_number > 0 {
            source.at_line(element.line_number)
        } else {
            source.clone()
        };

        for attr in &mut element.attributes {
            // Resolve the attribute itself when it lives in a resource schema.
            if let Some(attr_package) =
                package_for_schema(&attr.namespace_uri, callsite_package)
            {
                let mut attr_ref = Reference::new_attribute(ResourceName::new(
                    attr_package,
                    ResourceType::Attr,
                    attr.name.clone(),
                ));
                match link_reference(context, &mut attr_ref, callsite_package, &element_source) {
                    None => {
                        ok = false;
                        continue;
                    }
                    Some(_record) => {
                        attr.resource_id = attr_ref.id;
                        if let Some(id) = attr_ref.id {
                            let level = find_attribute_sdk_level(id);
                            if level > 1 {
                                self.sdk_levels.insert(level);
                            }
                        }
                    }
                }
            }

            // Compile the value when it is a reference or a primitive.
            if let Some(mut reference) = parse_reference_value(&attr.value) {
                if link_reference(context, &mut reference, callsite_package, &element_source)
                    .is_some()
                {
                    attr.compiled_value = Some(Item::Reference(reference));
                } else {
                    ok = false;
                }
            } else if let Some(primitive) = parse_primitive_value(&attr.value) {
                attr.compiled_value = Some(Item::Primitive(primitive));
            }
        }

        for child in element.child_elements_mut() {
            ok &= self.link_element(context, child, callsite_package, source);
        }
        ok
    }
}

fn package_for_schema(uri: &str, callsite_package: &str) -> Option<String> {
    if uri == SCHEMA_RES_AUTO {
        return Some(callsite_package.to_string());
    }
    let package = uri.strip_prefix(SCHEMA_PREFIX)?;
    if uri == SCHEMA_ANDROID {
        return Some("android".to_string());
    }
    Some(package.to_string())
}

/// Parse `@[+][pkg:]type/entry` or `?[pkg:][attr/]entry` into a reference.
#[must_use]
pub(crate) fn parse_reference_value(value: &str) -> Option<Reference> {
    let mut chars = value.chars();
    let kind = match chars.next() {
        Some('@') => ReferenceType::Resource,
        Some('?') => ReferenceType::Attribute,
        _ => return None,
    };
    let rest = chars.as_str();
    // "@null" and "@empty" are primitives, not references.
    if rest == "null" || rest == "empty" {
        return None;
    }
    // Creation syntax: the id was exported at compile time, so '+' reads as
    // a plain reference here.
    let rest = rest.strip_prefix('+').unwrap_or(rest);

    let name = if rest.contains('/') {
        ResourceName::parse(rest)?
    } else if kind == ReferenceType::Attribute {
        // '?pkg:entry' shorthand implies the attr type.
        let (package, entry) = match rest.split_once(':') {
            Some((p, e)) => (p, e),
            None => ("", rest),
        };
        if entry.is_empty() {
            return None;
        }
        ResourceName::new(package, ResourceType::Attr, entry)
    } else {
        return None;
    };

    Some(Reference {
        name: Some(name),
        id: None,
        reference_type: kind,
        private: false,
        dynamic: false,
    })
}

fn parse_primitive_value(value: &str) -> Option<Primitive> {
    match value {
        "true" => return Some(Primitive::Bool(true)),
        "false" => return Some(Primitive::Bool(false)),
        _ => {}
    }
    if let Some(hex) = value.strip_prefix('#') {
        let parsed = match hex.len() {
            6 => u32::from_str_radix(hex, 16).ok().map(|v| v | 0xff00_0000),
            8 => u32::from_str_radix(hex, 16).ok(),
            _ => None,
        };
        if let Some(color) = parsed {
            return Some(Primitive::Color(color));
        }
    }
    if let Ok(int) = value.parse::<i32>() {
        return Some(Primitive::Int(int));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::link::symbols::TableSymbolSource;
    use crate::resources::{
        Attribute, ConfigDescription, ConflictPolicy, ResourceId, ResourceTable, Value,
        Visibility,
    };
    use crate::xml::inflate;

    fn framework_table() -> ResourceTable {
        let mut table = ResourceTable::new();
        let diag = Diagnostics::new();
        for (name, entry_id) in [("textColor", 0x0098u16), ("colorAccent", 0x0410u16)] {
            let res_name = ResourceName::new("android", ResourceType::Attr, name);
            table.add_resource(
                &res_name,
                &ConfigDescription::default(),
                "",
                Value::Attribute(Attribute::any()),
                Source::new("framework"),
                ConflictPolicy::Error,
                &diag,
            );
            table.set_visibility(&res_name, Visibility::Public, Source::new("framework"), &diag);
            let package = table.find_package_mut("android").unwrap();
            package.id = Some(0x01);
            package.types[0].id = Some(0x01);
            package
                .find_type_mut(ResourceType::Attr)
                .unwrap()
                .find_or_create_entry(name)
                .id = Some(entry_id);
        }
        // A public framework string for value references.
        let ok = table.add_resource(
            &ResourceName::parse("android:string/ok").unwrap(),
            &ConfigDescription::default(),
            "",
            Value::Item(Item::String("OK".into())),
            Source::new("framework"),
            ConflictPolicy::Error,
            &diag,
        );
        assert!(ok);
        table.set_visibility(
            &ResourceName::parse("android:string/ok").unwrap(),
            Visibility::Public,
            Source::new("framework"),
            &diag,
        );
        let package = table.find_package_mut("android").unwrap();
        let strings = package.find_type_mut(ResourceType::String).unwrap();
        strings.id = Some(0x05);
        strings.find_or_create_entry("ok").id = Some(0x0000);
        table
    }

    fn context() -> LinkContext {
        let mut ctx = LinkContext::new();
        ctx.compilation_package = "com.app".to_string();
        ctx.package_id = 0x7f;
        ctx.symbols
            .prepend_source(Box::new(TableSymbolSource::new(&framework_table())));
        ctx
    }

    #[test]
    fn links_attributes_and_collects_sdk_levels() {
        let mut ctx = context();
        let mut doc = inflate(
            concat!(
                "<View xmlns:android=\"http://schemas.android.com/apk/res/android\"\n",
                "      android:textColor=\"@android:string/ok\"\n",
                "      android:colorAccent=\"#112233\"/>\n",
            ),
            &Source::new("res/layout/main.xml"),
        )
        .unwrap();

        let mut linker = XmlReferenceLinker::new();
        assert!(linker.consume(&mut ctx, &mut doc));

        let text_color = doc.root.find_attribute(SCHEMA_ANDROID, "textColor").unwrap();
        assert_eq!(text_color.resource_id, Some(ResourceId(0x0101_0098)));
        match &text_color.compiled_value {
            Some(Item::Reference(r)) => assert_eq!(r.id, Some(ResourceId(0x0105_0000))),
            other => panic!("expected compiled reference, got {other:?}"),
        }

        let accent = doc.root.find_attribute(SCHEMA_ANDROID, "colorAccent").unwrap();
        assert_eq!(
            accent.compiled_value,
            Some(Item::Primitive(Primitive::Color(0xff11_2233)))
        );

        // colorAccent's entry id (0x0410) falls in the level-21 range.
        assert_eq!(linker.sdk_levels().collect::<Vec<_>>(), vec![21]);
    }

    #[test]
    fn unknown_attribute_fails() {
        let mut ctx = context();
        let mut doc = inflate(
            concat!(
                "<View xmlns:android=\"http://schemas.android.com/apk/res/android\"\n",
                "      android:nonexistent=\"1\"/>\n",
            ),
            &Source::new("res/layout/broken.xml"),
        )
        .unwrap();

        let mut linker = XmlReferenceLinker::new();
        assert!(!linker.consume(&mut ctx, &mut doc));
        assert!(ctx.diagnostics.has_errors());
    }

    #[test]
    fn reference_value_parsing() {
        let r = parse_reference_value("@string/name").unwrap();
        assert_eq!(r.reference_type, ReferenceType::Resource);
        let r = parse_reference_value("@+id/new_button").unwrap();
        assert_eq!(r.name.unwrap().to_string(), "id/new_button");
        let r = parse_reference_value("?android:colorAccent").unwrap();
        assert_eq!(r.name.unwrap().to_string(), "android:attr/colorAccent");
        assert!(parse_reference_value("plain text").is_none());
        assert!(parse_reference_value("@null").is_none());
    }
}
