//! Resolving symbolic references inside table values.
//!
//! For every reference in every value: qualify the name with the compilation
//! package when it has none, rewrite it through the mangler when it points
//! into a merged library package, look it up in the symbol source stack, and
//! substitute the resolved id. Private symbols are only reachable from their
//! own package; unresolved references are fatal unless marked dynamic.
//!
//! Style entries get extra treatment: their keys must resolve to attribute
//! symbols, whose declared formats are used to finish cooking raw string
//! values (enum/flag symbol lookup).

use std::sync::Arc;

use crate::diagnostics::Source;
use crate::link::context::LinkContext;
use crate::link::symbols::SymbolRecord;
use crate::resources::{
    Attribute, AttributeFormat, Item, Primitive, Reference, ResourceName, ResourceTable, Value,
};

/// The value-level reference linking pass.
pub struct ReferenceLinker;

impl ReferenceLinker {
    /// Link every reference in `table`. Returns `false` if any reference
    /// failed to resolve or violated visibility.
    pub fn consume(context: &mut LinkContext, table: &mut ResourceTable) -> bool {
        context.symbols.start_pass();
        let mut error = false;

        for package_ix in 0..table.packages.len() {
            let package_name = table.packages[package_ix].name.clone();
            for type_ix in 0..table.packages[package_ix].types.len() {
                for entry_ix in 0..table.packages[package_ix].types[type_ix].entries.len() {
                    let value_count =
                        table.packages[package_ix].types[type_ix].entries[entry_ix].values.len();
                    for value_ix in 0..value_count {
                        // Values are taken out, linked, and put back, so the
                        // symbol stack can keep an immutable snapshot of the
                        // table prepended by the driver.
                        let entry =
                            &mut table.packages[package_ix].types[type_ix].entries[entry_ix];
                        let source = entry.values[value_ix].source.clone();
                        let mut value = entry.values[value_ix].value.clone();

                        if !link_value(context, &mut value, &package_name, &source) {
                            error = true;
                        }

                        let entry =
                            &mut table.packages[package_ix].types[type_ix].entries[entry_ix];
                        entry.values[value_ix].value = value;
                    }
                }
            }
        }

        context.symbols.end_pass();
        !error
    }
}

fn link_value(
    context: &mut LinkContext,
    value: &mut Value,
    callsite_package: &str,
    source: &Source,
) -> bool {
    match value {
        Value::Item(item) => link_item(context, item, callsite_package, source),
        Value::Attribute(attr) => {
            let mut ok = true;
            for symbol in &mut attr.symbols {
                ok &= link_reference(context, &mut symbol.symbol, callsite_package, source)
                    .is_some();
            }
            ok
        }
        Value::Style(style) => {
            let mut ok = true;
            if let Some(parent) = &mut style.parent {
                ok &= link_reference(context, parent, callsite_package, source).is_some();
            }
            for entry in &mut style.entries {
                match link_reference(context, &mut entry.key, callsite_package, source) {
                    None => ok = false,
                    Some(record) => match &record.attribute {
                        None => {
                            let key = describe_reference(&entry.key);
                            context.diagnostics.error(
                                source.clone(),
                                format!("style entry key '{key}' is not an attribute"),
                            );
                            ok = false;
                        }
                        Some(attribute) => {
                            let attribute = Arc::clone(attribute);
                            ok &= cook_style_item(
                                context,
                                &mut entry.value,
                                &attribute,
                                callsite_package,
                                source,
                            );
                        }
                    },
                }
            }
            ok
        }
        Value::Array(array) => {
            let mut ok = true;
            for item in &mut array.items {
                ok &= link_item(context, item, callsite_package, source);
            }
            ok
        }
        Value::Plural(plural) => {
            let mut ok = true;
            for item in plural.values.iter_mut().flatten() {
                ok &= link_item(context, item, callsite_package, source);
            }
            ok
        }
    }
}

fn link_item(
    context: &mut LinkContext,
    item: &mut Item,
    callsite_package: &str,
    source: &Source,
) -> bool {
    match item {
        Item::Reference(reference) => {
            link_reference(context, reference, callsite_package, source).is_some()
        }
        _ => true,
    }
}

// Cook a style value against the attribute's declared formats: raw strings
// naming an enum/flag symbol become integers, and anything else raw becomes
// a plain string when the attribute permits one.
fn cook_style_item(
    context: &mut LinkContext,
    item: &mut Item,
    attribute: &Attribute,
    callsite_package: &str,
    source: &Source,
) -> bool {
    if let Item::RawString(raw) = item {
        let raw = raw.clone();
        if attribute
            .format
            .intersects(AttributeFormat::ENUM | AttributeFormat::FLAGS)
        {
            let symbol_value = attribute.symbols.iter().find_map(|s| {
                s.symbol
                    .name
                    .as_ref()
                    .filter(|n| n.entry == raw)
                    .map(|_| s.value)
            });
            if let Some(v) = symbol_value {
                *item = Item::Primitive(Primitive::Int(v as i32));
                return true;
            }
        }
        if attribute.format.contains(AttributeFormat::STRING) {
            *item = Item::String(raw);
            return true;
        }
        context.diagnostics.error(
            source.clone(),
            format!("value \"{raw}\" is not valid for the given attribute"),
        );
        return false;
    }
    link_item(context, item, callsite_package, source)
}

/// Resolve one reference in place; returns the symbol record on success.
///
/// Resolution steps: qualify an empty package with the callsite's, rewrite
/// through the mangler for merged library packages, look up, enforce
/// visibility, substitute the id.
pub(crate) fn link_reference(
    context: &mut LinkContext,
    reference: &mut Reference,
    callsite_package: &str,
    source: &Source,
) -> Option<Arc<SymbolRecord>> {
    let Some(name) = reference.name.clone() else {
        if reference.id.is_some() {
            // Already resolved; find the record for callers that need
            // attribute metadata.
            return context
                .symbols
                .find_by_id(reference.id.expect("checked above"))
                .or_else(|| {
                    Some(Arc::new(SymbolRecord {
                        id: reference.id,
                        attribute: None,
                        is_public: true,
                    }))
                });
        }
        context
            .diagnostics
            .error(source.clone(), "reference has neither name nor id".to_string());
        return None;
    };

    let mut lookup = name.with_default_package(callsite_package);
    if let Some(mangled) = context.mangler.mangle(&lookup) {
        lookup = mangled;
    }

    let Some(record) = context.symbols.find_by_name(&lookup) else {
        if reference.dynamic {
            return Some(Arc::new(SymbolRecord {
                id: None,
                attribute: None,
                is_public: false,
            }));
        }
        context.diagnostics.error(
            source.clone(),
            format!("resource '{lookup}' not found"),
        );
        return None;
    };

    if !record.is_public && lookup.package != callsite_package {
        context.diagnostics.error(
            source.clone(),
            format!("resource '{lookup}' is private to package '{}'", lookup.package),
        );
        return None;
    }
    if !record.is_public {
        reference.private = true;
    }

    reference.name = Some(lookup);
    if record.id.is_some() {
        reference.id = record.id;
    }
    Some(record)
}

fn describe_reference(reference: &Reference) -> String {
    match (&reference.name, reference.id) {
        (Some(name), _) => name.to_string(),
        (None, Some(id)) => id.to_string(),
        (None, None) => "<empty>".to_string(),
    }
}
