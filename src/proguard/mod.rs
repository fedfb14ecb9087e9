//! Obfuscation keep-rule collection and emission.
//!
//! Class names referenced from resources must survive shrinking: custom
//! views in layouts, fragments, `android:onClick` handlers, and the
//! component classes named by the manifest. This module collects them into a
//! [`KeepSet`] while XML documents flow through the flattener, and writes
//! the final rule file.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use crate::diagnostics::Source;
use crate::resources::ResourceType;
use crate::xml::{Element, XmlResource, SCHEMA_ANDROID};

/// Collected keep rules: classes and method names with their referencing
/// sources.
#[derive(Debug, Default)]
pub struct KeepSet {
    classes: BTreeMap<String, BTreeSet<String>>,
    methods: BTreeMap<String, BTreeSet<String>>,
}

impl KeepSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        KeepSet::default()
    }

    /// Keep a class (with its constructors).
    pub fn add_class(&mut self, source: &Source, class: &str) {
        self.classes
            .entry(class.to_string())
            .or_default()
            .insert(source.to_string());
    }

    /// Keep a method on any class (onClick handlers).
    pub fn add_method(&mut self, source: &Source, method: &str) {
        self.methods
            .entry(method.to_string())
            .or_default()
            .insert(source.to_string());
    }

    /// True when nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.methods.is_empty()
    }

    /// Write the rules in deterministic order.
    ///
    /// # Errors
    /// Propagates writer failures.
    pub fn write(&self, out: &mut impl Write) -> std::io::Result<()> {
        for (class, sources) in &self.classes {
            for source in sources {
                writeln!(out, "# Referenced at {source}")?;
            }
            writeln!(out, "-keep class {class} {{ <init>(...); }}")?;
            writeln!(out)?;
        }
        for (method, sources) in &self.methods {
            for source in sources {
                writeln!(out, "# Referenced at {source}")?;
            }
            writeln!(out, "-keepclassmembers class * {{ *** {method}(...); }}")?;
            writeln!(out)?;
        }
        Ok(())
    }
}

/// Collect keep rules from a file-typed XML document.
pub fn collect_rules(doc: &XmlResource, keep_set: &mut KeepSet) {
    let collect_views = matches!(
        doc.name.type_tag,
        ResourceType::Layout | ResourceType::Transition | ResourceType::Xml
    );
    collect_element(&doc.root, &doc.source, collect_views, keep_set);
}

fn collect_element(element: &Element, source: &Source, collect_views: bool, keep_set: &mut KeepSet) {
    if collect_views && element.namespace_uri.is_empty() {
        // Custom views carry their fully qualified class as the tag.
        if element.name.contains('.') {
            keep_set.add_class(source, &element.name);
        }
        if element.name == "view" || element.name == "fragment" {
            if let Some(class) = element
                .find_attribute("", "class")
                .or_else(|| element.find_attribute(SCHEMA_ANDROID, "name"))
            {
                if !class.value.is_empty() {
                    keep_set.add_class(source, &class.value);
                }
            }
        }
    }
    if let Some(handler) = element.find_attribute(SCHEMA_ANDROID, "onClick") {
        keep_set.add_method(source, &handler.value);
    }
    for child in element.child_elements() {
        collect_element(child, source, collect_views, keep_set);
    }
}

const MANIFEST_COMPONENTS: &[&str] = &[
    "application",
    "activity",
    "activity-alias",
    "service",
    "receiver",
    "provider",
    "instrumentation",
];

/// Collect keep rules for the classes a manifest names.
///
/// With `main_dex_only`, only components that must live in the main dex
/// (those with `android:process` unset) are collected.
pub fn collect_rules_for_manifest(
    doc: &XmlResource,
    keep_set: &mut KeepSet,
    main_dex_only: bool,
) {
    let package = doc
        .root
        .find_attribute("", "package")
        .map(|a| a.value.clone())
        .unwrap_or_default();

    collect_manifest_element(&doc.root, &package, &doc.source, main_dex_only, keep_set);
}

fn collect_manifest_element(
    element: &Element,
    package: &str,
    source: &Source,
    main_dex_only: bool,
    keep_set: &mut KeepSet,
) {
    if element.namespace_uri.is_empty() && MANIFEST_COMPONENTS.contains(&element.name.as_str()) {
        let out_of_process = element
            .find_attribute(SCHEMA_ANDROID, "process")
            .map_or(false, |p| !p.value.is_empty());
        if !(main_dex_only && out_of_process) {
            if let Some(name) = element.find_attribute(SCHEMA_ANDROID, "name") {
                if let Some(class) = qualify_class(package, &name.value) {
                    keep_set.add_class(source, &class);
                }
            }
        }
    }
    for child in element.child_elements() {
        collect_manifest_element(child, package, source, main_dex_only, keep_set);
    }
}

// ".Foo" and bare names are relative to the manifest package.
fn qualify_class(package: &str, name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    if let Some(relative) = name.strip_prefix('.') {
        return Some(format!("{package}.{relative}"));
    }
    if name.contains('.') {
        Some(name.to_string())
    } else {
        Some(format!("{package}.{name}"))
    }
}
