//! Table-level style auto-versioning.
//!
//! A style may use framework attributes that older platforms do not know;
//! the runtime chooser would then see unknown attributes. For every style
//! whose attributes require a platform level above both its configuration's
//! level and the build minimum, this pass synthesizes one additional config
//! value per distinct required level (a copy restricted to the attributes
//! that level understands) and strips the too-new attributes from the
//! original.
//!
//! A synthesized variant is only produced when no existing value already
//! covers the level ([`should_generate_versioned_resource`]).

use std::collections::BTreeSet;

use crate::link::context::LinkContext;
use crate::link::sdk::find_attribute_sdk_level;
use crate::resources::{
    ConfigDescription, ConfigValue, Entry, ResourceTable, ResourceType, Style, Value,
};

/// The style versioning pass.
pub struct AutoVersioner;

impl AutoVersioner {
    /// Fan out style values across required platform levels.
    pub fn consume(context: &LinkContext, table: &mut ResourceTable) -> bool {
        for package in &mut table.packages {
            for type_group in &mut package.types {
                if type_group.tag != ResourceType::Style {
                    continue;
                }
                for entry in &mut type_group.entries {
                    version_entry(context, entry);
                }
            }
        }
        true
    }
}

fn version_entry(context: &LinkContext, entry: &mut Entry) {
    let mut synthesized: Vec<ConfigValue> = Vec::new();

    for config_value in &entry.values {
        let Value::Style(style) = &config_value.value else {
            continue;
        };
        let base_level = config_value.config.sdk_version.max(context.min_sdk_version);

        let needed: BTreeSet<u16> = style
            .entries
            .iter()
            .filter_map(|style_entry| style_entry.key.id)
            .map(find_attribute_sdk_level)
            .filter(|&level| level > base_level)
            .collect();

        for &level in &needed {
            if !should_generate_versioned_resource(entry, &config_value.config, level) {
                continue;
            }
            if synthesized
                .iter()
                .any(|cv| cv.config == config_value.config.with_sdk_version(level))
            {
                continue;
            }
            let filtered = Style {
                parent: style.parent.clone(),
                entries: style
                    .entries
                    .iter()
                    .filter(|style_entry| {
                        style_entry
                            .key
                            .id
                            .map_or(true, |id| find_attribute_sdk_level(id) <= level)
                    })
                    .cloned()
                    .collect(),
            };
            if context.verbose {
                context.diagnostics.note(
                    config_value.source.clone(),
                    format!(
                        "auto-versioning style from config '{}' -> '{}'",
                        config_value.config,
                        config_value.config.with_sdk_version(level)
                    ),
                );
            }
            synthesized.push(ConfigValue {
                config: config_value.config.with_sdk_version(level),
                product: config_value.product.clone(),
                value: Value::Style(filtered),
                source: config_value.source.clone(),
            });
        }
    }

    // Strip too-new attributes from the originals.
    let min_sdk = context.min_sdk_version;
    for config_value in &mut entry.values {
        let base_level = config_value.config.sdk_version.max(min_sdk);
        if let Value::Style(style) = &mut config_value.value {
            style.entries.retain(|style_entry| {
                style_entry
                    .key
                    .id
                    .map_or(true, |id| find_attribute_sdk_level(id) <= base_level)
            });
        }
    }

    entry.values.extend(synthesized);
}

/// True when a variant of `config` at `sdk_level` would not be superseded by
/// an existing value: no value with the same non-sdk qualifiers already
/// carries a level in `(config.sdk_version, sdk_level]`.
#[must_use]
pub fn should_generate_versioned_resource(
    entry: &Entry,
    config: &ConfigDescription,
    sdk_level: u16,
) -> bool {
    !entry.values.iter().any(|cv| {
        cv.config.without_sdk_version() == config.without_sdk_version()
            && cv.config.sdk_version > config.sdk_version
            && cv.config.sdk_version <= sdk_level
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{Diagnostics, Source};
    use crate::resources::{
        ConflictPolicy, Item, Primitive, Reference, ResourceId, ResourceName, StyleEntry,
    };

    fn attr_entry(entry_id: u16) -> StyleEntry {
        let mut key = Reference::new_attribute(
            ResourceName::parse("android:attr/whatever").unwrap(),
        );
        key.id = Some(ResourceId::new(0x01, 0x01, entry_id));
        StyleEntry {
            key,
            value: Item::Primitive(Primitive::Int(1)),
        }
    }

    fn style_table(config: &str, entries: Vec<StyleEntry>) -> ResourceTable {
        let mut table = ResourceTable::new();
        let diag = Diagnostics::new();
        table.add_resource(
            &ResourceName::parse("com.app:style/Parent").unwrap(),
            &ConfigDescription::parse(config).unwrap(),
            "",
            Value::Style(Style {
                parent: None,
                entries,
            }),
            Source::new("styles.arsc"),
            ConflictPolicy::Error,
            &diag,
        );
        table
    }

    fn context(min_sdk: u16) -> LinkContext {
        let mut ctx = LinkContext::new();
        ctx.min_sdk_version = min_sdk;
        ctx
    }

    #[test]
    fn synthesizes_variant_and_strips_original() {
        // One attribute from level 1, one finalized in level 21.
        let mut table = style_table("", vec![attr_entry(0x0010), attr_entry(0x0410)]);
        let ctx = context(14);
        assert!(AutoVersioner::consume(&ctx, &mut table));

        let entry = table
            .find_entry(&ResourceName::parse("com.app:style/Parent").unwrap())
            .unwrap();
        assert_eq!(entry.values.len(), 2);

        let original = &entry.values[0];
        assert_eq!(original.config.sdk_version, 0);
        match &original.value {
            Value::Style(s) => assert_eq!(s.entries.len(), 1),
            _ => unreachable!(),
        }

        let versioned = &entry.values[1];
        assert_eq!(versioned.config.sdk_version, 21);
        match &versioned.value {
            Value::Style(s) => assert_eq!(s.entries.len(), 2),
            _ => unreachable!(),
        }
    }

    #[test]
    fn no_fanout_when_min_sdk_covers_it() {
        let mut table = style_table("", vec![attr_entry(0x0410)]);
        let ctx = context(21);
        assert!(AutoVersioner::consume(&ctx, &mut table));
        let entry = table
            .find_entry(&ResourceName::parse("com.app:style/Parent").unwrap())
            .unwrap();
        assert_eq!(entry.values.len(), 1);
        match &entry.values[0].value {
            Value::Style(s) => assert_eq!(s.entries.len(), 1),
            _ => unreachable!(),
        }
    }

    #[test]
    fn existing_variant_blocks_synthesis() {
        let mut table = style_table("", vec![attr_entry(0x0410)]);
        let diag = Diagnostics::new();
        // A hand-written v21 variant already exists.
        table.add_resource(
            &ResourceName::parse("com.app:style/Parent").unwrap(),
            &ConfigDescription::parse("v21").unwrap(),
            "",
            Value::Style(Style::default()),
            Source::new("styles.arsc"),
            ConflictPolicy::Error,
            &diag,
        );
        let ctx = context(14);
        assert!(AutoVersioner::consume(&ctx, &mut table));

        let entry = table
            .find_entry(&ResourceName::parse("com.app:style/Parent").unwrap())
            .unwrap();
        assert_eq!(entry.values.len(), 2);
    }

    #[test]
    fn idempotent_after_first_run() {
        let mut table = style_table("", vec![attr_entry(0x0010), attr_entry(0x0410)]);
        let ctx = context(14);
        AutoVersioner::consume(&ctx, &mut table);
        let snapshot = format!("{table:?}");
        AutoVersioner::consume(&ctx, &mut table);
        assert_eq!(format!("{table:?}"), snapshot);
    }
}
