//! Moves non-public attributes out of a mixed `attr` type.
//!
//! When a package declares both public and non-public attributes, the
//! non-public ones are moved into the synthetic `^attr-private` type so the
//! public `attr` type can be assigned a stable, densely packed id range.
//! Packages whose attributes are uniformly public (or uniformly not) are
//! left untouched.

use crate::link::context::LinkContext;
use crate::resources::{ResourceTable, ResourceType, Visibility};

/// Run the mover over every package. Never fails.
pub fn move_private_attributes(_context: &LinkContext, table: &mut ResourceTable) -> bool {
    for package in &mut table.packages {
        let Some(attr_type) = package.find_type_mut(ResourceType::Attr) else {
            continue;
        };

        let has_public = attr_type
            .entries
            .iter()
            .any(|e| e.visibility == Visibility::Public);
        let has_private = attr_type
            .entries
            .iter()
            .any(|e| e.visibility != Visibility::Public);
        if !has_public || !has_private {
            continue;
        }

        let mut moved = Vec::new();
        attr_type.entries.retain_mut(|entry| {
            if entry.visibility == Visibility::Public {
                true
            } else {
                moved.push(std::mem::take(entry));
                false
            }
        });

        package
            .find_or_create_type(ResourceType::AttrPrivate)
            .entries
            .extend(moved);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{Diagnostics, Source};
    use crate::resources::{
        Attribute, ConfigDescription, ConflictPolicy, ResourceName, Value,
    };

    fn add_attr(table: &mut ResourceTable, name: &str, public: bool) {
        let diag = Diagnostics::new();
        let res_name = ResourceName::parse(name).unwrap();
        table.add_resource(
            &res_name,
            &ConfigDescription::default(),
            "",
            Value::Attribute(Attribute::any()),
            Source::new("attrs.arsc"),
            ConflictPolicy::Error,
            &diag,
        );
        if public {
            table.set_visibility(
                &res_name,
                Visibility::Public,
                Source::new("public.arsc"),
                &diag,
            );
        }
    }

    #[test]
    fn mixed_visibility_splits_the_type() {
        let ctx = LinkContext::new();
        let mut table = ResourceTable::new();
        add_attr(&mut table, "com.app:attr/public_one", true);
        add_attr(&mut table, "com.app:attr/internal_one", false);
        add_attr(&mut table, "com.app:attr/internal_two", false);

        assert!(move_private_attributes(&ctx, &mut table));

        let package = table.find_package("com.app").unwrap();
        let attrs = package.find_type(ResourceType::Attr).unwrap();
        assert_eq!(attrs.entries.len(), 1);
        assert_eq!(attrs.entries[0].name, "public_one");

        let private = package.find_type(ResourceType::AttrPrivate).unwrap();
        let names: Vec<_> = private.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["internal_one", "internal_two"]);
    }

    #[test]
    fn uniform_visibility_is_untouched() {
        let ctx = LinkContext::new();
        let mut table = ResourceTable::new();
        add_attr(&mut table, "com.app:attr/a", false);
        add_attr(&mut table, "com.app:attr/b", false);

        assert!(move_private_attributes(&ctx, &mut table));
        let package = table.find_package("com.app").unwrap();
        assert_eq!(package.find_type(ResourceType::Attr).unwrap().entries.len(), 2);
        assert!(package.find_type(ResourceType::AttrPrivate).is_none());
    }
}
