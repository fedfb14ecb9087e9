//! Table verification passes.
//!
//! [`verify_no_external_packages`] runs after merging: any package that is
//! not the compilation package is reported and stripped. Generated `id`
//! resources landing in the `android` package are tolerated with a warning
//! for legacy reasons.
//!
//! [`verify_no_ids_set`] guards static-library output: a static library must
//! carry no type or entry ids, since they are assigned by the consumer.

use crate::link::context::LinkContext;
use crate::resources::{ResourceName, ResourceTable};

/// Report and strip packages other than the compilation package.
///
/// Returns `false` if any stripped package defined a non-`id` resource.
pub fn verify_no_external_packages(context: &LinkContext, table: &mut ResourceTable) -> bool {
    let is_external = |package: &crate::resources::Package| {
        package.name != context.compilation_package
            || package.id != Some(context.package_id)
    };

    let mut error = false;
    for package in table.packages.iter().filter(|p| is_external(p)) {
        for type_group in &package.types {
            for entry in &type_group.entries {
                let res_name =
                    ResourceName::new(package.name.clone(), type_group.tag, entry.name.clone());
                for config_value in &entry.values {
                    // Ids generated for the 'android' package are tolerated
                    // for legacy reasons.
                    if config_value.value.is_id() && package.name == "android" {
                        context.diagnostics.warn(
                            config_value.source.clone(),
                            format!(
                                "generated id '{res_name}' for external package '{}'",
                                package.name
                            ),
                        );
                    } else {
                        context.diagnostics.error(
                            config_value.source.clone(),
                            format!(
                                "defined resource '{res_name}' for external package '{}'",
                                package.name
                            ),
                        );
                        error = true;
                    }
                }
            }
        }
    }

    table.packages.retain(|p| !is_external(p));
    !error
}

/// Assert that no type or entry ids are assigned anywhere in the table.
pub fn verify_no_ids_set(context: &LinkContext, table: &ResourceTable) -> bool {
    for package in &table.packages {
        for type_group in &package.types {
            if let Some(id) = type_group.id {
                context.diagnostics.error(
                    None,
                    format!("type '{}' has ID 0x{id:02x} assigned", type_group.tag),
                );
                return false;
            }
            for entry in &type_group.entries {
                if let Some(id) = entry.id {
                    let res_name = ResourceName::new(
                        package.name.clone(),
                        type_group.tag,
                        entry.name.clone(),
                    );
                    context.diagnostics.error(
                        None,
                        format!("entry '{res_name}' has ID 0x{id:04x} assigned"),
                    );
                    return false;
                }
            }
        }
    }
    true
}
