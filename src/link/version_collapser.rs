//! Collapsing platform-level variants below the build minimum.
//!
//! Once the build minimum platform level is known, variants that can never
//! be chosen (their level is at or below the minimum, but a higher such
//! variant exists) are dropped, and the surviving variant loses its
//! platform-level qualifier. Static-library builds skip this pass; their
//! consumer decides the minimum.

use std::collections::BTreeMap;

use crate::link::context::LinkContext;
use crate::resources::{ConfigDescription, ResourceTable};

/// The version collapsing pass.
pub struct VersionCollapser;

impl VersionCollapser {
    /// Collapse variants superseded by `context.min_sdk_version`.
    pub fn consume(context: &LinkContext, table: &mut ResourceTable) -> bool {
        let min_sdk = context.min_sdk_version;
        if min_sdk == 0 {
            return true;
        }

        for package in &mut table.packages {
            for type_group in &mut package.types {
                for entry in &mut type_group.entries {
                    // Group by qualifiers-minus-sdk and product; within each
                    // group, the highest level <= min_sdk survives.
                    let mut best: BTreeMap<(ConfigDescription, String), (u16, usize)> =
                        BTreeMap::new();
                    for (ix, config_value) in entry.values.iter().enumerate() {
                        let sdk = config_value.config.sdk_version;
                        if sdk > min_sdk {
                            continue;
                        }
                        let key = (
                            config_value.config.without_sdk_version(),
                            config_value.product.clone(),
                        );
                        match best.get(&key) {
                            Some(&(best_sdk, _)) if best_sdk >= sdk => {}
                            _ => {
                                best.insert(key, (sdk, ix));
                            }
                        }
                    }

                    let survivors: Vec<usize> = best.values().map(|&(_, ix)| ix).collect();
                    let mut ix = 0usize;
                    entry.values.retain(|cv| {
                        let keep = cv.config.sdk_version > min_sdk || survivors.contains(&ix);
                        ix += 1;
                        keep
                    });

                    for config_value in &mut entry.values {
                        if config_value.config.sdk_version <= min_sdk {
                            config_value.config.sdk_version = 0;
                        }
                    }
                }
            }
        }
        true
    }
}
