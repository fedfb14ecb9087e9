//! Platform attribute API levels.
//!
//! Every framework attribute was introduced at some platform level, and the
//! framework assigns attribute entry ids in introduction order. The table
//! below maps the last attribute entry id finalized in each level, so the
//! level an attribute requires is found by scanning for the first range that
//! contains its entry id.

use crate::resources::ResourceId;

/// Platform level at which runtime resource overlays of attributes settled.
pub const SDK_LOLLIPOP: u16 = 21;

const FRAMEWORK_PACKAGE_ID: u8 = 0x01;
const ATTR_TYPE_ID: u8 = 0x01;

// (last attr entry id, platform level), ascending.
const FINAL_ATTR_IDS: &[(u16, u16)] = &[
    (0x021c, 1),
    (0x021d, 2),
    (0x0269, 3),
    (0x028d, 4),
    (0x02ad, 5),
    (0x02b3, 6),
    (0x02b5, 7),
    (0x02bd, 8),
    (0x02c5, 9),
    (0x034a, 11),
    (0x0361, 12),
    (0x0366, 13),
    (0x03a6, 14),
    (0x03ae, 15),
    (0x03cc, 16),
    (0x03da, 17),
    (0x03f1, 18),
    (0x0402, 19),
    (0x0405, 20),
    (0x044c, 21),
    (0x0454, 22),
    (0x0479, 23),
    (0x04a5, 24),
    (0x04bf, 25),
];

/// The platform level that introduced the framework attribute `id`.
///
/// Returns 0 for non-framework or non-attribute ids (they never force
/// versioning). Ids beyond the known ranges report the newest known level.
#[must_use]
pub fn find_attribute_sdk_level(id: ResourceId) -> u16 {
    if id.package_id() != FRAMEWORK_PACKAGE_ID || id.type_id() != ATTR_TYPE_ID {
        return 0;
    }
    let entry = id.entry_id();
    for &(last_entry, level) in FINAL_ATTR_IDS {
        if entry <= last_entry {
            return level;
        }
    }
    FINAL_ATTR_IDS[FINAL_ATTR_IDS.len() - 1].1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framework_attr_levels() {
        // First-level attribute.
        assert_eq!(find_attribute_sdk_level(ResourceId(0x0101_0000)), 1);
        // An attribute finalized in level 21.
        assert_eq!(find_attribute_sdk_level(ResourceId(0x0101_0410)), 21);
        // Beyond the table: newest known level.
        assert_eq!(find_attribute_sdk_level(ResourceId(0x0101_ffff)), 25);
    }

    #[test]
    fn non_framework_ids_do_not_version() {
        assert_eq!(find_attribute_sdk_level(ResourceId(0x7f01_0000)), 0);
        assert_eq!(find_attribute_sdk_level(ResourceId(0x0102_0000)), 0);
    }
}
