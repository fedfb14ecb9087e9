//! Stable-id map loading and emission.
//!
//! The map file binds resource names to specific resolved ids so id
//! assignment stays stable across builds. One entry per line:
//!
//! ```text
//! com.app:string/app_name = 0x7f020000
//! ```
//!
//! Blank lines are ignored; anything else malformed is an error carrying
//! the line number. Emission (`--emit-ids`) writes names in sorted order so
//! re-running with the emitted file reproduces the same assignment.

use rustc_hash::FxHashMap;

use crate::diagnostics::{Diagnostics, Source};
use crate::resources::{ResourceId, ResourceName, ResourceTable};

/// Parse stable-id file content. `path` labels errors.
///
/// Returns `None` (with diagnostics) on the first invalid line.
#[must_use]
pub fn parse_stable_id_map(
    diag: &Diagnostics,
    path: &str,
    content: &str,
) -> Option<FxHashMap<ResourceName, ResourceId>> {
    let mut map = FxHashMap::default();
    for (line_ix, line) in content.lines().enumerate() {
        let line_no = (line_ix + 1) as u32;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some((name_str, id_str)) = line.split_once('=') else {
            diag.error(Source::with_line(path, line_no), "missing '='".to_string());
            return None;
        };

        let name_str = name_str.trim();
        let Some(name) = ResourceName::parse(name_str) else {
            diag.error(
                Source::with_line(path, line_no),
                format!("invalid resource name '{name_str}'"),
            );
            return None;
        };

        let id_str = id_str.trim();
        let Some(id) = ResourceId::parse(id_str) else {
            diag.error(
                Source::with_line(path, line_no),
                format!("invalid resource ID '{id_str}'"),
            );
            return None;
        };

        map.insert(name, id);
    }
    Some(map)
}

/// Load a stable-id file from disk.
#[must_use]
pub fn load_stable_id_file(
    diag: &Diagnostics,
    path: &str,
) -> Option<FxHashMap<ResourceName, ResourceId>> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_stable_id_map(diag, path, content.as_str()),
        Err(err) => {
            diag.error(
                Source::new(path),
                format!("failed reading stable ID file: {err}"),
            );
            None
        }
    }
}

/// Collect every assigned id of `table` into `map`.
pub fn collect_assigned_ids(
    table: &ResourceTable,
    map: &mut FxHashMap<ResourceName, ResourceId>,
) {
    for package in &table.packages {
        let Some(package_id) = package.id else { continue };
        for type_group in &package.types {
            let Some(type_id) = type_group.id else { continue };
            for entry in &type_group.entries {
                let Some(entry_id) = entry.id else { continue };
                map.insert(
                    ResourceName::new(package.name.clone(), type_group.tag, entry.name.clone()),
                    ResourceId::new(package_id, type_id, entry_id),
                );
            }
        }
    }
}

/// Write `map` to `path` in sorted order.
///
/// Reports failures through `diag` and returns `false`.
pub fn write_stable_id_file(
    diag: &Diagnostics,
    map: &FxHashMap<ResourceName, ResourceId>,
    path: &str,
) -> bool {
    let mut entries: Vec<(&ResourceName, &ResourceId)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let mut content = String::new();
    for (name, id) in entries {
        content.push_str(&format!("{name} = {id}\n"));
    }
    if let Err(err) = std::fs::write(path, content) {
        diag.error(Source::new(path), format!("failed writing to file: {err}"));
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entries_and_skips_blanks() {
        let diag = Diagnostics::new();
        let map = parse_stable_id_map(
            &diag,
            "ids.txt",
            "com.x:string/a = 0x7f020001\n\n  com.x:drawable/b=0x7f030000  \n",
        )
        .unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(
            map[&ResourceName::parse("com.x:string/a").unwrap()],
            ResourceId(0x7f02_0001)
        );
    }

    #[test]
    fn invalid_lines_carry_line_numbers() {
        let diag = Diagnostics::new();
        assert!(parse_stable_id_map(&diag, "ids.txt", "com.x:string/a 0x7f020001").is_none());
        let entry = diag.iter().next().unwrap();
        assert_eq!(entry.source.as_ref().unwrap().line, Some(1));

        let diag = Diagnostics::new();
        assert!(parse_stable_id_map(&diag, "ids.txt", "\nbogus/name = 0x7f020001").is_none());
        let entry = diag.iter().next().unwrap();
        assert_eq!(entry.source.as_ref().unwrap().line, Some(2));

        let diag = Diagnostics::new();
        assert!(parse_stable_id_map(&diag, "ids.txt", "com.x:string/a = seven").is_none());
    }

    #[test]
    fn emit_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.txt");
        let mut map = FxHashMap::default();
        map.insert(
            ResourceName::parse("com.x:string/a").unwrap(),
            ResourceId(0x7f02_0001),
        );
        map.insert(
            ResourceName::parse("com.x:drawable/b").unwrap(),
            ResourceId(0x7f03_0000),
        );

        let diag = Diagnostics::new();
        assert!(write_stable_id_file(
            &diag,
            &map,
            path.to_str().unwrap()
        ));
        let loaded = load_stable_id_file(&diag, path.to_str().unwrap()).unwrap();
        assert_eq!(loaded, map);
    }
}
