//! Shared fixtures for the link pipeline integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use reslink::diagnostics::{Diagnostics, Source};
use reslink::format::table::serialize_table;
use reslink::io::{ArchiveWriter, EntryFlags, ZipArchiveWriter};
use reslink::resources::{
    Attribute, ConfigDescription, ConflictPolicy, Item, ResourceName, ResourceTable, ResourceType,
    Value, Visibility,
};

/// Write a plausible platform include archive: an `android` package with
/// assigned ids and the public attributes the tests reference.
pub fn write_framework_include(dir: &Path) -> PathBuf {
    let mut table = ResourceTable::new();
    let diag = Diagnostics::new();

    // (name, entry id); colorAccent's entry id falls in the level-21 range.
    let attrs: &[(&str, u16)] = &[
        ("hasCode", 0x000c),
        ("textColor", 0x0098),
        ("minSdkVersion", 0x020c),
        ("versionCode", 0x021b),
        ("versionName", 0x021c),
        ("targetSdkVersion", 0x0270),
        ("colorAccent", 0x0410),
    ];
    for (name, _) in attrs {
        let res_name = ResourceName::new("android", ResourceType::Attr, *name);
        assert!(table.add_resource(
            &res_name,
            &ConfigDescription::default(),
            "",
            Value::Attribute(Attribute::any()),
            Source::new("frameworks/base/core/res/attrs.arsc"),
            ConflictPolicy::Error,
            &diag,
        ));
        assert!(table.set_visibility(
            &res_name,
            Visibility::Public,
            Source::new("frameworks/base/core/res/public.arsc"),
            &diag,
        ));
    }
    assert!(!diag.has_errors());

    let package = table.find_package_mut("android").unwrap();
    package.id = Some(0x01);
    let attr_type = package.find_type_mut(ResourceType::Attr).unwrap();
    attr_type.id = Some(0x01);
    for (name, entry_id) in attrs {
        attr_type.find_or_create_entry(name).id = Some(*entry_id);
    }

    let path = dir.join("android.apk");
    write_zip(&path, &[("resources.arsc.flat", &serialize_table(&table))]);
    path
}

/// Write a zip archive with the given (path, payload) entries.
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).unwrap();
    let mut writer = ZipArchiveWriter::new(file);
    for (entry_path, payload) in entries {
        writer.start_entry(entry_path, EntryFlags::empty()).unwrap();
        writer.write_entry(payload).unwrap();
        writer.finish_entry().unwrap();
    }
    writer.finish().unwrap();
}

/// Write a manifest for `package` with `minSdkVersion` 14.
pub fn write_manifest(dir: &Path, package: &str) -> PathBuf {
    let path = dir.join("AndroidManifest.xml");
    std::fs::write(
        &path,
        format!(
            concat!(
                "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n",
                "<manifest xmlns:android=\"http://schemas.android.com/apk/res/android\"\n",
                "          package=\"{}\">\n",
                "  <uses-sdk android:minSdkVersion=\"14\"/>\n",
                "</manifest>\n",
            ),
            package
        ),
    )
    .unwrap();
    path
}

/// Serialize `table` to `<dir>/<name>` as a compilation unit.
pub fn write_table_unit(dir: &Path, name: &str, table: &ResourceTable) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serialize_table(table)).unwrap();
    path
}

/// Build a single-string table: `package:string/<entry> = <value>`.
pub fn string_table(package: &str, entry: &str, value: &str) -> ResourceTable {
    let mut table = ResourceTable::new();
    let diag = Diagnostics::new();
    assert!(table.add_resource(
        &ResourceName::new(package, ResourceType::String, entry),
        &ConfigDescription::default(),
        "",
        Value::Item(Item::String(value.to_string())),
        Source::new("res/values/strings.arsc"),
        ConflictPolicy::Error,
        &diag,
    ));
    table
}

/// The resolved id of `name` in `table`, if fully assigned.
pub fn id_of(table: &ResourceTable, name: &str) -> Option<u32> {
    let name = ResourceName::parse(name)?;
    let package = table.find_package(&name.package)?;
    let type_group = package.find_type(name.type_tag)?;
    let entry = type_group.find_entry(&name.entry)?;
    Some(
        ((package.id? as u32) << 24) | ((type_group.id? as u32) << 16) | entry.id? as u32,
    )
}
