//! Static library handling, stable-id round-trips and merge boundary cases.

mod common;

use common::{id_of, write_framework_include, write_manifest, write_table_unit, write_zip};

use reslink::diagnostics::{Diagnostics, Source};
use reslink::format::table::serialize_table;
use reslink::link::{parse_stable_id_map, LinkCommand, LinkOptions};
use reslink::resources::{
    ConfigDescription, ConflictPolicy, Item, Reference, ResourceName, ResourceTable, ResourceType,
    Value,
};

fn base_options(dir: &std::path::Path, package: &str) -> LinkOptions {
    let mut options = LinkOptions::default();
    options.output_path = dir.join("out.apk").to_string_lossy().into_owned();
    options.manifest_path = write_manifest(dir, package).to_string_lossy().into_owned();
    options.include_paths = vec![write_framework_include(dir).to_string_lossy().into_owned()];
    options
}

#[test]
fn static_library_input_is_mangled() {
    let dir = tempfile::tempdir().unwrap();
    let options = base_options(dir.path(), "com.app");

    // The library: com.lib with one string, packaged like a static lib.
    let mut lib_table = common::string_table("com.lib", "msg", "from lib");
    lib_table.find_package_mut("com.lib").unwrap().id = Some(0x7f);
    let lib_path = dir.path().join("lib.apk");
    write_zip(
        &lib_path,
        &[("resources.arsc.flat", &serialize_table(&lib_table))],
    );

    // The app: a string referencing the library symbol.
    let mut app_table = ResourceTable::new();
    let diag = Diagnostics::new();
    assert!(app_table.add_resource(
        &ResourceName::parse("com.app:string/uses_lib").unwrap(),
        &ConfigDescription::default(),
        "",
        Value::Item(Item::Reference(Reference::new(
            ResourceName::parse("com.lib:string/msg").unwrap(),
        ))),
        Source::new("res/values/refs.arsc"),
        ConflictPolicy::Error,
        &diag,
    ));
    let app_unit = write_table_unit(dir.path(), "app.arsc.flat", &app_table);

    let mut command = LinkCommand::new(options);
    let code = command.run(&[
        lib_path.to_string_lossy().into_owned(),
        app_unit.to_string_lossy().into_owned(),
    ]);
    let messages: Vec<String> = command.diagnostics().iter().map(ToString::to_string).collect();
    assert_eq!(code, 0, "link failed: {messages:?}");

    // The library entry landed in the app package under its mangled name.
    let mangled = ResourceName::new("com.app", ResourceType::String, "com.lib$msg");
    let table = command.final_table();
    assert!(table.find_entry(&mangled).is_some());
    assert!(table.find_package("com.lib").is_none());

    // The reference resolved to the mangled entry's id.
    let mangled_id = id_of(table, "com.app:string/com.lib$msg").unwrap();
    let entry = table
        .find_entry(&ResourceName::parse("com.app:string/uses_lib").unwrap())
        .unwrap();
    match &entry.values[0].value {
        Value::Item(Item::Reference(reference)) => {
            assert_eq!(reference.id.map(|id| id.0), Some(mangled_id));
        }
        other => panic!("expected reference, got {other:?}"),
    }
}

#[test]
fn static_lib_build_rejects_assigned_ids() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = base_options(dir.path(), "com.app");
    options.static_lib = true;
    options.no_auto_version = true;
    options.no_version_vectors = true;

    let mut table = common::string_table("com.app", "foo", "x");
    table.find_package_mut("com.app").unwrap().types[0].entries[0].id = Some(0x0007);
    let unit = write_table_unit(dir.path(), "bad.arsc.flat", &table);

    let mut command = LinkCommand::new(options);
    let code = command.run(&[unit.to_string_lossy().into_owned()]);
    assert_eq!(code, 1);
    assert!(command
        .diagnostics()
        .iter()
        .any(|d| d.message.contains("has ID")));
    // Failure happened before archive creation.
    assert!(!dir.path().join("out.apk").exists());
}

#[test]
fn emitted_ids_reproduce_the_assignment() {
    let dir = tempfile::tempdir().unwrap();

    let table = {
        let mut table = common::string_table("com.app", "zebra", "z");
        let diag = Diagnostics::new();
        for entry in ["apple", "mango"] {
            table.add_resource(
                &ResourceName::new("com.app", ResourceType::String, entry),
                &ConfigDescription::default(),
                "",
                Value::Item(Item::String(entry.to_string())),
                Source::new("res/values/strings.arsc"),
                ConflictPolicy::Error,
                &diag,
            );
        }
        table
    };

    // First run emits the id map.
    let run1 = dir.path().join("run1");
    std::fs::create_dir_all(&run1).unwrap();
    let ids_path = run1.join("ids.txt");
    let mut options = base_options(&run1, "com.app");
    options.resource_id_map_path = Some(ids_path.to_string_lossy().into_owned());
    let unit = write_table_unit(&run1, "unit.arsc.flat", &table);
    let mut command = LinkCommand::new(options);
    assert_eq!(code_of(&mut command, &unit), 0);
    let first_ids: Vec<Option<u32>> = ["zebra", "apple", "mango"]
        .iter()
        .map(|e| id_of(command.final_table(), &format!("com.app:string/{e}")))
        .collect();

    // Second run consumes it as the stable map.
    let run2 = dir.path().join("run2");
    std::fs::create_dir_all(&run2).unwrap();
    let mut options = base_options(&run2, "com.app");
    let diag = Diagnostics::new();
    let content = std::fs::read_to_string(&ids_path).unwrap();
    options.stable_id_map = parse_stable_id_map(&diag, "ids.txt", &content).unwrap();
    let unit = write_table_unit(&run2, "unit.arsc.flat", &table);
    let mut command = LinkCommand::new(options);
    assert_eq!(code_of(&mut command, &unit), 0);
    let second_ids: Vec<Option<u32>> = ["zebra", "apple", "mango"]
        .iter()
        .map(|e| id_of(command.final_table(), &format!("com.app:string/{e}")))
        .collect();

    assert_eq!(first_ids, second_ids);
    assert!(first_ids.iter().all(Option::is_some));
}

#[test]
fn overlay_cannot_add_resources_without_opt_in() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = base_options(dir.path(), "com.app");

    let base = common::string_table("com.app", "existing", "x");
    let overlay = common::string_table("com.app", "brand_new", "y");
    let base_unit = write_table_unit(dir.path(), "base.arsc.flat", &base);
    let overlay_unit = write_table_unit(dir.path(), "overlay.arsc.flat", &overlay);
    options.overlay_files = vec![overlay_unit.to_string_lossy().into_owned()];

    let mut command = LinkCommand::new(options);
    let code = command.run(&[base_unit.to_string_lossy().into_owned()]);
    assert_eq!(code, 1);
    assert!(command
        .diagnostics()
        .iter()
        .any(|d| d.message.contains("does not override an existing resource")));

    // With --auto-add-overlay the same inputs link fine.
    let dir2 = tempfile::tempdir().unwrap();
    let mut options = base_options(dir2.path(), "com.app");
    options.auto_add_overlay = true;
    let base_unit = write_table_unit(dir2.path(), "base.arsc.flat", &base);
    let overlay_unit = write_table_unit(dir2.path(), "overlay.arsc.flat", &overlay);
    options.overlay_files = vec![overlay_unit.to_string_lossy().into_owned()];
    let mut command = LinkCommand::new(options);
    assert_eq!(command.run(&[base_unit.to_string_lossy().into_owned()]), 0);
}

#[test]
fn overlapping_split_constraints_fail() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = base_options(dir.path(), "com.app");

    let diag = Diagnostics::new();
    for arg in ["a.apk:hdpi,en", "b.apk:en"] {
        let (path, constraints) =
            reslink::split::parse_split_parameter(&format!("{}/{arg}", dir.path().display()), &diag)
                .unwrap();
        options.split_paths.push(path);
        options.split_constraints.push(constraints);
    }

    let base = common::string_table("com.app", "foo", "x");
    let unit = write_table_unit(dir.path(), "base.arsc.flat", &base);

    let mut command = LinkCommand::new(options);
    assert_eq!(command.run(&[unit.to_string_lossy().into_owned()]), 1);
    assert!(command
        .diagnostics()
        .iter()
        .any(|d| d.message.contains("split configurations overlap")));
}

fn code_of(command: &mut LinkCommand, unit: &std::path::Path) -> i32 {
    let code = command.run(&[unit.to_string_lossy().into_owned()]);
    if code != 0 {
        let messages: Vec<String> =
            command.diagnostics().iter().map(ToString::to_string).collect();
        panic!("link failed: {messages:?}");
    }
    code
}
