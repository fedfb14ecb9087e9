//! End-to-end pipeline tests: overlay semantics, style auto-versioning,
//! split generation and output determinism.

mod common;

use common::{
    id_of, write_framework_include, write_manifest, write_table_unit,
};

use reslink::diagnostics::{Diagnostics, Source};
use reslink::format::container::{write_container, CompiledFileDesc};
use reslink::format::table::deserialize_table;
use reslink::format::xml::deserialize_xml;
use reslink::io::{FileCollection, ZipFileCollection};
use reslink::link::{LinkCommand, LinkOptions};
use reslink::resources::{
    ConfigDescription, ConflictPolicy, Item, Reference, ResourceName, ResourceTable, Style,
    StyleEntry, Value,
};
use reslink::split::parse_split_parameter;

fn base_options(dir: &std::path::Path, package: &str) -> LinkOptions {
    let mut options = LinkOptions::default();
    options.output_path = dir.join("out.apk").to_string_lossy().into_owned();
    options.manifest_path = write_manifest(dir, package).to_string_lossy().into_owned();
    options.include_paths = vec![write_framework_include(dir).to_string_lossy().into_owned()];
    options
}

fn run_ok(mut command: LinkCommand, inputs: &[String]) -> LinkCommand {
    let code = command.run(inputs);
    let messages: Vec<String> = command.diagnostics().iter().map(ToString::to_string).collect();
    assert_eq!(code, 0, "link failed: {messages:?}");
    command
}

#[test]
fn overlay_replaces_base_value() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = base_options(dir.path(), "com.app");

    let base = common::string_table("com.app", "foo", "hello");
    let overlay = common::string_table("com.app", "foo", "hi");
    let base_path = write_table_unit(dir.path(), "base.arsc.flat", &base);
    let overlay_path = write_table_unit(dir.path(), "overlay.arsc.flat", &overlay);
    options.overlay_files = vec![overlay_path.to_string_lossy().into_owned()];

    let command = run_ok(
        LinkCommand::new(options),
        &[base_path.to_string_lossy().into_owned()],
    );

    let entry = command
        .final_table()
        .find_entry(&ResourceName::parse("com.app:string/foo").unwrap())
        .unwrap();
    assert_eq!(entry.values.len(), 1);
    assert_eq!(
        entry.values[0].value,
        Value::Item(Item::String("hi".into()))
    );
    assert_eq!(
        id_of(command.final_table(), "com.app:string/foo"),
        Some(0x7f01_0000)
    );
}

#[test]
fn style_fans_out_for_newer_attributes() {
    let dir = tempfile::tempdir().unwrap();
    let options = base_options(dir.path(), "com.app");

    // A style using a level-21 framework attribute, built with minSdk 14.
    let mut table = ResourceTable::new();
    let diag = Diagnostics::new();
    assert!(table.add_resource(
        &ResourceName::parse("com.app:style/Parent").unwrap(),
        &ConfigDescription::default(),
        "",
        Value::Style(Style {
            parent: None,
            entries: vec![
                StyleEntry {
                    key: Reference::new_attribute(
                        ResourceName::parse("android:attr/textColor").unwrap(),
                    ),
                    value: Item::Primitive(reslink::resources::Primitive::Color(0xff00_0000)),
                },
                StyleEntry {
                    key: Reference::new_attribute(
                        ResourceName::parse("android:attr/colorAccent").unwrap(),
                    ),
                    value: Item::Primitive(reslink::resources::Primitive::Color(0xffff_4081)),
                },
            ],
        }),
        Source::new("res/values/styles.arsc"),
        ConflictPolicy::Error,
        &diag,
    ));
    let unit = write_table_unit(dir.path(), "styles.arsc.flat", &table);

    let command = run_ok(
        LinkCommand::new(options),
        &[unit.to_string_lossy().into_owned()],
    );

    let entry = command
        .final_table()
        .find_entry(&ResourceName::parse("com.app:style/Parent").unwrap())
        .unwrap();
    assert_eq!(entry.values.len(), 2, "expected original + v21 variant");

    let original = entry
        .values
        .iter()
        .find(|cv| cv.config.sdk_version == 0)
        .unwrap();
    let versioned = entry
        .values
        .iter()
        .find(|cv| cv.config.sdk_version == 21)
        .unwrap();
    match (&original.value, &versioned.value) {
        (Value::Style(orig), Value::Style(vers)) => {
            assert_eq!(orig.entries.len(), 1, "colorAccent stripped from original");
            assert_eq!(vers.entries.len(), 2, "v21 variant keeps both");
        }
        other => panic!("expected styles, got {other:?}"),
    }
}

#[test]
fn xml_file_versioning_synthesizes_variants() {
    let dir = tempfile::tempdir().unwrap();
    let options = base_options(dir.path(), "com.app");
    let output_path = options.output_path.clone();

    // A layout using a level-21 framework attribute, compiled into a
    // single-file container.
    let layout = reslink::xml::inflate(
        concat!(
            "<TextView xmlns:android=\"http://schemas.android.com/apk/res/android\"\n",
            "          android:colorAccent=\"#ff4081\"/>\n",
        ),
        &Source::new("res/layout/main.xml"),
    )
    .unwrap();
    let container = write_container(&[(
        CompiledFileDesc {
            name: ResourceName::parse("layout/main").unwrap(),
            config: ConfigDescription::default(),
            source: Source::new("res/layout/main.xml"),
            exported_symbols: vec![],
        },
        &reslink::format::xml::serialize_xml(&layout.root),
    )]);
    let unit = dir.path().join("layouts.flat");
    std::fs::write(&unit, container).unwrap();

    let command = run_ok(
        LinkCommand::new(options),
        &[unit.to_string_lossy().into_owned()],
    );

    // The synthesized variant was registered back into the table.
    let entry = command
        .final_table()
        .find_entry(&ResourceName::parse("com.app:layout/main").unwrap())
        .unwrap();
    let configs: Vec<String> = entry.values.iter().map(|cv| cv.config.to_string()).collect();
    assert!(configs.contains(&String::new()));
    assert!(configs.contains(&"v21".to_string()), "configs: {configs:?}");
    drop(command);

    // Both variants were emitted, and the v21 copy kept the attribute link.
    let apk = ZipFileCollection::open(&output_path).unwrap();
    assert!(apk.find("res/layout/main.xml").is_some());
    let versioned = apk.find("res/layout-v21/main.xml").unwrap();
    let doc = deserialize_xml(&versioned.data().unwrap(), &Source::new("main.xml")).unwrap();
    let attr = doc
        .find_attribute(reslink::xml::SCHEMA_ANDROID, "colorAccent")
        .unwrap();
    assert!(attr.resource_id.is_some());
    assert!(attr.compiled_value.is_some());
}

#[test]
fn split_claims_matching_configs() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = base_options(dir.path(), "com.app");

    // One drawable with a default and an hdpi variant, as a compiled-file
    // container.
    let container = write_container(&[
        (
            CompiledFileDesc {
                name: ResourceName::parse("drawable/foo").unwrap(),
                config: ConfigDescription::default(),
                source: Source::new("res/drawable/foo.png"),
                exported_symbols: vec![],
            },
            b"default png".as_slice(),
        ),
        (
            CompiledFileDesc {
                name: ResourceName::parse("drawable/foo").unwrap(),
                config: ConfigDescription::parse("hdpi").unwrap(),
                source: Source::new("res/drawable-hdpi/foo.png"),
                exported_symbols: vec![],
            },
            b"hdpi png".as_slice(),
        ),
    ]);
    let unit = dir.path().join("drawables.flat");
    std::fs::write(&unit, container).unwrap();

    let split_path = dir.path().join("out_hdpi.apk");
    let diag = Diagnostics::new();
    let (path, constraints) = parse_split_parameter(
        &format!("{}:hdpi", split_path.to_string_lossy()),
        &diag,
    )
    .unwrap();
    options.split_paths.push(path);
    options.split_constraints.push(constraints);

    let output_path = options.output_path.clone();
    let command = run_ok(
        LinkCommand::new(options),
        &[unit.to_string_lossy().into_owned()],
    );
    drop(command);

    // Base archive: default variant only, manifest first, table last.
    let base = ZipFileCollection::open(&output_path).unwrap();
    assert!(base.find("AndroidManifest.xml").is_some());
    let base_png = base.find("res/drawable/foo.png").unwrap();
    assert_eq!(&*base_png.data().unwrap(), b"default png");
    assert!(base.find("res/drawable-hdpi/foo.png").is_none());

    let base_table = base.find("resources.arsc").unwrap();
    let decoded =
        deserialize_table(&base_table.data().unwrap(), &Source::new("out.apk")).unwrap();
    let entry = decoded
        .find_entry(&ResourceName::parse("com.app:drawable/foo").unwrap())
        .unwrap();
    assert_eq!(entry.values.len(), 1);

    // Split archive: hdpi variant plus a synthesized manifest.
    let split = ZipFileCollection::open(split_path.to_str().unwrap()).unwrap();
    let split_png = split.find("res/drawable-hdpi/foo.png").unwrap();
    assert_eq!(&*split_png.data().unwrap(), b"hdpi png");
    assert!(split.find("res/drawable/foo.png").is_none());

    let manifest_bytes = split.find("AndroidManifest.xml").unwrap();
    let manifest = deserialize_xml(
        &manifest_bytes.data().unwrap(),
        &Source::new("AndroidManifest.xml"),
    )
    .unwrap();
    assert_eq!(manifest.name, "manifest");
    assert_eq!(
        manifest.find_attribute("", "split").unwrap().value,
        "config.hdpi"
    );
    assert_eq!(
        manifest.find_attribute("", "package").unwrap().value,
        "com.app"
    );
    let application = manifest.find_child("", "application").unwrap();
    assert_eq!(
        application
            .find_attribute(reslink::xml::SCHEMA_ANDROID, "hasCode")
            .unwrap()
            .value,
        "false"
    );
}

#[test]
fn identical_inputs_produce_identical_archives() {
    let dir = tempfile::tempdir().unwrap();

    let mut outputs = Vec::new();
    for run in 0..2 {
        let run_dir = dir.path().join(format!("run{run}"));
        std::fs::create_dir_all(&run_dir).unwrap();
        let options = base_options(&run_dir, "com.app");
        let output_path = options.output_path.clone();

        let mut table = common::string_table("com.app", "zebra", "z");
        let diag = Diagnostics::new();
        for (entry, config) in [("apple", "en"), ("apple", ""), ("mango", "")] {
            table.add_resource(
                &ResourceName::parse(&format!("com.app:string/{entry}")).unwrap(),
                &ConfigDescription::parse(config).unwrap(),
                "",
                Value::Item(Item::String(entry.to_string())),
                Source::new("res/values/strings.arsc"),
                ConflictPolicy::Error,
                &diag,
            );
        }
        let unit = write_table_unit(&run_dir, "unit.arsc.flat", &table);

        run_ok(
            LinkCommand::new(options),
            &[unit.to_string_lossy().into_owned()],
        );
        outputs.push(std::fs::read(output_path).unwrap());
    }

    assert_eq!(outputs[0], outputs[1], "archives differ between runs");
}
