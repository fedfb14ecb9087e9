//! The link driver: sequences every pass and owns all intermediate state.
//!
//! The pipeline is single-threaded and strictly sequential; each pass
//! consumes the final table, mutates it in place and reports success. A
//! failing pass aborts the run before the next pass starts, after its own
//! diagnostics have all been collected. Output archives are only opened
//! once every in-memory pass has succeeded; a failure during the streamed
//! file-flattening abandons the partially written archive.

use std::io::BufWriter;
use std::sync::Arc;

use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::diagnostics::{Diagnostics, Source};
use crate::format::container::read_container;
use crate::Error;
use crate::format::table::{deserialize_table, serialize_table};
use crate::format::xml::serialize_xml;
use crate::io::archive::{ArchiveWriter, DirectoryArchiveWriter, EntryFlags, ZipArchiveWriter};
use crate::io::file::{FileCollection, FsFileCollection, InputFile};
use crate::io::zip::ZipFileCollection;
use crate::java::{JavaClassGenerator, JavaClassGeneratorOptions, SymbolTypes};
use crate::link::auto_versioner::AutoVersioner;
use crate::link::context::LinkContext;
use crate::link::file_flattener::{ResourceFileFlattener, ResourceFileFlattenerOptions};
use crate::link::id_assigner::IdAssigner;
use crate::link::manifest_fixer::{
    extract_app_info, parse_sdk_version, ManifestFixer, ManifestFixerOptions,
};
use crate::link::private_attribute_mover::move_private_attributes;
use crate::link::product_filter::ProductFilter;
use crate::link::reference_linker::ReferenceLinker;
use crate::link::stable_ids::{collect_assigned_ids, write_stable_id_file};
use crate::link::symbols::TableSymbolSource;
use crate::link::table_merger::{TableMerger, TableMergerOptions};
use crate::link::verify::{verify_no_external_packages, verify_no_ids_set};
use crate::link::version_collapser::VersionCollapser;
use crate::link::xml_namespace_remover::XmlNamespaceRemover;
use crate::link::xml_reference_linker::XmlReferenceLinker;
use crate::proguard::{self, KeepSet};
use crate::resources::{NameManglerPolicy, ResourceId, ResourceName, ResourceTable};
use crate::split::{
    adjust_constraints_for_min_sdk, generate_split_manifest, SplitConstraints, TableSplitter,
    TableSplitterOptions,
};
use crate::xml::{inflate, XmlResource};

/// Everything the link invocation can be told to do.
#[derive(Default)]
pub struct LinkOptions {
    /// Output archive path (or directory with `output_to_directory`).
    pub output_path: String,
    /// Path to the manifest to build.
    pub manifest_path: String,
    /// Include archives (`-I`), repeatable.
    pub include_paths: Vec<String>,
    /// Overlay units (`-R`), applied after all positional inputs.
    pub overlay_files: Vec<String>,

    /// Directory in which to generate R.java.
    pub generate_java_class_path: Option<String>,
    /// Custom Java package for R.java.
    pub custom_java_package: Option<String>,
    /// Extra packages that get their own R.java.
    pub extra_java_packages: std::collections::BTreeSet<String>,
    /// Output file for generated keep rules.
    pub generate_proguard_rules_path: Option<String>,
    /// Output file for main-dex keep rules.
    pub generate_main_dex_proguard_rules_path: Option<String>,
    /// Package receiving private symbols in R.java.
    pub private_symbols: Option<String>,
    /// Javadoc annotations added to generated classes.
    pub javadoc_annotations: Vec<String>,
    /// Generate R.java without `final` fields.
    pub generate_non_final_ids: bool,

    /// Disable style and file auto-versioning.
    pub no_auto_version: bool,
    /// Never version vector drawables.
    pub no_version_vectors: bool,
    /// Build a static library instead of an app.
    pub static_lib: bool,
    /// Merge library packages under the app package.
    pub no_static_lib_packages: bool,
    /// Emit the archive contents as plain files under the output path.
    pub output_to_directory: bool,
    /// Strip namespace info from emitted XML.
    pub no_xml_namespaces: bool,
    /// Allow overlays to add new resources.
    pub auto_add_overlay: bool,
    /// Store every entry uncompressed.
    pub do_not_compress_anything: bool,
    /// Path suffixes stored uncompressed.
    pub extensions_to_not_compress: FxHashSet<String>,
    /// Manifest rewrites.
    pub manifest_fixer_options: ManifestFixerOptions,
    /// Product names to keep.
    pub products: FxHashSet<String>,

    /// Base-table filtering applied by the splitter.
    pub table_splitter_options: TableSplitterOptions,
    /// Split constraints, parallel to `split_paths`.
    pub split_constraints: Vec<SplitConstraints>,
    /// Split output paths, parallel to `split_constraints`.
    pub split_paths: Vec<String>,

    /// Name-to-id seed for assignment (`--stable-ids`).
    pub stable_id_map: FxHashMap<ResourceName, ResourceId>,
    /// Where to emit the assigned ids (`--emit-ids`).
    pub resource_id_map_path: Option<String>,

    /// Emit note-level diagnostics for every step.
    pub verbose: bool,
}

/// The link driver.
pub struct LinkCommand {
    options: LinkOptions,
    context: LinkContext,
    final_table: ResourceTable,
}

impl LinkCommand {
    /// Create a driver for one invocation.
    #[must_use]
    pub fn new(options: LinkOptions) -> Self {
        let mut context = LinkContext::new();
        context.verbose = options.verbose;
        LinkCommand {
            options,
            context,
            final_table: ResourceTable::new(),
        }
    }

    /// The diagnostics collected so far (render after `run`).
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.context.diagnostics
    }

    /// The linked table; meaningful after a successful [`LinkCommand::run`].
    #[must_use]
    pub fn final_table(&self) -> &ResourceTable {
        &self.final_table
    }

    /// Run the full pipeline. Returns the process exit code.
    pub fn run(&mut self, input_files: &[String]) -> i32 {
        match self.try_run(input_files) {
            Ok(()) => 0,
            Err(err) => {
                debug!("link failed: {err}");
                1
            }
        }
    }

    fn try_run(&mut self, input_files: &[String]) -> crate::Result<()> {
        // Load the manifest and establish the compilation package identity
        // before any rename rewrites it.
        let Some(mut manifest_xml) =
            load_xml(&self.options.manifest_path, &self.context.diagnostics)
        else {
            return Err(Error::ManifestInvalid("failed to load manifest".to_string()));
        };
        match extract_app_info(&self.context, &manifest_xml) {
            Some(app_info) => self.context.compilation_package = app_info.package,
            None => {
                return Err(Error::ManifestInvalid(
                    "manifest is missing required structure".to_string(),
                ))
            }
        }

        let fixer = ManifestFixer::new(self.options.manifest_fixer_options.clone());
        if !fixer.consume(&self.context, &mut manifest_xml) {
            return Err(Error::ManifestInvalid("manifest is invalid".to_string()));
        }

        let Some(app_info) = extract_app_info(&self.context, &manifest_xml) else {
            return Err(Error::ManifestInvalid("manifest is invalid".to_string()));
        };
        if let Some(min_sdk) = app_info
            .min_sdk_version
            .as_deref()
            .and_then(parse_sdk_version)
        {
            self.context.min_sdk_version = min_sdk;
        }

        let compilation_package = self.context.compilation_package.clone();
        self.context
            .set_mangler_policy(NameManglerPolicy::new(&compilation_package));
        self.context.package_id = if compilation_package == "android" {
            0x01
        } else {
            0x7f
        };

        if !self.load_symbols_from_include_paths() {
            return Err(Error::Error("failed loading include paths".to_string()));
        }

        self.context.note(format!(
            "linking package '{}' with package ID 0x{:02x}",
            self.context.compilation_package, self.context.package_id
        ));

        let merger_options = TableMergerOptions {
            auto_add_overlay: self.options.auto_add_overlay,
        };
        let no_static_lib_packages = self.options.no_static_lib_packages;
        let merged_packages = {
            let mut fs_files = FsFileCollection::new();
            let mut merger =
                TableMerger::new(&self.context, &mut self.final_table, merger_options);

            for input in input_files {
                if !merge_path(
                    &mut merger,
                    &self.context,
                    &mut fs_files,
                    input,
                    false,
                    no_static_lib_packages,
                ) {
                    self.context
                        .diagnostics
                        .error(Source::new(input.as_str()), "failed parsing input".to_string());
                    return Err(Error::MergeConflict("failed parsing input".to_string()));
                }
            }
            for input in &self.options.overlay_files {
                if !merge_path(
                    &mut merger,
                    &self.context,
                    &mut fs_files,
                    input,
                    true,
                    no_static_lib_packages,
                ) {
                    self.context
                        .diagnostics
                        .error(
                            Source::new(input.as_str()),
                            "failed parsing overlays".to_string(),
                        );
                    return Err(Error::MergeConflict("failed parsing overlays".to_string()));
                }
            }
            merger.merged_packages().clone()
        };

        if !verify_no_external_packages(&self.context, &mut self.final_table) {
            return Err(Error::MergeConflict(
                "resources defined for external packages".to_string(),
            ));
        }

        if self.options.static_lib {
            // Static libs are merged into other apps; carrying ids would
            // collide there.
            if !verify_no_ids_set(&self.context, &self.final_table) {
                return Err(Error::IdConflict(
                    "static library must not have ids assigned".to_string(),
                ));
            }
        } else {
            if !move_private_attributes(&self.context, &mut self.final_table) {
                self.context
                    .diagnostics
                    .error(None, "failed moving private attributes".to_string());
                return Err(Error::Error("failed moving private attributes".to_string()));
            }

            let assigner = IdAssigner::new(&self.options.stable_id_map);
            if !assigner.consume(&self.context, &mut self.final_table) {
                self.context
                    .diagnostics
                    .error(None, "failed assigning IDs".to_string());
                return Err(Error::IdConflict("failed assigning IDs".to_string()));
            }

            if let Some(id_map_path) = self.options.resource_id_map_path.clone() {
                let mut assigned = self.options.stable_id_map.clone();
                collect_assigned_ids(&self.final_table, &mut assigned);
                if !write_stable_id_file(&self.context.diagnostics, &assigned, &id_map_path) {
                    return Err(Error::OutputIo("failed writing the id map".to_string()));
                }
            }
        }

        // Now that the set of merged packages is known, references into them
        // can be rewritten to their mangled names.
        let mut policy = NameManglerPolicy::new(&compilation_package);
        policy.packages_to_mangle = merged_packages;
        self.context.set_mangler_policy(policy);

        self.context
            .symbols
            .prepend_source(Box::new(TableSymbolSource::new(&self.final_table)));

        if !ReferenceLinker::consume(&mut self.context, &mut self.final_table) {
            self.context
                .diagnostics
                .error(None, "failed linking references".to_string());
            return Err(Error::UnknownSymbol("failed linking references".to_string()));
        }

        if self.options.static_lib {
            if !self.options.products.is_empty() {
                self.context.diagnostics.warn(
                    None,
                    "can't select products when building static library".to_string(),
                );
            }
        } else {
            let product_filter = ProductFilter::new(self.options.products.clone());
            if !product_filter.consume(&self.context, &mut self.final_table) {
                self.context
                    .diagnostics
                    .error(None, "failed stripping products".to_string());
                return Err(Error::Error("failed stripping products".to_string()));
            }
        }

        if !self.options.no_auto_version
            && !AutoVersioner::consume(&self.context, &mut self.final_table)
        {
            self.context
                .diagnostics
                .error(None, "failed versioning styles".to_string());
            return Err(Error::VersioningImpossible(
                "failed versioning styles".to_string(),
            ));
        }

        if !self.options.static_lib && self.context.min_sdk_version > 0 {
            self.context.note(format!(
                "collapsing resource versions for minimum SDK {}",
                self.context.min_sdk_version
            ));
            if !VersionCollapser::consume(&self.context, &mut self.final_table) {
                return Err(Error::VersioningImpossible(
                    "failed collapsing versions".to_string(),
                ));
            }
        }

        let mut proguard_keep_set = KeepSet::new();
        let mut proguard_main_dex_keep_set = KeepSet::new();

        if self.options.static_lib {
            if self.options.table_splitter_options.config_filter.is_some()
                || self
                    .options
                    .table_splitter_options
                    .preferred_density
                    .is_some()
            {
                self.context.diagnostics.warn(
                    None,
                    "can't strip resources when building static library".to_string(),
                );
            }
        } else {
            // SDK-qualified constraints at or below the minimum can never
            // match post-collapse resources; strip the qualifier up front.
            let adjusted = adjust_constraints_for_min_sdk(
                &self.options.split_constraints,
                self.context.min_sdk_version,
            );
            let mut splitter =
                TableSplitter::new(adjusted.clone(), self.options.table_splitter_options.clone());
            if !splitter.verify_split_constraints(&self.context) {
                return Err(Error::SplitConstraintInvalid(
                    "split constraints overlap".to_string(),
                ));
            }
            splitter.split_table(&mut self.final_table);

            let split_paths = self.options.split_paths.clone();
            let split_tables = splitter.into_splits();
            for ((path, constraints), mut split_table) in
                split_paths.iter().zip(&adjusted).zip(split_tables)
            {
                self.context.note(format!(
                    "generating split '{path}' with configurations '{}'",
                    constraints.name()
                ));

                let Some(mut writer) = self.make_archive_writer(path) else {
                    return Err(Error::OutputIo("failed to create archive".to_string()));
                };

                let mut split_manifest = generate_split_manifest(&app_info, constraints);
                let mut manifest_linker = XmlReferenceLinker::new();
                if !manifest_linker.consume(&mut self.context, &mut split_manifest) {
                    self.context.diagnostics.error(
                        None,
                        "failed to create split AndroidManifest.xml".to_string(),
                    );
                    return Err(Error::ManifestInvalid(
                        "failed to create split AndroidManifest.xml".to_string(),
                    ));
                }

                if !self.write_apk(
                    writer.as_mut(),
                    &mut proguard_keep_set,
                    &split_manifest,
                    &mut split_table,
                ) {
                    return Err(Error::OutputIo("failed writing split archive".to_string()));
                }
            }
        }

        // Base package: link the real manifest, then write.
        let output_path = self.options.output_path.clone();
        let Some(mut writer) = self.make_archive_writer(&output_path) else {
            return Err(Error::OutputIo("failed to create archive".to_string()));
        };

        // The manifest has no resource name of its own; give it the
        // compilation package so it can see local resources.
        manifest_xml.name.package = compilation_package.clone();

        let mut manifest_linker = XmlReferenceLinker::new();
        if !manifest_linker.consume(&mut self.context, &mut manifest_xml) {
            self.context
                .diagnostics
                .error(None, "failed processing manifest".to_string());
            return Err(Error::ManifestInvalid(
                "failed processing manifest".to_string(),
            ));
        }
        if self.options.generate_proguard_rules_path.is_some() {
            proguard::collect_rules_for_manifest(&manifest_xml, &mut proguard_keep_set, false);
        }
        if self
            .options
            .generate_main_dex_proguard_rules_path
            .is_some()
        {
            proguard::collect_rules_for_manifest(
                &manifest_xml,
                &mut proguard_main_dex_keep_set,
                true,
            );
        }
        if self.options.no_xml_namespaces {
            // The platform package parser needs the URIs kept.
            XmlNamespaceRemover::new(true).consume(&self.context, &mut manifest_xml);
        }

        let mut final_table = std::mem::take(&mut self.final_table);
        let ok = self.write_apk(
            writer.as_mut(),
            &mut proguard_keep_set,
            &manifest_xml,
            &mut final_table,
        );
        self.final_table = final_table;
        if !ok {
            return Err(Error::OutputIo("failed writing archive".to_string()));
        }

        if !self.write_java_files() {
            return Err(Error::OutputIo("failed writing R.java".to_string()));
        }
        let proguard_path = self.options.generate_proguard_rules_path.clone();
        if !self.write_proguard_file(proguard_path.as_deref(), &proguard_keep_set) {
            return Err(Error::OutputIo("failed writing keep rules".to_string()));
        }
        let main_dex_path = self.options.generate_main_dex_proguard_rules_path.clone();
        if !self.write_proguard_file(main_dex_path.as_deref(), &proguard_main_dex_keep_set) {
            return Err(Error::OutputIo("failed writing keep rules".to_string()));
        }

        debug!(
            "linked {} package(s) into {}",
            self.final_table.packages.len(),
            self.options.output_path
        );
        Ok(())
    }

    fn load_symbols_from_include_paths(&mut self) -> bool {
        for path in &self.options.include_paths.clone() {
            self.context.note(format!("loading include path {path}"));

            let collection = match ZipFileCollection::open(path) {
                Ok(collection) => collection,
                Err(err) => {
                    self.context
                        .diagnostics
                        .error(Source::new(path.as_str()), err.to_string());
                    return false;
                }
            };
            let Some(table_file) = collection
                .find("resources.arsc.flat")
                .or_else(|| collection.find("resources.arsc"))
            else {
                self.context
                    .diagnostics
                    .error(
                        Source::new(path.as_str()),
                        "failed to load include path".to_string(),
                    );
                return false;
            };

            let mut table = match table_file
                .data()
                .and_then(|data| deserialize_table(&data, table_file.source()))
            {
                Ok(table) => table,
                Err(err) => {
                    self.context
                        .diagnostics
                        .error(Source::new(path.as_str()), err.to_string());
                    return false;
                }
            };

            let is_platform = table
                .packages
                .iter()
                .any(|p| p.name == "android" || p.id == Some(0x01));
            if !is_platform {
                // A static library include.
                if !self.options.static_lib {
                    self.context.diagnostics.error(
                        Source::new(path.as_str()),
                        "can't include static library when building app".to_string(),
                    );
                    return false;
                }
                if self.options.no_static_lib_packages {
                    if let Some(package) = table.find_package_by_id_mut(0x7f) {
                        package.name = self.context.compilation_package.clone();
                    }
                }
            }

            self.context
                .symbols
                .append_source(Box::new(TableSymbolSource::new(&table)));
        }
        true
    }

    fn make_archive_writer(&self, out: &str) -> Option<Box<dyn ArchiveWriter>> {
        if self.options.output_to_directory {
            Some(Box::new(DirectoryArchiveWriter::new(out)))
        } else {
            match std::fs::File::create(out) {
                Ok(file) => Some(Box::new(ZipArchiveWriter::new(BufWriter::new(file)))),
                Err(err) => {
                    self.context
                        .diagnostics
                        .error(Source::new(out), format!("failed to create archive: {err}"));
                    None
                }
            }
        }
    }

    /// Write the manifest, all file-typed resources, and the serialized
    /// table, in that fixed order.
    fn write_apk(
        &mut self,
        writer: &mut dyn ArchiveWriter,
        keep_set: &mut KeepSet,
        manifest: &XmlResource,
        table: &mut ResourceTable,
    ) -> bool {
        self.context
            .note("writing AndroidManifest.xml to archive".to_string());
        let manifest_bytes = serialize_xml(&manifest.root);
        if !write_archive_entry(
            &self.context.diagnostics,
            writer,
            "AndroidManifest.xml",
            &manifest_bytes,
            EntryFlags::COMPRESS,
        ) {
            return false;
        }

        let flattener_options = ResourceFileFlattenerOptions {
            no_auto_version: self.options.no_auto_version,
            no_version_vectors: self.options.no_version_vectors,
            no_xml_namespaces: self.options.no_xml_namespaces,
            do_not_compress_anything: self.options.do_not_compress_anything,
            extensions_to_not_compress: self.options.extensions_to_not_compress.clone(),
            update_proguard_spec: self.options.generate_proguard_rules_path.is_some(),
        };
        let mut flattener = ResourceFileFlattener::new(flattener_options, keep_set);
        if !flattener.flatten(&mut self.context, table, writer) {
            self.context
                .diagnostics
                .error(None, "failed linking file resources".to_string());
            return false;
        }

        let table_bytes = serialize_table(table);
        let (table_path, table_flags) = if self.options.static_lib {
            ("resources.arsc.flat", EntryFlags::empty())
        } else {
            ("resources.arsc", EntryFlags::ALIGN)
        };
        if !write_archive_entry(
            &self.context.diagnostics,
            writer,
            table_path,
            &table_bytes,
            table_flags,
        ) {
            return false;
        }

        if let Err(err) = writer.finish() {
            self.context
                .diagnostics
                .error(None, format!("failed to finalize archive: {err}"));
            return false;
        }
        true
    }

    fn write_java_files(&mut self) -> bool {
        let Some(out_dir) = self.options.generate_java_class_path.clone() else {
            return true;
        };

        let mut options = JavaClassGeneratorOptions {
            types: SymbolTypes::All,
            use_final: !(self.options.static_lib || self.options.generate_non_final_ids),
            javadoc_annotations: self.options.javadoc_annotations.clone(),
        };

        let actual_package = self.context.compilation_package.clone();
        let mut output_package = self
            .options
            .custom_java_package
            .clone()
            .unwrap_or_else(|| actual_package.clone());

        if let Some(private_package) = self.options.private_symbols.clone() {
            // Public symbols go to the original package; public and private
            // to the private-symbols package.
            options.types = SymbolTypes::Public;
            if !self.write_java_file(&out_dir, &actual_package, &output_package, &options) {
                return false;
            }
            options.types = SymbolTypes::PublicPrivate;
            output_package = private_package;
        }

        if !self.write_java_file(&out_dir, &actual_package, &output_package, &options) {
            return false;
        }

        for extra_package in self.options.extra_java_packages.clone() {
            if !self.write_java_file(&out_dir, &extra_package, &extra_package, &options) {
                return false;
            }
        }
        true
    }

    fn write_java_file(
        &mut self,
        out_dir: &str,
        package_to_generate: &str,
        out_package: &str,
        options: &JavaClassGeneratorOptions,
    ) -> bool {
        let mut out_path = std::path::PathBuf::from(out_dir);
        for part in out_package.split('.') {
            out_path.push(part);
        }
        if let Err(err) = std::fs::create_dir_all(&out_path) {
            self.context.diagnostics.error(
                None,
                format!("failed to create directory '{}': {err}", out_path.display()),
            );
            return false;
        }
        out_path.push("R.java");

        let generator = JavaClassGenerator::new(&self.final_table, options.clone());
        let mut buffer = Vec::new();
        if let Err(err) = generator.generate(package_to_generate, out_package, &mut buffer) {
            self.context.diagnostics.error(
                Source::new(out_path.to_string_lossy()),
                format!("failed generating R.java: {err}"),
            );
            return false;
        }
        if let Err(err) = std::fs::write(&out_path, buffer) {
            self.context.diagnostics.error(
                Source::new(out_path.to_string_lossy()),
                format!("failed writing R.java: {err}"),
            );
            return false;
        }
        true
    }

    fn write_proguard_file(&mut self, path: Option<&str>, keep_set: &KeepSet) -> bool {
        let Some(path) = path else { return true };
        let mut buffer = Vec::new();
        if let Err(err) = keep_set.write(&mut buffer) {
            self.context
                .diagnostics
                .error(Source::new(path), format!("failed writing keep rules: {err}"));
            return false;
        }
        if let Err(err) = std::fs::write(path, buffer) {
            self.context
                .diagnostics
                .error(Source::new(path), format!("failed writing to file: {err}"));
            return false;
        }
        true
    }
}

fn load_xml(path: &str, diag: &Diagnostics) -> Option<XmlResource> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            diag.error(Source::new(path), err.to_string());
            return None;
        }
    };
    match inflate(&content, &Source::new(path)) {
        Ok(doc) => Some(doc),
        Err(err) => {
            diag.error(Source::new(path), err.to_string());
            None
        }
    }
}

/// Merge one input path: a zip of units, a static library, a serialized
/// table, or a compiled-file container.
fn merge_path(
    merger: &mut TableMerger<'_>,
    context: &LinkContext,
    fs_files: &mut FsFileCollection,
    path: &str,
    overlay: bool,
    no_static_lib_packages: bool,
) -> bool {
    if path.ends_with(".flata")
        || path.ends_with(".jar")
        || path.ends_with(".jack")
        || path.ends_with(".zip")
    {
        return merge_archive(merger, context, path, overlay);
    }
    if path.ends_with(".apk") {
        return merge_static_library(merger, context, path, overlay, no_static_lib_packages);
    }
    let file = fs_files.insert(path);
    merge_file_with_collection(merger, context, &file, overlay, None)
}

fn merge_archive(
    merger: &mut TableMerger<'_>,
    context: &LinkContext,
    path: &str,
    overlay: bool,
) -> bool {
    context.note(format!("merging archive {path}"));
    let collection = match ZipFileCollection::open(path) {
        Ok(collection) => collection,
        Err(err) => {
            context
                .diagnostics
                .error(Source::new(path), err.to_string());
            return false;
        }
    };
    let mut error = false;
    let files: Vec<Arc<dyn InputFile>> = collection.files().collect();
    for file in files {
        if !merge_file_with_collection(merger, context, &file, overlay, Some(&collection)) {
            error = true;
        }
    }
    !error
}

fn merge_static_library(
    merger: &mut TableMerger<'_>,
    context: &LinkContext,
    path: &str,
    overlay: bool,
    no_static_lib_packages: bool,
) -> bool {
    context.note(format!("merging static library {path}"));
    let collection = match ZipFileCollection::open(path) {
        Ok(collection) => collection,
        Err(err) => {
            context
                .diagnostics
                .error(Source::new(path), err.to_string());
            return false;
        }
    };
    let Some(table_file) = collection.find("resources.arsc.flat") else {
        context
            .diagnostics
            .error(Source::new(path), "invalid static library".to_string());
        return false;
    };
    let mut table = match table_file
        .data()
        .and_then(|data| deserialize_table(&data, table_file.source()))
    {
        Ok(table) => table,
        Err(err) => {
            context
                .diagnostics
                .error(Source::new(path), err.to_string());
            return false;
        }
    };

    let Some(package_name) = table
        .find_package_by_id(0x7f)
        .map(|p| p.name.clone())
        .filter(|name| !name.is_empty())
    else {
        context
            .diagnostics
            .error(Source::new(path), "static library has no package".to_string());
        return false;
    };

    if no_static_lib_packages {
        // Legacy behaviour: everything merges into the app package.
        if let Some(package) = table.find_package_by_id_mut(0x7f) {
            package.name = String::new();
        }
        if overlay {
            merger.merge_overlay(&Source::new(path), table, Some(&collection))
        } else {
            merger.merge(&Source::new(path), table, Some(&collection))
        }
    } else {
        merger.merge_and_mangle(&Source::new(path), &package_name, table, Some(&collection))
    }
}

fn merge_file_with_collection(
    merger: &mut TableMerger<'_>,
    context: &LinkContext,
    file: &Arc<dyn InputFile>,
    overlay: bool,
    collection: Option<&dyn FileCollection>,
) -> bool {
    let src = file.source().clone();
    if src.path.ends_with(".arsc.flat") {
        context.note(format!("merging resource table {src}"));
        let table = match file
            .data()
            .and_then(|data| deserialize_table(&data, &src))
        {
            Ok(table) => table,
            Err(err) => {
                context.diagnostics.error(src, err.to_string());
                return false;
            }
        };
        return if overlay {
            merger.merge_overlay(&src, table, collection)
        } else {
            merger.merge(&src, table, collection)
        };
    }

    if src.path.ends_with(".flat") {
        let compiled_files = match read_container(file) {
            Ok(files) => files,
            Err(err) => {
                context.diagnostics.error(src, err.to_string());
                return false;
            }
        };
        for compiled in compiled_files {
            context.note(format!(
                "merging '{}' from compiled file {src}",
                compiled.desc.name
            ));
            if !merger.merge_file(&compiled.desc, overlay, compiled.file) {
                return false;
            }
        }
        return true;
    }

    // Anything else (classes.dex and friends inside archives) is ignored.
    true
}

fn write_archive_entry(
    diag: &Diagnostics,
    writer: &mut dyn ArchiveWriter,
    path: &str,
    data: &[u8],
    flags: EntryFlags,
) -> bool {
    let result = writer
        .start_entry(path, flags)
        .and_then(|()| writer.write_entry(data))
        .and_then(|()| writer.finish_entry());
    if let Err(err) = result {
        diag.error(None, format!("failed to write {path} to archive: {err}"));
        return false;
    }
    true
}
