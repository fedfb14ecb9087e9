//! Flattening file-typed resources into the output archive.
//!
//! Processing is three-phased per type group to keep output deterministic
//! and to sidestep the mutation-during-iteration hazard:
//!
//! 1. every file-typed config value is snapshotted into either a sorted map
//!    (non-XML, keyed by configuration and entry name) or a FIFO (XML)
//! 2. the FIFO is drained: each XML document is linked, optionally
//!    namespace-stripped, and auto-versioned; synthesized variants are
//!    pushed back onto the same FIFO, and registered in the table as new
//!    file references before anything is written
//! 3. the sorted map is emitted in key order
//!
//! Do not insert or remove table resources outside the FIFO while a type
//! group is being flattened; the snapshot in phase 1 is what keeps the
//! iteration stable.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::format::xml::{deserialize_xml, serialize_xml};
use crate::io::archive::{ArchiveWriter, EntryFlags};
use crate::io::file::InputFile;
use crate::link::auto_versioner::should_generate_versioned_resource;
use crate::link::context::LinkContext;
use crate::link::table_merger::build_resource_file_name;
use crate::link::xml_namespace_remover::XmlNamespaceRemover;
use crate::link::xml_reference_linker::XmlReferenceLinker;
use crate::proguard::{self, KeepSet};
use crate::resources::{
    ConfigDescription, ConflictPolicy, FileReference, Item, ResourceName, ResourceTable,
    ResourceType, Value,
};
use crate::xml::XmlResource;

/// Flattener behavior switches.
#[derive(Debug, Clone, Default)]
pub struct ResourceFileFlattenerOptions {
    /// Skip file-level auto-versioning.
    pub no_auto_version: bool,
    /// Never synthesize variants of vector drawables.
    pub no_version_vectors: bool,
    /// Strip namespace information from emitted XML.
    pub no_xml_namespaces: bool,
    /// Store every entry uncompressed.
    pub do_not_compress_anything: bool,
    /// Path suffixes that are stored, not deflated.
    pub extensions_to_not_compress: FxHashSet<String>,
    /// Collect obfuscation keep rules while linking.
    pub update_proguard_spec: bool,
}

struct FileOperation {
    config: ConfigDescription,
    res_name: ResourceName,
    dst_path: String,
    file_to_copy: Option<Arc<dyn InputFile>>,
    xml_to_flatten: Option<XmlResource>,
    skip_version: bool,
}

/// The file flattening pass.
pub struct ResourceFileFlattener<'a> {
    options: ResourceFileFlattenerOptions,
    keep_set: &'a mut KeepSet,
}

impl<'a> ResourceFileFlattener<'a> {
    /// Create a flattener; keep rules are accumulated into `keep_set`.
    pub fn new(options: ResourceFileFlattenerOptions, keep_set: &'a mut KeepSet) -> Self {
        ResourceFileFlattener { options, keep_set }
    }

    /// Emit every file-typed resource of `table` to `writer`.
    pub fn flatten(
        &mut self,
        context: &mut LinkContext,
        table: &mut ResourceTable,
        writer: &mut dyn ArchiveWriter,
    ) -> bool {
        let mut error = false;

        for package_ix in 0..table.packages.len() {
            for type_ix in 0..table.packages[package_ix].types.len() {
                // Sort by config and name for better locality in the archive.
                let mut config_sorted_files: BTreeMap<(ConfigDescription, String), FileOperation> =
                    BTreeMap::new();
                let mut file_operations: VecDeque<FileOperation> = VecDeque::new();

                // Phase 1: snapshot all file references of this type group.
                {
                    let package = &table.packages[package_ix];
                    let type_group = &package.types[type_ix];
                    for entry in &type_group.entries {
                        for config_value in &entry.values {
                            let Some(file_ref) = config_value.value.as_file_reference() else {
                                continue;
                            };
                            let Some(file) = &file_ref.file else {
                                context.diagnostics.error(
                                    config_value.source.clone(),
                                    format!("file not found for resource '{}'", entry.name),
                                );
                                return false;
                            };

                            let res_name = ResourceName::new(
                                package.name.clone(),
                                type_group.tag,
                                entry.name.clone(),
                            );
                            let src_path = file.source().path.clone();
                            let is_xml = type_group.tag != ResourceType::Raw
                                && (src_path.ends_with(".xml.flat") || src_path.ends_with(".xml"));

                            if is_xml {
                                match self.load_xml(context, file, &res_name, config_value) {
                                    Some(doc) => file_operations.push_back(FileOperation {
                                        config: config_value.config.clone(),
                                        res_name,
                                        dst_path: file_ref.path.clone(),
                                        file_to_copy: None,
                                        xml_to_flatten: Some(doc),
                                        skip_version: false,
                                    }),
                                    None => return false,
                                }
                            } else {
                                config_sorted_files.insert(
                                    (config_value.config.clone(), entry.name.clone()),
                                    FileOperation {
                                        config: config_value.config.clone(),
                                        res_name,
                                        dst_path: file_ref.path.clone(),
                                        file_to_copy: Some(Arc::clone(file)),
                                        xml_to_flatten: None,
                                        skip_version: false,
                                    },
                                );
                            }
                        }
                    }
                }

                // Phase 2: drain the XML queue; versioning pushes back here.
                while let Some(mut file_op) = file_operations.pop_front() {
                    if !self.link_and_version_xml_file(
                        context,
                        table,
                        &mut file_op,
                        &mut file_operations,
                    ) {
                        error = true;
                        continue;
                    }
                    let key = (file_op.config.clone(), file_op.res_name.entry.clone());
                    config_sorted_files.insert(key, file_op);
                }

                if error {
                    return false;
                }

                // Phase 3: emit in (config, entry-name) order.
                for file_op in config_sorted_files.values() {
                    if let Some(doc) = &file_op.xml_to_flatten {
                        if !self.write_entry(
                            context,
                            writer,
                            &file_op.dst_path,
                            &serialize_xml(&doc.root),
                            EntryFlags::COMPRESS,
                        ) {
                            error = true;
                        }
                    } else if let Some(file) = &file_op.file_to_copy {
                        let data = match file.data() {
                            Ok(data) => data,
                            Err(_) => {
                                context.diagnostics.error(
                                    file.source().clone(),
                                    "failed to open file".to_string(),
                                );
                                error = true;
                                continue;
                            }
                        };
                        let flags = self.compression_flags(&file_op.dst_path);
                        if !self.write_entry(context, writer, &file_op.dst_path, &data, flags) {
                            error = true;
                        }
                    }
                }
            }
        }
        !error
    }

    fn load_xml(
        &self,
        context: &LinkContext,
        file: &Arc<dyn InputFile>,
        res_name: &ResourceName,
        config_value: &crate::resources::ConfigValue,
    ) -> Option<XmlResource> {
        let data = match file.data() {
            Ok(data) => data,
            Err(_) => {
                context
                    .diagnostics
                    .error(file.source().clone(), "failed to open file".to_string());
                return None;
            }
        };
        match deserialize_xml(&data, file.source()) {
            Ok(root) => Some(XmlResource {
                name: res_name.clone(),
                config: config_value.config.clone(),
                source: file.source().clone(),
                root,
            }),
            Err(err) => {
                context
                    .diagnostics
                    .error(file.source().clone(), err.to_string());
                None
            }
        }
    }

    fn link_and_version_xml_file(
        &mut self,
        context: &mut LinkContext,
        table: &mut ResourceTable,
        file_op: &mut FileOperation,
        queue: &mut VecDeque<FileOperation>,
    ) -> bool {
        let doc = file_op.xml_to_flatten.as_mut().expect("queued op is XML");
        context.note(format!("linking {}", doc.source.path));

        let mut xml_linker = XmlReferenceLinker::new();
        if !xml_linker.consume(context, doc) {
            return false;
        }

        if self.options.update_proguard_spec {
            proguard::collect_rules(doc, self.keep_set);
        }

        if self.options.no_xml_namespaces {
            XmlNamespaceRemover::new(false).consume(context, doc);
        }

        if self.options.no_auto_version {
            return true;
        }
        if self.options.no_version_vectors
            && doc.root.namespace_uri.is_empty()
            && (doc.root.name == "vector" || doc.root.name == "animated-vector")
        {
            // We are NOT going to version this file.
            file_op.skip_version = true;
            return true;
        }

        let config = file_op.config.clone();
        let min_sdk = context.min_sdk_version;
        for sdk_level in xml_linker.sdk_levels() {
            if sdk_level > min_sdk && sdk_level > config.sdk_version {
                let entry = table
                    .find_entry(&file_op.res_name)
                    .expect("flattening an entry that exists");
                if !should_generate_versioned_resource(entry, &config, sdk_level) {
                    break;
                }

                let versioned_config = config.with_sdk_version(sdk_level);
                let dst_path = build_resource_file_name(
                    &file_op.res_name,
                    &versioned_config,
                    &doc.source.path,
                );

                context.note(format!(
                    "auto-versioning resource from config '{config}' -> '{versioned_config}'"
                ));

                // Register the new variant before it is flushed, so lookups
                // and the serialized table stay consistent.
                let added = table.add_resource(
                    &file_op.res_name,
                    &versioned_config,
                    "",
                    Value::Item(Item::FileReference(FileReference::new(
                        dst_path.clone(),
                        None,
                    ))),
                    doc.source.clone(),
                    ConflictPolicy::MangleNewName,
                    &context.diagnostics,
                );
                if !added {
                    return false;
                }

                let mut versioned_doc = doc.clone();
                versioned_doc.config = versioned_config.clone();
                queue.push_back(FileOperation {
                    config: versioned_config,
                    res_name: file_op.res_name.clone(),
                    dst_path,
                    file_to_copy: None,
                    xml_to_flatten: Some(versioned_doc),
                    skip_version: false,
                });
                break;
            }
        }
        true
    }

    fn compression_flags(&self, path: &str) -> EntryFlags {
        if self.options.do_not_compress_anything {
            return EntryFlags::empty();
        }
        for extension in &self.options.extensions_to_not_compress {
            if path.ends_with(extension.as_str()) {
                return EntryFlags::empty();
            }
        }
        EntryFlags::COMPRESS
    }

    fn write_entry(
        &self,
        context: &LinkContext,
        writer: &mut dyn ArchiveWriter,
        path: &str,
        data: &[u8],
        flags: EntryFlags,
    ) -> bool {
        context.note(format!("writing {path} to archive"));
        let result = writer
            .start_entry(path, flags)
            .and_then(|()| writer.write_entry(data))
            .and_then(|()| writer.finish_entry());
        if let Err(err) = result {
            context
                .diagnostics
                .error(None, format!("failed to write {path} to archive: {err}"));
            return false;
        }
        true
    }
}
