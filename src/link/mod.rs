//! The link pipeline: ordered passes over the final resource table.
//!
//! Pass order (the driver owns the sequencing): merge inputs → merge
//! overlays → verify external packages → \[app: move private attributes →
//! assign ids\] / \[static-lib: verify no ids\] → link references → filter
//! products → auto-version styles → collapse versions → split → flatten
//! files and emit archives.
//!
//! # Key Components
//!
//! - [`crate::link::LinkCommand`] / [`crate::link::LinkOptions`] - the driver
//! - [`crate::link::LinkContext`] - state threaded through every pass
//! - [`crate::link::TableMerger`] - append / overlay / mangle merging
//! - [`crate::link::IdAssigner`] - stable-map-aware id assignment
//! - [`crate::link::ReferenceLinker`] / [`crate::link::XmlReferenceLinker`] -
//!   symbolic reference resolution
//! - [`crate::link::AutoVersioner`] / [`crate::link::VersionCollapser`] -
//!   platform-level fan-out and collapse
//! - [`crate::link::ResourceFileFlattener`] - deterministic file emission

pub mod auto_versioner;
pub mod context;
pub mod driver;
pub mod file_flattener;
pub mod id_assigner;
pub mod manifest_fixer;
pub mod private_attribute_mover;
pub mod product_filter;
pub mod reference_linker;
pub mod sdk;
pub mod stable_ids;
pub mod symbols;
pub mod table_merger;
pub mod verify;
pub mod version_collapser;
pub mod xml_namespace_remover;
pub mod xml_reference_linker;

pub use auto_versioner::{should_generate_versioned_resource, AutoVersioner};
pub use context::LinkContext;
pub use driver::{LinkCommand, LinkOptions};
pub use file_flattener::{ResourceFileFlattener, ResourceFileFlattenerOptions};
pub use id_assigner::IdAssigner;
pub use manifest_fixer::{extract_app_info, AppInfo, ManifestFixer, ManifestFixerOptions};
pub use private_attribute_mover::move_private_attributes;
pub use product_filter::ProductFilter;
pub use reference_linker::ReferenceLinker;
pub use stable_ids::{
    collect_assigned_ids, load_stable_id_file, parse_stable_id_map, write_stable_id_file,
};
pub use symbols::{SymbolRecord, SymbolSource, SymbolTable, TableSymbolSource};
pub use table_merger::{TableMerger, TableMergerOptions};
pub use verify::{verify_no_external_packages, verify_no_ids_set};
pub use version_collapser::VersionCollapser;
pub use xml_namespace_remover::XmlNamespaceRemover;
pub use xml_reference_linker::XmlReferenceLinker;
