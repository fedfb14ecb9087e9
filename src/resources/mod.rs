//! The in-memory resource model.
//!
//! A [`ResourceTable`] is an ordered sequence of packages, each holding typed
//! groups of entries whose values are keyed by configuration. Names, packed
//! ids, configuration descriptions, the closed value sum and the name mangler
//! all live here.
//!
//! # Key Components
//!
//! - [`crate::resources::ResourceTable`] - the mutable multi-package table
//! - [`crate::resources::ResourceName`] / [`crate::resources::ResourceId`] -
//!   symbolic and packed addressing
//! - [`crate::resources::ConfigDescription`] - the qualifier tuple keying values
//! - [`crate::resources::Value`] - the closed value sum
//! - [`crate::resources::NameMangler`] - deterministic `P$X` rewriting for
//!   merged library packages

mod config;
mod mangler;
mod name;
mod table;
mod value;

pub use config::{ConfigAxis, ConfigDescription, NightMode, Orientation, DENSITY_ANY, DENSITY_NONE};
pub use mangler::{NameMangler, NameManglerPolicy};
pub use name::{ResourceId, ResourceName, ResourceType};
pub use table::{
    ConfigValue, ConflictPolicy, Entry, Package, ResourceTable, TypeGroup, Visibility,
};
pub use value::{
    Array, Attribute, AttributeFormat, AttributeSymbol, FileReference, Item, Plural,
    PluralQuantity, Primitive, Reference, ReferenceType, Style, StyleEntry, Value,
};
