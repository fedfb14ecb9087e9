//! Stable binary codecs for compiled inputs and outputs.
//!
//! Three wire formats, all little-endian and bounds-checked on decode:
//!
//! - [`crate::format::table`] - serialized resource tables (`.arsc.flat`
//!   inputs, `resources.arsc` / `resources.arsc.flat` outputs)
//! - [`crate::format::xml`] - compiled binary XML documents
//! - [`crate::format::container`] - `.flat` compiled-file containers bundling
//!   several payloads with their resource metadata

pub mod bytes;
pub mod container;
pub mod parser;
pub mod table;
pub mod xml;

pub use parser::Parser;
