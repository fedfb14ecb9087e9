// Copyright 2025-2026 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]

//! # reslink
//!
//! A linker for pre-compiled Android resources. `reslink` ingests compiled
//! resource tables and compiled binary files, merges them with overlay
//! semantics against a manifest and a set of include archives, assigns stable
//! numeric identifiers, resolves symbolic references, versions XML resources
//! for multiple platform API levels, partitions the result across a base
//! package and configuration splits, and serializes each partition into an
//! output archive.
//!
//! # Architecture
//!
//! The library is organized into layers that mirror the linking pipeline:
//!
//! - **Resource layer**: the in-memory resource table model: packages,
//!   types, entries, configuration-keyed values, names and ids
//! - **Format layer**: the stable binary codecs for serialized tables,
//!   compiled binary XML and compiled-file containers
//! - **IO layer**: file collections (filesystem, zip archives, in-memory)
//!   and the archive writer facade (zip or directory output)
//! - **XML layer**: the XML document model shared by the manifest and all
//!   file-typed XML resources
//! - **Link layer**: the ordered passes (merging, id assignment, reference
//!   linking, product filtering, auto-versioning, version collapsing,
//!   file flattening) sequenced by the link driver
//! - **Split layer**: configuration-split partitioning and split manifest
//!   synthesis
//!
//! ## Key Components
//!
//! - [`crate::resources::ResourceTable`] - The mutable multi-package table
//! - [`crate::link::LinkCommand`] - The driver that sequences all passes
//! - [`crate::link::LinkOptions`] - Everything the driver can be told to do
//! - [`crate::diagnostics::Diagnostics`] - Source-carrying diagnostic sink
//! - [`crate::Error`] and [`crate::Result`] - Library-wide error handling
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use reslink::link::{LinkCommand, LinkOptions};
//!
//! let mut options = LinkOptions::default();
//! options.output_path = "out/app.apk".into();
//! options.manifest_path = "AndroidManifest.xml".into();
//!
//! let mut command = LinkCommand::new(options);
//! std::process::exit(command.run(&["res/compiled.arsc.flat".to_string()]));
//! ```

#[macro_use]
pub(crate) mod error;

pub mod diagnostics;
pub mod format;
pub mod io;
pub mod java;
pub mod link;
pub mod proguard;
pub mod resources;
pub mod split;
pub mod xml;

pub use error::Error;

/// Standard result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
