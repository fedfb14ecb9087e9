//! Input collections and output archive writers.
//!
//! # Key Components
//!
//! - [`crate::io::file::InputFile`] / [`crate::io::file::FileCollection`] -
//!   opaque input handles grouped by origin
//! - [`crate::io::zip::ZipFileCollection`] - zip archive reader
//! - [`crate::io::archive::ArchiveWriter`] - output facade (zip or directory)

pub mod archive;
pub mod file;
pub mod zip;

pub use archive::{ArchiveWriter, DirectoryArchiveWriter, EntryFlags, ZipArchiveWriter};
pub use file::{FileCollection, FsFileCollection, InputFile, MemFile, MemFileCollection};
pub use zip::ZipFileCollection;
