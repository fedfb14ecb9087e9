//! Input file handles and collections.
//!
//! Every compiled input the linker touches is presented as an opaque
//! [`InputFile`]: a source path plus a byte payload. Collections group files
//! from one origin (an explicit path list, a zip archive, an in-memory
//! container) and keep ownership for the whole run so late passes can still
//! read entry bytes.
//!
//! Filesystem files are memory-mapped on first access and stay mapped for the
//! lifetime of the handle.

use std::borrow::Cow;
use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use memmap2::Mmap;
use rustc_hash::FxHashMap;

use crate::diagnostics::Source;
use crate::Result;

/// An opaque handle to one input payload.
pub trait InputFile: Send + Sync {
    /// Where the payload comes from (path, or `archive@entry`).
    fn source(&self) -> &Source;

    /// The payload bytes.
    ///
    /// # Errors
    /// Returns an error if the underlying read fails.
    fn data(&self) -> Result<Cow<'_, [u8]>>;
}

/// A filesystem-backed input file, memory-mapped lazily.
pub struct FsFile {
    source: Source,
    path: PathBuf,
    map: OnceLock<Mmap>,
}

impl FsFile {
    /// Create a handle for `path`. The file is not opened until first read.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        FsFile {
            source: Source::new(path.to_string_lossy()),
            path,
            map: OnceLock::new(),
        }
    }
}

impl InputFile for FsFile {
    fn source(&self) -> &Source {
        &self.source
    }

    fn data(&self) -> Result<Cow<'_, [u8]>> {
        if self.map.get().is_none() {
            let file = File::open(&self.path)?;
            // Safety: the mapping is read-only and the linker treats inputs
            // as immutable for the duration of the run.
            let map = unsafe { Mmap::map(&file)? };
            let _ = self.map.set(map);
        }
        Ok(Cow::Borrowed(&self.map.get().expect("mapped above")[..]))
    }
}

/// An in-memory input file (zip entries, container segments, tests).
pub struct MemFile {
    source: Source,
    bytes: Vec<u8>,
}

impl MemFile {
    /// Wrap `bytes` with the given source label.
    #[must_use]
    pub fn new(source: Source, bytes: Vec<u8>) -> Self {
        MemFile { source, bytes }
    }
}

impl InputFile for MemFile {
    fn source(&self) -> &Source {
        &self.source
    }

    fn data(&self) -> Result<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(&self.bytes))
    }
}

/// A group of input files from one origin.
pub trait FileCollection {
    /// Find a file by its path within the collection.
    fn find(&self, path: &str) -> Option<Arc<dyn InputFile>>;

    /// Iterate all files in insertion order.
    fn files(&self) -> Box<dyn Iterator<Item = Arc<dyn InputFile>> + '_>;
}

/// A collection of explicitly inserted filesystem paths.
#[derive(Default)]
pub struct FsFileCollection {
    files: Vec<Arc<dyn InputFile>>,
    by_path: FxHashMap<String, usize>,
}

impl FsFileCollection {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        FsFileCollection::default()
    }

    /// Insert `path`, returning the (possibly pre-existing) handle.
    pub fn insert(&mut self, path: &str) -> Arc<dyn InputFile> {
        if let Some(&ix) = self.by_path.get(path) {
            return Arc::clone(&self.files[ix]);
        }
        let file: Arc<dyn InputFile> = Arc::new(FsFile::new(path));
        self.by_path.insert(path.to_string(), self.files.len());
        self.files.push(Arc::clone(&file));
        file
    }
}

impl FileCollection for FsFileCollection {
    fn find(&self, path: &str) -> Option<Arc<dyn InputFile>> {
        self.by_path.get(path).map(|&ix| Arc::clone(&self.files[ix]))
    }

    fn files(&self) -> Box<dyn Iterator<Item = Arc<dyn InputFile>> + '_> {
        Box::new(self.files.iter().map(Arc::clone))
    }
}

/// A collection of in-memory files, used for archive contents.
#[derive(Default)]
pub struct MemFileCollection {
    files: Vec<Arc<dyn InputFile>>,
    by_path: FxHashMap<String, usize>,
}

impl MemFileCollection {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        MemFileCollection::default()
    }

    /// Add a file under `path` within the collection.
    pub fn add(&mut self, path: impl Into<String>, file: Arc<dyn InputFile>) {
        let path = path.into();
        self.by_path.insert(path, self.files.len());
        self.files.push(file);
    }
}

impl FileCollection for MemFileCollection {
    fn find(&self, path: &str) -> Option<Arc<dyn InputFile>> {
        self.by_path.get(path).map(|&ix| Arc::clone(&self.files[ix]))
    }

    fn files(&self) -> Box<dyn Iterator<Item = Arc<dyn InputFile>> + '_> {
        Box::new(self.files.iter().map(Arc::clone))
    }
}
