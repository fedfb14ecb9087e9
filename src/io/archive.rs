//! The archive writer facade.
//!
//! Output partitions are written through [`ArchiveWriter`]:
//! `start_entry` / `write_entry` (repeatable) / `finish_entry`, with a final
//! `finish` sealing the container. Two implementations exist:
//!
//! - [`ZipArchiveWriter`] honours the [`EntryFlags::COMPRESS`] (deflate) and
//!   [`EntryFlags::ALIGN`] (4-byte payload alignment, required for the
//!   serialized table) flags
//! - [`DirectoryArchiveWriter`] ignores both and emits raw files
//!
//! Any writer failure aborts the current entry; the driver reports it and
//! abandons the partially written archive.

use std::io::Write;
use std::path::PathBuf;

use bitflags::bitflags;
use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};

use crate::format::bytes::write_le;
use crate::{Error, Result};

bitflags! {
    /// Per-entry output options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EntryFlags: u32 {
        /// Deflate the payload.
        const COMPRESS = 1 << 0;
        /// 4-byte align the payload within the container.
        const ALIGN = 1 << 1;
    }
}

/// Sink for output archive entries.
pub trait ArchiveWriter {
    /// Begin a new entry at `path`.
    ///
    /// # Errors
    /// Returns [`Error::OutputIo`] when an entry is already open or the
    /// underlying sink fails.
    fn start_entry(&mut self, path: &str, flags: EntryFlags) -> Result<()>;

    /// Append payload bytes to the open entry. May be called repeatedly.
    ///
    /// # Errors
    /// Returns [`Error::OutputIo`] when no entry is open.
    fn write_entry(&mut self, data: &[u8]) -> Result<()>;

    /// Complete the open entry.
    ///
    /// # Errors
    /// Returns [`Error::OutputIo`] on sink failure.
    fn finish_entry(&mut self) -> Result<()>;

    /// Seal the container. No entries may follow.
    ///
    /// # Errors
    /// Returns [`Error::OutputIo`] on sink failure.
    fn finish(&mut self) -> Result<()>;
}

const LOCAL_SIG: u32 = 0x0403_4b50;
const CENTRAL_SIG: u32 = 0x0201_4b50;
const EOCD_SIG: u32 = 0x0605_4b50;
const VERSION: u16 = 20;
const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;

struct PendingEntry {
    path: String,
    flags: EntryFlags,
    data: Vec<u8>,
}

/// Zip container writer.
///
/// Entries are buffered until `finish_entry`, when the payload is optionally
/// deflated (kept stored if deflate would grow it), CRC'd and written with a
/// fixed zero timestamp so identical inputs produce identical archives.
pub struct ZipArchiveWriter<W: Write> {
    out: W,
    offset: usize,
    current: Option<PendingEntry>,
    central: Vec<u8>,
    entry_count: u16,
}

impl<W: Write> ZipArchiveWriter<W> {
    /// Create a writer over `out`.
    #[must_use]
    pub fn new(out: W) -> Self {
        ZipArchiveWriter {
            out,
            offset: 0,
            current: None,
            central: Vec::new(),
            entry_count: 0,
        }
    }

    fn emit(&mut self, bytes: &[u8]) -> Result<()> {
        self.out
            .write_all(bytes)
            .map_err(|e| Error::OutputIo(format!("failed writing archive: {e}")))?;
        self.offset += bytes.len();
        Ok(())
    }
}

impl<W: Write> ArchiveWriter for ZipArchiveWriter<W> {
    fn start_entry(&mut self, path: &str, flags: EntryFlags) -> Result<()> {
        if self.current.is_some() {
            return Err(Error::OutputIo(format!(
                "entry '{path}' started while another entry is open"
            )));
        }
        self.current = Some(PendingEntry {
            path: path.to_string(),
            flags,
            data: Vec::new(),
        });
        Ok(())
    }

    fn write_entry(&mut self, data: &[u8]) -> Result<()> {
        match &mut self.current {
            Some(entry) => {
                entry.data.extend_from_slice(data);
                Ok(())
            }
            None => Err(Error::OutputIo("write_entry with no open entry".to_string())),
        }
    }

    fn finish_entry(&mut self) -> Result<()> {
        let entry = self
            .current
            .take()
            .ok_or_else(|| Error::OutputIo("finish_entry with no open entry".to_string()))?;

        let mut crc = Crc::new();
        crc.update(&entry.data);
        let crc = crc.sum();

        let (method, payload) = if entry.flags.contains(EntryFlags::COMPRESS) {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(&entry.data)
                .and_then(|()| encoder.finish())
                .map_err(|e| Error::OutputIo(format!("deflate failed: {e}")))
                .and_then(|compressed| {
                    if compressed.len() < entry.data.len() {
                        Ok((METHOD_DEFLATED, compressed))
                    } else {
                        Ok((METHOD_STORED, entry.data.clone()))
                    }
                })?
        } else {
            (METHOD_STORED, entry.data.clone())
        };

        // Alignment is achieved by padding the local header's extra field so
        // the payload itself starts on a 4-byte boundary.
        let header_end = self.offset + 30 + entry.path.len();
        let padding = if entry.flags.contains(EntryFlags::ALIGN) {
            (4 - header_end % 4) % 4
        } else {
            0
        };

        let local_offset = self.offset;
        let mut header = Vec::with_capacity(30 + entry.path.len() + padding);
        write_le(&mut header, LOCAL_SIG);
        write_le(&mut header, VERSION);
        write_le(&mut header, 0u16); // general purpose flags
        write_le(&mut header, method);
        write_le(&mut header, 0u16); // mod time, fixed for determinism
        write_le(&mut header, 0u16); // mod date
        write_le(&mut header, crc);
        write_le(&mut header, payload.len() as u32);
        write_le(&mut header, entry.data.len() as u32);
        write_le(&mut header, entry.path.len() as u16);
        write_le(&mut header, padding as u16);
        header.extend_from_slice(entry.path.as_bytes());
        header.resize(header.len() + padding, 0);
        self.emit(&header)?;
        self.emit(&payload)?;

        write_le(&mut self.central, CENTRAL_SIG);
        write_le(&mut self.central, VERSION); // version made by
        write_le(&mut self.central, VERSION); // version needed
        write_le(&mut self.central, 0u16);
        write_le(&mut self.central, method);
        write_le(&mut self.central, 0u16);
        write_le(&mut self.central, 0u16);
        write_le(&mut self.central, crc);
        write_le(&mut self.central, payload.len() as u32);
        write_le(&mut self.central, entry.data.len() as u32);
        write_le(&mut self.central, entry.path.len() as u16);
        write_le(&mut self.central, 0u16); // extra len
        write_le(&mut self.central, 0u16); // comment len
        write_le(&mut self.central, 0u16); // disk
        write_le(&mut self.central, 0u16); // internal attributes
        write_le(&mut self.central, 0u32); // external attributes
        write_le(&mut self.central, local_offset as u32);
        self.central.extend_from_slice(entry.path.as_bytes());

        self.entry_count += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.current.is_some() {
            return Err(Error::OutputIo(
                "archive finished with an entry still open".to_string(),
            ));
        }
        let central_offset = self.offset;
        let central = std::mem::take(&mut self.central);
        self.emit(&central)?;

        let mut eocd = Vec::with_capacity(22);
        write_le(&mut eocd, EOCD_SIG);
        write_le(&mut eocd, 0u16); // this disk
        write_le(&mut eocd, 0u16); // central dir disk
        write_le(&mut eocd, self.entry_count);
        write_le(&mut eocd, self.entry_count);
        write_le(&mut eocd, central.len() as u32);
        write_le(&mut eocd, central_offset as u32);
        write_le(&mut eocd, 0u16); // comment len
        self.emit(&eocd)?;
        self.out
            .flush()
            .map_err(|e| Error::OutputIo(format!("failed flushing archive: {e}")))
    }
}

/// Writes entries as plain files under a root directory.
///
/// Compression and alignment flags are ignored.
pub struct DirectoryArchiveWriter {
    root: PathBuf,
    current: Option<(PathBuf, Vec<u8>)>,
}

impl DirectoryArchiveWriter {
    /// Create a writer rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryArchiveWriter {
            root: root.into(),
            current: None,
        }
    }
}

impl ArchiveWriter for DirectoryArchiveWriter {
    fn start_entry(&mut self, path: &str, _flags: EntryFlags) -> Result<()> {
        if self.current.is_some() {
            return Err(Error::OutputIo(format!(
                "entry '{path}' started while another entry is open"
            )));
        }
        self.current = Some((self.root.join(path), Vec::new()));
        Ok(())
    }

    fn write_entry(&mut self, data: &[u8]) -> Result<()> {
        match &mut self.current {
            Some((_, buffer)) => {
                buffer.extend_from_slice(data);
                Ok(())
            }
            None => Err(Error::OutputIo("write_entry with no open entry".to_string())),
        }
    }

    fn finish_entry(&mut self) -> Result<()> {
        let (path, data) = self
            .current
            .take()
            .ok_or_else(|| Error::OutputIo("finish_entry with no open entry".to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::OutputIo(format!("failed creating '{}': {e}", parent.display())))?;
        }
        std::fs::write(&path, data)
            .map_err(|e| Error::OutputIo(format!("failed writing '{}': {e}", path.display())))
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
