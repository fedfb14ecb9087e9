//! Minimal zip archive reader for include and input archives.
//!
//! The linker only needs to enumerate an archive's entries and read their
//! payloads (stored or deflated); no zip64, encryption or data-descriptor
//! support. Entries are decompressed eagerly at open time into an in-memory
//! collection so the payload bytes stay available to every later pass.

use std::io::Read;
use std::sync::Arc;

use flate2::read::DeflateDecoder;

use crate::diagnostics::Source;
use crate::format::bytes::read_le_at;
use crate::io::file::{FileCollection, InputFile, MemFile, MemFileCollection};
use crate::Result;

const EOCD_SIG: u32 = 0x0605_4b50;
const CENTRAL_SIG: u32 = 0x0201_4b50;
const LOCAL_SIG: u32 = 0x0403_4b50;
const EOCD_MIN: usize = 22;
const LOCAL_MIN: usize = 30;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;

/// An opened zip archive with all entries decompressed in memory.
pub struct ZipFileCollection {
    collection: MemFileCollection,
}

impl ZipFileCollection {
    /// Open and fully read the archive at `path`.
    ///
    /// # Errors
    /// Returns an error on I/O failure or when the archive structure is
    /// malformed (bad signatures, truncated records, unsupported method).
    pub fn open(path: &str) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(path, &data)
    }

    /// Parse an archive already loaded into memory. `label` names the
    /// archive in entry sources (`label@entry`).
    ///
    /// # Errors
    /// Same conditions as [`ZipFileCollection::open`].
    pub fn from_bytes(label: &str, data: &[u8]) -> Result<Self> {
        let eocd = find_eocd(data)
            .ok_or_else(|| malformed_error!("{}: no end-of-central-directory record", label))?;

        let mut offset = eocd + 10;
        let entry_count = read_le_at::<u16>(data, &mut offset)? as usize;
        let mut offset = eocd + 16;
        let central_offset = read_le_at::<u32>(data, &mut offset)? as usize;

        let mut collection = MemFileCollection::new();
        let mut offset = central_offset;
        for _ in 0..entry_count {
            let sig = read_le_at::<u32>(data, &mut offset)?;
            if sig != CENTRAL_SIG {
                return Err(malformed_error!(
                    "{}: bad central directory signature 0x{:08x}",
                    label,
                    sig
                ));
            }
            offset += 6; // versions, flags
            let mut cursor = offset;
            let method = read_le_at::<u16>(data, &mut cursor)?;
            cursor += 8; // time, date, crc
            let compressed_size = read_le_at::<u32>(data, &mut cursor)? as usize;
            let uncompressed_size = read_le_at::<u32>(data, &mut cursor)? as usize;
            let name_len = read_le_at::<u16>(data, &mut cursor)? as usize;
            let extra_len = read_le_at::<u16>(data, &mut cursor)? as usize;
            let comment_len = read_le_at::<u16>(data, &mut cursor)? as usize;
            cursor += 8; // disk, attributes
            let local_offset = read_le_at::<u32>(data, &mut cursor)? as usize;

            let name_bytes = data
                .get(cursor..cursor + name_len)
                .ok_or_else(|| malformed_error!("{}: truncated central directory", label))?;
            let name = String::from_utf8(name_bytes.to_vec())
                .map_err(|_| malformed_error!("{}: entry name is not UTF-8", label))?;

            let payload = read_local_payload(
                label,
                data,
                local_offset,
                method,
                compressed_size,
                uncompressed_size,
            )?;

            let source = Source::new(format!("{label}@{name}"));
            collection.add(name, Arc::new(MemFile::new(source, payload)));

            offset = cursor + name_len + extra_len + comment_len;
        }

        Ok(ZipFileCollection { collection })
    }
}

impl FileCollection for ZipFileCollection {
    fn find(&self, path: &str) -> Option<Arc<dyn InputFile>> {
        self.collection.find(path)
    }

    fn files(&self) -> Box<dyn Iterator<Item = Arc<dyn InputFile>> + '_> {
        self.collection.files()
    }
}

fn find_eocd(data: &[u8]) -> Option<usize> {
    if data.len() < EOCD_MIN {
        return None;
    }
    let lower = data.len().saturating_sub(EOCD_MIN + u16::MAX as usize);
    (lower..=data.len() - EOCD_MIN)
        .rev()
        .find(|&ix| data[ix..ix + 4] == EOCD_SIG.to_le_bytes())
}

fn read_local_payload(
    label: &str,
    data: &[u8],
    local_offset: usize,
    method: u16,
    compressed_size: usize,
    uncompressed_size: usize,
) -> Result<Vec<u8>> {
    let mut offset = local_offset;
    let sig = read_le_at::<u32>(data, &mut offset)?;
    if sig != LOCAL_SIG {
        return Err(malformed_error!(
            "{}: bad local header signature 0x{:08x}",
            label,
            sig
        ));
    }
    let mut cursor = local_offset + 26;
    let name_len = read_le_at::<u16>(data, &mut cursor)? as usize;
    let extra_len = read_le_at::<u16>(data, &mut cursor)? as usize;
    let start = local_offset + LOCAL_MIN + name_len + extra_len;
    let raw = start
        .checked_add(compressed_size)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| malformed_error!("{}: truncated entry payload", label))?;

    match method {
        METHOD_STORED => Ok(raw.to_vec()),
        METHOD_DEFLATED => {
            let mut out = Vec::with_capacity(uncompressed_size);
            DeflateDecoder::new(raw)
                .read_to_end(&mut out)
                .map_err(|_| malformed_error!("{}: invalid deflate stream", label))?;
            Ok(out)
        }
        other => Err(malformed_error!(
            "{}: unsupported compression method {}",
            label,
            other
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::archive::{ArchiveWriter, EntryFlags, ZipArchiveWriter};

    #[test]
    fn read_back_written_archive() {
        let mut out = Vec::new();
        {
            let mut writer = ZipArchiveWriter::new(&mut out);
            writer
                .start_entry("res/raw/data.bin", EntryFlags::empty())
                .unwrap();
            writer.write_entry(b"stored payload").unwrap();
            writer.finish_entry().unwrap();

            writer
                .start_entry("res/layout/main.xml", EntryFlags::COMPRESS)
                .unwrap();
            writer.write_entry(b"<merge></merge>").unwrap();
            writer.write_entry(b"<merge></merge>").unwrap();
            writer.finish_entry().unwrap();

            writer
                .start_entry("resources.arsc", EntryFlags::ALIGN)
                .unwrap();
            writer.write_entry(&[0u8; 16]).unwrap();
            writer.finish_entry().unwrap();
            writer.finish().unwrap();
        }

        let zip = ZipFileCollection::from_bytes("test.apk", &out).unwrap();
        let stored = zip.find("res/raw/data.bin").unwrap();
        assert_eq!(&*stored.data().unwrap(), b"stored payload");
        assert_eq!(stored.source().path, "test.apk@res/raw/data.bin");

        let deflated = zip.find("res/layout/main.xml").unwrap();
        assert_eq!(&*deflated.data().unwrap(), b"<merge></merge><merge></merge>");

        let table = zip.find("resources.arsc").unwrap();
        assert_eq!(table.data().unwrap().len(), 16);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(ZipFileCollection::from_bytes("x.zip", b"not a zip").is_err());
    }
}
