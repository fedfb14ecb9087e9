//! The `.flat` compiled-file container codec.
//!
//! A container bundles one or more compiled file payloads (binary XML or raw
//! bytes) with the resource metadata the merger needs: resource name,
//! configuration, original source and the symbols the file exports (inline
//! `@+id` declarations). Layout:
//!
//! ```text
//! u32 num_files
//! num_files × { u32 header_len, header bytes, u64 data_offset, u64 data_length }
//! concatenated payloads
//! ```
//!
//! Offsets are absolute within the container.

use std::str::FromStr;
use std::sync::Arc;

use crate::diagnostics::Source;
use crate::format::bytes::{write_le, write_str};
use crate::format::parser::Parser;
use crate::io::file::{InputFile, MemFile};
use crate::resources::{ConfigDescription, ResourceName, ResourceType};
use crate::Result;

/// A symbol exported by a compiled file (`@+id/name`).
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedSymbol {
    /// The exported resource, package usually empty.
    pub name: ResourceName,
    /// Line of the declaration in the original source.
    pub line: u32,
}

/// Metadata for one compiled file payload.
#[derive(Debug, Clone)]
pub struct CompiledFileDesc {
    /// The resource the file defines; package may be empty.
    pub name: ResourceName,
    /// Configuration the file applies to.
    pub config: ConfigDescription,
    /// The original (pre-compilation) source.
    pub source: Source,
    /// Symbols the file exports.
    pub exported_symbols: Vec<ExportedSymbol>,
}

/// One decoded container entry: metadata plus payload handle.
pub struct CompiledFile {
    /// The file's resource metadata.
    pub desc: CompiledFileDesc,
    /// Handle to the payload bytes.
    pub file: Arc<dyn InputFile>,
}

/// Decode all entries of a container.
///
/// Each payload becomes an in-memory [`InputFile`] labelled
/// `container-source@resource-name`.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] on truncation or invalid metadata.
pub fn read_container(container: &Arc<dyn InputFile>) -> Result<Vec<CompiledFile>> {
    let data = container.data()?;
    let source = container.source();
    let mut parser = Parser::new(&data);

    let num_files = parser.read_le::<u32>()?;
    let mut files = Vec::with_capacity(num_files as usize);
    for _ in 0..num_files {
        let header_len = parser.read_le::<u32>()? as usize;
        let header_start = parser.position();
        let desc = read_header(&mut parser, source)?;
        if parser.position() != header_start + header_len {
            return Err(malformed_error!(
                "{}: compiled file header length mismatch",
                source.path
            ));
        }
        let data_offset = parser.read_le::<u64>()? as usize;
        let data_length = parser.read_le::<u64>()? as usize;

        let payload = data_offset
            .checked_add(data_length)
            .and_then(|end| data.get(data_offset..end))
            .ok_or_else(|| malformed_error!("{}: payload out of bounds", source.path))?;

        // The payload handle carries the pre-compilation source: the
        // flattener classifies XML by that path's suffix, and diagnostics
        // should point at what the user wrote.
        let label = desc.source.clone();
        files.push(CompiledFile {
            desc,
            file: Arc::new(MemFile::new(label, payload.to_vec())),
        });
    }
    Ok(files)
}

fn read_header(parser: &mut Parser, source: &Source) -> Result<CompiledFileDesc> {
    let package = parser.read_string()?;
    let type_str = parser.read_string()?;
    let type_tag = ResourceType::from_str(&type_str)
        .map_err(|_| malformed_error!("{}: unknown resource type '{}'", source.path, type_str))?;
    let entry = parser.read_string()?;

    let config_str = parser.read_string()?;
    let config = ConfigDescription::parse(&config_str)
        .ok_or_else(|| malformed_error!("{}: invalid config '{}'", source.path, config_str))?;

    let source_path = parser.read_string()?;
    let line = match parser.read_le::<u8>()? {
        0 => None,
        _ => Some(parser.read_le::<u32>()?),
    };

    let symbol_count = parser.read_le::<u32>()?;
    let mut exported_symbols = Vec::with_capacity(symbol_count as usize);
    for _ in 0..symbol_count {
        let name_str = parser.read_string()?;
        let name = ResourceName::parse(&name_str).ok_or_else(|| {
            malformed_error!("{}: invalid exported symbol '{}'", source.path, name_str)
        })?;
        let line = parser.read_le::<u32>()?;
        exported_symbols.push(ExportedSymbol { name, line });
    }

    Ok(CompiledFileDesc {
        name: ResourceName::new(package, type_tag, entry),
        config,
        source: Source {
            path: source_path,
            line,
        },
        exported_symbols,
    })
}

/// Encode a container from descriptors and payload slices.
#[must_use]
pub fn write_container(entries: &[(CompiledFileDesc, &[u8])]) -> Vec<u8> {
    let headers: Vec<Vec<u8>> = entries
        .iter()
        .map(|(desc, _)| {
            let mut header = Vec::new();
            write_str(&mut header, &desc.name.package);
            write_str(&mut header, &desc.name.type_tag.to_string());
            write_str(&mut header, &desc.name.entry);
            write_str(&mut header, &desc.config.to_string());
            write_str(&mut header, &desc.source.path);
            match desc.source.line {
                Some(line) => {
                    write_le(&mut header, 1u8);
                    write_le(&mut header, line);
                }
                None => write_le(&mut header, 0u8),
            }
            write_le(&mut header, desc.exported_symbols.len() as u32);
            for symbol in &desc.exported_symbols {
                write_str(&mut header, &symbol.name.to_string());
                write_le(&mut header, symbol.line);
            }
            header
        })
        .collect();

    let header_region: usize = 4 + headers.iter().map(|h| 4 + h.len() + 16).sum::<usize>();

    let mut out = Vec::new();
    write_le(&mut out, entries.len() as u32);
    let mut data_offset = header_region;
    for (header, (_, payload)) in headers.iter().zip(entries) {
        write_le(&mut out, header.len() as u32);
        out.extend_from_slice(header);
        write_le(&mut out, data_offset as u64);
        write_le(&mut out, payload.len() as u64);
        data_offset += payload.len();
    }
    for (_, payload) in entries {
        out.extend_from_slice(payload);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(name: &str, config: &str, src: &str) -> CompiledFileDesc {
        CompiledFileDesc {
            name: ResourceName::parse(name).unwrap(),
            config: ConfigDescription::parse(config).unwrap(),
            source: Source::with_line(src, 1),
            exported_symbols: vec![ExportedSymbol {
                name: ResourceName::parse("id/button").unwrap(),
                line: 12,
            }],
        }
    }

    #[test]
    fn container_round_trip() {
        let bytes = write_container(&[
            (
                desc("layout/main", "", "res/layout/main.xml"),
                b"payload one".as_slice(),
            ),
            (
                desc("drawable/logo", "hdpi", "res/drawable-hdpi/logo.png"),
                b"payload two".as_slice(),
            ),
        ]);

        let container: Arc<dyn InputFile> =
            Arc::new(MemFile::new(Source::new("unit.flat"), bytes));
        let files = read_container(&container).unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].desc.name.to_string(), "layout/main");
        assert_eq!(files[0].desc.exported_symbols.len(), 1);
        assert_eq!(&*files[0].file.data().unwrap(), b"payload one");
        assert_eq!(files[1].desc.config.to_string(), "hdpi");
        assert_eq!(&*files[1].file.data().unwrap(), b"payload two");
        assert_eq!(files[1].file.source().path, "res/drawable-hdpi/logo.png");
    }

    #[test]
    fn truncated_container_is_rejected() {
        let mut bytes = write_container(&[(
            desc("layout/main", "", "res/layout/main.xml"),
            b"payload".as_slice(),
        )]);
        bytes.truncate(bytes.len() - 4);
        let container: Arc<dyn InputFile> =
            Arc::new(MemFile::new(Source::new("bad.flat"), bytes));
        assert!(read_container(&container).is_err());
    }
}
