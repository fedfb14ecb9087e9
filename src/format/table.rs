//! The serialized resource table codec.
//!
//! One format serves `.arsc.flat` compilation units, the static-library
//! output table and the application `resources.arsc`: a little-endian `RTBL`
//! chunk holding packages, type groups, entries and config values. Value
//! payloads use a tagged encoding shared with the binary XML codec
//! ([`encode_item`] / [`decode_item`]).
//!
//! File references serialize their destination path only; input payload
//! handles are re-attached by the merger from the collection the table
//! arrived with.

use std::str::FromStr;

use crate::diagnostics::Source;
use crate::format::bytes::{write_le, write_str};
use crate::format::parser::Parser;
use crate::resources::{
    Array, Attribute, AttributeFormat, AttributeSymbol, ConfigDescription, ConfigValue, Entry,
    FileReference, Item, Package, Plural, Primitive, Reference, ReferenceType, ResourceId,
    ResourceTable, ResourceType, Style, StyleEntry, TypeGroup, Value, Visibility,
};
use crate::Result;

const MAGIC: u32 = 0x4c42_5452; // "RTBL"
const VERSION: u32 = 1;

// Item tags.
const TAG_INT: u8 = 0x00;
const TAG_BOOL: u8 = 0x01;
const TAG_COLOR: u8 = 0x02;
const TAG_FLOAT: u8 = 0x03;
const TAG_STRING: u8 = 0x10;
const TAG_RAW_STRING: u8 = 0x11;
const TAG_REFERENCE: u8 = 0x12;
const TAG_FILE_REFERENCE: u8 = 0x13;
const TAG_ID: u8 = 0x14;

// Compound tags.
const TAG_ATTRIBUTE: u8 = 0x20;
const TAG_STYLE: u8 = 0x21;
const TAG_ARRAY: u8 = 0x22;
const TAG_PLURAL: u8 = 0x23;

// Reference flag bits.
const REF_HAS_NAME: u8 = 1 << 0;
const REF_HAS_ID: u8 = 1 << 1;
const REF_ATTRIBUTE: u8 = 1 << 2;
const REF_PRIVATE: u8 = 1 << 3;
const REF_DYNAMIC: u8 = 1 << 4;

/// Serialize `table` into a fresh buffer.
#[must_use]
pub fn serialize_table(table: &ResourceTable) -> Vec<u8> {
    let mut out = Vec::with_capacity(1024);
    write_le(&mut out, MAGIC);
    write_le(&mut out, VERSION);
    write_le(&mut out, table.packages.len() as u32);
    for package in &table.packages {
        write_package(&mut out, package);
    }
    out
}

/// Decode a serialized table.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] on bad magic, unknown versions or
/// structural truncation. `source` labels the input in error messages.
pub fn deserialize_table(data: &[u8], source: &Source) -> Result<ResourceTable> {
    let mut parser = Parser::new(data);
    let magic = parser.read_le::<u32>()?;
    if magic != MAGIC {
        return Err(malformed_error!(
            "{}: not a serialized resource table (magic 0x{:08x})",
            source.path,
            magic
        ));
    }
    let version = parser.read_le::<u32>()?;
    if version != VERSION {
        return Err(malformed_error!(
            "{}: unsupported table version {}",
            source.path,
            version
        ));
    }

    let package_count = parser.read_le::<u32>()?;
    let mut table = ResourceTable::new();
    for _ in 0..package_count {
        table.packages.push(read_package(&mut parser, source)?);
    }
    Ok(table)
}

fn write_package(out: &mut Vec<u8>, package: &Package) {
    write_str(out, &package.name);
    write_opt_u8(out, package.id);
    write_le(out, package.types.len() as u32);
    for type_group in &package.types {
        write_type(out, type_group);
    }
}

fn read_package(parser: &mut Parser, source: &Source) -> Result<Package> {
    let name = parser.read_string()?;
    let id = read_opt_u8(parser)?;
    let type_count = parser.read_le::<u32>()?;
    let mut types = Vec::with_capacity(type_count as usize);
    for _ in 0..type_count {
        types.push(read_type(parser, source)?);
    }
    Ok(Package { name, id, types })
}

fn write_type(out: &mut Vec<u8>, type_group: &TypeGroup) {
    write_str(out, &type_group.tag.to_string());
    write_opt_u8(out, type_group.id);
    write_le(out, type_group.entries.len() as u32);
    for entry in &type_group.entries {
        write_entry(out, entry);
    }
}

fn read_type(parser: &mut Parser, source: &Source) -> Result<TypeGroup> {
    let tag_str = parser.read_string()?;
    let tag = ResourceType::from_str(&tag_str)
        .map_err(|_| malformed_error!("{}: unknown resource type '{}'", source.path, tag_str))?;
    let id = read_opt_u8(parser)?;
    let entry_count = parser.read_le::<u32>()?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        entries.push(read_entry(parser, source)?);
    }
    Ok(TypeGroup { tag, id, entries })
}

fn write_entry(out: &mut Vec<u8>, entry: &Entry) {
    write_str(out, &entry.name);
    match entry.id {
        Some(id) => {
            write_le(out, 1u8);
            write_le(out, id);
        }
        None => write_le(out, 0u8),
    }
    write_le(
        out,
        match entry.visibility {
            Visibility::Undefined => 0u8,
            Visibility::Private => 1u8,
            Visibility::Public => 2u8,
        },
    );
    write_le(out, entry.values.len() as u32);
    for config_value in &entry.values {
        write_config_value(out, config_value);
    }
}

fn read_entry(parser: &mut Parser, source: &Source) -> Result<Entry> {
    let name = parser.read_string()?;
    let id = match parser.read_le::<u8>()? {
        0 => None,
        _ => Some(parser.read_le::<u16>()?),
    };
    let visibility = match parser.read_le::<u8>()? {
        0 => Visibility::Undefined,
        1 => Visibility::Private,
        2 => Visibility::Public,
        other => {
            return Err(malformed_error!(
                "{}: invalid visibility {}",
                source.path,
                other
            ))
        }
    };
    let value_count = parser.read_le::<u32>()?;
    let mut values = Vec::with_capacity(value_count as usize);
    for _ in 0..value_count {
        values.push(read_config_value(parser, source)?);
    }
    Ok(Entry {
        name,
        id,
        visibility,
        visibility_source: None,
        values,
    })
}

fn write_config_value(out: &mut Vec<u8>, config_value: &ConfigValue) {
    write_str(out, &config_value.config.to_string());
    write_str(out, &config_value.product);
    write_str(out, &config_value.source.path);
    match config_value.source.line {
        Some(line) => {
            write_le(out, 1u8);
            write_le(out, line);
        }
        None => write_le(out, 0u8),
    }
    encode_value(out, &config_value.value);
}

fn read_config_value(parser: &mut Parser, source: &Source) -> Result<ConfigValue> {
    let config_str = parser.read_string()?;
    let config = ConfigDescription::parse(&config_str)
        .ok_or_else(|| malformed_error!("{}: invalid config '{}'", source.path, config_str))?;
    let product = parser.read_string()?;
    let value_path = parser.read_string()?;
    let line = match parser.read_le::<u8>()? {
        0 => None,
        _ => Some(parser.read_le::<u32>()?),
    };
    let value = decode_value(parser, source)?;
    Ok(ConfigValue {
        config,
        product,
        value,
        source: Source {
            path: value_path,
            line,
        },
    })
}

/// Encode a full value (item or compound).
pub(crate) fn encode_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Item(item) => encode_item(out, item),
        Value::Attribute(attr) => {
            write_le(out, TAG_ATTRIBUTE);
            write_le(out, attr.format.bits());
            write_opt_i32(out, attr.min_int);
            write_opt_i32(out, attr.max_int);
            write_le(out, attr.symbols.len() as u32);
            for symbol in &attr.symbols {
                encode_reference(out, &symbol.symbol);
                write_le(out, symbol.value);
            }
        }
        Value::Style(style) => {
            write_le(out, TAG_STYLE);
            match &style.parent {
                Some(parent) => {
                    write_le(out, 1u8);
                    encode_reference(out, parent);
                }
                None => write_le(out, 0u8),
            }
            write_le(out, style.entries.len() as u32);
            for entry in &style.entries {
                encode_reference(out, &entry.key);
                encode_item(out, &entry.value);
            }
        }
        Value::Array(array) => {
            write_le(out, TAG_ARRAY);
            write_le(out, array.items.len() as u32);
            for item in &array.items {
                encode_item(out, item);
            }
        }
        Value::Plural(plural) => {
            write_le(out, TAG_PLURAL);
            let mut mask = 0u8;
            for (ix, slot) in plural.values.iter().enumerate() {
                if slot.is_some() {
                    mask |= 1 << ix;
                }
            }
            write_le(out, mask);
            for slot in plural.values.iter().flatten() {
                encode_item(out, slot);
            }
        }
    }
}

/// Decode a full value (item or compound).
pub(crate) fn decode_value(parser: &mut Parser, source: &Source) -> Result<Value> {
    let tag = parser.read_le::<u8>()?;
    match tag {
        TAG_ATTRIBUTE => {
            let bits = parser.read_le::<u32>()?;
            let format = AttributeFormat::from_bits(bits).ok_or_else(|| {
                malformed_error!("{}: invalid attribute format 0x{:x}", source.path, bits)
            })?;
            let min_int = read_opt_i32(parser)?;
            let max_int = read_opt_i32(parser)?;
            let symbol_count = parser.read_le::<u32>()?;
            let mut symbols = Vec::with_capacity(symbol_count as usize);
            for _ in 0..symbol_count {
                let symbol = decode_reference(parser, source)?;
                let value = parser.read_le::<u32>()?;
                symbols.push(AttributeSymbol { symbol, value });
            }
            Ok(Value::Attribute(Attribute {
                format,
                min_int,
                max_int,
                symbols,
            }))
        }
        TAG_STYLE => {
            let parent = match parser.read_le::<u8>()? {
                0 => None,
                _ => Some(decode_reference(parser, source)?),
            };
            let entry_count = parser.read_le::<u32>()?;
            let mut entries = Vec::with_capacity(entry_count as usize);
            for _ in 0..entry_count {
                let key = decode_reference(parser, source)?;
                let value = decode_item(parser, source)?;
                entries.push(StyleEntry { key, value });
            }
            Ok(Value::Style(Style { parent, entries }))
        }
        TAG_ARRAY => {
            let item_count = parser.read_le::<u32>()?;
            let mut items = Vec::with_capacity(item_count as usize);
            for _ in 0..item_count {
                items.push(decode_item(parser, source)?);
            }
            Ok(Value::Array(Array { items }))
        }
        TAG_PLURAL => {
            let mask = parser.read_le::<u8>()?;
            let mut plural = Plural::default();
            for (ix, slot) in plural.values.iter_mut().enumerate() {
                if mask & (1 << ix) != 0 {
                    *slot = Some(decode_item(parser, source)?);
                }
            }
            Ok(Value::Plural(plural))
        }
        _ => decode_item_tagged(parser, source, tag).map(Value::Item),
    }
}

/// Encode a simple item.
pub(crate) fn encode_item(out: &mut Vec<u8>, item: &Item) {
    match item {
        Item::Primitive(Primitive::Int(v)) => {
            write_le(out, TAG_INT);
            write_le(out, *v);
        }
        Item::Primitive(Primitive::Bool(v)) => {
            write_le(out, TAG_BOOL);
            write_le(out, u8::from(*v));
        }
        Item::Primitive(Primitive::Color(v)) => {
            write_le(out, TAG_COLOR);
            write_le(out, *v);
        }
        Item::Primitive(Primitive::Float(v)) => {
            write_le(out, TAG_FLOAT);
            write_le(out, *v);
        }
        Item::String(s) => {
            write_le(out, TAG_STRING);
            write_str(out, s);
        }
        Item::RawString(s) => {
            write_le(out, TAG_RAW_STRING);
            write_str(out, s);
        }
        Item::Reference(reference) => encode_reference(out, reference),
        Item::FileReference(file_ref) => {
            write_le(out, TAG_FILE_REFERENCE);
            write_str(out, &file_ref.path);
        }
        Item::Id => write_le(out, TAG_ID),
    }
}

/// Decode a simple item.
pub(crate) fn decode_item(parser: &mut Parser, source: &Source) -> Result<Item> {
    let tag = parser.read_le::<u8>()?;
    decode_item_tagged(parser, source, tag)
}

fn decode_item_tagged(parser: &mut Parser, source: &Source, tag: u8) -> Result<Item> {
    match tag {
        TAG_INT => Ok(Item::Primitive(Primitive::Int(parser.read_le::<i32>()?))),
        TAG_BOOL => Ok(Item::Primitive(Primitive::Bool(
            parser.read_le::<u8>()? != 0,
        ))),
        TAG_COLOR => Ok(Item::Primitive(Primitive::Color(parser.read_le::<u32>()?))),
        TAG_FLOAT => Ok(Item::Primitive(Primitive::Float(parser.read_le::<f32>()?))),
        TAG_STRING => Ok(Item::String(parser.read_string()?)),
        TAG_RAW_STRING => Ok(Item::RawString(parser.read_string()?)),
        TAG_REFERENCE => decode_reference_body(parser, source).map(Item::Reference),
        TAG_FILE_REFERENCE => Ok(Item::FileReference(FileReference::new(
            parser.read_string()?,
            None,
        ))),
        TAG_ID => Ok(Item::Id),
        other => Err(malformed_error!(
            "{}: unknown value tag 0x{:02x}",
            source.path,
            other
        )),
    }
}

fn encode_reference(out: &mut Vec<u8>, reference: &Reference) {
    write_le(out, TAG_REFERENCE);
    let mut flags = 0u8;
    if reference.name.is_some() {
        flags |= REF_HAS_NAME;
    }
    if reference.id.is_some() {
        flags |= REF_HAS_ID;
    }
    if reference.reference_type == ReferenceType::Attribute {
        flags |= REF_ATTRIBUTE;
    }
    if reference.private {
        flags |= REF_PRIVATE;
    }
    if reference.dynamic {
        flags |= REF_DYNAMIC;
    }
    write_le(out, flags);
    if let Some(name) = &reference.name {
        write_str(out, &name.to_string());
    }
    if let Some(id) = reference.id {
        write_le(out, id.0);
    }
}

fn decode_reference(parser: &mut Parser, source: &Source) -> Result<Reference> {
    let tag = parser.read_le::<u8>()?;
    if tag != TAG_REFERENCE {
        return Err(malformed_error!(
            "{}: expected reference, found tag 0x{:02x}",
            source.path,
            tag
        ));
    }
    decode_reference_body(parser, source)
}

fn decode_reference_body(parser: &mut Parser, source: &Source) -> Result<Reference> {
    let flags = parser.read_le::<u8>()?;
    let name = if flags & REF_HAS_NAME != 0 {
        let name_str = parser.read_string()?;
        Some(crate::resources::ResourceName::parse(&name_str).ok_or_else(|| {
            malformed_error!("{}: invalid reference name '{}'", source.path, name_str)
        })?)
    } else {
        None
    };
    let id = if flags & REF_HAS_ID != 0 {
        Some(ResourceId(parser.read_le::<u32>()?))
    } else {
        None
    };
    Ok(Reference {
        name,
        id,
        reference_type: if flags & REF_ATTRIBUTE != 0 {
            ReferenceType::Attribute
        } else {
            ReferenceType::Resource
        },
        private: flags & REF_PRIVATE != 0,
        dynamic: flags & REF_DYNAMIC != 0,
    })
}

fn write_opt_u8(out: &mut Vec<u8>, value: Option<u8>) {
    match value {
        Some(v) => {
            write_le(out, 1u8);
            write_le(out, v);
        }
        None => write_le(out, 0u8),
    }
}

fn read_opt_u8(parser: &mut Parser) -> Result<Option<u8>> {
    Ok(match parser.read_le::<u8>()? {
        0 => None,
        _ => Some(parser.read_le::<u8>()?),
    })
}

fn write_opt_i32(out: &mut Vec<u8>, value: Option<i32>) {
    match value {
        Some(v) => {
            write_le(out, 1u8);
            write_le(out, v);
        }
        None => write_le(out, 0u8),
    }
}

fn read_opt_i32(parser: &mut Parser) -> Result<Option<i32>> {
    Ok(match parser.read_le::<u8>()? {
        0 => None,
        _ => Some(parser.read_le::<i32>()?),
    })
}
