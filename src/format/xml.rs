//! The compiled binary XML codec.
//!
//! Serializes an XML document tree (elements with resolved namespace URIs,
//! attributes with optional typed values and attribute-resource ids, text)
//! into a little-endian `RXML` chunk. The document's resource identity
//! (name, config, source) travels in the container header, not here.

use crate::diagnostics::Source;
use crate::format::bytes::{write_le, write_str};
use crate::format::parser::Parser;
use crate::format::table::{decode_item, encode_item};
use crate::resources::ResourceId;
use crate::xml::{Attribute, Element, NamespaceDecl, Node};
use crate::Result;

const MAGIC: u32 = 0x4c4d_5852; // "RXML"
const VERSION: u32 = 1;

const NODE_ELEMENT: u8 = 1;
const NODE_TEXT: u8 = 2;

/// Serialize a document tree.
#[must_use]
pub fn serialize_xml(root: &Element) -> Vec<u8> {
    let mut out = Vec::with_capacity(256);
    write_le(&mut out, MAGIC);
    write_le(&mut out, VERSION);
    write_element(&mut out, root);
    out
}

/// Decode a document tree.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] on bad magic or structural errors.
pub fn deserialize_xml(data: &[u8], source: &Source) -> Result<Element> {
    let mut parser = Parser::new(data);
    let magic = parser.read_le::<u32>()?;
    if magic != MAGIC {
        return Err(malformed_error!(
            "{}: not compiled XML (magic 0x{:08x})",
            source.path,
            magic
        ));
    }
    let version = parser.read_le::<u32>()?;
    if version != VERSION {
        return Err(malformed_error!(
            "{}: unsupported XML version {}",
            source.path,
            version
        ));
    }
    let tag = parser.read_le::<u8>()?;
    if tag != NODE_ELEMENT {
        return Err(malformed_error!(
            "{}: document root must be an element",
            source.path
        ));
    }
    read_element(&mut parser, source)
}

fn write_element(out: &mut Vec<u8>, element: &Element) {
    write_le(out, NODE_ELEMENT);
    write_str(out, &element.namespace_uri);
    write_str(out, &element.name);
    write_le(out, element.line_number);

    write_le(out, element.namespace_decls.len() as u32);
    for decl in &element.namespace_decls {
        write_str(out, &decl.prefix);
        write_str(out, &decl.uri);
    }

    write_le(out, element.attributes.len() as u32);
    for attr in &element.attributes {
        write_str(out, &attr.namespace_uri);
        write_str(out, &attr.name);
        write_str(out, &attr.value);
        match attr.resource_id {
            Some(id) => {
                write_le(out, 1u8);
                write_le(out, id.0);
            }
            None => write_le(out, 0u8),
        }
        match &attr.compiled_value {
            Some(item) => {
                write_le(out, 1u8);
                encode_item(out, item);
            }
            None => write_le(out, 0u8),
        }
    }

    write_le(out, element.children.len() as u32);
    for child in &element.children {
        match child {
            Node::Element(el) => write_element(out, el),
            Node::Text(text) => {
                write_le(out, NODE_TEXT);
                write_str(out, text);
            }
        }
    }
}

fn read_element(parser: &mut Parser, source: &Source) -> Result<Element> {
    let namespace_uri = parser.read_string()?;
    let name = parser.read_string()?;
    let line_number = parser.read_le::<u32>()?;

    let decl_count = parser.read_le::<u32>()?;
    let mut namespace_decls = Vec::with_capacity(decl_count as usize);
    for _ in 0..decl_count {
        namespace_decls.push(NamespaceDecl {
            prefix: parser.read_string()?,
            uri: parser.read_string()?,
        });
    }

    let attr_count = parser.read_le::<u32>()?;
    let mut attributes = Vec::with_capacity(attr_count as usize);
    for _ in 0..attr_count {
        let namespace_uri = parser.read_string()?;
        let name = parser.read_string()?;
        let value = parser.read_string()?;
        let resource_id = match parser.read_le::<u8>()? {
            0 => None,
            _ => Some(ResourceId(parser.read_le::<u32>()?)),
        };
        let compiled_value = match parser.read_le::<u8>()? {
            0 => None,
            _ => Some(decode_item(parser, source)?),
        };
        attributes.push(Attribute {
            namespace_uri,
            name,
            value,
            resource_id,
            compiled_value,
        });
    }

    let child_count = parser.read_le::<u32>()?;
    let mut children = Vec::with_capacity(child_count as usize);
    for _ in 0..child_count {
        match parser.read_le::<u8>()? {
            NODE_ELEMENT => children.push(Node::Element(read_element(parser, source)?)),
            NODE_TEXT => children.push(Node::Text(parser.read_string()?)),
            other => {
                return Err(malformed_error!(
                    "{}: unknown XML node tag {}",
                    source.path,
                    other
                ))
            }
        }
    }

    Ok(Element {
        namespace_uri,
        name,
        namespace_decls,
        attributes,
        children,
        line_number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::{inflate, SCHEMA_ANDROID};

    #[test]
    fn tree_survives_the_codec() {
        let doc = inflate(
            concat!(
                "<LinearLayout xmlns:android=\"http://schemas.android.com/apk/res/android\"\n",
                "    android:orientation=\"vertical\">\n",
                "  <TextView android:text=\"@string/title\"/>\n",
                "</LinearLayout>\n",
            ),
            &Source::new("res/layout/main.xml"),
        )
        .unwrap();

        let bytes = serialize_xml(&doc.root);
        let decoded = deserialize_xml(&bytes, &Source::new("main.xml.flat")).unwrap();
        assert_eq!(decoded, doc.root);
        assert_eq!(
            decoded
                .find_child("", "TextView")
                .unwrap()
                .find_attribute(SCHEMA_ANDROID, "text")
                .unwrap()
                .value,
            "@string/title"
        );
    }

    #[test]
    fn bad_magic_is_rejected() {
        assert!(deserialize_xml(&[1, 2, 3, 4, 5, 6, 7, 8, 9], &Source::new("x")).is_err());
    }
}
