//! Strict text-XML inflation for the manifest.
//!
//! A deliberately small parser: prolog, comments, elements, attributes,
//! character data and the five predefined entities plus numeric character
//! references. Namespace prefixes are resolved to URIs during the parse so
//! the resulting tree never carries prefixes. Anything outside that subset
//! is a hard error carrying the offending line.

use crate::diagnostics::Source;
use crate::xml::{Attribute, Element, NamespaceDecl, Node, XmlResource};
use crate::Result;

/// Inflate an XML document from text.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] (message includes path and line) on
/// any syntax error, unknown entity, unbound namespace prefix or missing
/// root element.
pub fn inflate(text: &str, source: &Source) -> Result<XmlResource> {
    let mut parser = TextParser {
        bytes: text.as_bytes(),
        pos: 0,
        line: 1,
        source,
        namespaces: Vec::new(),
    };
    parser.skip_misc()?;
    let root = parser.parse_element()?;
    parser.skip_misc()?;
    if parser.pos < parser.bytes.len() {
        return Err(parser.err("trailing content after document element"));
    }
    Ok(XmlResource::new(source.clone(), root))
}

struct TextParser<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    source: &'a Source,
    // Prefix → URI bindings, innermost last.
    namespaces: Vec<(String, String)>,
}

impl TextParser<'_> {
    fn err(&self, message: impl std::fmt::Display) -> crate::Error {
        malformed_error!("{}:{}: {}", self.source.path, self.line, message)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
        }
        Some(b)
    }

    fn eat(&mut self, expected: u8) -> Result<()> {
        match self.bump() {
            Some(b) if b == expected => Ok(()),
            Some(b) => Err(self.err(format!(
                "expected '{}', found '{}'",
                expected as char, b as char
            ))),
            None => Err(self.err("unexpected end of document")),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.bump();
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.bytes[self.pos..].starts_with(s.as_bytes())
    }

    fn skip_until(&mut self, terminator: &str) -> Result<()> {
        while self.pos < self.bytes.len() {
            if self.starts_with(terminator) {
                for _ in 0..terminator.len() {
                    self.bump();
                }
                return Ok(());
            }
            self.bump();
        }
        Err(self.err(format!("unterminated construct, expected '{terminator}'")))
    }

    // Prolog, comments, doctype and whitespace between top-level constructs.
    fn skip_misc(&mut self) -> Result<()> {
        loop {
            self.skip_whitespace();
            if self.starts_with("<?") {
                self.skip_until("?>")?;
            } else if self.starts_with("<!--") {
                self.skip_until("-->")?;
            } else if self.starts_with("<!DOCTYPE") {
                self.skip_until(">")?;
            } else {
                return Ok(());
            }
        }
    }

    fn parse_name(&mut self) -> Result<String> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b':') {
                self.bump();
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.err("expected a name"));
        }
        Ok(String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned())
    }

    fn resolve_prefix(&self, prefix: &str) -> Option<String> {
        self.namespaces
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.clone())
    }

    fn parse_element(&mut self) -> Result<Element> {
        self.eat(b'<')?;
        let line_number = self.line;
        let qualified = self.parse_name()?;

        let mut element = Element {
            line_number,
            ..Element::default()
        };

        // Attributes; namespace declarations are collected first so sibling
        // attributes on the same element can use them.
        let mut pending: Vec<(String, String)> = Vec::new();
        let ns_mark = self.namespaces.len();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'/') | Some(b'>') => break,
                None => return Err(self.err("unexpected end of tag")),
                _ => {}
            }
            let attr_name = self.parse_name()?;
            self.skip_whitespace();
            self.eat(b'=')?;
            self.skip_whitespace();
            let value = self.parse_attribute_value()?;

            if attr_name == "xmlns" {
                element.namespace_decls.push(NamespaceDecl {
                    prefix: String::new(),
                    uri: value.clone(),
                });
                self.namespaces.push((String::new(), value));
            } else if let Some(prefix) = attr_name.strip_prefix("xmlns:") {
                element.namespace_decls.push(NamespaceDecl {
                    prefix: prefix.to_string(),
                    uri: value.clone(),
                });
                self.namespaces.push((prefix.to_string(), value));
            } else {
                pending.push((attr_name, value));
            }
        }

        for (qualified_attr, value) in pending {
            let (ns_uri, local) = self.split_qualified(&qualified_attr, false)?;
            element.attributes.push(Attribute {
                namespace_uri: ns_uri,
                name: local,
                value,
                resource_id: None,
                compiled_value: None,
            });
        }

        let (ns_uri, local) = self.split_qualified(&qualified, true)?;
        element.namespace_uri = ns_uri;
        element.name = local;

        if self.peek() == Some(b'/') {
            self.bump();
            self.eat(b'>')?;
            self.namespaces.truncate(ns_mark);
            return Ok(element);
        }
        self.eat(b'>')?;

        // Children until the matching close tag.
        loop {
            if self.starts_with("</") {
                self.bump();
                self.bump();
                let close = self.parse_name()?;
                if close != qualified {
                    return Err(self.err(format!(
                        "mismatched closing tag '</{close}>', expected '</{qualified}>'"
                    )));
                }
                self.skip_whitespace();
                self.eat(b'>')?;
                self.namespaces.truncate(ns_mark);
                return Ok(element);
            } else if self.starts_with("<!--") {
                self.skip_until("-->")?;
            } else if self.starts_with("<![CDATA[") {
                let start = self.pos + 9;
                self.skip_until("]]>")?;
                let text =
                    String::from_utf8_lossy(&self.bytes[start..self.pos - 3]).into_owned();
                element.children.push(Node::Text(text));
            } else if self.peek() == Some(b'<') {
                let child = self.parse_element()?;
                element.children.push(Node::Element(child));
            } else if self.peek().is_none() {
                return Err(self.err(format!("unclosed element '{qualified}'")));
            } else {
                let text = self.parse_text()?;
                if !text.trim().is_empty() {
                    element.children.push(Node::Text(text));
                }
            }
        }
    }

    fn split_qualified(&self, qualified: &str, is_element: bool) -> Result<(String, String)> {
        match qualified.split_once(':') {
            None => {
                // Unprefixed elements pick up the default namespace;
                // unprefixed attributes never do.
                if is_element {
                    Ok((
                        self.resolve_prefix("").unwrap_or_default(),
                        qualified.to_string(),
                    ))
                } else {
                    Ok((String::new(), qualified.to_string()))
                }
            }
            Some((prefix, local)) => {
                let uri = self
                    .resolve_prefix(prefix)
                    .ok_or_else(|| self.err(format!("unbound namespace prefix '{prefix}'")))?;
                Ok((uri, local.to_string()))
            }
        }
    }

    fn parse_attribute_value(&mut self) -> Result<String> {
        let quote = match self.bump() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => return Err(self.err("expected quoted attribute value")),
        };
        let mut value = Vec::new();
        loop {
            match self.peek() {
                Some(b) if b == quote => {
                    self.bump();
                    // Input arrived as &str, so the bytes are valid UTF-8.
                    return Ok(String::from_utf8_lossy(&value).into_owned());
                }
                Some(b'&') => {
                    let c = self.parse_entity()?;
                    value.extend_from_slice(c.encode_utf8(&mut [0u8; 4]).as_bytes());
                }
                Some(b'<') => return Err(self.err("'<' in attribute value")),
                Some(b) => {
                    self.bump();
                    value.push(b);
                }
                None => return Err(self.err("unterminated attribute value")),
            }
        }
    }

    fn parse_text(&mut self) -> Result<String> {
        let mut text = Vec::new();
        loop {
            match self.peek() {
                Some(b'<') | None => return Ok(String::from_utf8_lossy(&text).into_owned()),
                Some(b'&') => {
                    let c = self.parse_entity()?;
                    text.extend_from_slice(c.encode_utf8(&mut [0u8; 4]).as_bytes());
                }
                Some(b) => {
                    self.bump();
                    text.push(b);
                }
            }
        }
    }

    fn parse_entity(&mut self) -> Result<char> {
        self.eat(b'&')?;
        let start = self.pos;
        while self.peek().map_or(false, |b| b != b';') {
            self.bump();
        }
        let name = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
        self.eat(b';')?;
        match name.as_str() {
            "amp" => Ok('&'),
            "lt" => Ok('<'),
            "gt" => Ok('>'),
            "quot" => Ok('"'),
            "apos" => Ok('\''),
            _ => {
                let code = if let Some(hex) = name.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = name.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32)
                    .ok_or_else(|| self.err(format!("unknown entity '&{name};'")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::SCHEMA_ANDROID;

    fn parse(text: &str) -> XmlResource {
        inflate(text, &Source::new("AndroidManifest.xml")).unwrap()
    }

    #[test]
    fn parses_a_manifest() {
        let doc = parse(concat!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n",
            "<manifest xmlns:android=\"http://schemas.android.com/apk/res/android\"\n",
            "          package=\"com.app\" android:versionCode=\"7\">\n",
            "  <!-- app body -->\n",
            "  <application android:hasCode=\"false\"/>\n",
            "</manifest>\n",
        ));

        assert_eq!(doc.root.name, "manifest");
        assert_eq!(doc.root.namespace_uri, "");
        assert_eq!(doc.root.line_number, 2);
        assert_eq!(
            doc.root.find_attribute("", "package").unwrap().value,
            "com.app"
        );
        assert_eq!(
            doc.root
                .find_attribute(SCHEMA_ANDROID, "versionCode")
                .unwrap()
                .value,
            "7"
        );

        let app = doc.root.find_child("", "application").unwrap();
        assert_eq!(app.find_attribute(SCHEMA_ANDROID, "hasCode").unwrap().value, "false");
    }

    #[test]
    fn entities_and_text() {
        let doc = parse("<a>one &amp; two &#x41;</a>");
        assert_eq!(doc.root.children, vec![Node::Text("one & two A".into())]);
    }

    #[test]
    fn rejects_mismatched_tags() {
        let err = inflate("<a><b></a></b>", &Source::new("m.xml")).unwrap_err();
        assert!(err.to_string().contains("mismatched closing tag"));
    }

    #[test]
    fn rejects_unbound_prefix() {
        let err = inflate("<a android:x=\"1\"/>", &Source::new("m.xml")).unwrap_err();
        assert!(err.to_string().contains("unbound namespace prefix"));
    }

    #[test]
    fn namespace_scoping() {
        let doc = parse(
            "<a xmlns:n=\"urn:one\"><n:b/><c xmlns:n=\"urn:two\"><n:d/></c></a>",
        );
        let b = doc.root.find_child("urn:one", "b");
        assert!(b.is_some());
        let c = doc.root.find_child("", "c").unwrap();
        assert!(c.find_child("urn:two", "d").is_some());
    }
}
