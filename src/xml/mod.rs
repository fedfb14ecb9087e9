//! The XML document model shared by the manifest and file-typed resources.
//!
//! Documents arrive two ways: the manifest is inflated from text by the
//! strict parser in this module, and compiled XML payloads are decoded from
//! their binary form by [`crate::format::xml`]. Both produce the same tree of
//! [`Element`] and text nodes, with namespace prefixes already resolved to
//! URIs. Attribute values gain a compiled form (typed item plus the target
//! attribute's id) during XML reference linking.

mod parser;

pub use parser::inflate;

use crate::diagnostics::Source;
use crate::resources::{ConfigDescription, Item, ResourceId, ResourceName, ResourceType};

/// The `android:` schema URI.
pub const SCHEMA_ANDROID: &str = "http://schemas.android.com/apk/res/android";
/// The auto-resource schema URI prefix for app packages.
pub const SCHEMA_RES_AUTO: &str = "http://schemas.android.com/apk/res-auto";

/// A namespace declaration in scope on an element.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceDecl {
    /// Declared prefix; empty for the default namespace.
    pub prefix: String,
    /// The URI the prefix maps to.
    pub uri: String,
}

/// An attribute on an element.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Resolved namespace URI; empty when unprefixed.
    pub namespace_uri: String,
    /// Local attribute name.
    pub name: String,
    /// Raw textual value.
    pub value: String,
    /// The id of the attribute resource this attribute refers to, once
    /// linked.
    pub resource_id: Option<ResourceId>,
    /// Typed value produced by the XML reference linker, when the raw value
    /// parses as a reference or primitive.
    pub compiled_value: Option<Item>,
}

impl Attribute {
    /// A plain, unlinked attribute.
    #[must_use]
    pub fn new(
        namespace_uri: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Attribute {
            namespace_uri: namespace_uri.into(),
            name: name.into(),
            value: value.into(),
            resource_id: None,
            compiled_value: None,
        }
    }
}

/// An element node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    /// Resolved namespace URI; empty when unprefixed.
    pub namespace_uri: String,
    /// Local element name.
    pub name: String,
    /// Namespace declarations introduced by this element.
    pub namespace_decls: Vec<NamespaceDecl>,
    /// Attributes in document order.
    pub attributes: Vec<Attribute>,
    /// Child nodes in document order.
    pub children: Vec<Node>,
    /// 1-based line in the source document, 0 for synthesized elements.
    pub line_number: u32,
}

impl Element {
    /// Find an attribute by namespace URI and local name.
    #[must_use]
    pub fn find_attribute(&self, namespace_uri: &str, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.namespace_uri == namespace_uri && a.name == name)
    }

    /// Mutable variant of [`Element::find_attribute`].
    pub fn find_attribute_mut(
        &mut self,
        namespace_uri: &str,
        name: &str,
    ) -> Option<&mut Attribute> {
        self.attributes
            .iter_mut()
            .find(|a| a.namespace_uri == namespace_uri && a.name == name)
    }

    /// Find the first child element by namespace URI and local name.
    #[must_use]
    pub fn find_child(&self, namespace_uri: &str, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|node| match node {
            Node::Element(el) if el.namespace_uri == namespace_uri && el.name == name => Some(el),
            _ => None,
        })
    }

    /// Mutable variant of [`Element::find_child`].
    pub fn find_child_mut(&mut self, namespace_uri: &str, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(el) if el.namespace_uri == namespace_uri && el.name == name => Some(el),
            _ => None,
        })
    }

    /// Iterate child elements.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    /// Mutable variant of [`Element::child_elements`].
    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }
}

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// An element.
    Element(Element),
    /// Character data (entity references already substituted).
    Text(String),
}

/// An XML document together with its resource identity.
#[derive(Debug, Clone)]
pub struct XmlResource {
    /// The resource this document defines; package may be empty until merge.
    pub name: ResourceName,
    /// Configuration the document applies to.
    pub config: ConfigDescription,
    /// Where the document came from.
    pub source: Source,
    /// The root element.
    pub root: Element,
}

impl XmlResource {
    /// A document with a default (placeholder) resource identity.
    #[must_use]
    pub fn new(source: Source, root: Element) -> Self {
        XmlResource {
            name: ResourceName::new("", ResourceType::Xml, "document"),
            config: ConfigDescription::default(),
            source,
            root,
        }
    }
}
