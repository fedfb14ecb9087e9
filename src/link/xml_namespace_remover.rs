//! Strips XML namespace information from a document.
//!
//! Removes every namespace declaration in the tree. With `keep_uris` the
//! resolved URIs on elements and attributes survive (the manifest needs
//! them to stay parseable by the platform); without it they are cleared
//! too.

use crate::link::context::LinkContext;
use crate::xml::{Element, XmlResource};

/// The namespace stripping pass.
pub struct XmlNamespaceRemover {
    keep_uris: bool,
}

impl XmlNamespaceRemover {
    /// `keep_uris` leaves resolved URIs in place.
    #[must_use]
    pub fn new(keep_uris: bool) -> Self {
        XmlNamespaceRemover { keep_uris }
    }

    /// Strip `doc` in place. Never fails.
    pub fn consume(&self, _context: &LinkContext, doc: &mut XmlResource) -> bool {
        strip_element(&mut doc.root, self.keep_uris);
        true
    }
}

fn strip_element(element: &mut Element, keep_uris: bool) {
    element.namespace_decls.clear();
    if !keep_uris {
        element.namespace_uri.clear();
        for attr in &mut element.attributes {
            attr.namespace_uri.clear();
        }
    }
    for child in element.child_elements_mut() {
        strip_element(child, keep_uris);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Source;
    use crate::xml::{inflate, SCHEMA_ANDROID};

    fn doc() -> XmlResource {
        inflate(
            concat!(
                "<manifest xmlns:android=\"http://schemas.android.com/apk/res/android\">\n",
                "  <application android:hasCode=\"false\"/>\n",
                "</manifest>\n",
            ),
            &Source::new("AndroidManifest.xml"),
        )
        .unwrap()
    }

    #[test]
    fn keeps_uris_when_asked() {
        let ctx = LinkContext::new();
        let mut doc = doc();
        assert!(XmlNamespaceRemover::new(true).consume(&ctx, &mut doc));
        assert!(doc.root.namespace_decls.is_empty());
        let app = doc.root.find_child("", "application").unwrap();
        assert!(app.find_attribute(SCHEMA_ANDROID, "hasCode").is_some());
    }

    #[test]
    fn clears_uris_otherwise() {
        let ctx = LinkContext::new();
        let mut doc = doc();
        assert!(XmlNamespaceRemover::new(false).consume(&ctx, &mut doc));
        let app = doc.root.find_child("", "application").unwrap();
        assert!(app.find_attribute("", "hasCode").is_some());
    }
}
