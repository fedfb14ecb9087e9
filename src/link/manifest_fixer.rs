//! Manifest validation and normalization.
//!
//! Runs before anything else touches the manifest: validates the root
//! element and `package` attribute, injects default `uses-sdk` levels and
//! version codes when the build asks for them, and applies the package /
//! instrumentation-target renames.

use crate::link::context::LinkContext;
use crate::xml::{Attribute, Element, Node, XmlResource, SCHEMA_ANDROID};

/// Optional manifest rewrites.
#[derive(Debug, Clone, Default)]
pub struct ManifestFixerOptions {
    /// Default `android:minSdkVersion` when the manifest has none.
    pub min_sdk_version_default: Option<String>,
    /// Default `android:targetSdkVersion` when the manifest has none.
    pub target_sdk_version_default: Option<String>,
    /// `android:versionCode` to inject when the manifest has none.
    pub version_code_default: Option<String>,
    /// `android:versionName` to inject when the manifest has none.
    pub version_name_default: Option<String>,
    /// Replace the manifest package.
    pub rename_manifest_package: Option<String>,
    /// Replace the instrumentation target package.
    pub rename_instrumentation_target_package: Option<String>,
}

/// The manifest fixing pass.
pub struct ManifestFixer {
    options: ManifestFixerOptions,
}

impl ManifestFixer {
    /// Create a fixer with the given rewrites.
    #[must_use]
    pub fn new(options: ManifestFixerOptions) -> Self {
        ManifestFixer { options }
    }

    /// Validate and rewrite `doc` in place.
    pub fn consume(&self, context: &LinkContext, doc: &mut XmlResource) -> bool {
        let source = doc.source.clone();
        let root = &mut doc.root;

        if !root.namespace_uri.is_empty() || root.name != "manifest" {
            context
                .diagnostics
                .error(source, "root tag must be <manifest>".to_string());
            return false;
        }
        if root.find_attribute("", "package").is_none() {
            context.diagnostics.error(
                source,
                "<manifest> must have a 'package' attribute".to_string(),
            );
            return false;
        }

        if let Some(package) = &self.options.rename_manifest_package {
            let attr = root
                .find_attribute_mut("", "package")
                .expect("checked above");
            attr.value = package.clone();
        }

        set_default_attribute(
            root,
            "versionCode",
            self.options.version_code_default.as_deref(),
        );
        set_default_attribute(
            root,
            "versionName",
            self.options.version_name_default.as_deref(),
        );

        if self.options.min_sdk_version_default.is_some()
            || self.options.target_sdk_version_default.is_some()
        {
            if root.find_child("", "uses-sdk").is_none() {
                // Injected defaults need a uses-sdk element to land on.
                root.children.insert(
                    0,
                    Node::Element(Element {
                        name: "uses-sdk".to_string(),
                        ..Element::default()
                    }),
                );
            }
            let uses_sdk = root.find_child_mut("", "uses-sdk").expect("inserted above");
            set_default_attribute(
                uses_sdk,
                "minSdkVersion",
                self.options.min_sdk_version_default.as_deref(),
            );
            set_default_attribute(
                uses_sdk,
                "targetSdkVersion",
                self.options.target_sdk_version_default.as_deref(),
            );
        }

        if let Some(target) = &self.options.rename_instrumentation_target_package {
            for child in root.child_elements_mut() {
                if child.namespace_uri.is_empty() && child.name == "instrumentation" {
                    if let Some(attr) = child.find_attribute_mut(SCHEMA_ANDROID, "targetPackage")
                    {
                        attr.value = target.clone();
                    }
                }
            }
        }

        true
    }
}

fn set_default_attribute(element: &mut Element, name: &str, default: Option<&str>) {
    let Some(default) = default else { return };
    if element.find_attribute(SCHEMA_ANDROID, name).is_none() {
        element
            .attributes
            .push(Attribute::new(SCHEMA_ANDROID, name, default));
    }
}

/// Application identity extracted from the manifest.
#[derive(Debug, Clone, Default)]
pub struct AppInfo {
    /// The manifest package.
    pub package: String,
    /// `android:versionCode`, when present and numeric.
    pub version_code: Option<u32>,
    /// `android:revisionCode`, when present and numeric.
    pub revision_code: Option<u32>,
    /// `android:minSdkVersion` from `uses-sdk`, when present.
    pub min_sdk_version: Option<String>,
}

/// Extract [`AppInfo`] from a manifest document.
///
/// Reports structural problems through the context diagnostics and returns
/// `None`.
pub fn extract_app_info(context: &LinkContext, doc: &XmlResource) -> Option<AppInfo> {
    let root = &doc.root;
    if !root.namespace_uri.is_empty() || root.name != "manifest" {
        context
            .diagnostics
            .error(doc.source.clone(), "root tag must be <manifest>".to_string());
        return None;
    }
    let package = root.find_attribute("", "package").or_else(|| {
        context.diagnostics.error(
            doc.source.clone(),
            "<manifest> must have a 'package' attribute".to_string(),
        );
        None
    })?;

    let mut info = AppInfo {
        package: package.value.clone(),
        ..AppInfo::default()
    };

    for (attr, slot) in [
        ("versionCode", &mut info.version_code),
        ("revisionCode", &mut info.revision_code),
    ] {
        if let Some(found) = root.find_attribute(SCHEMA_ANDROID, attr) {
            match found.value.parse::<u32>() {
                Ok(code) => *slot = Some(code),
                Err(_) => {
                    context.diagnostics.error(
                        doc.source.clone(),
                        format!("invalid android:{attr} '{}'", found.value),
                    );
                    return None;
                }
            }
        }
    }

    if let Some(uses_sdk) = root.find_child("", "uses-sdk") {
        if let Some(min) = uses_sdk.find_attribute(SCHEMA_ANDROID, "minSdkVersion") {
            info.min_sdk_version = Some(min.value.clone());
        }
    }
    Some(info)
}

/// Parse a `minSdkVersion` value: a number, or a codename (treated as the
/// development level, which never constrains versioning here).
#[must_use]
pub fn parse_sdk_version(value: &str) -> Option<u16> {
    value.parse::<u16>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Source;
    use crate::xml::inflate;

    fn manifest(body: &str) -> XmlResource {
        inflate(
            &format!(
                "<manifest xmlns:android=\"http://schemas.android.com/apk/res/android\" \
                 package=\"com.app\">{body}</manifest>"
            ),
            &Source::new("AndroidManifest.xml"),
        )
        .unwrap()
    }

    #[test]
    fn injects_uses_sdk_defaults() {
        let ctx = LinkContext::new();
        let mut doc = manifest("");
        let fixer = ManifestFixer::new(ManifestFixerOptions {
            min_sdk_version_default: Some("14".into()),
            target_sdk_version_default: Some("25".into()),
            ..ManifestFixerOptions::default()
        });
        assert!(fixer.consume(&ctx, &mut doc));

        let uses_sdk = doc.root.find_child("", "uses-sdk").unwrap();
        assert_eq!(
            uses_sdk
                .find_attribute(SCHEMA_ANDROID, "minSdkVersion")
                .unwrap()
                .value,
            "14"
        );
    }

    #[test]
    fn existing_values_are_not_overwritten() {
        let ctx = LinkContext::new();
        let mut doc = manifest("<uses-sdk android:minSdkVersion=\"9\"/>");
        let fixer = ManifestFixer::new(ManifestFixerOptions {
            min_sdk_version_default: Some("14".into()),
            ..ManifestFixerOptions::default()
        });
        assert!(fixer.consume(&ctx, &mut doc));
        let uses_sdk = doc.root.find_child("", "uses-sdk").unwrap();
        assert_eq!(
            uses_sdk
                .find_attribute(SCHEMA_ANDROID, "minSdkVersion")
                .unwrap()
                .value,
            "9"
        );
    }

    #[test]
    fn package_rename_and_app_info() {
        let ctx = LinkContext::new();
        let mut doc = manifest("");
        let fixer = ManifestFixer::new(ManifestFixerOptions {
            rename_manifest_package: Some("com.renamed".into()),
            ..ManifestFixerOptions::default()
        });
        assert!(fixer.consume(&ctx, &mut doc));

        let info = extract_app_info(&ctx, &doc).unwrap();
        assert_eq!(info.package, "com.renamed");
    }

    #[test]
    fn missing_package_is_invalid() {
        let ctx = LinkContext::new();
        let doc = inflate("<manifest/>", &Source::new("m.xml")).unwrap();
        assert!(extract_app_info(&ctx, &doc).is_none());
        assert!(ctx.diagnostics.has_errors());
    }
}
