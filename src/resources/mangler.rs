//! Deterministic name mangling for merged library packages.
//!
//! When a static library's resources are merged into the compilation package,
//! each entry `X` from external package `P` becomes `P$X`. The symbol source
//! for `P` keeps answering to the unmangled name so incoming references can
//! be rewritten to the mangled entry.

use rustc_hash::FxHashSet;

use crate::resources::name::ResourceName;

/// Which packages get mangled into which target.
#[derive(Debug, Clone, Default)]
pub struct NameManglerPolicy {
    /// The compilation package receiving mangled entries.
    pub target_package: String,
    /// External packages whose entries were merged and must be mangled.
    pub packages_to_mangle: FxHashSet<String>,
}

impl NameManglerPolicy {
    /// Policy with no packages to mangle.
    #[must_use]
    pub fn new(target_package: impl Into<String>) -> Self {
        NameManglerPolicy {
            target_package: target_package.into(),
            packages_to_mangle: FxHashSet::default(),
        }
    }
}

/// Applies a [`NameManglerPolicy`] to resource names.
#[derive(Debug, Clone, Default)]
pub struct NameMangler {
    policy: NameManglerPolicy,
}

impl NameMangler {
    /// Create a mangler with the given policy.
    #[must_use]
    pub fn new(policy: NameManglerPolicy) -> Self {
        NameMangler { policy }
    }

    /// The package mangled entries land in.
    #[must_use]
    pub fn target_package(&self) -> &str {
        &self.policy.target_package
    }

    /// Mangle `name` if its package is subject to mangling.
    ///
    /// Returns `None` when the name is local or its package is not merged.
    #[must_use]
    pub fn mangle(&self, name: &ResourceName) -> Option<ResourceName> {
        if name.package.is_empty()
            || name.package == self.policy.target_package
            || !self.policy.packages_to_mangle.contains(&name.package)
        {
            return None;
        }
        Some(ResourceName::new(
            self.policy.target_package.clone(),
            name.type_tag,
            Self::mangle_entry(&name.package, &name.entry),
        ))
    }

    /// The deterministic mangled entry form `package$entry`.
    #[must_use]
    pub fn mangle_entry(package: &str, entry: &str) -> String {
        format!("{package}${entry}")
    }

    /// Split a mangled entry back into (package, entry), if it is one.
    #[must_use]
    pub fn unmangle_entry(entry: &str) -> Option<(&str, &str)> {
        let ix = entry.find('$')?;
        Some((&entry[..ix], &entry[ix + 1..]))
    }
}
