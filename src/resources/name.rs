//! Resource names, type tags and packed resource ids.
//!
//! A resource is addressed symbolically by a [`ResourceName`] (`package:type/entry`)
//! until id assignment packs it into a [`ResourceId`]: `(package8 << 24) | (type8 << 16) | entry16`.

use std::fmt;
use std::str::FromStr;

use strum::{Display, EnumCount, EnumIter, EnumString};

/// The closed set of resource type tags.
///
/// The `^attr-private` tag is not writable by source resources; the private
/// attribute mover synthesizes it when a type mixes public and non-public
/// attributes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    EnumCount,
)]
pub enum ResourceType {
    /// Tween animation resources.
    #[strum(serialize = "anim")]
    Anim,
    /// Property animation resources.
    #[strum(serialize = "animator")]
    Animator,
    /// Typed arrays.
    #[strum(serialize = "array")]
    Array,
    /// Attribute definitions.
    #[strum(serialize = "attr")]
    Attr,
    /// Attributes moved out of the public `attr` space.
    #[strum(serialize = "^attr-private")]
    AttrPrivate,
    /// Boolean values.
    #[strum(serialize = "bool")]
    Bool,
    /// Color values and state lists.
    #[strum(serialize = "color")]
    Color,
    /// Dimension values.
    #[strum(serialize = "dimen")]
    Dimen,
    /// Drawable files and color drawables.
    #[strum(serialize = "drawable")]
    Drawable,
    /// Font files.
    #[strum(serialize = "font")]
    Font,
    /// Id placeholders.
    #[strum(serialize = "id")]
    Id,
    /// Integer values.
    #[strum(serialize = "integer")]
    Integer,
    /// Animation interpolators.
    #[strum(serialize = "interpolator")]
    Interpolator,
    /// Layout documents.
    #[strum(serialize = "layout")]
    Layout,
    /// Menu documents.
    #[strum(serialize = "menu")]
    Menu,
    /// Density-independent launcher icons.
    #[strum(serialize = "mipmap")]
    Mipmap,
    /// Quantity strings.
    #[strum(serialize = "plurals")]
    Plurals,
    /// Raw files, copied verbatim.
    #[strum(serialize = "raw")]
    Raw,
    /// Strings.
    #[strum(serialize = "string")]
    String,
    /// Styles and themes.
    #[strum(serialize = "style")]
    Style,
    /// Transition documents.
    #[strum(serialize = "transition")]
    Transition,
    /// Arbitrary XML documents.
    #[strum(serialize = "xml")]
    Xml,
}

/// A fully or partially qualified symbolic resource name.
///
/// The package may be empty while a compilation unit has not yet been merged;
/// lookup paths qualify it with the compilation package before resolution.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceName {
    /// Declaring package, possibly empty.
    pub package: String,
    /// Type tag.
    pub type_tag: ResourceType,
    /// Entry name within the type.
    pub entry: String,
}

impl ResourceName {
    /// Build a name from parts.
    pub fn new(
        package: impl Into<String>,
        type_tag: ResourceType,
        entry: impl Into<String>,
    ) -> Self {
        ResourceName {
            package: package.into(),
            type_tag,
            entry: entry.into(),
        }
    }

    /// Parse `[package:]type/entry`, tolerating a leading `@` or `?`.
    ///
    /// Returns `None` for empty entry names or unknown type tags.
    #[must_use]
    pub fn parse(s: &str) -> Option<ResourceName> {
        let s = s.strip_prefix(['@', '?']).unwrap_or(s);
        let (package, rest) = match s.find(':') {
            Some(ix) => (&s[..ix], &s[ix + 1..]),
            None => ("", s),
        };
        let slash = rest.find('/')?;
        let type_tag = ResourceType::from_str(&rest[..slash]).ok()?;
        let entry = &rest[slash + 1..];
        if entry.is_empty() {
            return None;
        }
        Some(ResourceName::new(package, type_tag, entry))
    }

    /// Return this name qualified with `package` if it has none.
    #[must_use]
    pub fn with_default_package(&self, package: &str) -> ResourceName {
        if self.package.is_empty() {
            ResourceName::new(package, self.type_tag, self.entry.clone())
        } else {
            self.clone()
        }
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.package.is_empty() {
            write!(f, "{}/{}", self.type_tag, self.entry)
        } else {
            write!(f, "{}:{}/{}", self.package, self.type_tag, self.entry)
        }
    }
}

/// A packed 32-bit resource id: `0xPPTTEEEE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ResourceId(pub u32);

impl ResourceId {
    /// Pack from package, type and entry components.
    #[must_use]
    pub fn new(package_id: u8, type_id: u8, entry_id: u16) -> Self {
        ResourceId(
            (u32::from(package_id) << 24) | (u32::from(type_id) << 16) | u32::from(entry_id),
        )
    }

    /// The 8-bit package component.
    #[must_use]
    pub fn package_id(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// The 8-bit type component.
    #[must_use]
    pub fn type_id(self) -> u8 {
        ((self.0 >> 16) & 0xff) as u8
    }

    /// The 16-bit entry component.
    #[must_use]
    pub fn entry_id(self) -> u16 {
        (self.0 & 0xffff) as u16
    }

    /// True when both package and type components are non-zero.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.package_id() != 0 && self.type_id() != 0
    }

    /// Parse `0xPPTTEEEE`.
    #[must_use]
    pub fn parse(s: &str) -> Option<ResourceId> {
        let hex = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
        if hex.is_empty() || hex.len() > 8 {
            return None;
        }
        u32::from_str_radix(hex, 16).ok().map(ResourceId)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}
