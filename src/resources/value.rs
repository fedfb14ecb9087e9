//! The closed value sum stored in resource table entries.
//!
//! Every configuration-keyed value is one of a small, closed set of variants:
//! simple items (primitives, strings, references, file references, id
//! placeholders) or compounds (attribute definitions, styles, arrays,
//! plurals). Passes pattern-match exhaustively over [`Value`]; there is no
//! open polymorphism.
//!
//! A [`Reference`] starts symbolic (name only) and is rewritten in place by
//! the reference linker to carry a resolved [`ResourceId`]. References marked
//! `dynamic` are permitted to stay unresolved for runtime-loaded packages.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::io::file::InputFile;
use crate::resources::name::{ResourceId, ResourceName};

/// Whether a reference uses resource (`@`) or attribute (`?`) lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceType {
    /// `@[package:]type/entry`
    #[default]
    Resource,
    /// `?[package:]attr/entry`
    Attribute,
}

/// A symbolic or resolved reference to another resource.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reference {
    /// Symbolic target; present until (and after) resolution.
    pub name: Option<ResourceName>,
    /// Resolved id; set by the reference linker.
    pub id: Option<ResourceId>,
    /// Resource or attribute lookup.
    pub reference_type: ReferenceType,
    /// True when the target is a private symbol in the same package.
    pub private: bool,
    /// True when the target lives in a runtime-loaded package and may stay
    /// unresolved.
    pub dynamic: bool,
}

impl Reference {
    /// A symbolic resource reference.
    #[must_use]
    pub fn new(name: ResourceName) -> Self {
        Reference {
            name: Some(name),
            ..Reference::default()
        }
    }

    /// A symbolic attribute reference.
    #[must_use]
    pub fn new_attribute(name: ResourceName) -> Self {
        Reference {
            name: Some(name),
            reference_type: ReferenceType::Attribute,
            ..Reference::default()
        }
    }

    /// True once an id has been substituted.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.id.is_some()
    }
}

/// A reference to a file in the output archive.
///
/// Owns an opaque handle into the input collection the payload comes from;
/// `path` is the destination inside the archive.
#[derive(Clone, Default)]
pub struct FileReference {
    /// Destination path within the output archive.
    pub path: String,
    /// Input payload handle; `None` only for references synthesized before
    /// their payload exists.
    pub file: Option<Arc<dyn InputFile>>,
}

impl FileReference {
    /// Build a file reference with destination `path` and input handle.
    #[must_use]
    pub fn new(path: impl Into<String>, file: Option<Arc<dyn InputFile>>) -> Self {
        FileReference {
            path: path.into(),
            file,
        }
    }
}

impl fmt::Debug for FileReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileReference")
            .field("path", &self.path)
            .field(
                "file",
                &self.file.as_ref().map(|file| file.source().path.clone()),
            )
            .finish()
    }
}

impl PartialEq for FileReference {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

/// A typed primitive value.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// Decimal or hex integer.
    Int(i32),
    /// Boolean.
    Bool(bool),
    /// Packed ARGB color.
    Color(u32),
    /// Floating point.
    Float(f32),
}

/// A simple (non-compound) value.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// Typed primitive.
    Primitive(Primitive),
    /// Cooked string (escapes processed at compile time).
    String(String),
    /// Uninterpreted string, kept verbatim for later parsing.
    RawString(String),
    /// Reference to another resource.
    Reference(Reference),
    /// Reference to a file payload.
    FileReference(FileReference),
    /// Id placeholder; carries no data besides its name.
    Id,
}

bitflags! {
    /// Value formats an attribute accepts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AttributeFormat: u32 {
        /// Any reference.
        const REFERENCE = 1 << 0;
        /// Any string.
        const STRING = 1 << 1;
        /// Any integer.
        const INTEGER = 1 << 2;
        /// Boolean.
        const BOOLEAN = 1 << 3;
        /// Color.
        const COLOR = 1 << 4;
        /// Float.
        const FLOAT = 1 << 5;
        /// Dimension.
        const DIMENSION = 1 << 6;
        /// Fraction.
        const FRACTION = 1 << 7;
        /// One of the declared enum symbols.
        const ENUM = 1 << 16;
        /// A combination of the declared flag symbols.
        const FLAGS = 1 << 17;
        /// Any of the simple formats.
        const ANY = Self::REFERENCE.bits() | Self::STRING.bits() | Self::INTEGER.bits()
            | Self::BOOLEAN.bits() | Self::COLOR.bits() | Self::FLOAT.bits()
            | Self::DIMENSION.bits() | Self::FRACTION.bits();
    }
}

/// A named enum/flag symbol declared by an attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSymbol {
    /// The symbol's id resource.
    pub symbol: Reference,
    /// The value the symbol stands for.
    pub value: u32,
}

/// An attribute definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Accepted formats.
    pub format: AttributeFormat,
    /// Inclusive minimum for integer values.
    pub min_int: Option<i32>,
    /// Inclusive maximum for integer values.
    pub max_int: Option<i32>,
    /// Declared enum/flag symbols.
    pub symbols: Vec<AttributeSymbol>,
}

impl Attribute {
    /// An attribute accepting any simple format.
    #[must_use]
    pub fn any() -> Self {
        Attribute {
            format: AttributeFormat::ANY,
            min_int: None,
            max_int: None,
            symbols: Vec::new(),
        }
    }
}

/// One `item` inside a style.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleEntry {
    /// The attribute being set; always an attribute reference.
    pub key: Reference,
    /// The value assigned to the attribute.
    pub value: Item,
}

/// A style or theme.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Style {
    /// Optional explicit parent.
    pub parent: Option<Reference>,
    /// Attribute assignments in declaration order.
    pub entries: Vec<StyleEntry>,
}

/// A typed array.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Array {
    /// Items in declaration order.
    pub items: Vec<Item>,
}

/// Quantity classes for plurals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluralQuantity {
    /// Quantity `zero`.
    Zero = 0,
    /// Quantity `one`.
    One = 1,
    /// Quantity `two`.
    Two = 2,
    /// Quantity `few`.
    Few = 3,
    /// Quantity `many`.
    Many = 4,
    /// Quantity `other`.
    Other = 5,
}

impl PluralQuantity {
    /// Decode from the wire index.
    #[must_use]
    pub fn from_index(ix: u8) -> Option<Self> {
        match ix {
            0 => Some(PluralQuantity::Zero),
            1 => Some(PluralQuantity::One),
            2 => Some(PluralQuantity::Two),
            3 => Some(PluralQuantity::Few),
            4 => Some(PluralQuantity::Many),
            5 => Some(PluralQuantity::Other),
            _ => None,
        }
    }
}

/// Quantity strings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Plural {
    /// One optional item per quantity class, indexed by [`PluralQuantity`].
    pub values: [Option<Item>; 6],
}

/// The closed sum of everything a resource entry can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A simple item.
    Item(Item),
    /// An attribute definition.
    Attribute(Attribute),
    /// A style.
    Style(Style),
    /// An array.
    Array(Array),
    /// Quantity strings.
    Plural(Plural),
}

impl Value {
    /// The contained item, for simple values.
    #[must_use]
    pub fn as_item(&self) -> Option<&Item> {
        match self {
            Value::Item(item) => Some(item),
            _ => None,
        }
    }

    /// The contained file reference, if this is one.
    #[must_use]
    pub fn as_file_reference(&self) -> Option<&FileReference> {
        match self {
            Value::Item(Item::FileReference(file_ref)) => Some(file_ref),
            _ => None,
        }
    }

    /// Mutable access to the contained file reference, if this is one.
    pub fn as_file_reference_mut(&mut self) -> Option<&mut FileReference> {
        match self {
            Value::Item(Item::FileReference(file_ref)) => Some(file_ref),
            _ => None,
        }
    }

    /// True for `Item(Id)` values.
    #[must_use]
    pub fn is_id(&self) -> bool {
        matches!(self, Value::Item(Item::Id))
    }
}
