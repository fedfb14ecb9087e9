use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Pipeline passes report the details of every individual failure through the
/// [`crate::diagnostics::Diagnostics`] sink as they occur; the variant returned from a pass
/// summarizes the failure kind so the driver can abort before the next pass runs.
///
/// # Error Categories
///
/// ## Input Errors
/// - [`Error::Io`] - Filesystem I/O failures on input collections
/// - [`Error::Malformed`] - Corrupted or invalid compiled input
/// - [`Error::OutOfBounds`] - Attempted to read beyond input boundaries
///
/// ## Pipeline Errors
/// - [`Error::MergeConflict`] - Duplicate definitions the merge policy does not permit
/// - [`Error::UnknownSymbol`] - A symbolic reference that no symbol source can resolve
/// - [`Error::VisibilityViolation`] - A private symbol referenced across packages
/// - [`Error::IdConflict`] - A stable or assigned id claimed twice
/// - [`Error::ManifestInvalid`] - Malformed or incomplete manifest document
/// - [`Error::VersioningImpossible`] - An API-level fan-out that cannot be synthesized
/// - [`Error::SplitConstraintInvalid`] - Overlapping or unparsable split constraints
///
/// ## Output Errors
/// - [`Error::OutputIo`] - Archive or side-output write failures
#[derive(Error, Debug)]
pub enum Error {
    /// An out of bound access was attempted while parsing a compiled input.
    ///
    /// This is a safety check to prevent buffer overruns when decoding
    /// truncated tables, containers or binary XML.
    #[error("Out of bound read would have occurred!")]
    OutOfBounds,

    /// A compiled input is damaged and could not be decoded.
    ///
    /// The error includes the source location where the malformation was
    /// detected for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// File I/O error while reading inputs.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Two definitions of the same resource collided under the active merge policy.
    #[error("{0}")]
    MergeConflict(String),

    /// A symbolic reference could not be resolved by any symbol source.
    #[error("{0}")]
    UnknownSymbol(String),

    /// A private symbol was referenced from outside its declaring package.
    #[error("{0}")]
    VisibilityViolation(String),

    /// A resource id was claimed by more than one entry.
    #[error("{0}")]
    IdConflict(String),

    /// The manifest document is missing required structure.
    #[error("{0}")]
    ManifestInvalid(String),

    /// Auto-versioning could not synthesize a required configuration variant.
    #[error("{0}")]
    VersioningImpossible(String),

    /// Split constraints are unparsable or not pairwise disjoint.
    #[error("{0}")]
    SplitConstraintInvalid(String),

    /// Failed writing to the output archive or a side output.
    #[error("{0}")]
    OutputIo(String),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
