//! Error types for schema construction, the wire codec and the registry

use thiserror::Error;

/// Result type for schema construction
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Errors raised while building schemes from declarations.
///
/// Every variant aborts construction; no partial schema is produced.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Version conflict: {scheme}.{object} differs at version {version}")]
    VersionConflict {
        scheme: String,
        object: String,
        version: usize,
    },

    #[error("Command {command} uses unsupported payload shape: {shape}")]
    UnsupportedCommandShape { command: String, shape: String },

    #[error("Reference without a scheme in {owner}: only object schemes may refer to themselves")]
    LocalRefOutsideObjectScheme { owner: String },

    #[error("Cyclic scheme dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Errors raised while reading or writing the binary wire format
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unexpected end of buffer: need {need} bytes at offset {offset}, have {len}")]
    UnexpectedEof { offset: usize, need: usize, len: usize },

    #[error("Unknown value kind 0x{0:02x}")]
    UnknownKind(u8),

    #[error("Expected {expected}, found {found}")]
    KindMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Variant tag mismatch: expected {expected}, found {found}")]
    TagMismatch { expected: u32, found: u32 },

    #[error("Unknown {ty} variant tag {tag}")]
    UnknownVariant { ty: &'static str, tag: u64 },

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Index {index} out of range for sequence of {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid UTF-8 in string value")]
    InvalidUtf8,

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Nesting depth exceeds limit of {0}")]
    DepthExceeded(usize),

    #[error("Integer {0} does not fit the target type")]
    IntegerOverflow(u64),
}

/// Errors returned by the runtime type registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Scheme not defined: {0}")]
    SchemeNotDefined(usize),

    #[error("Object not defined: {name} in scheme {scheme}")]
    ObjectNotDefined { scheme: usize, name: usize },

    #[error("Version not defined: {version} of object {name} in scheme {scheme}")]
    VersionNotDefined {
        scheme: usize,
        name: usize,
        version: usize,
    },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}
