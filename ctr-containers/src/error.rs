//! Errors raised while parsing or building containers.

use std::fmt;

/// An error raised while decoding container data.
///
/// Any of these is fatal for the container that raised it: the caller
/// returns immediately and no partial model is committed. Non-fatal
/// inconsistencies (a BFLIM whose header disagrees with the physical
/// file size, an unknown MSBT section tag) are logged and skipped
/// instead of surfacing here.
#[derive(Debug)]
pub enum ParseError {
    /// A magic field did not match the expected bytes.
    BadMagic {
        container: &'static str,
        found: String,
        expected: &'static str,
    },
    /// The byte-order marker was neither of the two valid patterns.
    BadBom(u16),
    /// A fixed-size header declared an unexpected length.
    BadHeaderSize {
        container: &'static str,
        found: u32,
        expected: u32,
    },
    /// The container's self-reported length disagrees with its
    /// physical length.
    SizeMismatch {
        container: &'static str,
        header: u64,
        actual: u64,
    },
    /// A version field this implementation does not understand.
    UnknownVersion(u32),
    /// A section body ended before its declared contents.
    TruncatedSection(&'static str),
    /// A pixel-format code outside the container's format table.
    UnknownPixelFormat(u8),
    /// A code-map mapping type outside {0, 1, 2}.
    InvalidMappingType(u16),
    /// A stored archive filename whose hash disagrees with its node.
    HashMismatch {
        name: String,
        computed: u32,
        stored: u32,
    },
    /// A compressed texture block shorter than its fixed size.
    TruncatedBlock,
    /// A read crossed the end of the buffer.
    OutOfBounds,
    /// The zlib stream wrapping an archive could not be inflated.
    BadZlibStream(String),
    /// An underlying I/O failure while pulling streamed bytes.
    Io(std::io::Error),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BadMagic {
                container,
                found,
                expected,
            } => write!(
                f,
                "invalid {container} magic bytes: \"{found}\" (expected \"{expected}\")"
            ),
            ParseError::BadBom(bom) => write!(
                f,
                "invalid byte-order marker: 0x{bom:04X} (expected 0xFEFF or 0xFFFE)"
            ),
            ParseError::BadHeaderSize {
                container,
                found,
                expected,
            } => write!(
                f,
                "invalid {container} header size: {found} (expected {expected})"
            ),
            ParseError::SizeMismatch {
                container,
                header,
                actual,
            } => write!(
                f,
                "{container} file size mismatch: header says {header}, found {actual}"
            ),
            ParseError::UnknownVersion(version) => {
                write!(f, "unknown container version 0x{version:08X}")
            }
            ParseError::TruncatedSection(section) => {
                write!(f, "{section} section is shorter than its declared contents")
            }
            ParseError::UnknownPixelFormat(code) => {
                write!(f, "unknown pixel format code 0x{code:02X}")
            }
            ParseError::InvalidMappingType(kind) => {
                write!(f, "invalid code-map mapping type {kind}")
            }
            ParseError::HashMismatch {
                name,
                computed,
                stored,
            } => write!(
                f,
                "invalid filename \"{name}\": hash 0x{computed:08x} (expected 0x{stored:08x})"
            ),
            ParseError::TruncatedBlock => write!(f, "truncated compressed texture block"),
            ParseError::OutOfBounds => write!(f, "a read was out of bounds"),
            ParseError::BadZlibStream(msg) => write!(f, "bad zlib stream: {msg}"),
            ParseError::Io(err) => write!(f, "i/o error: {err}"),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<std::io::Error> for ParseError {
    fn from(err: std::io::Error) -> ParseError {
        ParseError::Io(err)
    }
}

/// An error raised while building a container from authoring input.
///
/// These abort before any output bytes are committed.
#[derive(Debug)]
pub enum BuildError {
    /// An input image does not have the dimensions the model declares.
    DimensionMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },
    /// A format name in a manifest that no pixel format matches.
    UnknownFormatName(String),
    /// A pixel format with no encoder (HILO8, or the compressed
    /// block formats which this tool does not re-encode).
    UnsupportedFormat(&'static str),
    /// Authoring input that cannot be assembled into a valid container.
    InvalidInput(String),
    Io(std::io::Error),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::DimensionMismatch { expected, found } => write!(
                f,
                "image is {}x{} but the container declares {}x{}",
                found.0, found.1, expected.0, expected.1
            ),
            BuildError::UnknownFormatName(name) => {
                write!(f, "unknown pixel format name \"{name}\"")
            }
            BuildError::UnsupportedFormat(what) => {
                write!(f, "{what} cannot be encoded")
            }
            BuildError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            BuildError::Io(err) => write!(f, "i/o error: {err}"),
        }
    }
}

impl std::error::Error for BuildError {}

impl From<std::io::Error> for BuildError {
    fn from(err: std::io::Error) -> BuildError {
        BuildError::Io(err)
    }
}
