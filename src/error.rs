
//! Error kinds shared by the EXR and J2K codecs.
//!
//! Both codec stacks return a `Result<T>` everywhere; panics are reserved for
//! programmer errors (failed invariants, bad allocator usage). Both sides
//! expose a resilience switch that decides whether `Format` and `DataCorrupt`
//! errors abort the read or get downgraded to a [`Diagnostic`] and skip the
//! affected unit instead: a plain `pedantic: bool` parameter on the EXR side
//! (`crate::image::simple::read_first_flat_layer_from_buffered`) and the
//! `resilient` field of `crate::j2k::Settings` on the J2K side.

use std::convert::TryFrom;
use std::fmt;

/// Standard result type returned by almost all operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for operations that either succeed or fail, without a meaningful value.
pub type UnitResult = Result<()>;

pub use std::io::Error as IoError;

/// Result type for the raw `std::io::Read`/`Write` primitives this crate's `Data` trait
/// and stream wrappers build on, kept distinct from the crate's own `Result` so that the
/// two don't get silently confused at a `?` boundary.
pub type IoResult<T> = std::io::Result<T>;

/// The kinds of failure this crate can report.
///
/// Every kind carries a human-readable message. `Io` wraps the underlying
/// stream error unchanged; the others are produced by this crate's own validation.
#[derive(Debug)]
pub enum Error {
    /// The underlying byte stream failed to read, write, or seek.
    Io(IoError),

    /// A magic number, version field, or marker sequence was not recognized.
    /// In `resilient` mode this is downgraded to a diagnostic and the affected
    /// chunk, packet, or tile-part is skipped instead of aborting the whole read.
    Format(String),

    /// A required header attribute was missing, out of range, or internally
    /// inconsistent (for example a channel list that does not evenly divide
    /// the data window).
    BadHeader(String),

    /// A compressor, bit-plane coder, or packet header reported inconsistent
    /// lengths or a checksum mismatch. Same `resilient` downgrade policy as `Format`.
    DataCorrupt(String),

    /// The caller asked for a feature this implementation intentionally does
    /// not support (more than one quality layer, POC/PPM/RGN, more than 255
    /// tile-parts, and similar).
    Unsupported(String),

    /// An attribute value was copied into, or compared against, a value of a
    /// different registered type.
    TypeMismatch(String),

    /// An allocator (the J2K elastic or fixed allocator) could not satisfy a request.
    ResourceExhausted(String),
}

impl Error {
    pub fn invalid(message: impl Into<String>) -> Self { Error::BadHeader(message.into()) }
    pub fn unsupported(message: impl Into<String>) -> Self { Error::Unsupported(message.into()) }
    pub fn format(message: impl Into<String>) -> Self { Error::Format(message.into()) }
    pub fn corrupt(message: impl Into<String>) -> Self { Error::DataCorrupt(message.into()) }
    pub fn type_mismatch(message: impl Into<String>) -> Self { Error::TypeMismatch(message.into()) }
    pub fn resources_exhausted(message: impl Into<String>) -> Self { Error::ResourceExhausted(message.into()) }

    /// A short machine-readable code, stable across versions, for integrations
    /// that want to branch on error kind without matching on `Error` directly.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Io(_) => "io_error",
            Error::Format(_) => "format_error",
            Error::BadHeader(_) => "bad_header",
            Error::DataCorrupt(_) => "data_corrupt",
            Error::Unsupported(_) => "unsupported_feature",
            Error::TypeMismatch(_) => "type_mismatch",
            Error::ResourceExhausted(_) => "resource_exhausted",
        }
    }

    /// Whether `resilient` read modes are allowed to downgrade this error to a
    /// diagnostic and continue with the next unit (chunk, packet, tile-part),
    /// instead of aborting the whole read.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Format(_) | Error::DataCorrupt(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(formatter, "i/o error: {}", err),
            Error::Format(msg) => write!(formatter, "invalid format: {}", msg),
            Error::BadHeader(msg) => write!(formatter, "invalid header: {}", msg),
            Error::DataCorrupt(msg) => write!(formatter, "corrupt data: {}", msg),
            Error::Unsupported(msg) => write!(formatter, "unsupported: {}", msg),
            Error::TypeMismatch(msg) => write!(formatter, "type mismatch: {}", msg),
            Error::ResourceExhausted(msg) => write!(formatter, "resource exhausted: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<IoError> for Error {
    fn from(error: IoError) -> Self { Error::Io(error) }
}

/// A diagnostic emitted while reading in `resilient` mode: an error was
/// encountered but processing continued, substituting zeroed pixels for the
/// affected unit.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub code: &'static str,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "[{}] {}", self.code, self.message)
    }
}

/// Collects `Diagnostic`s produced while resiliently skipping bad chunks,
/// packets, or tile-parts. Passed alongside the reader; never panics or aborts.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self { Self::default() }

    pub fn record(&mut self, error: &Error) {
        self.entries.push(Diagnostic { message: error.to_string(), code: error.code() });
    }

    pub fn entries(&self) -> &[Diagnostic] { &self.entries }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

macro_rules! cast_fn {
    ($name:ident, $from:ty, $to:ty, $what:expr) => {
        pub fn $name(value: $from, what: &'static str) -> Result<$to> {
            <$to>::try_from(value).map_err(|_| Error::invalid(format!("{} out of range ({})", what, $what)))
        }
    };
}

cast_fn!(i32_to_usize, i32, usize, "must be non-negative and fit in usize");
cast_fn!(usize_to_i32, usize, i32, "must fit in i32");
cast_fn!(u64_to_usize, u64, usize, "must fit in usize");
cast_fn!(usize_to_u64, usize, u64, "must fit in u64");
cast_fn!(i64_to_usize, i64, usize, "must be non-negative and fit in usize");
cast_fn!(usize_to_i64, usize, i64, "must fit in i64");
cast_fn!(u32_to_usize, u32, usize, "must fit in usize");
cast_fn!(usize_to_u32, usize, u32, "must fit in u32");

/// Construct a `BadHeader` error for a missing mandatory attribute.
pub fn missing_attribute(name: impl Into<String>) -> Error {
    Error::invalid(format!("missing required attribute: {}", name.into()))
}
