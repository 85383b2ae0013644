use displaydoc::Display;

/// Errors reported by collator construction, configuration and bounded output.
#[derive(Display, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CollationError {
    /// Illegal argument: {0}
    IllegalArgument(&'static str),
    /// Memory allocation failed
    MemoryAllocation,
    /// Buffer overflow: {needed} elements required
    BufferOverflow { needed: usize },
    /// Unsupported operation: {0}
    Unsupported(&'static str),
    /// The string does not map to exactly one collation element
    CeNotFound,
    /// Invalid collation data: {0}
    InvalidData(String),
}

impl std::error::Error for CollationError {}

impl From<std::collections::TryReserveError> for CollationError {
    fn from(_: std::collections::TryReserveError) -> Self {
        Self::MemoryAllocation
    }
}

impl From<bincode::Error> for CollationError {
    fn from(e: bincode::Error) -> Self {
        Self::InvalidData(e.to_string())
    }
}
