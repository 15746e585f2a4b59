//! Core error types.

/// Errors raised by the low-level data structures in this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A chunk's constant pool already holds the maximum of 256 entries.
    TooManyConstants,
}

impl std::fmt::Display for CoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::TooManyConstants => write!(f, "Too many constants in one chunk."),
        }
    }
}

impl std::error::Error for CoreError {}
