// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide error type and result alias.

/// Errors returned by dynbind operations.
///
/// This enum covers all error conditions that can occur while binding,
/// reading, or mutating schema-typed buffers, from bad operands to
/// resource exhaustion.
///
/// # Example
///
/// ```rust,no_run
/// use dynbind::{BufferWindow, Error};
///
/// let window = BufferWindow::copy_from_readonly(&[0u8; 8]).unwrap();
/// match window.acquire(true) {
///     Err(Error::ReadOnlyBuffer) => println!("window is read-only"),
///     Err(e) => println!("other error: {}", e),
///     Ok(_) => println!("writable"),
/// }
/// ```
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Type Errors
    // ========================================================================
    /// Wrong kind of value or operand for an operation.
    TypeMismatch {
        /// What the operation required.
        expected: String,
        /// What it actually received.
        got: String,
    },
    /// Operation only valid on a different base kind (e.g. `item()` on a
    /// container, `attr()` on an array).
    InvalidOperation(String),

    // ========================================================================
    // Value Errors
    // ========================================================================
    /// Well-typed but semantically invalid input (e.g. malformed element
    /// count / element size combination, re-initialization).
    InvalidValue(String),

    // ========================================================================
    // Sequence Errors
    // ========================================================================
    /// Sequence index out of bounds.
    IndexOutOfBounds {
        /// Requested index.
        index: usize,
        /// Number of elements available.
        length: usize,
    },

    // ========================================================================
    // Buffer Errors
    // ========================================================================
    /// Operation requires a bound buffer but none is attached.
    NoBuffer,
    /// Writable access requested on a read-only buffer window.
    ReadOnlyBuffer,
    /// Buffer window too small for the requested region.
    BufferTooSmall {
        /// Bytes required.
        need: usize,
        /// Bytes available.
        have: usize,
    },

    // ========================================================================
    // Runtime Errors
    // ========================================================================
    /// Schema service failed or returned inconsistent metadata.
    Schema(String),
    /// Conversion engine failure (type cannot be mapped, pack/unpack error).
    Codec(String),

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// Out of memory during buffer allocation.
    OutOfMemory,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Type
            Error::TypeMismatch { expected, got } => {
                write!(f, "Type mismatch: expected {}, got {}", expected, got)
            }
            Error::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
            // Value
            Error::InvalidValue(msg) => write!(f, "Invalid value: {}", msg),
            // Sequence
            Error::IndexOutOfBounds { index, length } => {
                write!(f, "Index out of bounds: {} >= {}", index, length)
            }
            // Buffer
            Error::NoBuffer => write!(f, "No buffer attached"),
            Error::ReadOnlyBuffer => write!(f, "Buffer window is read-only"),
            Error::BufferTooSmall { need, have } => {
                write!(f, "Buffer too small: need {} bytes, have {}", need, have)
            }
            // Runtime
            Error::Schema(msg) => write!(f, "Schema service error: {}", msg),
            Error::Codec(msg) => write!(f, "Conversion error: {}", msg),
            // Resource
            Error::OutOfMemory => write!(f, "Out of memory"),
        }
    }
}

impl std::error::Error for Error {}

/// Convenient alias for API results using the public `Error` type.
pub type Result<T> = core::result::Result<T, Error>;
