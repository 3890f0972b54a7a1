// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core error types for preon.
//!
//! Provides error types for the codec pipeline:
//! - Expression parsing
//! - Static binding / type checking at build time
//! - Decoding and encoding at runtime
//! - Bit-level buffer operations

use std::fmt;

/// What went wrong at the buffer level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferErrorKind {
    /// Read past the end of the buffer
    Underflow,
    /// Seek or slice outside the buffer bounds
    InvalidSeek,
}

/// Errors that can occur while building or running a codec.
#[derive(Debug, Clone)]
pub enum PreonError {
    /// Malformed expression source
    Parse {
        /// What was being parsed
        context: String,
        /// Error message
        message: String,
    },

    /// Static type mismatch, unresolved reference, or incompatible
    /// metadata detected at build time
    Binding {
        /// Reference or field path where the problem was found
        path: String,
        /// Error message
        message: String,
    },

    /// Runtime decode failure
    Decoding {
        /// Path of the field being decoded when the error occurred
        field_path: String,
        /// Bit position of the buffer when the error occurred
        bit_position: u64,
        /// What went wrong
        reason: String,
    },

    /// Runtime encode failure
    Encoding {
        /// Path of the field being encoded when the error occurred
        field_path: String,
        /// What went wrong
        reason: String,
    },

    /// Buffer underflow, overflow, or invalid seek
    Buffer {
        /// Kind of buffer failure
        kind: BufferErrorKind,
        /// Bits requested, or the seek target
        requested: u64,
        /// Bits available, or the buffer length
        available: u64,
        /// Bit position when the error occurred
        position: u64,
    },
}

impl PreonError {
    /// Create a parse error.
    pub fn parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        PreonError::Parse {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a binding error.
    pub fn binding(path: impl Into<String>, message: impl Into<String>) -> Self {
        PreonError::Binding {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a decoding error.
    pub fn decoding(
        field_path: impl Into<String>,
        bit_position: u64,
        reason: impl Into<String>,
    ) -> Self {
        PreonError::Decoding {
            field_path: field_path.into(),
            bit_position,
            reason: reason.into(),
        }
    }

    /// Create an encoding error.
    pub fn encoding(field_path: impl Into<String>, reason: impl Into<String>) -> Self {
        PreonError::Encoding {
            field_path: field_path.into(),
            reason: reason.into(),
        }
    }

    /// Create a buffer underflow/overflow error.
    pub fn buffer(requested: u64, available: u64, position: u64) -> Self {
        PreonError::Buffer {
            kind: BufferErrorKind::Underflow,
            requested,
            available,
            position,
        }
    }

    /// Create an invalid seek error.
    pub fn seek(target: u64, length: u64) -> Self {
        PreonError::Buffer {
            kind: BufferErrorKind::InvalidSeek,
            requested: target,
            available: length,
            position: target,
        }
    }

    /// Attach a field name to this error, prefixing any existing path.
    ///
    /// Buffer errors are promoted to decoding errors so the
    /// originating field is reported alongside the bit position.
    pub fn at_field(self, field: &str) -> Self {
        match self {
            PreonError::Decoding {
                field_path,
                bit_position,
                reason,
            } => PreonError::Decoding {
                field_path: prefix_path(field, &field_path),
                bit_position,
                reason,
            },
            PreonError::Encoding { field_path, reason } => PreonError::Encoding {
                field_path: prefix_path(field, &field_path),
                reason,
            },
            PreonError::Binding { path, message } => PreonError::Binding {
                path: prefix_path(field, &path),
                message,
            },
            PreonError::Buffer {
                kind,
                requested,
                available,
                position,
            } => PreonError::Decoding {
                field_path: field.to_string(),
                bit_position: position,
                reason: match kind {
                    BufferErrorKind::Underflow => format!(
                        "buffer underflow: requested {requested} bits, {available} available"
                    ),
                    BufferErrorKind::InvalidSeek => format!(
                        "seek to bit {requested} outside buffer of {available} bits"
                    ),
                },
            },
            other => other,
        }
    }

    /// Get structured fields for logging.
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            PreonError::Parse { context, message } => {
                vec![("context", context.clone()), ("message", message.clone())]
            }
            PreonError::Binding { path, message } => {
                vec![("path", path.clone()), ("message", message.clone())]
            }
            PreonError::Decoding {
                field_path,
                bit_position,
                reason,
            } => vec![
                ("field", field_path.clone()),
                ("bit_position", bit_position.to_string()),
                ("reason", reason.clone()),
            ],
            PreonError::Encoding { field_path, reason } => {
                vec![("field", field_path.clone()), ("reason", reason.clone())]
            }
            PreonError::Buffer {
                kind: BufferErrorKind::Underflow,
                requested,
                available,
                position,
            } => vec![
                ("requested", requested.to_string()),
                ("available", available.to_string()),
                ("position", position.to_string()),
            ],
            PreonError::Buffer {
                kind: BufferErrorKind::InvalidSeek,
                requested,
                available,
                ..
            } => vec![
                ("target", requested.to_string()),
                ("length", available.to_string()),
            ],
        }
    }
}

fn prefix_path(field: &str, rest: &str) -> String {
    if rest.is_empty() {
        field.to_string()
    } else if rest.starts_with('[') {
        format!("{field}{rest}")
    } else {
        format!("{field}.{rest}")
    }
}

impl fmt::Display for PreonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreonError::Parse { context, message } => {
                write!(f, "Parse error in {context}: {message}")
            }
            PreonError::Binding { path, message } => {
                write!(f, "Binding error at '{path}': {message}")
            }
            PreonError::Decoding {
                field_path,
                bit_position,
                reason,
            } => write!(
                f,
                "Failed to decode field '{field_path}' at bit {bit_position}: {reason}"
            ),
            PreonError::Encoding { field_path, reason } => {
                write!(f, "Failed to encode field '{field_path}': {reason}")
            }
            PreonError::Buffer {
                kind: BufferErrorKind::Underflow,
                requested,
                available,
                position,
            } => write!(
                f,
                "Buffer underflow: requested {requested} bits at bit {position}, but only {available} bits available"
            ),
            PreonError::Buffer {
                kind: BufferErrorKind::InvalidSeek,
                requested,
                available,
                ..
            } => write!(
                f,
                "Invalid seek: target bit {requested} outside buffer of {available} bits"
            ),
        }
    }
}

impl std::error::Error for PreonError {}

/// Result type for preon operations.
pub type Result<T> = std::result::Result<T, PreonError>;
