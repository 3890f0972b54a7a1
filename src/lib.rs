// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Preon
//!
//! Declarative binary-format framework: describe a data type with binding
//! metadata and get a [`Codec`], a bidirectional translator between a
//! structured [`Value`] and a bit-level wire representation. Lengths,
//! guards, offsets, and union dispatch are driven by a small typed
//! expression language evaluated against already-decoded sibling fields.
//!
//! ## Architecture
//!
//! The crate is organized in layers:
//! - `buffer/` - bit-addressable [`BitBuffer`] reader and [`BitChannel`]
//!   writer
//! - `el/` - the expression language: typed AST, pest parser, reference
//!   model, runtime resolver
//! - `schema/` - record/enum declarations and the binding metadata bag
//! - `codec/` - the [`Codec`] contract plus primitive and combinator
//!   implementations
//! - `factory/` - the pipeline that turns a declaration into a codec tree
//!
//! ## Example
//!
//! ```
//! use preon::schema::{FieldOptions, FieldType, RecordBuilder, Schema};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // {u8 n; bytes[n] payload}
//! let schema = Schema::builder()
//!     .record(
//!         RecordBuilder::new("Packet")
//!             .field("n", FieldType::uint(8))
//!             .with("payload", FieldType::Bytes, FieldOptions::new().length("n"))
//!             .build(),
//!     )
//!     .build();
//!
//! let codec = preon::create(&schema, "Packet")?;
//! let value = preon::decode(codec.as_ref(), &[0x03, 0x41, 0x42, 0x43])?;
//! assert_eq!(preon::encode(codec.as_ref(), &value)?, vec![0x03, 0x41, 0x42, 0x43]);
//! # Ok(())
//! # }
//! ```

// Core types
pub mod core;

// Re-export core types for convenience
pub use core::{BufferErrorKind, DecodedRecord, PreonError, Result, Value};

// Bit-level I/O
pub mod buffer;

pub use buffer::{BitBuffer, BitChannel, Endianness};

// Expression language
pub mod el;

pub use el::{ElType, Expr, Reference, ReferenceContext, Resolver};

// Type declarations and binding metadata
pub mod schema;

pub use schema::{FieldOptions, FieldType, RecordBuilder, Schema};

// Codec contract and implementations
pub mod codec;

pub use codec::{decode, decode_with, encode, Builder, Codec, Constructor, DefaultBuilder};

// Factory pipeline
pub mod factory;

pub use factory::{create, BindingDecorator, CodecDecorator, CodecFactory, SubFactory};
