// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Type declarations and binding metadata.
//!
//! This module is the metadata source for the codec factory: it holds the
//! record, enum, and field declarations that annotations or schema files
//! would otherwise provide.

pub mod descriptor;

pub use descriptor::{
    Charset, ChoiceArm, EnumType, FieldDescriptor, FieldOptions, FieldType, RecordBuilder,
    RecordType, Schema, SchemaBuilder, Termination,
};
