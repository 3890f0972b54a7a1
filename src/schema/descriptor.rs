// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Type declarations and binding metadata.
//!
//! A [`Schema`] holds named record and enum declarations. Each record is an
//! ordered list of [`FieldDescriptor`]s: a field name, a declared
//! [`FieldType`], and a [`FieldOptions`] bag carrying the expression-driven
//! binding metadata (width, guard, length, offset, choices, ...).
//! Expressions are stored as source text and parsed by the codec factory
//! against the record's reference context.

use std::collections::HashMap;

use crate::buffer::Endianness;

/// Declared type of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// Unsigned integer of the given bit width (1..=64)
    UInt {
        /// Width in bits
        bits: u32,
    },
    /// Signed two's-complement integer of the given bit width (1..=64)
    Int {
        /// Width in bits
        bits: u32,
    },
    /// Single-bit boolean
    Bool,
    /// 32-bit IEEE-754 float
    Float32,
    /// 64-bit IEEE-754 float
    Float64,
    /// Raw byte array; length comes from the `length` option
    Bytes,
    /// Text; length and termination come from the options
    String,
    /// Named enum declaration
    Enum(String),
    /// Sequence of elements; discipline comes from the options
    List(Box<FieldType>),
    /// Named record declaration
    Record(String),
    /// Discriminated union; arms come from the `choices` option
    Union,
}

impl FieldType {
    /// Unsigned integer of `bits` width.
    pub fn uint(bits: u32) -> Self {
        FieldType::UInt { bits }
    }

    /// Signed integer of `bits` width.
    pub fn int(bits: u32) -> Self {
        FieldType::Int { bits }
    }

    /// List of `element` values.
    pub fn list(element: FieldType) -> Self {
        FieldType::List(Box::new(element))
    }

    /// Named record reference.
    pub fn record(name: impl Into<String>) -> Self {
        FieldType::Record(name.into())
    }

    /// Fixed bit size of this type, when it has one independent of
    /// metadata. Composite and length-driven types return `None`.
    pub fn fixed_bit_size(&self) -> Option<u64> {
        match self {
            FieldType::UInt { bits } | FieldType::Int { bits } => Some(*bits as u64),
            FieldType::Bool => Some(1),
            FieldType::Float32 => Some(32),
            FieldType::Float64 => Some(64),
            _ => None,
        }
    }

    /// Short display name used in error messages.
    pub fn describe(&self) -> String {
        match self {
            FieldType::UInt { bits } => format!("u{bits}"),
            FieldType::Int { bits } => format!("i{bits}"),
            FieldType::Bool => "bool".to_string(),
            FieldType::Float32 => "f32".to_string(),
            FieldType::Float64 => "f64".to_string(),
            FieldType::Bytes => "bytes".to_string(),
            FieldType::String => "string".to_string(),
            FieldType::Enum(name) => format!("enum {name}"),
            FieldType::List(element) => format!("list of {}", element.describe()),
            FieldType::Record(name) => name.clone(),
            FieldType::Union => "union".to_string(),
        }
    }
}

/// String termination policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Termination {
    /// Fixed extent from the `length` option
    #[default]
    None,
    /// Read until a zero byte; the zero byte is consumed and dropped
    Zero,
    /// Unsigned length prefix of the given bit width
    LengthPrefixed {
        /// Prefix width in bits
        bits: u32,
    },
}

/// Character encoding for string fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    /// UTF-8
    #[default]
    Utf8,
    /// 7-bit ASCII
    Ascii,
    /// ISO-8859-1
    Latin1,
}

/// One arm of a discriminated union.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceArm {
    /// Boolean guard expression source
    pub guard: String,
    /// Target type when the guard holds
    pub ty: FieldType,
}

/// Binding metadata for a single field.
///
/// Expression-valued entries hold EL source text; the factory parses them
/// against the enclosing record's reference context at build time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldOptions {
    /// Width override for numeric fields (Integer expression)
    pub bits: Option<String>,
    /// Byte order for multi-byte reads
    pub endian: Endianness,
    /// Presence guard (Boolean expression)
    pub condition: Option<String>,
    /// Element count or byte length (Integer expression)
    pub length: Option<String>,
    /// Byte extent for lists decoded to a fixed span (Integer expression)
    pub extent: Option<String>,
    /// Absolute bit position override (Integer expression)
    pub offset: Option<String>,
    /// Union arms, tried in order
    pub choices: Vec<ChoiceArm>,
    /// Union fallback when no guard holds
    pub choice_default: Option<FieldType>,
    /// List terminator bytes
    pub terminator: Option<Vec<u8>>,
    /// Whether the terminator bytes decode as a final element
    pub keep_terminator: bool,
    /// String termination policy
    pub termination: Termination,
    /// String character encoding
    pub charset: Charset,
    /// Default for skipped fields (expression)
    pub init: Option<String>,
}

impl FieldOptions {
    /// Create an empty options bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the numeric width expression.
    pub fn bits(mut self, expr: impl Into<String>) -> Self {
        self.bits = Some(expr.into());
        self
    }

    /// Set the byte order.
    pub fn endian(mut self, endian: Endianness) -> Self {
        self.endian = endian;
        self
    }

    /// Set the presence guard.
    pub fn condition(mut self, expr: impl Into<String>) -> Self {
        self.condition = Some(expr.into());
        self
    }

    /// Set the length expression.
    pub fn length(mut self, expr: impl Into<String>) -> Self {
        self.length = Some(expr.into());
        self
    }

    /// Set the byte-extent expression.
    pub fn extent(mut self, expr: impl Into<String>) -> Self {
        self.extent = Some(expr.into());
        self
    }

    /// Set the absolute bit offset expression.
    pub fn offset(mut self, expr: impl Into<String>) -> Self {
        self.offset = Some(expr.into());
        self
    }

    /// Add a union arm.
    pub fn choice(mut self, guard: impl Into<String>, ty: FieldType) -> Self {
        self.choices.push(ChoiceArm {
            guard: guard.into(),
            ty,
        });
        self
    }

    /// Set the union fallback type.
    pub fn choice_default(mut self, ty: FieldType) -> Self {
        self.choice_default = Some(ty);
        self
    }

    /// Set the list terminator.
    pub fn terminator(mut self, bytes: impl Into<Vec<u8>>, keep: bool) -> Self {
        self.terminator = Some(bytes.into());
        self.keep_terminator = keep;
        self
    }

    /// Set the string termination policy.
    pub fn termination(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }

    /// Set the string character encoding.
    pub fn charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Set the default for skipped fields.
    pub fn init(mut self, expr: impl Into<String>) -> Self {
        self.init = Some(expr.into());
        self
    }
}

/// A field in a record declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Field name
    pub name: String,
    /// Declared type
    pub ty: FieldType,
    /// Binding metadata
    pub options: FieldOptions,
}

/// A composite type declaration: an ordered list of fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    /// Record name
    pub name: String,
    /// Ordered fields
    pub fields: Vec<FieldDescriptor>,
}

impl RecordType {
    /// Create an empty record type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// An enum declaration: a fixed-width wire discriminant and named
/// enumerators.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    /// Enum name
    pub name: String,
    /// Discriminant width in bits
    pub bits: u32,
    /// Whether the discriminant is signed
    pub signed: bool,
    /// Enumerator name -> wire value, in declaration order
    pub variants: Vec<(String, i64)>,
    /// Enumerator used for unknown wire values, if any
    pub fallback: Option<String>,
}

impl EnumType {
    /// Look up an enumerator by wire value.
    pub fn variant_for(&self, value: i64) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(name, _)| name.as_str())
    }

    /// Look up the wire value for an enumerator name.
    pub fn value_for(&self, name: &str) -> Option<i64> {
        self.variants
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }
}

/// A set of type declarations codecs are built from.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    records: HashMap<String, RecordType>,
    enums: HashMap<String, EnumType>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a schema fluently.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Register a record type.
    pub fn add_record(&mut self, record: RecordType) {
        self.records.insert(record.name.clone(), record);
    }

    /// Register an enum type.
    pub fn add_enum(&mut self, decl: EnumType) {
        self.enums.insert(decl.name.clone(), decl);
    }

    /// Look up a record type by name.
    pub fn record(&self, name: &str) -> Option<&RecordType> {
        self.records.get(name)
    }

    /// Look up an enum type by name.
    pub fn get_enum(&self, name: &str) -> Option<&EnumType> {
        self.enums.get(name)
    }

    /// Names of all registered records.
    pub fn record_names(&self) -> Vec<&str> {
        self.records.keys().map(|s| s.as_str()).collect()
    }
}

/// Fluent schema builder.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Add a record built with a [`RecordBuilder`].
    pub fn record(mut self, record: RecordType) -> Self {
        self.schema.add_record(record);
        self
    }

    /// Add an enum declaration.
    pub fn with_enum(mut self, decl: EnumType) -> Self {
        self.schema.add_enum(decl);
        self
    }

    /// Finish building.
    pub fn build(self) -> Schema {
        self.schema
    }
}

/// Fluent record builder.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: RecordType,
}

impl RecordBuilder {
    /// Start a record with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            record: RecordType::new(name),
        }
    }

    /// Add a field with default options.
    pub fn field(self, name: impl Into<String>, ty: FieldType) -> Self {
        self.with(name, ty, FieldOptions::default())
    }

    /// Add a field with explicit options.
    pub fn with(mut self, name: impl Into<String>, ty: FieldType, options: FieldOptions) -> Self {
        self.record.fields.push(FieldDescriptor {
            name: name.into(),
            ty,
            options,
        });
        self
    }

    /// Finish building.
    pub fn build(self) -> RecordType {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_fixed_bit_size() {
        assert_eq!(FieldType::uint(3).fixed_bit_size(), Some(3));
        assert_eq!(FieldType::int(16).fixed_bit_size(), Some(16));
        assert_eq!(FieldType::Bool.fixed_bit_size(), Some(1));
        assert_eq!(FieldType::Float64.fixed_bit_size(), Some(64));
        assert_eq!(FieldType::Bytes.fixed_bit_size(), None);
        assert_eq!(FieldType::record("X").fixed_bit_size(), None);
    }

    #[test]
    fn test_field_type_describe() {
        assert_eq!(FieldType::uint(8).describe(), "u8");
        assert_eq!(FieldType::int(5).describe(), "i5");
        assert_eq!(
            FieldType::list(FieldType::uint(16)).describe(),
            "list of u16"
        );
        assert_eq!(FieldType::Enum("Color".to_string()).describe(), "enum Color");
    }

    #[test]
    fn test_record_builder() {
        let record = RecordBuilder::new("Packet")
            .field("n", FieldType::uint(8))
            .with(
                "payload",
                FieldType::Bytes,
                FieldOptions::new().length("n"),
            )
            .build();

        assert_eq!(record.name, "Packet");
        assert_eq!(record.fields.len(), 2);
        assert_eq!(record.fields[0].name, "n");
        assert_eq!(
            record.field("payload").unwrap().options.length.as_deref(),
            Some("n")
        );
        assert!(record.field("missing").is_none());
    }

    #[test]
    fn test_schema_lookup() {
        let schema = Schema::builder()
            .record(RecordBuilder::new("A").field("x", FieldType::uint(8)).build())
            .with_enum(EnumType {
                name: "Color".to_string(),
                bits: 8,
                signed: false,
                variants: vec![("RED".to_string(), 0), ("GREEN".to_string(), 1)],
                fallback: None,
            })
            .build();

        assert!(schema.record("A").is_some());
        assert!(schema.record("B").is_none());
        assert_eq!(schema.get_enum("Color").unwrap().variants.len(), 2);
    }

    #[test]
    fn test_enum_lookups() {
        let decl = EnumType {
            name: "Color".to_string(),
            bits: 8,
            signed: false,
            variants: vec![("RED".to_string(), 0), ("GREEN".to_string(), 1)],
            fallback: Some("RED".to_string()),
        };
        assert_eq!(decl.variant_for(1), Some("GREEN"));
        assert_eq!(decl.variant_for(9), None);
        assert_eq!(decl.value_for("RED"), Some(0));
        assert_eq!(decl.value_for("BLUE"), None);
    }

    #[test]
    fn test_field_options_fluent() {
        let options = FieldOptions::new()
            .bits("width")
            .endian(Endianness::Little)
            .condition("flag == 1")
            .offset("32")
            .init("0")
            .charset(Charset::Ascii)
            .termination(Termination::Zero);

        assert_eq!(options.bits.as_deref(), Some("width"));
        assert_eq!(options.endian, Endianness::Little);
        assert_eq!(options.condition.as_deref(), Some("flag == 1"));
        assert_eq!(options.offset.as_deref(), Some("32"));
        assert_eq!(options.init.as_deref(), Some("0"));
        assert_eq!(options.charset, Charset::Ascii);
        assert_eq!(options.termination, Termination::Zero);
    }

    #[test]
    fn test_choice_options() {
        let options = FieldOptions::new()
            .choice("tag == 'A'", FieldType::record("Ta"))
            .choice("tag == 'B'", FieldType::record("Tb"))
            .choice_default(FieldType::record("Tz"));

        assert_eq!(options.choices.len(), 2);
        assert_eq!(options.choices[0].guard, "tag == 'A'");
        assert_eq!(options.choice_default, Some(FieldType::record("Tz")));
    }
}
