// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Codec contract and implementations.
//!
//! A [`Codec`] translates between a [`Value`] and a bit-level wire
//! representation. Codecs are immutable after construction and may be
//! shared across threads; buffers, channels, and resolvers are
//! per-operation.

pub mod choice;
pub mod list;
pub mod object;
pub mod primitive;
pub mod slice;

pub use choice::ChoiceCodec;
pub use list::{ListCodec, ListDiscipline};
pub use object::{Binding, ObjectCodec};
pub use primitive::{
    BooleanCodec, ByteArrayCodec, EnumCodec, FloatCodec, NumericCodec, StringCodec,
};
pub use slice::SliceCodec;

use crate::buffer::{BitBuffer, BitChannel};
use crate::core::{DecodedRecord, PreonError, Result, Value};
use crate::el::{Eval, Expr, Resolver};
use crate::schema::{FieldType, RecordType};

/// Bidirectional translator for one declared type.
pub trait Codec: Send + Sync + std::fmt::Debug {
    /// Decode a value from the buffer, consulting already-decoded fields
    /// through the resolver.
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        resolver: &Resolver<'_>,
        builder: &dyn Builder,
    ) -> Result<Value>;

    /// Encode a value to the channel.
    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        resolver: &Resolver<'_>,
    ) -> Result<()>;

    /// Size of the encoded form in bits, as an integer expression that
    /// may reference sibling fields. `None` when the size cannot be
    /// expressed (terminated lists, unions of unequal arms).
    fn size(&self) -> Option<Expr>;

    /// The declared type this codec translates.
    fn field_type(&self) -> &FieldType;
}

/// Produces a blank value for a record declaration.
///
/// The default constructor fills every field with its type default
/// (zero, empty, false); declared `init` defaults are applied by the
/// binding that skips the field.
pub trait Constructor: Send + Sync {
    /// Produce a blank instance of `record`.
    fn construct(&self, record: &RecordType) -> Result<Value>;
}

/// Default constructor: type defaults for every field.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConstructor;

impl Constructor for DefaultConstructor {
    fn construct(&self, record: &RecordType) -> Result<Value> {
        let mut fields = DecodedRecord::new();
        for field in &record.fields {
            fields.insert(field.name.clone(), default_value(&field.ty));
        }
        Ok(Value::Struct(fields))
    }
}

/// Produces the instance an object codec populates during decode.
///
/// The default builder defers to a [`Constructor`]; a custom builder can
/// inspect the resolver to pick a representation.
pub trait Builder: Send + Sync {
    /// Produce an instance of `record` for the object codec to fill.
    fn build(&self, record: &RecordType, resolver: &Resolver<'_>) -> Result<Value>;
}

/// Default builder backed by [`DefaultConstructor`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBuilder;

impl Builder for DefaultBuilder {
    fn build(&self, record: &RecordType, _resolver: &Resolver<'_>) -> Result<Value> {
        DefaultConstructor.construct(record)
    }
}

/// The type default a skipped field is left at when it declares no
/// `init` expression.
pub fn default_value(ty: &FieldType) -> Value {
    match ty {
        FieldType::UInt { .. } => Value::UInt(0),
        FieldType::Int { .. } => Value::Int(0),
        FieldType::Bool => Value::Bool(false),
        FieldType::Float32 => Value::Float32(0.0),
        FieldType::Float64 => Value::Float64(0.0),
        FieldType::Bytes => Value::Bytes(Vec::new()),
        FieldType::String => Value::String(String::new()),
        FieldType::List(_) => Value::List(Vec::new()),
        FieldType::Enum(_) | FieldType::Record(_) | FieldType::Union => Value::Null,
    }
}

/// Convert an evaluated expression into the value space of a field type.
pub(crate) fn value_from_eval(eval: Eval, ty: &FieldType) -> Value {
    match (eval, ty) {
        (Eval::Int(v), FieldType::UInt { .. }) => Value::UInt(v as u64),
        (Eval::Int(v), _) => Value::Int(v),
        (Eval::Bool(v), _) => Value::Bool(v),
        (Eval::Str(v), FieldType::Enum(_)) => Value::Enum(v),
        (Eval::Str(v), _) => Value::String(v),
    }
}

/// Decode a value from raw bytes with the default builder.
pub fn decode(codec: &dyn Codec, bytes: &[u8]) -> Result<Value> {
    decode_with(codec, bytes, &DefaultBuilder)
}

/// Decode a value from raw bytes with an explicit builder.
pub fn decode_with(codec: &dyn Codec, bytes: &[u8], builder: &dyn Builder) -> Result<Value> {
    let mut buffer = BitBuffer::new(bytes);
    let resolver = Resolver::root();
    codec.decode(&mut buffer, &resolver, builder)
}

/// Encode a value to bytes, zero-padding any trailing partial byte.
pub fn encode(codec: &dyn Codec, value: &Value) -> Result<Vec<u8>> {
    let mut channel = BitChannel::new();
    let resolver = Resolver::root();
    codec.encode(value, &mut channel, &resolver)?;
    Ok(channel.into_bytes())
}

/// Evaluate a length-style expression to a non-negative count.
pub(crate) fn eval_count(expr: &Expr, resolver: &Resolver<'_>, what: &str) -> Result<u64> {
    let n = expr.eval_int(resolver)?;
    u64::try_from(n).map_err(|_| {
        PreonError::decoding(expr.describe(), 0, format!("negative {what}: {n}"))
    })
}
