// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Leaf codecs: integers, booleans, floats, byte arrays, enums, strings.

use crate::buffer::{BitBuffer, BitChannel, Endianness};
use crate::core::{PreonError, Result, Value};
use crate::el::{Expr, Resolver};
use crate::schema::{Charset, EnumType, FieldType, Termination};

use super::{eval_count, Builder, Codec};

/// Fixed- or expression-width integer codec.
#[derive(Debug)]
pub struct NumericCodec {
    width: Expr,
    signed: bool,
    endian: Endianness,
    ty: FieldType,
}

impl NumericCodec {
    /// Create an integer codec. A constant width must be in 1..=64.
    pub fn new(width: Expr, signed: bool, endian: Endianness, ty: FieldType) -> Result<Self> {
        if let Expr::Int(bits) = width {
            if !(1..=64).contains(&bits) {
                return Err(PreonError::binding(
                    ty.describe(),
                    format!("bit width {bits} outside 1..=64"),
                ));
            }
        }
        Ok(Self {
            width,
            signed,
            endian,
            ty,
        })
    }

    fn width_at(&self, resolver: &Resolver<'_>) -> Result<u32> {
        let bits = self.width.eval_int(resolver)?;
        if !(1..=64).contains(&bits) {
            return Err(PreonError::decoding(
                self.width.describe(),
                0,
                format!("bit width {bits} outside 1..=64"),
            ));
        }
        Ok(bits as u32)
    }
}

impl Codec for NumericCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        resolver: &Resolver<'_>,
        _builder: &dyn Builder,
    ) -> Result<Value> {
        let bits = self.width_at(resolver)?;
        if self.signed {
            Ok(Value::Int(buffer.read_signed(bits, self.endian)?))
        } else {
            Ok(Value::UInt(buffer.read_unsigned(bits, self.endian)?))
        }
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        resolver: &Resolver<'_>,
    ) -> Result<()> {
        let bits = self.width_at(resolver)?;
        if self.signed {
            let v = value.as_i64().ok_or_else(|| {
                PreonError::encoding("", format!("expected integer, got {}", value.type_name()))
            })?;
            let min = if bits == 64 { i64::MIN } else { -(1i64 << (bits - 1)) };
            let max = if bits == 64 {
                i64::MAX
            } else {
                (1i64 << (bits - 1)) - 1
            };
            if v < min || v > max {
                return Err(PreonError::encoding(
                    "",
                    format!("value {v} out of range for {bits} signed bits"),
                ));
            }
            channel.write_signed(v, bits, self.endian)
        } else {
            let v = value.as_u64().ok_or_else(|| {
                PreonError::encoding("", format!("expected integer, got {}", value.type_name()))
            })?;
            if bits < 64 && v >= (1u64 << bits) {
                return Err(PreonError::encoding(
                    "",
                    format!("value {v} out of range for {bits} bits"),
                ));
            }
            channel.write_unsigned(v, bits, self.endian)
        }
    }

    fn size(&self) -> Option<Expr> {
        Some(self.width.clone())
    }

    fn field_type(&self) -> &FieldType {
        &self.ty
    }
}

/// Single-bit boolean codec.
#[derive(Debug)]
pub struct BooleanCodec {
    ty: FieldType,
}

impl BooleanCodec {
    pub fn new() -> Self {
        Self { ty: FieldType::Bool }
    }
}

impl Default for BooleanCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for BooleanCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        _resolver: &Resolver<'_>,
        _builder: &dyn Builder,
    ) -> Result<Value> {
        Ok(Value::Bool(buffer.read_bool()?))
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        _resolver: &Resolver<'_>,
    ) -> Result<()> {
        let v = value.as_bool().ok_or_else(|| {
            PreonError::encoding("", format!("expected bool, got {}", value.type_name()))
        })?;
        channel.write_bool(v)
    }

    fn size(&self) -> Option<Expr> {
        Some(Expr::Int(1))
    }

    fn field_type(&self) -> &FieldType {
        &self.ty
    }
}

/// IEEE-754 float codec.
#[derive(Debug)]
pub struct FloatCodec {
    double: bool,
    endian: Endianness,
    ty: FieldType,
}

impl FloatCodec {
    pub fn new(double: bool, endian: Endianness) -> Self {
        Self {
            double,
            endian,
            ty: if double {
                FieldType::Float64
            } else {
                FieldType::Float32
            },
        }
    }
}

impl Codec for FloatCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        _resolver: &Resolver<'_>,
        _builder: &dyn Builder,
    ) -> Result<Value> {
        if self.double {
            Ok(Value::Float64(buffer.read_f64(self.endian)?))
        } else {
            Ok(Value::Float32(buffer.read_f32(self.endian)?))
        }
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        _resolver: &Resolver<'_>,
    ) -> Result<()> {
        match (self.double, value) {
            (true, Value::Float64(v)) => channel.write_f64(*v, self.endian),
            (false, Value::Float32(v)) => channel.write_f32(*v, self.endian),
            _ => Err(PreonError::encoding(
                "",
                format!(
                    "expected {}, got {}",
                    self.ty.describe(),
                    value.type_name()
                ),
            )),
        }
    }

    fn size(&self) -> Option<Expr> {
        Some(Expr::Int(if self.double { 64 } else { 32 }))
    }

    fn field_type(&self) -> &FieldType {
        &self.ty
    }
}

/// Byte array codec with an expression-driven byte length.
#[derive(Debug)]
pub struct ByteArrayCodec {
    length: Expr,
    ty: FieldType,
}

impl ByteArrayCodec {
    pub fn new(length: Expr) -> Self {
        Self {
            length,
            ty: FieldType::Bytes,
        }
    }
}

impl Codec for ByteArrayCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        resolver: &Resolver<'_>,
        _builder: &dyn Builder,
    ) -> Result<Value> {
        let count = eval_count(&self.length, resolver, "byte length")?;
        Ok(Value::Bytes(buffer.read_bytes(count as usize)?))
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        resolver: &Resolver<'_>,
    ) -> Result<()> {
        let bytes = value.as_bytes().ok_or_else(|| {
            PreonError::encoding("", format!("expected bytes, got {}", value.type_name()))
        })?;
        let expected = self.length.eval_int(resolver)?;
        if expected != bytes.len() as i64 {
            return Err(PreonError::encoding(
                "",
                format!(
                    "length expression {} evaluates to {expected}, but value holds {} bytes",
                    self.length.describe(),
                    bytes.len()
                ),
            ));
        }
        channel.write_bytes(bytes)
    }

    fn size(&self) -> Option<Expr> {
        Expr::binary(crate::el::BinaryOp::Mul, self.length.clone(), Expr::Int(8)).ok()
    }

    fn field_type(&self) -> &FieldType {
        &self.ty
    }
}

/// Enum codec: a fixed-width integer mapped to enumerator names.
#[derive(Debug)]
pub struct EnumCodec {
    decl: EnumType,
    endian: Endianness,
    ty: FieldType,
}

impl EnumCodec {
    pub fn new(decl: EnumType, endian: Endianness) -> Result<Self> {
        if !(1..=64).contains(&decl.bits) {
            return Err(PreonError::binding(
                &decl.name,
                format!("enum width {} outside 1..=64", decl.bits),
            ));
        }
        let ty = FieldType::Enum(decl.name.clone());
        Ok(Self { decl, endian, ty })
    }
}

impl Codec for EnumCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        _resolver: &Resolver<'_>,
        _builder: &dyn Builder,
    ) -> Result<Value> {
        let position = buffer.position();
        let raw = if self.decl.signed {
            buffer.read_signed(self.decl.bits, self.endian)?
        } else {
            buffer.read_unsigned(self.decl.bits, self.endian)? as i64
        };
        match self.decl.variant_for(raw).or(self.decl.fallback.as_deref()) {
            Some(name) => Ok(Value::Enum(name.to_string())),
            None => Err(PreonError::decoding(
                "",
                position,
                format!("value {raw} is not a {} enumerator", self.decl.name),
            )),
        }
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        _resolver: &Resolver<'_>,
    ) -> Result<()> {
        let name = value.as_str().ok_or_else(|| {
            PreonError::encoding("", format!("expected enumerator, got {}", value.type_name()))
        })?;
        let raw = self.decl.value_for(name).ok_or_else(|| {
            PreonError::encoding(
                "",
                format!("'{name}' is not a {} enumerator", self.decl.name),
            )
        })?;
        channel.write_signed(raw, self.decl.bits, self.endian)
    }

    fn size(&self) -> Option<Expr> {
        Some(Expr::Int(self.decl.bits as i64))
    }

    fn field_type(&self) -> &FieldType {
        &self.ty
    }
}

/// String codec: fixed-extent, zero-terminated, or length-prefixed.
#[derive(Debug)]
pub struct StringCodec {
    length: Option<Expr>,
    termination: Termination,
    charset: Charset,
    endian: Endianness,
    ty: FieldType,
}

impl StringCodec {
    pub fn new(
        length: Option<Expr>,
        termination: Termination,
        charset: Charset,
        endian: Endianness,
    ) -> Result<Self> {
        if termination == Termination::None && length.is_none() {
            return Err(PreonError::binding(
                "string",
                "fixed-extent string requires a length expression",
            ));
        }
        if let Termination::LengthPrefixed { bits } = termination {
            if !(1..=64).contains(&bits) {
                return Err(PreonError::binding(
                    "string",
                    format!("length prefix width {bits} outside 1..=64"),
                ));
            }
        }
        Ok(Self {
            length,
            termination,
            charset,
            endian,
            ty: FieldType::String,
        })
    }

    fn decode_bytes(&self, bytes: Vec<u8>, position: u64) -> Result<Value> {
        let text = match self.charset {
            Charset::Utf8 => String::from_utf8(bytes).map_err(|e| {
                PreonError::decoding("", position, format!("invalid UTF-8: {e}"))
            })?,
            Charset::Ascii => {
                if let Some(b) = bytes.iter().find(|b| **b >= 0x80) {
                    return Err(PreonError::decoding(
                        "",
                        position,
                        format!("byte 0x{b:02X} is not ASCII"),
                    ));
                }
                bytes.iter().map(|&b| b as char).collect()
            }
            Charset::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        };
        Ok(Value::String(text))
    }

    fn encode_bytes(&self, text: &str) -> Result<Vec<u8>> {
        match self.charset {
            Charset::Utf8 => Ok(text.as_bytes().to_vec()),
            Charset::Ascii => text
                .chars()
                .map(|c| {
                    if c.is_ascii() {
                        Ok(c as u8)
                    } else {
                        Err(PreonError::encoding(
                            "",
                            format!("character '{c}' is not ASCII"),
                        ))
                    }
                })
                .collect(),
            Charset::Latin1 => text
                .chars()
                .map(|c| {
                    u8::try_from(c as u32).map_err(|_| {
                        PreonError::encoding(
                            "",
                            format!("character '{c}' is not Latin-1"),
                        )
                    })
                })
                .collect(),
        }
    }
}

impl Codec for StringCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        resolver: &Resolver<'_>,
        _builder: &dyn Builder,
    ) -> Result<Value> {
        let position = buffer.position();
        let bytes = match self.termination {
            Termination::None => {
                let length = self.length.as_ref().ok_or_else(|| {
                    PreonError::decoding("", position, "string has no length")
                })?;
                let count = eval_count(length, resolver, "string length")?;
                buffer.read_bytes(count as usize)?
            }
            Termination::Zero => {
                let mut out = Vec::new();
                loop {
                    let b = buffer.read_unsigned(8, Endianness::Big)? as u8;
                    if b == 0 {
                        break;
                    }
                    out.push(b);
                }
                out
            }
            Termination::LengthPrefixed { bits } => {
                let count = buffer.read_unsigned(bits, self.endian)?;
                buffer.read_bytes(count as usize)?
            }
        };
        self.decode_bytes(bytes, position)
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        resolver: &Resolver<'_>,
    ) -> Result<()> {
        let text = match value {
            Value::String(s) => s.as_str(),
            other => {
                return Err(PreonError::encoding(
                    "",
                    format!("expected string, got {}", other.type_name()),
                ))
            }
        };
        let bytes = self.encode_bytes(text)?;
        match self.termination {
            Termination::None => {
                if let Some(length) = &self.length {
                    let expected = length.eval_int(resolver)?;
                    if expected != bytes.len() as i64 {
                        return Err(PreonError::encoding(
                            "",
                            format!(
                                "length expression {} evaluates to {expected}, but string encodes to {} bytes",
                                length.describe(),
                                bytes.len()
                            ),
                        ));
                    }
                }
                channel.write_bytes(&bytes)
            }
            Termination::Zero => {
                if bytes.contains(&0) {
                    return Err(PreonError::encoding(
                        "",
                        "zero-terminated string contains an interior zero byte",
                    ));
                }
                channel.write_bytes(&bytes)?;
                channel.write_unsigned(0, 8, Endianness::Big)
            }
            Termination::LengthPrefixed { bits } => {
                let len = bytes.len() as u64;
                if bits < 64 && len >= (1u64 << bits) {
                    return Err(PreonError::encoding(
                        "",
                        format!("string of {len} bytes overflows {bits}-bit length prefix"),
                    ));
                }
                channel.write_unsigned(len, bits, self.endian)?;
                channel.write_bytes(&bytes)
            }
        }
    }

    fn size(&self) -> Option<Expr> {
        match self.termination {
            Termination::None => {
                let length = self.length.clone()?;
                Expr::binary(crate::el::BinaryOp::Mul, length, Expr::Int(8)).ok()
            }
            _ => None,
        }
    }

    fn field_type(&self) -> &FieldType {
        &self.ty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DefaultBuilder;
    use crate::core::Value;

    fn decode_one(codec: &dyn Codec, bytes: &[u8]) -> Result<Value> {
        let mut buffer = BitBuffer::new(bytes);
        let resolver = Resolver::root();
        codec.decode(&mut buffer, &resolver, &DefaultBuilder)
    }

    fn encode_one(codec: &dyn Codec, value: &Value) -> Result<Vec<u8>> {
        let mut channel = BitChannel::new();
        let resolver = Resolver::root();
        codec.encode(value, &mut channel, &resolver)?;
        Ok(channel.into_bytes())
    }

    #[test]
    fn test_numeric_unsigned_round_trip() {
        let codec = NumericCodec::new(
            Expr::Int(16),
            false,
            Endianness::Big,
            FieldType::uint(16),
        )
        .unwrap();
        let value = decode_one(&codec, &[0x12, 0x34]).unwrap();
        assert_eq!(value, Value::UInt(0x1234));
        assert_eq!(encode_one(&codec, &value).unwrap(), vec![0x12, 0x34]);
    }

    #[test]
    fn test_numeric_signed_sub_byte() {
        let codec =
            NumericCodec::new(Expr::Int(4), true, Endianness::Big, FieldType::int(4)).unwrap();
        let value = decode_one(&codec, &[0xF0]).unwrap();
        assert_eq!(value, Value::Int(-1));
        assert_eq!(encode_one(&codec, &value).unwrap(), vec![0xF0]);
    }

    #[test]
    fn test_numeric_invalid_width_rejected_at_build() {
        let err = NumericCodec::new(Expr::Int(0), false, Endianness::Big, FieldType::uint(8))
            .unwrap_err();
        assert!(matches!(err, PreonError::Binding { .. }));
        assert!(
            NumericCodec::new(Expr::Int(65), false, Endianness::Big, FieldType::uint(8)).is_err()
        );
    }

    #[test]
    fn test_numeric_encode_out_of_range() {
        let codec =
            NumericCodec::new(Expr::Int(8), false, Endianness::Big, FieldType::uint(8)).unwrap();
        let err = encode_one(&codec, &Value::UInt(256)).unwrap_err();
        assert!(matches!(err, PreonError::Encoding { .. }));

        let signed =
            NumericCodec::new(Expr::Int(4), true, Endianness::Big, FieldType::int(4)).unwrap();
        assert!(encode_one(&signed, &Value::Int(8)).is_err());
        assert!(encode_one(&signed, &Value::Int(-8)).is_ok());
    }

    #[test]
    fn test_numeric_size_is_width() {
        let codec =
            NumericCodec::new(Expr::Int(12), false, Endianness::Big, FieldType::uint(12))
                .unwrap();
        assert_eq!(codec.size(), Some(Expr::Int(12)));
    }

    #[test]
    fn test_boolean_round_trip() {
        let codec = BooleanCodec::new();
        assert_eq!(decode_one(&codec, &[0x80]).unwrap(), Value::Bool(true));
        assert_eq!(decode_one(&codec, &[0x00]).unwrap(), Value::Bool(false));
        assert_eq!(encode_one(&codec, &Value::Bool(true)).unwrap(), vec![0x80]);
        assert_eq!(codec.size(), Some(Expr::Int(1)));
    }

    #[test]
    fn test_float_round_trip() {
        let codec = FloatCodec::new(false, Endianness::Little);
        let bytes = 3.25f32.to_bits().to_le_bytes();
        let value = decode_one(&codec, &bytes).unwrap();
        assert_eq!(value, Value::Float32(3.25));
        assert_eq!(encode_one(&codec, &value).unwrap(), bytes.to_vec());

        let double = FloatCodec::new(true, Endianness::Big);
        assert_eq!(double.size(), Some(Expr::Int(64)));
    }

    #[test]
    fn test_float_type_mismatch() {
        let codec = FloatCodec::new(true, Endianness::Big);
        assert!(encode_one(&codec, &Value::Float32(1.0)).is_err());
    }

    #[test]
    fn test_byte_array_constant_length() {
        let codec = ByteArrayCodec::new(Expr::Int(3));
        let value = decode_one(&codec, &[0x41, 0x42, 0x43, 0xFF]).unwrap();
        assert_eq!(value, Value::Bytes(vec![0x41, 0x42, 0x43]));
        assert_eq!(
            encode_one(&codec, &value).unwrap(),
            vec![0x41, 0x42, 0x43]
        );
    }

    #[test]
    fn test_byte_array_length_mismatch_on_encode() {
        let codec = ByteArrayCodec::new(Expr::Int(2));
        let err = encode_one(&codec, &Value::Bytes(vec![1, 2, 3])).unwrap_err();
        assert!(matches!(err, PreonError::Encoding { .. }));
    }

    #[test]
    fn test_byte_array_size_in_bits() {
        let codec = ByteArrayCodec::new(Expr::Int(3));
        assert_eq!(codec.size().map(Expr::fold), Some(Expr::Int(24)));
    }

    fn color_enum() -> EnumType {
        EnumType {
            name: "Color".to_string(),
            bits: 8,
            signed: false,
            variants: vec![
                ("RED".to_string(), 0),
                ("GREEN".to_string(), 1),
                ("BLUE".to_string(), 2),
            ],
            fallback: None,
        }
    }

    #[test]
    fn test_enum_round_trip() {
        let codec = EnumCodec::new(color_enum(), Endianness::Big).unwrap();
        let value = decode_one(&codec, &[0x01]).unwrap();
        assert_eq!(value, Value::Enum("GREEN".to_string()));
        assert_eq!(encode_one(&codec, &value).unwrap(), vec![0x01]);
    }

    #[test]
    fn test_enum_unknown_value() {
        let codec = EnumCodec::new(color_enum(), Endianness::Big).unwrap();
        let err = decode_one(&codec, &[0x09]).unwrap_err();
        assert!(matches!(err, PreonError::Decoding { .. }));
    }

    #[test]
    fn test_enum_fallback() {
        let mut decl = color_enum();
        decl.fallback = Some("RED".to_string());
        let codec = EnumCodec::new(decl, Endianness::Big).unwrap();
        assert_eq!(
            decode_one(&codec, &[0x09]).unwrap(),
            Value::Enum("RED".to_string())
        );
    }

    #[test]
    fn test_enum_unknown_name_on_encode() {
        let codec = EnumCodec::new(color_enum(), Endianness::Big).unwrap();
        let err = encode_one(&codec, &Value::Enum("MAUVE".to_string())).unwrap_err();
        assert!(matches!(err, PreonError::Encoding { .. }));
    }

    #[test]
    fn test_string_fixed_extent() {
        let codec = StringCodec::new(
            Some(Expr::Int(3)),
            Termination::None,
            Charset::Utf8,
            Endianness::Big,
        )
        .unwrap();
        let value = decode_one(&codec, b"abcdef").unwrap();
        assert_eq!(value, Value::String("abc".to_string()));
        assert_eq!(encode_one(&codec, &value).unwrap(), b"abc".to_vec());
    }

    #[test]
    fn test_string_zero_terminated() {
        let codec = StringCodec::new(
            None,
            Termination::Zero,
            Charset::Utf8,
            Endianness::Big,
        )
        .unwrap();
        let value = decode_one(&codec, b"hi\0rest").unwrap();
        assert_eq!(value, Value::String("hi".to_string()));
        assert_eq!(encode_one(&codec, &value).unwrap(), b"hi\0".to_vec());
    }

    #[test]
    fn test_string_zero_terminated_missing_terminator() {
        let codec = StringCodec::new(
            None,
            Termination::Zero,
            Charset::Utf8,
            Endianness::Big,
        )
        .unwrap();
        assert!(decode_one(&codec, b"hi").is_err());
    }

    #[test]
    fn test_string_length_prefixed() {
        let codec = StringCodec::new(
            None,
            Termination::LengthPrefixed { bits: 8 },
            Charset::Utf8,
            Endianness::Big,
        )
        .unwrap();
        let value = decode_one(&codec, b"\x05helloxx").unwrap();
        assert_eq!(value, Value::String("hello".to_string()));
        assert_eq!(encode_one(&codec, &value).unwrap(), b"\x05hello".to_vec());
    }

    #[test]
    fn test_string_latin1() {
        let codec = StringCodec::new(
            Some(Expr::Int(1)),
            Termination::None,
            Charset::Latin1,
            Endianness::Big,
        )
        .unwrap();
        let value = decode_one(&codec, &[0xE9]).unwrap();
        assert_eq!(value, Value::String("é".to_string()));
        assert_eq!(encode_one(&codec, &value).unwrap(), vec![0xE9]);
    }

    #[test]
    fn test_string_ascii_rejects_high_bytes() {
        let codec = StringCodec::new(
            Some(Expr::Int(1)),
            Termination::None,
            Charset::Ascii,
            Endianness::Big,
        )
        .unwrap();
        assert!(decode_one(&codec, &[0xE9]).is_err());
        assert!(encode_one(&codec, &Value::String("é".to_string())).is_err());
    }

    #[test]
    fn test_string_requires_length_or_termination() {
        let err = StringCodec::new(None, Termination::None, Charset::Utf8, Endianness::Big)
            .unwrap_err();
        assert!(matches!(err, PreonError::Binding { .. }));
    }

    #[test]
    fn test_string_size() {
        let fixed = StringCodec::new(
            Some(Expr::Int(3)),
            Termination::None,
            Charset::Utf8,
            Endianness::Big,
        )
        .unwrap();
        assert_eq!(fixed.size().map(Expr::fold), Some(Expr::Int(24)));

        let terminated = StringCodec::new(
            None,
            Termination::Zero,
            Charset::Utf8,
            Endianness::Big,
        )
        .unwrap();
        assert_eq!(terminated.size(), None);
    }
}
