// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Discriminated-union codec.

use std::sync::Arc;

use crate::buffer::{BitBuffer, BitChannel};
use crate::core::{PreonError, Result, Value};
use crate::el::{Expr, Resolver};
use crate::schema::FieldType;

use super::{Builder, Codec};

/// Codec that dispatches to the first arm whose guard holds.
///
/// Guards typically inspect a discriminator field already decoded in the
/// enclosing object; they are evaluated against the live resolver, in
/// declaration order.
#[derive(Debug)]
pub struct ChoiceCodec {
    arms: Vec<(Expr, Arc<dyn Codec>)>,
    fallback: Option<Arc<dyn Codec>>,
    /// Path of the first guard reference, reported when no arm matches
    discriminator: String,
    ty: FieldType,
}

impl ChoiceCodec {
    /// Create a choice codec over guarded arms.
    pub fn new(
        arms: Vec<(Expr, Arc<dyn Codec>)>,
        fallback: Option<Arc<dyn Codec>>,
    ) -> Result<Self> {
        if arms.is_empty() && fallback.is_none() {
            return Err(PreonError::binding("choice", "no arms and no default"));
        }
        let discriminator = arms
            .iter()
            .flat_map(|(guard, _)| guard.references())
            .next()
            .map(|r| r.path())
            .unwrap_or_default();
        Ok(Self {
            arms,
            fallback,
            discriminator,
            ty: FieldType::Union,
        })
    }

    fn select(&self, resolver: &Resolver<'_>) -> Result<Option<&Arc<dyn Codec>>> {
        for (guard, codec) in &self.arms {
            if guard.eval_bool(resolver)? {
                return Ok(Some(codec));
            }
        }
        Ok(self.fallback.as_ref())
    }
}

impl Codec for ChoiceCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        resolver: &Resolver<'_>,
        builder: &dyn Builder,
    ) -> Result<Value> {
        match self.select(resolver)? {
            Some(codec) => codec.decode(buffer, resolver, builder),
            None => Err(PreonError::decoding(
                &self.discriminator,
                buffer.position(),
                "no matching choice and no default",
            )),
        }
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        resolver: &Resolver<'_>,
    ) -> Result<()> {
        match self.select(resolver)? {
            Some(codec) => codec.encode(value, channel, resolver),
            None => Err(PreonError::encoding(
                &self.discriminator,
                "no matching choice and no default",
            )),
        }
    }

    /// The arms' shared size when every arm agrees on a constant;
    /// `None` otherwise.
    fn size(&self) -> Option<Expr> {
        let mut sizes = self
            .arms
            .iter()
            .map(|(_, codec)| codec.size())
            .chain(self.fallback.iter().map(|codec| codec.size()));
        let first = sizes.next()??.fold();
        if !first.is_parameterless() {
            return None;
        }
        for size in sizes {
            if size?.fold() != first {
                return None;
            }
        }
        Some(first)
    }

    fn field_type(&self) -> &FieldType {
        &self.ty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Endianness;
    use crate::codec::{DefaultBuilder, NumericCodec};
    use crate::el::{parse, ReferenceContext};
    use crate::schema::{FieldType, RecordBuilder, Schema};

    fn tag_schema() -> Schema {
        Schema::builder()
            .record(
                RecordBuilder::new("Frame")
                    .field("tag", FieldType::uint(8))
                    .field("body", FieldType::Union)
                    .build(),
            )
            .build()
    }

    fn numeric(bits: u32) -> Arc<dyn Codec> {
        Arc::new(
            NumericCodec::new(
                Expr::Int(bits as i64),
                false,
                Endianness::Big,
                FieldType::uint(bits),
            )
            .unwrap(),
        )
    }

    fn choice_codec(schema: &Schema, with_default: bool) -> ChoiceCodec {
        let frame = schema.record("Frame").unwrap();
        let ctx = ReferenceContext::record(schema, frame);
        ChoiceCodec::new(
            vec![
                (parse("tag == 'A'", &ctx).unwrap(), numeric(8)),
                (parse("tag == 'B'", &ctx).unwrap(), numeric(16)),
            ],
            if with_default { Some(numeric(8)) } else { None },
        )
        .unwrap()
    }

    fn decode_with_tag(codec: &ChoiceCodec, tag: u64, bytes: &[u8]) -> Result<Value> {
        let mut resolver = Resolver::root();
        resolver.bind("tag", Value::UInt(tag));
        let mut buffer = BitBuffer::new(bytes);
        codec.decode(&mut buffer, &resolver, &DefaultBuilder)
    }

    #[test]
    fn test_dispatch_first_matching_arm() {
        let schema = tag_schema();
        let codec = choice_codec(&schema, false);
        assert_eq!(
            decode_with_tag(&codec, 'A' as u64, &[0x2A]).unwrap(),
            Value::UInt(42)
        );
        assert_eq!(
            decode_with_tag(&codec, 'B' as u64, &[0x01, 0x00]).unwrap(),
            Value::UInt(256)
        );
    }

    #[test]
    fn test_no_match_without_default_reports_discriminator() {
        let schema = tag_schema();
        let codec = choice_codec(&schema, false);
        let err = decode_with_tag(&codec, 'Z' as u64, &[0x00]).unwrap_err();
        match err {
            PreonError::Decoding { field_path, .. } => assert_eq!(field_path, "tag"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_no_match_with_default() {
        let schema = tag_schema();
        let codec = choice_codec(&schema, true);
        assert_eq!(
            decode_with_tag(&codec, 'Z' as u64, &[0x07]).unwrap(),
            Value::UInt(7)
        );
    }

    #[test]
    fn test_encode_dispatches_on_guard() {
        let schema = tag_schema();
        let codec = choice_codec(&schema, false);

        let mut resolver = Resolver::root();
        resolver.bind("tag", Value::UInt('B' as u64));
        let mut channel = BitChannel::new();
        codec
            .encode(&Value::UInt(300), &mut channel, &resolver)
            .unwrap();
        assert_eq!(channel.into_bytes(), vec![0x01, 0x2C]);
    }

    #[test]
    fn test_size_agreeing_arms() {
        let schema = tag_schema();
        let frame = schema.record("Frame").unwrap();
        let ctx = ReferenceContext::record(&schema, frame);
        let codec = ChoiceCodec::new(
            vec![
                (parse("tag == 1", &ctx).unwrap(), numeric(8)),
                (parse("tag == 2", &ctx).unwrap(), numeric(8)),
            ],
            None,
        )
        .unwrap();
        assert_eq!(codec.size(), Some(Expr::Int(8)));
    }

    #[test]
    fn test_size_disagreeing_arms() {
        let schema = tag_schema();
        let codec = choice_codec(&schema, false);
        assert_eq!(codec.size(), None);
    }

    #[test]
    fn test_empty_choice_rejected() {
        let err = ChoiceCodec::new(vec![], None).unwrap_err();
        assert!(matches!(err, PreonError::Binding { .. }));
    }
}
