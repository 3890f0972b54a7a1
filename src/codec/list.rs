// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Sequence codec with three length disciplines.

use std::sync::Arc;

use crate::buffer::{BitBuffer, BitChannel};
use crate::core::{PreonError, Result, Value};
use crate::el::{BinaryOp, Expr, Resolver};
use crate::schema::FieldType;

use super::{eval_count, Builder, Codec};

/// How a list knows where it ends.
#[derive(Debug, Clone)]
pub enum ListDiscipline {
    /// A fixed number of elements
    Count(Expr),
    /// A fixed span of bytes, filled with elements
    ByteExtent(Expr),
    /// Elements until a sentinel byte sequence
    Terminator {
        /// Sentinel bytes
        sentinel: Vec<u8>,
        /// Whether the sentinel bytes decode as a final element
        keep: bool,
    },
}

/// Codec for homogeneous sequences.
#[derive(Debug)]
pub struct ListCodec {
    element: Arc<dyn Codec>,
    discipline: ListDiscipline,
    ty: FieldType,
}

impl ListCodec {
    /// Create a list codec. A terminator sentinel must not be empty.
    pub fn new(element: Arc<dyn Codec>, discipline: ListDiscipline) -> Result<Self> {
        if let ListDiscipline::Terminator { sentinel, .. } = &discipline {
            if sentinel.is_empty() {
                return Err(PreonError::binding("list", "empty terminator sentinel"));
            }
        }
        let ty = FieldType::List(Box::new(element.field_type().clone()));
        Ok(Self {
            element,
            discipline,
            ty,
        })
    }

    fn decode_element(
        &self,
        index: usize,
        buffer: &mut BitBuffer<'_>,
        resolver: &Resolver<'_>,
        builder: &dyn Builder,
    ) -> Result<Value> {
        self.element
            .decode(buffer, resolver, builder)
            .map_err(|e| e.at_field(&format!("[{index}]")))
    }

    /// True when the sentinel bytes sit at the cursor.
    fn at_sentinel(&self, buffer: &BitBuffer<'_>, sentinel: &[u8]) -> Result<bool> {
        let bits = sentinel.len() as u64 * 8;
        if buffer.remaining() < bits {
            return Ok(false);
        }
        let mut probe = buffer.slice(buffer.position(), bits)?;
        let ahead = probe.read_bytes(sentinel.len())?;
        Ok(ahead == sentinel)
    }
}

impl Codec for ListCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        resolver: &Resolver<'_>,
        builder: &dyn Builder,
    ) -> Result<Value> {
        // Elements run one frame below the enclosing object, so their
        // `outer` references land on the object's fields.
        let element_scope = resolver.child();
        let mut items = Vec::new();
        match &self.discipline {
            ListDiscipline::Count(count) => {
                let n = eval_count(count, resolver, "element count")?;
                for i in 0..n {
                    items.push(self.decode_element(
                        i as usize,
                        buffer,
                        &element_scope,
                        builder,
                    )?);
                }
            }
            ListDiscipline::ByteExtent(extent) => {
                let bytes = eval_count(extent, resolver, "byte extent")?;
                let bits = bytes * 8;
                let mut sub = buffer.slice(buffer.position(), bits)?;
                while !sub.is_at_end() {
                    let i = items.len();
                    items.push(self.decode_element(i, &mut sub, &element_scope, builder)?);
                }
                buffer.skip(bits)?;
            }
            ListDiscipline::Terminator { sentinel, keep } => loop {
                if self.at_sentinel(buffer, sentinel)? {
                    if *keep {
                        let i = items.len();
                        items.push(self.decode_element(i, buffer, &element_scope, builder)?);
                    } else {
                        buffer.skip(sentinel.len() as u64 * 8)?;
                    }
                    break;
                }
                if buffer.remaining() < sentinel.len() as u64 * 8 {
                    return Err(PreonError::decoding(
                        "",
                        buffer.position(),
                        "terminator not found before end of buffer",
                    ));
                }
                let i = items.len();
                items.push(self.decode_element(i, buffer, &element_scope, builder)?);
            },
        }
        Ok(Value::List(items))
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        resolver: &Resolver<'_>,
    ) -> Result<()> {
        let items = value.as_list().ok_or_else(|| {
            PreonError::encoding("", format!("expected list, got {}", value.type_name()))
        })?;
        let element_scope = resolver.child();

        match &self.discipline {
            ListDiscipline::Count(count) => {
                let expected = count.eval_int(resolver)?;
                if expected != items.len() as i64 {
                    return Err(PreonError::encoding(
                        "",
                        format!(
                            "count expression {} evaluates to {expected}, but list holds {} elements",
                            count.describe(),
                            items.len()
                        ),
                    ));
                }
                for (i, item) in items.iter().enumerate() {
                    self.element
                        .encode(item, channel, &element_scope)
                        .map_err(|e| e.at_field(&format!("[{i}]")))?;
                }
            }
            ListDiscipline::ByteExtent(extent) => {
                let bytes = extent.eval_int(resolver)?;
                let start = channel.position();
                for (i, item) in items.iter().enumerate() {
                    self.element
                        .encode(item, channel, &element_scope)
                        .map_err(|e| e.at_field(&format!("[{i}]")))?;
                }
                let written = channel.position() - start;
                if written != bytes as u64 * 8 {
                    return Err(PreonError::encoding(
                        "",
                        format!(
                            "elements occupy {written} bits, but declared extent is {bytes} bytes"
                        ),
                    ));
                }
            }
            ListDiscipline::Terminator { sentinel, keep } => {
                for (i, item) in items.iter().enumerate() {
                    self.element
                        .encode(item, channel, &element_scope)
                        .map_err(|e| e.at_field(&format!("[{i}]")))?;
                }
                if !keep {
                    channel.write_bytes(sentinel)?;
                }
            }
        }
        Ok(())
    }

    /// `count * element_size` when both are known; `None` otherwise.
    fn size(&self) -> Option<Expr> {
        match &self.discipline {
            ListDiscipline::Count(count) => {
                let element = self.element.size()?.fold();
                if !element.is_parameterless() {
                    return None;
                }
                Expr::binary(BinaryOp::Mul, count.clone(), element).ok()
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
    use crate::buffer::Endianness;
    use crate::codec::{decode, encode, NumericCodec};

    fn u8_element() -> Arc<dyn Codec> {
        Arc::new(
            NumericCodec::new(Expr::Int(8), false, Endianness::Big, FieldType::uint(8)).unwrap(),
        )
    }

    fn u16_element() -> Arc<dyn Codec> {
        Arc::new(
            NumericCodec::new(Expr::Int(16), false, Endianness::Big, FieldType::uint(16))
                .unwrap(),
        )
    }

    #[test]
    fn test_count_discipline() {
        let codec = ListCodec::new(u8_element(), ListDiscipline::Count(Expr::Int(3))).unwrap();
        let value = decode(&codec, &[1, 2, 3, 4]).unwrap();
        assert_eq!(
            value,
            Value::List(vec![Value::UInt(1), Value::UInt(2), Value::UInt(3)])
        );
        assert_eq!(encode(&codec, &value).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_count_mismatch_on_encode() {
        let codec = ListCodec::new(u8_element(), ListDiscipline::Count(Expr::Int(2))).unwrap();
        let err = encode(&codec, &Value::List(vec![Value::UInt(1)])).unwrap_err();
        assert!(matches!(err, PreonError::Encoding { .. }));
    }

    #[test]
    fn test_byte_extent_discipline() {
        let codec =
            ListCodec::new(u16_element(), ListDiscipline::ByteExtent(Expr::Int(4))).unwrap();
        let value = decode(&codec, &[0x00, 0x01, 0x00, 0x02, 0xFF]).unwrap();
        assert_eq!(value, Value::List(vec![Value::UInt(1), Value::UInt(2)]));
        assert_eq!(
            encode(&codec, &value).unwrap(),
            vec![0x00, 0x01, 0x00, 0x02]
        );
    }

    #[test]
    fn test_byte_extent_misaligned_element_fails() {
        // A 16-bit element cannot fill a 3-byte extent.
        let codec =
            ListCodec::new(u16_element(), ListDiscipline::ByteExtent(Expr::Int(3))).unwrap();
        assert!(decode(&codec, &[0x00, 0x01, 0x00]).is_err());
    }

    #[test]
    fn test_byte_extent_mismatch_on_encode() {
        let codec =
            ListCodec::new(u16_element(), ListDiscipline::ByteExtent(Expr::Int(4))).unwrap();
        let err = encode(&codec, &Value::List(vec![Value::UInt(1)])).unwrap_err();
        assert!(matches!(err, PreonError::Encoding { .. }));
    }

    #[test]
    fn test_terminator_discipline_excluded() {
        let codec = ListCodec::new(
            u8_element(),
            ListDiscipline::Terminator {
                sentinel: vec![0x00],
                keep: false,
            },
        )
        .unwrap();
        let value = decode(&codec, &[5, 6, 7, 0, 9]).unwrap();
        assert_eq!(
            value,
            Value::List(vec![Value::UInt(5), Value::UInt(6), Value::UInt(7)])
        );
        assert_eq!(encode(&codec, &value).unwrap(), vec![5, 6, 7, 0]);
    }

    #[test]
    fn test_terminator_discipline_included() {
        let codec = ListCodec::new(
            u8_element(),
            ListDiscipline::Terminator {
                sentinel: vec![0x00],
                keep: true,
            },
        )
        .unwrap();
        let value = decode(&codec, &[5, 6, 0]).unwrap();
        assert_eq!(
            value,
            Value::List(vec![Value::UInt(5), Value::UInt(6), Value::UInt(0)])
        );
        assert_eq!(encode(&codec, &value).unwrap(), vec![5, 6, 0]);
    }

    #[test]
    fn test_terminator_not_found() {
        let codec = ListCodec::new(
            u8_element(),
            ListDiscipline::Terminator {
                sentinel: vec![0xFF, 0xFF],
                keep: false,
            },
        )
        .unwrap();
        let err = decode(&codec, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, PreonError::Decoding { .. }));
    }

    #[test]
    fn test_multi_byte_terminator() {
        let codec = ListCodec::new(
            u8_element(),
            ListDiscipline::Terminator {
                sentinel: vec![0xFF, 0xFF],
                keep: false,
            },
        )
        .unwrap();
        let value = decode(&codec, &[1, 2, 0xFF, 0xFF]).unwrap();
        assert_eq!(value, Value::List(vec![Value::UInt(1), Value::UInt(2)]));
    }

    #[test]
    fn test_empty_terminated_list() {
        let codec = ListCodec::new(
            u8_element(),
            ListDiscipline::Terminator {
                sentinel: vec![0x00],
                keep: false,
            },
        )
        .unwrap();
        let value = decode(&codec, &[0x00]).unwrap();
        assert_eq!(value, Value::List(vec![]));
    }

    #[test]
    fn test_element_error_carries_index() {
        let codec = ListCodec::new(u16_element(), ListDiscipline::Count(Expr::Int(2))).unwrap();
        let err = decode(&codec, &[0x00, 0x01, 0x02]).unwrap_err();
        match err {
            PreonError::Decoding { field_path, .. } => assert_eq!(field_path, "[1]"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_size_count_times_fixed_element() {
        let codec = ListCodec::new(u16_element(), ListDiscipline::Count(Expr::Int(3))).unwrap();
        assert_eq!(codec.size().map(Expr::fold), Some(Expr::Int(48)));

        let terminated = ListCodec::new(
            u8_element(),
            ListDiscipline::Terminator {
                sentinel: vec![0],
                keep: false,
            },
        )
        .unwrap();
        assert_eq!(terminated.size(), None);
    }

    #[test]
    fn test_empty_sentinel_rejected() {
        let err = ListCodec::new(
            u8_element(),
            ListDiscipline::Terminator {
                sentinel: vec![],
                keep: false,
            },
        )
        .unwrap_err();
        assert!(matches!(err, PreonError::Binding { .. }));
    }

    #[test]
    fn test_field_type_is_list_of_element() {
        let codec = ListCodec::new(u8_element(), ListDiscipline::Count(Expr::Int(1))).unwrap();
        assert_eq!(
            codec.field_type(),
            &FieldType::List(Box::new(FieldType::uint(8)))
        );
    }
}
