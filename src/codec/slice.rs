// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Scoped sub-buffer codec.

use std::sync::Arc;

use crate::buffer::{BitBuffer, BitChannel};
use crate::core::{PreonError, Result, Value};
use crate::el::{BinaryOp, Expr, Resolver};
use crate::schema::FieldType;

use super::{eval_count, Builder, Codec};

/// Confines an inner codec to a fixed span of bytes.
///
/// Decoding runs the inner codec against a logical sub-buffer of the
/// declared extent, then advances the parent past the whole span
/// regardless of how much the inner codec consumed. Encoding zero-pads
/// the span after the inner codec has written.
#[derive(Debug)]
pub struct SliceCodec {
    /// Extent in bytes
    limit: Expr,
    inner: Arc<dyn Codec>,
}

impl SliceCodec {
    pub fn new(limit: Expr, inner: Arc<dyn Codec>) -> Self {
        Self { limit, inner }
    }
}

impl Codec for SliceCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        resolver: &Resolver<'_>,
        builder: &dyn Builder,
    ) -> Result<Value> {
        let bytes = eval_count(&self.limit, resolver, "slice extent")?;
        let bits = bytes * 8;
        let mut sub = buffer.slice(buffer.position(), bits)?;
        let value = self.inner.decode(&mut sub, resolver, builder)?;
        buffer.skip(bits)?;
        Ok(value)
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        resolver: &Resolver<'_>,
    ) -> Result<()> {
        let bytes = eval_count(&self.limit, resolver, "slice extent").map_err(|e| match e {
            PreonError::Decoding { reason, .. } => PreonError::encoding("", reason),
            other => other,
        })?;
        let bits = bytes * 8;
        let start = channel.position();
        self.inner.encode(value, channel, resolver)?;
        let written = channel.position() - start;
        if written > bits {
            return Err(PreonError::encoding(
                "",
                format!("value occupies {written} bits, but slice extent is {bits} bits"),
            ));
        }
        channel.pad_to(start + bits)
    }

    fn size(&self) -> Option<Expr> {
        Expr::binary(BinaryOp::Mul, self.limit.clone(), Expr::Int(8)).ok()
    }

    fn field_type(&self) -> &FieldType {
        self.inner.field_type()
    }
}
