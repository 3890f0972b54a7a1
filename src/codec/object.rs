// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Composite codec: an ordered list of field bindings.

use std::sync::Arc;

use tracing::trace;

use crate::buffer::{BitBuffer, BitChannel};
use crate::core::{PreonError, Result, Value};
use crate::el::{BinaryOp, Expr, Resolver};
use crate::schema::{FieldType, RecordType};

use super::{default_value, value_from_eval, Builder, Codec};

/// One field of an enclosing object: a codec plus expression-driven
/// modifiers.
#[derive(Debug, Clone)]
pub struct Binding {
    /// Field name; the decoded value enters the resolver under it
    pub name: String,
    /// Codec for the field's value
    pub codec: Arc<dyn Codec>,
    /// Presence guard; false leaves the field at its default
    pub guard: Option<Expr>,
    /// Absolute bit-position override
    pub offset: Option<Expr>,
    /// Default for skipped fields
    pub init: Option<Expr>,
}

impl Binding {
    /// Create a plain binding with no modifiers.
    pub fn new(name: impl Into<String>, codec: Arc<dyn Codec>) -> Self {
        Self {
            name: name.into(),
            codec,
            guard: None,
            offset: None,
            init: None,
        }
    }

    /// The value a skipped field takes: the declared `init` expression,
    /// or the field type's default.
    fn skipped_value(&self, resolver: &Resolver<'_>) -> Result<Value> {
        match &self.init {
            Some(init) => {
                let eval = init.evaluate(resolver).map_err(|e| e.at_field(&self.name))?;
                Ok(value_from_eval(eval, self.codec.field_type()))
            }
            None => Ok(default_value(self.codec.field_type())),
        }
    }
}

/// Codec for a record declaration: decodes fields in declaration order,
/// feeding each decoded value back into the resolver so later bindings
/// can reference it.
#[derive(Debug)]
pub struct ObjectCodec {
    record: RecordType,
    bindings: Vec<Binding>,
    ty: FieldType,
}

impl ObjectCodec {
    /// Create an object codec over prepared bindings.
    pub fn new(record: RecordType, bindings: Vec<Binding>) -> Self {
        let ty = FieldType::Record(record.name.clone());
        Self {
            record,
            bindings,
            ty,
        }
    }

    /// The record declaration this codec was built from.
    pub fn record(&self) -> &RecordType {
        &self.record
    }

    /// The field bindings, in declaration order.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }
}

impl Codec for ObjectCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        resolver: &Resolver<'_>,
        builder: &dyn Builder,
    ) -> Result<Value> {
        let blank = builder.build(&self.record, resolver)?;
        let mut fields = match blank {
            Value::Struct(fields) => fields,
            other => {
                return Err(PreonError::decoding(
                    &self.record.name,
                    buffer.position(),
                    format!("builder produced {}, expected struct", other.type_name()),
                ))
            }
        };

        let mut scope = resolver.child();
        for binding in &self.bindings {
            let present = match &binding.guard {
                Some(guard) => guard
                    .eval_bool(&scope)
                    .map_err(|e| e.at_field(&binding.name))?,
                None => true,
            };
            if !present {
                let value = binding.skipped_value(&scope)?;
                fields.insert(binding.name.clone(), value.clone());
                scope.bind(binding.name.clone(), value);
                continue;
            }

            trace!(field = %binding.name, position = buffer.position(), "decoding field");
            let value = match &binding.offset {
                Some(offset) => {
                    let target = offset
                        .eval_int(&scope)
                        .map_err(|e| e.at_field(&binding.name))?;
                    let target = u64::try_from(target).map_err(|_| {
                        PreonError::decoding(
                            &binding.name,
                            buffer.position(),
                            format!("negative bit offset {target}"),
                        )
                    })?;
                    // The natural cursor is restored afterwards so an
                    // explicit offset never advances the object's end.
                    let saved = buffer.position();
                    buffer.seek(target).map_err(|e| e.at_field(&binding.name))?;
                    let value = binding
                        .codec
                        .decode(buffer, &scope, builder)
                        .map_err(|e| e.at_field(&binding.name))?;
                    buffer
                        .seek(saved)
                        .map_err(|e| e.at_field(&binding.name))?;
                    value
                }
                None => binding
                    .codec
                    .decode(buffer, &scope, builder)
                    .map_err(|e| e.at_field(&binding.name))?,
            };
            fields.insert(binding.name.clone(), value.clone());
            scope.bind(binding.name.clone(), value);
        }

        Ok(Value::Struct(fields))
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        resolver: &Resolver<'_>,
    ) -> Result<()> {
        let fields = value.as_struct().ok_or_else(|| {
            PreonError::encoding(
                &self.record.name,
                format!("expected struct, got {}", value.type_name()),
            )
        })?;

        // Guards see the object being encoded: the frame is backed by
        // the value's own fields.
        let mut scope = resolver.child();
        scope.bind_record(fields);

        for binding in &self.bindings {
            let present = match &binding.guard {
                Some(guard) => guard
                    .eval_bool(&scope)
                    .map_err(|e| e.at_field(&binding.name))?,
                None => true,
            };
            if !present {
                continue;
            }

            let field_value = fields.get(&binding.name).ok_or_else(|| {
                PreonError::encoding(&binding.name, "field missing from value")
            })?;

            if let Some(offset) = &binding.offset {
                let target = offset
                    .eval_int(&scope)
                    .map_err(|e| e.at_field(&binding.name))?;
                let target = u64::try_from(target).map_err(|_| {
                    PreonError::encoding(&binding.name, format!("negative bit offset {target}"))
                })?;
                channel.pad_to(target).map_err(|_| {
                    PreonError::encoding(
                        &binding.name,
                        format!(
                            "channel is at bit {}, past declared offset {target}",
                            channel.position()
                        ),
                    )
                })?;
            }

            binding
                .codec
                .encode(field_value, channel, &scope)
                .map_err(|e| e.at_field(&binding.name))?;
        }
        Ok(())
    }

    /// The guarded sum of the children's sizes: a conditional binding
    /// contributes `if(guard, child, 0)`. `None` when any child size is
    /// unbounded or a binding uses an explicit offset.
    fn size(&self) -> Option<Expr> {
        let mut total = Expr::Int(0);
        for binding in &self.bindings {
            if binding.offset.is_some() {
                return None;
            }
            let child = binding.codec.size()?;
            let contribution = match &binding.guard {
                Some(guard) => Expr::cond(guard.clone(), child, Expr::Int(0)).ok()?,
                None => child,
            };
            total = Expr::binary(BinaryOp::Add, total, contribution).ok()?;
        }
        Some(total.fold())
    }

    fn field_type(&self) -> &FieldType {
        &self.ty
    }
}
