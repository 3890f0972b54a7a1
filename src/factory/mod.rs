// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Codec factory pipeline.
//!
//! [`CodecFactory`] walks a record declaration, asking its registered
//! [`SubFactory`] instances, in priority order, to build a codec for each
//! declared type. Codec and binding decorators wrap the results.
//! Cyclic type graphs resolve through a per-build forward-reference
//! registry: a record already under construction yields a thunk that
//! dereferences the finished codec on first use.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::buffer::{BitBuffer, BitChannel};
use crate::codec::{
    Binding, BooleanCodec, Builder, ByteArrayCodec, ChoiceCodec, Codec, EnumCodec, FloatCodec,
    ListCodec, ListDiscipline, NumericCodec, ObjectCodec, SliceCodec, StringCodec,
};
use crate::core::{PreonError, Result, Value};
use crate::el::{parse, parse_typed, ElType, Expr, ReferenceContext, Resolver};
use crate::schema::{FieldOptions, FieldType, Schema};

/// Builds a codec for one declared type, or declines.
pub trait SubFactory: Send + Sync {
    /// Return `Ok(None)` to pass the type to the next factory.
    fn try_build(
        &self,
        ty: &FieldType,
        options: &FieldOptions,
        scope: &ReferenceContext<'_>,
        build: &BuildContext<'_>,
    ) -> Result<Option<Arc<dyn Codec>>>;
}

/// Wraps a freshly built codec.
pub trait CodecDecorator: Send + Sync {
    fn decorate(
        &self,
        codec: Arc<dyn Codec>,
        ty: &FieldType,
        options: &FieldOptions,
    ) -> Arc<dyn Codec>;
}

/// Wraps a freshly built binding.
pub trait BindingDecorator: Send + Sync {
    fn decorate(&self, binding: Binding) -> Binding;
}

type ForwardSlot = Arc<OnceLock<Arc<dyn Codec>>>;

/// Per-build state: the schema under construction and the
/// forward-reference registry keyed by record name.
pub struct BuildContext<'a> {
    schema: &'a Schema,
    pipeline: &'a CodecFactory,
    registry: RefCell<HashMap<String, ForwardSlot>>,
}

impl<'a> BuildContext<'a> {
    /// The schema codecs are being built from.
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// The pipeline, for recursive builds.
    pub fn pipeline(&self) -> &'a CodecFactory {
        self.pipeline
    }

    fn slot(&self, name: &str) -> Option<ForwardSlot> {
        self.registry.borrow().get(name).cloned()
    }

    fn begin(&self, name: &str) -> ForwardSlot {
        let slot: ForwardSlot = Arc::new(OnceLock::new());
        self.registry
            .borrow_mut()
            .insert(name.to_string(), slot.clone());
        slot
    }
}

/// The factory pipeline: sub-factories in priority order plus
/// decorators applied in registration order.
pub struct CodecFactory {
    factories: Vec<Arc<dyn SubFactory>>,
    decorators: Vec<Arc<dyn CodecDecorator>>,
    binding_decorators: Vec<Arc<dyn BindingDecorator>>,
}

impl CodecFactory {
    /// A pipeline with the standard sub-factories registered.
    pub fn new() -> Self {
        Self {
            factories: vec![
                Arc::new(PrimitiveSubFactory),
                Arc::new(EnumSubFactory),
                Arc::new(ChoiceSubFactory),
                Arc::new(ListSubFactory),
                Arc::new(ObjectSubFactory),
            ],
            decorators: Vec::new(),
            binding_decorators: Vec::new(),
        }
    }

    /// Register a sub-factory ahead of the standard ones.
    pub fn with_factory(mut self, factory: Arc<dyn SubFactory>) -> Self {
        self.factories.insert(0, factory);
        self
    }

    /// Register a codec decorator.
    pub fn with_decorator(mut self, decorator: Arc<dyn CodecDecorator>) -> Self {
        self.decorators.push(decorator);
        self
    }

    /// Register a binding decorator.
    pub fn with_binding_decorator(mut self, decorator: Arc<dyn BindingDecorator>) -> Self {
        self.binding_decorators.push(decorator);
        self
    }

    /// Build a codec for a named record.
    pub fn create(&self, schema: &Schema, type_name: &str) -> Result<Arc<dyn Codec>> {
        if schema.record(type_name).is_none() {
            return Err(PreonError::binding(
                type_name,
                "unknown record declaration",
            ));
        }
        let build = BuildContext {
            schema,
            pipeline: self,
            registry: RefCell::new(HashMap::new()),
        };
        let root = ReferenceContext::root(schema);
        let codec = self.build_codec(
            &FieldType::Record(type_name.to_string()),
            &FieldOptions::default(),
            &root,
            &build,
        )?;
        debug!(type_name, "codec built");
        Ok(codec)
    }

    /// Ask each sub-factory in turn; the first acceptor wins.
    pub fn build_codec(
        &self,
        ty: &FieldType,
        options: &FieldOptions,
        scope: &ReferenceContext<'_>,
        build: &BuildContext<'_>,
    ) -> Result<Arc<dyn Codec>> {
        for factory in &self.factories {
            if let Some(codec) = factory.try_build(ty, options, scope, build)? {
                let mut codec = codec;
                // A non-list field with an extent decodes inside a
                // fixed byte envelope.
                if let Some(source) = &options.extent {
                    if !matches!(ty, FieldType::List(_)) {
                        let limit = parse_typed(source, scope, ElType::Integer)?.fold();
                        codec = Arc::new(SliceCodec::new(limit, codec));
                    }
                }
                for decorator in &self.decorators {
                    codec = decorator.decorate(codec, ty, options);
                }
                return Ok(codec);
            }
        }
        Err(PreonError::binding(
            ty.describe(),
            "no factory accepts this type",
        ))
    }
}

impl Default for CodecFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a codec for a named record with the default pipeline.
pub fn create(schema: &Schema, type_name: &str) -> Result<Arc<dyn Codec>> {
    CodecFactory::new().create(schema, type_name)
}

// =========================================================================
// Standard sub-factories
// =========================================================================

/// Integers, booleans, floats, byte arrays, strings.
struct PrimitiveSubFactory;

impl PrimitiveSubFactory {
    fn width_expr(
        declared: u32,
        options: &FieldOptions,
        scope: &ReferenceContext<'_>,
    ) -> Result<Expr> {
        match &options.bits {
            Some(source) => Ok(parse_typed(source, scope, ElType::Integer)?.fold()),
            None => Ok(Expr::Int(declared as i64)),
        }
    }
}

impl SubFactory for PrimitiveSubFactory {
    fn try_build(
        &self,
        ty: &FieldType,
        options: &FieldOptions,
        scope: &ReferenceContext<'_>,
        _build: &BuildContext<'_>,
    ) -> Result<Option<Arc<dyn Codec>>> {
        let codec: Arc<dyn Codec> = match ty {
            FieldType::UInt { bits } => Arc::new(NumericCodec::new(
                Self::width_expr(*bits, options, scope)?,
                false,
                options.endian,
                ty.clone(),
            )?),
            FieldType::Int { bits } => Arc::new(NumericCodec::new(
                Self::width_expr(*bits, options, scope)?,
                true,
                options.endian,
                ty.clone(),
            )?),
            FieldType::Bool => Arc::new(BooleanCodec::new()),
            FieldType::Float32 => Arc::new(FloatCodec::new(false, options.endian)),
            FieldType::Float64 => Arc::new(FloatCodec::new(true, options.endian)),
            FieldType::Bytes => {
                let source = options.length.as_ref().ok_or_else(|| {
                    PreonError::binding("bytes", "byte-array field requires a length")
                })?;
                let length = parse_typed(source, scope, ElType::Integer)?.fold();
                Arc::new(ByteArrayCodec::new(length))
            }
            FieldType::String => {
                let length = options
                    .length
                    .as_ref()
                    .map(|source| parse_typed(source, scope, ElType::Integer).map(Expr::fold))
                    .transpose()?;
                Arc::new(StringCodec::new(
                    length,
                    options.termination,
                    options.charset,
                    options.endian,
                )?)
            }
            _ => return Ok(None),
        };
        Ok(Some(codec))
    }
}

/// Named enum declarations.
struct EnumSubFactory;

impl SubFactory for EnumSubFactory {
    fn try_build(
        &self,
        ty: &FieldType,
        options: &FieldOptions,
        _scope: &ReferenceContext<'_>,
        build: &BuildContext<'_>,
    ) -> Result<Option<Arc<dyn Codec>>> {
        let FieldType::Enum(name) = ty else {
            return Ok(None);
        };
        let decl = build
            .schema()
            .get_enum(name)
            .ok_or_else(|| PreonError::binding(name, "unknown enum declaration"))?;
        Ok(Some(Arc::new(EnumCodec::new(
            decl.clone(),
            options.endian,
        )?)))
    }
}

/// Discriminated unions from the `choices` option.
struct ChoiceSubFactory;

impl SubFactory for ChoiceSubFactory {
    fn try_build(
        &self,
        ty: &FieldType,
        options: &FieldOptions,
        scope: &ReferenceContext<'_>,
        build: &BuildContext<'_>,
    ) -> Result<Option<Arc<dyn Codec>>> {
        if !matches!(ty, FieldType::Union) {
            return Ok(None);
        }
        let arm_options = FieldOptions {
            endian: options.endian,
            ..FieldOptions::default()
        };
        let mut arms = Vec::with_capacity(options.choices.len());
        for arm in &options.choices {
            let guard = parse_typed(&arm.guard, scope, ElType::Boolean)?.fold();
            let codec = build
                .pipeline()
                .build_codec(&arm.ty, &arm_options, scope, build)?;
            arms.push((guard, codec));
        }
        let fallback = options
            .choice_default
            .as_ref()
            .map(|arm_ty| {
                build
                    .pipeline()
                    .build_codec(arm_ty, &arm_options, scope, build)
            })
            .transpose()?;
        Ok(Some(Arc::new(ChoiceCodec::new(arms, fallback)?)))
    }
}

/// Lists with a count, byte-extent, or terminator discipline.
struct ListSubFactory;

impl SubFactory for ListSubFactory {
    fn try_build(
        &self,
        ty: &FieldType,
        options: &FieldOptions,
        scope: &ReferenceContext<'_>,
        build: &BuildContext<'_>,
    ) -> Result<Option<Arc<dyn Codec>>> {
        let FieldType::List(element_ty) = ty else {
            return Ok(None);
        };

        // Width, byte order and string policy travel to the element;
        // the list-level knobs stay here.
        let element_options = FieldOptions {
            bits: options.bits.clone(),
            endian: options.endian,
            termination: options.termination,
            charset: options.charset,
            ..FieldOptions::default()
        };
        let element_ctx = scope.child_element(element_ty);
        let element =
            build
                .pipeline()
                .build_codec(element_ty, &element_options, &element_ctx, build)?;

        let discipline = if let Some(source) = &options.length {
            ListDiscipline::Count(parse_typed(source, scope, ElType::Integer)?.fold())
        } else if let Some(source) = &options.extent {
            ListDiscipline::ByteExtent(parse_typed(source, scope, ElType::Integer)?.fold())
        } else if let Some(sentinel) = &options.terminator {
            ListDiscipline::Terminator {
                sentinel: sentinel.clone(),
                keep: options.keep_terminator,
            }
        } else {
            return Err(PreonError::binding(
                ty.describe(),
                "list requires a length, extent, or terminator",
            ));
        };

        Ok(Some(Arc::new(ListCodec::new(element, discipline)?)))
    }
}

/// Record declarations; handles cycles via the forward registry.
struct ObjectSubFactory;

impl SubFactory for ObjectSubFactory {
    fn try_build(
        &self,
        ty: &FieldType,
        _options: &FieldOptions,
        scope: &ReferenceContext<'_>,
        build: &BuildContext<'_>,
    ) -> Result<Option<Arc<dyn Codec>>> {
        let FieldType::Record(name) = ty else {
            return Ok(None);
        };

        if let Some(slot) = build.slot(name) {
            if let Some(codec) = slot.get() {
                return Ok(Some(codec.clone()));
            }
            // Under construction: hand out a thunk.
            return Ok(Some(Arc::new(ForwardCodec {
                name: name.clone(),
                ty: ty.clone(),
                slot,
            })));
        }

        let record = build
            .schema()
            .record(name)
            .ok_or_else(|| PreonError::binding(name, "unknown record declaration"))?;
        let slot = build.begin(name);
        let record_ctx = scope.child_record(record);

        let mut bindings = Vec::with_capacity(record.fields.len());
        for field in &record.fields {
            let codec = build
                .pipeline()
                .build_codec(&field.ty, &field.options, &record_ctx, build)
                .map_err(|e| e.at_field(&field.name))?;
            let mut binding = Binding::new(&field.name, codec);
            if let Some(source) = &field.options.condition {
                binding.guard = Some(
                    parse_typed(source, &record_ctx, ElType::Boolean)
                        .map_err(|e| e.at_field(&field.name))?
                        .fold(),
                );
            }
            if let Some(source) = &field.options.offset {
                binding.offset = Some(
                    parse_typed(source, &record_ctx, ElType::Integer)
                        .map_err(|e| e.at_field(&field.name))?
                        .fold(),
                );
            }
            if let Some(source) = &field.options.init {
                binding.init = Some(
                    parse(source, &record_ctx)
                        .map_err(|e| e.at_field(&field.name))?
                        .fold(),
                );
            }
            for decorator in &build.pipeline().binding_decorators {
                binding = decorator.decorate(binding);
            }
            bindings.push(binding);
        }

        let codec: Arc<dyn Codec> = Arc::new(ObjectCodec::new(record.clone(), bindings));
        let _ = slot.set(codec.clone());
        Ok(Some(codec))
    }
}

/// Thunk for a record codec still under construction.
#[derive(Debug)]
struct ForwardCodec {
    name: String,
    ty: FieldType,
    slot: ForwardSlot,
}

impl ForwardCodec {
    fn resolved(&self) -> Result<&Arc<dyn Codec>> {
        self.slot.get().ok_or_else(|| {
            PreonError::binding(&self.name, "forward reference never resolved")
        })
    }
}

impl Codec for ForwardCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        resolver: &Resolver<'_>,
        builder: &dyn Builder,
    ) -> Result<Value> {
        self.resolved()?.decode(buffer, resolver, builder)
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        resolver: &Resolver<'_>,
    ) -> Result<()> {
        self.resolved()?.encode(value, channel, resolver)
    }

    /// `None`: a forward reference only exists inside a cycle, and a
    /// cyclic type has no closed-form size.
    fn size(&self) -> Option<Expr> {
        None
    }

    fn field_type(&self) -> &FieldType {
        &self.ty
    }
}

// =========================================================================
// Example decorators
// =========================================================================

/// Codec decorator that pads every decorated codec to a byte boundary.
pub struct SlackDecorator;

impl CodecDecorator for SlackDecorator {
    fn decorate(
        &self,
        codec: Arc<dyn Codec>,
        _ty: &FieldType,
        _options: &FieldOptions,
    ) -> Arc<dyn Codec> {
        Arc::new(ByteAlignedCodec { inner: codec })
    }
}

/// Skips or writes slack bits up to the next byte boundary.
#[derive(Debug)]
struct ByteAlignedCodec {
    inner: Arc<dyn Codec>,
}

impl Codec for ByteAlignedCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        resolver: &Resolver<'_>,
        builder: &dyn Builder,
    ) -> Result<Value> {
        let value = self.inner.decode(buffer, resolver, builder)?;
        let phase = buffer.position() % 8;
        if phase != 0 {
            buffer.skip(8 - phase)?;
        }
        Ok(value)
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        resolver: &Resolver<'_>,
    ) -> Result<()> {
        self.inner.encode(value, channel, resolver)?;
        channel.align_to_byte()
    }

    fn size(&self) -> Option<Expr> {
        match self.inner.size()?.fold() {
            Expr::Int(bits) => Some(Expr::Int((bits + 7) / 8 * 8)),
            _ => None,
        }
    }

    fn field_type(&self) -> &FieldType {
        self.inner.field_type()
    }
}

/// Binding decorator that logs each field's bit position as it decodes.
pub struct TraceBindingDecorator;

impl BindingDecorator for TraceBindingDecorator {
    fn decorate(&self, mut binding: Binding) -> Binding {
        binding.codec = Arc::new(TraceCodec {
            name: binding.name.clone(),
            inner: binding.codec,
        });
        binding
    }
}

#[derive(Debug)]
struct TraceCodec {
    name: String,
    inner: Arc<dyn Codec>,
}

impl Codec for TraceCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        resolver: &Resolver<'_>,
        builder: &dyn Builder,
    ) -> Result<Value> {
        let start = buffer.position();
        let value = self.inner.decode(buffer, resolver, builder)?;
        debug!(field = %self.name, start, end = buffer.position(), "field decoded");
        Ok(value)
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        resolver: &Resolver<'_>,
    ) -> Result<()> {
        let start = channel.position();
        self.inner.encode(value, channel, resolver)?;
        debug!(field = %self.name, start, end = channel.position(), "field encoded");
        Ok(())
    }

    fn size(&self) -> Option<Expr> {
        self.inner.size()
    }

    fn field_type(&self) -> &FieldType {
        self.inner.field_type()
    }
}
