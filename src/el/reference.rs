// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Late-bound references with path navigation.
//!
//! A [`Reference`] is a path of segments (attribute, index, outer) rooted
//! in the scope an expression was parsed in. Every segment is checked
//! against a [`ReferenceContext`] when the reference is built, so an
//! unresolvable path is rejected at build time rather than mid-decode.

use crate::core::{PreonError, Result, Value};
use crate::schema::{FieldType, RecordType, Schema};

use super::ast::{ElType, Expr};
use super::resolver::Resolver;

/// One step of a reference path.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Named field of the current scope
    Attribute(String),
    /// Element of a list; the index is an Integer expression
    Index(Box<Expr>),
    /// Step out to the enclosing scope
    Outer,
}

/// A statically checked path from a scope to a value.
#[derive(Debug, Clone)]
pub struct Reference {
    segments: Vec<Segment>,
    /// Declared type of the final segment
    ty: FieldType,
}

impl PartialEq for Reference {
    /// References are equal iff their segment sequences are equal.
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Reference {
    /// Start a reference at a named field, after walking `outers`
    /// enclosing scopes.
    ///
    /// After the explicit `outer` steps, the name is looked up in the
    /// innermost enclosing scope that declares it, mirroring the
    /// resolver's frame-chain lookup at run time.
    pub fn new(ctx: &ReferenceContext, outers: usize, name: &str) -> Result<Self> {
        let mut scope = ctx;
        for _ in 0..outers {
            scope = scope
                .outer()
                .ok_or_else(|| PreonError::binding(name, "no enclosing scope for 'outer'"))?;
        }
        let mut search = Some(scope);
        let ty = loop {
            let Some(current) = search else {
                return Err(PreonError::binding(
                    name,
                    format!("unresolved reference '{name}'"),
                ));
            };
            if let Some(ty) = current.field_type(name) {
                break ty.clone();
            }
            search = current.outer();
        };

        let mut segments = vec![Segment::Outer; outers];
        segments.push(Segment::Attribute(name.to_string()));
        Ok(Self { segments, ty })
    }

    /// Extend the path with a named attribute of the current target.
    pub fn select_attribute(mut self, schema: &Schema, name: &str) -> Result<Self> {
        let record_name = match &self.ty {
            FieldType::Record(record_name) => record_name.clone(),
            other => {
                return Err(PreonError::binding(
                    self.path(),
                    format!("cannot select '{name}' on {}", other.describe()),
                ))
            }
        };
        let record = schema.record(&record_name).ok_or_else(|| {
            PreonError::binding(self.path(), format!("unknown record '{record_name}'"))
        })?;
        let field = record.field(name).ok_or_else(|| {
            PreonError::binding(
                self.path(),
                format!("record '{record_name}' has no field '{name}'"),
            )
        })?;
        self.ty = field.ty.clone();
        self.segments.push(Segment::Attribute(name.to_string()));
        Ok(self)
    }

    /// Extend the path with a list index.
    pub fn select_item(mut self, index: Expr) -> Result<Self> {
        if index.el_type() != ElType::Integer {
            return Err(PreonError::binding(
                self.path(),
                "index expression must be an integer",
            ));
        }
        let element = match &self.ty {
            FieldType::List(element) => (**element).clone(),
            other => {
                return Err(PreonError::binding(
                    self.path(),
                    format!("cannot index into {}", other.describe()),
                ))
            }
        };
        self.ty = element;
        self.segments.push(Segment::Index(Box::new(index)));
        Ok(self)
    }

    /// Statically downcast a union-typed reference to one of its arms.
    pub fn narrow(mut self, ty: FieldType) -> Result<Self> {
        match self.ty {
            FieldType::Union => {
                self.ty = ty;
                Ok(self)
            }
            ref other => Err(PreonError::binding(
                self.path(),
                format!("cannot narrow {}", other.describe()),
            )),
        }
    }

    /// Declared type of the final segment.
    pub fn field_type(&self) -> &FieldType {
        &self.ty
    }

    /// Expression-language type of the final segment, when it has one.
    pub fn el_type(&self) -> Option<ElType> {
        ElType::of(&self.ty)
    }

    /// Reference segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// True if no segment carries a parameterised index expression.
    pub fn has_constant_path(&self) -> bool {
        self.segments.iter().all(|s| match s {
            Segment::Index(expr) => expr.is_parameterless(),
            _ => true,
        })
    }

    /// Re-root this reference one containment step up: a reference valid
    /// inside a field named `field` becomes valid in the enclosing scope.
    pub fn rescope(&self, field: &str) -> Reference {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        if self.segments.first() == Some(&Segment::Outer) {
            segments.extend(self.segments.iter().skip(1).cloned());
        } else {
            segments.push(Segment::Attribute(field.to_string()));
            for segment in &self.segments {
                segments.push(match segment {
                    Segment::Index(expr) => {
                        Segment::Index(Box::new(expr.rescope(field)))
                    }
                    other => other.clone(),
                });
            }
        }
        Reference {
            segments,
            ty: self.ty.clone(),
        }
    }

    /// Render the path as source text, e.g. `outer.items[n].len`.
    pub fn path(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Outer => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str("outer");
                }
                Segment::Attribute(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(name);
                }
                Segment::Index(expr) => {
                    out.push('[');
                    out.push_str(&expr.describe());
                    out.push(']');
                }
            }
        }
        out
    }

    /// Look the referenced value up at runtime.
    pub fn resolve(&self, resolver: &Resolver) -> Result<Value> {
        let mut scope = resolver;
        let mut segments = self.segments.iter();
        let mut current: Option<Value> = None;

        for segment in segments.by_ref() {
            match segment {
                Segment::Outer => {
                    scope = scope.outer().ok_or_else(|| {
                        PreonError::decoding(self.path(), 0, "no enclosing resolver")
                    })?;
                }
                Segment::Attribute(name) => {
                    current = Some(scope.get(name).cloned().ok_or_else(|| {
                        PreonError::decoding(
                            self.path(),
                            0,
                            format!("'{name}' not yet decoded"),
                        )
                    })?);
                    break;
                }
                Segment::Index(_) => {
                    return Err(PreonError::decoding(
                        self.path(),
                        0,
                        "reference path starts with an index",
                    ))
                }
            }
        }

        let mut value = current.ok_or_else(|| {
            PreonError::decoding(self.path(), 0, "empty reference path")
        })?;

        for segment in segments {
            value = match segment {
                Segment::Attribute(name) => value
                    .as_struct()
                    .and_then(|s| s.get(name))
                    .cloned()
                    .ok_or_else(|| {
                        PreonError::decoding(
                            self.path(),
                            0,
                            format!("no field '{name}' in {}", value.type_name()),
                        )
                    })?,
                Segment::Index(index) => {
                    let i = index.eval_int(resolver)?;
                    let items = value.as_list().ok_or_else(|| {
                        PreonError::decoding(
                            self.path(),
                            0,
                            format!("cannot index {}", value.type_name()),
                        )
                    })?;
                    usize::try_from(i)
                        .ok()
                        .and_then(|i| items.get(i))
                        .cloned()
                        .ok_or_else(|| {
                            PreonError::decoding(
                                self.path(),
                                0,
                                format!("index {i} out of bounds ({} elements)", items.len()),
                            )
                        })?
                }
                Segment::Outer => {
                    return Err(PreonError::decoding(
                        self.path(),
                        0,
                        "'outer' segment after path start",
                    ))
                }
            };
        }
        Ok(value)
    }
}

/// Build-time schema-of-names for static reference checking.
///
/// A context is a scope (a record under construction, or a list element
/// type) plus an optional link to the enclosing context for `outer`
/// navigation. Contexts exist only while the factory runs.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceContext<'a> {
    schema: &'a Schema,
    scope: Scope<'a>,
    outer: Option<&'a ReferenceContext<'a>>,
}

/// What a context scope is made of.
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    /// No names; the scope above a top-level record
    Root,
    /// Fields of a record declaration
    Record(&'a RecordType),
    /// A list element type
    Element(&'a FieldType),
}

impl<'a> ReferenceContext<'a> {
    /// Empty context above a top-level record.
    pub fn root(schema: &'a Schema) -> Self {
        Self {
            schema,
            scope: Scope::Root,
            outer: None,
        }
    }

    /// Top-level context over a record.
    pub fn record(schema: &'a Schema, record: &'a RecordType) -> Self {
        Self {
            schema,
            scope: Scope::Record(record),
            outer: None,
        }
    }

    /// Nested record scope.
    pub fn child_record(&'a self, record: &'a RecordType) -> ReferenceContext<'a> {
        ReferenceContext {
            schema: self.schema,
            scope: Scope::Record(record),
            outer: Some(self),
        }
    }

    /// Nested list-element scope.
    pub fn child_element(&'a self, ty: &'a FieldType) -> ReferenceContext<'a> {
        ReferenceContext {
            schema: self.schema,
            scope: Scope::Element(ty),
            outer: Some(self),
        }
    }

    /// The schema the context resolves names against.
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// The enclosing context, if any.
    pub fn outer(&self) -> Option<&ReferenceContext<'a>> {
        self.outer
    }

    /// Resolve a field name in this scope. Element scopes declare no
    /// names of their own; they exist so `outer` counts line up with
    /// the runtime frame the list codec pushes per element.
    pub fn field_type(&self, name: &str) -> Option<&'a FieldType> {
        match self.scope {
            Scope::Root | Scope::Element(_) => None,
            Scope::Record(record) => record.field(name).map(|f| &f.ty),
        }
    }
}
