// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Typed expression tree.
//!
//! Every node carries a static type fixed at construction: arithmetic
//! requires integer children and yields an integer, comparisons yield a
//! boolean, logical operators require booleans. Nodes are immutable after
//! construction and evaluate against a [`Resolver`] without side effects.

use crate::core::{PreonError, Result, Value};
use crate::schema::FieldType;

use super::reference::Reference;
use super::resolver::Resolver;

/// Static type of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElType {
    /// 64-bit two's-complement integer
    Integer,
    /// Boolean
    Boolean,
    /// Text
    String,
}

impl ElType {
    /// Expression-language type of a declared field type, when it has
    /// one. Floats, byte arrays and composites are not expression
    /// operands.
    pub fn of(ty: &FieldType) -> Option<ElType> {
        match ty {
            FieldType::UInt { .. } | FieldType::Int { .. } => Some(ElType::Integer),
            FieldType::Bool => Some(ElType::Boolean),
            FieldType::String | FieldType::Enum(_) => Some(ElType::String),
            _ => None,
        }
    }
}

impl std::fmt::Display for ElType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElType::Integer => write!(f, "integer"),
            ElType::Boolean => write!(f, "boolean"),
            ElType::String => write!(f, "string"),
        }
    }
}

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Eval {
    /// Integer result
    Int(i64),
    /// Boolean result
    Bool(bool),
    /// String result
    Str(String),
}

impl Eval {
    fn from_value(value: &Value, path: &str) -> Result<Eval> {
        match value {
            Value::Int(v) => Ok(Eval::Int(*v)),
            Value::UInt(v) => Ok(Eval::Int(*v as i64)),
            Value::Bool(v) => Ok(Eval::Bool(*v)),
            Value::String(v) => Ok(Eval::Str(v.clone())),
            Value::Enum(v) => Ok(Eval::Str(v.clone())),
            other => Err(PreonError::decoding(
                path,
                0,
                format!("{} value cannot be used in an expression", other.type_name()),
            )),
        }
    }
}

/// Binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    fn word(self) -> &'static str {
        match self {
            BinaryOp::Add => "plus",
            BinaryOp::Sub => "minus",
            BinaryOp::Mul => "times",
            BinaryOp::Div => "divided by",
            BinaryOp::Rem => "modulo",
            BinaryOp::Pow => "to the power of",
            BinaryOp::Lt => "is less than",
            BinaryOp::Le => "is less than or equal to",
            BinaryOp::Gt => "is greater than",
            BinaryOp::Ge => "is greater than or equal to",
            BinaryOp::Eq => "equals",
            BinaryOp::Ne => "does not equal",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }

    fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add
                | BinaryOp::Sub
                | BinaryOp::Mul
                | BinaryOp::Div
                | BinaryOp::Rem
                | BinaryOp::Pow
        )
    }

    fn is_ordering(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::Ne)
    }

    fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

/// An expression node.
///
/// Use the checked constructors ([`Expr::binary`], [`Expr::neg`],
/// [`Expr::not`], [`Expr::cond`], [`Expr::reference`]) to build trees; they
/// enforce the typing rules at construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Integer literal
    Int(i64),
    /// Boolean literal
    Bool(bool),
    /// String literal
    Str(String),
    /// Late-bound reference
    Ref(Reference),
    /// Arithmetic negation
    Neg(Box<Expr>),
    /// Logical negation
    Not(Box<Expr>),
    /// Binary operation
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Conditional, used by size composition for guarded bindings.
    /// Not part of the surface grammar.
    Cond {
        guard: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

impl Expr {
    /// Wrap a reference, requiring that its final segment has an
    /// expression-language type.
    pub fn reference(reference: Reference) -> Result<Expr> {
        if reference.el_type().is_none() {
            return Err(PreonError::binding(
                reference.path(),
                format!(
                    "field of type {} cannot be used in an expression",
                    reference.field_type().describe()
                ),
            ));
        }
        Ok(Expr::Ref(reference))
    }

    /// Build a type-checked binary node.
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Result<Expr> {
        let (lt, rt) = (lhs.el_type(), rhs.el_type());
        let ok = if op.is_arithmetic() {
            lt == ElType::Integer && rt == ElType::Integer
        } else if op.is_ordering() {
            lt == rt && (lt == ElType::Integer || lt == ElType::String)
        } else if op.is_equality() {
            lt == rt && lt != ElType::Boolean
        } else {
            lt == ElType::Boolean && rt == ElType::Boolean
        };
        if !ok {
            return Err(PreonError::binding(
                format!("{} ... {}", lhs.describe(), rhs.describe()),
                format!("operator '{}' cannot combine {lt} and {rt}", op.word()),
            ));
        }
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    /// Build an arithmetic negation.
    pub fn neg(inner: Expr) -> Result<Expr> {
        if inner.el_type() != ElType::Integer {
            return Err(PreonError::binding(
                inner.describe(),
                "'-' requires an integer operand",
            ));
        }
        Ok(Expr::Neg(Box::new(inner)))
    }

    /// Build a logical negation.
    pub fn not(inner: Expr) -> Result<Expr> {
        if inner.el_type() != ElType::Boolean {
            return Err(PreonError::binding(
                inner.describe(),
                "'not' requires a boolean operand",
            ));
        }
        Ok(Expr::Not(Box::new(inner)))
    }

    /// Build a conditional node: `guard` must be boolean, both branches
    /// must share a type.
    pub fn cond(guard: Expr, then: Expr, otherwise: Expr) -> Result<Expr> {
        if guard.el_type() != ElType::Boolean {
            return Err(PreonError::binding(
                guard.describe(),
                "conditional guard must be boolean",
            ));
        }
        if then.el_type() != otherwise.el_type() {
            return Err(PreonError::binding(
                then.describe(),
                "conditional branches must share a type",
            ));
        }
        Ok(Expr::Cond {
            guard: Box::new(guard),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    /// The static type of this node.
    pub fn el_type(&self) -> ElType {
        match self {
            Expr::Int(_) | Expr::Neg(_) => ElType::Integer,
            Expr::Bool(_) | Expr::Not(_) => ElType::Boolean,
            Expr::Str(_) => ElType::String,
            // Checked non-None at construction.
            Expr::Ref(r) => r.el_type().unwrap_or(ElType::Integer),
            Expr::Binary { op, .. } => {
                if op.is_arithmetic() {
                    ElType::Integer
                } else {
                    ElType::Boolean
                }
            }
            Expr::Cond { then, .. } => then.el_type(),
        }
    }

    /// True iff the subtree contains no references.
    pub fn is_parameterless(&self) -> bool {
        match self {
            Expr::Int(_) | Expr::Bool(_) | Expr::Str(_) => true,
            Expr::Ref(_) => false,
            Expr::Neg(inner) | Expr::Not(inner) => inner.is_parameterless(),
            Expr::Binary { lhs, rhs, .. } => lhs.is_parameterless() && rhs.is_parameterless(),
            Expr::Cond {
                guard,
                then,
                otherwise,
            } => {
                guard.is_parameterless()
                    && then.is_parameterless()
                    && otherwise.is_parameterless()
            }
        }
    }

    /// Evaluate against a resolver.
    pub fn evaluate(&self, resolver: &Resolver) -> Result<Eval> {
        match self {
            Expr::Int(v) => Ok(Eval::Int(*v)),
            Expr::Bool(v) => Ok(Eval::Bool(*v)),
            Expr::Str(v) => Ok(Eval::Str(v.clone())),
            Expr::Ref(r) => {
                let value = r.resolve(resolver)?;
                Eval::from_value(&value, &r.path())
            }
            Expr::Neg(inner) => {
                let v = inner.eval_int(resolver)?;
                Ok(Eval::Int(v.wrapping_neg()))
            }
            Expr::Not(inner) => Ok(Eval::Bool(!inner.eval_bool(resolver)?)),
            Expr::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs, resolver),
            Expr::Cond {
                guard,
                then,
                otherwise,
            } => {
                if guard.eval_bool(resolver)? {
                    then.evaluate(resolver)
                } else {
                    otherwise.evaluate(resolver)
                }
            }
        }
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        resolver: &Resolver,
    ) -> Result<Eval> {
        if op.is_logical() {
            // Short-circuit.
            let l = lhs.eval_bool(resolver)?;
            return match op {
                BinaryOp::And if !l => Ok(Eval::Bool(false)),
                BinaryOp::Or if l => Ok(Eval::Bool(true)),
                _ => Ok(Eval::Bool(rhs.eval_bool(resolver)?)),
            };
        }

        if op.is_arithmetic() {
            let l = lhs.eval_int(resolver)?;
            let r = rhs.eval_int(resolver)?;
            let v = match op {
                BinaryOp::Add => l.wrapping_add(r),
                BinaryOp::Sub => l.wrapping_sub(r),
                BinaryOp::Mul => l.wrapping_mul(r),
                BinaryOp::Div => {
                    if r == 0 {
                        return Err(PreonError::decoding(
                            self.describe(),
                            0,
                            "division by zero",
                        ));
                    }
                    l.wrapping_div(r)
                }
                BinaryOp::Rem => {
                    if r == 0 {
                        return Err(PreonError::decoding(
                            self.describe(),
                            0,
                            "division by zero",
                        ));
                    }
                    l.wrapping_rem(r)
                }
                BinaryOp::Pow => {
                    let exp = u32::try_from(r).map_err(|_| {
                        PreonError::decoding(
                            self.describe(),
                            0,
                            format!("exponent {r} out of range"),
                        )
                    })?;
                    l.wrapping_pow(exp)
                }
                _ => unreachable!(),
            };
            return Ok(Eval::Int(v));
        }

        // Comparison: operand types matched at construction.
        let l = lhs.evaluate(resolver)?;
        let r = rhs.evaluate(resolver)?;
        let result = match (l, r) {
            (Eval::Int(a), Eval::Int(b)) => compare(op, a.cmp(&b)),
            (Eval::Str(a), Eval::Str(b)) => compare(op, a.as_str().cmp(b.as_str())),
            (a, b) => {
                return Err(PreonError::decoding(
                    self.describe(),
                    0,
                    format!("cannot compare {a:?} with {b:?}"),
                ))
            }
        };
        Ok(Eval::Bool(result))
    }

    /// Evaluate, requiring an integer result.
    pub fn eval_int(&self, resolver: &Resolver) -> Result<i64> {
        match self.evaluate(resolver)? {
            Eval::Int(v) => Ok(v),
            other => Err(PreonError::decoding(
                self.describe(),
                0,
                format!("expected integer, got {other:?}"),
            )),
        }
    }

    /// Evaluate, requiring a boolean result.
    pub fn eval_bool(&self, resolver: &Resolver) -> Result<bool> {
        match self.evaluate(resolver)? {
            Eval::Bool(v) => Ok(v),
            other => Err(PreonError::decoding(
                self.describe(),
                0,
                format!("expected boolean, got {other:?}"),
            )),
        }
    }

    /// Constant-fold: a parameterless subtree collapses to its literal.
    ///
    /// Subtrees that fail to evaluate (division by zero) are left as-is
    /// so the error surfaces at run time with field context.
    pub fn fold(self) -> Expr {
        if self.is_parameterless() {
            let empty = Resolver::root();
            if let Ok(eval) = self.evaluate(&empty) {
                return match eval {
                    Eval::Int(v) => Expr::Int(v),
                    Eval::Bool(v) => Expr::Bool(v),
                    Eval::Str(v) => Expr::Str(v),
                };
            }
            return self;
        }
        match self {
            Expr::Neg(inner) => Expr::Neg(Box::new(inner.fold())),
            Expr::Not(inner) => Expr::Not(Box::new(inner.fold())),
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op,
                lhs: Box::new(lhs.fold()),
                rhs: Box::new(rhs.fold()),
            },
            Expr::Cond {
                guard,
                then,
                otherwise,
            } => Expr::Cond {
                guard: Box::new(guard.fold()),
                then: Box::new(then.fold()),
                otherwise: Box::new(otherwise.fold()),
            },
            other => other,
        }
    }

    /// Re-root every reference one containment step up (see
    /// [`Reference::rescope`]).
    pub fn rescope(&self, field: &str) -> Expr {
        match self {
            Expr::Ref(r) => Expr::Ref(r.rescope(field)),
            Expr::Neg(inner) => Expr::Neg(Box::new(inner.rescope(field))),
            Expr::Not(inner) => Expr::Not(Box::new(inner.rescope(field))),
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op: *op,
                lhs: Box::new(lhs.rescope(field)),
                rhs: Box::new(rhs.rescope(field)),
            },
            Expr::Cond {
                guard,
                then,
                otherwise,
            } => Expr::Cond {
                guard: Box::new(guard.rescope(field)),
                then: Box::new(then.rescope(field)),
                otherwise: Box::new(otherwise.rescope(field)),
            },
            other => other.clone(),
        }
    }

    /// Collect every reference in the subtree, in evaluation order.
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            Expr::Ref(r) => out.push(r),
            Expr::Neg(inner) | Expr::Not(inner) => inner.collect_references(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_references(out);
                rhs.collect_references(out);
            }
            Expr::Cond {
                guard,
                then,
                otherwise,
            } => {
                guard.collect_references(out);
                then.collect_references(out);
                otherwise.collect_references(out);
            }
            _ => {}
        }
    }

    /// Render a stable human-readable form, e.g. `((n plus 1) times 8)`.
    pub fn describe(&self) -> String {
        match self {
            Expr::Int(v) => v.to_string(),
            Expr::Bool(v) => v.to_string(),
            Expr::Str(v) => format!("\"{v}\""),
            Expr::Ref(r) => r.path(),
            Expr::Neg(inner) => format!("(-{})", inner.describe()),
            Expr::Not(inner) => format!("(not {})", inner.describe()),
            Expr::Binary { op, lhs, rhs } => {
                format!("({} {} {})", lhs.describe(), op.word(), rhs.describe())
            }
            Expr::Cond {
                guard,
                then,
                otherwise,
            } => format!(
                "(if {} then {} else {})",
                guard.describe(),
                then.describe(),
                otherwise.describe()
            ),
        }
    }
}

fn compare(op: BinaryOp, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        BinaryOp::Lt => ordering == Less,
        BinaryOp::Le => ordering != Greater,
        BinaryOp::Gt => ordering == Greater,
        BinaryOp::Ge => ordering != Less,
        BinaryOp::Eq => ordering == Equal,
        BinaryOp::Ne => ordering != Equal,
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> Expr {
        Expr::Int(v)
    }

    #[test]
    fn test_arithmetic_typing() {
        let e = Expr::binary(BinaryOp::Add, int(1), int(2)).unwrap();
        assert_eq!(e.el_type(), ElType::Integer);

        let err = Expr::binary(BinaryOp::Add, int(1), Expr::Bool(true)).unwrap_err();
        assert!(matches!(err, PreonError::Binding { .. }));
    }

    #[test]
    fn test_comparison_typing() {
        let e = Expr::binary(BinaryOp::Lt, int(1), int(2)).unwrap();
        assert_eq!(e.el_type(), ElType::Boolean);

        let strings = Expr::binary(
            BinaryOp::Eq,
            Expr::Str("a".to_string()),
            Expr::Str("b".to_string()),
        )
        .unwrap();
        assert_eq!(strings.el_type(), ElType::Boolean);

        assert!(Expr::binary(BinaryOp::Lt, int(1), Expr::Str("a".to_string())).is_err());
        assert!(Expr::binary(BinaryOp::Eq, Expr::Bool(true), Expr::Bool(true)).is_err());
    }

    #[test]
    fn test_logical_typing() {
        assert!(Expr::binary(BinaryOp::And, Expr::Bool(true), Expr::Bool(false)).is_ok());
        assert!(Expr::binary(BinaryOp::And, int(1), Expr::Bool(false)).is_err());
        assert!(Expr::not(Expr::Bool(true)).is_ok());
        assert!(Expr::not(int(1)).is_err());
        assert!(Expr::neg(int(1)).is_ok());
        assert!(Expr::neg(Expr::Bool(true)).is_err());
    }

    #[test]
    fn test_evaluate_arithmetic() {
        let resolver = Resolver::root();
        let e = Expr::binary(
            BinaryOp::Mul,
            Expr::binary(BinaryOp::Add, int(2), int(3)).unwrap(),
            int(8),
        )
        .unwrap();
        assert_eq!(e.evaluate(&resolver).unwrap(), Eval::Int(40));
    }

    #[test]
    fn test_evaluate_division_and_modulo() {
        let resolver = Resolver::root();
        let div = Expr::binary(BinaryOp::Div, int(7), int(2)).unwrap();
        assert_eq!(div.evaluate(&resolver).unwrap(), Eval::Int(3));
        let rem = Expr::binary(BinaryOp::Rem, int(7), int(2)).unwrap();
        assert_eq!(rem.evaluate(&resolver).unwrap(), Eval::Int(1));
    }

    #[test]
    fn test_division_by_zero() {
        let resolver = Resolver::root();
        let e = Expr::binary(BinaryOp::Div, int(1), int(0)).unwrap();
        assert!(matches!(
            e.evaluate(&resolver).unwrap_err(),
            PreonError::Decoding { .. }
        ));
    }

    #[test]
    fn test_overflow_wraps() {
        let resolver = Resolver::root();
        let e = Expr::binary(BinaryOp::Add, int(i64::MAX), int(1)).unwrap();
        assert_eq!(e.evaluate(&resolver).unwrap(), Eval::Int(i64::MIN));
    }

    #[test]
    fn test_power() {
        let resolver = Resolver::root();
        let e = Expr::binary(BinaryOp::Pow, int(2), int(10)).unwrap();
        assert_eq!(e.evaluate(&resolver).unwrap(), Eval::Int(1024));

        let negative = Expr::binary(BinaryOp::Pow, int(2), int(-1)).unwrap();
        assert!(negative.evaluate(&resolver).is_err());
    }

    #[test]
    fn test_string_comparison_lexicographic() {
        let resolver = Resolver::root();
        let e = Expr::binary(
            BinaryOp::Lt,
            Expr::Str("apple".to_string()),
            Expr::Str("banana".to_string()),
        )
        .unwrap();
        assert_eq!(e.evaluate(&resolver).unwrap(), Eval::Bool(true));
    }

    #[test]
    fn test_short_circuit() {
        // Division by zero on the right side never evaluates.
        let resolver = Resolver::root();
        let poison = Expr::binary(
            BinaryOp::Eq,
            Expr::binary(BinaryOp::Div, int(1), int(0)).unwrap(),
            int(1),
        )
        .unwrap();

        let and = Expr::binary(BinaryOp::And, Expr::Bool(false), poison.clone()).unwrap();
        assert_eq!(and.evaluate(&resolver).unwrap(), Eval::Bool(false));

        let or = Expr::binary(BinaryOp::Or, Expr::Bool(true), poison).unwrap();
        assert_eq!(or.evaluate(&resolver).unwrap(), Eval::Bool(true));
    }

    #[test]
    fn test_neg_wraps() {
        let resolver = Resolver::root();
        let e = Expr::neg(int(i64::MIN)).unwrap();
        assert_eq!(e.evaluate(&resolver).unwrap(), Eval::Int(i64::MIN));
    }

    #[test]
    fn test_is_parameterless() {
        let e = Expr::binary(BinaryOp::Add, int(1), int(2)).unwrap();
        assert!(e.is_parameterless());
    }

    #[test]
    fn test_fold_collapses_constants() {
        let e = Expr::binary(
            BinaryOp::Mul,
            Expr::binary(BinaryOp::Add, int(2), int(3)).unwrap(),
            int(8),
        )
        .unwrap();
        assert_eq!(e.fold(), Expr::Int(40));
    }

    #[test]
    fn test_fold_keeps_failing_subtree() {
        let e = Expr::binary(BinaryOp::Div, int(1), int(0)).unwrap();
        let folded = e.clone().fold();
        assert_eq!(folded, e);
    }

    #[test]
    fn test_cond() {
        let resolver = Resolver::root();
        let e = Expr::cond(Expr::Bool(true), int(8), int(0)).unwrap();
        assert_eq!(e.evaluate(&resolver).unwrap(), Eval::Int(8));
        assert_eq!(e.el_type(), ElType::Integer);

        assert!(Expr::cond(int(1), int(8), int(0)).is_err());
        assert!(Expr::cond(Expr::Bool(true), int(8), Expr::Bool(false)).is_err());
    }

    #[test]
    fn test_describe_stable_grammar() {
        let e = Expr::binary(
            BinaryOp::Mul,
            Expr::binary(BinaryOp::Add, int(1), int(2)).unwrap(),
            int(8),
        )
        .unwrap();
        assert_eq!(e.describe(), "((1 plus 2) times 8)");

        let cmp = Expr::binary(BinaryOp::Ne, int(1), int(2)).unwrap();
        assert_eq!(cmp.describe(), "(1 does not equal 2)");

        let not = Expr::not(Expr::Bool(false)).unwrap();
        assert_eq!(not.describe(), "(not false)");
    }
}
