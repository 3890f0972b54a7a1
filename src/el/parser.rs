// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Expression parser using Pest.
//!
//! Parsing produces a typed [`Expr`]; identifiers are resolved statically
//! against a [`ReferenceContext`], so an expression that survives parsing
//! is guaranteed well-typed and fully resolvable.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::core::{PreonError, Result};

use super::ast::{BinaryOp, ElType, Expr};
use super::reference::{Reference, ReferenceContext};

/// Pest parser for the expression language.
#[derive(Parser)]
#[grammar = "el/el.pest"] // Path relative to src/ directory
struct ElParser;

/// Parse an expression against a reference context.
pub fn parse(source: &str, ctx: &ReferenceContext) -> Result<Expr> {
    let mut pairs = ElParser::parse(Rule::expression, source)
        .map_err(|e| PreonError::parse(source, e.to_string()))?;
    let expression = pairs
        .next()
        .ok_or_else(|| PreonError::parse(source, "empty parse"))?;
    let or_expr = expression
        .into_inner()
        .next()
        .ok_or_else(|| PreonError::parse(source, "empty expression"))?;
    build_or(or_expr, ctx)
}

/// Parse an expression and require a specific static type.
pub fn parse_typed(source: &str, ctx: &ReferenceContext, expected: ElType) -> Result<Expr> {
    let expr = parse(source, ctx)?;
    if expr.el_type() != expected {
        return Err(PreonError::binding(
            source,
            format!("expected {expected} expression, got {}", expr.el_type()),
        ));
    }
    Ok(expr)
}

fn build_or(pair: Pair<Rule>, ctx: &ReferenceContext) -> Result<Expr> {
    let mut inner = pair.into_inner().filter(|p| p.as_rule() != Rule::or_kw);
    let first = inner
        .next()
        .ok_or_else(|| PreonError::parse("expression", "empty or-expression"))?;
    let mut expr = build_and(first, ctx)?;
    for operand in inner {
        expr = Expr::binary(BinaryOp::Or, expr, build_and(operand, ctx)?)?;
    }
    Ok(expr)
}

fn build_and(pair: Pair<Rule>, ctx: &ReferenceContext) -> Result<Expr> {
    let mut inner = pair.into_inner().filter(|p| p.as_rule() != Rule::and_kw);
    let first = inner
        .next()
        .ok_or_else(|| PreonError::parse("expression", "empty and-expression"))?;
    let mut expr = build_rel(first, ctx)?;
    for operand in inner {
        expr = Expr::binary(BinaryOp::And, expr, build_rel(operand, ctx)?)?;
    }
    Ok(expr)
}

fn build_rel(pair: Pair<Rule>, ctx: &ReferenceContext) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let first = inner
        .next()
        .ok_or_else(|| PreonError::parse("expression", "empty comparison"))?;
    let lhs = build_sum(first, ctx)?;
    match inner.next() {
        None => Ok(lhs),
        Some(op_pair) => {
            let op = match op_pair.as_str() {
                "<" => BinaryOp::Lt,
                "<=" => BinaryOp::Le,
                ">" => BinaryOp::Gt,
                ">=" => BinaryOp::Ge,
                "==" => BinaryOp::Eq,
                "!=" => BinaryOp::Ne,
                other => {
                    return Err(PreonError::parse(
                        "expression",
                        format!("unknown comparison operator '{other}'"),
                    ))
                }
            };
            let rhs_pair = inner.next().ok_or_else(|| {
                PreonError::parse("expression", "comparison missing right operand")
            })?;
            Expr::binary(op, lhs, build_sum(rhs_pair, ctx)?)
        }
    }
}

fn build_sum(pair: Pair<Rule>, ctx: &ReferenceContext) -> Result<Expr> {
    build_chain(pair, ctx, build_product, |op| match op {
        "+" => Some(BinaryOp::Add),
        "-" => Some(BinaryOp::Sub),
        _ => None,
    })
}

fn build_product(pair: Pair<Rule>, ctx: &ReferenceContext) -> Result<Expr> {
    build_chain(pair, ctx, build_power, |op| match op {
        "*" => Some(BinaryOp::Mul),
        "/" => Some(BinaryOp::Div),
        "%" => Some(BinaryOp::Rem),
        _ => None,
    })
}

/// Left-fold an operand (op operand)* sequence.
fn build_chain(
    pair: Pair<Rule>,
    ctx: &ReferenceContext,
    build_operand: fn(Pair<Rule>, &ReferenceContext) -> Result<Expr>,
    to_op: fn(&str) -> Option<BinaryOp>,
) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let first = inner
        .next()
        .ok_or_else(|| PreonError::parse("expression", "empty operand chain"))?;
    let mut expr = build_operand(first, ctx)?;
    while let Some(op_pair) = inner.next() {
        let op = to_op(op_pair.as_str()).ok_or_else(|| {
            PreonError::parse(
                "expression",
                format!("unknown operator '{}'", op_pair.as_str()),
            )
        })?;
        let operand = inner.next().ok_or_else(|| {
            PreonError::parse("expression", "operator missing right operand")
        })?;
        expr = Expr::binary(op, expr, build_operand(operand, ctx)?)?;
    }
    Ok(expr)
}

fn build_power(pair: Pair<Rule>, ctx: &ReferenceContext) -> Result<Expr> {
    let operands: Vec<Expr> = pair
        .into_inner()
        .map(|p| build_unary(p, ctx))
        .collect::<Result<_>>()?;
    // Right-associative fold.
    let mut iter = operands.into_iter().rev();
    let mut expr = iter
        .next()
        .ok_or_else(|| PreonError::parse("expression", "empty power chain"))?;
    for lhs in iter {
        expr = Expr::binary(BinaryOp::Pow, lhs, expr)?;
    }
    Ok(expr)
}

fn build_unary(pair: Pair<Rule>, ctx: &ReferenceContext) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let first = inner
        .next()
        .ok_or_else(|| PreonError::parse("expression", "empty unary expression"))?;
    match first.as_rule() {
        Rule::neg_op => {
            let operand = inner.next().ok_or_else(|| {
                PreonError::parse("expression", "'-' missing operand")
            })?;
            Expr::neg(build_unary(operand, ctx)?)
        }
        Rule::not_kw => {
            let operand = inner.next().ok_or_else(|| {
                PreonError::parse("expression", "'not' missing operand")
            })?;
            Expr::not(build_unary(operand, ctx)?)
        }
        Rule::postfix => build_postfix(first, ctx),
        other => Err(PreonError::parse(
            "expression",
            format!("unexpected rule {other:?} in unary expression"),
        )),
    }
}

fn build_postfix(pair: Pair<Rule>, ctx: &ReferenceContext) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let primary = inner
        .next()
        .ok_or_else(|| PreonError::parse("expression", "empty postfix expression"))?;
    let head = primary
        .into_inner()
        .next()
        .ok_or_else(|| PreonError::parse("expression", "empty primary expression"))?;

    match head.as_rule() {
        Rule::reference => {
            let mut reference = build_reference(head, ctx)?;
            for selector in inner {
                reference = match selector.as_rule() {
                    Rule::attr_sel => {
                        let name = selector.into_inner().next().ok_or_else(|| {
                            PreonError::parse("expression", "selector missing name")
                        })?;
                        reference.select_attribute(ctx.schema(), name.as_str())?
                    }
                    Rule::index_sel => {
                        let index_pair = selector.into_inner().next().ok_or_else(|| {
                            PreonError::parse("expression", "index missing expression")
                        })?;
                        reference.select_item(build_or(index_pair, ctx)?)?
                    }
                    other => {
                        return Err(PreonError::parse(
                            "expression",
                            format!("unexpected selector {other:?}"),
                        ))
                    }
                };
            }
            Expr::reference(reference)
        }
        Rule::literal => {
            if inner.next().is_some() {
                return Err(PreonError::parse(
                    "expression",
                    "selection on a literal value",
                ));
            }
            build_literal(head)
        }
        Rule::or_expr => {
            if inner.next().is_some() {
                return Err(PreonError::parse(
                    "expression",
                    "selection on a parenthesised expression",
                ));
            }
            build_or(head, ctx)
        }
        other => Err(PreonError::parse(
            "expression",
            format!("unexpected rule {other:?} in primary expression"),
        )),
    }
}

fn build_reference(pair: Pair<Rule>, ctx: &ReferenceContext) -> Result<Reference> {
    let mut outers = 0;
    let mut name = None;
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::outer_kw => outers += 1,
            Rule::ident => name = Some(part.as_str().to_string()),
            _ => {}
        }
    }
    let name =
        name.ok_or_else(|| PreonError::parse("expression", "reference missing identifier"))?;
    Reference::new(ctx, outers, &name)
}

fn build_literal(pair: Pair<Rule>) -> Result<Expr> {
    let lit = pair
        .into_inner()
        .next()
        .ok_or_else(|| PreonError::parse("expression", "empty literal"))?;
    let text = lit.as_str();
    match lit.as_rule() {
        Rule::dec_int => {
            // Out-of-range literals wrap, consistent with evaluation.
            let v = text
                .parse::<u64>()
                .map_err(|e| PreonError::parse(text, e.to_string()))?;
            Ok(Expr::Int(v as i64))
        }
        Rule::hex_int => {
            let v = u64::from_str_radix(&text[2..], 16)
                .map_err(|e| PreonError::parse(text, e.to_string()))?;
            Ok(Expr::Int(v as i64))
        }
        Rule::bool_lit => Ok(Expr::Bool(text == "true")),
        Rule::char_lit => {
            let c = text
                .chars()
                .nth(1)
                .ok_or_else(|| PreonError::parse(text, "empty character literal"))?;
            Ok(Expr::Int(c as i64))
        }
        Rule::string_lit => Ok(Expr::Str(text[1..text.len() - 1].to_string())),
        other => Err(PreonError::parse(
            "expression",
            format!("unexpected literal rule {other:?}"),
        )),
    }
}
