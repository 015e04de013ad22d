// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the fwdiff project (forward-mode differentiation by tree rewriting).

//! # Example
//! ```
//! use fwdiff::parser;
//! let module = parser::parse("fn f(x) { return 2 * x; }").unwrap();
//! assert_eq!(module.functions().count(), 1);
//! ```

use std::ops::Range;

use chumsky::prelude::*;

use crate::ast::BinOp;
use crate::ast::FnDef;
use crate::ast::KwArg;
use crate::ast::Literal;
use crate::ast::Module;
use crate::ast::Node;
use crate::ast::Param;
use crate::ast::Span;
use crate::ast::TypeAnn;
use crate::ast::UnaryOp;

use crate::diagnostics::Diagnostic;

const KEYWORDS: [&str; 9] = [
    "fn", "let", "return", "if", "else", "for", "in", "true", "false",
];

fn kw(s: &'static str) -> impl Parser<char, &'static str, Error = Simple<char>> + Clone {
    text::keyword(s).to(s)
}

fn span_of(sp: Range<usize>) -> Span {
    Span::new(sp.start, sp.end)
}

fn identifier() -> impl Parser<char, String, Error = Simple<char>> + Clone {
    text::ident().try_map(|s: String, sp: Range<usize>| {
        if KEYWORDS.contains(&s.as_str()) {
            Err(Simple::custom(
                sp,
                format!("keyword `{s}` cannot be used as a name"),
            ))
        } else {
            Ok(s)
        }
    })
}

fn number() -> impl Parser<char, f64, Error = Simple<char>> + Clone {
    let exponent = one_of("eE")
        .then(one_of("+-").or_not())
        .then(text::digits(10))
        .map(|((e, sign), digits): ((char, Option<char>), String)| {
            let mut out = String::from(e);
            out.extend(sign);
            out.push_str(&digits);
            out
        });

    text::int(10)
        .then(just('.').ignore_then(text::digits(10)).or_not())
        .then(exponent.or_not())
        .then(filter(|c: &char| c.is_alphanumeric() || *c == '_').repeated())
        .try_map(
            |(((int, frac), exp), suffix): (((String, Option<String>), Option<String>), Vec<char>),
             sp: Range<usize>| {
                if !suffix.is_empty() {
                    let suffix: String = suffix.into_iter().collect();
                    return Err(Simple::custom(
                        sp,
                        format!("invalid number literal: unexpected `{suffix}`"),
                    ));
                }
                let mut digits = int;
                if let Some(frac) = frac {
                    digits.push('.');
                    digits.push_str(&frac);
                }
                digits.extend(exp);
                let n = digits
                    .parse::<f64>()
                    .map_err(|e| Simple::custom(sp.clone(), format!("invalid number literal: {e}")))?;
                if n.is_finite() {
                    Ok(n)
                } else {
                    Err(Simple::custom(sp, "number literal is out of range"))
                }
            },
        )
}

enum CallArg {
    Positional(Node),
    Keyword(String, Node),
}

fn binary(op: BinOp, left: Node, right: Node) -> Node {
    let span = Span::new(left.span_start(), right.span_end());
    Node::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
        span,
    }
}

pub fn expr_parser() -> impl Parser<char, Node, Error = Simple<char>> + Clone {
    recursive(|expr| {
        let num = number().map_with_span(|n, sp: Range<usize>| Node::Lit(Literal::Num(n), span_of(sp)));
        let boolean = choice((kw("true").to(true), kw("false").to(false)))
            .map_with_span(|b, sp: Range<usize>| Node::Lit(Literal::Bool(b), span_of(sp)));
        let ident = identifier().map_with_span(|s, sp: Range<usize>| Node::ident(s, span_of(sp)));
        let paren = expr
            .clone()
            .delimited_by(just('('), just(')'))
            .map_with_span(|inner, sp: Range<usize>| Node::Paren(Box::new(inner), span_of(sp)));

        let atom = choice((num, boolean, ident, paren)).padded().boxed();

        let call_arg = choice((
            identifier()
                .padded()
                .then_ignore(just('=').padded())
                .then(expr.clone())
                .map(|(name, value)| CallArg::Keyword(name, value)),
            expr.clone().map(CallArg::Positional),
        ));

        let call_args = call_arg
            .separated_by(just(',').padded())
            .allow_trailing()
            .delimited_by(just('(').padded(), just(')').padded())
            .map_with_span(|args, sp: Range<usize>| (args, sp.end));

        let postfix = atom
            .then(call_args.repeated())
            .foldl(|callee, (call_args, end)| {
                let span = Span::new(callee.span_start(), end);
                let mut args = Vec::new();
                let mut kwargs = Vec::new();
                for arg in call_args {
                    match arg {
                        CallArg::Positional(node) => args.push(node),
                        CallArg::Keyword(name, value) => kwargs.push(KwArg { name, value }),
                    }
                }
                Node::Call {
                    callee: Box::new(callee),
                    args,
                    kwargs,
                    span,
                }
            })
            .boxed();

        // `**` binds tighter than unary minus and associates to the right.
        let unary = recursive(|unary| {
            let power = postfix
                .clone()
                .then(just("**").padded().ignore_then(unary.clone()).or_not())
                .map(|(base, exponent): (Node, Option<Node>)| match exponent {
                    Some(exponent) => binary(BinOp::Pow, base, exponent),
                    None => base,
                });

            just('-')
                .padded()
                .map_with_span(|_, sp: Range<usize>| sp.start)
                .then(unary)
                .map(|(start, operand): (usize, Node)| {
                    let span = Span::new(start, operand.span_end());
                    Node::Unary {
                        op: UnaryOp::Neg,
                        operand: Box::new(operand),
                        span,
                    }
                })
                .or(power)
        })
        .boxed();

        let product = unary
            .clone()
            .then(
                choice((
                    just('*').to(BinOp::Mul),
                    just('/').to(BinOp::Div),
                    just('%').to(BinOp::Rem),
                ))
                .padded()
                .then(unary)
                .repeated(),
            )
            .foldl(|l, (op, r)| binary(op, l, r));

        let sum = product
            .clone()
            .then(
                choice((just('+').to(BinOp::Add), just('-').to(BinOp::Sub)))
                    .padded()
                    .then(product)
                    .repeated(),
            )
            .foldl(|l, (op, r)| binary(op, l, r))
            .boxed();

        let cmp_op = choice((
            just("==").to(BinOp::Eq),
            just("!=").to(BinOp::Ne),
            just("<=").to(BinOp::Le),
            just(">=").to(BinOp::Ge),
            just('<').to(BinOp::Lt),
            just('>').to(BinOp::Gt),
        ))
        .padded();

        sum.clone()
            .then(cmp_op.then(sum).or_not())
            .map(|(l, rhs)| match rhs {
                Some((op, r)) => binary(op, l, r),
                None => l,
            })
    })
}

fn type_ann() -> impl Parser<char, TypeAnn, Error = Simple<char>> + Clone {
    text::ident().map(TypeAnn::Named).padded()
}

pub fn parser() -> impl Parser<char, Module, Error = Simple<char>> {
    let expr = expr_parser();

    let stmt = recursive(|stmt| {
        let block = stmt
            .clone()
            .repeated()
            .delimited_by(just('{').padded(), just('}').padded());

        let let_stmt = kw("let")
            .padded()
            .ignore_then(identifier().padded())
            .then_ignore(just('=').padded())
            .then(expr.clone())
            .map_with_span(|(name, value), sp: Range<usize>| Node::Let {
                name,
                value: Box::new(value),
                span: span_of(sp),
            });

        let assign_stmt = identifier()
            .padded()
            .then_ignore(just('=').padded())
            .then(expr.clone())
            .map_with_span(|(name, value), sp: Range<usize>| Node::Assign {
                name,
                value: Box::new(value),
                span: span_of(sp),
            });

        let return_stmt = kw("return")
            .padded()
            .ignore_then(expr.clone().or_not())
            .map_with_span(|value, sp: Range<usize>| Node::Return {
                value: value.map(Box::new),
                span: span_of(sp),
            });

        let if_stmt = recursive(|if_stmt| {
            kw("if")
                .padded()
                .ignore_then(expr.clone())
                .then(block.clone())
                .then(
                    kw("else")
                        .padded()
                        .ignore_then(block.clone().or(if_stmt.map(|node| vec![node])))
                        .or_not(),
                )
                .map_with_span(
                    |((cond, then_body), else_body), sp: Range<usize>| Node::If {
                        cond: Box::new(cond),
                        then_body,
                        else_body,
                        span: span_of(sp),
                    },
                )
        });

        let for_stmt = kw("for")
            .padded()
            .ignore_then(identifier().padded())
            .then_ignore(kw("in").padded())
            .then(expr.clone())
            .then_ignore(just("..").padded())
            .then(expr.clone())
            .then(block)
            .map_with_span(
                |(((var, start), end), body), sp: Range<usize>| Node::For {
                    var,
                    start: Box::new(start),
                    end: Box::new(end),
                    body,
                    span: span_of(sp),
                },
            );

        // Blocks end themselves; anything else needs `;` unless it closes
        // the enclosing block or the input.
        let terminator = text::whitespace().ignore_then(choice((
            just(';').ignored(),
            just('}').rewind().ignored(),
            end(),
        )));

        let simple = choice((let_stmt, return_stmt, assign_stmt, expr.clone())).then_ignore(terminator);

        choice((if_stmt, for_stmt, simple))
            .padded()
            .then_ignore(just(';').padded().repeated())
    });

    let attr = just("#[")
        .ignore_then(identifier().padded())
        .then_ignore(just(']'))
        .padded();

    let param = identifier()
        .padded()
        .then(just(':').padded().ignore_then(type_ann()).or_not())
        .map_with_span(|(name, ann), sp: Range<usize>| Param {
            name,
            ann,
            span: span_of(sp),
        });

    let param_list = param
        .separated_by(just(',').padded())
        .allow_trailing()
        .delimited_by(just('(').padded(), just(')').padded());

    let fn_body = stmt
        .clone()
        .repeated()
        .delimited_by(just('{').padded(), just('}').padded());

    let fn_def = attr
        .repeated()
        .then_ignore(kw("fn").padded())
        .then(identifier().padded())
        .then(param_list)
        .then(just("->").padded().ignore_then(type_ann()).or_not())
        .then(fn_body)
        .map_with_span(
            |((((attrs, name), params), ret), body), sp: Range<usize>| {
                Node::FnDef(FnDef {
                    name,
                    attrs,
                    params,
                    ret,
                    body,
                    span: span_of(sp),
                })
            },
        );

    choice((fn_def, stmt))
        .padded()
        .repeated()
        .then_ignore(end())
        .map(|items| Module { items })
}

/// Blank out single-line comments (`// ...`). Every byte of a comment
/// becomes a space, so byte offsets into the result are valid in `input`.
fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for line in input.split_inclusive('\n') {
        match line.find("//") {
            Some(idx) => {
                out.push_str(&line[..idx]);
                let rest = &line[idx..];
                let body = rest.strip_suffix('\n').unwrap_or(rest);
                out.extend(std::iter::repeat(' ').take(body.len()));
                if body.len() < rest.len() {
                    out.push('\n');
                }
            }
            None => out.push_str(line),
        }
    }
    out
}

pub fn parse(input: &str) -> Result<Module, Vec<Simple<char>>> {
    let stripped = strip_comments(input);
    parser().parse(stripped.as_str())
}

/// Parse with pretty diagnostics instead of raw chumsky errors.
pub fn parse_with_diagnostics(input: &str) -> Result<Module, Vec<Diagnostic>> {
    let stripped = strip_comments(input);
    parser().parse(stripped.as_str()).map_err(|errs| {
        errs.into_iter()
            .map(|e| Diagnostic::from_chumsky(stripped.as_str(), e))
            .collect()
    })
}
