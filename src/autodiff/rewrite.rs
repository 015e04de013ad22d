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

//! Tree rewriting passes.
//!
//! Both passes take a module by reference and build a new one; the input is
//! never modified.

use crate::ast::{FnDef, KwArg, Module, Node, Param};

/// Prefix given to every detached top-level function.
pub const DETACHED_PREFIX: &str = "__dual_";

/// Name the dispatcher is bound under in the evaluation scope.
pub const CHAIN: &str = "__chain";

pub fn detached_name(name: &str) -> String {
    format!("{DETACHED_PREFIX}{name}")
}

/// Rename every top-level function to its detached name and drop its
/// attributes and annotations. Parameter names and bodies are kept.
pub fn detach(module: &Module) -> Module {
    let items = module
        .items
        .iter()
        .map(|item| match item {
            Node::FnDef(def) => Node::FnDef(FnDef {
                name: detached_name(&def.name),
                attrs: Vec::new(),
                params: def
                    .params
                    .iter()
                    .map(|p| Param {
                        name: p.name.clone(),
                        ann: None,
                        span: p.span,
                    })
                    .collect(),
                ret: None,
                body: def.body.clone(),
                span: def.span,
            }),
            other => other.clone(),
        })
        .collect();
    Module { items }
}

/// Route every call `f(a, k = v)` through the dispatcher as
/// `__chain(f, A, k = v)`, where `A` is `a` rewritten. Loop bodies are
/// copied untouched.
pub fn differentiate_calls(module: &Module) -> Module {
    Module {
        items: module.items.iter().map(rewrite_stmt).collect(),
    }
}

fn rewrite_block(body: &[Node]) -> Vec<Node> {
    body.iter().map(rewrite_stmt).collect()
}

fn rewrite_stmt(node: &Node) -> Node {
    match node {
        Node::Let { name, value, span } => Node::Let {
            name: name.clone(),
            value: Box::new(rewrite_expr(value)),
            span: *span,
        },
        Node::Assign { name, value, span } => Node::Assign {
            name: name.clone(),
            value: Box::new(rewrite_expr(value)),
            span: *span,
        },
        Node::Return { value, span } => Node::Return {
            value: value.as_deref().map(|v| Box::new(rewrite_expr(v))),
            span: *span,
        },
        Node::If {
            cond,
            then_body,
            else_body,
            span,
        } => Node::If {
            cond: Box::new(rewrite_expr(cond)),
            then_body: rewrite_block(then_body),
            else_body: else_body.as_deref().map(rewrite_block),
            span: *span,
        },
        Node::For { .. } => node.clone(),
        Node::FnDef(def) => Node::FnDef(FnDef {
            body: rewrite_block(&def.body),
            ..def.clone()
        }),
        expr => rewrite_expr(expr),
    }
}

fn rewrite_expr(node: &Node) -> Node {
    match node {
        Node::Call {
            callee,
            args,
            kwargs,
            span,
        } => {
            let mut chained = Vec::with_capacity(args.len() + 1);
            chained.push(callee.as_ref().clone());
            chained.extend(args.iter().map(rewrite_expr));
            Node::Call {
                callee: Box::new(Node::ident(CHAIN, callee.span())),
                args: chained,
                kwargs: kwargs
                    .iter()
                    .map(|kw| KwArg {
                        name: kw.name.clone(),
                        value: kw.value.clone(),
                    })
                    .collect(),
                span: *span,
            }
        }
        Node::Binary {
            op,
            left,
            right,
            span,
        } => Node::Binary {
            op: *op,
            left: Box::new(rewrite_expr(left)),
            right: Box::new(rewrite_expr(right)),
            span: *span,
        },
        Node::Unary { op, operand, span } => Node::Unary {
            op: *op,
            operand: Box::new(rewrite_expr(operand)),
            span: *span,
        },
        Node::Paren(inner, span) => Node::Paren(Box::new(rewrite_expr(inner)), *span),
        other => other.clone(),
    }
}
