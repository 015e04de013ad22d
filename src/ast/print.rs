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

//! Render trees back to source text that the parser accepts.
//!
//! Parentheses are inserted from operator precedence, so a tree that was
//! built by a rewriting pass (and never had explicit `Paren` nodes) still
//! renders to text that parses with the same structure. Rendering the
//! re-parsed tree yields the same text again.

use std::fmt::{self, Write};

use super::{BinOp, FnDef, Literal, Module, Node, Param, TypeAnn, UnaryOp};

const INDENT: &str = "    ";

const PREC_CMP: u8 = 1;
const PREC_UNARY: u8 = 4;
const PREC_POW: u8 = 5;
const PREC_ATOM: u8 = 6;

/// Render a module to parseable source text.
pub fn render(module: &Module) -> String {
    let mut out = String::new();
    for (idx, item) in module.items.iter().enumerate() {
        if idx > 0 && matches!(item, Node::FnDef(_)) {
            out.push('\n');
        }
        write_stmt(item, 0, &mut out);
    }
    out
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        if self.is_expr() {
            write_expr(self, &mut out);
        } else {
            write_stmt(self, 0, &mut out);
        }
        f.write_str(out.trim_end())
    }
}

fn binop_prec(op: BinOp) -> u8 {
    match op {
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => PREC_CMP,
        BinOp::Add | BinOp::Sub => 2,
        BinOp::Mul | BinOp::Div | BinOp::Rem => 3,
        BinOp::Pow => PREC_POW,
    }
}

fn prec(node: &Node) -> u8 {
    match node {
        Node::Binary { op, .. } => binop_prec(*op),
        Node::Unary { .. } => PREC_UNARY,
        _ => PREC_ATOM,
    }
}

fn write_wrapped(node: &Node, wrap: bool, out: &mut String) {
    if wrap {
        out.push('(');
        write_expr(node, out);
        out.push(')');
    } else {
        write_expr(node, out);
    }
}

fn write_expr(node: &Node, out: &mut String) {
    match node {
        Node::Lit(Literal::Num(n), _) => {
            if n.is_sign_negative() {
                write!(out, "({n})").expect("write to string cannot fail");
            } else {
                write!(out, "{n}").expect("write to string cannot fail");
            }
        }
        Node::Lit(Literal::Bool(b), _) => {
            write!(out, "{b}").expect("write to string cannot fail");
        }
        Node::Lit(Literal::Ident(name), _) => out.push_str(name),
        Node::Binary {
            op, left, right, ..
        } => {
            let p = binop_prec(*op);
            let (wrap_left, wrap_right) = match op {
                BinOp::Pow => (prec(left) < PREC_ATOM, prec(right) < PREC_UNARY),
                _ if op.is_comparison() => (prec(left) <= p, prec(right) <= p),
                _ => (prec(left) < p, prec(right) <= p),
            };
            write_wrapped(left, wrap_left, out);
            write!(out, " {} ", op.symbol()).expect("write to string cannot fail");
            write_wrapped(right, wrap_right, out);
        }
        Node::Unary {
            op: UnaryOp::Neg,
            operand,
            ..
        } => {
            out.push('-');
            write_wrapped(operand, prec(operand) < PREC_UNARY, out);
        }
        Node::Paren(inner, _) => write_wrapped(inner, true, out),
        Node::Call {
            callee,
            args,
            kwargs,
            ..
        } => {
            write_wrapped(callee, prec(callee) < PREC_ATOM, out);
            out.push('(');
            let mut first = true;
            for arg in args {
                if !first {
                    out.push_str(", ");
                }
                first = false;
                write_expr(arg, out);
            }
            for kw in kwargs {
                if !first {
                    out.push_str(", ");
                }
                first = false;
                write!(out, "{} = ", kw.name).expect("write to string cannot fail");
                write_expr(&kw.value, out);
            }
            out.push(')');
        }
        // Statements never appear in expression position.
        other => write_stmt(other, 0, out),
    }
}

fn write_block(body: &[Node], depth: usize, out: &mut String) {
    out.push_str("{\n");
    for stmt in body {
        write_stmt(stmt, depth + 1, out);
    }
    push_indent(depth, out);
    out.push('}');
}

fn push_indent(depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn write_ann(ann: &TypeAnn, out: &mut String) {
    match ann {
        TypeAnn::Named(name) => out.push_str(name),
    }
}

fn write_param(param: &Param, out: &mut String) {
    out.push_str(&param.name);
    if let Some(ann) = &param.ann {
        out.push_str(": ");
        write_ann(ann, out);
    }
}

fn write_fn_def(def: &FnDef, depth: usize, out: &mut String) {
    for attr in &def.attrs {
        push_indent(depth, out);
        writeln!(out, "#[{attr}]").expect("write to string cannot fail");
    }
    push_indent(depth, out);
    write!(out, "fn {}(", def.name).expect("write to string cannot fail");
    for (idx, param) in def.params.iter().enumerate() {
        if idx > 0 {
            out.push_str(", ");
        }
        write_param(param, out);
    }
    out.push_str(") ");
    if let Some(ret) = &def.ret {
        out.push_str("-> ");
        write_ann(ret, out);
        out.push(' ');
    }
    write_block(&def.body, depth, out);
    out.push('\n');
}

fn write_stmt(node: &Node, depth: usize, out: &mut String) {
    match node {
        Node::Let { name, value, .. } => {
            push_indent(depth, out);
            write!(out, "let {name} = ").expect("write to string cannot fail");
            write_expr(value, out);
            out.push_str(";\n");
        }
        Node::Assign { name, value, .. } => {
            push_indent(depth, out);
            write!(out, "{name} = ").expect("write to string cannot fail");
            write_expr(value, out);
            out.push_str(";\n");
        }
        Node::Return { value, .. } => {
            push_indent(depth, out);
            out.push_str("return");
            if let Some(value) = value {
                out.push(' ');
                write_expr(value, out);
            }
            out.push_str(";\n");
        }
        Node::If {
            cond,
            then_body,
            else_body,
            ..
        } => {
            push_indent(depth, out);
            out.push_str("if ");
            write_expr(cond, out);
            out.push(' ');
            write_block(then_body, depth, out);
            if let Some(else_body) = else_body {
                out.push_str(" else ");
                write_block(else_body, depth, out);
            }
            out.push('\n');
        }
        Node::For {
            var,
            start,
            end,
            body,
            ..
        } => {
            push_indent(depth, out);
            write!(out, "for {var} in ").expect("write to string cannot fail");
            write_wrapped(start, prec(start) <= PREC_CMP, out);
            out.push_str("..");
            write_wrapped(end, prec(end) <= PREC_CMP, out);
            out.push(' ');
            write_block(body, depth, out);
            out.push('\n');
        }
        Node::FnDef(def) => write_fn_def(def, depth, out),
        expr => {
            push_indent(depth, out);
            write_expr(expr, out);
            out.push_str(";\n");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;

    fn num(n: f64) -> Node {
        Node::Lit(Literal::Num(n), Span::default())
    }

    fn bin(op: BinOp, l: Node, r: Node) -> Node {
        Node::Binary {
            op,
            left: Box::new(l),
            right: Box::new(r),
            span: Span::default(),
        }
    }

    #[test]
    fn inserts_parens_from_precedence() {
        let x = Node::ident("x", Span::default());
        let e = bin(BinOp::Mul, num(2.0), bin(BinOp::Add, x.clone(), num(1.0)));
        assert_eq!(e.to_string(), "2 * (x + 1)");

        let e = bin(BinOp::Sub, num(5.0), bin(BinOp::Sub, x.clone(), num(1.0)));
        assert_eq!(e.to_string(), "5 - (x - 1)");

        let e = bin(BinOp::Pow, bin(BinOp::Pow, x.clone(), num(2.0)), num(3.0));
        assert_eq!(e.to_string(), "(x ** 2) ** 3");
    }

    #[test]
    fn negative_literals_are_parenthesized() {
        let e = bin(BinOp::Pow, num(-3.0), num(2.0));
        assert_eq!(e.to_string(), "(-3) ** 2");
    }
}
