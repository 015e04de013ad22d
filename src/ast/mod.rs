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

mod print;

pub use print::render;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    start: usize,
    end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Num(f64),
    Bool(bool),
    Ident(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Pow => "**",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
}

/// Type annotation on a parameter or return position. Annotations are kept
/// for rendering only; evaluation ignores them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeAnn {
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ann: Option<TypeAnn>,
    pub span: Span,
}

/// `name = value` argument of a call.
#[derive(Debug, Clone, PartialEq)]
pub struct KwArg {
    pub name: String,
    pub value: Node,
}

/// `#[attr] fn name(params) -> ret { body }`
#[derive(Debug, Clone, PartialEq)]
pub struct FnDef {
    pub name: String,
    pub attrs: Vec<String>,
    pub params: Vec<Param>,
    pub ret: Option<TypeAnn>,
    pub body: Vec<Node>,
    pub span: Span,
}

impl FnDef {
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a == name)
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Lit(Literal, Span),
    Binary {
        op: BinOp,
        left: Box<Node>,
        right: Box<Node>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
        span: Span,
    },
    Paren(Box<Node>, Span),
    Call {
        callee: Box<Node>,
        args: Vec<Node>,
        kwargs: Vec<KwArg>,
        span: Span,
    },
    Let {
        name: String,
        value: Box<Node>,
        span: Span,
    },
    Assign {
        name: String,
        value: Box<Node>,
        span: Span,
    },
    Return {
        value: Option<Box<Node>>,
        span: Span,
    },
    If {
        cond: Box<Node>,
        then_body: Vec<Node>,
        else_body: Option<Vec<Node>>,
        span: Span,
    },
    /// `for var in start..end { body }`
    For {
        var: String,
        start: Box<Node>,
        end: Box<Node>,
        body: Vec<Node>,
        span: Span,
    },
    FnDef(FnDef),
}

impl Node {
    pub fn ident(name: impl Into<String>, span: Span) -> Node {
        Node::Lit(Literal::Ident(name.into()), span)
    }

    pub fn span(&self) -> Span {
        match self {
            Node::Lit(_, span)
            | Node::Binary { span, .. }
            | Node::Unary { span, .. }
            | Node::Paren(_, span)
            | Node::Call { span, .. }
            | Node::Let { span, .. }
            | Node::Assign { span, .. }
            | Node::Return { span, .. }
            | Node::If { span, .. }
            | Node::For { span, .. } => *span,
            Node::FnDef(def) => def.span,
        }
    }

    pub fn span_start(&self) -> usize {
        self.span().start()
    }

    pub fn span_end(&self) -> usize {
        self.span().end()
    }

    /// Whether the node produces a value (as opposed to a statement).
    pub fn is_expr(&self) -> bool {
        matches!(
            self,
            Node::Lit(..)
                | Node::Binary { .. }
                | Node::Unary { .. }
                | Node::Paren(..)
                | Node::Call { .. }
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub items: Vec<Node>,
}

impl Module {
    /// Function definitions at the top level, in source order.
    pub fn functions(&self) -> impl Iterator<Item = &FnDef> {
        self.items.iter().filter_map(|item| match item {
            Node::FnDef(def) => Some(def),
            _ => None,
        })
    }
}
