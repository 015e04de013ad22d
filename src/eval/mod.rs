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

//! Tree-walking interpreter.
//!
//! Arithmetic on plain numbers stays in `f64`. As soon as either operand is
//! a [`Dual`], both operands are lifted and the dual rule is applied, so a
//! body evaluated on boxed inputs carries tangents without any rewriting of
//! its operators.

use std::sync::Arc;

use crate::ast::BinOp;
use crate::ast::FnDef;
use crate::ast::Literal;
use crate::ast::Module;
use crate::ast::Node;
use crate::ast::UnaryOp;
use crate::dual::{self, Dual, DualError};
use crate::stdlib::{self, Elementary};

pub mod value;

pub use value::{Function, FunctionId, NativeCall, NativeFn, Scope, Value};

/// Nesting limit for user function calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("unknown variable: {0}")]
    UnknownVar(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("value is not callable: {0}")]
    NotCallable(String),
    #[error("{name}() takes {expected} argument(s) but {found} were given")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("division by zero")]
    DivZero,
    #[error("math domain error in {op} at {value}")]
    Domain { op: String, value: f64 },
    #[error("{0} is not differentiable")]
    NotDifferentiable(String),
    #[error("unsupported call through the chain rule: {0}")]
    UnsupportedCall(String),
    #[error("cannot differentiate through an exponent (exponent tangent is {0})")]
    NonConstantExponent(f64),
    #[error("cannot differentiate through the divisor of '%' (divisor tangent is {0})")]
    NonConstantDivisor(f64),
    #[error("maximum call depth of {0} exceeded")]
    RecursionLimit(usize),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl From<DualError> for EvalError {
    fn from(err: DualError) -> Self {
        match err {
            DualError::DivisionByZero => EvalError::DivZero,
            DualError::NonConstantExponent { tangent } => EvalError::NonConstantExponent(tangent),
            DualError::NonConstantDivisor { tangent } => EvalError::NonConstantDivisor(tangent),
            DualError::Domain { op, value } => EvalError::Domain {
                op: op.to_string(),
                value,
            },
        }
    }
}

/// Outcome of a statement.
enum Flow {
    Normal(Value),
    Return(Value),
}

pub struct Interpreter {
    depth: usize,
    max_call_depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self {
            depth: 0,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_call_depth(max_call_depth: usize) -> Self {
        Self {
            depth: 0,
            max_call_depth,
        }
    }

    /// Run `f` one call level deeper. Every user call and every chain-rule
    /// dispatch counts as a level.
    pub fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, EvalError>,
    ) -> Result<T, EvalError> {
        if self.depth >= self.max_call_depth {
            return Err(EvalError::RecursionLimit(self.max_call_depth));
        }
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }

    /// Execute every item of `module` in `scope`, returning the value of the
    /// last one.
    pub fn exec_module(&mut self, module: &Module, scope: &mut Scope) -> Result<Value, EvalError> {
        let mut last = Value::Unit;
        for item in &module.items {
            last = self.exec_item(item, scope)?;
        }
        Ok(last)
    }

    /// Execute one top-level item.
    pub fn exec_item(&mut self, item: &Node, scope: &mut Scope) -> Result<Value, EvalError> {
        match self.exec_stmt(item, scope)? {
            Flow::Normal(value) => Ok(value),
            Flow::Return(_) => Err(EvalError::Unsupported(
                "`return` outside of a function".to_string(),
            )),
        }
    }

    fn exec_block(&mut self, body: &[Node], frame: &mut Scope) -> Result<Flow, EvalError> {
        let mut last = Value::Unit;
        for stmt in body {
            match self.exec_stmt(stmt, frame)? {
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal(value) => last = value,
            }
        }
        Ok(Flow::Normal(last))
    }

    fn exec_stmt(&mut self, node: &Node, frame: &mut Scope) -> Result<Flow, EvalError> {
        match node {
            Node::Let { name, value, .. } | Node::Assign { name, value, .. } => {
                let value = self.eval_expr(value, frame)?;
                frame.insert(name.clone(), value);
                Ok(Flow::Normal(Value::Unit))
            }
            Node::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr, frame)?,
                    None => Value::Unit,
                };
                Ok(Flow::Return(value))
            }
            Node::If {
                cond,
                then_body,
                else_body,
                ..
            } => match self.eval_expr(cond, frame)? {
                Value::Bool(true) => self.exec_block(then_body, frame),
                Value::Bool(false) => match else_body {
                    Some(body) => self.exec_block(body, frame),
                    None => Ok(Flow::Normal(Value::Unit)),
                },
                other => Err(EvalError::Type(format!(
                    "condition must be a bool, found {}",
                    other.type_name()
                ))),
            },
            Node::For {
                var,
                start,
                end,
                body,
                ..
            } => {
                let start = loop_bound(self.eval_expr(start, frame)?)?;
                let end = loop_bound(self.eval_expr(end, frame)?)?;
                for i in start..end {
                    frame.insert(var.clone(), Value::Num(i as f64));
                    if let Flow::Return(value) = self.exec_block(body, frame)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal(Value::Unit))
            }
            Node::FnDef(def) => {
                define(def, frame);
                Ok(Flow::Normal(Value::Unit))
            }
            expr => self.eval_expr(expr, frame).map(Flow::Normal),
        }
    }

    pub fn eval_expr(&mut self, node: &Node, scope: &Scope) -> Result<Value, EvalError> {
        match node {
            Node::Lit(Literal::Num(n), _) => Ok(Value::Num(*n)),
            Node::Lit(Literal::Bool(b), _) => Ok(Value::Bool(*b)),
            Node::Lit(Literal::Ident(name), _) => scope
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::UnknownVar(name.clone())),
            Node::Paren(inner, _) => self.eval_expr(inner, scope),
            Node::Unary {
                op: UnaryOp::Neg,
                operand,
                ..
            } => negate(&self.eval_expr(operand, scope)?),
            Node::Binary {
                op, left, right, ..
            } => {
                let l = self.eval_expr(left, scope)?;
                let r = self.eval_expr(right, scope)?;
                binary_op(*op, &l, &r)
            }
            Node::Call {
                callee,
                args,
                kwargs,
                ..
            } => {
                let callee = self.eval_expr(callee, scope)?;
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.eval_expr(arg, scope)?);
                }
                let mut kw_values = Vec::with_capacity(kwargs.len());
                for kw in kwargs {
                    kw_values.push((kw.name.clone(), self.eval_expr(&kw.value, scope)?));
                }
                self.call(&callee, arg_values, kw_values)
            }
            _ => Err(EvalError::Unsupported(
                "statement in expression position".to_string(),
            )),
        }
    }

    pub fn call(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, EvalError> {
        match callee {
            Value::Native(native) => (native.call)(self, args, kwargs),
            Value::Elementary(e) => call_elementary(*e, args, kwargs),
            Value::Function(f) => self.call_function(f, args, kwargs),
            other => Err(EvalError::NotCallable(other.to_string())),
        }
    }

    pub fn call_function(
        &mut self,
        f: &Arc<Function>,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, EvalError> {
        let def = f.definition();
        let found = args.len() + kwargs.len();
        let arity_error = || EvalError::Arity {
            name: def.name.clone(),
            expected: def.arity(),
            found,
        };
        if args.len() > def.arity() {
            return Err(arity_error());
        }

        let mut frame = f.captured().clone();
        frame.insert(def.name.clone(), Value::Function(Arc::clone(f)));

        let positional = args.len();
        for (param, arg) in def.params.iter().zip(args) {
            frame.insert(param.name.clone(), arg);
        }
        let mut bound = positional;
        for (name, value) in kwargs {
            match def.params.iter().position(|p| p.name == name) {
                Some(idx) if idx < positional => {
                    return Err(EvalError::Type(format!(
                        "{}() got multiple values for argument '{name}'",
                        def.name
                    )));
                }
                Some(_) => {
                    frame.insert(name, value);
                    bound += 1;
                }
                None => {
                    return Err(EvalError::Type(format!(
                        "{}() got an unexpected keyword argument '{name}'",
                        def.name
                    )));
                }
            }
        }
        if bound != def.arity() {
            return Err(arity_error());
        }

        tracing::trace!(function = %def.name, depth = self.depth, "call");
        match self.nested(|interp| interp.exec_block(&def.body, &mut frame))? {
            Flow::Normal(value) | Flow::Return(value) => Ok(value),
        }
    }
}

/// Bind `def` as a function value in `scope`, capturing a snapshot of it.
pub fn define(def: &FnDef, scope: &mut Scope) -> Arc<Function> {
    let f = Function::new(def.clone(), scope.clone());
    scope.insert(def.name.clone(), Value::Function(Arc::clone(&f)));
    f
}

fn loop_bound(value: Value) -> Result<i64, EvalError> {
    match value {
        Value::Num(n) if n.is_finite() && n.fract() == 0.0 => Ok(n as i64),
        other => Err(EvalError::Type(format!(
            "loop bounds must be integers, found {other}"
        ))),
    }
}

fn call_elementary(
    e: Elementary,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> Result<Value, EvalError> {
    if !kwargs.is_empty() {
        return Err(EvalError::Type(format!("{e}() takes no keyword arguments")));
    }
    let [arg] = <[Value; 1]>::try_from(args).map_err(|args| EvalError::Arity {
        name: e.name().to_string(),
        expected: 1,
        found: args.len(),
    })?;
    match arg {
        Value::Num(x) => e.apply(x).map(Value::Num).ok_or(EvalError::Domain {
            op: e.name().to_string(),
            value: x,
        }),
        Value::Dual(_) => Err(EvalError::Type(format!(
            "{e}() expects a plain number but got a dual; only rewritten calls apply the chain rule"
        ))),
        other => Err(EvalError::Type(format!(
            "{e}() expects a number, found {}",
            other.type_name()
        ))),
    }
}

fn negate(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Num(n) => Ok(Value::Num(-n)),
        Value::Dual(d) => Ok(Value::Dual(-*d)),
        other => Err(EvalError::Type(format!(
            "bad operand type for unary -: {}",
            other.type_name()
        ))),
    }
}

/// Apply a binary operator, lifting to duals when either side is a dual.
pub fn binary_op(op: BinOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    if op.is_comparison() {
        return compare(op, l, r).map(Value::Bool);
    }
    if let (Value::Num(a), Value::Num(b)) = (l, r) {
        return num_op(op, *a, *b).map(Value::Num);
    }
    match (l.to_dual(), r.to_dual()) {
        (Some(a), Some(b)) => dual_op(op, a, b).map(Value::Dual),
        _ => Err(EvalError::Type(format!(
            "unsupported operand types for {}: {} and {}",
            op.symbol(),
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn num_op(op: BinOp, a: f64, b: f64) -> Result<f64, EvalError> {
    let v = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(EvalError::DivZero);
            }
            a / b
        }
        BinOp::Rem => dual::floored_rem(a, b)?,
        BinOp::Pow => dual::checked_powf(a, b)?,
        cmp => {
            return Err(EvalError::Unsupported(format!(
                "{} is not arithmetic",
                cmp.symbol()
            )))
        }
    };
    Ok(v)
}

fn dual_op(op: BinOp, a: Dual, b: Dual) -> Result<Dual, EvalError> {
    let d = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a.try_div(b)?,
        BinOp::Rem => a.try_rem(b)?,
        BinOp::Pow => a.try_pow(b)?,
        cmp => {
            return Err(EvalError::Unsupported(format!(
                "{} is not arithmetic",
                cmp.symbol()
            )))
        }
    };
    Ok(d)
}

/// Comparisons look at primal values only.
fn compare(op: BinOp, l: &Value, r: &Value) -> Result<bool, EvalError> {
    if let (Value::Bool(a), Value::Bool(b)) = (l, r) {
        return match op {
            BinOp::Eq => Ok(a == b),
            BinOp::Ne => Ok(a != b),
            _ => Err(EvalError::Type(format!(
                "bools cannot be ordered with {}",
                op.symbol()
            ))),
        };
    }
    let (Some(a), Some(b)) = (l.primal(), r.primal()) else {
        return Err(EvalError::Type(format!(
            "cannot compare {} with {}",
            l.type_name(),
            r.type_name()
        )));
    };
    Ok(match op {
        BinOp::Eq => a == b,
        BinOp::Ne => a != b,
        BinOp::Lt => a < b,
        BinOp::Le => a <= b,
        BinOp::Gt => a > b,
        _ => a >= b,
    })
}

/// Evaluate a module in a fresh elementary scope.
pub fn eval_module(m: &Module) -> Result<Value, EvalError> {
    let mut scope = stdlib::scope();
    Interpreter::new().exec_module(m, &mut scope)
}
