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

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::ast::FnDef;
use crate::dual::Dual;
use crate::stdlib::Elementary;

use super::{EvalError, Interpreter};

/// Name → value bindings visible to a body.
pub type Scope = HashMap<String, Value>;

/// Host function callable from evaluated code.
pub type NativeCall =
    fn(&mut Interpreter, Vec<Value>, Vec<(String, Value)>) -> Result<Value, EvalError>;

#[derive(Clone, Copy, PartialEq)]
pub struct NativeFn {
    pub name: &'static str,
    pub call: NativeCall,
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFn({})", self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(u64);

static NEXT_FUNCTION_ID: AtomicU64 = AtomicU64::new(1);

impl FunctionId {
    fn fresh() -> Self {
        FunctionId(NEXT_FUNCTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A user-defined function: its tree plus the scope it captured when it was
/// defined. The captured scope is a snapshot; later rebinding of a global
/// does not affect an already defined function.
#[derive(PartialEq)]
pub struct Function {
    id: FunctionId,
    def: FnDef,
    env: Scope,
}

impl Function {
    pub fn new(def: FnDef, env: Scope) -> Arc<Function> {
        Arc::new(Function {
            id: FunctionId::fresh(),
            def,
            env,
        })
    }

    /// Identity shared by every clone of the same `Arc<Function>`.
    pub fn id(&self) -> FunctionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn arity(&self) -> usize {
        self.def.arity()
    }

    /// Structural form of the function.
    pub fn definition(&self) -> &FnDef {
        &self.def
    }

    /// Variables captured from the defining scope.
    pub fn captured(&self) -> &Scope {
        &self.env
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("id", &self.id)
            .field("name", &self.def.name)
            .field("arity", &self.def.arity())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Num(f64),
    Dual(Dual),
    Bool(bool),
    Unit,
    Elementary(Elementary),
    Function(Arc<Function>),
    Native(NativeFn),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Num(_) => "number",
            Value::Dual(_) => "dual",
            Value::Bool(_) => "bool",
            Value::Unit => "unit",
            Value::Elementary(_) | Value::Function(_) | Value::Native(_) => "function",
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        if let Value::Num(n) = self {
            Some(*n)
        } else {
            None
        }
    }

    /// Primal value of a number or dual.
    pub fn primal(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            Value::Dual(d) => Some(d.value),
            _ => None,
        }
    }

    /// Numbers are lifted to zero-tangent duals; other values do not lift.
    pub fn to_dual(&self) -> Option<Dual> {
        match self {
            Value::Num(n) => Some(Dual::constant(*n)),
            Value::Dual(d) => Some(*d),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<Dual> for Value {
    fn from(d: Dual) -> Self {
        Value::Dual(d)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(n) => write!(f, "{n}"),
            Value::Dual(d) => write!(f, "{d}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Unit => f.write_str("()"),
            Value::Elementary(e) => write!(f, "<builtin {e}>"),
            Value::Function(func) => write!(f, "<fn {}>", func.name()),
            Value::Native(native) => write!(f, "<native {}>", native.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;

    fn def(name: &str) -> FnDef {
        FnDef {
            name: name.into(),
            attrs: Vec::new(),
            params: Vec::new(),
            ret: None,
            body: Vec::new(),
            span: Span::default(),
        }
    }

    #[test]
    fn function_ids_are_unique_and_shared_by_clones() {
        let f = Function::new(def("f"), Scope::new());
        let g = Function::new(def("f"), Scope::new());
        assert_ne!(f.id(), g.id());
        assert_eq!(Arc::clone(&f).id(), f.id());
    }

    #[test]
    fn numbers_lift_to_constant_duals() {
        assert_eq!(Value::Num(2.0).to_dual(), Some(Dual::constant(2.0)));
        assert_eq!(Value::Bool(true).to_dual(), None);
        assert_eq!(Value::Dual(Dual::variable(1.0)).primal(), Some(1.0));
    }

    #[test]
    fn display_names_callables() {
        assert_eq!(Value::Elementary(Elementary::Sin).to_string(), "<builtin sin>");
        assert_eq!(Value::Function(Function::new(def("g"), Scope::new())).to_string(), "<fn g>");
    }
}
