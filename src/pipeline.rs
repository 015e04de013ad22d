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

//! Load a whole program and differentiate the functions it defines.
//!
//! Top-level items run in order in the elementary scope. A function marked
//! `#[differentiable]` is registered right after it is defined, so later
//! definitions can call it through the chain rule.

use std::sync::Arc;

use crate::ast::{FnDef, Node};
use crate::autodiff::{self, AutodiffError, DerivativeFunction, DiffOptions, Target};
use crate::diagnostics;
use crate::eval::{self, EvalError, Function, Interpreter, Scope, Value};
use crate::parser;
use crate::stdlib;

/// Attribute that registers a function with the differentiation side-table.
pub const DIFFERENTIABLE_ATTR: &str = "differentiable";

/// Options controlling program loading.
#[derive(Debug, Clone)]
pub struct ProgramOptions {
    /// Options for every derivative computed while loading.
    pub diff: DiffOptions,
    /// Nesting limit for user function calls during top-level evaluation.
    pub max_call_depth: usize,
}

impl Default for ProgramOptions {
    fn default() -> Self {
        Self {
            diff: DiffOptions::default(),
            max_call_depth: eval::DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

/// Errors surfaced while loading or querying a program.
#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    /// Parsing failed with one or more diagnostics.
    #[error("parse error")]
    Parse(Vec<diagnostics::Diagnostic>),
    #[error("evaluation failed: {0}")]
    Eval(#[from] EvalError),
    #[error("differentiation failed: {0}")]
    Autodiff(#[from] AutodiffError),
    #[error("no function named '{0}'")]
    UnknownFunction(String),
    /// The function exists but was never registered as differentiable.
    #[error("function '{0}' is not registered as differentiable")]
    NotRegistered(String),
}

/// A loaded program: its tree plus the global scope after running it.
#[derive(Debug)]
pub struct Program {
    scope: Scope,
    opts: ProgramOptions,
}

impl Program {
    pub fn load(source: &str) -> Result<Program, ProgramError> {
        Self::load_with_options(source, &ProgramOptions::default())
    }

    pub fn load_with_options(source: &str, opts: &ProgramOptions) -> Result<Program, ProgramError> {
        let module = parser::parse_with_diagnostics(source).map_err(ProgramError::Parse)?;
        let mut scope = stdlib::scope();
        let mut interp = Interpreter::with_max_call_depth(opts.max_call_depth);

        for item in &module.items {
            match item {
                Node::FnDef(def) => {
                    let f = eval::define(def, &mut scope);
                    apply_attributes(def, &f, &opts.diff)?;
                }
                other => {
                    interp.exec_item(other, &mut scope)?;
                }
            }
        }

        tracing::debug!(
            items = module.items.len(),
            functions = module.functions().count(),
            "program loaded"
        );
        Ok(Program {
            scope,
            opts: opts.clone(),
        })
    }

    /// Function bound to `name` in the global scope.
    pub fn function(&self, name: &str) -> Option<&Arc<Function>> {
        match self.scope.get(name) {
            Some(Value::Function(f)) => Some(f),
            _ => None,
        }
    }

    fn require(&self, name: &str) -> Result<&Arc<Function>, ProgramError> {
        self.function(name)
            .ok_or_else(|| ProgramError::UnknownFunction(name.to_string()))
    }

    /// Derivative registered for `name` while loading.
    pub fn derivative(&self, name: &str) -> Result<Arc<DerivativeFunction>, ProgramError> {
        let f = self.require(name)?;
        autodiff::derivative_of(f).ok_or_else(|| ProgramError::NotRegistered(name.to_string()))
    }

    /// Differentiate `name` on demand, whether registered or not.
    pub fn differentiate(&self, name: &str) -> Result<DerivativeFunction, ProgramError> {
        let f = self.require(name)?;
        Ok(autodiff::differentiate_with_options(
            Target::Function(f),
            &self.opts.diff,
        )?)
    }

    /// Call `name` with plain numbers.
    pub fn call(&self, name: &str, args: &[f64]) -> Result<Value, ProgramError> {
        let f = self.require(name)?;
        let args = args.iter().copied().map(Value::Num).collect();
        let mut interp = Interpreter::with_max_call_depth(self.opts.max_call_depth);
        Ok(interp.call_function(f, args, Vec::new())?)
    }
}

fn apply_attributes(
    def: &FnDef,
    f: &Arc<Function>,
    opts: &DiffOptions,
) -> Result<(), AutodiffError> {
    for attr in &def.attrs {
        if attr == DIFFERENTIABLE_ATTR {
            autodiff::register_with_options(f, opts)?;
        } else {
            tracing::warn!(function = %def.name, attribute = %attr, "ignoring unknown attribute");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributed_functions_are_registered() {
        let program = Program::load(
            "let c = 3;\n#[differentiable]\nfn f(x) { return x * c; }\nfn g(x) { return x; }",
        )
        .unwrap();
        let d = program.derivative("f").unwrap();
        assert_eq!(d.call_first(&[2.0]).unwrap(), 3.0);
        assert!(matches!(program.derivative("g"), Err(ProgramError::NotRegistered(_))));
        assert!(matches!(program.derivative("h"), Err(ProgramError::UnknownFunction(_))));
    }

    #[test]
    fn unregistered_functions_differentiate_on_demand() {
        let program = Program::load("fn g(x, y) { return x * y; }").unwrap();
        let d = program.differentiate("g").unwrap();
        assert_eq!(d.call(&[2.0, 5.0], 1).unwrap(), 2.0);
    }

    #[test]
    fn unknown_attributes_are_ignored() {
        let program = Program::load("#[inline]\nfn f(x) { x }").unwrap();
        assert!(program.function("f").is_some());
    }

    #[test]
    fn calls_evaluate_plain_values() {
        let program = Program::load("fn f(x) { return x ** 2 + 1; }").unwrap();
        let out = program.call("f", &[3.0]).unwrap();
        assert_eq!(out.as_num(), Some(10.0));
    }

    #[test]
    fn parse_errors_are_reported() {
        assert!(matches!(Program::load("fn f(x { x }"), Err(ProgramError::Parse(_))));
    }
}
