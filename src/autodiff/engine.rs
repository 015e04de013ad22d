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

use std::sync::Arc;

use crate::ast::{self, Module, Node};
use crate::diagnostics::{self, Diagnostic};
use crate::eval::{EvalError, Function, Interpreter, Scope, Value};
use crate::parser;
use crate::stdlib;

use super::boxing::DerivativeFunction;
use super::chain;
use super::registry;
use super::rewrite::{self, CHAIN};

/// Errors returned by the autodiff driver.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AutodiffError {
    /// The source text did not parse.
    #[error("parse error: {}", first_message(.0))]
    Parse(Vec<Diagnostic>),
    /// The first item of the source text is not a function definition.
    #[error("source does not start with a function definition")]
    NotAFunction,
    /// The rewritten module did not survive rendering and re-parsing.
    #[error("rewritten source does not round-trip: {0}")]
    RoundTrip(String),
    /// Evaluating the rewritten module did not define the detached function.
    #[error("rewritten module does not define '{0}'")]
    MissingDefinition(String),
    #[error("select index {select} is out of range for a function of {arity} argument(s)")]
    SelectOutOfRange { select: usize, arity: usize },
    #[error("expected {expected} argument(s), found {found}")]
    ArityMismatch { expected: usize, found: usize },
    #[error(transparent)]
    Eval(#[from] EvalError),
}

fn first_message(diags: &[Diagnostic]) -> String {
    diags
        .first()
        .map_or_else(|| "unknown".to_string(), ToString::to_string)
}

/// Options controlling a differentiation run.
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Render the rewritten module, parse it again and evaluate the parsed
    /// copy.
    pub verify_roundtrip: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            verify_roundtrip: true,
        }
    }
}

/// What to differentiate.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// A function value; its captured scope resolves free names.
    Function(&'a Arc<Function>),
    /// Source text whose first item is the function; free names resolve in
    /// the elementary scope.
    Source(&'a str),
}

/// Derivative of a function value.
pub fn differentiate(f: &Arc<Function>) -> Result<DerivativeFunction, AutodiffError> {
    differentiate_with_options(Target::Function(f), &DiffOptions::default())
}

/// Derivative of the first function defined in `source`.
pub fn differentiate_source(source: &str) -> Result<DerivativeFunction, AutodiffError> {
    differentiate_with_options(Target::Source(source), &DiffOptions::default())
}

pub fn differentiate_with_options(
    target: Target<'_>,
    opts: &DiffOptions,
) -> Result<DerivativeFunction, AutodiffError> {
    let (module, name, mut scope) = prepare(target)?;
    tracing::debug!(function = %name, "differentiating");

    let detached = rewrite::detach(&module);
    let rewritten = rewrite::differentiate_calls(&detached);
    let source = ast::render(&rewritten);
    tracing::trace!(function = %name, "rewritten source:\n{source}");

    let module = if opts.verify_roundtrip {
        verify_roundtrip(&source)?
    } else {
        rewritten
    };

    scope.insert(CHAIN.to_string(), chain::dispatcher());
    Interpreter::new().exec_module(&module, &mut scope)?;

    let detached_name = rewrite::detached_name(&name);
    match scope.get(&detached_name) {
        Some(Value::Function(raw)) => {
            tracing::debug!(function = %name, arity = raw.arity(), "derivative ready");
            Ok(DerivativeFunction::new(Arc::clone(raw), source))
        }
        _ => Err(AutodiffError::MissingDefinition(detached_name)),
    }
}

fn prepare(target: Target<'_>) -> Result<(Module, String, Scope), AutodiffError> {
    match target {
        Target::Function(f) => {
            let def = f.definition();
            let mut scope = f.captured().clone();
            scope.insert(def.name.clone(), Value::Function(Arc::clone(f)));
            let module = Module {
                items: vec![Node::FnDef(def.clone())],
            };
            Ok((module, def.name.clone(), scope))
        }
        Target::Source(source) => {
            let module = parser::parse_with_diagnostics(source).map_err(AutodiffError::Parse)?;
            let name = match module.items.first() {
                Some(Node::FnDef(def)) => def.name.clone(),
                _ => return Err(AutodiffError::NotAFunction),
            };
            Ok((module, name, stdlib::scope()))
        }
    }
}

fn verify_roundtrip(source: &str) -> Result<Module, AutodiffError> {
    let reparsed = parser::parse_with_diagnostics(source)
        .map_err(|diags| AutodiffError::RoundTrip(diagnostics::render_all(source, &diags)))?;
    if ast::render(&reparsed) != source {
        return Err(AutodiffError::RoundTrip(
            "re-rendered text differs from the rewritten source".to_string(),
        ));
    }
    Ok(reparsed)
}

/// Attach a derivative to `f` so that rewritten calls to it can apply the
/// chain rule. Registering again recomputes and replaces the derivative.
pub fn register_differentiable(f: &Arc<Function>) -> Result<Arc<Function>, AutodiffError> {
    register_with_options(f, &DiffOptions::default())
}

pub fn register_with_options(
    f: &Arc<Function>,
    opts: &DiffOptions,
) -> Result<Arc<Function>, AutodiffError> {
    let derivative = differentiate_with_options(Target::Function(f), opts)?;
    registry::insert(f.id(), Arc::new(derivative));
    tracing::debug!(function = %f.name(), "registered differentiable function");
    Ok(Arc::clone(f))
}
