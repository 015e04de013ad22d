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

use std::fmt;
use std::sync::Arc;

use crate::dual::Dual;
use crate::eval::{EvalError, Function, Interpreter, Value};

use super::AutodiffError;

/// Derivative of a function with respect to one selected argument.
///
/// Wraps the rewritten function. Calling it seeds the selected argument
/// with a unit tangent, every other argument with a zero tangent, and
/// returns the tangent of the result.
pub struct DerivativeFunction {
    raw: Arc<Function>,
    source: String,
}

impl DerivativeFunction {
    pub(crate) fn new(raw: Arc<Function>, source: String) -> Self {
        Self { raw, source }
    }

    /// Name of the original function.
    pub fn name(&self) -> &str {
        self.raw
            .name()
            .strip_prefix(super::rewrite::DETACHED_PREFIX)
            .unwrap_or(self.raw.name())
    }

    pub fn arity(&self) -> usize {
        self.raw.arity()
    }

    /// Rendered text of the rewritten module.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Partial derivative with respect to argument `select`, at `args`.
    pub fn call(&self, args: &[f64], select: usize) -> Result<f64, AutodiffError> {
        let arity = self.arity();
        if select >= arity {
            return Err(AutodiffError::SelectOutOfRange { select, arity });
        }
        if args.len() != arity {
            return Err(AutodiffError::ArityMismatch {
                expected: arity,
                found: args.len(),
            });
        }
        Ok(self.eval_at(&mut Interpreter::new(), args, select)?)
    }

    /// Derivative with respect to the first argument.
    pub fn call_first(&self, args: &[f64]) -> Result<f64, AutodiffError> {
        self.call(args, 0)
    }

    /// Box `args`, run the rewritten function on `interp`, unbox the result.
    pub(crate) fn eval_at(
        &self,
        interp: &mut Interpreter,
        args: &[f64],
        select: usize,
    ) -> Result<f64, EvalError> {
        let boxed = box_args(args, select);
        let out = interp.call_function(&self.raw, boxed, Vec::new())?;
        Ok(unbox(&out))
    }
}

fn box_args(args: &[f64], select: usize) -> Vec<Value> {
    args.iter()
        .enumerate()
        .map(|(i, &x)| {
            let diff = if i == select { 1.0 } else { 0.0 };
            Value::Dual(Dual::new(x, diff))
        })
        .collect()
}

/// Tangent of a dual result; a result that never met the seeded input has
/// derivative zero.
fn unbox(value: &Value) -> f64 {
    match value {
        Value::Dual(d) => d.diff,
        _ => 0.0,
    }
}

impl fmt::Debug for DerivativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivativeFunction")
            .field("name", &self.name())
            .field("arity", &self.arity())
            .finish()
    }
}
