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

//! The chain-rule dispatcher every rewritten call goes through.
//!
//! `__chain(f, g)` evaluates `f` at the primal of `g` and multiplies the
//! derivative of `f` at that point with the tangent of `g`:
//! `(f ∘ g)' = f'(g) · g'`.

use crate::dual::Dual;
use crate::eval::{EvalError, Interpreter, NativeFn, Value};

use super::registry;
use super::rewrite::CHAIN;
use super::rules;

/// Native value bound under [`CHAIN`] in every rewritten scope.
pub fn dispatcher() -> Value {
    Value::Native(NativeFn {
        name: CHAIN,
        call: chain,
    })
}

fn chain(
    interp: &mut Interpreter,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> Result<Value, EvalError> {
    if let Some((name, _)) = kwargs.first() {
        return Err(EvalError::UnsupportedCall(format!(
            "keyword argument '{name}' in a differentiated call"
        )));
    }
    let mut args = args.into_iter();
    let (Some(callee), Some(arg), None) = (args.next(), args.next(), args.next()) else {
        return Err(EvalError::UnsupportedCall(
            "differentiated calls take exactly one argument".to_string(),
        ));
    };

    let g = arg.to_dual().ok_or_else(|| {
        EvalError::Type(format!(
            "cannot differentiate {callee} at a {}",
            arg.type_name()
        ))
    })?;

    interp.nested(|interp| dispatch(interp, &callee, g))
}

fn dispatch(interp: &mut Interpreter, callee: &Value, g: Dual) -> Result<Value, EvalError> {
    let df = match callee {
        Value::Elementary(e) => match rules::derivative(*e) {
            Some(rule) => rule(g.value),
            None => return Err(EvalError::NotDifferentiable(callee.to_string())),
        },
        Value::Function(f) => match registry::lookup(f.id()) {
            Some(derivative) => derivative.eval_at(interp, &[g.value], 0)?,
            None => return Err(EvalError::NotDifferentiable(callee.to_string())),
        },
        _ => return Err(EvalError::NotDifferentiable(callee.to_string())),
    };

    let value = interp.call(callee, vec![Value::Num(g.value)], Vec::new())?;
    let value = value_as_primal(callee, value)?;

    if !df.is_finite() {
        return Err(EvalError::Domain {
            op: format!("d/dx {callee}"),
            value: g.value,
        });
    }

    tracing::trace!(callee = %callee, at = g.value, df, "chain rule");
    Ok(Value::Dual(Dual::new(value, df * g.diff)))
}

// A plain call still yields a dual when the callee reads one from its
// captured scope.
fn value_as_primal(callee: &Value, value: Value) -> Result<f64, EvalError> {
    value.primal().ok_or_else(|| {
        EvalError::Type(format!(
            "{callee} returned a {}, expected a number",
            value.type_name()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stdlib::Elementary;
    use approx::assert_relative_eq;

    fn call(args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, EvalError> {
        chain(&mut Interpreter::new(), args, kwargs)
    }

    #[test]
    fn elementary_chain_rule() {
        let out = call(
            vec![Value::Elementary(Elementary::Sin), Value::Dual(Dual::new(0.5, 2.0))],
            Vec::new(),
        )
        .unwrap();
        let Value::Dual(d) = out else {
            panic!("expected a dual");
        };
        assert_relative_eq!(d.value, 0.5f64.sin());
        assert_relative_eq!(d.diff, 2.0 * 0.5f64.cos());
    }

    #[test]
    fn plain_arguments_are_lifted() {
        let out = call(
            vec![Value::Elementary(Elementary::Exp), Value::Num(0.0)],
            Vec::new(),
        )
        .unwrap();
        assert!(matches!(out, Value::Dual(d) if d == Dual::constant(1.0)));
    }

    #[test]
    fn keyword_and_extra_arguments_are_rejected() {
        let sin = Value::Elementary(Elementary::Sin);
        let err = call(
            vec![sin.clone(), Value::Num(1.0)],
            vec![("k".into(), Value::Num(2.0))],
        );
        assert!(matches!(err, Err(EvalError::UnsupportedCall(_))));
        let err = call(vec![sin, Value::Num(1.0), Value::Num(2.0)], Vec::new());
        assert!(matches!(err, Err(EvalError::UnsupportedCall(_))));
    }

    #[test]
    fn step_functions_are_not_differentiable() {
        let err = call(
            vec![Value::Elementary(Elementary::Floor), Value::Num(1.5)],
            Vec::new(),
        );
        assert!(matches!(err, Err(EvalError::NotDifferentiable(_))));
    }

    #[test]
    fn dispatch_counts_toward_the_call_limit() {
        let err = chain(
            &mut Interpreter::with_max_call_depth(0),
            vec![Value::Elementary(Elementary::Sin), Value::Num(1.0)],
            Vec::new(),
        );
        assert!(matches!(err, Err(EvalError::RecursionLimit(0))));
    }

    #[test]
    fn infinite_slope_is_a_domain_error() {
        let err = call(
            vec![Value::Elementary(Elementary::Sqrt), Value::Dual(Dual::variable(0.0))],
            Vec::new(),
        );
        assert!(matches!(err, Err(EvalError::Domain { .. })));
    }
}
