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

use approx::assert_relative_eq;

use fwdiff::autodiff::{self, AutodiffError};
use fwdiff::eval::{EvalError, Function, Interpreter, Value, DEFAULT_MAX_CALL_DEPTH};
use fwdiff::parser;
use fwdiff::pipeline::{Program, ProgramError};
use fwdiff::stdlib;

/// Run `src` in the elementary scope and return the function bound to `name`.
fn define(src: &str, name: &str) -> Arc<Function> {
    let module = parser::parse(src).expect("parse");
    let mut scope = stdlib::scope();
    Interpreter::new()
        .exec_module(&module, &mut scope)
        .expect("exec");
    match scope.get(name) {
        Some(Value::Function(f)) => Arc::clone(f),
        other => panic!("{name} is not a function: {other:?}"),
    }
}

#[test]
fn registration_returns_the_same_function() {
    let f = define("fn f(x) { return 2 * x; }", "f");
    let same = autodiff::register_differentiable(&f).unwrap();
    assert_eq!(same.id(), f.id());
    let d = autodiff::derivative_of(&f).expect("registered");
    assert_eq!(d.call_first(&[10.0]).unwrap(), 2.0);
}

#[test]
fn captured_scope_resolves_free_names() {
    let program = Program::load(
        "let c = 3;
        #[differentiable]
        fn f(x) { return x * c; }",
    )
    .unwrap();
    assert_eq!(program.derivative("f").unwrap().call_first(&[1.0]).unwrap(), 3.0);
}

#[test]
fn chain_rule_across_registered_functions() {
    let program = Program::load(
        "let c = 5;
        #[differentiable]
        fn f(x) { return x * c; }
        #[differentiable]
        fn g(x) { return f(2 * x); }",
    )
    .unwrap();
    assert_eq!(program.derivative("g").unwrap().call_first(&[10.0]).unwrap(), 10.0);
}

#[test]
fn chain_rule_through_nonlinear_functions() {
    let program = Program::load(
        "#[differentiable]
        fn sq(x) { return x * x; }
        #[differentiable]
        fn h(x) { return sin(sq(x)) + sq(cos(x)); }",
    )
    .unwrap();
    let d = program.derivative("h").unwrap();
    for x in [-1.3_f64, 0.0, 0.4, 2.2] {
        let expected = (x * x).cos() * 2.0 * x - 2.0 * x.cos() * x.sin();
        assert_relative_eq!(d.call_first(&[x]).unwrap(), expected, epsilon = 1e-12);
    }
}

#[test]
fn unregistered_callee_is_rejected() {
    let program = Program::load(
        "fn f(x) { return x * 2; }
        #[differentiable]
        fn g(x) { return f(x); }",
    )
    .unwrap();
    let err = program.derivative("g").unwrap().call_first(&[1.0]).unwrap_err();
    assert!(matches!(err, AutodiffError::Eval(EvalError::NotDifferentiable(_))));
}

#[test]
fn multi_argument_and_keyword_calls_are_rejected() {
    let program = Program::load(
        "#[differentiable]
        fn f(x) { return x; }
        fn two(x) { return f(x, x); }
        fn kw(x) { return f(x = x); }",
    )
    .unwrap();
    for name in ["two", "kw"] {
        let err = program.differentiate(name).unwrap().call_first(&[1.0]).unwrap_err();
        assert!(
            matches!(err, AutodiffError::Eval(EvalError::UnsupportedCall(_))),
            "{name}: {err}"
        );
    }
}

#[test]
fn reregistration_replaces_the_derivative() {
    let f = define("fn f(x) { return x * x; }", "f");
    autodiff::register_differentiable(&f).unwrap();
    let first = autodiff::derivative_of(&f).unwrap();
    autodiff::register_differentiable(&f).unwrap();
    let second = autodiff::derivative_of(&f).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.call_first(&[3.0]).unwrap(), 6.0);
}

#[test]
fn functions_with_the_same_text_have_separate_entries() {
    let f = define("fn f(x) { return x; }", "f");
    let g = define("fn f(x) { return x; }", "f");
    autodiff::register_differentiable(&f).unwrap();
    assert!(autodiff::derivative_of(&f).is_some());
    assert!(autodiff::derivative_of(&g).is_none());
}

#[test]
fn recursive_functions_differentiate_through_themselves() {
    let program = Program::load(
        "#[differentiable]
        fn p(x) {
            if x > 1 { return 2 * p(x / 2); }
            return x * x;
        }",
    )
    .unwrap();
    // p(x) = x² / 2^k on the final interval, so p'(x) = x / 2^(k-1).
    let d = program.derivative("p").unwrap();
    assert_relative_eq!(d.call_first(&[0.5]).unwrap(), 1.0);
    assert_relative_eq!(d.call_first(&[3.0]).unwrap(), 1.5);
}

#[test]
fn deep_recursion_through_the_dispatcher_stops_at_the_call_limit() {
    // Test threads get a 2 MiB stack; the limit must trip before it runs out.
    let worker = std::thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(|| {
            let program = Program::load(
                "#[differentiable]
                fn p(n) {
                    if n > 0 { return p(n - 1) + 0; }
                    return n * n;
                }",
            )
            .unwrap();
            let shallow = program.derivative("p").unwrap().call_first(&[3.0]);
            let deep = program.derivative("p").unwrap().call_first(&[300.0]);
            let plain = program.call("p", &[300.0]);
            (shallow, deep, plain.map(|_| ()))
        })
        .unwrap();
    let (shallow, deep, plain) = worker.join().unwrap();
    assert_eq!(shallow.unwrap(), 0.0);
    assert_eq!(
        deep.unwrap_err(),
        AutodiffError::Eval(EvalError::RecursionLimit(DEFAULT_MAX_CALL_DEPTH))
    );
    assert!(matches!(
        plain,
        Err(ProgramError::Eval(EvalError::RecursionLimit(DEFAULT_MAX_CALL_DEPTH)))
    ));
}

#[test]
fn elementary_functions_are_values_and_rules() {
    let scope = stdlib::scope();
    for name in ["sin", "cos"] {
        let Some(Value::Elementary(e)) = scope.get(name) else {
            panic!("{name} missing from the elementary scope");
        };
        assert!(autodiff::rules::derivative(*e).is_some());
    }
}

#[test]
fn program_errors_name_the_function() {
    let program = Program::load("fn f(x) { return x; }").unwrap();
    assert!(matches!(program.derivative("nope"), Err(ProgramError::UnknownFunction(n)) if n == "nope"));
    assert!(matches!(program.derivative("f"), Err(ProgramError::NotRegistered(n)) if n == "f"));
}

#[test]
fn function_values_differentiate_directly() {
    let f = define("let k = 4; fn f(x, y) { return k * x * y + y; }", "f");
    let d = autodiff::differentiate(&f).unwrap();
    assert_eq!(d.call(&[2.0, 3.0], 0).unwrap(), 12.0);
    assert_eq!(d.call(&[2.0, 3.0], 1).unwrap(), 9.0);
    assert_eq!(d.name(), "f");
}
