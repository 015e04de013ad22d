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

use approx::assert_relative_eq;

use fwdiff::autodiff::{differentiate_source, AutodiffError};
use fwdiff::eval::EvalError;

fn points() -> impl Iterator<Item = f64> {
    (0..40).map(|i| (f64::from(i) - 20.0) / 2.0)
}

fn body(expr: &str) -> String {
    format!("fn f(x) {{ return {expr}; }}")
}

type ClosedForm = fn(f64) -> f64;

const TABLE: &[(&str, ClosedForm)] = &[
    ("x", |_| 1.0),
    ("2 + x", |_| 1.0),
    ("x + 2", |_| 1.0),
    ("x + x", |_| 2.0),
    ("5 - x", |_| -1.0),
    ("x - 3", |_| 1.0),
    ("2 * x", |_| 2.0),
    ("x * 10", |_| 10.0),
    ("x * x", |x| 2.0 * x),
    ("2 * x * 2 * x", |x| 8.0 * x),
    ("x / 10", |_| 0.1),
    ("10 / (x + 0.1)", |x| -10.0 / ((x + 0.1) * (x + 0.1))),
    ("x ** 2", |x| 2.0 * x),
    ("(2 * x) ** 2", |x| 8.0 * x),
    ("x * (2 / (x + 0.1)) + (5 * x / 2) ** 5", |x| {
        let q = x + 0.1;
        2.0 / q - 2.0 * x / (q * q) + 5.0 * 2.5 * (2.5 * x).powi(4)
    }),
    ("sin(x)", |x| x.cos()),
    ("sin(2 * x)", |x| 2.0 * (2.0 * x).cos()),
    ("cos(x)", |x| -x.sin()),
    ("cos( 2 * sin(x))", |x| -(2.0 * x.sin()).sin() * 2.0 * x.cos()),
    ("x ** 1 + x ** 3 + x ** 5", |x| 1.0 + 3.0 * x * x + 5.0 * x.powi(4)),
    ("-x ** 2", |x| -2.0 * x),
    ("x % 3", |_| 1.0),
];

#[test]
fn derivatives_match_closed_forms() {
    for (expr, expected) in TABLE {
        let d = differentiate_source(&body(expr))
            .unwrap_or_else(|e| panic!("differentiating '{expr}': {e}"));
        for p in points() {
            let got = d
                .call_first(&[p])
                .unwrap_or_else(|e| panic!("'{expr}' at {p}: {e}"));
            assert_relative_eq!(got, expected(p), epsilon = 1e-9, max_relative = 1e-9);
        }
    }
}

#[test]
fn parsed_text_differentiates() {
    let d = differentiate_source("fn f(x) { return 2 * x; }").unwrap();
    assert_eq!(d.call_first(&[5.0]).unwrap(), 2.0);
}

#[test]
fn constants_have_zero_derivative() {
    let d = differentiate_source("fn f(x) { return 1; }").unwrap();
    assert_eq!(d.call_first(&[10.0]).unwrap(), 0.0);
    let d = differentiate_source("fn f(x) { return pi * 2; }").unwrap();
    assert_eq!(d.call_first(&[10.0]).unwrap(), 0.0);
}

#[test]
fn selected_argument_decides_the_direction() {
    let d = differentiate_source("fn f(x, y) { return x; }").unwrap();
    assert_eq!(d.call(&[10.0, 10.0], 0).unwrap(), 1.0);
    assert_eq!(d.call(&[10.0, 10.0], 1).unwrap(), 0.0);

    let d = differentiate_source("fn f(x, y) { return x + y; }").unwrap();
    assert_eq!(d.call(&[10.0, 11.0], 0).unwrap(), 1.0);
}

#[test]
fn power_rule_with_constant_exponent_argument() {
    let d = differentiate_source("fn f(x, y) { return x ** y; }").unwrap();
    assert_eq!(d.call(&[10.0, 3.0], 0).unwrap(), 3.0 * 10f64.powi(2));
}

#[test]
fn differentiable_exponent_is_rejected() {
    let d = differentiate_source("fn f(x) { return 2 ** x; }").unwrap();
    let err = d.call_first(&[1.0]).unwrap_err();
    assert_eq!(
        err,
        AutodiffError::Eval(EvalError::NonConstantExponent(1.0))
    );

    let d = differentiate_source("fn f(x, y) { return x ** y; }").unwrap();
    assert!(d.call(&[10.0, 3.0], 1).is_err());
}

#[test]
fn division_by_zero_is_an_error_not_a_value() {
    let d = differentiate_source(&body("10 / (x + 0.1)")).unwrap();
    // -0.1 + 0.1 is exactly zero in f64.
    let err = d.call_first(&[-0.1]).unwrap_err();
    assert_eq!(err, AutodiffError::Eval(EvalError::DivZero));
}

#[test]
fn differentiating_twice_agrees() {
    let src = body("x * (2 / (x + 0.1)) + (5 * x / 2) ** 5");
    let one = differentiate_source(&src).unwrap();
    let two = differentiate_source(&src).unwrap();
    for p in points() {
        assert_eq!(one.call_first(&[p]).unwrap(), two.call_first(&[p]).unwrap());
    }
    assert_eq!(one.source(), two.source());
}

#[test]
fn branches_follow_the_primal() {
    let src = "fn f(x) {
        if x < 0 {
            return -x;
        } else if x < 2 {
            return x * x;
        } else {
            return 4 * sin(x);
        }
    }";
    let d = differentiate_source(src).unwrap();
    assert_eq!(d.call_first(&[-3.0]).unwrap(), -1.0);
    assert_eq!(d.call_first(&[1.5]).unwrap(), 3.0);
    assert_relative_eq!(d.call_first(&[3.0]).unwrap(), 4.0 * 3f64.cos());
}

#[test]
fn loops_differentiate_operator_arithmetic() {
    let src = "fn g(x) {
        let r = 0;
        for i in 0..6 {
            if i % 2 == 1 { r = r + x ** i; }
        }
        return r;
    }";
    let d = differentiate_source(src).unwrap();
    for p in points() {
        let expected = 1.0 + 3.0 * p * p + 5.0 * p.powi(4);
        assert_relative_eq!(d.call_first(&[p]).unwrap(), expected, max_relative = 1e-12);
    }
}

#[test]
fn calls_inside_loops_are_not_rewritten() {
    let src = "fn g(x) {
        let r = 0;
        for i in 0..2 { r = r + sin(x); }
        return r;
    }";
    let d = differentiate_source(src).unwrap();
    let err = d.call_first(&[1.0]).unwrap_err();
    assert!(matches!(err, AutodiffError::Eval(EvalError::Type(_))));
}

#[test]
fn step_functions_are_not_differentiable() {
    let d = differentiate_source(&body("floor(x)")).unwrap();
    assert!(matches!(
        d.call_first(&[1.5]),
        Err(AutodiffError::Eval(EvalError::NotDifferentiable(_)))
    ));
}

#[test]
fn domain_errors_propagate() {
    let d = differentiate_source(&body("ln(x)")).unwrap();
    assert_relative_eq!(d.call_first(&[2.0]).unwrap(), 0.5);
    assert!(matches!(
        d.call_first(&[-1.0]),
        Err(AutodiffError::Eval(EvalError::Domain { .. }))
    ));
}

#[test]
fn unknown_names_fail_when_called() {
    let d = differentiate_source(&body("x * missing")).unwrap();
    assert_eq!(
        d.call_first(&[1.0]).unwrap_err(),
        AutodiffError::Eval(EvalError::UnknownVar("missing".into()))
    );
}

#[test]
fn argument_checks() {
    let d = differentiate_source("fn f(x, y) { return x * y; }").unwrap();
    assert_eq!(
        d.call(&[1.0, 2.0], 2).unwrap_err(),
        AutodiffError::SelectOutOfRange { select: 2, arity: 2 }
    );
    assert_eq!(
        d.call_first(&[1.0]).unwrap_err(),
        AutodiffError::ArityMismatch {
            expected: 2,
            found: 1
        }
    );
}

#[test]
fn exponent_literals_scale_the_derivative() {
    let d = differentiate_source(&body("1e-3 * x")).unwrap();
    assert_relative_eq!(d.call_first(&[2.0]).unwrap(), 0.001);
    let d = differentiate_source(&body("x * 2.5e1")).unwrap();
    assert_relative_eq!(d.call_first(&[2.0]).unwrap(), 25.0);
}

#[test]
fn malformed_literals_and_run_on_statements_are_parse_errors() {
    for src in [
        body("2e * x"),
        "fn f(x) { return 1 e - 3 * x; }".to_string(),
        "fn f(x) { let y = x\n return y }".to_string(),
    ] {
        assert!(
            matches!(differentiate_source(&src), Err(AutodiffError::Parse(_))),
            "{src}"
        );
    }
}
