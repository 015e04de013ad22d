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

use crate::stdlib::Elementary;

/// Derivative of a single-argument elementary function.
pub type ElementaryRule = fn(f64) -> f64;

fn d_sin(x: f64) -> f64 {
    x.cos()
}

fn d_cos(x: f64) -> f64 {
    -x.sin()
}

fn d_tan(x: f64) -> f64 {
    let c = x.cos();
    1.0 / (c * c)
}

fn d_tanh(x: f64) -> f64 {
    let t = x.tanh();
    1.0 - t * t
}

fn d_exp(x: f64) -> f64 {
    x.exp()
}

fn d_ln(x: f64) -> f64 {
    1.0 / x
}

fn d_sqrt(x: f64) -> f64 {
    0.5 / x.sqrt()
}

// Zero at the kink, matching `f64::signum` except for the sign of zero.
fn d_abs(x: f64) -> f64 {
    if x == 0.0 {
        0.0
    } else {
        x.signum()
    }
}

/// Look up the derivative of `e`. Step functions have no entry.
pub fn derivative(e: Elementary) -> Option<ElementaryRule> {
    let rule: ElementaryRule = match e {
        Elementary::Sin => d_sin,
        Elementary::Cos => d_cos,
        Elementary::Tan => d_tan,
        Elementary::Tanh => d_tanh,
        Elementary::Exp => d_exp,
        Elementary::Ln => d_ln,
        Elementary::Sqrt => d_sqrt,
        Elementary::Abs => d_abs,
        Elementary::Floor | Elementary::Ceil => return None,
    };
    Some(rule)
}
