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

//! Forward-mode differentiation by rewriting function trees.
//!
//! [`differentiate`] takes a function, renames it (`__dual_<name>`), routes
//! every call in its body through the chain-rule dispatcher `__chain`, and
//! evaluates the result so that running it on dual numbers yields exact
//! derivatives. Operators need no rewriting: the interpreter applies the
//! dual rules whenever an operand is a dual.
//!
//! Calls to user functions only differentiate when the callee was passed to
//! [`register_differentiable`] first. Calls inside `for` loops are not
//! rewritten.
//!
//! ```
//! use fwdiff::autodiff;
//! let d = autodiff::differentiate_source("fn f(x) { return x * sin(x); }").unwrap();
//! let x = 0.5f64;
//! assert!((d.call_first(&[x]).unwrap() - (x.sin() + x * x.cos())).abs() < 1e-12);
//! ```

mod boxing;
mod chain;
mod engine;
mod registry;
pub mod rewrite;
pub mod rules;

pub use boxing::DerivativeFunction;
pub use engine::{
    differentiate, differentiate_source, differentiate_with_options, register_differentiable,
    register_with_options, AutodiffError, DiffOptions, Target,
};
pub use registry::derivative_of;
