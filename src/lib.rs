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

//! fwdiff core library: forward-mode differentiation by tree rewriting.
pub mod ast;
pub mod autodiff;
pub mod diagnostics;
pub mod dual;
pub mod eval;
pub mod parser;
pub mod pipeline;
pub mod stdlib;

pub use autodiff::{differentiate, differentiate_source, register_differentiable, DerivativeFunction};
pub use dual::Dual;
pub use pipeline::Program;
