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

//! Elementary-function scope seeded into every evaluation of source text.

mod math;

pub use math::{Elementary, CONSTANTS};

use crate::eval::{Scope, Value};

/// Fresh scope holding every elementary function and named constant.
pub fn scope() -> Scope {
    let mut scope = Scope::new();
    for e in Elementary::ALL {
        scope.insert(e.name().to_string(), Value::Elementary(e));
    }
    for (name, value) in CONSTANTS {
        scope.insert(name.to_string(), Value::Num(value));
    }
    scope
}
