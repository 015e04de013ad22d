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

/// Single-argument elementary functions callable from function bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Elementary {
    Sin,
    Cos,
    Tan,
    Tanh,
    Exp,
    Ln,
    Sqrt,
    Abs,
    Floor,
    Ceil,
}

impl Elementary {
    pub const ALL: [Elementary; 10] = [
        Elementary::Sin,
        Elementary::Cos,
        Elementary::Tan,
        Elementary::Tanh,
        Elementary::Exp,
        Elementary::Ln,
        Elementary::Sqrt,
        Elementary::Abs,
        Elementary::Floor,
        Elementary::Ceil,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Elementary::Sin => "sin",
            Elementary::Cos => "cos",
            Elementary::Tan => "tan",
            Elementary::Tanh => "tanh",
            Elementary::Exp => "exp",
            Elementary::Ln => "ln",
            Elementary::Sqrt => "sqrt",
            Elementary::Abs => "abs",
            Elementary::Floor => "floor",
            Elementary::Ceil => "ceil",
        }
    }

    /// Evaluate at a plain number. `None` outside the real domain.
    pub fn apply(self, x: f64) -> Option<f64> {
        let y = match self {
            Elementary::Sin => x.sin(),
            Elementary::Cos => x.cos(),
            Elementary::Tan => x.tan(),
            Elementary::Tanh => x.tanh(),
            Elementary::Exp => x.exp(),
            Elementary::Ln => {
                if x <= 0.0 {
                    return None;
                }
                x.ln()
            }
            Elementary::Sqrt => {
                if x < 0.0 {
                    return None;
                }
                x.sqrt()
            }
            Elementary::Abs => x.abs(),
            Elementary::Floor => x.floor(),
            Elementary::Ceil => x.ceil(),
        };
        Some(y)
    }
}

impl fmt::Display for Elementary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named constants visible next to the elementary functions.
pub const CONSTANTS: [(&str, f64); 3] = [
    ("pi", std::f64::consts::PI),
    ("e", std::f64::consts::E),
    ("tau", std::f64::consts::TAU),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_is_checked() {
        assert_eq!(Elementary::Ln.apply(0.0), None);
        assert_eq!(Elementary::Sqrt.apply(-1.0), None);
        assert_eq!(Elementary::Sqrt.apply(4.0), Some(2.0));
    }
}
