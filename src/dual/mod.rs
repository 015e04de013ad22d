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

//! Dual numbers for forward-mode differentiation.
//!
//! A [`Dual`] carries a primal `value` together with its tangent `diff` with
//! respect to one seeded input. Every operation propagates the tangent with
//! the matching differentiation rule, so evaluating a function on duals
//! yields its directional derivative alongside its value.
//!
//! Total operations (`+`, `-`, `*`, unary `-`) are exposed through
//! `std::ops`. Division, power and remainder can fail and are exposed as
//! `try_*` methods instead.
//!
//! Mixing a plain `f64` with a `Dual` lifts the number to a dual with zero
//! tangent first:
//!
//! ```
//! use fwdiff::dual::Dual;
//! let x = Dual::variable(3.0);
//! let y = 2.0 * x + 1.0;
//! assert_eq!(y, Dual::new(7.0, 2.0));
//! ```

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// Failures of dual arithmetic that have no finite, well-defined result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DualError {
    /// The divisor (or a zero base raised to a negative power) is zero.
    #[error("division by zero")]
    DivisionByZero,
    /// `f ** c` with a differentiable exponent is not supported.
    #[error("cannot differentiate through an exponent (exponent tangent is {tangent})")]
    NonConstantExponent { tangent: f64 },
    /// `f % g` with a differentiable divisor is not supported.
    #[error("cannot differentiate through a divisor of '%' (divisor tangent is {tangent})")]
    NonConstantDivisor { tangent: f64 },
    /// The operation has no real result at this point.
    #[error("math domain error in {op} at {value}")]
    Domain { op: &'static str, value: f64 },
}

/// A value together with its tangent.
#[derive(Clone, Copy, PartialEq, Default)]
pub struct Dual {
    pub value: f64,
    pub diff: f64,
}

impl Dual {
    #[inline]
    pub fn new(value: f64, diff: f64) -> Self {
        Self { value, diff }
    }

    /// A constant: zero tangent.
    #[inline]
    pub fn constant(value: f64) -> Self {
        Self { value, diff: 0.0 }
    }

    /// The seeded variable: unit tangent.
    #[inline]
    pub fn variable(value: f64) -> Self {
        Self { value, diff: 1.0 }
    }

    /// Quotient rule: `(f/g)' = (f'g - g'f) / g²`.
    pub fn try_div(self, rhs: impl Into<Dual>) -> Result<Dual, DualError> {
        let rhs = rhs.into();
        let (f, df, g, dg) = (self.value, self.diff, rhs.value, rhs.diff);
        if g == 0.0 {
            return Err(DualError::DivisionByZero);
        }
        Ok(Dual::new(f / g, (df * g - dg * f) / (g * g)))
    }

    /// Power rule for a constant exponent: `(f^c)' = c f^(c-1) f'`.
    pub fn try_pow(self, exponent: impl Into<Dual>) -> Result<Dual, DualError> {
        let exponent = exponent.into();
        if exponent.diff != 0.0 {
            return Err(DualError::NonConstantExponent {
                tangent: exponent.diff,
            });
        }
        let (f, df, c) = (self.value, self.diff, exponent.value);
        let value = checked_powf(f, c)?;
        if c == 0.0 {
            return Ok(Dual::constant(value));
        }
        let slope = checked_powf(f, c - 1.0)?;
        Ok(Dual::new(value, c * slope * df))
    }

    /// Floored remainder with a constant divisor: `(f % g)' = f'`.
    pub fn try_rem(self, rhs: impl Into<Dual>) -> Result<Dual, DualError> {
        let rhs = rhs.into();
        if rhs.diff != 0.0 {
            return Err(DualError::NonConstantDivisor { tangent: rhs.diff });
        }
        Ok(Dual::new(floored_rem(self.value, rhs.value)?, self.diff))
    }
}

/// `f.powf(c)` with the zero and negative-base cases reported instead of
/// producing `inf` or `NaN`.
pub fn checked_powf(f: f64, c: f64) -> Result<f64, DualError> {
    if f == 0.0 && c < 0.0 {
        return Err(DualError::DivisionByZero);
    }
    if f < 0.0 && c.fract() != 0.0 {
        return Err(DualError::Domain {
            op: "pow",
            value: f,
        });
    }
    Ok(f.powf(c))
}

/// Remainder taking the sign of the divisor.
pub fn floored_rem(f: f64, g: f64) -> Result<f64, DualError> {
    if g == 0.0 {
        return Err(DualError::DivisionByZero);
    }
    Ok(f - g * (f / g).floor())
}

impl From<f64> for Dual {
    fn from(value: f64) -> Self {
        Self::constant(value)
    }
}

impl fmt::Debug for Dual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dual({} + {}ε)", self.value, self.diff)
    }
}

impl fmt::Display for Dual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.diff.is_sign_negative() {
            write!(f, "{} - {}ε", self.value, -self.diff)
        } else {
            write!(f, "{} + {}ε", self.value, self.diff)
        }
    }
}

impl Neg for Dual {
    type Output = Dual;

    fn neg(self) -> Dual {
        Dual::new(-self.value, -self.diff)
    }
}

impl Add for Dual {
    type Output = Dual;

    fn add(self, rhs: Dual) -> Dual {
        Dual::new(self.value + rhs.value, self.diff + rhs.diff)
    }
}

impl Sub for Dual {
    type Output = Dual;

    fn sub(self, rhs: Dual) -> Dual {
        Dual::new(self.value - rhs.value, self.diff - rhs.diff)
    }
}

impl Mul for Dual {
    type Output = Dual;

    fn mul(self, rhs: Dual) -> Dual {
        Dual::new(
            self.value * rhs.value,
            self.diff * rhs.value + rhs.diff * self.value,
        )
    }
}

// Mixed forms lift the plain number and reuse the dual rule.
macro_rules! lifted_binop {
    ($trait:ident, $method:ident) => {
        impl $trait<f64> for Dual {
            type Output = Dual;

            fn $method(self, rhs: f64) -> Dual {
                $trait::$method(self, Dual::constant(rhs))
            }
        }

        impl $trait<Dual> for f64 {
            type Output = Dual;

            fn $method(self, rhs: Dual) -> Dual {
                $trait::$method(Dual::constant(self), rhs)
            }
        }
    };
}

lifted_binop!(Add, add);
lifted_binop!(Sub, sub);
lifted_binop!(Mul, mul);
