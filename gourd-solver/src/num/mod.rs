//! Numeric tolerances and the comparison predicates derived from them.
//!
//! Every floating-point comparison in the solver goes through a [`Tolerances`] instance; raw
//! `==`/`<` on `f64` is reserved for exact bookkeeping (e.g. restoring saved bounds).

/// The tolerance set of a solver instance.
///
/// `eps` guards individual value comparisons, `sumeps` guards comparisons of sums of values,
/// `feastol` is the primal feasibility tolerance for constraint activities and integrality,
/// and `lpfeastol`/`dualfeastol` are handed to the LP oracle.
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub eps: f64,
    pub sumeps: f64,
    pub feastol: f64,
    pub lpfeastol: f64,
    pub dualfeastol: f64,
    /// Values at or beyond this magnitude are treated as infinite.
    pub infinity: f64,
    /// Values at or beyond this magnitude are suspicious and excluded from aggregations.
    pub hugeval: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Tolerances {
            eps: 1e-9,
            sumeps: 1e-6,
            feastol: 1e-6,
            lpfeastol: 1e-6,
            dualfeastol: 1e-7,
            infinity: 1e20,
            hugeval: 1e15,
        }
    }
}

impl Tolerances {
    pub fn is_infinity(&self, value: f64) -> bool {
        value >= self.infinity
    }

    pub fn is_neg_infinity(&self, value: f64) -> bool {
        value <= -self.infinity
    }

    pub fn is_huge(&self, value: f64) -> bool {
        value.abs() >= self.hugeval
    }

    pub fn is_eq(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.eps
    }

    pub fn is_lt(&self, a: f64, b: f64) -> bool {
        a < b - self.eps
    }

    pub fn is_gt(&self, a: f64, b: f64) -> bool {
        a > b + self.eps
    }

    pub fn is_le(&self, a: f64, b: f64) -> bool {
        a <= b + self.eps
    }

    pub fn is_ge(&self, a: f64, b: f64) -> bool {
        a >= b - self.eps
    }

    pub fn is_sum_eq(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.sumeps
    }

    pub fn is_feas_eq(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.feastol
    }

    pub fn is_feas_lt(&self, a: f64, b: f64) -> bool {
        a < b - self.feastol
    }

    pub fn is_feas_le(&self, a: f64, b: f64) -> bool {
        a <= b + self.feastol
    }

    pub fn is_feas_gt(&self, a: f64, b: f64) -> bool {
        a > b + self.feastol
    }

    pub fn is_feas_ge(&self, a: f64, b: f64) -> bool {
        a >= b - self.feastol
    }

    /// Whether the value is integral within `feastol`.
    pub fn is_integral(&self, value: f64) -> bool {
        (value - value.round()).abs() <= self.feastol
    }

    /// Rounds down, forgiving values that are integral within `feastol`.
    pub fn feas_floor(&self, value: f64) -> f64 {
        (value + self.feastol).floor()
    }

    /// Rounds up, forgiving values that are integral within `feastol`.
    pub fn feas_ceil(&self, value: f64) -> f64 {
        (value - self.feastol).ceil()
    }

    /// The fractional part with respect to [`Tolerances::feas_floor`].
    pub fn frac(&self, value: f64) -> f64 {
        value - self.feas_floor(value)
    }
}
