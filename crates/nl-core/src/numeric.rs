/// Floating point type used throughout system
pub type Real = f64;

/// Smallest magnitude treated as a usable divisor.
pub const DIVIDE_GUARD: Real = 1.0e-100;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

/// Natural log, or `fallback` outside the log domain.
pub fn guarded_ln(x: Real, fallback: Real) -> Real {
    if x > 0.0 { x.ln() } else { fallback }
}

/// Square root of `|x|` carrying the sign of `x`.
pub fn signed_sqrt(x: Real) -> Real {
    x.signum() * x.abs().sqrt()
}

/// True if `value` lies in the closed interval.
pub fn in_range(lo: Real, value: Real, hi: Real) -> bool {
    lo <= value && value <= hi
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances {
            abs: 1e-12,
            rel: 1e-9,
        };
        assert!(nearly_equal(1.0, 1.0 + 1e-12, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn guarded_helpers_fall_back() {
        assert_eq!(guarded_ln(0.0, -1.0), -1.0);
        assert_eq!(guarded_ln(-3.0, -1.0), -1.0);
        assert!((guarded_ln(Real::exp(2.0), 0.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn signed_sqrt_keeps_sign() {
        assert_eq!(signed_sqrt(4.0), 2.0);
        assert_eq!(signed_sqrt(-9.0), -3.0);
        assert_eq!(signed_sqrt(0.0), 0.0);
    }
}
