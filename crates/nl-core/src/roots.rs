//! Real-root improvement for performance-curve polynomials.
//!
//! Curve-based links (pumps, fans, turbines) describe their characteristic as
//! a polynomial in the operating variable and need the one physically valid
//! root inside `[0, domain_max]`. [`RootSolver::improve_root`] first runs
//! Laguerre's method from the caller's guess, which converges fast but may
//! wander off to a complex or out-of-range root, then falls back to Brent's
//! bracketing method, which always converges given a sign change.
//!
//! Coefficients are in ascending powers: `c[0] + c[1]*x + c[2]*x^2 + ...`.

use crate::numeric::Real;
use crate::{NlError, NlResult};
use nalgebra::Complex;

/// Evaluate the polynomial at `x` (Horner).
pub fn evaluate_polynomial(coeffs: &[Real], x: Real) -> Real {
    coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// Evaluate the first derivative of the polynomial at `x`.
pub fn evaluate_derivative(coeffs: &[Real], x: Real) -> Real {
    coeffs
        .iter()
        .enumerate()
        .skip(1)
        .rev()
        .fold(0.0, |acc, (power, &c)| acc * x + c * power as Real)
}

/// Laguerre + Brent polynomial root solver.
#[derive(Clone, Copy, Debug)]
pub struct RootSolver {
    /// Iteration cap for each method
    pub max_iterations: usize,
    /// Convergence tolerance on the root (relative to `1 + |x|`)
    pub tolerance: Real,
    /// Largest imaginary part still accepted as a real root (relative to `1 + |x|`)
    pub imag_tolerance: Real,
    /// Relative margin added above `domain_max` for the bracketing interval
    pub domain_margin: Real,
}

impl Default for RootSolver {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1.0e-13,
            imag_tolerance: 1.0e-9,
            domain_margin: 1.0e-9,
        }
    }
}

impl RootSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the real root of the polynomial in `[0, domain_max]`, starting at `root`.
    ///
    /// # Errors
    /// `InvalidArg` for non-finite inputs or a non-positive domain, `Numerical`
    /// when neither Laguerre nor Brent finds a root in the domain. The latter
    /// means the calling curve is misconfigured.
    pub fn improve_root(&self, root: Real, coeffs: &[Real], domain_max: Real) -> NlResult<Real> {
        if !domain_max.is_finite() || domain_max <= 0.0 {
            return Err(NlError::InvalidArg {
                what: "root domain maximum must be positive and finite",
            });
        }
        if coeffs.iter().any(|c| !c.is_finite()) || !root.is_finite() {
            return Err(NlError::InvalidArg {
                what: "polynomial coefficients and root guess must be finite",
            });
        }

        let coeffs = trim_leading_zeros(coeffs);
        if coeffs.len() < 2 {
            return Err(NlError::Numerical {
                what: "constant polynomial has no isolated root".to_string(),
            });
        }

        if let Some(z) = self.laguerre(coeffs, Complex::new(root, 0.0)) {
            let scale = 1.0 + z.re.abs();
            if z.im.abs() <= self.imag_tolerance * scale && (0.0..=domain_max).contains(&z.re) {
                return Ok(z.re);
            }
        }

        let upper = domain_max * (1.0 + self.domain_margin) + self.domain_margin;
        self.brent(coeffs, 0.0, upper)
            .map(|x| x.clamp(0.0, domain_max))
            .ok_or_else(|| NlError::Numerical {
                what: format!("no real root of curve polynomial found in [0, {domain_max}]"),
            })
    }

    /// Laguerre iteration on the complex plane. Returns `None` on stall.
    fn laguerre(&self, coeffs: &[Real], mut x: Complex<Real>) -> Option<Complex<Real>> {
        let n = (coeffs.len() - 1) as Real;
        let zero = Complex::new(0.0, 0.0);

        for _ in 0..self.max_iterations {
            let last = coeffs.len() - 1;
            let mut p = Complex::new(coeffs[last], 0.0);
            let mut dp = zero;
            let mut ddp = zero;
            for &c in coeffs[..last].iter().rev() {
                ddp = ddp * x + dp;
                dp = dp * x + p;
                p = p * x + c;
            }
            ddp *= 2.0;

            if p.norm() <= Real::EPSILON * Real::EPSILON {
                return Some(x);
            }

            let g = dp / p;
            let h = g * g - ddp / p;
            let sq = ((n * h - g * g) * (n - 1.0)).sqrt();
            let plus = g + sq;
            let minus = g - sq;
            let denom = if plus.norm() >= minus.norm() { plus } else { minus };

            let step = if denom.norm() > 0.0 {
                Complex::new(n, 0.0) / denom
            } else {
                // Flat spot: nudge off it.
                Complex::new(1.0 + x.norm(), 0.0)
            };

            x -= step;
            if !x.re.is_finite() || !x.im.is_finite() {
                return None;
            }
            if step.norm() <= self.tolerance * (1.0 + x.norm()) {
                return Some(x);
            }
        }
        None
    }

    /// Brent's method on `[a, b]`. Returns `None` without a sign change.
    fn brent(&self, coeffs: &[Real], mut a: Real, mut b: Real) -> Option<Real> {
        let f = |x: Real| evaluate_polynomial(coeffs, x);
        let mut fa = f(a);
        let mut fb = f(b);
        if fa == 0.0 {
            return Some(a);
        }
        if fb == 0.0 {
            return Some(b);
        }
        if fa.signum() == fb.signum() {
            return None;
        }

        let tol = self.tolerance * (1.0 + b.abs());
        let mut c = b;
        let mut fc = fb;
        let mut d = b - a;
        let mut e = d;

        for _ in 0..self.max_iterations {
            if fb.signum() == fc.signum() {
                c = a;
                fc = fa;
                d = b - a;
                e = d;
            }
            if fc.abs() < fb.abs() {
                a = b;
                b = c;
                c = a;
                fa = fb;
                fb = fc;
                fc = fa;
            }

            let tol1 = 2.0 * Real::EPSILON * b.abs() + 0.5 * tol;
            let xm = 0.5 * (c - b);
            if xm.abs() <= tol1 || fb == 0.0 {
                return Some(b);
            }

            if e.abs() >= tol1 && fa.abs() > fb.abs() {
                // Inverse quadratic interpolation, or secant when a == c.
                let s = fb / fa;
                let (mut p, mut q);
                if a == c {
                    p = 2.0 * xm * s;
                    q = 1.0 - s;
                } else {
                    let qa = fa / fc;
                    let r = fb / fc;
                    p = s * (2.0 * xm * qa * (qa - r) - (b - a) * (r - 1.0));
                    q = (qa - 1.0) * (r - 1.0) * (s - 1.0);
                }
                if p > 0.0 {
                    q = -q;
                }
                p = p.abs();
                let min1 = 3.0 * xm * q - (tol1 * q).abs();
                let min2 = (e * q).abs();
                if 2.0 * p < min1.min(min2) {
                    e = d;
                    d = p / q;
                } else {
                    d = xm;
                    e = d;
                }
            } else {
                d = xm;
                e = d;
            }

            a = b;
            fa = fb;
            b += if d.abs() > tol1 { d } else { tol1.copysign(xm) };
            fb = f(b);
        }
        None
    }
}

/// Drop zero high-order coefficients so the degree is honest.
fn trim_leading_zeros(coeffs: &[Real]) -> &[Real] {
    let len = coeffs
        .iter()
        .rposition(|&c| c != 0.0)
        .map_or(0, |last| last + 1);
    &coeffs[..len]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn polynomial_helpers() {
        // 1 + 2x + 3x^2
        let c = [1.0, 2.0, 3.0];
        assert_eq!(evaluate_polynomial(&c, 2.0), 17.0);
        assert_eq!(evaluate_derivative(&c, 2.0), 14.0);
        assert_eq!(evaluate_polynomial(&[], 2.0), 0.0);
        assert_eq!(evaluate_derivative(&[5.0], 2.0), 0.0);
    }

    #[test]
    fn laguerre_finds_nearby_root() {
        let solver = RootSolver::new();
        let root = solver.improve_root(3.0, &[-4.0, 0.0, 1.0], 10.0).unwrap();
        assert!((root - 2.0).abs() < 1e-10);
    }

    #[test]
    fn falls_back_when_local_root_out_of_range() {
        // (x - 2)(x + 3): seeded near -3 the local method lands outside the domain.
        let solver = RootSolver::new();
        let root = solver.improve_root(-5.0, &[-6.0, 1.0, 1.0], 10.0).unwrap();
        assert!((root - 2.0).abs() < 1e-9);
    }

    #[test]
    fn falls_back_when_local_root_is_complex() {
        // (x - 1)(x^2 + 1) has a complex pair at ±i.
        let solver = RootSolver::new();
        for seed in [0.0, 0.1, -0.5, 4.0] {
            let root = solver.improve_root(seed, &[-1.0, 1.0, -1.0, 1.0], 3.0).unwrap();
            assert!((root - 1.0).abs() < 1e-9, "seed {seed} gave {root}");
        }
    }

    #[test]
    fn linear_polynomial() {
        let solver = RootSolver::new();
        let root = solver.improve_root(0.0, &[-3.0, 2.0, 0.0, 0.0], 5.0).unwrap();
        assert!((root - 1.5).abs() < 1e-12);
    }

    #[test]
    fn no_root_in_domain_is_numerical_error() {
        let solver = RootSolver::new();
        let err = solver.improve_root(0.5, &[1.0, 0.0, 1.0], 10.0).unwrap_err();
        assert!(matches!(err, NlError::Numerical { .. }));

        let err = solver.improve_root(0.5, &[-20.0, 1.0], 10.0).unwrap_err();
        assert!(matches!(err, NlError::Numerical { .. }));
    }

    #[test]
    fn rejects_bad_domain() {
        let solver = RootSolver::new();
        assert!(matches!(
            solver.improve_root(0.5, &[-1.0, 1.0], 0.0),
            Err(NlError::InvalidArg { .. })
        ));
        assert!(matches!(
            solver.improve_root(0.5, &[-1.0, Real::NAN], 1.0),
            Err(NlError::InvalidArg { .. })
        ));
    }

    proptest! {
        #[test]
        fn increasing_cubic_root_is_found(
            a in 0.01_f64..10.0,
            b in 0.01_f64..10.0,
            frac in 0.0_f64..1.0,
            domain in 0.5_f64..50.0,
            seed in -100.0_f64..100.0,
        ) {
            let r = frac * domain;
            let c0 = -(a * r * r * r + b * r);
            let coeffs = [c0, b, 0.0, a];
            let solver = RootSolver::new();
            let x = solver.improve_root(seed, &coeffs, domain).unwrap();
            prop_assert!((0.0..=domain).contains(&x));
            prop_assert!((x - r).abs() < 1e-6 * (1.0 + domain));
        }
    }
}
