//! Common utilities for link calculations.

use nl_core::{Real, in_range};

use crate::error::{LinkError, LinkResult};

/// Default admittance change that flags the network for re-decomposition.
pub const DEFAULT_ADMITTANCE_TOLERANCE: Real = 0.0;

/// Conductance treated as an open path.
pub const CONDUCTANCE_LIMIT_MIN: Real = 1.0e-100;

/// Boltzmann constant over elementary charge (V/K).
pub const BOLTZMANN_OVER_CHARGE: Real = 8.617_333_262e-5;

/// Ensure a configuration value is finite.
pub fn check_finite(link: &str, value: Real, what: &str) -> LinkResult<Real> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(LinkError::init(link, format!("{what} must be finite")))
    }
}

/// Ensure a configuration value lies in `[lo, hi]`.
pub fn check_range(link: &str, value: Real, lo: Real, hi: Real, what: &str) -> LinkResult<Real> {
    check_finite(link, value, what)?;
    if !in_range(lo, value, hi) {
        return Err(LinkError::init(
            link,
            format!("{what} must be in [{lo}, {hi}], got {value}"),
        ));
    }
    Ok(value)
}

/// Ensure a configuration value is strictly positive.
pub fn check_positive(link: &str, value: Real, what: &str) -> LinkResult<Real> {
    check_finite(link, value, what)?;
    if value <= 0.0 {
        return Err(LinkError::init(
            link,
            format!("{what} must be positive, got {value}"),
        ));
    }
    Ok(value)
}

/// Clamp a conductance to zero below the open-path limit.
pub fn limit_conductance(g: Real) -> Real {
    if g.is_finite() && g > CONDUCTANCE_LIMIT_MIN {
        g
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range() {
        assert!(check_range("l", 0.5, 0.0, 1.0, "blockage").is_ok());
        assert!(check_range("l", 1.5, 0.0, 1.0, "blockage").is_err());
        assert!(check_range("l", Real::NAN, 0.0, 1.0, "blockage").is_err());
    }

    #[test]
    fn test_check_positive() {
        assert!(check_positive("l", 2.0, "r").is_ok());
        assert!(check_positive("l", 0.0, "r").is_err());
        assert!(check_positive("l", Real::INFINITY, "r").is_err());
    }

    #[test]
    fn test_limit_conductance() {
        assert_eq!(limit_conductance(1e-200), 0.0);
        assert_eq!(limit_conductance(-1.0), 0.0);
        assert_eq!(limit_conductance(Real::NAN), 0.0);
        assert_eq!(limit_conductance(2.0), 2.0);
    }
}
