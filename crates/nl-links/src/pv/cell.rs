//! Single-diode photovoltaic cell as a Norton companion model.
//!
//! The cell obeys `I = Isc - Is * (exp(λ(V + I*Rs)) - 1)` with no shunt
//! resistance. Each minor step the trial operating point is filtered onto
//! the curve, clamped into `[0, Voc] x [0, Isc]`, and linearized into a
//! conductance `G = -dI/dV` and a source so that `I ≈ source - G*V`.

use nl_core::{Real, guarded_ln, in_range};

use crate::common::BOLTZMANN_OVER_CHARGE;

/// Largest exponent argument evaluated before clamping.
const EXP_ARG_MAX: Real = 700.0;

/// Passes allowed for the load-line prediction filter.
const LOAD_LINE_PASSES: usize = 10;

/// Iterations for the implicit current solve and the max-power search.
const SOLVE_ITERATIONS: usize = 60;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct PvCellConfig {
    /// Short-circuit current at reference illumination and temperature (A)
    pub short_circuit_current: Real,
    /// Open-circuit voltage at reference illumination and temperature (V)
    pub open_circuit_voltage: Real,
    /// Reference temperature (K)
    pub reference_temperature: Real,
    /// Diode ideality factor
    pub ideality: Real,
    /// Series resistance (ohm)
    pub series_resistance: Real,
    /// Fractional change in Isc per kelvin
    pub isc_temperature_coefficient: Real,
    /// Change in Voc per kelvin (V/K)
    pub voc_temperature_coefficient: Real,
    /// Fraction of Voc above which the log correction filter acts; zero
    /// selects load-line prediction instead
    pub filter_threshold: Real,
}

impl Default for PvCellConfig {
    fn default() -> Self {
        Self {
            short_circuit_current: 3.0,
            open_circuit_voltage: 0.6,
            reference_temperature: 300.0,
            ideality: 1.0,
            series_resistance: 0.0,
            isc_temperature_coefficient: 0.0,
            voc_temperature_coefficient: 0.0,
            filter_threshold: 0.0,
        }
    }
}

impl PvCellConfig {
    /// Check the configuration, naming the first offending field.
    pub fn validate(&self) -> Result<(), &'static str> {
        let finite = [
            self.short_circuit_current,
            self.open_circuit_voltage,
            self.reference_temperature,
            self.ideality,
            self.series_resistance,
            self.isc_temperature_coefficient,
            self.voc_temperature_coefficient,
            self.filter_threshold,
        ];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err("cell parameters must be finite");
        }
        if self.short_circuit_current <= 0.0 {
            return Err("short-circuit current must be positive");
        }
        if self.open_circuit_voltage <= 0.0 {
            return Err("open-circuit voltage must be positive");
        }
        if self.reference_temperature <= 0.0 {
            return Err("reference temperature must be positive");
        }
        if self.ideality <= 0.0 {
            return Err("ideality must be positive");
        }
        if self.series_resistance < 0.0 {
            return Err("series resistance must not be negative");
        }
        if !(0.0..1.0).contains(&self.filter_threshold) {
            return Err("filter threshold must be in [0, 1)");
        }
        Ok(())
    }
}

/// Slowly varying conditions, applied once per major step.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct PvEnvironment {
    /// Illumination as a fraction of reference
    pub illumination: Real,
    /// Cell temperature (K)
    pub temperature: Real,
    /// Fraction of output lost to degradation, in `[0, 1]`
    pub degradation: Real,
}

impl Default for PvEnvironment {
    fn default() -> Self {
        Self {
            illumination: 1.0,
            temperature: 300.0,
            degradation: 0.0,
        }
    }
}

/// Which side of the max-power point an operating voltage lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PvRegion {
    /// Below vmp: current nearly constant
    CurrentSource,
    /// At or above vmp: voltage nearly constant
    VoltageSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PvCell {
    config: PvCellConfig,
    isc: Real,
    voc: Real,
    saturation_current: Real,
    lambda: Real,
    vmp: Real,
    imp: Real,
    v: Real,
    i: Real,
    v_last: Real,
    i_last: Real,
    conductance: Real,
    source: Real,
    failed: bool,
}

impl PvCell {
    /// Build a cell at reference conditions. The config should already be
    /// validated.
    pub fn new(config: PvCellConfig) -> Self {
        let mut cell = Self {
            config,
            isc: 0.0,
            voc: 0.0,
            saturation_current: 0.0,
            lambda: 0.0,
            vmp: 0.0,
            imp: 0.0,
            v: 0.0,
            i: 0.0,
            v_last: 0.0,
            i_last: 0.0,
            conductance: 0.0,
            source: 0.0,
            failed: false,
        };
        let reference = PvEnvironment {
            temperature: cell.config.reference_temperature,
            ..PvEnvironment::default()
        };
        cell.update_parameters(&reference);
        cell
    }

    /// Refresh `isc`, `voc`, saturation current and the max-power point.
    pub fn update_parameters(&mut self, env: &PvEnvironment) {
        let c = &self.config;
        let temperature = if env.temperature.is_finite() && env.temperature > 0.0 {
            env.temperature
        } else {
            c.reference_temperature
        };
        let thermal_voltage = BOLTZMANN_OVER_CHARGE * temperature * c.ideality;
        let delta_t = temperature - c.reference_temperature;
        let illumination = if env.illumination.is_finite() {
            env.illumination.max(0.0)
        } else {
            0.0
        };
        let degradation = if env.degradation.is_finite() {
            env.degradation.clamp(0.0, 1.0)
        } else {
            0.0
        };

        self.lambda = 1.0 / thermal_voltage;
        self.isc = (c.short_circuit_current
            * illumination
            * (1.0 + c.isc_temperature_coefficient * delta_t)
            * (1.0 - degradation))
            .max(0.0);
        self.voc = if self.isc > 0.0 {
            (c.open_circuit_voltage
                + c.voc_temperature_coefficient * delta_t
                + thermal_voltage * guarded_ln(illumination, 0.0))
            .max(0.0)
        } else {
            0.0
        };

        let denominator = (self.voc * self.lambda).exp_m1();
        self.saturation_current = if self.voc > 0.0 && denominator.is_finite() && denominator > 0.0 {
            self.isc / denominator
        } else {
            0.0
        };

        self.update_max_power_point();
    }

    /// Ternary search for the peak of `V * I(V)` on `[0, Voc]`.
    fn update_max_power_point(&mut self) {
        let (mut lo, mut hi) = (0.0, self.voc);
        let power = |v: Real| v * self.current_at(v);
        for _ in 0..SOLVE_ITERATIONS {
            let third = (hi - lo) / 3.0;
            let (m1, m2) = (lo + third, hi - third);
            if power(m1) < power(m2) {
                lo = m1;
            } else {
                hi = m2;
            }
        }
        self.vmp = 0.5 * (lo + hi);
        self.imp = self.current_at(self.vmp);
    }

    fn exp_arg(&self, v: Real, i: Real) -> Real {
        (self.lambda * (v + i * self.config.series_resistance)).min(EXP_ARG_MAX)
    }

    /// Diode current at `(v, i)`.
    pub fn diode_current(&self, v: Real, i: Real) -> Real {
        self.saturation_current * self.exp_arg(v, i).exp_m1()
    }

    /// Cell current at voltage `v`, solving the implicit equation when the
    /// series resistance is nonzero.
    pub fn current_at(&self, v: Real) -> Real {
        if self.saturation_current <= 0.0 {
            return if v < self.voc { self.isc } else { 0.0 };
        }
        let rs = self.config.series_resistance;
        if rs == 0.0 {
            return self.isc - self.diode_current(v, 0.0);
        }
        // h(I) is increasing and convex; Newton from h >= 0 descends
        // monotonically onto the root.
        let mut i = self.isc.max(-v / rs);
        for _ in 0..SOLVE_ITERATIONS {
            let e = self.exp_arg(v, i).exp();
            let h = i - self.isc + self.saturation_current * (e - 1.0);
            let dh = 1.0 + self.saturation_current * self.lambda * rs * e;
            let step = h / dh;
            i -= step;
            if step.abs() <= 1.0e-12 * (1.0 + self.isc) {
                break;
            }
        }
        i
    }

    /// Voltage producing current `i`, when the curve reaches it.
    pub fn voltage_at(&self, i: Real) -> Option<Real> {
        if self.saturation_current <= 0.0 {
            return None;
        }
        let arg = (self.isc - i) / self.saturation_current + 1.0;
        (arg > 0.0).then(|| arg.ln() / self.lambda - i * self.config.series_resistance)
    }

    /// `-dI/dV` at `(v, i)`, including the series-resistance term.
    pub fn conductance_at(&self, v: Real, i: Real) -> Real {
        let a = self.saturation_current * self.lambda * self.exp_arg(v, i).exp();
        a / (1.0 + a * self.config.series_resistance)
    }

    /// Pull a trial point toward the curve.
    fn filter(&self, v: Real, i: Real) -> (Real, Real) {
        // Past open circuit the curve carries no current, whatever the trial said.
        if v >= self.voc {
            return (self.voc, 0.0);
        }
        if self.config.filter_threshold > 0.0 {
            self.log_correction(v, i)
        } else {
            self.load_line_prediction(v, i)
        }
    }

    /// Above the threshold voltage, trust the current and move the voltage
    /// onto the curve through the log form; below it, trust the voltage.
    fn log_correction(&self, v: Real, i: Real) -> (Real, Real) {
        if v > self.config.filter_threshold * self.voc {
            if let Some(corrected) = self.voltage_at(i) {
                return (corrected, i);
            }
        }
        (v, self.current_at(v))
    }

    /// Iterate along the trial load line `V = R*I(V)`, stopping early once
    /// the iterate swings back and forth across vmp. An iterate leaving
    /// `[0, Voc]` means the pass is diverging; the trial voltage is kept.
    fn load_line_prediction(&self, v: Real, i: Real) -> (Real, Real) {
        if v <= 0.0 || i <= 0.0 {
            return (v, self.current_at(v));
        }
        let resistance = v / i;
        let tolerance = 1.0e-12 * (1.0 + self.voc);
        let mut v_k = v;
        let mut side = v_k >= self.vmp;
        let mut flips = 0;
        for _ in 0..LOAD_LINE_PASSES {
            let v_next = resistance * self.current_at(v_k);
            if !in_range(0.0, v_next, self.voc) {
                return (v, self.current_at(v));
            }
            if (v_next - v_k).abs() <= tolerance {
                v_k = v_next;
                break;
            }
            let next_side = v_next >= self.vmp;
            if next_side != side {
                flips += 1;
                if flips >= 2 {
                    v_k = 0.5 * (v_k + v_next);
                    break;
                }
            }
            side = next_side;
            v_k = v_next;
        }
        (v_k, self.current_at(v_k))
    }

    /// Linearize about the trial point `(v, i)`.
    pub fn linearize(&mut self, v: Real, i: Real) {
        if self.failed {
            self.v = 0.0;
            self.i = 0.0;
            self.conductance = 0.0;
            self.source = 0.0;
            return;
        }
        let (v, i) = if v.is_finite() && i.is_finite() {
            (v, i)
        } else {
            (self.v_last, self.i_last)
        };

        let (v, i) = self.filter(v, i);
        let (v, i) = if v >= self.voc {
            (self.voc, 0.0)
        } else if v <= 0.0 {
            (0.0, self.isc)
        } else {
            (v, i)
        };

        let g = self.conductance_at(v, i);
        let (g, source) = if g.is_finite() {
            (g, self.isc - self.diode_current(v, i) + g * v)
        } else {
            (0.0, i)
        };
        self.v = v;
        self.i = i;
        self.conductance = g;
        self.source = source;
    }

    /// Accept the current operating point as converged.
    pub fn commit(&mut self) {
        self.v_last = self.v;
        self.i_last = self.i;
    }

    pub fn region(&self, v: Real) -> PvRegion {
        if v < self.vmp {
            PvRegion::CurrentSource
        } else {
            PvRegion::VoltageSource
        }
    }

    pub fn set_failed(&mut self, failed: bool) {
        self.failed = failed;
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn config(&self) -> &PvCellConfig {
        &self.config
    }

    pub fn isc(&self) -> Real {
        self.isc
    }

    pub fn voc(&self) -> Real {
        self.voc
    }

    pub fn saturation_current(&self) -> Real {
        self.saturation_current
    }

    pub fn vmp(&self) -> Real {
        self.vmp
    }

    pub fn imp(&self) -> Real {
        self.imp
    }

    /// Filtered, clamped trial voltage.
    pub fn voltage(&self) -> Real {
        self.v
    }

    pub fn current(&self) -> Real {
        self.i
    }

    pub fn last_voltage(&self) -> Real {
        self.v_last
    }

    pub fn last_current(&self) -> Real {
        self.i_last
    }

    pub fn conductance(&self) -> Real {
        self.conductance
    }

    pub fn source(&self) -> Real {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cell() -> PvCell {
        PvCell::new(PvCellConfig::default())
    }

    #[test]
    fn reference_parameters() {
        let c = cell();
        assert!((c.isc() - 3.0).abs() < 1e-12);
        assert!((c.voc() - 0.6).abs() < 1e-12);
        assert!(c.saturation_current() > 0.0);
        assert!(c.current_at(c.voc()).abs() < 1e-9);
        assert!((c.current_at(0.0) - 3.0).abs() < 1e-9);
        assert!(c.vmp() > 0.0 && c.vmp() < c.voc());
        assert!(c.imp() > 0.0 && c.imp() < c.isc());
    }

    #[test]
    fn voc_clamp() {
        let mut c = cell();
        c.linearize(0.65, 0.0);
        assert_eq!(c.voltage(), 0.6);
        assert_eq!(c.current(), 0.0);
        // The Norton pair delivers no current at the clamp point.
        let terminal = c.source() - c.conductance() * c.voltage();
        assert!(terminal.abs() < 1e-9, "terminal current {terminal}");
        assert!(c.conductance() > 0.0);
    }

    #[test]
    fn beyond_voc_clamps_whatever_the_current() {
        for threshold in [0.0, 0.5] {
            for i in [0.0, 0.01, 0.1, 1.0, 2.9, -1.0] {
                let mut c = PvCell::new(PvCellConfig {
                    filter_threshold: threshold,
                    ..Default::default()
                });
                c.linearize(0.65, i);
                assert_eq!((c.voltage(), c.current()), (0.6, 0.0), "threshold {threshold} i {i}");
                let terminal = c.source() - c.conductance() * c.voltage();
                assert!(terminal.abs() < 1e-9);
                assert!(c.conductance() > 1.0);
            }
        }
    }

    #[test]
    fn diverging_load_line_keeps_trial_voltage() {
        // R = 59 ohm near open circuit: the fixed-point pass overshoots Voc.
        let mut c = cell();
        c.linearize(0.59, 0.01);
        assert_eq!(c.voltage(), 0.59);
        assert!((c.current() - c.current_at(0.59)).abs() < 1e-12);
        assert!(c.current() > 0.0 && c.current() < c.isc());
    }

    #[test]
    fn short_circuit_clamp() {
        let mut c = cell();
        c.linearize(-0.1, 5.0);
        assert_eq!(c.voltage(), 0.0);
        assert_eq!(c.current(), 3.0);
        assert!((c.source() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn dark_cell_contributes_nothing() {
        let mut c = cell();
        c.update_parameters(&PvEnvironment {
            illumination: 0.0,
            ..Default::default()
        });
        assert_eq!(c.isc(), 0.0);
        assert_eq!(c.voc(), 0.0);
        assert_eq!(c.saturation_current(), 0.0);
        c.linearize(0.3, 1.0);
        assert_eq!(c.conductance(), 0.0);
        assert_eq!(c.source(), 0.0);
    }

    #[test]
    fn failed_cell_zeroes_outputs() {
        let mut c = cell();
        c.set_failed(true);
        c.linearize(0.3, 1.0);
        assert_eq!(c.conductance(), 0.0);
        assert_eq!(c.source(), 0.0);
    }

    #[test]
    fn temperature_lowers_voc() {
        let mut c = PvCell::new(PvCellConfig {
            voc_temperature_coefficient: -2.0e-3,
            ..Default::default()
        });
        c.update_parameters(&PvEnvironment {
            temperature: 350.0,
            ..Default::default()
        });
        assert!((c.voc() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn series_resistance_current_solve() {
        let c = PvCell::new(PvCellConfig {
            series_resistance: 0.01,
            ..Default::default()
        });
        for v in [0.0, 0.2, 0.45, 0.55] {
            let i = c.current_at(v);
            let residual = i - c.isc() + c.diode_current(v, i);
            assert!(residual.abs() < 1e-9, "v {v} residual {residual}");
        }
    }

    #[test]
    fn log_correction_moves_voltage_onto_curve() {
        let mut c = PvCell::new(PvCellConfig {
            filter_threshold: 0.5,
            ..Default::default()
        });
        c.linearize(0.58, 1.0);
        assert!((c.current_at(c.voltage()) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn load_line_prediction_lands_on_curve() {
        let mut c = cell();
        c.linearize(0.3, 1.0);
        assert!((c.current_at(c.voltage()) - c.current()).abs() < 1e-9);
    }

    #[test]
    fn commit_records_last_point() {
        let mut c = cell();
        c.linearize(0.3, 2.9);
        c.commit();
        assert_eq!(c.last_voltage(), c.voltage());
        assert_eq!(c.last_current(), c.current());
    }

    #[test]
    fn config_validation() {
        assert!(PvCellConfig::default().validate().is_ok());
        let bad = PvCellConfig {
            filter_threshold: 1.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = PvCellConfig {
            open_circuit_voltage: 0.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    proptest! {
        #[test]
        fn linearized_point_is_clamped(
            v in -2.0_f64..2.0,
            i in -5.0_f64..10.0,
            threshold in prop_oneof![Just(0.0), 0.1_f64..0.9],
            rs in 0.0_f64..0.05,
        ) {
            let mut c = PvCell::new(PvCellConfig {
                filter_threshold: threshold,
                series_resistance: rs,
                ..Default::default()
            });
            c.linearize(v, i);
            prop_assert!(c.voltage() >= 0.0 && c.voltage() <= c.voc());
            if v >= c.voc() {
                prop_assert_eq!((c.voltage(), c.current()), (c.voc(), 0.0));
            }
            prop_assert!(c.conductance().is_finite() && c.conductance() >= 0.0);
            prop_assert!(c.source().is_finite());
            if c.voltage() == c.voc() {
                prop_assert_eq!(c.current(), 0.0);
            }
            if c.voltage() == 0.0 {
                prop_assert_eq!(c.current(), c.isc());
            }
        }
    }
}
