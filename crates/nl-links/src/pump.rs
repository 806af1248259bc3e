//! Pump driven by a pressure-rise curve.
//!
//! The curve gives the potential rise from port 0 (inlet) to port 1
//! (outlet) as a polynomial in flow, `rise(q) = c0 + c1*q + c2*q^2 + ...`,
//! at the reference speed. Other speeds follow the affinity laws: flow
//! scales with speed and rise with speed squared. Each minor step the
//! operating flow is found on the curve for the present rise and the curve
//! is linearized about it. The pump does not pass reverse flow.

use nl_core::{DIVIDE_GUARD, Real, RootSolver, evaluate_derivative, evaluate_polynomial};
use nl_network::NodeList;

use crate::common::{check_positive, check_range};
use crate::error::{LinkError, LinkResult};
use crate::link::{LinkCore, LinkInput};
use crate::traits::Link;

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct CurvePumpConfig {
    pub name: String,
    /// Rise-vs-flow coefficients at reference speed, ascending powers
    pub curve: Vec<Real>,
    /// Largest flow on the curve at reference speed
    pub max_flow: Real,
    pub reference_speed: Real,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct CurvePumpInput {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub link: LinkInput,
    pub speed: Real,
}

#[derive(Debug, Clone)]
pub struct CurvePump {
    core: LinkCore,
    curve: Vec<Real>,
    scaled: Vec<Real>,
    max_flow: Real,
    reference_speed: Real,
    speed: Real,
    solver: RootSolver,
    conductance: Real,
    source: Real,
    operating_flow: Real,
    blocked: bool,
}

impl CurvePump {
    pub const NUM_PORTS: usize = 2;

    pub fn new(
        config: &CurvePumpConfig,
        input: &CurvePumpInput,
        nodes: &NodeList,
        ports: &[usize],
    ) -> LinkResult<Self> {
        let mut link = Self {
            core: LinkCore::new(Self::NUM_PORTS),
            curve: Vec::new(),
            scaled: Vec::new(),
            max_flow: 0.0,
            reference_speed: 0.0,
            speed: 0.0,
            solver: RootSolver::new(),
            conductance: 0.0,
            source: 0.0,
            operating_flow: 0.0,
            blocked: false,
        };
        link.initialize(config, input, nodes, ports)?;
        Ok(link)
    }

    pub fn initialize(
        &mut self,
        config: &CurvePumpConfig,
        input: &CurvePumpInput,
        nodes: &NodeList,
        ports: &[usize],
    ) -> LinkResult<()> {
        self.core.invalidate();
        let name = &config.name;
        if config.curve.is_empty() || config.curve.iter().any(|c| !c.is_finite()) {
            return Err(LinkError::init(name, "curve coefficients must be finite and non-empty"));
        }
        check_positive(name, config.curve[0], "shutoff rise")?;
        check_positive(name, config.max_flow, "max flow")?;
        check_positive(name, config.reference_speed, "reference speed")?;
        check_range(name, input.speed, 0.0, Real::MAX, "speed")?;
        if evaluate_polynomial(&config.curve, config.max_flow) >= config.curve[0] {
            return Err(LinkError::init(name, "curve must fall from shutoff to max flow"));
        }

        self.core
            .initialize(name, &input.link, nodes, ports, |_, _, _| Ok(()))?;
        self.curve = config.curve.clone();
        self.scaled = config.curve.clone();
        self.max_flow = config.max_flow;
        self.reference_speed = config.reference_speed;
        self.speed = input.speed;
        self.conductance = 0.0;
        self.source = 0.0;
        self.operating_flow = 0.0;
        self.blocked = false;
        Ok(())
    }

    pub fn set_speed(&mut self, speed: Real) {
        if speed.is_finite() && speed >= 0.0 {
            self.speed = speed;
        }
    }

    pub fn speed(&self) -> Real {
        self.speed
    }

    /// Flow found on the curve at the last linearization.
    pub fn operating_flow(&self) -> Real {
        self.operating_flow
    }

    /// True when the rise exceeded shutoff and flow was blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    fn speed_ratio(&self) -> Real {
        self.speed / self.reference_speed
    }

    /// Curve at the present speed: `c_k * r^(2 - k)`.
    fn scale_curve(&mut self) {
        let r = self.speed_ratio();
        for (k, (scaled, &c)) in self.scaled.iter_mut().zip(&self.curve).enumerate() {
            *scaled = c * r.powi(2 - k as i32);
        }
    }

    /// Operating flow on the scaled curve for a given rise.
    fn solve_flow(&self, rise: Real, domain: Real) -> LinkResult<Real> {
        if rise >= self.scaled[0] {
            return Ok(0.0);
        }
        if rise <= evaluate_polynomial(&self.scaled, domain) {
            return Ok(domain);
        }
        let mut shifted = self.scaled.clone();
        shifted[0] -= rise;
        let seed = self.operating_flow.clamp(0.0, domain);
        self.solver
            .improve_root(seed, &shifted, domain)
            .map_err(|e| LinkError::numerical(self.core.name(), e.to_string()))
    }

    fn clear(&mut self) {
        self.conductance = 0.0;
        self.source = 0.0;
        self.core.clear_contribution();
    }
}

impl Link for CurvePump {
    fn core(&self) -> &LinkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LinkCore {
        &mut self.core
    }

    fn is_non_linear(&self) -> bool {
        true
    }

    fn update_state(&mut self, _nodes: &NodeList, _dt: Real) -> LinkResult<()> {
        self.scale_curve();
        Ok(())
    }

    fn contribute(&mut self, nodes: &NodeList, _dt: Real) -> LinkResult<()> {
        let factor = self.core.blockage_factor();
        let domain = self.max_flow * self.speed_ratio();
        let rise = -self.core.two_port_drop(nodes);
        self.blocked = rise >= self.scaled[0];
        if domain <= 0.0 || factor <= 0.0 || self.blocked {
            self.operating_flow = 0.0;
            self.clear();
            return Ok(());
        }

        let q = self.solve_flow(rise, domain)?;
        let slope = evaluate_derivative(&self.scaled, q);
        let g = if slope < -DIVIDE_GUARD { -1.0 / slope } else { 0.0 };
        self.operating_flow = q;
        self.conductance = g * factor;
        self.source = (q + g * rise) * factor;
        self.core.set_two_port_conductance(self.conductance);
        self.core.set_two_port_source(self.source);
        Ok(())
    }

    fn compute_flows(&mut self, nodes: &mut NodeList, _dt: Real) -> LinkResult<()> {
        self.core.ensure_initialized()?;
        let drop = self.core.two_port_drop(nodes);
        let flux = (self.source + self.conductance * drop).max(0.0);
        self.core.record_flows(drop, flux, flux * drop);
        self.core.transport_two_port_flux(nodes, flux);
        Ok(())
    }
}
