//! Global system assembly and factorization.
//!
//! Each link's local admittance cells are scattered into a dense
//! `num_nodes x num_nodes` matrix through its admittance map; ground rows
//! and columns never appear. The LU factorization is kept between minor
//! steps and recomputed only when some link flags its admittance as
//! changed or the set of held nodes changes.

use nalgebra::{DMatrix, DVector, Dyn, LU};
use nl_core::Real;
use nl_links::Link;
use nl_network::{AdmittanceMap, NodeList};

use crate::error::{SolverError, SolverResult};

#[derive(Debug)]
pub struct SystemMatrix {
    dim: usize,
    admittance: DMatrix<Real>,
    source: DVector<Real>,
    held: Vec<bool>,
    lu: Option<LU<Real, Dyn, Dyn>>,
}

impl SystemMatrix {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            admittance: DMatrix::zeros(dim, dim),
            source: DVector::zeros(dim),
            held: vec![false; dim],
            lu: None,
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// True if the factorization is missing or was built for other held nodes.
    pub fn needs_decomposition(&self, held: &[bool]) -> bool {
        self.lu.is_none() || self.held != held
    }

    /// Drop the factorization so the next solve rebuilds it.
    pub fn invalidate(&mut self) {
        self.lu = None;
    }

    /// Assemble and factor the admittance matrix.
    ///
    /// Rows of held nodes become identity rows; every other diagonal gets
    /// the leak conductance.
    pub fn decompose(
        &mut self,
        links: &[Box<dyn Link>],
        held: Vec<bool>,
        leak_conductance: Real,
    ) -> SolverResult<()> {
        self.admittance.fill(0.0);
        for link in links {
            let core = link.core();
            for (&cell, slot) in core.admittance().iter().zip(core.admittance_map().slots()) {
                if let Some(slot) = *slot {
                    let (row, col) = AdmittanceMap::split(slot, self.dim);
                    self.admittance[(row, col)] += cell;
                }
            }
        }
        for (i, &is_held) in held.iter().enumerate() {
            if is_held {
                self.admittance.row_mut(i).fill(0.0);
                self.admittance[(i, i)] = 1.0;
            } else {
                self.admittance[(i, i)] += leak_conductance;
            }
        }

        let lu = self.admittance.clone().lu();
        if !lu.is_invertible() {
            self.lu = None;
            return Err(SolverError::Singular {
                what: format!("{} x {} admittance matrix is not invertible", self.dim, self.dim),
            });
        }
        self.lu = Some(lu);
        self.held = held;
        Ok(())
    }

    /// Assemble the source vector and solve for node potentials.
    pub fn solve(&mut self, links: &[Box<dyn Link>], nodes: &NodeList) -> SolverResult<Vec<Real>> {
        self.source.fill(0.0);
        for link in links {
            let core = link.core();
            for (&node, &source) in core.node_map().iter().zip(core.source()) {
                if node < self.dim {
                    self.source[node] += source;
                }
            }
        }
        for (i, &is_held) in self.held.iter().enumerate() {
            if is_held {
                self.source[i] = nodes.potential(i);
            }
        }

        let lu = self.lu.as_ref().ok_or_else(|| SolverError::Singular {
            what: "no factorization available".to_string(),
        })?;
        let x = lu.solve(&self.source).ok_or_else(|| SolverError::Singular {
            what: "LU solve failed".to_string(),
        })?;
        if x.iter().any(|v| !v.is_finite()) {
            return Err(SolverError::Singular {
                what: "solution is not finite".to_string(),
            });
        }
        Ok(x.iter().copied().collect())
    }
}

/// Nodes held at their present potential because some link overrides a
/// port mapped to them.
pub fn held_nodes(links: &[Box<dyn Link>], dim: usize) -> Vec<bool> {
    let mut held = vec![false; dim];
    for link in links {
        let core = link.core();
        for (&node, &overridden) in core.node_map().iter().zip(core.overrides()) {
            if overridden && node < dim {
                held[node] = true;
            }
        }
    }
    held
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl_links::{Conductor, ConductorConfig};

    fn conductor(name: &str, g: Real, nodes: &NodeList, ports: &[usize]) -> Box<dyn Link> {
        let config = ConductorConfig {
            name: name.into(),
            conductance: g,
        };
        let mut link = Conductor::new(&config, &Default::default(), nodes, ports).unwrap();
        link.step(nodes, 0.1).unwrap();
        Box::new(link)
    }

    #[test]
    fn assembles_ground_free_matrix() {
        let nodes = NodeList::new(["a", "b"]);
        let links = vec![
            conductor("r1", 2.0, &nodes, &[0, 1]),
            conductor("r2", 3.0, &nodes, &[1, 2]),
        ];
        let mut system = SystemMatrix::new(2);
        system.decompose(&links, vec![false; 2], 0.0).unwrap();
        assert_eq!(system.admittance[(0, 0)], 2.0);
        assert_eq!(system.admittance[(0, 1)], -2.0);
        assert_eq!(system.admittance[(1, 1)], 5.0);
    }

    #[test]
    fn floating_node_needs_leak() {
        let nodes = NodeList::new(["a", "b"]);
        let links = vec![conductor("r1", 2.0, &nodes, &[0, 1])];
        let mut system = SystemMatrix::new(2);
        assert!(matches!(
            system.decompose(&links, vec![false; 2], 0.0),
            Err(SolverError::Singular { .. })
        ));
        system.decompose(&links, vec![false; 2], 1e-12).unwrap();
        let x = system.solve(&links, &nodes).unwrap();
        assert_eq!(x, vec![0.0, 0.0]);
    }

    #[test]
    fn held_node_keeps_potential() {
        let mut nodes = NodeList::new(["a", "b"]);
        nodes.set_potentials(&[7.0, 0.0]);
        let mut links = vec![
            conductor("r1", 1.0, &nodes, &[0, 1]),
            conductor("r2", 1.0, &nodes, &[1, 2]),
        ];
        links[0].core_mut().set_override(0, true).unwrap();
        let held = held_nodes(&links, 2);
        assert_eq!(held, vec![true, false]);

        let mut system = SystemMatrix::new(2);
        assert!(system.needs_decomposition(&held));
        system.decompose(&links, held.clone(), 0.0).unwrap();
        assert!(!system.needs_decomposition(&held));
        let x = system.solve(&links, &nodes).unwrap();
        assert_eq!(x[0], 7.0);
        assert!((x[1] - 3.5).abs() < 1e-12);
    }
}
