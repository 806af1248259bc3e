//! Admittance maps: local link cells to global matrix slots.
//!
//! A link with `n` ports stores a dense `n x n` admittance matrix in
//! row-major order. Its admittance map has one entry per local cell giving
//! the flattened position of that cell in the global `num_nodes x num_nodes`
//! matrix, or `None` when either node of the pair is ground. Ground rows and
//! columns are never assembled.

/// Flattened local-to-global index for one link's admittance cells.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdmittanceMap {
    num_ports: usize,
    slots: Vec<Option<usize>>,
}

impl AdmittanceMap {
    /// Build the map for a port→node map. `ground` is the ground node index,
    /// which is also the dimension of the global matrix.
    pub fn build(node_map: &[usize], ground: usize) -> Self {
        let num_ports = node_map.len();
        let mut slots = Vec::with_capacity(num_ports * num_ports);
        for &row in node_map {
            for &col in node_map {
                let slot = (row < ground && col < ground).then(|| row * ground + col);
                slots.push(slot);
            }
        }
        Self { num_ports, slots }
    }

    pub fn num_ports(&self) -> usize {
        self.num_ports
    }

    /// Global slot for local cell `(row, col)`; `None` for ground or out of range.
    pub fn slot(&self, row: usize, col: usize) -> Option<usize> {
        if row >= self.num_ports || col >= self.num_ports {
            return None;
        }
        self.slots[row * self.num_ports + col]
    }

    /// All slots, row-major, aligned with the link's admittance matrix.
    pub fn slots(&self) -> &[Option<usize>] {
        &self.slots
    }

    /// Split a global slot into `(row, col)` of a `dim x dim` matrix.
    pub fn split(slot: usize, dim: usize) -> (usize, usize) {
        (slot / dim, slot % dim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_port_between_regular_nodes() {
        // 3 regular nodes, ground = 3
        let map = AdmittanceMap::build(&[0, 2], 3);
        assert_eq!(map.slots(), &[Some(0), Some(2), Some(6), Some(8)]);
        assert_eq!(AdmittanceMap::split(6, 3), (2, 0));
    }

    #[test]
    fn ground_cells_are_omitted() {
        let map = AdmittanceMap::build(&[1, 3], 3);
        assert_eq!(map.slot(0, 0), Some(4));
        assert_eq!(map.slot(0, 1), None);
        assert_eq!(map.slot(1, 0), None);
        assert_eq!(map.slot(1, 1), None);
        assert_eq!(map.slot(2, 0), None);
    }
}
