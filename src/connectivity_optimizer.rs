//! Spatial hash over interfaces of one interface-type (spec §4.7).
//!
//! Grounded on the teacher's `simulation::geometry` approach of avoiding
//! quadratic candidate scans via cheap precomputation, generalized from a
//! line-of-sight check into a uniform grid keyed by cell size.

use std::collections::HashMap;

use crate::coord::Coord;

type CellKey = (i64, i64);

/// A uniform grid spatial index for one interface-type. Queries return the
/// union of interfaces in the owning cell and its eight neighbors.
pub struct ConnectivityOptimizer {
    cell_size: f64,
    cells: HashMap<CellKey, Vec<u32>>,
    positions: HashMap<u32, Coord>,
}

impl ConnectivityOptimizer {
    /// `cell_size_mult` must be >= 2 (spec §4.7 invariant); `max_range` is
    /// the largest transmit range configured for this interface type.
    pub fn new(cell_size_mult: f64, max_range: f64) -> Self {
        assert!(cell_size_mult >= 2.0, "cellSizeMult must be >= 2, got {cell_size_mult}");
        ConnectivityOptimizer {
            cell_size: cell_size_mult * max_range,
            cells: HashMap::new(),
            positions: HashMap::new(),
        }
    }

    fn cell_of(&self, pos: &Coord) -> CellKey {
        ((pos.x / self.cell_size).floor() as i64, (pos.y / self.cell_size).floor() as i64)
    }

    /// Insert or move an interface to its current cell.
    pub fn update_position(&mut self, interface: u32, pos: Coord) {
        if let Some(old) = self.positions.get(&interface) {
            let old_key = self.cell_of(old);
            if let Some(bucket) = self.cells.get_mut(&old_key) {
                bucket.retain(|&i| i != interface);
            }
        }
        let key = self.cell_of(&pos);
        self.cells.entry(key).or_default().push(interface);
        self.positions.insert(interface, pos);
    }

    pub fn remove(&mut self, interface: u32) {
        if let Some(old) = self.positions.remove(&interface) {
            let old_key = self.cell_of(&old);
            if let Some(bucket) = self.cells.get_mut(&old_key) {
                bucket.retain(|&i| i != interface);
            }
        }
    }

    /// All interfaces sharing the owning cell and its eight neighbors.
    pub fn candidates_near(&self, pos: &Coord) -> Vec<u32> {
        let (cx, cy) = self.cell_of(pos);
        let mut result = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(bucket) = self.cells.get(&(cx + dx, cy + dy)) {
                    result.extend_from_slice(bucket);
                }
            }
        }
        result
    }

    pub fn reset(&mut self) {
        self.cells.clear();
        self.positions.clear();
    }
}
