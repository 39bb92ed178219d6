//! Process-wide allocators and RNG seeds, encapsulated per Design Note §9
//! ("global mutable state") instead of a reflection-style `reset()` hook
//! list. Resetting between batch runs is `Context::fresh(seed)`.

use rand::SeedableRng;
use rand::rngs::StdRng;

/// Monotone per-process address allocators plus the seeded RNGs the
/// simulation's probabilistic strategies draw from.
pub struct SimulationContext {
    next_host_address: u32,
    next_interface_address: u32,
    next_connection_id: u64,
    pub update_order_rng: StdRng,
    pub strategy_rng: StdRng,
}

impl SimulationContext {
    /// Build a fresh context for one run, seeded from `run_index` and the
    /// configured base seed so successive batch runs are deterministic and
    /// distinct (spec §5: "deterministic given their run index").
    pub fn fresh(base_seed: u64, run_index: u64) -> Self {
        let seed = base_seed.wrapping_add(run_index.wrapping_mul(0x9E3779B97F4A7C15));
        SimulationContext {
            next_host_address: 0,
            next_interface_address: 0,
            next_connection_id: 0,
            update_order_rng: StdRng::seed_from_u64(seed),
            strategy_rng: StdRng::seed_from_u64(seed ^ 0xD1B5_4A32_D192_ED03),
        }
    }

    pub fn allocate_host_address(&mut self) -> u32 {
        let addr = self.next_host_address;
        self.next_host_address += 1;
        addr
    }

    pub fn allocate_interface_address(&mut self) -> u32 {
        let addr = self.next_interface_address;
        self.next_interface_address += 1;
        addr
    }

    pub fn allocate_connection_id(&mut self) -> u64 {
        let id = self.next_connection_id;
        self.next_connection_id += 1;
        id
    }
}
