//! Movement models: collaborator seam only (spec §1 Out of scope, §3
//! `DTNHost` fields `destination`/`path`/`speed`/`nextMoveTime`).
//!
//! The engine never interprets path generation or map data itself — it only
//! asks a `MovementModel` for the next waypoint. Two trivial implementations
//! are provided so the `World`/`DTNHost` glue and the scenario tests have
//! something concrete to drive without depending on an external map/path
//! generator.

use rand::Rng;

use crate::coord::Coord;

/// A per-host movement strategy. `advance` is called once per tick (or once
/// per warm-up sub-step) and returns the host's new location.
pub trait MovementModel: std::fmt::Debug {
    fn advance(&mut self, current: Coord, speed: f64, dt: f64, rng: &mut dyn rand::RngCore) -> Coord;
}

/// A host that never moves. The default for scenarios that only care about
/// the connectivity/routing substrate (spec §8 scenarios 1-6 all use fixed
/// or manually-scripted positions).
#[derive(Debug, Clone, Copy, Default)]
pub struct StationaryMovement;

impl MovementModel for StationaryMovement {
    fn advance(&mut self, current: Coord, _speed: f64, _dt: f64, _rng: &mut dyn rand::RngCore) -> Coord {
        current
    }
}

/// Picks a uniformly random destination inside a rectangular world and walks
/// straight toward it at the host's configured speed, picking a new
/// destination on arrival.
#[derive(Debug, Clone)]
pub struct RandomWaypointMovement {
    width: f64,
    height: f64,
    destination: Option<Coord>,
}

impl RandomWaypointMovement {
    pub fn new(width: f64, height: f64) -> Self {
        RandomWaypointMovement { width, height, destination: None }
    }

    fn pick_destination(&self, rng: &mut dyn rand::RngCore) -> Coord {
        Coord::new(rng.gen_range(0.0..self.width), rng.gen_range(0.0..self.height))
    }
}

impl MovementModel for RandomWaypointMovement {
    fn advance(&mut self, current: Coord, speed: f64, dt: f64, rng: &mut dyn rand::RngCore) -> Coord {
        let destination = *self.destination.get_or_insert_with(|| self.pick_destination(rng));
        let remaining = current.distance(&destination);
        let step = speed * dt;
        if step >= remaining || remaining == 0.0 {
            self.destination = None;
            destination
        } else {
            let t = step / remaining;
            let moved = Coord::new(current.x + (destination.x - current.x) * t, current.y + (destination.y - current.y) * t);
            self.destination = Some(destination);
            moved
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn stationary_never_moves() {
        let mut m = StationaryMovement;
        let mut rng = StdRng::seed_from_u64(1);
        let here = Coord::new(5.0, 5.0);
        assert_eq!(m.advance(here, 10.0, 1.0, &mut rng), here);
    }

    #[test]
    fn random_waypoint_moves_toward_destination_at_configured_speed() {
        let mut m = RandomWaypointMovement::new(1000.0, 1000.0);
        let mut rng = StdRng::seed_from_u64(1);
        let start = Coord::new(0.0, 0.0);
        let moved = m.advance(start, 10.0, 1.0, &mut rng);
        // One tick at speed 10 covers exactly distance 10 toward the chosen
        // waypoint (unless the waypoint happens to be closer).
        assert!(moved.distance(&start) <= 10.0 + 1e-9);
    }

    #[test]
    fn random_waypoint_picks_new_destination_on_arrival() {
        let mut m = RandomWaypointMovement::new(1.0, 1.0); // tiny world, arrives fast
        let mut rng = StdRng::seed_from_u64(2);
        let mut pos = Coord::new(0.0, 0.0);
        for _ in 0..20 {
            pos = m.advance(pos, 10.0, 1.0, &mut rng);
        }
        assert!(pos.x >= 0.0 && pos.x <= 1.0);
        assert!(pos.y >= 0.0 && pos.y <= 1.0);
    }
}
