//! Read-only snapshots handed to the host renderer / HUD.
//!
//! Everything here is a copy; there is no mutation path back into the
//! simulation from the consumer side.

use serde::Serialize;

use crate::car::{Car, CarSnapshot};
use crate::physics::PhysicsWorld;
use crate::terrain::ProceduralTerrain;

/// One frame's worth of observable simulation state.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub car: CarSnapshot,
    /// Approximate terrain height under the car, from the terrain's height
    /// query; consumers use it for ground-relative effects and fall checks.
    pub ground_height: f32,
}

impl Snapshot {
    pub fn capture(
        tick: u64,
        world: &PhysicsWorld,
        car: &Car,
        terrain: &ProceduralTerrain,
    ) -> Self {
        let car_snapshot = car.snapshot(world);
        let ground_height = terrain.get_height_at(world, car_snapshot.x);
        Self {
            tick,
            car: car_snapshot,
            ground_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::TerrainParams;
    use crate::tuning::{CarTuning, TuningHandle};
    use nalgebra::Point2;

    #[test]
    fn snapshot_serializes_for_the_host() {
        let mut world = PhysicsWorld::new();
        let terrain = ProceduralTerrain::new(
            &mut world,
            TerrainParams {
                seed: Some(11),
                ..TerrainParams::default()
            },
        );
        let car = Car::new(
            &mut world,
            Point2::new(0.0, 1.0),
            TuningHandle::new(CarTuning::default()),
        );

        let snapshot = Snapshot::capture(7, &world, &car, &terrain);
        assert_eq!(snapshot.tick, 7);
        assert_eq!(snapshot.ground_height, 0.0, "car starts on the flat run");

        let json = serde_json::to_string(&snapshot).expect("snapshot serializes");
        assert!(json.contains("\"tick\":7"));
        assert!(json.contains("\"forward_speed\""));
    }
}
