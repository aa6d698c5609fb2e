//! Fixed-timestep driver.
//!
//! Accumulates wall-clock time and advances the car and the physics world in
//! deterministic fixed slices, independent of the host's frame rate. A steps
//! cap bounds catch-up after a stall; time beyond the cap is discarded, not
//! simulated.

use log::warn;

use crate::car::Car;
use crate::physics::PhysicsWorld;

pub const DEFAULT_TIMESTEP: f32 = 1.0 / 60.0;
pub const DEFAULT_GAME_SPEED: f32 = 2.0;
pub const DEFAULT_VELOCITY_ITERATIONS: usize = 6;
pub const DEFAULT_POSITION_ITERATIONS: usize = 2;
const MAX_STEPS_PER_UPDATE: usize = 5;

pub struct PhysicsScheduler {
    dt: f32,
    game_speed: f32,
    velocity_iterations: usize,
    position_iterations: usize,
    max_steps: usize,
    accumulator: f32, // seconds of unconsumed simulated time, always >= 0
}

impl Default for PhysicsScheduler {
    fn default() -> Self {
        Self::new(
            DEFAULT_TIMESTEP,
            DEFAULT_GAME_SPEED,
            DEFAULT_VELOCITY_ITERATIONS,
            DEFAULT_POSITION_ITERATIONS,
        )
    }
}

impl PhysicsScheduler {
    pub fn new(
        dt: f32,
        game_speed: f32,
        velocity_iterations: usize,
        position_iterations: usize,
    ) -> Self {
        Self {
            dt,
            game_speed,
            velocity_iterations,
            position_iterations,
            max_steps: MAX_STEPS_PER_UPDATE,
            accumulator: 0.0,
        }
    }

    /// Drain accumulated frame time in fixed slices.
    ///
    /// Each slice updates the car's control model first, then steps the
    /// world, so motor parameters are always one slice fresh. Returns the
    /// number of slices performed; callers can watch this to detect stalls.
    pub fn update(&mut self, world: &mut PhysicsWorld, car: &mut Car, delta_time: f32) -> usize {
        self.accumulator += delta_time * self.game_speed;

        // Spiral-of-death guard: simulate at most max_steps slices per frame
        // and silently drop the rest.
        let ceiling = self.dt * self.max_steps as f32;
        if self.accumulator > ceiling {
            warn!(
                "physics accumulator at {:.4}s exceeds the {:.4}s cap, discarding the excess",
                self.accumulator, ceiling
            );
            self.accumulator = ceiling;
        }

        let mut steps = 0;
        while self.accumulator >= self.dt && steps < self.max_steps {
            car.update(world, self.dt);
            world.step(self.dt, self.velocity_iterations, self.position_iterations);
            self.accumulator -= self.dt;
            steps += 1;
        }

        // User forces persist inside the engine; drop them once per frame
        // after every slice has consumed them.
        world.clear_forces();

        steps
    }

    /// Forget any accumulated time, e.g. across a scene transition.
    pub fn reset_accumulator(&mut self) {
        self.accumulator = 0.0;
    }

    pub fn timestep(&self) -> f32 {
        self.dt
    }

    pub fn game_speed_multiplier(&self) -> f32 {
        self.game_speed
    }

    pub fn velocity_iterations(&self) -> usize {
        self.velocity_iterations
    }

    pub fn position_iterations(&self) -> usize {
        self.position_iterations
    }

    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::{CarTuning, TuningHandle};
    use nalgebra::Point2;
    use rapier2d::prelude::*;

    fn rig() -> (PhysicsWorld, Car) {
        let mut world = PhysicsWorld::new();
        let ground = world.bodies.insert(RigidBodyBuilder::fixed());
        world.colliders.insert_with_parent(
            ColliderBuilder::segment(point![-100.0, 0.0], point![500.0, 0.0]).friction(0.6),
            ground,
            &mut world.bodies,
        );
        let car = Car::new(
            &mut world,
            Point2::new(0.0, 1.0),
            TuningHandle::new(CarTuning::default()),
        );
        (world, car)
    }

    #[test]
    fn steps_never_exceed_the_cap() {
        let (mut world, mut car) = rig();
        let mut scheduler = PhysicsScheduler::default();

        // Ten seconds of frame time can never trigger more than max_steps.
        let steps = scheduler.update(&mut world, &mut car, 10.0);
        assert_eq!(steps, 5);
        assert!(
            scheduler.accumulator() < scheduler.timestep(),
            "cap consumes the clamped accumulator fully, got {}",
            scheduler.accumulator()
        );
    }

    #[test]
    fn accumulator_stays_below_one_timestep_when_uncapped() {
        let (mut world, mut car) = rig();
        let mut scheduler = PhysicsScheduler::default();

        // 0.02s * 2.0 speed = 0.04s -> two 1/60 steps with a small residue.
        let steps = scheduler.update(&mut world, &mut car, 0.02);
        assert_eq!(steps, 2);
        assert!(scheduler.accumulator() >= 0.0);
        assert!(scheduler.accumulator() < scheduler.timestep());
    }

    #[test]
    fn residual_time_carries_into_the_next_frame() {
        let (mut world, mut car) = rig();
        let mut scheduler = PhysicsScheduler::default();

        // 0.004s * 2.0 = 0.008s: too little for a step.
        assert_eq!(scheduler.update(&mut world, &mut car, 0.004), 0);
        let carried = scheduler.accumulator();
        assert!(carried > 0.0);

        // Another 0.01s tips it over one timestep.
        assert_eq!(scheduler.update(&mut world, &mut car, 0.005), 1);
    }

    #[test]
    fn game_speed_multiplier_scales_consumed_time() {
        let (mut world_slow, mut car_slow) = rig();
        let (mut world_fast, mut car_fast) = rig();
        let mut realtime = PhysicsScheduler::new(1.0 / 60.0, 1.0, 6, 2);
        let mut doubled = PhysicsScheduler::new(1.0 / 60.0, 2.0, 6, 2);

        let frame = 1.0 / 60.0;
        assert_eq!(realtime.update(&mut world_slow, &mut car_slow, frame), 1);
        assert_eq!(doubled.update(&mut world_fast, &mut car_fast, frame), 2);
    }

    #[test]
    fn reset_accumulator_discards_carried_time() {
        let (mut world, mut car) = rig();
        let mut scheduler = PhysicsScheduler::default();

        scheduler.update(&mut world, &mut car, 0.004);
        assert!(scheduler.accumulator() > 0.0);

        scheduler.reset_accumulator();
        assert_eq!(scheduler.accumulator(), 0.0);
        assert_eq!(scheduler.update(&mut world, &mut car, 0.004), 0);
    }

    #[test]
    fn getters_expose_the_configuration() {
        let scheduler = PhysicsScheduler::new(1.0 / 120.0, 1.5, 8, 3);
        assert_eq!(scheduler.timestep(), 1.0 / 120.0);
        assert_eq!(scheduler.game_speed_multiplier(), 1.5);
        assert_eq!(scheduler.velocity_iterations(), 8);
        assert_eq!(scheduler.position_iterations(), 3);
    }
}
