//! Ownership wrapper around the rapier2d world.
//!
//! The simulation core consumes the rigid-body engine strictly through this
//! surface: body/collider/joint storage, a fixed-dt `step` with configured
//! solver iteration counts, and per-frame force clearing. The engine itself
//! (solvers, collision detection, integration) is rapier's business.

use rapier2d::prelude::*;
use std::num::NonZeroUsize;

pub struct PhysicsWorld {
    pub gravity: Vector<Real>,
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub impulse_joints: ImpulseJointSet,
    pub multibody_joints: MultibodyJointSet,
    pub islands: IslandManager,
    pipeline: PhysicsPipeline,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    ccd: CCDSolver,
    integration: IntegrationParameters,
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self::with_gravity(vector![0.0, -9.8])
    }

    pub fn with_gravity(gravity: Vector<Real>) -> Self {
        Self {
            gravity,
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            islands: IslandManager::new(),
            pipeline: PhysicsPipeline::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            ccd: CCDSolver::new(),
            integration: IntegrationParameters::default(),
        }
    }

    /// Advance the world by one fixed slice.
    ///
    /// `velocity_iterations` and `position_iterations` map onto the solver's
    /// main and internal-PGS iteration counts.
    pub fn step(&mut self, dt: Real, velocity_iterations: usize, position_iterations: usize) {
        self.integration.dt = dt;
        self.integration.num_solver_iterations =
            NonZeroUsize::new(velocity_iterations).unwrap_or(NonZeroUsize::MIN);
        self.integration.num_internal_pgs_iterations = position_iterations.max(1);

        self.pipeline.step(
            &self.gravity,
            &self.integration,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            None,
            &(),
            &(),
        );
    }

    /// Drop the forces and torques accumulated through `add_force*` calls.
    ///
    /// User forces persist across steps until reset, so the frame driver
    /// clears them once after all sub-steps of a frame have run.
    pub fn clear_forces(&mut self) {
        for (_, body) in self.bodies.iter_mut() {
            body.reset_forces(false);
            body.reset_torques(false);
        }
    }

    /// Remove a body together with its colliders and any joints attached to
    /// it.
    pub fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drop_ball(world: &mut PhysicsWorld, position: Point<Real>) -> RigidBodyHandle {
        let body = world
            .bodies
            .insert(RigidBodyBuilder::dynamic().translation(vector![position.x, position.y]));
        world.colliders.insert_with_parent(
            ColliderBuilder::ball(0.5).density(1.0),
            body,
            &mut world.bodies,
        );
        body
    }

    #[test]
    fn world_starts_empty() {
        let world = PhysicsWorld::new();
        assert_eq!(world.bodies.len(), 0);
        assert_eq!(world.colliders.len(), 0);
    }

    #[test]
    fn gravity_pulls_dynamic_bodies_down() {
        let mut world = PhysicsWorld::new();
        let ball = drop_ball(&mut world, point![0.0, 10.0]);

        for _ in 0..60 {
            world.step(1.0 / 60.0, 6, 2);
        }

        let body = &world.bodies[ball];
        assert!(
            body.translation().y < 10.0,
            "body should fall, got y = {}",
            body.translation().y
        );
        assert!(body.linvel().y < 0.0, "velocity should point down");
    }

    #[test]
    fn segment_ground_stops_a_falling_body() {
        let mut world = PhysicsWorld::new();
        let ground = world.bodies.insert(RigidBodyBuilder::fixed());
        world.colliders.insert_with_parent(
            ColliderBuilder::segment(point![-20.0, 0.0], point![20.0, 0.0]).friction(0.6),
            ground,
            &mut world.bodies,
        );
        let ball = drop_ball(&mut world, point![0.0, 3.0]);

        for _ in 0..240 {
            world.step(1.0 / 60.0, 6, 2);
        }

        let y = world.bodies[ball].translation().y;
        assert!(y > 0.0, "ball should rest above the segment, got y = {y}");
        assert!(y < 1.0, "ball should have settled near the ground, got y = {y}");
    }

    #[test]
    fn clear_forces_drops_persistent_forces() {
        let mut world = PhysicsWorld::with_gravity(vector![0.0, 0.0]);
        let ball = drop_ball(&mut world, point![0.0, 0.0]);

        world.bodies[ball].add_force(vector![10_000.0, 0.0], true);
        world.clear_forces();
        world.step(1.0 / 60.0, 6, 2);

        let vx = world.bodies[ball].linvel().x;
        assert!(
            vx.abs() < 1e-4,
            "cleared force should not accelerate the body, got vx = {vx}"
        );
    }

    #[test]
    fn stepping_is_deterministic_across_runs() {
        fn run() -> Vec<(Real, Real)> {
            let mut world = PhysicsWorld::new();
            let ground = world.bodies.insert(RigidBodyBuilder::fixed());
            world.colliders.insert_with_parent(
                ColliderBuilder::segment(point![-50.0, 0.0], point![50.0, 0.0]).friction(0.6),
                ground,
                &mut world.bodies,
            );
            let ball = drop_ball(&mut world, point![0.3, 4.0]);

            let mut track = Vec::new();
            for _ in 0..120 {
                world.step(1.0 / 60.0, 6, 2);
                let t = world.bodies[ball].translation();
                track.push((t.x, t.y));
            }
            track
        }

        assert_eq!(run(), run(), "identical runs should produce identical tracks");
    }

    #[test]
    fn remove_body_also_removes_its_colliders() {
        let mut world = PhysicsWorld::new();
        let ball = drop_ball(&mut world, point![0.0, 0.0]);
        assert_eq!(world.colliders.len(), 1);

        world.remove_body(ball);
        assert_eq!(world.bodies.len(), 0);
        assert_eq!(world.colliders.len(), 0);
    }
}
