//! Player car: rigid bodies, motorized suspension joints, and the per-step
//! drive model.
//!
//! The car owns three bodies (chassis, front wheel, rear wheel) and two
//! wheel joints in the physics world. Control intents only flip flags; all
//! physical effect happens inside `update`, once per fixed step.

use nalgebra::Point2;
use rapier2d::prelude::*;
use serde::{Deserialize, Serialize};

use crate::physics::PhysicsWorld;
use crate::tuning::{CarTuning, TuningHandle};

// ---------------------------------------------------------------------------
// Fixed geometry and drive constants
// ---------------------------------------------------------------------------

const WHEEL_RADIUS: f32 = 0.4; // m
const CHASSIS_AREA: f32 = 3.4025; // m^2, area of the chassis polygon below
const CHASSIS_FRICTION: f32 = 0.3;
const CHASSIS_RESTITUTION: f32 = 0.1;
const CHASSIS_LINEAR_DAMPING: f32 = 0.2;
const CHASSIS_ANGULAR_DAMPING: f32 = 1.0;
const ENGINE_BLOCK_HALF_EXTENT: f32 = 0.25; // small heavy box at the nose
const ENGINE_BLOCK_OFFSET_X: f32 = 1.0;
const WHEEL_ANGULAR_DAMPING: f32 = 0.4;
const WHEEL_RESTITUTION: f32 = 0.2;
const WHEEL_MASS_FRACTION: f32 = 0.2; // of total car weight, per wheel
const FRONT_HARDPOINT: [f32; 2] = [1.0, -0.6]; // chassis-local
const REAR_HARDPOINT: [f32; 2] = [-1.0, -0.6];
const FRONT_INITIAL_MAX_TORQUE: f32 = 20.0;
const REAR_INITIAL_MAX_TORQUE: f32 = 10.0;
const GRAVITY_ACCEL: f32 = 9.8; // m/s^2, matches the world gravity

const REVERSE_ENGAGE_SPEED: f32 = 0.5; // m/s; braking below this reverses
const REVERSE_SPEED_FACTOR: f32 = 0.5; // of forward max speed
const REVERSE_TORQUE_FACTOR: f32 = 0.7; // of forward engine torque
const REVERSE_WEIGHT_FRACTION: f32 = 0.5; // flat split for the reverse clamp
const ALL_DRIVE_FRONT_SHARE: f32 = 0.6;
const ALL_DRIVE_REAR_SHARE: f32 = 0.4;

const DOWNFORCE_COEFFICIENT: f32 = 12.0; // N per (m/s)^2
const DOWNFORCE_OFFSET_X: f32 = 1.0; // chassis-local application point

// Anti-float correction: above this altitude an extra flat push (numerically
// the engine torque value) is applied nose-down. Empirically tuned, no
// physical derivation behind either constant.
const AIRBORNE_ALTITUDE_THRESHOLD: f32 = 5.5; // m

fn chassis_vertices() -> [Point<Real>; 6] {
    [
        point![-1.5, -0.5],
        point![1.5, -0.5],
        point![1.5, 0.0],
        point![0.0, 0.9],
        point![-1.15, 0.9],
        point![-1.5, 0.2],
    ]
}

// ---------------------------------------------------------------------------
// Drive layout
// ---------------------------------------------------------------------------

/// Which wheel(s) receive engine torque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveMode {
    Front,
    Rear,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axle {
    Front,
    Rear,
}

/// Torque distribution for a drive mode. Both the drive and the
/// brake/reverse paths consume this one table, so adding a layout is a
/// single-line change.
fn torque_split(mode: DriveMode) -> &'static [(Axle, f32)] {
    match mode {
        DriveMode::Front => &[(Axle::Front, 1.0)],
        DriveMode::Rear => &[(Axle::Rear, 1.0)],
        DriveMode::All => &[
            (Axle::Front, ALL_DRIVE_FRONT_SHARE),
            (Axle::Rear, ALL_DRIVE_REAR_SHARE),
        ],
    }
}

fn is_driven(mode: DriveMode, axle: Axle) -> bool {
    torque_split(mode).iter().any(|&(a, _)| a == axle)
}

/// Clamp a requested torque to what the tire can transmit. The contact force
/// is capped at `normal_force * grip`; torque is derated to match, never the
/// target wheel speed.
fn traction_limited_torque(requested_torque: f32, normal_force: f32, wheel_grip: f32) -> f32 {
    let traction_limit = normal_force * wheel_grip;
    let drive_force = requested_torque / WHEEL_RADIUS;
    if drive_force > traction_limit {
        traction_limit * WHEEL_RADIUS
    } else {
        requested_torque
    }
}

/// Box2d-style frequency/damping-ratio spring expressed as an
/// acceleration-based position motor: stiffness (2*pi*f)^2, damping
/// 2*zeta*2*pi*f.
fn suspension_spring(frequency_hz: f32, damping_ratio: f32) -> (f32, f32) {
    let omega = std::f32::consts::TAU * frequency_hz;
    (omega * omega, 2.0 * damping_ratio * omega)
}

// ---------------------------------------------------------------------------
// Car
// ---------------------------------------------------------------------------

pub struct Car {
    chassis: RigidBodyHandle,
    front_wheel: RigidBodyHandle,
    rear_wheel: RigidBodyHandle,
    front_spring: ImpulseJointHandle,
    rear_spring: ImpulseJointHandle,

    drive_mode: DriveMode,
    throttle: f32,        // actual, ramped 0..1
    throttle_target: f32, // intent, 0 or 1
    reverse_throttle: f32,
    braking: bool,
    nitro_active: bool,

    tuning: TuningHandle,
}

/// Read-only state handed to the renderer / HUD.
#[derive(Debug, Clone, Serialize)]
pub struct CarSnapshot {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub forward_speed: f32,
    pub throttle: f32,
    pub reverse_throttle: f32,
    pub braking: bool,
    pub nitro_active: bool,
    pub drive_mode: DriveMode,
}

impl Car {
    pub fn new(world: &mut PhysicsWorld, position: Point2<f32>, tuning: TuningHandle) -> Self {
        let snapshot = tuning.snapshot();

        let chassis = Self::build_chassis(world, position, &snapshot);
        let front_wheel = Self::build_wheel(
            world,
            point![position.x + FRONT_HARDPOINT[0], position.y + FRONT_HARDPOINT[1]],
            &snapshot,
        );
        let rear_wheel = Self::build_wheel(
            world,
            point![position.x + REAR_HARDPOINT[0], position.y + REAR_HARDPOINT[1]],
            &snapshot,
        );

        let front_spring = Self::build_suspension(
            world,
            chassis,
            front_wheel,
            FRONT_HARDPOINT,
            &snapshot,
            true,
            FRONT_INITIAL_MAX_TORQUE,
        );
        let rear_spring = Self::build_suspension(
            world,
            chassis,
            rear_wheel,
            REAR_HARDPOINT,
            &snapshot,
            false,
            REAR_INITIAL_MAX_TORQUE,
        );

        Self {
            chassis,
            front_wheel,
            rear_wheel,
            front_spring,
            rear_spring,
            drive_mode: DriveMode::Front,
            throttle: 0.0,
            throttle_target: 0.0,
            reverse_throttle: 0.0,
            braking: false,
            nitro_active: false,
            tuning,
        }
    }

    fn build_chassis(
        world: &mut PhysicsWorld,
        position: Point2<f32>,
        tuning: &CarTuning,
    ) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(vector![position.x, position.y])
            .linear_damping(CHASSIS_LINEAR_DAMPING)
            .angular_damping(CHASSIS_ANGULAR_DAMPING);
        let handle = world.bodies.insert(body);

        // Density chosen so the hull fixture masses chassis_weight.
        let hull = ColliderBuilder::convex_hull(&chassis_vertices())
            .unwrap_or_else(|| ColliderBuilder::cuboid(1.5, 0.7))
            .density(tuning.chassis_weight / CHASSIS_AREA)
            .friction(CHASSIS_FRICTION)
            .restitution(CHASSIS_RESTITUTION);
        world.colliders.insert_with_parent(hull, handle, &mut world.bodies);

        // The motor: a small, heavy box toward the nose. Shifts the weight
        // balance forward.
        let engine_block = ColliderBuilder::cuboid(ENGINE_BLOCK_HALF_EXTENT, ENGINE_BLOCK_HALF_EXTENT)
            .translation(vector![ENGINE_BLOCK_OFFSET_X, 0.0])
            .density(tuning.motor_weight)
            .friction(CHASSIS_FRICTION);
        world
            .colliders
            .insert_with_parent(engine_block, handle, &mut world.bodies);

        handle
    }

    fn build_wheel(
        world: &mut PhysicsWorld,
        center: Point<Real>,
        tuning: &CarTuning,
    ) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(vector![center.x, center.y])
            .angular_damping(WHEEL_ANGULAR_DAMPING);
        let handle = world.bodies.insert(body);

        // Each wheel masses a fixed fraction of the whole car.
        let total_weight = tuning.chassis_weight + tuning.motor_weight;
        let wheel_area = std::f32::consts::PI * WHEEL_RADIUS * WHEEL_RADIUS;
        let density = WHEEL_MASS_FRACTION * total_weight / wheel_area;

        let collider = ColliderBuilder::ball(WHEEL_RADIUS)
            .density(density)
            .friction(tuning.wheel_grip)
            .restitution(WHEEL_RESTITUTION);
        world
            .colliders
            .insert_with_parent(collider, handle, &mut world.bodies);

        handle
    }

    /// Wheel joint: suspension travel free along the chassis-local Y axis
    /// under a spring position motor, fore-aft play locked, wheel spin free
    /// under a force-based velocity motor.
    fn build_suspension(
        world: &mut PhysicsWorld,
        chassis: RigidBodyHandle,
        wheel: RigidBodyHandle,
        hardpoint: [f32; 2],
        tuning: &CarTuning,
        motor_enabled: bool,
        initial_max_torque: f32,
    ) -> ImpulseJointHandle {
        let (stiffness, damping) =
            suspension_spring(tuning.suspension_stiffness, tuning.suspension_damping);
        let axis = UnitVector::new_normalize(vector![0.0, 1.0]);
        let motor_factor = if motor_enabled { 1.0 } else { 0.0 };

        let joint = GenericJointBuilder::new(JointAxesMask::LIN_Y)
            .local_axis1(axis)
            .local_axis2(axis)
            .local_anchor1(point![hardpoint[0], hardpoint[1]])
            .local_anchor2(point![0.0, 0.0])
            .motor_position(JointAxis::LinX, 0.0, stiffness, damping)
            .motor_model(JointAxis::AngX, MotorModel::ForceBased)
            .motor_velocity(JointAxis::AngX, 0.0, motor_factor)
            .motor_max_force(JointAxis::AngX, initial_max_torque)
            .build();

        world.impulse_joints.insert(chassis, wheel, joint, true)
    }

    // -----------------------------------------------------------------------
    // Control intents (no physics side effects until the next update)
    // -----------------------------------------------------------------------

    pub fn on_throttle_start(&mut self) {
        self.throttle_target = 1.0;
    }

    pub fn on_throttle_end(&mut self) {
        self.throttle_target = 0.0;
    }

    pub fn on_brake_start(&mut self) {
        self.braking = true;
        self.throttle_target = 0.0;
    }

    pub fn on_brake_end(&mut self) {
        self.braking = false;
        self.reverse_throttle = 0.0;
    }

    pub fn on_nitro_start(&mut self) {
        self.nitro_active = true;
    }

    pub fn on_nitro_end(&mut self) {
        self.nitro_active = false;
    }

    pub fn set_drive_mode(&mut self, mode: DriveMode) {
        self.drive_mode = mode;
    }

    pub fn drive_mode(&self) -> DriveMode {
        self.drive_mode
    }

    // -----------------------------------------------------------------------
    // Per-step drive model
    // -----------------------------------------------------------------------

    pub fn update(&mut self, world: &mut PhysicsWorld, dt: f32) {
        let tuning = self.tuning.snapshot();

        // Throttle ramps asymmetrically toward its target and is forced to
        // zero outright while braking.
        if !self.braking {
            if self.throttle < self.throttle_target {
                self.throttle =
                    (self.throttle + tuning.throttle_inc_rate * dt).min(self.throttle_target);
            } else if self.throttle > self.throttle_target {
                self.throttle =
                    (self.throttle - tuning.throttle_dec_rate * dt).max(self.throttle_target);
            }
        } else {
            self.throttle = 0.0;
        }

        let (forward_speed, chassis_speed, nose_point, altitude) = {
            let chassis = &world.bodies[self.chassis];
            let forward = chassis.position() * vector![1.0, 0.0];
            let velocity = *chassis.linvel();
            (
                velocity.dot(&forward), // signed; reverse motion is negative
                velocity.norm(),
                chassis.position() * point![DOWNFORCE_OFFSET_X, 0.0],
                chassis.translation().y,
            )
        };
        let total_weight_force = (tuning.chassis_weight + tuning.motor_weight) * GRAVITY_ACCEL;

        if self.throttle > 0.0 && !self.braking {
            // Drive: traction-limited torque toward the target wheel speed.
            let nitro = if self.nitro_active {
                tuning.nitro_strength
            } else {
                1.0
            };
            let target_angular_speed = (tuning.max_speed * nitro) / WHEEL_RADIUS;
            let total_torque = self.throttle * tuning.engine_torque * nitro;

            for &(axle, share) in torque_split(self.drive_mode) {
                let normal_force = total_weight_force * self.weight_fraction(axle, &tuning);
                let torque =
                    traction_limited_torque(total_torque * share, normal_force, tuning.wheel_grip);
                // Negative motor speed drives the car forward.
                self.set_wheel_motor(world, axle, -target_angular_speed * self.throttle, torque);
            }
            self.release_undriven_wheels(world);
            self.reverse_throttle = 0.0;
        } else if self.braking {
            if forward_speed < REVERSE_ENGAGE_SPEED {
                // Slow enough: braking becomes reverse drive.
                self.reverse_throttle =
                    (self.reverse_throttle + tuning.throttle_inc_rate * dt).min(1.0);
                let reverse_target_speed =
                    (tuning.max_speed * REVERSE_SPEED_FACTOR) / WHEEL_RADIUS;
                let requested =
                    self.reverse_throttle * tuning.engine_torque * REVERSE_TORQUE_FACTOR;
                let normal_force = total_weight_force * REVERSE_WEIGHT_FRACTION;
                let torque =
                    traction_limited_torque(requested, normal_force, tuning.wheel_grip);

                for &(axle, share) in torque_split(self.drive_mode) {
                    let axle_torque = match self.drive_mode {
                        DriveMode::All => torque * share,
                        _ => torque,
                    };
                    // Positive motor speed: opposite of forward drive.
                    self.set_wheel_motor(
                        world,
                        axle,
                        reverse_target_speed * self.reverse_throttle,
                        axle_torque,
                    );
                }
                self.release_undriven_wheels(world);
            } else {
                // Still rolling forward: hold the wheels at zero target speed
                // to decelerate without reversing.
                self.reverse_throttle = 0.0;
                let brake_torque = tuning.engine_torque * tuning.brake_strength;

                for &(axle, share) in torque_split(self.drive_mode) {
                    let axle_torque = match self.drive_mode {
                        DriveMode::All => brake_torque * share,
                        _ => brake_torque,
                    };
                    self.set_wheel_motor(world, axle, 0.0, axle_torque);
                }
            }
        } else {
            // Coast: nothing drives, nothing brakes.
            self.throttle = 0.0;
            self.reverse_throttle = 0.0;
            self.release_wheel_motor(world, Axle::Front);
            self.release_wheel_motor(world, Axle::Rear);
        }

        // Aerodynamic nose-down force, quadratic in speed; applied ahead of
        // the center of mass so it stabilizes pitch.
        let downforce = DOWNFORCE_COEFFICIENT * chassis_speed * chassis_speed;
        let chassis = &mut world.bodies[self.chassis];
        chassis.add_force_at_point(vector![0.0, -downforce], nose_point, true);

        if altitude > AIRBORNE_ALTITUDE_THRESHOLD {
            chassis.add_force_at_point(vector![0.0, -tuning.engine_torque], nose_point, true);
        }
    }

    fn weight_fraction(&self, axle: Axle, tuning: &CarTuning) -> f32 {
        match axle {
            Axle::Front => tuning.front_weight_distribution,
            Axle::Rear => 1.0 - tuning.front_weight_distribution,
        }
    }

    fn spring(&self, axle: Axle) -> ImpulseJointHandle {
        match axle {
            Axle::Front => self.front_spring,
            Axle::Rear => self.rear_spring,
        }
    }

    fn set_wheel_motor(
        &self,
        world: &mut PhysicsWorld,
        axle: Axle,
        target_velocity: f32,
        max_torque: f32,
    ) {
        if let Some(joint) = world.impulse_joints.get_mut(self.spring(axle)) {
            joint
                .data
                .set_motor_velocity(JointAxis::AngX, target_velocity, 1.0)
                .set_motor_max_force(JointAxis::AngX, max_torque);
        }
    }

    /// A released motor applies no torque at all (the engine has no on/off
    /// flag, so zero target, zero gain, zero force stands in for "off").
    fn release_wheel_motor(&self, world: &mut PhysicsWorld, axle: Axle) {
        if let Some(joint) = world.impulse_joints.get_mut(self.spring(axle)) {
            joint
                .data
                .set_motor_velocity(JointAxis::AngX, 0.0, 0.0)
                .set_motor_max_force(JointAxis::AngX, 0.0);
        }
    }

    fn release_undriven_wheels(&self, world: &mut PhysicsWorld) {
        for axle in [Axle::Front, Axle::Rear] {
            if !is_driven(self.drive_mode, axle) {
                self.release_wheel_motor(world, axle);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Re-pose the bodies and zero every velocity and control flag, without
    /// recreating anything. Drive mode survives a reset.
    pub fn reset_position(&mut self, world: &mut PhysicsWorld, position: Point2<f32>) {
        let poses = [
            (self.chassis, position.x, position.y),
            (
                self.front_wheel,
                position.x + FRONT_HARDPOINT[0],
                position.y + FRONT_HARDPOINT[1],
            ),
            (
                self.rear_wheel,
                position.x + REAR_HARDPOINT[0],
                position.y + REAR_HARDPOINT[1],
            ),
        ];
        for (handle, x, y) in poses {
            let body = &mut world.bodies[handle];
            body.set_position(Isometry::translation(x, y), true);
            body.set_linvel(vector![0.0, 0.0], true);
            body.set_angvel(0.0, true);
        }

        self.throttle = 0.0;
        self.throttle_target = 0.0;
        self.reverse_throttle = 0.0;
        self.braking = false;
        self.nitro_active = false;
    }

    /// Remove the car's joints and bodies from the world. The car owns them
    /// exclusively, so nothing else may hold those handles.
    pub fn destroy(self, world: &mut PhysicsWorld) {
        world.impulse_joints.remove(self.front_spring, true);
        world.impulse_joints.remove(self.rear_spring, true);
        world.remove_body(self.front_wheel);
        world.remove_body(self.rear_wheel);
        world.remove_body(self.chassis);
    }

    // -----------------------------------------------------------------------
    // Read-only surface
    // -----------------------------------------------------------------------

    pub fn position(&self, world: &PhysicsWorld) -> Point2<f32> {
        let t = world.bodies[self.chassis].translation();
        Point2::new(t.x, t.y)
    }

    /// Signed speed along the chassis forward axis; negative while reversing.
    pub fn forward_speed(&self, world: &PhysicsWorld) -> f32 {
        let chassis = &world.bodies[self.chassis];
        let forward = chassis.position() * vector![1.0, 0.0];
        chassis.linvel().dot(&forward)
    }

    pub fn throttle(&self) -> f32 {
        self.throttle
    }

    pub fn reverse_throttle(&self) -> f32 {
        self.reverse_throttle
    }

    pub fn is_braking(&self) -> bool {
        self.braking
    }

    pub fn is_nitro_active(&self) -> bool {
        self.nitro_active
    }

    pub fn body(&self) -> RigidBodyHandle {
        self.chassis
    }

    pub fn front_wheel(&self) -> RigidBodyHandle {
        self.front_wheel
    }

    pub fn rear_wheel(&self) -> RigidBodyHandle {
        self.rear_wheel
    }

    pub fn snapshot(&self, world: &PhysicsWorld) -> CarSnapshot {
        let chassis = &world.bodies[self.chassis];
        CarSnapshot {
            x: chassis.translation().x,
            y: chassis.translation().y,
            angle: chassis.rotation().angle(),
            forward_speed: self.forward_speed(world),
            throttle: self.throttle,
            reverse_throttle: self.reverse_throttle,
            braking: self.braking,
            nitro_active: self.nitro_active,
            drive_mode: self.drive_mode,
        }
    }
}
