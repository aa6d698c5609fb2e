//! Procedural terrain: seeded segment generation, special features, and an
//! approximate height lookup.
//!
//! Generation runs ahead of the player and prunes its chunk records behind
//! them. Everything random flows through one LCG so a given seed replays the
//! exact same track.

use log::{debug, info};
use rand::Rng;
use rapier2d::prelude::*;
use serde::{Deserialize, Serialize};

use crate::physics::PhysicsWorld;

// ---------------------------------------------------------------------------
// Seeded randomness
// ---------------------------------------------------------------------------

// LCG constants are a compatibility contract: a saved seed must keep
// producing the same track, so the multiplier, increment, modulus and the
// one-draw-per-decision call order are all fixed.
const LCG_MULTIPLIER: u64 = 9301;
const LCG_INCREMENT: u64 = 49297;
const LCG_MODULUS: u64 = 233280;

#[derive(Debug, Clone, Copy)]
pub struct TerrainRng {
    seed: u32,
}

impl TerrainRng {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    /// Draw the next value in `[min, max)`.
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        self.seed = ((self.seed as u64 * LCG_MULTIPLIER + LCG_INCREMENT) % LCG_MODULUS) as u32;
        let unit = self.seed as f32 / LCG_MODULUS as f32;
        min + unit * (max - min)
    }
}

// ---------------------------------------------------------------------------
// Generation parameters
// ---------------------------------------------------------------------------

/// Special obstacles the generator may inject between plain segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Ramp,
    BoxPile,
    Bridge,
    Teeter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    pub max_angle_deg: f32,      // steepest drivable slope
    pub min_segment_length: f32, // m
    pub max_segment_length: f32, // m
    pub max_height_change: f32,  // m, hard cap on per-segment delta
    pub ground_friction: f32,
    pub feature_probability: f32, // per segment, 0..1
    /// Enabled feature rotation. Teeter exists but is not in the stock
    /// rotation.
    pub features: Vec<Feature>,
    /// Pin the seed for a reproducible track; `None` draws a random one.
    pub seed: Option<u32>,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            max_angle_deg: 20.0,
            min_segment_length: 5.0,
            max_segment_length: 20.0,
            max_height_change: 3.0,
            ground_friction: 0.6,
            feature_probability: 0.1,
            features: vec![Feature::Ramp, Feature::BoxPile, Feature::Bridge],
            seed: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Terrain
// ---------------------------------------------------------------------------

/// X-interval covered by one generated segment or feature. Insertion order is
/// generation order, monotonically increasing in X.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chunk {
    pub start_x: f32,
    pub end_x: f32,
}

const GENERATION_DISTANCE: f32 = 300.0; // keep this much track ahead of the player
const CLEANUP_DISTANCE: f32 = 100.0; // stop tracking chunks this far behind
const INITIAL_START_X: f32 = -20.0;
const INITIAL_END_X: f32 = 50.0;
const INITIAL_GENERATION_TARGET: f32 = 200.0;
const RANDOM_SEED_RANGE: u32 = 1_000_000;

pub struct ProceduralTerrain {
    ground: RigidBodyHandle,
    params: TerrainParams,
    rng: TerrainRng,
    initial_seed: u32,
    last_x: f32,
    last_y: f32,
    chunks: Vec<Chunk>,
    feature_bodies: Vec<RigidBodyHandle>,
    feature_joints: Vec<ImpulseJointHandle>,
}

impl ProceduralTerrain {
    pub fn new(world: &mut PhysicsWorld, params: TerrainParams) -> Self {
        let initial_seed = params
            .seed
            .unwrap_or_else(|| rand::thread_rng().gen_range(0..RANDOM_SEED_RANGE));
        let ground = world.bodies.insert(RigidBodyBuilder::fixed());

        let mut terrain = Self {
            ground,
            params,
            rng: TerrainRng::new(initial_seed),
            initial_seed,
            last_x: 0.0,
            last_y: 0.0,
            chunks: Vec::new(),
            feature_bodies: Vec::new(),
            feature_joints: Vec::new(),
        };
        terrain.create_initial_terrain(world);
        terrain
    }

    /// The seed this terrain was created with; `reset(None)` reuses it.
    pub fn seed(&self) -> u32 {
        self.initial_seed
    }

    pub fn ground(&self) -> RigidBodyHandle {
        self.ground
    }

    /// Currently tracked chunk intervals, oldest first.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Extend generation ahead of the player and prune tracking behind them.
    ///
    /// Pruning is bookkeeping only: the chunk record is dropped, the
    /// colliders stay in the world.
    pub fn update(&mut self, world: &mut PhysicsWorld, player_x: f32) {
        if self.last_x < player_x + GENERATION_DISTANCE {
            self.generate_terrain(world, player_x + GENERATION_DISTANCE);
        }
        self.cleanup_old_chunks(player_x);
    }

    /// Approximate terrain height at `x`.
    ///
    /// Interpolates along the ground segment covering `x`; outside every
    /// tracked chunk it falls back to the last generated height. Callers
    /// (e.g. fallen-car detection) must tolerate the error margin.
    pub fn get_height_at(&self, world: &PhysicsWorld, x: f32) -> f32 {
        for chunk in &self.chunks {
            if x < chunk.start_x || x > chunk.end_x {
                continue;
            }
            if chunk.start_x == INITIAL_START_X && chunk.end_x == INITIAL_END_X {
                return 0.0;
            }
            if let Some(ground) = world.bodies.get(self.ground) {
                for &collider_handle in ground.colliders() {
                    let Some(collider) = world.colliders.get(collider_handle) else {
                        continue;
                    };
                    let Some(segment) = collider.shape().as_segment() else {
                        continue;
                    };
                    if x >= segment.a.x && x <= segment.b.x {
                        let t = (x - segment.a.x) / (segment.b.x - segment.a.x);
                        return segment.a.y + t * (segment.b.y - segment.a.y);
                    }
                }
            }
        }
        self.last_y
    }

    /// Tear down every generated fixture and feature, then regenerate from
    /// scratch. `seed` defaults to the initial seed, which makes a restart
    /// reproduce the original track exactly.
    pub fn reset(&mut self, world: &mut PhysicsWorld, seed: Option<u32>) {
        let seed = seed.unwrap_or(self.initial_seed);
        self.rng = TerrainRng::new(seed);

        if let Some(ground) = world.bodies.get(self.ground) {
            let fixtures: Vec<ColliderHandle> = ground.colliders().to_vec();
            for handle in fixtures {
                world
                    .colliders
                    .remove(handle, &mut world.islands, &mut world.bodies, true);
            }
        }
        for joint in self.feature_joints.drain(..) {
            world.impulse_joints.remove(joint, true);
        }
        for body in self.feature_bodies.drain(..) {
            world.remove_body(body);
        }

        self.last_x = 0.0;
        self.last_y = 0.0;
        self.chunks.clear();

        info!("terrain reset, regenerating with seed {seed}");
        self.create_initial_terrain(world);
    }

    // -----------------------------------------------------------------------
    // Generation
    // -----------------------------------------------------------------------

    fn create_initial_terrain(&mut self, world: &mut PhysicsWorld) {
        // Flat run for the player to start on.
        self.add_ground_edge(
            world,
            point![INITIAL_START_X, 0.0],
            point![INITIAL_END_X, 0.0],
        );
        self.last_x = INITIAL_END_X;
        self.last_y = 0.0;
        self.chunks.push(Chunk {
            start_x: INITIAL_START_X,
            end_x: INITIAL_END_X,
        });

        self.generate_terrain(world, INITIAL_GENERATION_TARGET);
    }

    fn generate_terrain(&mut self, world: &mut PhysicsWorld, target_x: f32) {
        while self.last_x < target_x {
            let segment_length = self
                .rng
                .range(self.params.min_segment_length, self.params.max_segment_length);

            // Keep the slope drivable: the delta cap is the lesser of the
            // configured cap and what the max angle allows over this length.
            let max_height_change = self
                .params
                .max_height_change
                .min(self.params.max_angle_deg.to_radians().tan() * segment_length);

            // Bias toward y = 0 so the profile cannot drift arbitrarily far
            // from the baseline over long distances.
            let height_bias = -self.last_y * 0.1;
            let height_change = self.rng.range(-max_height_change, max_height_change) + height_bias;
            let new_y = self.last_y + height_change;

            self.add_ground_edge(
                world,
                point![self.last_x, self.last_y],
                point![self.last_x + segment_length, new_y],
            );

            self.last_x += segment_length;
            self.last_y = new_y;
            self.chunks.push(Chunk {
                start_x: self.last_x - segment_length,
                end_x: self.last_x,
            });

            if self.rng.range(0.0, 1.0) < self.params.feature_probability {
                self.add_random_feature(world, self.last_x, self.last_y);
            }
        }
    }

    fn add_random_feature(&mut self, world: &mut PhysicsWorld, x: f32, y: f32) {
        if self.params.features.is_empty() {
            return;
        }
        let draw = self.rng.range(0.0, self.params.features.len() as f32);
        let index = (draw.floor() as usize).min(self.params.features.len() - 1);
        let feature = self.params.features[index];
        debug!("injecting {feature:?} at x = {x:.1}");

        match feature {
            Feature::Ramp => self.add_ramp(world, x, y),
            Feature::BoxPile => self.add_box_pile(world, x, y),
            Feature::Bridge => self.add_bridge(world, x, y),
            Feature::Teeter => self.add_teeter(world, x, y),
        }
    }

    /// Up-slope then down-slope, sized from a random height.
    fn add_ramp(&mut self, world: &mut PhysicsWorld, x: f32, y: f32) {
        let ramp_height = self.rng.range(1.0, 3.0);
        let ramp_length = ramp_height * 5.0;

        self.add_ground_edge(world, point![x, y], point![x + ramp_length, y + ramp_height]);
        self.add_ground_edge(
            world,
            point![x + ramp_length, y + ramp_height],
            point![x + ramp_length * 2.0, y],
        );

        self.last_x = x + ramp_length * 2.0;
        self.last_y = y;
        self.chunks.push(Chunk {
            start_x: x,
            end_x: self.last_x,
        });
    }

    /// Flat platform with a handful of loose boxes scattered above it.
    fn add_box_pile(&mut self, world: &mut PhysicsWorld, x: f32, y: f32) {
        const PLATFORM_LENGTH: f32 = 15.0;

        self.add_ground_edge(world, point![x, y], point![x + PLATFORM_LENGTH, y]);

        let box_count = self.rng.range(3.0, 8.0).floor() as usize;
        for _ in 0..box_count {
            let box_x = x + self.rng.range(2.0, PLATFORM_LENGTH - 2.0);
            let box_y = y + 0.5 + self.rng.range(0.0, 2.0);
            let body = world
                .bodies
                .insert(RigidBodyBuilder::dynamic().translation(vector![box_x, box_y]));
            world.colliders.insert_with_parent(
                ColliderBuilder::cuboid(0.5, 0.5)
                    .density(0.8)
                    .friction(0.4)
                    .restitution(0.7),
                body,
                &mut world.bodies,
            );
            self.feature_bodies.push(body);
        }

        self.last_x = x + PLATFORM_LENGTH;
        self.last_y = y;
        self.chunks.push(Chunk {
            start_x: x,
            end_x: self.last_x,
        });
    }

    /// Two ground supports with a springy chain of jointed planks spanning
    /// the gap between them.
    fn add_bridge(&mut self, world: &mut PhysicsWorld, x: f32, y: f32) {
        const PLANK_WIDTH: f32 = 2.0;
        let plank_count = self.rng.range(10.0, 20.0).floor() as usize;
        let gap_length = plank_count as f32 * PLANK_WIDTH;

        // Supports either side of the gap.
        self.add_ground_edge(world, point![x, y], point![x + 1.0, y]);
        self.add_ground_edge(
            world,
            point![x + 1.0 + gap_length, y],
            point![x + 3.0 + gap_length, y],
        );

        let start_x = x + 2.0;
        let plank_y = y - 0.125;
        let mut previous = self.ground;
        for i in 0..plank_count {
            let center_x = start_x + PLANK_WIDTH * i as f32;
            let plank = world
                .bodies
                .insert(RigidBodyBuilder::dynamic().translation(vector![center_x, plank_y]));
            world.colliders.insert_with_parent(
                ColliderBuilder::cuboid(PLANK_WIDTH / 2.0, 0.125)
                    .density(250.0)
                    .friction(0.6),
                plank,
                &mut world.bodies,
            );

            let joint = self.pin_with_revolute(
                world,
                previous,
                plank,
                point![center_x - PLANK_WIDTH / 2.0, plank_y],
            );
            self.feature_joints.push(joint);
            self.feature_bodies.push(plank);
            previous = plank;
        }

        // Pin the far end to the right support.
        let joint =
            self.pin_with_revolute(world, previous, self.ground, point![x + 1.0 + gap_length, plank_y]);
        self.feature_joints.push(joint);

        self.last_x = x + 3.0 + gap_length;
        self.last_y = y;
        self.chunks.push(Chunk {
            start_x: x,
            end_x: self.last_x,
        });
    }

    /// A pivoted plank with a random initial kick. Not in the stock feature
    /// rotation; enabled through `TerrainParams::features`.
    fn add_teeter(&mut self, world: &mut PhysicsWorld, x: f32, y: f32) {
        const PLATFORM_LENGTH: f32 = 25.0;
        const TILT_LIMIT: f32 = 8.0 * std::f32::consts::PI / 180.0;

        self.add_ground_edge(world, point![x, y], point![x + PLATFORM_LENGTH, y]);

        let pivot = point![x + PLATFORM_LENGTH / 2.0, y + 1.0];
        let plank = world
            .bodies
            .insert(RigidBodyBuilder::dynamic().translation(vector![pivot.x, pivot.y]));
        world.colliders.insert_with_parent(
            ColliderBuilder::cuboid(5.0, 0.25).density(1.0),
            plank,
            &mut world.bodies,
        );

        let joint = RevoluteJointBuilder::new()
            .local_anchor1(point![pivot.x, pivot.y])
            .local_anchor2(point![0.0, 0.0])
            .limits([-TILT_LIMIT, TILT_LIMIT]);
        let handle = world.impulse_joints.insert(self.ground, plank, joint, true);
        self.feature_joints.push(handle);
        self.feature_bodies.push(plank);

        let kick = self.rng.range(-100.0, 100.0);
        world.bodies[plank].apply_torque_impulse(kick, true);

        self.last_x = x + PLATFORM_LENGTH;
        self.last_y = y;
        self.chunks.push(Chunk {
            start_x: x,
            end_x: self.last_x,
        });
    }

    fn add_ground_edge(&mut self, world: &mut PhysicsWorld, a: Point<Real>, b: Point<Real>) {
        world.colliders.insert_with_parent(
            ColliderBuilder::segment(a, b)
                .density(0.0)
                .friction(self.params.ground_friction),
            self.ground,
            &mut world.bodies,
        );
    }

    /// Revolute joint between two bodies at a shared world anchor. Both
    /// bodies are un-rotated at creation time, so local anchors are plain
    /// offsets from their translations.
    fn pin_with_revolute(
        &self,
        world: &mut PhysicsWorld,
        first: RigidBodyHandle,
        second: RigidBodyHandle,
        anchor: Point<Real>,
    ) -> ImpulseJointHandle {
        let t1 = *world.bodies[first].translation();
        let t2 = *world.bodies[second].translation();
        let joint = RevoluteJointBuilder::new()
            .local_anchor1(point![anchor.x - t1.x, anchor.y - t1.y])
            .local_anchor2(point![anchor.x - t2.x, anchor.y - t2.y]);
        world.impulse_joints.insert(first, second, joint, true)
    }

    fn cleanup_old_chunks(&mut self, player_x: f32) {
        // Bookkeeping prune only: records behind the horizon stop being
        // tracked, but their fixtures are never retracted from the world.
        let cleanup_x = player_x - CLEANUP_DISTANCE;
        self.chunks.retain(|chunk| chunk.end_x >= cleanup_x);
    }
}
