//! Simulation core for a 2D arcade hill-racing game.
//!
//! Three pieces cooperate around a rapier2d world: a [`Car`] built from
//! rigid bodies and motorized wheel joints, a [`ProceduralTerrain`] that
//! extends the track ahead of the player from a seeded generator, and a
//! [`PhysicsScheduler`] that turns frame time into deterministic fixed
//! steps. Rendering, input mapping and UI live in the host; they talk to
//! this crate through control intents and read-only snapshots.

pub mod car;
pub mod physics;
pub mod scheduler;
pub mod state;
pub mod terrain;
pub mod tuning;

pub use car::{Car, CarSnapshot, DriveMode};
pub use physics::PhysicsWorld;
pub use scheduler::PhysicsScheduler;
pub use state::Snapshot;
pub use terrain::{Chunk, Feature, ProceduralTerrain, TerrainParams, TerrainRng};
pub use tuning::{CarTuning, TuningHandle};
