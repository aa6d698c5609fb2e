//! Headless auto-drive soak.
//!
//! Runs the simulation core without a renderer: fixed-seed terrain, throttle
//! held down, scheduler-driven fixed steps, one JSON snapshot per simulated
//! second on the log. An optional CLI argument points at a tuning JSON file.

use std::env;
use std::error::Error;
use std::fs;

use log::{info, warn};
use nalgebra::Point2;

use arcade_physics::{
    Car, CarTuning, DriveMode, PhysicsScheduler, PhysicsWorld, ProceduralTerrain, Snapshot,
    TerrainParams, TuningHandle,
};

const FRAME_DT: f32 = 1.0 / 60.0;
const SOAK_FRAMES: u64 = 60 * 60; // one minute of frames
const DEMO_SEED: u32 = 42;
const FALL_MARGIN: f32 = 10.0; // below terrain by this much counts as fallen
const RESET_AHEAD: f32 = 20.0;
const RESET_CLEARANCE: f32 = 1.5;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let tuning = match env::args().nth(1) {
        Some(path) => {
            let raw = fs::read_to_string(&path)?;
            let parsed: CarTuning = serde_json::from_str(&raw)?;
            info!("loaded tuning from {path}");
            parsed
        }
        None => CarTuning::default(),
    };

    let mut world = PhysicsWorld::new();
    let mut terrain = ProceduralTerrain::new(
        &mut world,
        TerrainParams {
            seed: Some(DEMO_SEED),
            ..TerrainParams::default()
        },
    );
    let mut car = Car::new(&mut world, Point2::new(0.0, 1.0), TuningHandle::new(tuning));
    car.set_drive_mode(DriveMode::All);
    car.on_throttle_start();

    let mut scheduler = PhysicsScheduler::default();
    info!("auto-driving on terrain seed {}", terrain.seed());

    for tick in 0..SOAK_FRAMES {
        scheduler.update(&mut world, &mut car, FRAME_DT);

        let position = car.position(&world);
        terrain.update(&mut world, position.x);

        // Fallen through or off the track: put the car back down a little
        // ahead, the way the menu scene does.
        let ground_y = terrain.get_height_at(&world, position.x);
        if position.y < ground_y - FALL_MARGIN {
            let reset_x = position.x + RESET_AHEAD;
            let reset_y = terrain.get_height_at(&world, reset_x) + RESET_CLEARANCE;
            warn!("car fell through at x = {:.1}, resetting ahead", position.x);
            car.reset_position(&mut world, Point2::new(reset_x, reset_y));
            car.on_throttle_start();
        }

        if tick % 60 == 0 {
            let snapshot = Snapshot::capture(tick, &world, &car, &terrain);
            info!("{}", serde_json::to_string(&snapshot)?);
        }
    }

    let final_position = car.position(&world);
    info!(
        "soak finished at x = {:.1} ({} chunks tracked)",
        final_position.x,
        terrain.chunks().len()
    );

    Ok(())
}
