//! Live-tunable car parameters, injected into the car as a shared handle.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// One coherent set of car tuning values.
///
/// All fields are plain numbers so a host tuning UI (or a JSON file on disk)
/// can publish edits wholesale. Values are not validated; non-physical inputs
/// produce non-physical cars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarTuning {
    pub max_speed: f32,                 // m/s at the wheel rim
    pub engine_torque: f32,             // N*m
    pub nitro_strength: f32,            // speed/torque multiplier while nitro is held
    pub chassis_weight: f32,            // kg
    pub motor_weight: f32,              // kg
    pub front_weight_distribution: f32, // fraction of weight carried by the front wheel
    pub suspension_stiffness: f32,      // spring frequency, Hz
    pub suspension_damping: f32,        // damping ratio, 0..1
    pub wheel_grip: f32,                // traction coefficient
    pub throttle_inc_rate: f32,         // 1/s
    pub throttle_dec_rate: f32,         // 1/s
    pub brake_strength: f32,            // fraction of engine torque
}

impl CarTuning {
    /// All-zero tuning. A car running on this produces no drive at all; it is
    /// the state a freshly created handle is in before the host publishes
    /// real values.
    pub const ZERO: CarTuning = CarTuning {
        max_speed: 0.0,
        engine_torque: 0.0,
        nitro_strength: 0.0,
        chassis_weight: 0.0,
        motor_weight: 0.0,
        front_weight_distribution: 0.0,
        suspension_stiffness: 0.0,
        suspension_damping: 0.0,
        wheel_grip: 0.0,
        throttle_inc_rate: 0.0,
        throttle_dec_rate: 0.0,
        brake_strength: 0.0,
    };
}

impl Default for CarTuning {
    fn default() -> Self {
        Self {
            max_speed: 130.0,
            engine_torque: 4500.0,
            nitro_strength: 1.5,
            chassis_weight: 900.0,
            motor_weight: 700.0,
            front_weight_distribution: 0.75,
            suspension_stiffness: 2.5,
            suspension_damping: 0.5,
            wheel_grip: 20.0,
            throttle_inc_rate: 0.5,
            throttle_dec_rate: 3.0,
            brake_strength: 1.0,
        }
    }
}

/// Shared handle to the latest tuning snapshot.
///
/// The host keeps one clone and publishes edits through it; the car pulls a
/// copy at the start of every update, so edits take effect on the next fixed
/// step. No global state is involved: whoever constructs the car decides
/// which handle it reads.
#[derive(Debug, Clone, Default)]
pub struct TuningHandle {
    inner: Arc<RwLock<CarTuning>>,
}

impl TuningHandle {
    pub fn new(tuning: CarTuning) -> Self {
        Self {
            inner: Arc::new(RwLock::new(tuning)),
        }
    }

    /// Handle that stays at [`CarTuning::ZERO`] until the first `set`.
    pub fn zeroed() -> Self {
        Self::new(CarTuning::ZERO)
    }

    /// Copy out the latest published values.
    pub fn snapshot(&self) -> CarTuning {
        *self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the whole tuning set.
    pub fn set(&self, tuning: CarTuning) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = tuning;
    }

    /// Edit the current values in place.
    pub fn update(&self, edit: impl FnOnce(&mut CarTuning)) {
        edit(&mut self.inner.write().unwrap_or_else(|e| e.into_inner()));
    }
}
