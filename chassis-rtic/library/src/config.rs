//! Compile time tuning of the chassis.

use crate::model::{LinearFit, MotorModel};

/// Nominal period of the motor control loop (about 30 Hz).
pub const CONTROL_LOOP_PERIOD_MS: u32 = 33;

/// Telemetry period used until the host asks for something else.
pub const DEFAULT_TELEMETRY_INTERVAL_MS: u32 = 20;

/// Shortest telemetry period accepted.
pub const MIN_TELEMETRY_INTERVAL_MS: u32 = 10;

/// Wheel speeds below this many rev/s are commanded as a stop.
pub const DIRECTION_DEAD_BAND: f64 = 0.001;

/// Calibration of the left motor (wheel 1).
pub const LEFT_MOTOR_MODEL: MotorModel = MotorModel::new(
    LinearFit::new(0.2781, 0.0233),
    LinearFit::new(0.2549, 0.0306),
);

/// Calibration of the right motor (wheel 2).
pub const RIGHT_MOTOR_MODEL: MotorModel = MotorModel::new(
    LinearFit::new(0.2542, 0.0612),
    LinearFit::new(0.2829, 0.0359),
);
