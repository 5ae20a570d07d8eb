//! Speed target to PWM duty conversion.

use chassis_message::{Direction, WheelTarget};

use crate::config::{LEFT_MOTOR_MODEL, RIGHT_MOTOR_MODEL};
use crate::pid::{Pid, PidGains};
use crate::targets::Wheel;

/// `duty = k * speed + b`
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LinearFit {
    pub k: f64,
    pub b: f64,
}

impl LinearFit {
    pub const fn new(k: f64, b: f64) -> Self {
        Self { k, b }
    }
}

/// Open loop model of one motor, fitted separately for each rotation sense.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MotorModel {
    pub forward: LinearFit,
    pub backward: LinearFit,
}

impl MotorModel {
    pub const fn new(forward: LinearFit, backward: LinearFit) -> Self {
        Self { forward, backward }
    }

    /// Duty fraction in `[0, 1]` expected to spin the wheel at `speed` rev/s.
    pub fn duty(&self, direction: Direction, speed: f64) -> f64 {
        let fit = match direction {
            Direction::Stop => return 0.0,
            Direction::Forward => &self.forward,
            Direction::Backward => &self.backward,
        };
        if !speed.is_finite() {
            return 0.0;
        }
        (fit.k * speed + fit.b).clamp(0.0, 1.0)
    }
}

/// Strategy used by the control loop to turn a target into a duty fraction.
pub trait DutyLaw {
    fn duty(&mut self, wheel: Wheel, target: WheelTarget, measured_rev_per_s: f32, dt: f32)
        -> f64;
}

/// Pure feedforward, the measured speed is not used.
#[derive(Debug, Clone)]
pub struct Feedforward {
    models: [MotorModel; 2],
}

impl Feedforward {
    pub const fn new(left: MotorModel, right: MotorModel) -> Self {
        Self {
            models: [left, right],
        }
    }

    pub fn model(&self, wheel: Wheel) -> &MotorModel {
        &self.models[wheel.index()]
    }
}

impl Default for Feedforward {
    fn default() -> Self {
        Self::new(LEFT_MOTOR_MODEL, RIGHT_MOTOR_MODEL)
    }
}

impl DutyLaw for Feedforward {
    fn duty(&mut self, wheel: Wheel, target: WheelTarget, _measured: f32, _dt: f32) -> f64 {
        self.model(wheel).duty(target.direction, target.speed)
    }
}

/// Feedforward plus a PID correction on the speed error.
pub struct FeedforwardPid {
    feedforward: Feedforward,
    pids: [Pid; 2],
}

impl FeedforwardPid {
    pub fn new(feedforward: Feedforward, gains: PidGains) -> Self {
        Self {
            feedforward,
            pids: [Pid::new(gains, 1.0), Pid::new(gains, 1.0)],
        }
    }
}

impl DutyLaw for FeedforwardPid {
    fn duty(&mut self, wheel: Wheel, target: WheelTarget, measured: f32, dt: f32) -> f64 {
        let pid = &mut self.pids[wheel.index()];
        if target.direction == Direction::Stop {
            pid.reset();
            return 0.0;
        }
        let feedforward = self.feedforward.duty(wheel, target, measured, dt);
        let correction = pid.update(target.speed as f32, measured, dt) as f64;
        (feedforward + correction).clamp(0.0, 1.0)
    }
}
