//! The periodic motor control step.

use chassis_message::{Direction, WheelTarget};

use crate::model::DutyLaw;
use crate::odometry::{resolution, rps_to_wheel_speed};
use crate::speed::{EncoderResolution, SpeedEstimator, SpeedSample};
use crate::targets::Wheel;
use crate::Chassis;

/// Output stage driving the two motors.
pub trait Actuator {
    type Error;

    fn set_direction(&mut self, wheel: Wheel, direction: Direction) -> Result<(), Self::Error>;

    /// `duty` is a fraction in `[0, 1]`
    fn set_duty(&mut self, wheel: Wheel, duty: f64) -> Result<(), Self::Error>;
}

/// What one control step measured and commanded.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TickReport {
    pub targets: [WheelTarget; 2],
    pub speeds: [SpeedSample; 2],
    pub duties: [f64; 2],
    /// Seconds since the previous step
    pub dt: f32,
    /// Actuator writes that failed during this step
    pub actuator_errors: u8,
}

pub struct ControlLoop<L> {
    law: L,
    estimators: [SpeedEstimator; 2],
    /// Last non-stop direction of each wheel, the encoders cannot tell a coasting wheel's sense
    rotation: [Direction; 2],
    last_ms: u32,
}

impl<L: DutyLaw> ControlLoop<L> {
    pub fn new(chassis: &Chassis, law: L, now_ms: u32) -> Self {
        let resolution = chassis
            .odometry
            .config()
            .map(|config| resolution(&config))
            .unwrap_or_default();
        let estimator = |wheel: Wheel| {
            SpeedEstimator::new(chassis.encoder(wheel).get_count(), now_ms, resolution)
        };

        Self {
            law,
            estimators: [estimator(Wheel::Left), estimator(Wheel::Right)],
            rotation: [Direction::Stop; 2],
            last_ms: now_ms,
        }
    }

    /// One control step: estimate speeds, actuate the current targets and advance the
    /// odometry with what was measured. Actuator failures are counted and logged, the
    /// step always completes.
    pub fn tick<A: Actuator>(&mut self, chassis: &Chassis, actuator: &mut A, now_ms: u32) -> TickReport {
        let config = chassis.odometry.config();
        let resolution = config
            .map(|config| resolution(&config))
            .unwrap_or_else(EncoderResolution::default);

        let dt = now_ms.wrapping_sub(self.last_ms) as f32 / 1000.0;
        self.last_ms = now_ms;

        let speeds = Wheel::ALL.map(|wheel| {
            let estimator = &mut self.estimators[wheel.index()];
            estimator.set_resolution(resolution);
            estimator.sample(chassis.encoder(wheel).get_count(), now_ms)
        });

        let targets = chassis.targets.get_all();
        let mut duties = [0.0; 2];
        let mut actuator_errors = 0;

        for wheel in Wheel::ALL {
            let i = wheel.index();
            let target = targets[i];

            let duty = self.law.duty(wheel, target, speeds[i].rev_per_s, dt);
            duties[i] = if target.direction == Direction::Stop || !duty.is_finite() {
                0.0
            } else {
                duty.clamp(0.0, 1.0)
            };

            if actuator.set_direction(wheel, target.direction).is_err()
                || actuator.set_duty(wheel, duties[i]).is_err()
            {
                actuator_errors += 1;
                #[cfg(feature = "defmt")]
                defmt::warn!("failed to drive the {} motor", wheel);
            }

            if target.direction != Direction::Stop {
                self.rotation[i] = target.direction;
            }
        }

        chassis.status.publish([
            (targets[0].direction, speeds[0].rev_per_s),
            (targets[1].direction, speeds[1].rev_per_s),
        ]);

        if let Some(config) = config {
            let wheel_speed =
                |i: usize| rps_to_wheel_speed(&config, speeds[i].rev_per_s) * self.rotation[i].signum();
            chassis
                .odometry
                .update(wheel_speed(0), wheel_speed(1), dt, now_ms);
        }

        TickReport {
            targets,
            speeds,
            duties,
            dt,
            actuator_errors,
        }
    }
}
