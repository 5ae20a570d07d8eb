//! Applies parsed host commands to the shared chassis state.

use chassis_message::{Command, OdometryConfig, WheelTarget};

use crate::odometry::{velocity_to_targets, ConfigError};
use crate::targets::Wheel;
use crate::telemetry::TelemetryMode;
use crate::Chassis;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Rejection {
    InvalidConfig(ConfigError),
    /// A velocity command arrived before any configuration
    NotConfigured,
}

impl core::fmt::Display for Rejection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Rejection::InvalidConfig(e) => write!(f, "invalid configuration: {}", e),
            Rejection::NotConfigured => write!(f, "not configured"),
        }
    }
}

/// What a command did, so callers can report it.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Outcome {
    Configured(OdometryConfig),
    VelocitySet([WheelTarget; 2]),
    Reset,
    LegacySet([WheelTarget; 2]),
    Rejected(Rejection),
    Unrecognized,
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Outcome::Rejected(_) | Outcome::Unrecognized)
    }
}

/// Applies a command received over the host link. Never fails, a command that cannot
/// be applied leaves the state untouched and is reported in the [`Outcome`].
pub fn dispatch(chassis: &Chassis, command: &Command) -> Outcome {
    match command {
        Command::Configure(config) => match chassis.odometry.configure(*config) {
            Ok(()) => {
                chassis.telemetry.set_mode(TelemetryMode::Odometry);
                Outcome::Configured(*config)
            }
            Err(e) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("rejected configuration: {}", e);
                Outcome::Rejected(Rejection::InvalidConfig(e))
            }
        },
        Command::Velocity { linear, angular } => match chassis.odometry.config() {
            Some(config) => {
                let [left, right] = velocity_to_targets(&config, *linear, *angular);
                chassis.targets.set_both(left, right);
                Outcome::VelocitySet([left, right])
            }
            None => {
                #[cfg(feature = "defmt")]
                defmt::warn!("velocity command before configuration, ignored");
                Outcome::Rejected(Rejection::NotConfigured)
            }
        },
        Command::ResetOdometry => {
            chassis.odometry.reset();
            Outcome::Reset
        }
        Command::Legacy { wheel1, wheel2 } => {
            // a lone pair drives wheel 1 and stops wheel 2
            let wheel2 = wheel2.unwrap_or(WheelTarget::STOP);
            chassis.targets.set_both(*wheel1, wheel2);
            Outcome::LegacySet([*wheel1, wheel2])
        }
        Command::Unknown(_raw) => {
            #[cfg(feature = "defmt")]
            defmt::warn!("unrecognized command '{}'", _raw.as_str());
            Outcome::Unrecognized
        }
    }
}

/// Operator shortcut for driving the wheels directly. Unlike the host protocol, a lone
/// pair leaves wheel 2 as it was. Returns the targets now in effect.
pub fn apply_direct(
    chassis: &Chassis,
    wheel1: WheelTarget,
    wheel2: Option<WheelTarget>,
) -> [WheelTarget; 2] {
    match wheel2 {
        Some(wheel2) => chassis.targets.set_both(wheel1, wheel2),
        None => chassis.targets.set(Wheel::Left, wheel1),
    }
    chassis.targets.get_all()
}
