#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod config;
pub mod control;
pub mod dispatch;
pub mod event;
pub mod framing;
pub mod model;
pub mod odometry;
pub mod pid;
pub mod pulse;
pub mod speed;
pub mod targets;
pub mod telemetry;

pub use chassis_message;

use odometry::Odometry;
use pulse::PulseCounter;
use targets::{TargetStore, Wheel};
use telemetry::{StatusStore, TelemetrySettings};

/// Every piece of state shared between the interrupt handlers and tasks of the chassis.
///
/// Built once, usually in a `static` or an init local, and handed out by shared
/// reference. All members synchronize internally.
pub struct Chassis {
    pub encoders: [PulseCounter; 2],
    pub targets: TargetStore,
    pub odometry: Odometry,
    pub status: StatusStore,
    pub telemetry: TelemetrySettings,
}

impl Chassis {
    pub const fn new() -> Self {
        Self {
            encoders: [PulseCounter::new(), PulseCounter::new()],
            targets: TargetStore::new(),
            odometry: Odometry::new(),
            status: StatusStore::new(),
            telemetry: TelemetrySettings::new(),
        }
    }

    pub fn encoder(&self, wheel: Wheel) -> &PulseCounter {
        &self.encoders[wheel.index()]
    }
}

impl Default for Chassis {
    fn default() -> Self {
        Self::new()
    }
}
