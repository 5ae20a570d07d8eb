//! What the chassis reports back to the host, and how often.

use core::cell::Cell;

use chassis_message::{Direction, Frame, Telemetry, WheelStatus};
use critical_section::Mutex;
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

use crate::config::{DEFAULT_TELEMETRY_INTERVAL_MS, MIN_TELEMETRY_INTERVAL_MS};
use crate::targets::Wheel;
use crate::Chassis;

/// Which dialect the telemetry sender speaks.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TelemetryMode {
    /// `dir1,speed1_mrs;dir2,speed2_mrs`, until the host sends a configuration
    Legacy,
    /// `ODM:...` frames
    Odometry,
}

/// Operator change to the telemetry stream.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TelemetryControl {
    Enable,
    Disable,
    /// Reporting period in ms, raised to the minimum if shorter
    IntervalMs(u32),
}

/// Last measured direction and speed of each wheel, written by the control loop.
pub struct StatusStore {
    wheels: Mutex<Cell<[(Direction, f32); 2]>>,
}

impl StatusStore {
    pub const fn new() -> Self {
        Self {
            wheels: Mutex::new(Cell::new([(Direction::Stop, 0.0); 2])),
        }
    }

    pub fn publish(&self, wheels: [(Direction, f32); 2]) {
        critical_section::with(|cs| self.wheels.borrow(cs).set(wheels));
    }

    /// `(direction, rev/s)` of one wheel
    pub fn get(&self, wheel: Wheel) -> (Direction, f32) {
        critical_section::with(|cs| self.wheels.borrow(cs).get())[wheel.index()]
    }

    pub fn snapshot(&self) -> [WheelStatus; 2] {
        let wheels = critical_section::with(|cs| self.wheels.borrow(cs).get());
        wheels.map(|(direction, rev_per_s)| WheelStatus::from_rev_per_s(direction, rev_per_s))
    }
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Runtime telemetry options.
pub struct TelemetrySettings {
    mode: Mutex<Cell<TelemetryMode>>,
    enabled: AtomicBool,
    interval_ms: AtomicU32,
}

impl TelemetrySettings {
    pub const fn new() -> Self {
        Self {
            mode: Mutex::new(Cell::new(TelemetryMode::Legacy)),
            enabled: AtomicBool::new(true),
            interval_ms: AtomicU32::new(DEFAULT_TELEMETRY_INTERVAL_MS),
        }
    }

    pub fn mode(&self) -> TelemetryMode {
        critical_section::with(|cs| self.mode.borrow(cs).get())
    }

    pub fn set_mode(&self, mode: TelemetryMode) {
        critical_section::with(|cs| self.mode.borrow(cs).set(mode));
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms.load(Ordering::Relaxed)
    }

    /// Sets the reporting period, raised to the minimum if shorter. Returns the value
    /// actually applied.
    pub fn set_interval_ms(&self, interval_ms: u32) -> u32 {
        let applied = interval_ms.max(MIN_TELEMETRY_INTERVAL_MS);
        self.interval_ms.store(applied, Ordering::Relaxed);
        applied
    }

    /// Applies an operator change. Returns the reporting period now in effect.
    pub fn apply(&self, control: TelemetryControl) -> u32 {
        match control {
            TelemetryControl::Enable => self.set_enabled(true),
            TelemetryControl::Disable => self.set_enabled(false),
            TelemetryControl::IntervalMs(interval_ms) => {
                self.set_interval_ms(interval_ms);
            }
        }
        self.interval_ms()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the state to report, in the current dialect.
pub fn compose(chassis: &Chassis) -> Telemetry {
    match chassis.telemetry.mode() {
        TelemetryMode::Odometry if chassis.odometry.is_configured() => {
            Telemetry::Odometry(chassis.odometry.get_state())
        }
        _ => Telemetry::Legacy(chassis.status.snapshot()),
    }
}

/// Frame to send on this telemetry tick, `None` when telemetry is switched off.
pub fn next_frame(chassis: &Chassis) -> Option<Frame> {
    if !chassis.telemetry.is_enabled() {
        return None;
    }
    match compose(chassis).to_frame() {
        Ok(frame) => Some(frame),
        Err(_) => {
            #[cfg(feature = "defmt")]
            defmt::warn!("telemetry frame does not fit the buffer");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use chassis_message::OdometryConfig;

    use super::*;

    const CONFIG: OdometryConfig = OdometryConfig {
        wheel_radius: 0.05,
        wheel_base: 0.2,
        gear_ratio: 56.0,
        encoder_ppr: 11.0,
    };

    #[test]
    fn test_interval_floor() {
        let settings = TelemetrySettings::new();
        assert_eq!(settings.interval_ms(), 20);
        assert_eq!(settings.set_interval_ms(5), 10);
        assert_eq!(settings.interval_ms(), 10);
        assert_eq!(settings.set_interval_ms(50), 50);
    }

    #[test]
    fn test_legacy_until_configured() {
        let chassis = Chassis::new();
        chassis
            .status
            .publish([(Direction::Forward, 0.5), (Direction::Backward, 0.25)]);
        assert_eq!(next_frame(&chassis).unwrap().as_str(), "1,500;2,250");

        // odometry mode without a configuration still reports legacy
        chassis.telemetry.set_mode(TelemetryMode::Odometry);
        assert_eq!(next_frame(&chassis).unwrap().as_str(), "1,500;2,250");

        chassis.odometry.configure(CONFIG).unwrap();
        chassis.odometry.update(0.1, 0.1, 1.0, 1000);
        assert_eq!(
            next_frame(&chassis).unwrap().as_str(),
            "ODM:0.1000,0.0000,0.0000,0.100,0.000,1000"
        );
    }

    #[test]
    fn test_disabled() {
        let chassis = Chassis::new();
        chassis.telemetry.set_enabled(false);
        assert_eq!(next_frame(&chassis), None);
        chassis.telemetry.set_enabled(true);
        assert!(next_frame(&chassis).is_some());
    }

    #[test]
    fn test_operator_control() {
        let chassis = Chassis::new();
        chassis.telemetry.apply(TelemetryControl::Disable);
        assert_eq!(next_frame(&chassis), None);
        assert_eq!(chassis.telemetry.apply(TelemetryControl::Enable), 20);
        assert!(next_frame(&chassis).is_some());
        assert_eq!(chassis.telemetry.apply(TelemetryControl::IntervalMs(100)), 100);
        assert_eq!(chassis.telemetry.apply(TelemetryControl::IntervalMs(1)), 10);
        assert!(chassis.telemetry.is_enabled());
    }
}
