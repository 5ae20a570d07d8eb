//! Differential drive dead reckoning and the velocity to wheel speed conversion.

use core::cell::RefCell;
use core::f32::consts::{PI, TAU};

use chassis_message::{Direction, OdometryConfig, OdometryState, WheelTarget};
use critical_section::Mutex;

use crate::config::DIRECTION_DEAD_BAND;
use crate::speed::EncoderResolution;

/// Rejected drive train description.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConfigError {
    WheelRadius,
    WheelBase,
    GearRatio,
    EncoderPpr,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let field = match self {
            ConfigError::WheelRadius => "wheel_radius",
            ConfigError::WheelBase => "wheel_base",
            ConfigError::GearRatio => "gear_ratio",
            ConfigError::EncoderPpr => "ppr",
        };
        write!(f, "{} must be positive", field)
    }
}

/// Checks a configuration before it is applied.
pub fn validate(config: &OdometryConfig) -> Result<(), ConfigError> {
    // written as `!(x > 0)` so NaN is rejected too
    if !(config.wheel_radius > 0.0) {
        return Err(ConfigError::WheelRadius);
    }
    if !(config.wheel_base > 0.0) {
        return Err(ConfigError::WheelBase);
    }
    if !(config.gear_ratio > 0.0) {
        return Err(ConfigError::GearRatio);
    }
    if !(config.encoder_ppr > 0.0) {
        return Err(ConfigError::EncoderPpr);
    }
    Ok(())
}

pub fn resolution(config: &OdometryConfig) -> EncoderResolution {
    EncoderResolution {
        ppr: config.encoder_ppr,
        gear_ratio: config.gear_ratio,
    }
}

/// Wraps an angle into `(-π, π]`.
pub fn normalize_angle(angle: f32) -> f32 {
    let mut a = libm::fmodf(angle, TAU);
    if a > PI {
        a -= TAU;
    }
    if a <= -PI {
        a += TAU;
    }
    a
}

/// Linear wheel speeds `(left, right)` in m/s for a body velocity.
pub fn wheel_velocities(config: &OdometryConfig, linear: f32, angular: f32) -> (f32, f32) {
    let half_base = config.wheel_base / 2.0;
    (linear - angular * half_base, linear + angular * half_base)
}

/// Linear wheel speed in m/s to wheel revolutions per second.
pub fn wheel_speed_to_rps(config: &OdometryConfig, speed: f32) -> f32 {
    speed / (TAU * config.wheel_radius)
}

pub fn rps_to_wheel_speed(config: &OdometryConfig, rev_per_s: f32) -> f32 {
    rev_per_s * TAU * config.wheel_radius
}

fn wheel_target(config: &OdometryConfig, wheel_speed: f32) -> WheelTarget {
    let rev_per_s = wheel_speed_to_rps(config, wheel_speed) as f64;
    match Direction::from_signed(rev_per_s, DIRECTION_DEAD_BAND) {
        Direction::Stop => WheelTarget::STOP,
        direction => WheelTarget::new(direction, rev_per_s.abs()),
    }
}

/// Per wheel targets `[left, right]` realizing a body velocity.
pub fn velocity_to_targets(config: &OdometryConfig, linear: f32, angular: f32) -> [WheelTarget; 2] {
    let (left, right) = wheel_velocities(config, linear, angular);
    [wheel_target(config, left), wheel_target(config, right)]
}

struct Inner {
    config: Option<OdometryConfig>,
    state: OdometryState,
}

/// Pose integrator shared between the control loop, the command handler and the
/// telemetry sender. Every access is a short critical section.
pub struct Odometry {
    inner: Mutex<RefCell<Inner>>,
}

impl Odometry {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                config: None,
                state: OdometryState {
                    x: 0.0,
                    y: 0.0,
                    theta: 0.0,
                    v: 0.0,
                    w: 0.0,
                    timestamp_ms: 0,
                },
            })),
        }
    }

    /// Replaces the drive train description. The pose is kept.
    pub fn configure(&self, config: OdometryConfig) -> Result<(), ConfigError> {
        validate(&config)?;
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).config = Some(config));

        #[cfg(feature = "defmt")]
        defmt::info!(
            "odometry configured: R={}m L={}m gear={} ppr={}",
            config.wheel_radius,
            config.wheel_base,
            config.gear_ratio,
            config.encoder_ppr
        );
        Ok(())
    }

    pub fn config(&self) -> Option<OdometryConfig> {
        critical_section::with(|cs| self.inner.borrow_ref(cs).config)
    }

    pub fn is_configured(&self) -> bool {
        self.config().is_some()
    }

    /// Advances the pose with the wheel speeds (m/s) measured over `dt` seconds. Does
    /// nothing before configuration or for a non-positive `dt`.
    pub fn update(&self, v_left: f32, v_right: f32, dt: f32, timestamp_ms: u32) {
        if !(dt > 0.0) || !v_left.is_finite() || !v_right.is_finite() || !dt.is_finite() {
            return;
        }

        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            let Some(config) = inner.config else {
                return;
            };

            let state = &mut inner.state;
            let v = (v_left + v_right) / 2.0;
            let w = (v_right - v_left) / config.wheel_base;

            let heading = state.theta + w * dt / 2.0;
            state.x += v * libm::cosf(heading) * dt;
            state.y += v * libm::sinf(heading) * dt;
            state.theta = normalize_angle(state.theta + w * dt);
            state.v = v;
            state.w = w;
            state.timestamp_ms = timestamp_ms;
        });
    }

    pub fn get_state(&self) -> OdometryState {
        critical_section::with(|cs| self.inner.borrow_ref(cs).state)
    }

    /// Zeroes the pose and velocities, keeps the configuration.
    pub fn reset(&self) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).state = OdometryState::default());

        #[cfg(feature = "defmt")]
        defmt::info!("odometry reset");
    }
}

impl Default for Odometry {
    fn default() -> Self {
        Self::new()
    }
}
