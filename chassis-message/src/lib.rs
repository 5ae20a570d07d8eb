#![cfg_attr(not(test), no_std)]

//! Text protocol spoken between the host and the chassis controller.
//!
//! Host to robot frames are parsed into a [`Command`], robot to host frames are
//! encoded from a [`Telemetry`]. Both directions are plain ASCII so the link can be
//! inspected with a terminal.

pub mod command;
pub mod telemetry;

// export `heapless` so that the same version is available to all users of this crate
pub use heapless;

pub use command::{Command, ParseError};
pub use telemetry::{Telemetry, WheelStatus};

/// Largest frame, in bytes, either side is expected to handle.
pub const MAX_FRAME_LEN: usize = 128;

/// Owned, fixed capacity text frame.
pub type Frame = heapless::String<MAX_FRAME_LEN>;

/// Gear ratio assumed when a configuration frame leaves it out.
pub const DEFAULT_GEAR_RATIO: f32 = 56.0;

/// Encoder pulses per motor revolution assumed when a configuration frame leaves it out.
pub const DEFAULT_ENCODER_PPR: f32 = 11.0;

/// Rotation sense of a single wheel. The discriminant is the code used on the wire.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Stop = 0,
    Forward = 1,
    Backward = 2,
}

impl Direction {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Direction::Stop),
            1 => Some(Direction::Forward),
            2 => Some(Direction::Backward),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Direction of a signed quantity, [`Direction::Stop`] inside `±dead_band`.
    pub fn from_signed(value: f64, dead_band: f64) -> Self {
        if value > dead_band {
            Direction::Forward
        } else if value < -dead_band {
            Direction::Backward
        } else {
            Direction::Stop
        }
    }

    /// +1, -1 or 0, used to give an unsigned speed the sense of rotation.
    pub fn signum(self) -> f32 {
        match self {
            Direction::Stop => 0.0,
            Direction::Forward => 1.0,
            Direction::Backward => -1.0,
        }
    }
}

/// Commanded state of one wheel: a direction and a non-negative speed in rev/s.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct WheelTarget {
    pub direction: Direction,
    pub speed: f64,
}

impl WheelTarget {
    pub const STOP: WheelTarget = WheelTarget {
        direction: Direction::Stop,
        speed: 0.0,
    };

    pub const fn new(direction: Direction, speed: f64) -> Self {
        Self { direction, speed }
    }
}

/// Physical description of the drive train, sent by the host in a `CFG:` frame.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OdometryConfig {
    /// Wheel radius in meters
    pub wheel_radius: f32,
    /// Distance between the two wheel contact points in meters
    pub wheel_base: f32,
    /// Motor revolutions per wheel revolution
    #[cfg_attr(feature = "serde", serde(default = "default_gear_ratio"))]
    pub gear_ratio: f32,
    /// Encoder pulses per motor revolution
    #[cfg_attr(feature = "serde", serde(default = "default_encoder_ppr"))]
    pub encoder_ppr: f32,
}

#[cfg(feature = "serde")]
fn default_gear_ratio() -> f32 {
    DEFAULT_GEAR_RATIO
}

#[cfg(feature = "serde")]
fn default_encoder_ppr() -> f32 {
    DEFAULT_ENCODER_PPR
}

/// Integrated pose and body velocity of the chassis.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct OdometryState {
    /// Position in meters
    pub x: f32,
    pub y: f32,
    /// Heading in radians, in (-π, π]
    pub theta: f32,
    /// Linear velocity in m/s
    pub v: f32,
    /// Angular velocity in rad/s
    pub w: f32,
    /// Controller clock at the last update, in ms
    pub timestamp_ms: u32,
}

/// Copies `s` into a [`Frame`], truncating at the capacity.
pub fn frame_from_str(s: &str) -> Frame {
    let mut frame = Frame::new();
    for c in s.chars() {
        if frame.push(c).is_err() {
            break;
        }
    }
    frame
}
