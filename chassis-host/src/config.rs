use std::fs;

use anyhow::anyhow;
use chassis_message::OdometryConfig;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Serial device of the chassis controller
    pub port: String,
    pub baud_rate: u32,

    /// Geometry sent by a bare `cfg` command
    pub geometry: OdometryConfig,

    /// Log one telemetry line every this many frames
    pub print_every: u32,

    /// Talk to the simulated chassis instead of the serial port
    pub simulate: bool,

    /// Simulated chassis only: add PID correction to the feedforward duty
    pub closed_loop: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_owned(),
            baud_rate: 115200,
            geometry: OdometryConfig {
                wheel_radius: 0.05,
                wheel_base: 0.2,
                gear_ratio: chassis_message::DEFAULT_GEAR_RATIO,
                encoder_ppr: chassis_message::DEFAULT_ENCODER_PPR,
            },
            print_every: 50,
            simulate: false,
            closed_loop: false,
        }
    }
}

impl HostConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        // read file contents
        let contents = fs::read_to_string(path)?;

        Self::from_contents(&contents)
    }

    pub fn from_contents(contents: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(contents).map_err(|e| anyhow!(e))
    }
}
