//! The two drive motors behind a PCA9685 based dual H-bridge board

use chassis_core::chassis_message::Direction;
use chassis_core::control::Actuator;
use chassis_core::targets::Wheel;
use embedded_hal::i2c;
use pwm_pca9685::{Channel, Pca9685};

/// Full scale of a PCA9685 channel
const PWM_MAX: u16 = 4095;

/// PCA9685 internal oscillator
const OSCILLATOR_HZ: f32 = 25_000_000.0;

#[derive(Debug)]
pub struct Error<E>(pub pwm_pca9685::Error<E>);

impl<E> From<pwm_pca9685::Error<E>> for Error<E> {
    fn from(e: pwm_pca9685::Error<E>) -> Self {
        Error(e)
    }
}

/// The three PCA9685 channels wired to one H-bridge.
struct Bridge {
    in1: Channel,
    in2: Channel,
    pwm: Channel,
}

/// Motor port M1 of the board
const LEFT_BRIDGE: Bridge = Bridge {
    in1: Channel::C10,
    in2: Channel::C9,
    pwm: Channel::C8,
};

/// Motor port M2 of the board
const RIGHT_BRIDGE: Bridge = Bridge {
    in1: Channel::C11,
    in2: Channel::C12,
    pwm: Channel::C13,
};

pub struct DriveMotors<I2C> {
    pwm: Pca9685<I2C>,
}

impl<I2C: i2c::I2c> DriveMotors<I2C> {
    /// Wakes the driver up and sets its PWM frequency. Both motors start coasting.
    pub fn new(i2c: I2C, address: u8, frequency_hz: f32) -> Result<Self, Error<I2C::Error>> {
        let mut pwm = Pca9685::new(i2c, address)?;

        // the oscillator runs fast, aim about 10% low
        let prescale = OSCILLATOR_HZ / 4096.0 / (frequency_hz * 0.9) - 1.0;

        pwm.enable()?;
        pwm.set_prescale((prescale + 0.5) as u8)?;

        let mut motors = Self { pwm };
        for wheel in Wheel::ALL {
            motors.drive_bridge(wheel, Direction::Stop)?;
            motors.set_bridge_duty(wheel, 0)?;
        }
        Ok(motors)
    }

    fn bridge(wheel: Wheel) -> &'static Bridge {
        match wheel {
            Wheel::Left => &LEFT_BRIDGE,
            Wheel::Right => &RIGHT_BRIDGE,
        }
    }

    fn set_level(&mut self, channel: Channel, high: bool) -> Result<(), Error<I2C::Error>> {
        let off = if high { PWM_MAX } else { 0 };
        self.pwm.set_channel_on_off(channel, 0, off)?;
        Ok(())
    }

    /// Stop lets the motor coast, both bridge inputs low.
    fn drive_bridge(&mut self, wheel: Wheel, direction: Direction) -> Result<(), Error<I2C::Error>> {
        let bridge = Self::bridge(wheel);
        // the input going low is always written first, both high would brake
        match direction {
            Direction::Forward => {
                self.set_level(bridge.in2, false)?;
                self.set_level(bridge.in1, true)
            }
            Direction::Backward => {
                self.set_level(bridge.in1, false)?;
                self.set_level(bridge.in2, true)
            }
            Direction::Stop => {
                self.set_level(bridge.in1, false)?;
                self.set_level(bridge.in2, false)
            }
        }
    }

    fn set_bridge_duty(&mut self, wheel: Wheel, duty: u16) -> Result<(), Error<I2C::Error>> {
        let channel = Self::bridge(wheel).pwm;
        self.pwm.set_channel_on_off(channel, 0, duty.min(PWM_MAX))?;
        Ok(())
    }
}

impl<I2C: i2c::I2c> Actuator for DriveMotors<I2C> {
    type Error = Error<I2C::Error>;

    fn set_direction(&mut self, wheel: Wheel, direction: Direction) -> Result<(), Self::Error> {
        self.drive_bridge(wheel, direction)
    }

    fn set_duty(&mut self, wheel: Wheel, duty: f64) -> Result<(), Self::Error> {
        self.set_bridge_duty(wheel, (duty.clamp(0.0, 1.0) * PWM_MAX as f64) as u16)
    }
}
