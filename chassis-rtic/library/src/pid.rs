/// Gains for [`Pid`], in duty fraction per rev/s of error.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: 0.05,
            ki: 0.2,
            kd: 0.0,
        }
    }
}

/// PID controller with a symmetric output limit and anti wind-up on the integral.
pub struct Pid {
    gains: PidGains,
    limit: f32,
    integral: f32,
    sat: i8,
    last_error: Option<f32>,
}

impl Pid {
    pub fn new(gains: PidGains, limit: f32) -> Self {
        Self {
            gains,
            limit,
            integral: 0.0,
            sat: 0,
            last_error: None,
        }
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.sat = 0;
        self.last_error = None;
    }

    /// Update the controller with the current error and return the new output.
    pub fn update(&mut self, target: f32, current: f32, dt: f32) -> f32 {
        let error = target - current;

        if (self.sat < 0 && error < 0.0) || (self.sat > 0 && error > 0.0) {
            // Anti wind-up: do nothing if there is saturation and the error is in the same direction
        } else {
            (self.integral, self.sat) = satlimit(
                self.integral + self.gains.ki * dt * error,
                -self.limit,
                self.limit,
            );
        }

        let derivative = match self.last_error {
            Some(last) if dt > 0.0 => (error - last) / dt,
            _ => 0.0,
        };
        self.last_error = Some(error);

        (self.gains.kp * error + self.integral + self.gains.kd * derivative)
            .clamp(-self.limit, self.limit)
    }
}

fn satlimit(x: f32, min: f32, max: f32) -> (f32, i8) {
    if x < min {
        (min, -1)
    } else if x > max {
        (max, 1)
    } else {
        (x, 0)
    }
}
