use core::fmt::{self, Write};
use core::str::FromStr;

use crate::{Direction, Frame, OdometryState, ParseError};

/// Last measured state of one wheel as reported in the legacy dialect.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct WheelStatus {
    pub direction: Direction,
    /// Speed in milli-revolutions per second
    pub speed_mrs: i32,
}

impl WheelStatus {
    pub fn from_rev_per_s(direction: Direction, rev_per_s: f32) -> Self {
        let scaled = rev_per_s * 1000.0;
        let rounded = if scaled >= 0.0 {
            scaled + 0.5
        } else {
            scaled - 0.5
        };
        Self {
            direction,
            speed_mrs: rounded as i32,
        }
    }
}

/// Periodic robot to host report.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Telemetry {
    /// `ODM:x,y,theta,v,w,timestamp_ms`
    Odometry(OdometryState),
    /// `dir1,speed1_mrs;dir2,speed2_mrs`
    Legacy([WheelStatus; 2]),
}

impl fmt::Display for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Telemetry::Odometry(s) => write!(
                f,
                "ODM:{:.4},{:.4},{:.4},{:.3},{:.3},{}",
                s.x, s.y, s.theta, s.v, s.w, s.timestamp_ms
            ),
            Telemetry::Legacy([w1, w2]) => write!(
                f,
                "{},{};{},{}",
                w1.direction.code(),
                w1.speed_mrs,
                w2.direction.code(),
                w2.speed_mrs
            ),
        }
    }
}

impl Telemetry {
    pub fn to_frame(&self) -> Result<Frame, fmt::Error> {
        let mut frame = Frame::new();
        write!(frame, "{}", self)?;
        Ok(frame)
    }
}

const ODOMETRY_FIELDS: [&str; 6] = ["x", "y", "theta", "v", "w", "timestamp_ms"];

fn parse_odometry(body: &str) -> Result<Telemetry, ParseError> {
    let mut values = [0.0f32; 5];
    let mut fields = body.split(',');
    for (value, name) in values.iter_mut().zip(ODOMETRY_FIELDS) {
        let field = fields.next().ok_or(ParseError::MissingField(name))?;
        *value = field
            .trim()
            .parse()
            .map_err(|_| ParseError::InvalidNumber(name))?;
    }
    let timestamp_ms = fields
        .next()
        .ok_or(ParseError::MissingField("timestamp_ms"))?
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidNumber("timestamp_ms"))?;
    if fields.next().is_some() {
        return Err(ParseError::TooManyFields);
    }

    let [x, y, theta, v, w] = values;
    Ok(Telemetry::Odometry(OdometryState {
        x,
        y,
        theta,
        v,
        w,
        timestamp_ms,
    }))
}

fn parse_wheel_status(pair: Option<&str>, field: &'static str) -> Result<WheelStatus, ParseError> {
    let (direction, speed) = pair
        .and_then(|p| p.split_once(','))
        .ok_or(ParseError::MissingField(field))?;
    let direction = direction
        .trim()
        .parse()
        .ok()
        .and_then(Direction::from_code)
        .ok_or(ParseError::InvalidNumber(field))?;
    let speed_mrs = speed
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidNumber(field))?;
    Ok(WheelStatus {
        direction,
        speed_mrs,
    })
}

impl FromStr for Telemetry {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseError::Empty);
        }
        if let Some(body) = s.strip_prefix("ODM:") {
            return parse_odometry(body);
        }

        let mut pairs = s.split(';');
        let wheel1 = parse_wheel_status(pairs.next(), "wheel1")?;
        let wheel2 = parse_wheel_status(pairs.next(), "wheel2")?;
        if pairs.next().is_some() {
            return Err(ParseError::TooManyFields);
        }
        Ok(Telemetry::Legacy([wheel1, wheel2]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_odometry() {
        let telemetry = Telemetry::Odometry(OdometryState {
            x: 1.0,
            y: -0.25,
            theta: 3.14159,
            v: 0.5,
            w: -0.125,
            timestamp_ms: 123456,
        });
        assert_eq!(
            telemetry.to_frame().unwrap().as_str(),
            "ODM:1.0000,-0.2500,3.1416,0.500,-0.125,123456"
        );
    }

    #[test]
    fn test_encode_legacy() {
        let telemetry = Telemetry::Legacy([
            WheelStatus::from_rev_per_s(Direction::Forward, 0.4996),
            WheelStatus::from_rev_per_s(Direction::Stop, 0.0),
        ]);
        assert_eq!(telemetry.to_frame().unwrap().as_str(), "1,500;0,0");
    }

    #[test]
    fn test_decode() {
        let telemetry: Telemetry = "ODM:0.1000,0.0000,0.0000,0.100,0.000,1000".parse().unwrap();
        let Telemetry::Odometry(state) = telemetry else {
            panic!("expected odometry");
        };
        assert_eq!(state.x, 0.1);
        assert_eq!(state.timestamp_ms, 1000);

        assert_eq!(
            "2,250;1,1000".parse::<Telemetry>(),
            Ok(Telemetry::Legacy([
                WheelStatus {
                    direction: Direction::Backward,
                    speed_mrs: 250
                },
                WheelStatus {
                    direction: Direction::Forward,
                    speed_mrs: 1000
                },
            ]))
        );
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            "ODM:0,0,0,0,0".parse::<Telemetry>(),
            Err(ParseError::MissingField("timestamp_ms"))
        );
        assert_eq!(
            "ODM:0,0,nan?,0,0,1".parse::<Telemetry>(),
            Err(ParseError::InvalidNumber("theta"))
        );
        assert_eq!(
            "1,500".parse::<Telemetry>(),
            Err(ParseError::MissingField("wheel2"))
        );
        assert_eq!(
            "7,500;1,0".parse::<Telemetry>(),
            Err(ParseError::InvalidNumber("wheel1"))
        );
    }
}
