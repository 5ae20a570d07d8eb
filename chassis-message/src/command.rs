use core::fmt::{self, Write};
use core::str::FromStr;

use crate::{
    frame_from_str, Direction, Frame, OdometryConfig, WheelTarget, DEFAULT_ENCODER_PPR,
    DEFAULT_GEAR_RATIO,
};

/// Everything the host can ask of the chassis.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `CFG:wheel_radius=R;wheel_base=L;gear_ratio=G;ppr=P`
    Configure(OdometryConfig),
    /// `VEL:v,w` with `v` in m/s and `w` in rad/s
    Velocity { linear: f32, angular: f32 },
    /// `RST:`
    ResetOdometry,
    /// `dir1,speed1;dir2,speed2` or `dir1,speed1`, speeds in rev/s
    Legacy {
        wheel1: WheelTarget,
        wheel2: Option<WheelTarget>,
    },
    /// A frame that matched none of the above, kept for logging
    Unknown(Frame),
}

/// A frame carried a known prefix but its payload could not be read.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    MissingField(&'static str),
    InvalidNumber(&'static str),
    /// A `CFG:` pair without `=`
    MissingSeparator,
    UnknownKey,
    TooManyFields,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => write!(f, "empty frame"),
            ParseError::MissingField(field) => write!(f, "missing field '{}'", field),
            ParseError::InvalidNumber(field) => write!(f, "invalid number for '{}'", field),
            ParseError::MissingSeparator => write!(f, "expected key=value"),
            ParseError::UnknownKey => write!(f, "unknown key"),
            ParseError::TooManyFields => write!(f, "too many fields"),
        }
    }
}

impl FromStr for Command {
    type Err = ParseError;

    /// Frames with a `CFG:`, `VEL:` or `RST:` prefix must be well formed. Anything else
    /// is tried as a legacy wheel command and ends up as [`Command::Unknown`] if that
    /// fails too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseError::Empty);
        }

        if let Some(body) = s.strip_prefix("CFG:") {
            parse_configure(body)
        } else if let Some(body) = s.strip_prefix("VEL:") {
            parse_velocity(body)
        } else if let Some(body) = s.strip_prefix("RST:") {
            if body.trim().is_empty() {
                Ok(Command::ResetOdometry)
            } else {
                Err(ParseError::TooManyFields)
            }
        } else {
            Ok(parse_legacy(s).unwrap_or_else(|| Command::Unknown(frame_from_str(s))))
        }
    }
}

fn parse_number(value: &str, field: &'static str) -> Result<f32, ParseError> {
    value
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or(ParseError::InvalidNumber(field))
}

fn parse_configure(body: &str) -> Result<Command, ParseError> {
    let mut wheel_radius = None;
    let mut wheel_base = None;
    let mut gear_ratio = None;
    let mut encoder_ppr = None;

    for pair in body.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').ok_or(ParseError::MissingSeparator)?;
        let (field, slot) = match key.trim() {
            "wheel_radius" => ("wheel_radius", &mut wheel_radius),
            "wheel_base" => ("wheel_base", &mut wheel_base),
            "gear_ratio" => ("gear_ratio", &mut gear_ratio),
            "ppr" => ("ppr", &mut encoder_ppr),
            _ => return Err(ParseError::UnknownKey),
        };
        *slot = Some(parse_number(value, field)?);
    }

    Ok(Command::Configure(OdometryConfig {
        wheel_radius: wheel_radius.ok_or(ParseError::MissingField("wheel_radius"))?,
        wheel_base: wheel_base.ok_or(ParseError::MissingField("wheel_base"))?,
        gear_ratio: gear_ratio.unwrap_or(DEFAULT_GEAR_RATIO),
        encoder_ppr: encoder_ppr.unwrap_or(DEFAULT_ENCODER_PPR),
    }))
}

fn parse_velocity(body: &str) -> Result<Command, ParseError> {
    let mut fields = body.split(',');

    let linear = match fields.next().map(str::trim) {
        Some(v) if !v.is_empty() => parse_number(v, "linear")?,
        _ => return Err(ParseError::MissingField("linear")),
    };
    let angular = match fields.next() {
        Some(w) => parse_number(w, "angular")?,
        None => 0.0,
    };
    if fields.next().is_some() {
        return Err(ParseError::TooManyFields);
    }

    Ok(Command::Velocity { linear, angular })
}

fn parse_wheel(pair: &str) -> Option<WheelTarget> {
    let (direction, speed) = pair.split_once(',')?;
    let direction = Direction::from_code(direction.trim().parse().ok()?)?;
    let speed: f64 = speed.trim().parse().ok()?;
    if !speed.is_finite() || speed < 0.0 {
        return None;
    }
    Some(WheelTarget { direction, speed })
}

fn parse_legacy(s: &str) -> Option<Command> {
    let mut pairs = s.split(';');
    let wheel1 = parse_wheel(pairs.next()?)?;
    let wheel2 = match pairs.next().map(str::trim) {
        None | Some("") => None,
        Some(pair) => Some(parse_wheel(pair)?),
    };
    if pairs.any(|p| !p.trim().is_empty()) {
        return None;
    }
    Some(Command::Legacy { wheel1, wheel2 })
}

/// Renders the frame exactly as the robot expects it, without a terminator.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Configure(config) => write!(
                f,
                "CFG:wheel_radius={:.4};wheel_base={:.4};gear_ratio={:.1};ppr={:.0}",
                config.wheel_radius, config.wheel_base, config.gear_ratio, config.encoder_ppr
            ),
            Command::Velocity { linear, angular } => write!(f, "VEL:{:.3},{:.3}", linear, angular),
            Command::ResetOdometry => write!(f, "RST:"),
            Command::Legacy { wheel1, wheel2 } => {
                write!(f, "{},{:.3}", wheel1.direction.code(), wheel1.speed)?;
                if let Some(wheel2) = wheel2 {
                    write!(f, ";{},{:.3}", wheel2.direction.code(), wheel2.speed)?;
                }
                Ok(())
            }
            Command::Unknown(raw) => f.write_str(raw),
        }
    }
}

impl Command {
    pub fn to_frame(&self) -> Result<Frame, fmt::Error> {
        let mut frame = Frame::new();
        write!(frame, "{}", self)?;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<Command, ParseError> {
        s.parse()
    }

    #[test]
    fn test_parse_configure() {
        let cmd = parse("CFG:wheel_radius=0.05;wheel_base=0.2;gear_ratio=30;ppr=13").unwrap();
        assert_eq!(
            cmd,
            Command::Configure(OdometryConfig {
                wheel_radius: 0.05,
                wheel_base: 0.2,
                gear_ratio: 30.0,
                encoder_ppr: 13.0,
            })
        );
    }

    #[test]
    fn test_parse_configure_defaults() {
        let Command::Configure(config) = parse("CFG:wheel_radius=0.05;wheel_base=0.2").unwrap()
        else {
            panic!("expected a configure command");
        };
        assert_eq!(config.gear_ratio, DEFAULT_GEAR_RATIO);
        assert_eq!(config.encoder_ppr, DEFAULT_ENCODER_PPR);
    }

    #[test]
    fn test_parse_configure_errors() {
        assert_eq!(
            parse("CFG:wheel_base=0.2"),
            Err(ParseError::MissingField("wheel_radius"))
        );
        assert_eq!(
            parse("CFG:wheel_radius=abc;wheel_base=0.2"),
            Err(ParseError::InvalidNumber("wheel_radius"))
        );
        assert_eq!(
            parse("CFG:wheel_radius=0.05;wheel_base"),
            Err(ParseError::MissingSeparator)
        );
        assert_eq!(
            parse("CFG:wheel_radius=0.05;wheel_base=0.2;colour=3"),
            Err(ParseError::UnknownKey)
        );
    }

    #[test]
    fn test_parse_velocity() {
        assert_eq!(
            parse("VEL:0.5,0.0"),
            Ok(Command::Velocity {
                linear: 0.5,
                angular: 0.0
            })
        );
        assert_eq!(
            parse("VEL:0.2"),
            Ok(Command::Velocity {
                linear: 0.2,
                angular: 0.0
            })
        );
        assert_eq!(
            parse("VEL:0,-1.5\r"),
            Ok(Command::Velocity {
                linear: 0.0,
                angular: -1.5
            })
        );
        assert_eq!(parse("VEL:"), Err(ParseError::MissingField("linear")));
        assert_eq!(parse("VEL:1,2,3"), Err(ParseError::TooManyFields));
        assert_eq!(parse("VEL:fast"), Err(ParseError::InvalidNumber("linear")));
    }

    #[test]
    fn test_parse_reset() {
        assert_eq!(parse("RST:"), Ok(Command::ResetOdometry));
        assert_eq!(parse("RST: "), Ok(Command::ResetOdometry));
        assert_eq!(parse("RST:now"), Err(ParseError::TooManyFields));
    }

    #[test]
    fn test_parse_legacy() {
        assert_eq!(
            parse("1,0.5;2,0.3"),
            Ok(Command::Legacy {
                wheel1: WheelTarget::new(Direction::Forward, 0.5),
                wheel2: Some(WheelTarget::new(Direction::Backward, 0.3)),
            })
        );
        assert_eq!(
            parse("1,0.5"),
            Ok(Command::Legacy {
                wheel1: WheelTarget::new(Direction::Forward, 0.5),
                wheel2: None,
            })
        );
        assert_eq!(
            parse("0,0;0,0"),
            Ok(Command::Legacy {
                wheel1: WheelTarget::STOP,
                wheel2: Some(WheelTarget::STOP),
            })
        );
    }

    #[test]
    fn test_parse_unknown() {
        for garbage in ["garbage", "3,0.5", "1,-0.5", "1,0.5;2", "1,0.5;1,0.5;1,0.5", "ODM:"] {
            assert_eq!(
                parse(garbage),
                Ok(Command::Unknown(frame_from_str(garbage))),
                "{}",
                garbage
            );
        }
        assert_eq!(parse("   "), Err(ParseError::Empty));
    }

    #[test]
    fn test_encode() {
        let config = OdometryConfig {
            wheel_radius: 0.05,
            wheel_base: 0.2,
            gear_ratio: 56.0,
            encoder_ppr: 11.0,
        };
        assert_eq!(
            Command::Configure(config).to_frame().unwrap().as_str(),
            "CFG:wheel_radius=0.0500;wheel_base=0.2000;gear_ratio=56.0;ppr=11"
        );
        assert_eq!(
            Command::Velocity {
                linear: 0.5,
                angular: -0.25
            }
            .to_frame()
            .unwrap()
            .as_str(),
            "VEL:0.500,-0.250"
        );
        assert_eq!(Command::ResetOdometry.to_frame().unwrap().as_str(), "RST:");
        assert_eq!(
            Command::Legacy {
                wheel1: WheelTarget::new(Direction::Forward, 0.5),
                wheel2: Some(WheelTarget::STOP),
            }
            .to_frame()
            .unwrap()
            .as_str(),
            "1,0.500;0,0.000"
        );

        // what the host sends is what the robot reads
        let parsed = parse(&Command::Configure(config).to_string()).unwrap();
        assert_eq!(parsed, Command::Configure(config));
    }
}
