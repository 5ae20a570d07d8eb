//! Operator console: one line in, one action out.

use anyhow::{anyhow, bail, Context};
use chassis_core::telemetry::TelemetryControl;
use chassis_message::{Command, OdometryConfig, WheelTarget};

pub const HELP: &str = "\
--- Chassis commands ---
  cfg <R> <L> <G> <P>   configure wheel_radius, wheel_base, gear_ratio, ppr (e.g. cfg 0.05 0.2 56 11)
  cfg                   configure with the geometry from the config file
  vel <v> [w]           linear (m/s) and angular (rad/s) velocity (e.g. vel 0.5 0.2)
  stop                  stop both wheels
  rst                   reset the odometry
  <d1>,<s1>;<d2>,<s2>   legacy wheel speeds in rev/s (e.g. 1,0.5;1,0.5)
  <d1>,<s1>             legacy speed of wheel 1, wheel 2 stops
  drive <d1>,<s1>[;<d2>,<s2>]
                        set wheel targets directly (simulation only)
  feedback on|off|<ms>  switch telemetry or set its period (simulation only)
  status / odom         last received odometry and wheel status
  help                  this help
  quit / exit           leave
anything else is sent as is
------------------------";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    /// Send a protocol frame
    Send(Command),
    /// Send the line untouched
    Raw(String),
    /// Set wheel targets without going through the protocol
    Direct {
        wheel1: WheelTarget,
        wheel2: Option<WheelTarget>,
    },
    /// Change the telemetry stream without going through the protocol
    Feedback(TelemetryControl),
    Status,
    Help,
    Quit,
    /// Blank line
    Nothing,
}

fn number(value: &str, name: &str) -> anyhow::Result<f32> {
    value
        .parse()
        .with_context(|| format!("invalid {name} '{value}'"))
}

fn configure(args: &[&str], geometry: &OdometryConfig) -> anyhow::Result<Command> {
    match args {
        [] => Ok(Command::Configure(*geometry)),
        [r, l, g, p] => Ok(Command::Configure(OdometryConfig {
            wheel_radius: number(r, "wheel_radius")?,
            wheel_base: number(l, "wheel_base")?,
            gear_ratio: number(g, "gear_ratio")?,
            encoder_ppr: number(p, "ppr")?,
        })),
        _ => bail!("usage: cfg <R> <L> <G> <P>"),
    }
}

fn velocity(args: &[&str]) -> anyhow::Result<Command> {
    let (linear, angular) = match args {
        [v] => (number(v, "v")?, 0.0),
        [v, w] => (number(v, "v")?, number(w, "w")?),
        _ => bail!("usage: vel <v> [w]"),
    };
    Ok(Command::Velocity { linear, angular })
}

fn wheel_targets(pairs: &str) -> anyhow::Result<(WheelTarget, Option<WheelTarget>)> {
    match pairs.parse::<Command>() {
        Ok(Command::Legacy { wheel1, wheel2 }) => Ok((wheel1, wheel2)),
        _ => Err(anyhow!("expected <d1>,<s1>[;<d2>,<s2>], got '{pairs}'")),
    }
}

fn feedback(args: &[&str]) -> anyhow::Result<TelemetryControl> {
    match args {
        ["on"] => Ok(TelemetryControl::Enable),
        ["off"] => Ok(TelemetryControl::Disable),
        [ms] => ms
            .parse()
            .map(TelemetryControl::IntervalMs)
            .with_context(|| format!("invalid interval '{ms}'")),
        _ => bail!("usage: feedback on|off|<ms>"),
    }
}

/// Reads one console line. `geometry` is used by a bare `cfg`.
pub fn parse_line(line: &str, geometry: &OdometryConfig) -> anyhow::Result<ConsoleCommand> {
    let line = line.trim();
    let mut words = line.split_whitespace();
    let Some(keyword) = words.next() else {
        return Ok(ConsoleCommand::Nothing);
    };
    let args: Vec<&str> = words.collect();

    let command = match keyword {
        "quit" | "exit" => ConsoleCommand::Quit,
        "help" => ConsoleCommand::Help,
        "status" | "odom" => ConsoleCommand::Status,
        "stop" => ConsoleCommand::Send(Command::Velocity {
            linear: 0.0,
            angular: 0.0,
        }),
        "rst" => ConsoleCommand::Send(Command::ResetOdometry),
        "cfg" => ConsoleCommand::Send(configure(&args, geometry)?),
        "vel" => ConsoleCommand::Send(velocity(&args)?),
        "drive" => {
            let (wheel1, wheel2) = wheel_targets(&args.concat())?;
            ConsoleCommand::Direct { wheel1, wheel2 }
        }
        "feedback" => ConsoleCommand::Feedback(feedback(&args)?),
        _ => match line.parse::<Command>() {
            // a lone pair is sent with an explicit stop for wheel 2
            Ok(Command::Legacy { wheel1, wheel2 }) => ConsoleCommand::Send(Command::Legacy {
                wheel1,
                wheel2: Some(wheel2.unwrap_or(WheelTarget::STOP)),
            }),
            _ => ConsoleCommand::Raw(line.to_owned()),
        },
    };
    Ok(command)
}

#[cfg(test)]
mod tests {
    use chassis_message::Direction;

    use super::*;

    const GEOMETRY: OdometryConfig = OdometryConfig {
        wheel_radius: 0.033,
        wheel_base: 0.16,
        gear_ratio: 56.0,
        encoder_ppr: 11.0,
    };

    fn parse(line: &str) -> ConsoleCommand {
        parse_line(line, &GEOMETRY).unwrap()
    }

    fn frame(line: &str) -> String {
        match parse(line) {
            ConsoleCommand::Send(command) => command.to_string(),
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[test]
    fn test_keywords() {
        assert_eq!(parse(""), ConsoleCommand::Nothing);
        assert_eq!(parse("   "), ConsoleCommand::Nothing);
        assert_eq!(parse("quit"), ConsoleCommand::Quit);
        assert_eq!(parse("exit"), ConsoleCommand::Quit);
        assert_eq!(parse("help"), ConsoleCommand::Help);
        assert_eq!(parse("odom"), ConsoleCommand::Status);
        assert_eq!(parse("status"), ConsoleCommand::Status);
    }

    #[test]
    fn test_protocol_frames() {
        assert_eq!(
            frame("cfg 0.05 0.2 56 11"),
            "CFG:wheel_radius=0.0500;wheel_base=0.2000;gear_ratio=56.0;ppr=11"
        );
        assert_eq!(
            frame("cfg"),
            "CFG:wheel_radius=0.0330;wheel_base=0.1600;gear_ratio=56.0;ppr=11"
        );
        assert_eq!(frame("vel 0.5 0.2"), "VEL:0.500,0.200");
        assert_eq!(frame("vel 0.3"), "VEL:0.300,0.000");
        assert_eq!(frame("stop"), "VEL:0.000,0.000");
        assert_eq!(frame("rst"), "RST:");
    }

    #[test]
    fn test_legacy_pairs() {
        assert_eq!(frame("1,0.5;2,0.25"), "1,0.500;2,0.250");
        assert_eq!(frame("1,0.5"), "1,0.500;0,0.000");
    }

    #[test]
    fn test_direct_drive() {
        assert_eq!(
            parse("drive 2,1.5"),
            ConsoleCommand::Direct {
                wheel1: WheelTarget::new(Direction::Backward, 1.5),
                wheel2: None,
            }
        );
        assert!(parse_line("drive forward", &GEOMETRY).is_err());
    }

    #[test]
    fn test_feedback() {
        assert_eq!(
            parse("feedback off"),
            ConsoleCommand::Feedback(TelemetryControl::Disable)
        );
        assert_eq!(
            parse("feedback on"),
            ConsoleCommand::Feedback(TelemetryControl::Enable)
        );
        assert_eq!(
            parse("feedback 50"),
            ConsoleCommand::Feedback(TelemetryControl::IntervalMs(50))
        );
        assert!(parse_line("feedback", &GEOMETRY).is_err());
        assert!(parse_line("feedback fast", &GEOMETRY).is_err());
    }

    #[test]
    fn test_raw_fallback() {
        assert_eq!(parse("ping"), ConsoleCommand::Raw("ping".to_owned()));
        assert_eq!(parse("3,0.5"), ConsoleCommand::Raw("3,0.5".to_owned()));
    }

    #[test]
    fn test_bad_arguments() {
        assert!(parse_line("cfg 0.05 0.2", &GEOMETRY).is_err());
        assert!(parse_line("vel fast", &GEOMETRY).is_err());
        assert!(parse_line("vel", &GEOMETRY).is_err());
    }
}
