use std::io::{self, BufRead, Write};

use chassis_host::config::HostConfig;
use chassis_host::console::{parse_line, ConsoleCommand, HELP};
use chassis_host::link::{Link, SerialLink};
use chassis_host::monitor::Monitor;
use chassis_host::sim::SimulatedChassis;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Log to stdout, `RUST_LOG=debug` for more
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // load configuration file
    let config = match std::env::args().nth(1) {
        Some(path) => HostConfig::from_file(&path)?,
        None => HostConfig::default(),
    };

    let monitor = Monitor::new(config.print_every);
    let mut link: Box<dyn Link> = if config.simulate {
        Box::new(SimulatedChassis::start(monitor.clone(), config.closed_loop))
    } else {
        Box::new(SerialLink::open(&config.port, config.baud_rate, monitor.clone())?)
    };

    println!("{HELP}");
    let result = run_console(link.as_mut(), &config, &monitor);
    let closed = link.close();
    result.and(closed)
}

fn run_console(link: &mut dyn Link, config: &HostConfig, monitor: &Monitor) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }

        let command = match parse_line(&line, &config.geometry) {
            Ok(command) => command,
            Err(e) => {
                warn!("{e:#}");
                continue;
            }
        };

        match command {
            ConsoleCommand::Send(command) => link.send(&command.to_string())?,
            ConsoleCommand::Raw(raw) => link.send(&raw)?,
            ConsoleCommand::Direct { wheel1, wheel2 } => {
                if let Err(e) = link.drive_direct(wheel1, wheel2) {
                    warn!("{e:#}");
                }
            }
            ConsoleCommand::Feedback(control) => {
                if let Err(e) = link.set_feedback(control) {
                    warn!("{e:#}");
                }
            }
            ConsoleCommand::Status => {
                for line in monitor.view().status_lines() {
                    println!("{line}");
                }
            }
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Quit => return Ok(()),
            ConsoleCommand::Nothing => {}
        }
    }
}
