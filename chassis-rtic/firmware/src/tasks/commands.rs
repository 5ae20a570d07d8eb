use chassis_core::dispatch::{dispatch, Outcome};
use chassis_core::event::Event;
use defmt::{debug, info, warn};

use crate::app::command_handler;

/// Receives [`Event`]s from the USB interrupt and applies the commands to the chassis
pub async fn command_handler(cx: command_handler::Context<'_>) {
    let chassis = *cx.local.command_chassis;
    loop {
        match cx.local.event_receiver.recv().await {
            Ok(Event::Connected) => info!("Host connected"),
            Ok(Event::Disconnected) => info!("Host disconnected"),
            Ok(Event::Malformed(e)) => warn!("Malformed frame: {}", e),
            Ok(Event::Command(command)) => match dispatch(chassis, &command) {
                Outcome::Configured(config) => info!("Configured: {}", config),
                Outcome::Reset => info!("Odometry reset"),
                Outcome::VelocitySet(targets) | Outcome::LegacySet(targets) => {
                    debug!("Targets: {}", targets)
                }
                Outcome::Rejected(reason) => warn!("Command rejected: {}", reason),
                // logged by the dispatcher
                Outcome::Unrecognized => {}
            },
            Err(e) => {
                warn!(
                    "Error receiveing event: {}",
                    match e {
                        rtic_sync::channel::ReceiveError::NoSender => "NoSender",
                        rtic_sync::channel::ReceiveError::Empty => "Empty",
                    }
                );
            }
        }
    }
}
