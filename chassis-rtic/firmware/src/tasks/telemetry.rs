use chassis_core::framing::LineSender;
use chassis_core::telemetry::next_frame;
use defmt::{debug, warn};
use rp2040_hal::fugit::ExtU64;
use rtic::Mutex;
use rtic_monotonics::Monotonic;

use crate::{app::telemetry_sender, Mono};

const LOG_EVERY: u32 = 500;

pub async fn telemetry_sender(mut cx: telemetry_sender::Context<'_>) {
    let chassis = *cx.local.telemetry_chassis;
    let mut sent: u32 = 0;
    let mut sender = LineSender::new();

    let mut next_iteration_instant = Mono::now();
    loop {
        // re-read every period so interval changes apply on the next tick
        next_iteration_instant += (chassis.telemetry.interval_ms() as u64).millis();
        if next_iteration_instant < Mono::now() {
            next_iteration_instant = Mono::now();
        }
        Mono::delay_until(next_iteration_instant).await;

        let Some(frame) = next_frame(chassis) else {
            continue;
        };
        if !cx.shared.usb_active.lock(|usb_active| *usb_active) {
            // a new session starts on a line boundary
            sender.clear();
            continue;
        }

        let accepted = cx.shared.usb_serial.lock(|serial| {
            sender.send(&frame, |data| {
                let mut written = 0;
                while written < data.len() {
                    match serial.write(&data[written..]) {
                        Ok(len) if len > 0 => written += len,
                        _ => break,
                    }
                }
                written
            })
        });

        if accepted {
            sent = sent.wrapping_add(1);
            if sent % LOG_EVERY == 0 {
                debug!("{} telemetry frames sent, last '{}'", sent, frame.as_str());
            }
        } else {
            warn!("USB buffer full, telemetry frame dropped");
        }
    }
}
