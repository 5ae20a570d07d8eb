use chassis_core::config::CONTROL_LOOP_PERIOD_MS;
use chassis_core::control::ControlLoop;
use chassis_core::model::Feedforward;
use defmt::{debug, warn};
use rp2040_hal::fugit::ExtU64;
use rtic_monotonics::Monotonic;

use crate::{app::motor_control_loop, util::now_ms, Mono};

/// Print a control report every this many iterations (about once per second)
const REPORT_EVERY: u32 = 30;

pub async fn motor_control_loop(cx: motor_control_loop::Context<'_>) {
    let chassis = *cx.local.control_chassis;
    let motors = cx.local.motors;

    let mut control = ControlLoop::new(chassis, Feedforward::default(), now_ms());
    let mut iteration: u32 = 0;

    let mut next_iteration_instant = Mono::now();
    loop {
        next_iteration_instant += (CONTROL_LOOP_PERIOD_MS as u64).millis();
        if next_iteration_instant < Mono::now() {
            warn!("Motor control loop is running behind");
            next_iteration_instant = Mono::now();
        }
        Mono::delay_until(next_iteration_instant).await;

        let report = control.tick(chassis, motors, now_ms());
        if report.actuator_errors > 0 {
            warn!("{} motor writes failed", report.actuator_errors);
        }

        iteration = iteration.wrapping_add(1);
        if iteration % REPORT_EVERY == 0 {
            debug!("control: {}", report);
        }
    }
}
