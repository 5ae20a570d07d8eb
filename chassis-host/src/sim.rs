//! The chassis core running on std threads, with a motor model standing in for the
//! hardware.

use std::convert::Infallible;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use chassis_core::config::CONTROL_LOOP_PERIOD_MS;
use chassis_core::control::{Actuator, ControlLoop};
use chassis_core::dispatch::{apply_direct, dispatch, Outcome};
use chassis_core::model::{DutyLaw, Feedforward, FeedforwardPid, MotorModel};
use chassis_core::pid::PidGains;
use chassis_core::odometry::resolution;
use chassis_core::targets::Wheel;
use chassis_core::telemetry::{next_frame, TelemetryControl};
use chassis_core::Chassis;
use chassis_message::{Command, Direction, WheelTarget};
use tracing::{debug, info, warn};

use crate::link::Link;
use crate::monitor::Monitor;

/// Resolution of the simulated encoder signal
const PLANT_STEP: Duration = Duration::from_millis(1);

type MotorOutputs = Arc<Mutex<[(Direction, f64); 2]>>;

/// Latest direction and duty written by the control loop.
struct SimMotors {
    outputs: MotorOutputs,
}

impl SimMotors {
    fn update(&self, wheel: Wheel, f: impl FnOnce(&mut (Direction, f64))) {
        let mut outputs = self.outputs.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut outputs[wheel.index()]);
    }
}

impl Actuator for SimMotors {
    type Error = Infallible;

    fn set_direction(&mut self, wheel: Wheel, direction: Direction) -> Result<(), Infallible> {
        self.update(wheel, |output| output.0 = direction);
        Ok(())
    }

    fn set_duty(&mut self, wheel: Wheel, duty: f64) -> Result<(), Infallible> {
        self.update(wheel, |output| output.1 = duty);
        Ok(())
    }
}

/// Wheel speed in rev/s that `duty` produces, the inverse of the feedforward fit.
/// Below the fit's offset the motor stalls.
fn wheel_speed(model: &MotorModel, direction: Direction, duty: f64) -> f64 {
    let fit = match direction {
        Direction::Stop => return 0.0,
        Direction::Forward => &model.forward,
        Direction::Backward => &model.backward,
    };
    ((duty - fit.b) / fit.k).max(0.0)
}

fn now_ms(start: Instant) -> u32 {
    start.elapsed().as_millis() as u32
}

fn sleep_until(deadline: Instant) {
    let now = Instant::now();
    if deadline > now {
        thread::sleep(deadline - now);
    }
}

/// Turns motor outputs into encoder edges, the interrupt side of the chassis.
fn plant_thread(chassis: Arc<Chassis>, outputs: MotorOutputs, running: Arc<AtomicBool>) {
    let models = Feedforward::default();
    let mut pending = [0.0f64; 2];
    let mut last = Instant::now();

    while running.load(Ordering::Relaxed) {
        thread::sleep(PLANT_STEP);
        let now = Instant::now();
        let dt = (now - last).as_secs_f64();
        last = now;

        let counts_per_rev = chassis
            .odometry
            .config()
            .map(|config| resolution(&config))
            .unwrap_or_default()
            .counts_per_rev() as f64;
        let outputs = *outputs.lock().unwrap_or_else(PoisonError::into_inner);

        for wheel in Wheel::ALL {
            let (direction, duty) = outputs[wheel.index()];
            let pulses = &mut pending[wheel.index()];
            *pulses += wheel_speed(models.model(wheel), direction, duty) * counts_per_rev * dt;

            let counter = chassis.encoder(wheel);
            while *pulses >= 1.0 {
                counter.on_edge(true);
                counter.on_edge(false);
                *pulses -= 1.0;
            }
        }
    }
}

fn control_thread<L: DutyLaw>(
    chassis: Arc<Chassis>,
    law: L,
    outputs: MotorOutputs,
    running: Arc<AtomicBool>,
    start: Instant,
) {
    let period = Duration::from_millis(CONTROL_LOOP_PERIOD_MS as u64);
    let mut motors = SimMotors { outputs };
    let mut control = ControlLoop::new(&chassis, law, now_ms(start));

    let mut next_iteration = Instant::now();
    while running.load(Ordering::Relaxed) {
        next_iteration += period;
        if next_iteration < Instant::now() {
            warn!("Control loop is running behind");
            next_iteration = Instant::now();
        }
        sleep_until(next_iteration);

        control.tick(&chassis, &mut motors, now_ms(start));
    }
}

fn telemetry_thread(chassis: Arc<Chassis>, monitor: Monitor, running: Arc<AtomicBool>) {
    let mut next_iteration = Instant::now();
    while running.load(Ordering::Relaxed) {
        next_iteration += Duration::from_millis(chassis.telemetry.interval_ms() as u64);
        if next_iteration < Instant::now() {
            next_iteration = Instant::now();
        }
        sleep_until(next_iteration);

        if let Some(frame) = next_frame(&chassis) {
            monitor.record(&frame);
        }
    }
}

/// A chassis without hardware: frames sent to it are dispatched on the caller's
/// thread, telemetry goes straight to the [`Monitor`].
pub struct SimulatedChassis {
    chassis: Arc<Chassis>,
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl SimulatedChassis {
    /// `closed_loop` adds PID correction on top of the feedforward duty.
    pub fn start(monitor: Monitor, closed_loop: bool) -> Self {
        info!("Starting the simulated chassis (closed loop: {closed_loop})");

        let chassis = Arc::new(Chassis::new());
        let running = Arc::new(AtomicBool::new(true));
        let outputs: MotorOutputs = Arc::new(Mutex::new([(Direction::Stop, 0.0); 2]));
        let start = Instant::now();

        let handles = vec![
            thread::spawn({
                let (chassis, outputs, running) =
                    (chassis.clone(), outputs.clone(), running.clone());
                move || plant_thread(chassis, outputs, running)
            }),
            thread::spawn({
                let (chassis, running) = (chassis.clone(), running.clone());
                move || {
                    if closed_loop {
                        let law = FeedforwardPid::new(Feedforward::default(), PidGains::default());
                        control_thread(chassis, law, outputs, running, start)
                    } else {
                        control_thread(chassis, Feedforward::default(), outputs, running, start)
                    }
                }
            }),
            thread::spawn({
                let (chassis, running) = (chassis.clone(), running.clone());
                move || telemetry_thread(chassis, monitor, running)
            }),
        ];

        Self {
            chassis,
            running,
            handles,
        }
    }

    pub fn chassis(&self) -> &Chassis {
        &self.chassis
    }
}

impl Link for SimulatedChassis {
    fn send(&mut self, frame: &str) -> anyhow::Result<()> {
        info!("Sending: {}", frame);
        let command = match frame.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                warn!("Malformed frame: {e}");
                return Ok(());
            }
        };

        match dispatch(&self.chassis, &command) {
            Outcome::Configured(config) => info!("Configured: {:?}", config),
            Outcome::Reset => info!("Odometry reset"),
            Outcome::VelocitySet(targets) | Outcome::LegacySet(targets) => {
                debug!("Targets: {:?}", targets)
            }
            Outcome::Rejected(reason) => warn!("Command rejected: {reason}"),
            Outcome::Unrecognized => warn!("Unrecognized frame: {}", frame),
        }
        Ok(())
    }

    fn drive_direct(
        &mut self,
        wheel1: WheelTarget,
        wheel2: Option<WheelTarget>,
    ) -> anyhow::Result<()> {
        let targets = apply_direct(&self.chassis, wheel1, wheel2);
        info!("Targets: {:?}", targets);
        Ok(())
    }

    fn set_feedback(&mut self, control: TelemetryControl) -> anyhow::Result<()> {
        let interval_ms = self.chassis.telemetry.apply(control);
        info!(
            "Telemetry {}, every {} ms",
            if self.chassis.telemetry.is_enabled() { "on" } else { "off" },
            interval_ms
        );
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.running.store(false, Ordering::Relaxed);
        for handle in self.handles.drain(..) {
            handle
                .join()
                .map_err(|_| anyhow!("simulation thread panicked"))?;
        }
        Ok(())
    }
}

impl Drop for SimulatedChassis {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}
