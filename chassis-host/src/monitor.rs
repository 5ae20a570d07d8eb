//! Host side view of the robot, fed with every received telemetry frame.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chassis_message::{OdometryState, Telemetry, WheelStatus};
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct HostView {
    pub odometry: Option<OdometryState>,
    pub wheels: Option<[WheelStatus; 2]>,
    /// Telemetry frames decoded since start
    pub received: u64,
    /// Frames that were neither ODM nor legacy telemetry
    pub unrecognized: u64,
}

impl HostView {
    /// Lines printed by the `status` console command.
    pub fn status_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(s) = &self.odometry {
            lines.push(format!(
                "[Odometry] x={:.4} m, y={:.4} m, theta={:.4} rad ({:.2} deg)",
                s.x,
                s.y,
                s.theta,
                s.theta.to_degrees()
            ));
            lines.push(format!("[Odometry] v={:.3} m/s, w={:.3} rad/s", s.v, s.w));
            lines.push(format!("[Odometry] timestamp={} ms", s.timestamp_ms));
        }
        if let Some(wheels) = &self.wheels {
            for (i, wheel) in wheels.iter().enumerate() {
                lines.push(format!("[Status] M{}: {}", i + 1, describe_wheel(wheel)));
            }
        }
        if lines.is_empty() {
            lines.push("No telemetry received yet".to_owned());
        }
        lines
    }
}

fn describe_wheel(wheel: &WheelStatus) -> String {
    format!(
        "dir={}, speed={} mr/s ({:.3} r/s)",
        wheel.direction.code(),
        wheel.speed_mrs,
        wheel.speed_mrs as f32 / 1000.0
    )
}

struct Inner {
    view: HostView,
    print_every: u32,
    print_count: u32,
    window_start: Instant,
    window_count: u32,
}

/// Shared handle to the [`HostView`], cloned into the reader thread.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<Mutex<Inner>>,
}

impl Monitor {
    pub fn new(print_every: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                view: HostView::default(),
                print_every: print_every.max(1),
                print_count: 0,
                window_start: Instant::now(),
                window_count: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // the view stays usable even if a reader thread panicked mid update
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decodes one received frame and updates the view. Every `print_every` frames
    /// the latest state is logged together with the receive rate.
    pub fn record(&self, frame: &str) {
        let mut inner = self.lock();

        let telemetry = match frame.parse::<Telemetry>() {
            Ok(telemetry) => telemetry,
            Err(_) => {
                inner.view.unrecognized += 1;
                info!("Received: {}", frame);
                return;
            }
        };

        inner.view.received += 1;
        inner.window_count += 1;
        inner.print_count += 1;
        match telemetry {
            Telemetry::Odometry(state) => inner.view.odometry = Some(state),
            Telemetry::Legacy(wheels) => inner.view.wheels = Some(wheels),
        }

        if inner.print_count < inner.print_every {
            return;
        }
        inner.print_count = 0;

        let elapsed = inner.window_start.elapsed().as_secs_f32();
        let rate = if elapsed > 0.0 {
            inner.window_count as f32 / elapsed
        } else {
            0.0
        };
        inner.window_start = Instant::now();
        inner.window_count = 0;

        match telemetry {
            Telemetry::Odometry(s) => info!(
                "[Odometry] x={:.3} y={:.3} theta={:.2} rad ({:.1} deg) | v={:.2} m/s w={:.2} rad/s | t={} | {:.1} Hz",
                s.x,
                s.y,
                s.theta,
                s.theta.to_degrees(),
                s.v,
                s.w,
                s.timestamp_ms,
                rate
            ),
            Telemetry::Legacy([m1, m2]) => info!(
                "[Feedback] M1: {} | M2: {} | {:.1} Hz",
                describe_wheel(&m1),
                describe_wheel(&m2),
                rate
            ),
        }
    }

    pub fn view(&self) -> HostView {
        self.lock().view.clone()
    }
}

#[cfg(test)]
mod tests {
    use chassis_message::Direction;

    use super::*;

    #[test]
    fn test_records_both_dialects() {
        let monitor = Monitor::new(10);
        monitor.record("1,500;2,250");
        monitor.record("ODM:0.1000,0.0000,0.0000,0.200,0.000,1234");

        let view = monitor.view();
        assert_eq!(view.received, 2);
        let wheels = view.wheels.unwrap();
        assert_eq!(wheels[0].direction, Direction::Forward);
        assert_eq!(wheels[1].speed_mrs, 250);
        let odometry = view.odometry.unwrap();
        assert_eq!(odometry.timestamp_ms, 1234);
        assert_eq!(odometry.x, 0.1);
    }

    #[test]
    fn test_counts_unrecognized() {
        let monitor = Monitor::new(1);
        monitor.record("hello");
        monitor.record("ODM:1,2");
        let view = monitor.view();
        assert_eq!(view.received, 0);
        assert_eq!(view.unrecognized, 2);
        assert_eq!(view.status_lines(), vec!["No telemetry received yet"]);
    }

    #[test]
    fn test_status_lines() {
        let monitor = Monitor::new(1);
        monitor.record("1,1000;0,0");
        let lines = monitor.view().status_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "[Status] M1: dir=1, speed=1000 mr/s (1.000 r/s)");
    }
}
