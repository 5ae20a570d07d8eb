//! Byte link to the chassis controller.

use std::io::{ErrorKind, Read, Write};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Receiver, Sender},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, bail};
use chassis_core::framing::FrameAssembler;
use chassis_core::telemetry::TelemetryControl;
use chassis_message::{Command, WheelTarget, MAX_FRAME_LEN};
use serial2::SerialPort;
use tracing::info;

use crate::monitor::Monitor;

/// Where console commands go and telemetry comes from.
pub trait Link {
    /// Queues one frame, the terminator is added by the link.
    fn send(&mut self, frame: &str) -> anyhow::Result<()>;

    /// Sets wheel targets without going through the protocol.
    fn drive_direct(
        &mut self,
        _wheel1: WheelTarget,
        _wheel2: Option<WheelTarget>,
    ) -> anyhow::Result<()> {
        bail!("direct drive is only available on the simulated chassis")
    }

    /// Switches telemetry or changes its period.
    fn set_feedback(&mut self, _control: TelemetryControl) -> anyhow::Result<()> {
        bail!("telemetry control is only available on the simulated chassis")
    }

    /// Stops the link and reports what ended it.
    fn close(&mut self) -> anyhow::Result<()>;
}

/// Serial connection served by a background thread.
pub struct SerialLink {
    handle: Option<JoinHandle<anyhow::Result<()>>>,
    running: Arc<AtomicBool>,
    sender: Sender<String>,
}

impl SerialLink {
    pub fn open(path: &str, baud_rate: u32, monitor: Monitor) -> anyhow::Result<Self> {
        info!("Opening {path}");

        let mut port = SerialPort::open(path, baud_rate)?;
        port.set_read_timeout(Duration::from_millis(50))?;

        let running = Arc::new(AtomicBool::new(true));
        let (sender, receiver) = mpsc::channel();
        let handle = thread::spawn({
            let running = running.clone();
            move || serial_thread(port, running, monitor, receiver)
        });

        Ok(Self {
            handle: Some(handle),
            running,
            sender,
        })
    }
}

impl Link for SerialLink {
    fn send(&mut self, frame: &str) -> anyhow::Result<()> {
        self.sender
            .send(frame.to_owned())
            .map_err(|_| anyhow!("serial thread has stopped"))
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.running.store(false, Ordering::Relaxed);
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow!("serial thread panicked"))?,
            None => Ok(()),
        }
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

fn write_frame(port: &mut SerialPort, frame: &str) -> std::io::Result<()> {
    port.write_all(frame.as_bytes())?;
    port.write_all(b"\n")?;
    port.flush()
}

fn serial_thread(
    mut port: SerialPort,
    running: Arc<AtomicBool>,
    monitor: Monitor,
    receiver: Receiver<String>,
) -> anyhow::Result<()> {
    let mut assembler = FrameAssembler::<MAX_FRAME_LEN>::new();
    let mut buf = [0u8; 256];

    while running.load(Ordering::Relaxed) {
        while let Ok(frame) = receiver.try_recv() {
            info!("Sending: {}", frame);
            write_frame(&mut port, &frame)?;
        }

        match port.read(&mut buf) {
            Ok(count) => assembler.push(&buf[..count], |frame| monitor.record(frame)),
            // skip TimedOut errors
            Err(e) if e.kind() == ErrorKind::TimedOut => {}
            Err(e) => return Err(e.into()),
        }
    }

    // doesn't really matter if this succeeds or not since the connection might be broken already
    let stop = Command::Legacy {
        wheel1: WheelTarget::STOP,
        wheel2: Some(WheelTarget::STOP),
    };
    write_frame(&mut port, &stop.to_string()).ok();

    info!("Closing!");
    Ok(())
}
