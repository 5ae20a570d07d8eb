use crate::{app::usb_irq, util::channel_send};
use chassis_core::event::Event;
use defmt::info;
use rtic::mutex_prelude::*;
use usb_device::prelude::*;

pub fn usb_irq(mut cx: usb_irq::Context) {
    let usb_dev = &mut cx.local.usb_device;
    let assembler = cx.local.frame_assembler;
    let sender = cx.local.usb_event_sender;

    (cx.shared.usb_serial, cx.shared.usb_active).lock(|serial, usb_active| {
        // check if we are conected or not and emit the right event
        let is_connected = serial.dtr() && usb_dev.state() == UsbDeviceState::Configured;
        if is_connected && !*usb_active {
            info!("USB host connected");
            channel_send(sender, Event::Connected, "usb_irq");
        } else if !is_connected && *usb_active {
            info!("USB host disconnected");
            channel_send(sender, Event::Disconnected, "usb_irq");
        }
        *usb_active = is_connected;

        // Poll the USB driver with all of our supported USB Classes
        if usb_dev.poll(&mut [serial]) {
            let mut buf = [0u8; 64];
            match serial.read(&mut buf) {
                Err(_e) => {
                    // Do nothing
                }
                Ok(0) => {
                    // Do nothing
                }
                Ok(count) => assembler.push(&buf[..count], |frame| {
                    channel_send(sender, Event::from_frame(frame), "usb_irq")
                }),
            }
        }
    });
}
