pub mod commands;
pub mod control;
pub mod encoder;
pub mod telemetry;
pub mod usb;
