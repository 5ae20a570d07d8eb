pub mod config;
pub mod console;
pub mod link;
pub mod monitor;
pub mod sim;
