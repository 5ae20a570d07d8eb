use chassis_message::{Command, ParseError};

/// Things that happen on the host link, delivered to the command handler.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connected,
    Disconnected,
    Command(Command),
    Malformed(ParseError),
}

impl Event {
    pub fn from_frame(frame: &str) -> Self {
        match frame.parse() {
            Ok(command) => Event::Command(command),
            Err(e) => Event::Malformed(e),
        }
    }
}
