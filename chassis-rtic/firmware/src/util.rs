use defmt::warn;
use rtic_monotonics::Monotonic;
use rtic_sync::channel::{Sender, TrySendError};

use crate::Mono;

/// Helper function for trying to send something to a Sender MPSC channel, or print a warning
/// message if an error occurred
pub fn channel_send<T: defmt::Format, const N: usize>(
    sender: &mut Sender<'static, T, N>,
    value: T,
    context: &str,
) {
    match sender.try_send(value) {
        Err(TrySendError::Full(m)) => {
            warn!("Channel full, failed to send: {} ({})", m, context)
        }
        Err(TrySendError::NoReceiver(m)) => {
            warn!(
                "Channel has no receiver, failed to send: {} ({})",
                m, context
            )
        }
        _ => {}
    }
}

/// Milliseconds since boot, wraps after about 49 days.
pub fn now_ms() -> u32 {
    (Mono::now().ticks() / 1000) as u32
}
