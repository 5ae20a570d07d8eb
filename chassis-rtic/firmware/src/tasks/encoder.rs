//! Pin interrupt feeding the pulse counters.

use chassis_core::pulse::PulseCounter;
use chassis_core::targets::Wheel;
use embedded_hal::digital::InputPin;
use rp2040_hal::gpio::{FunctionSioInput, Interrupt, Pin, PinId, PullType};

use crate::app::encoder_irq;

pub fn encoder_irq(cx: encoder_irq::Context) {
    let chassis = *cx.local.encoder_chassis;
    let (left, right) = cx.local.encoder_pins;

    feed_edges(left, chassis.encoder(Wheel::Left));
    feed_edges(right, chassis.encoder(Wheel::Right));
}

fn feed_edges<I: PinId, P: PullType>(pin: &mut Pin<I, FunctionSioInput, P>, counter: &PulseCounter) {
    let rising = pin.interrupt_status(Interrupt::EdgeHigh);
    let falling = pin.interrupt_status(Interrupt::EdgeLow);
    if rising {
        pin.clear_interrupt(Interrupt::EdgeHigh);
    }
    if falling {
        pin.clear_interrupt(Interrupt::EdgeLow);
    }

    if rising || falling {
        let level = matches!(pin.is_high(), Ok(true));
        counter.on_edges(rising, falling, level);
    }
}
