#![no_main]
#![no_std]

mod motor;
mod tasks;
mod util;

use defmt_rtt as _;
use panic_probe as _;
use rp2040_hal as hal;

/// Second stage boot loader for the W25Q080 flash
#[link_section = ".boot2"]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_W25Q080;

const XOSC_CRYSTAL_FREQ: u32 = 12_000_000;

rtic_monotonics::rp2040_timer_monotonic!(Mono);

#[rtic::app(
    device = rp2040_hal::pac,
    dispatchers = [TIMER_IRQ_1, TIMER_IRQ_2],
    peripherals = true
)]
mod app {
    use crate::motor::DriveMotors;
    use crate::tasks::commands::command_handler;
    use crate::tasks::control::motor_control_loop;
    use crate::tasks::encoder::encoder_irq;
    use crate::tasks::telemetry::telemetry_sender;
    use crate::tasks::usb::usb_irq;
    use crate::{hal, Mono, XOSC_CRYSTAL_FREQ};

    use chassis_core::event::Event;
    use chassis_core::framing::FrameAssembler;
    use chassis_core::Chassis;
    use defmt::info;
    use hal::{
        clocks,
        fugit::RateExtU32,
        gpio::{
            self,
            bank0::{Gpio14, Gpio15, Gpio16, Gpio17},
            FunctionI2C, FunctionSioInput, PullUp,
        },
        sio::Sio,
        watchdog::Watchdog,
    };

    // USB Device support
    use usb_device::{class_prelude::*, prelude::*};

    // USB Communications Class Device support
    use usbd_serial::SerialPort;

    const EVENT_CHANNEL_CAPACITY: usize = 16;
    const FRAME_BUFFER_SIZE: usize = chassis_core::chassis_message::MAX_FRAME_LEN;

    /// I2C address of the motor driver board
    const MOTOR_DRIVER_ADDRESS: u8 = 0x60;
    const MOTOR_PWM_FREQUENCY_HZ: f32 = 1600.0;

    pub type EncoderPins = (
        gpio::Pin<Gpio14, FunctionSioInput, PullUp>,
        gpio::Pin<Gpio15, FunctionSioInput, PullUp>,
    );

    type I2cPins = (
        gpio::Pin<Gpio16, FunctionI2C, PullUp>,
        gpio::Pin<Gpio17, FunctionI2C, PullUp>,
    );
    pub type Motors = DriveMotors<hal::I2C<hal::pac::I2C0, I2cPins>>;

    pub type EventSender = rtic_sync::channel::Sender<'static, Event, EVENT_CHANNEL_CAPACITY>;
    pub type EventReceiver = rtic_sync::channel::Receiver<'static, Event, EVENT_CHANNEL_CAPACITY>;

    #[shared]
    struct Shared {
        /// The USB Serial Device Driver, used by the interrupt and the telemetry sender
        usb_serial: SerialPort<'static, hal::usb::UsbBus>,
        /// True while a host has the serial port open
        usb_active: bool,
    }

    #[local]
    struct Local {
        usb_device: UsbDevice<'static, hal::usb::UsbBus>,
        usb_event_sender: EventSender,
        event_receiver: EventReceiver,

        encoder_pins: EncoderPins,
        motors: Motors,

        encoder_chassis: &'static Chassis,
        control_chassis: &'static Chassis,
        telemetry_chassis: &'static Chassis,
        command_chassis: &'static Chassis,
    }

    #[init(local = [
        chassis: Chassis = Chassis::new(),
        usb_bus: Option<UsbBusAllocator<hal::usb::UsbBus>> = None,
    ])]
    fn init(mut ctx: init::Context) -> (Shared, Local) {
        // Soft-reset does not release the hardware spinlocks
        // Release them now to avoid a deadlock after debug or watchdog reset
        unsafe {
            hal::sio::spinlock_reset();
        }

        info!("init");

        Mono::start(ctx.device.TIMER, &ctx.device.RESETS);

        // Configure the clocks, watchdog - The default is to generate a 125 MHz system clock
        let mut watchdog = Watchdog::new(ctx.device.WATCHDOG);
        let Ok(clocks) = clocks::init_clocks_and_plls(
            XOSC_CRYSTAL_FREQ,
            ctx.device.XOSC,
            ctx.device.CLOCKS,
            ctx.device.PLL_SYS,
            ctx.device.PLL_USB,
            &mut ctx.device.RESETS,
            &mut watchdog,
        ) else {
            defmt::panic!("failed to initialize the clocks");
        };

        let sio = Sio::new(ctx.device.SIO);
        let pins = gpio::Pins::new(
            ctx.device.IO_BANK0,
            ctx.device.PADS_BANK0,
            sio.gpio_bank0,
            &mut ctx.device.RESETS,
        );

        // single channel encoders, every edge raises IO_IRQ_BANK0
        let mut encoder_pins: EncoderPins = (
            pins.gpio14.into_pull_up_input(),
            pins.gpio15.into_pull_up_input(),
        );
        for interrupt in [gpio::Interrupt::EdgeHigh, gpio::Interrupt::EdgeLow] {
            encoder_pins.0.set_interrupt_enabled(interrupt, true);
            encoder_pins.1.set_interrupt_enabled(interrupt, true);
        }

        // motor driver on I2C0
        let sda: gpio::Pin<Gpio16, FunctionI2C, PullUp> = pins.gpio16.reconfigure();
        let scl: gpio::Pin<Gpio17, FunctionI2C, PullUp> = pins.gpio17.reconfigure();
        let i2c = hal::I2C::i2c0(
            ctx.device.I2C0,
            sda,
            scl,
            400.kHz(),
            &mut ctx.device.RESETS,
            &clocks.system_clock,
        );
        let motors = match DriveMotors::new(i2c, MOTOR_DRIVER_ADDRESS, MOTOR_PWM_FREQUENCY_HZ) {
            Ok(motors) => motors,
            Err(_) => defmt::panic!("failed to initialize the motor driver"),
        };

        // Set up the USB driver
        let usb_bus: &'static UsbBusAllocator<hal::usb::UsbBus> =
            ctx.local.usb_bus.insert(UsbBusAllocator::new(hal::usb::UsbBus::new(
                ctx.device.USBCTRL_REGS,
                ctx.device.USBCTRL_DPRAM,
                clocks.usb_clock,
                true,
                &mut ctx.device.RESETS,
            )));

        let usb_serial = SerialPort::new(usb_bus);

        // Create a USB device with a fake VID and PID
        let usb_device = match UsbDeviceBuilder::new(usb_bus, UsbVidPid(0x16c0, 0x27dd)).strings(&[
            StringDescriptors::default()
                .manufacturer("Fake company")
                .product("Chassis controller")
                .serial_number("TEST"),
        ]) {
            Ok(builder) => builder.device_class(usbd_serial::USB_CLASS_CDC).build(),
            Err(_) => defmt::panic!("invalid USB string descriptors"),
        };

        let (event_sender, event_receiver) =
            rtic_sync::make_channel!(Event, EVENT_CHANNEL_CAPACITY);

        let chassis: &'static Chassis = ctx.local.chassis;

        motor_control_loop::spawn().ok();
        telemetry_sender::spawn().ok();
        command_handler::spawn().ok();

        (
            Shared {
                usb_serial,
                usb_active: false,
            },
            Local {
                usb_device,
                usb_event_sender: event_sender,
                event_receiver,
                encoder_pins,
                motors,
                encoder_chassis: chassis,
                control_chassis: chassis,
                telemetry_chassis: chassis,
                command_chassis: chassis,
            },
        )
    }

    extern "Rust" {
        // Counts encoder pulses, kept short and at the highest priority
        #[task(binds = IO_IRQ_BANK0, priority = 3, local = [encoder_pins, encoder_chassis])]
        fn encoder_irq(cx: encoder_irq::Context);

        // Periodic speed estimation, actuation and odometry
        #[task(priority = 2, local = [motors, control_chassis])]
        async fn motor_control_loop(cx: motor_control_loop::Context);

        // Periodic ODM or legacy report to the host
        #[task(priority = 1, shared = [usb_serial, usb_active], local = [telemetry_chassis])]
        async fn telemetry_sender(cx: telemetry_sender::Context);

        // Applies host commands to the chassis
        #[task(priority = 1, local = [event_receiver, command_chassis])]
        async fn command_handler(cx: command_handler::Context);

        // Hardware task that reads bytes from the USB and publishes events!
        #[task(
            binds = USBCTRL_IRQ,
            shared = [usb_serial, usb_active],
            local = [
                usb_device,
                usb_event_sender,
                frame_assembler: FrameAssembler<FRAME_BUFFER_SIZE> = FrameAssembler::new(),
            ],
        )]
        fn usb_irq(cx: usb_irq::Context);
    }
}
