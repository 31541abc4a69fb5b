#![feature(type_alias_impl_trait, lint_reasons)]
#![no_std]
#![no_main]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::wildcard_imports)]

mod control;
mod terminal;

use defmt_rtt as _;
use panic_probe as _;

/// Queued fault notifications waiting for the serial link
const NOTIFY_CAPACITY: usize = 4;

#[rtic::app(device = stm32f0xx_hal::pac, dispatchers = [USART1, TIM14])]
mod app {
    use defmt::{unreachable, *};
    use embedded_hal::spi::MODE_0;
    use reflow_core::{
        Actuators, ControllerContext, LineBuffer, Max6675Bank, Notification, Outbox, Oven,
        TickDivider, FAST_RATE, SLOW_DIVIDER,
    };
    use rtic_monotonics::{
        stm32::{Tim2 as Mono, *},
        Monotonic,
    };
    use rtic_sync::{
        channel::{ReceiveError, Receiver, Sender},
        make_channel,
    };
    use stm32f0xx_hal::{
        gpio::{
            gpioa::{PA5, PA6, PA7},
            Alternate, Output, Pin, PushPull, AF0,
        },
        pac::{IWDG, SPI1, TIM3, USART2},
        prelude::*,
        serial::{self, Event, Rx, Serial, Tx},
        spi::{EightBit, Spi},
        time::Hertz,
        timers::{self, Timer},
        watchdog::Watchdog,
    };

    use crate::{
        control::CONFIG,
        terminal::{Wake, RX_BUFFER, WAKE_CAPACITY},
        NOTIFY_CAPACITY,
    };

    type OutPin = Pin<Output<PushPull>>;
    type Probes = Max6675Bank<
        Spi<SPI1, PA5<Alternate<AF0>>, PA6<Alternate<AF0>>, PA7<Alternate<AF0>>, EightBit>,
        OutPin,
        2,
    >;

    #[shared]
    struct Shared {
        /// Registers written by the terminal, read by the control update
        context: ControllerContext,
        actuators: Actuators<OutPin>,
        outbox: Outbox,
        tx: Tx<USART2>,
        rx_buffer: heapless::Deque<u8, RX_BUFFER>,
    }

    #[local]
    struct Local {
        // Fast tick
        timer: Timer<TIM3>,
        divider: TickDivider,

        // Control update
        oven: Oven,
        probes: Probes,
        led: OutPin,
        faults: Sender<'static, Notification, NOTIFY_CAPACITY>,
        wake_transmit: Wake,

        // Terminal
        rx: Rx<USART2>,
        wake_terminal: Wake,
        lines: LineBuffer,
    }

    #[init]
    fn init(mut cx: init::Context) -> (Shared, Local) {
        // Set system clock to 24 MHz
        let mut rcc = cx
            .device
            .RCC
            .configure()
            .hsi48()
            .sysclk(24.mhz())
            .pclk(24.mhz())
            .hclk(24.mhz())
            .freeze(&mut cx.device.FLASH);

        trace!("sysclk: {}", rcc.clocks.sysclk().0);
        trace!("hclk: {}", rcc.clocks.hclk().0);
        trace!("pclk: {}", rcc.clocks.pclk().0);

        // Enable tim2 monotonic
        let token = rtic_monotonics::create_stm32_tim2_monotonic_token!();
        Mono::start(24_000_000, token);

        // Setup GPIO
        let gpioa = cx.device.GPIOA.split(&mut rcc);
        let gpiob = cx.device.GPIOB.split(&mut rcc);

        // Setup USART & USART interrupt
        let mut usart = Serial::usart2(
            cx.device.USART2,
            (
                gpioa.pa2.into_alternate_af1(&cx.cs),
                gpioa.pa15.into_alternate_af1(&cx.cs),
            ),
            115_200.bps(),
            &mut rcc,
        );
        usart.listen(Event::Rxne);
        let (tx, rx) = usart.split();

        // Setup thermocouple converters, top on PA4, bottom on PB1
        let spi = Spi::spi1(
            cx.device.SPI1,
            (
                gpioa.pa5.into_alternate_af0(&cx.cs),
                gpioa.pa6.into_alternate_af0(&cx.cs),
                gpioa.pa7.into_alternate_af0(&cx.cs),
            ),
            MODE_0,
            1.mhz(),
            &mut rcc,
        );
        let chip_selects = [
            gpioa.pa4.into_push_pull_output(&cx.cs).downgrade(),
            gpiob.pb1.into_push_pull_output(&cx.cs).downgrade(),
        ];
        let probes = unwrap!(Max6675Bank::new(spi, chip_selects));

        // Setup heating elements & fan
        let mut actuators = Actuators::new(
            gpiob.pb4.into_push_pull_output(&cx.cs).downgrade(),
            gpiob.pb5.into_push_pull_output(&cx.cs).downgrade(),
            gpiob.pb6.into_push_pull_output(&cx.cs).downgrade(),
        );
        unwrap!(actuators.off());

        let mut led = gpiob.pb3.into_push_pull_output(&cx.cs).downgrade();
        unwrap!(led.set_low());

        // Setup oven
        let mut oven = Oven::new(CONFIG);
        let context = ControllerContext::new(CONFIG.gains);

        // Setup channels
        let (faults, notifications) = make_channel!(Notification, NOTIFY_CAPACITY);
        let (wake_transmit, transmit_wakeups) = make_channel!((), WAKE_CAPACITY);
        let (wake_terminal, terminal_wakeups) = make_channel!((), WAKE_CAPACITY);

        // Launch tasks
        let _ = notifier::spawn(notifications);
        let _ = transmit::spawn(transmit_wakeups);
        let _ = terminal::spawn(terminal_wakeups);
        let _ = watchdog::spawn(cx.device.IWDG);

        // Setup fast tick
        let mut timer = Timer::tim3(cx.device.TIM3, Hertz(FAST_RATE.raw()), &mut rcc);
        timer.listen(timers::Event::TimeOut);

        oven.start();
        info!("reflow controller up, fault policy: {}", CONFIG.fault_policy);

        (
            Shared {
                context,
                actuators,
                outbox: Outbox::new(),
                tx,
                rx_buffer: heapless::Deque::new(),
            },
            Local {
                timer,
                divider: TickDivider::new(SLOW_DIVIDER),
                oven,
                probes,
                led,
                faults,
                wake_transmit,
                rx,
                wake_terminal,
                lines: LineBuffer::new(),
            },
        )
    }

    #[idle]
    fn idle(_: idle::Context) -> ! {
        loop {
            cortex_m::asm::wfi();
        }
    }

    #[task(priority = 1)]
    async fn watchdog(_: watchdog::Context, wdg: IWDG) {
        let mut wdg = Watchdog::new(wdg);
        wdg.start(1.hz());

        loop {
            wdg.feed();
            Mono::delay(100.millis()).await;
        }
    }

    /// Refresh the outputs and kick off a control update every slow tick.
    #[task(binds = TIM3, priority = 3, local = [timer, divider, overruns: u32 = 0], shared = [actuators])]
    fn fast_tick(mut cx: fast_tick::Context) {
        let _ = cx.local.timer.wait();

        cx.shared.actuators.lock(|actuators| unwrap!(actuators.refresh()));

        if cx.local.divider.tick() && control::spawn().is_err() {
            *cx.local.overruns += 1;
            warn!("control update overrun ({=u32} total)", *cx.local.overruns);
        }
    }

    #[task(
        priority = 2,
        local = [oven, probes, led, faults, wake_transmit],
        shared = [context, actuators, outbox]
    )]
    async fn control(cx: control::Context) {
        crate::control::control(cx);
    }

    #[task(priority = 1, shared = [outbox, tx])]
    async fn transmit(
        mut cx: transmit::Context,
        mut wake: Receiver<'static, (), WAKE_CAPACITY>,
    ) {
        loop {
            match wake.recv().await {
                Ok(()) => {}
                Err(ReceiveError::Empty) => continue,
                Err(ReceiveError::NoSender) => unreachable!("Sender dropped"),
            }

            let tx = &mut cx.shared.tx;
            Outbox::flush(&mut cx.shared.outbox, |line| {
                tx.lock(|tx| crate::terminal::write_line(tx, line));
            });
        }
    }

    #[task(priority = 1, shared = [tx])]
    async fn notifier(
        mut cx: notifier::Context,
        mut rx: Receiver<'static, Notification, NOTIFY_CAPACITY>,
    ) {
        loop {
            let notification = match rx.recv().await {
                Ok(notification) => notification,
                Err(ReceiveError::Empty) => continue,
                Err(ReceiveError::NoSender) => unreachable!("Sender dropped"),
            };

            cx.shared
                .tx
                .lock(|tx| crate::terminal::write_line(tx, &notification.line()));
        }
    }

    /// Apply the commands completed by received bytes
    #[task(priority = 1, local = [lines], shared = [rx_buffer, context])]
    async fn terminal(
        mut cx: terminal::Context,
        mut wake: Receiver<'static, (), WAKE_CAPACITY>,
    ) {
        loop {
            match wake.recv().await {
                Ok(()) => {}
                Err(ReceiveError::Empty) => continue,
                Err(ReceiveError::NoSender) => unreachable!("Sender dropped"),
            }

            let applied = cx
                .local
                .lines
                .drain(&mut cx.shared.rx_buffer, &mut cx.shared.context);
            trace!("{=usize} commands applied", applied);
        }
    }

    #[task(
        binds = USART2,
        priority = 2,
        local = [rx, wake_terminal, times: u32 = 0],
        shared = [rx_buffer]
    )]
    fn usart2(mut cx: usart2::Context) {
        *cx.local.times += 1;
        let rx = cx.local.rx;

        // Move all available bytes into the buffer
        cx.shared.rx_buffer.lock(|buffer| loop {
            match rx.read() {
                Ok(b) => {
                    if buffer.push_back(b).is_err() {
                        warn!("RX buffer full, dropping byte");
                    }
                }
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(e)) => warn!("USART error: {}", serial_error(e)),
            }
        });

        trace!("USART2 interrupt fired: {}", *cx.local.times);

        // Wake the terminal task to handle input
        crate::terminal::wake(cx.local.wake_terminal);
    }

    const fn serial_error(e: serial::Error) -> &'static str {
        match e {
            serial::Error::Framing => "Framing",
            serial::Error::Noise => "Noise",
            serial::Error::Overrun => "Overrun",
            serial::Error::Parity => "Parity",
            _ => "Unknown",
        }
    }

    timestamp!("{=u64:us}", {
        Mono::now().duration_since_epoch().to_micros()
    });
}
