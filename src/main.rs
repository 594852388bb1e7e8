#![feature(type_alias_impl_trait)]
#![no_std]
#![no_main]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::wildcard_imports)]

use defmt_rtt as _;
use panic_probe as _;

/// Number of thermocouple probes.
const PROBES: usize = 3;
/// Rolling-average depth per channel.
const DEPTH: usize = 10;
/// Records of cross-channel average history kept for `dump avgs`.
const HISTORY: usize = 256;

#[rtic::app(device = stm32f0xx_hal::pac, dispatchers = [USART1, TIM14])]
mod app {
    use defmt::{panic, unreachable, *};
    use embedded_hal::digital::v2::InputPin;
    use fugit::TimerDurationU64;
    use rtic_monotonics::{
        stm32::{Tim2 as Mono, *},
        Monotonic,
    };
    use rtic_sync::{
        channel::{ReceiveError, Receiver, Sender},
        make_channel,
    };
    use stm32f0xx_hal::{
        delay::Delay,
        gpio::{
            gpioa::{PA15, PA2},
            Alternate, Floating, Input, OpenDrain, Output, Pin, PullUp, PushPull, AF1,
        },
        pac::{Interrupt, IWDG, USART2},
        prelude::*,
        serial,
        serial::{Event, Serial},
        watchdog::Watchdog,
    };

    use rtic_thermomon::{
        button::ButtonDecoder,
        display::{tenths, tm1637::Tm1637},
        monitor::{MonitorState, Sampler},
        storage::Storage,
        terminal::{Request, BUFFER_SIZE},
        thermometer::{
            max6675::{Max6675, Max6675Bus},
            Celsius,
        },
    };

    use crate::{DEPTH, HISTORY, PROBES};

    /// TIM2 monotonic tick rate.
    const MONO_HZ: u32 = 1_000_000;

    /// Interval between acquisitions.
    const SAMPLE_INTERVAL: TimerDurationU64<MONO_HZ> = TimerDurationU64::<MONO_HZ>::millis(250);

    type Probe = Max6675<Pin<Output<PushPull>>>;
    type Bus = Max6675Bus<Pin<Output<PushPull>>, Pin<Input<Floating>>>;
    type Display = Tm1637<Pin<Output<OpenDrain>>, Pin<Output<OpenDrain>>>;

    #[shared]
    struct Shared {
        usart: Serial<USART2, PA2<Alternate<AF1>>, PA15<Alternate<AF1>>>,
        buffer: heapless::Deque<u8, BUFFER_SIZE>,
        monitor: MonitorState<PROBES, DEPTH>,
        storage: Storage<HISTORY>,
    }

    #[local]
    struct Local {
        // Acquisition
        bus: Bus,
        probes: [Probe; PROBES],
        displays: [Display; PROBES],
        sampler: Sampler<MONO_HZ>,
        avg_tx: Sender<'static, Celsius, 1>,

        // Calibration input
        button: Pin<Input<PullUp>>,
        decoder: ButtonDecoder<MONO_HZ>,
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

        // Enable tim2 monotonic
        let token = rtic_monotonics::create_stm32_tim2_monotonic_token!();
        Mono::start(24_000_000, token);

        // Setup systick delay
        let mut delay = Delay::new(cx.core.SYST, &rcc);

        // Setup GPIO
        let gpioa = cx.device.GPIOA.split(&mut rcc);
        let gpiob = cx.device.GPIOB.split(&mut rcc);

        let _ = blinky::spawn(gpiob.pb3.into_push_pull_output(&cx.cs).downgrade());
        let _ = watchdog::spawn(cx.device.IWDG);

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
        rtic::pend(Interrupt::USART2);

        // Setup thermocouple bus: shared SCK/SO, one CS per converter
        let bus = Bus::new(
            gpioa.pa5.into_push_pull_output(&cx.cs).downgrade(),
            gpioa.pa6.into_floating_input(&cx.cs).downgrade(),
        );
        let probes = [
            unwrap!(Max6675::new(
                gpioa.pa1.into_push_pull_output(&cx.cs).downgrade()
            )),
            unwrap!(Max6675::new(
                gpioa.pa3.into_push_pull_output(&cx.cs).downgrade()
            )),
            unwrap!(Max6675::new(
                gpioa.pa4.into_push_pull_output(&cx.cs).downgrade()
            )),
        ];

        // Setup displays, blanked until the first acquisition
        let mut displays = [
            Display::new(
                gpiob.pb0.into_open_drain_output(&cx.cs).downgrade(),
                gpiob.pb1.into_open_drain_output(&cx.cs).downgrade(),
            ),
            Display::new(
                gpiob.pb4.into_open_drain_output(&cx.cs).downgrade(),
                gpiob.pb5.into_open_drain_output(&cx.cs).downgrade(),
            ),
            Display::new(
                gpiob.pb6.into_open_drain_output(&cx.cs).downgrade(),
                gpiob.pb7.into_open_drain_output(&cx.cs).downgrade(),
            ),
        ];
        for display in &mut displays {
            unwrap!(display.clear(&mut delay));
            unwrap!(display.set_brightness(4, &mut delay));
        }

        // Relay outputs; actuation is not wired up yet
        let mut relay1 = gpioa.pa7.into_push_pull_output(&cx.cs);
        let mut relay2 = gpioa.pa8.into_push_pull_output(&cx.cs);
        unwrap!(relay1.set_low());
        unwrap!(relay2.set_low());

        // Setup calibration button
        let button = gpioa.pa0.into_pull_up_input(&cx.cs).downgrade();

        // Setup channels
        let (avg_tx, avg_rx) = make_channel!(Celsius, 1);

        // Launch acquisition, storage & button polling
        let _ = sampler::spawn(delay);
        let _ = storage::spawn(avg_rx);
        let _ = buttons::spawn();

        (
            Shared {
                usart,
                buffer: heapless::Deque::new(),
                monitor: MonitorState::new(),
                storage: Storage::new(),
            },
            Local {
                bus,
                probes,
                displays,
                sampler: Sampler::new(SAMPLE_INTERVAL),
                avg_tx,
                button,
                decoder: ButtonDecoder::new(),
            },
        )
    }

    #[idle]
    fn idle(_: idle::Context) -> ! {
        rtic::pend(Interrupt::USART2);

        loop {
            cortex_m::asm::wfi();
        }
    }

    #[task(priority = 1)]
    async fn blinky(_: blinky::Context, mut pin: Pin<Output<PushPull>>) {
        unwrap!(pin.set_low());
        let mut now = Mono::now();
        loop {
            unwrap!(pin.toggle());
            now += 500.millis();
            Mono::delay_until(now).await;
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

    /// Acquisition loop: polls the tick gate, reads every probe, feeds the
    /// monitor as one batch, and pushes results to the displays.
    #[task(
        priority = 2,
        local = [bus, probes, displays, sampler, avg_tx],
        shared = [monitor]
    )]
    async fn sampler(mut cx: sampler::Context, mut delay: Delay) {
        // Let the converters finish their first conversion after power-up
        Mono::delay(1.secs()).await;

        loop {
            if cx.local.sampler.due(Mono::now()) {
                acquire(&mut cx, &mut delay);
            }
            Mono::delay(25.millis()).await;
        }
    }

    #[cfg_attr(feature = "sizing", inline(never))]
    fn acquire(cx: &mut sampler::Context<'_>, delay: &mut Delay) {
        let mut samples = [None; PROBES];
        for (i, probe) in cx.local.probes.iter_mut().enumerate() {
            match probe.read(cx.local.bus, delay) {
                Ok(value) => samples[i] = Some(value),
                // Skip-and-retain: the channel keeps its stale history this tick
                Err(e) => warn!("probe {}: {}", i + 1, e.as_str()),
            }
        }

        let (snapshot, values) = cx.shared.monitor.lock(|monitor| {
            monitor.ingest(&samples);
            (monitor.snapshot(), monitor.smoothed_values())
        });

        for (display, value) in cx.local.displays.iter_mut().zip(values) {
            unwrap!(display.show_tenths(tenths(value), delay));
        }

        debug!(
            "t_avg: {=f32}, dev: {}, corr: {}",
            snapshot.average, snapshot.deviation, snapshot.offset
        );

        // Full channel means the storage task is behind; drop this record
        let _ = cx.local.avg_tx.try_send(snapshot.average);
    }

    /// Polls the calibration button and applies decoded gestures.
    #[task(priority = 2, local = [button, decoder], shared = [monitor])]
    async fn buttons(mut cx: buttons::Context) {
        loop {
            let pressed = unwrap!(cx.local.button.is_low());
            if let Some(event) = cx.local.decoder.update(Mono::now(), pressed) {
                info!("button: {}", event);
                cx.shared.monitor.lock(|monitor| monitor.apply(event.into()));
            }
            Mono::delay(10.millis()).await;
        }
    }

    #[task(priority = 1, shared = [storage])]
    async fn storage(mut cx: storage::Context, mut rx: Receiver<'static, Celsius, 1>) {
        loop {
            let avg = match rx.recv().await {
                Ok(avg) => avg,
                Err(ReceiveError::Empty) => continue,
                Err(ReceiveError::NoSender) => unreachable!("Sender dropped"),
            };

            let secs = Mono::now().duration_since_epoch().to_secs() as u32;
            cx.shared.storage.lock(|storage| {
                storage.write(secs, avg);
            });
        }
    }

    #[task(priority = 2, shared = [usart, buffer, monitor, storage])]
    async fn terminal(cx: terminal::Context) {
        let usart = cx.shared.usart;
        let buffer = cx.shared.buffer;
        let monitor = cx.shared.monitor;
        let storage = cx.shared.storage;

        (usart, buffer, monitor, storage).lock(|usart, buffer, monitor, storage| {
            if let Some(request) = rtic_thermomon::terminal::run(usart, buffer, monitor, storage) {
                match request {
                    Request::Reset => {
                        info!("Resetting");
                        cortex_m::peripheral::SCB::sys_reset();
                    }
                }
            }
        });
    }

    #[task(binds = USART2, local = [times: u32 = 0], shared = [usart, buffer])]
    fn usart2(cx: usart2::Context) {
        *cx.local.times += 1;

        // Read & echo all available bytes from the usart
        (cx.shared.usart, cx.shared.buffer).lock(|usart, buffer| loop {
            match usart.read() {
                Ok(b) => {
                    // Echo back
                    if rtic_thermomon::terminal::is_newline(b) {
                        let _ = nb::block!(usart.write(b'\r'));
                        let _ = nb::block!(usart.write(b'\n'));
                    } else {
                        let _ = nb::block!(usart.write(b));
                    }

                    // Append to buffer
                    if buffer.push_back(b).is_err() {
                        panic!("Buffer overflow");
                    }
                }
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(serial::Error::Framing)) => {
                    panic!("USART error: Framing");
                }
                Err(nb::Error::Other(serial::Error::Noise)) => panic!("USART error: Noise"),
                Err(nb::Error::Other(serial::Error::Overrun)) => {
                    panic!("USART error: Overrun");
                }
                Err(nb::Error::Other(serial::Error::Parity)) => {
                    panic!("USART error: Parity");
                }

                Err(nb::Error::Other(_)) => defmt::panic!("USART error: Unknown"),
            }
        });

        defmt::trace!("USART2 interrupt fired: {}", *cx.local.times);

        // Trigger terminal task to handle input
        let _ = terminal::spawn();
    }

    timestamp!("{=u64:us}", {
        Mono::now().duration_since_epoch().to_micros()
    });
}
