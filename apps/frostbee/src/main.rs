//! Frostbee: a battery-powered temperature and humidity sensor.
//!
//! Builds for the nRF52840 only; the host build is an empty binary.
#![cfg_attr(target_os = "none", no_std, no_main)]

#[cfg(target_os = "none")]
mod battery;
#[cfg(target_os = "none")]
mod bus;
#[cfg(target_os = "none")]
mod button;
#[cfg(target_os = "none")]
mod network;
#[cfg(target_os = "none")]
mod pins;

#[cfg(all(feature = "backend-register", feature = "backend-alt-pins"))]
compile_error!("features `backend-register` and `backend-alt-pins` are mutually exclusive");

#[cfg(all(feature = "diag-scan", feature = "diag-continuous"))]
compile_error!("features `diag-scan` and `diag-continuous` are mutually exclusive");

#[cfg(not(target_os = "none"))]
fn main() {}

#[cfg(target_os = "none")]
use device::Irqs;

#[cfg(target_os = "none")]
mod device {
    use defmt_rtt as _;
    use panic_probe as _;

    use embassy_executor::Spawner;
    use embassy_nrf::{
        bind_interrupts,
        gpio::{Input, Level, Output, OutputDrive, Pull},
        peripherals, saadc, twim,
    };
    use embassy_time::{Delay, Duration, Instant, Ticker, Timer};
    use embedded_hal::digital::InputPin as _;
    use frostbee_sensors::{
        battery::BatterySampler,
        button::ButtonMonitor,
        config::Config,
        context::{DeviceContext, Scheduler},
        diagnostics::{self, DiagnosticMode},
        events::{self, Event, WorkQueue},
        recovery::Recovering,
        sht4x::{Precision, Sht4x},
        transport::BackendKind,
    };
    use static_cell::StaticCell;

    use crate::{
        battery::SaadcInput,
        bus::{self, Bus},
        button::{self, ButtonLevel},
        network::Network,
        pins::Board,
    };

    #[cfg(not(feature = "backend-alt-pins"))]
    bind_interrupts!(pub struct Irqs {
        SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0 => twim::InterruptHandler<peripherals::TWISPI0>;
        SAADC => saadc::InterruptHandler;
    });

    #[cfg(feature = "backend-alt-pins")]
    bind_interrupts!(pub struct Irqs {
        SPIM1_SPIS1_TWIM1_TWIS1_SPI1_TWI1 => twim::InterruptHandler<peripherals::TWISPI1>;
        SAADC => saadc::InterruptHandler;
    });

    const BACKEND: BackendKind = if cfg!(feature = "backend-register") {
        BackendKind::DirectRegister
    } else if cfg!(feature = "backend-alt-pins") {
        BackendKind::AlternateMapping
    } else {
        BackendKind::DriverMediated
    };

    const DIAGNOSTIC: Option<DiagnosticMode> = if cfg!(feature = "diag-scan") {
        Some(DiagnosticMode::Scan)
    } else if cfg!(feature = "diag-continuous") {
        Some(DiagnosticMode::ContinuousRead)
    } else {
        None
    };

    const CONFIG: Config = Config::from_env()
        .with_backend(BACKEND)
        .with_diagnostic(DIAGNOSTIC);

    type Sensor = Recovering<Bus, Delay>;
    type Battery = BatterySampler<SaadcInput, Output<'static>, Delay>;
    type Context = DeviceContext<Sensor, Battery>;

    static QUEUE: WorkQueue = WorkQueue::new();
    static CONTEXT: StaticCell<Context> = StaticCell::new();

    #[embassy_executor::main]
    async fn main(spawner: Spawner) {
        let board = Board::take(embassy_nrf::init(Default::default()), CONFIG.pins());

        frostbee_log::info!("frostbee starting: {:?}", CONFIG);

        let bus = match bus::init(board.bus, &CONFIG) {
            Ok(bus) => bus,
            Err(err) => {
                frostbee_log::error!("could not set up the sensor bus: {}", err);
                return;
            }
        };

        match CONFIG.diagnostic {
            Some(DiagnosticMode::Scan) => {
                spawner.must_spawn(scan(bus, CONFIG.scan_interval));
                return;
            }
            Some(DiagnosticMode::ContinuousRead) => {
                spawner.must_spawn(continuous_read(
                    sensor(bus),
                    CONFIG.precision,
                    CONFIG.read_interval,
                ));
                return;
            }
            None => {}
        }

        let adc = SaadcInput::new(board.battery.saadc, board.battery.sense, &CONFIG.battery).await;
        let divider = Output::new(board.battery.divider, Level::Low, OutputDrive::Standard);
        let battery = match BatterySampler::new(adc, divider, Delay, CONFIG.battery) {
            Ok(battery) => battery,
            Err(_) => {
                frostbee_log::error!("could not disable the battery divider");
                return;
            }
        };

        let context: &'static Context =
            CONTEXT.init(DeviceContext::new(sensor(bus), battery, CONFIG.precision));

        let button_input = Input::new(board.button, Pull::Up);
        let initially_pressed = ButtonLevel.is_low().unwrap_or(false);
        let monitor = ButtonMonitor::new(CONFIG.button, initially_pressed, Instant::now());

        spawner.must_spawn(button::edges(button_input, &QUEUE));
        spawner.must_spawn(scheduler(Scheduler::new(context, Network, monitor)));
        spawner.must_spawn(ticker(CONFIG.read_interval));

        frostbee_log::info!("frostbee started");
    }

    fn sensor(bus: Bus) -> Sensor {
        Recovering::new(Sht4x::new(bus, Delay, CONFIG.sensor_address), CONFIG.retry)
    }

    #[embassy_executor::task]
    async fn ticker(interval: Duration) -> ! {
        let mut ticker = Ticker::every(interval);
        loop {
            events::post(&QUEUE, Event::Periodic);
            ticker.next().await;
        }
    }

    #[embassy_executor::task]
    async fn scheduler(mut scheduler: Scheduler<'static, Sensor, Battery, Network>) -> ! {
        scheduler.run(&QUEUE, &mut ButtonLevel).await
    }

    #[embassy_executor::task]
    async fn scan(mut bus: Bus, interval: Duration) -> ! {
        frostbee_log::info!("diagnostic mode: bus scan");
        loop {
            let found = diagnostics::scan(&mut bus).await;
            diagnostics::log_scan(&found);
            Timer::after(interval).await;
        }
    }

    #[embassy_executor::task]
    async fn continuous_read(mut sensor: Sensor, precision: Precision, interval: Duration) -> ! {
        frostbee_log::info!("diagnostic mode: continuous read");
        diagnostics::log_identity(&mut sensor).await;
        loop {
            Timer::after(interval).await;
            diagnostics::log_measurement(&mut sensor, precision).await;
        }
    }
}
