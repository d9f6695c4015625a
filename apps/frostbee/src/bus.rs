//! Sensor bus setup.

#[cfg(not(feature = "backend-register"))]
use embassy_nrf::twim;
use frostbee_sensors::{
    config::Config,
    transport::{Backend, BackendKind, ClaimError, NoDriver, PeripheralId, PinPair, PIN_CLAIMS},
};
use nrf52840_pac::twim0;

use crate::pins::{psel_bits, BusPeripherals, BUS_PERIPHERAL};

const PSEL_DISCONNECTED: u32 = 1 << 31;

/// Serial instances that can be routed to the bus pins.
const INSTANCES: [PeripheralId; 2] = [PeripheralId("TWIM0"), PeripheralId("TWIM1")];

#[cfg(not(feature = "backend-register"))]
pub type Bus = Backend<twim::Twim<'static, crate::pins::BusTwim>, NoDriver, NoDriver>;

#[cfg(feature = "backend-register")]
pub type Bus = Backend<NoDriver, registers::TwimRegisters, embassy_time::Delay>;

/// Claims the bus pins and sets up the configured backend on them.
pub fn init(peripherals: BusPeripherals, config: &Config) -> Result<Bus, ClaimError> {
    adopt_enabled(config.pins())?;
    let claim = PIN_CLAIMS.claim(BUS_PERIPHERAL, config.pins(), release)?;

    #[cfg(not(feature = "backend-register"))]
    {
        let mut twim_config = twim::Config::default();
        twim_config.frequency = from_frequency(config.frequency);

        let twim = twim::Twim::new(
            peripherals.twim,
            crate::Irqs,
            peripherals.sda,
            peripherals.scl,
            twim_config,
        );
        let driver = frostbee_sensors::transport::DriverBackend::new(twim, claim);

        Ok(match config.backend {
            BackendKind::AlternateMapping => Backend::AlternateMapping(driver),
            BackendKind::DriverMediated | BackendKind::DirectRegister => {
                Backend::DriverMediated(driver)
            }
        })
    }

    #[cfg(feature = "backend-register")]
    {
        debug_assert_eq!(config.backend, BackendKind::DirectRegister);

        let registers = registers::TwimRegisters::new(peripherals);
        Ok(Backend::DirectRegister(
            frostbee_sensors::transport::RegisterBackend::new(
                registers,
                embassy_time::Delay,
                claim,
                config.frequency,
            ),
        ))
    }
}

#[cfg(not(feature = "backend-register"))]
fn from_frequency(frequency: frostbee_sensors::transport::Frequency) -> twim::Frequency {
    use frostbee_sensors::transport::Frequency;

    match frequency {
        Frequency::_100k => twim::Frequency::K100,
        Frequency::_400k => twim::Frequency::K400,
    }
}

fn registers(peripheral: PeripheralId) -> Option<&'static twim0::RegisterBlock> {
    // SAFETY: callers only read the configuration, or disable and disconnect the instance,
    // which is valid at any time.
    match peripheral.0 {
        "TWIM0" => Some(unsafe { &*nrf52840_pac::TWIM0::ptr() }),
        "TWIM1" => Some(unsafe { &*nrf52840_pac::TWIM1::ptr() }),
        _ => None,
    }
}

/// Records the other instances left enabled on the bus pins (e.g., by a bootloader), so that
/// claiming the pins releases them.
///
/// The aliases of an instance (TWI, SPIM, ...) share its `ENABLE` register and its first two
/// pin selects.
fn adopt_enabled(pins: PinPair) -> Result<(), ClaimError> {
    let selected = [psel_bits(pins.sda), psel_bits(pins.scl)];

    for peripheral in INSTANCES.into_iter().filter(|p| *p != BUS_PERIPHERAL) {
        let Some(regs) = registers(peripheral) else {
            continue;
        };
        if regs.enable.read().bits() == 0 {
            continue;
        }

        let routed = [regs.psel.sda.read().bits(), regs.psel.scl.read().bits()];
        if routed.iter().any(|bits| selected.contains(bits)) {
            frostbee_log::warn!("{} left enabled on the bus pins", peripheral.0);
            PIN_CLAIMS.adopt(peripheral, pins)?;
        }
    }

    Ok(())
}

/// Disables a TWIM instance found holding pins about to be claimed.
fn release(peripheral: PeripheralId) -> Result<(), ()> {
    let regs = registers(peripheral).ok_or(())?;

    regs.enable.write(|w| w.enable().disabled());
    regs.psel.sda.write(|w| unsafe { w.bits(PSEL_DISCONNECTED) });
    regs.psel.scl.write(|w| unsafe { w.bits(PSEL_DISCONNECTED) });
    Ok(())
}

#[cfg(feature = "backend-register")]
pub mod registers {
    //! Register-level access to TWIM0, bypassing the driver.
    //!
    //! Interrupts stay disabled: completion is polled by the
    //! [`RegisterBackend`](frostbee_sensors::transport::RegisterBackend).

    use core::sync::atomic::{compiler_fence, Ordering};

    use embassy_nrf::gpio::{AnyPin, Flex, OutputDrive, Pull};
    use frostbee_sensors::transport::{Error, Frequency, PinPair, RegisterBlock, RegisterEvent};

    use super::{twim0, PSEL_DISCONNECTED};
    use crate::pins::{psel_bits, BusPeripherals, BusTwim};

    /// Size of the DMA buffers; every sensor exchange fits.
    const BUFFER_LEN: usize = 8;

    const ERRORSRC_OVERRUN: u32 = 1 << 0;
    const ERRORSRC_ANACK: u32 = 1 << 1;
    const ERRORSRC_DNACK: u32 = 1 << 2;

    pub struct TwimRegisters {
        _twim: BusTwim,
        _sda: Flex<'static>,
        _scl: Flex<'static>,
        tx: [u8; BUFFER_LEN],
        rx: [u8; BUFFER_LEN],
        received: usize,
        reading: bool,
        error: Option<RegisterEvent>,
    }

    impl TwimRegisters {
        pub fn new(peripherals: BusPeripherals) -> Self {
            Self {
                _twim: peripherals.twim,
                _sda: open_drain(peripherals.sda),
                _scl: open_drain(peripherals.scl),
                tx: [0; BUFFER_LEN],
                rx: [0; BUFFER_LEN],
                received: 0,
                reading: false,
                error: None,
            }
        }

        fn regs(&self) -> &'static twim0::RegisterBlock {
            // SAFETY: the instance is owned through `_twim`.
            unsafe { &*nrf52840_pac::TWIM0::ptr() }
        }

        fn clear_events(&mut self) {
            let regs = self.regs();
            regs.events_stopped.reset();
            regs.events_error.reset();
            regs.events_lasttx.reset();
            regs.events_lastrx.reset();
            regs.errorsrc
                .write(|w| unsafe { w.bits(ERRORSRC_OVERRUN | ERRORSRC_ANACK | ERRORSRC_DNACK) });
            self.error = None;
        }
    }

    fn open_drain(pin: AnyPin) -> Flex<'static> {
        let mut pin = Flex::new(pin);
        pin.set_as_input_output(Pull::None, OutputDrive::Standard0Disconnect1);
        pin
    }

    impl RegisterBlock for TwimRegisters {
        fn enable(&mut self, pins: PinPair, frequency: Frequency) {
            let regs = self.regs();
            regs.enable.write(|w| w.enable().disabled());
            regs.inten.reset();
            regs.psel.sda.write(|w| unsafe { w.bits(psel_bits(pins.sda)) });
            regs.psel.scl.write(|w| unsafe { w.bits(psel_bits(pins.scl)) });
            regs.frequency.write(|w| match frequency {
                Frequency::_100k => w.frequency().k100(),
                Frequency::_400k => w.frequency().k400(),
            });
            regs.enable.write(|w| w.enable().enabled());
        }

        fn disable(&mut self) {
            let regs = self.regs();
            regs.enable.write(|w| w.enable().disabled());
            regs.psel.sda.write(|w| unsafe { w.bits(PSEL_DISCONNECTED) });
            regs.psel.scl.write(|w| unsafe { w.bits(PSEL_DISCONNECTED) });
        }

        fn is_enabled(&self) -> bool {
            self.regs().enable.read().enable().is_enabled()
        }

        fn start_write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Error> {
            let buffer = self.tx.get_mut(..bytes.len()).ok_or(Error::BackendUnavailable)?;
            buffer.copy_from_slice(bytes);
            self.clear_events();
            self.reading = false;

            let regs = self.regs();
            regs.address.write(|w| unsafe { w.bits(u32::from(address)) });
            regs.txd.ptr.write(|w| unsafe { w.bits(self.tx.as_ptr() as u32) });
            regs.txd.maxcnt.write(|w| unsafe { w.bits(bytes.len() as u32) });
            regs.shorts.write(|w| w.lasttx_stop().enabled());

            compiler_fence(Ordering::SeqCst);
            regs.tasks_starttx.write(|w| unsafe { w.bits(1) });
            Ok(())
        }

        fn start_read(&mut self, address: u8, len: usize) -> Result<(), Error> {
            if len > BUFFER_LEN {
                return Err(Error::BackendUnavailable);
            }
            self.clear_events();
            self.reading = true;
            self.received = 0;

            let regs = self.regs();
            regs.address.write(|w| unsafe { w.bits(u32::from(address)) });
            regs.rxd.ptr.write(|w| unsafe { w.bits(self.rx.as_mut_ptr() as u32) });
            regs.rxd.maxcnt.write(|w| unsafe { w.bits(len as u32) });
            regs.shorts.write(|w| w.lastrx_stop().enabled());

            compiler_fence(Ordering::SeqCst);
            regs.tasks_startrx.write(|w| unsafe { w.bits(1) });
            Ok(())
        }

        fn event(&mut self) -> Option<RegisterEvent> {
            let regs = self.regs();

            if regs.events_error.read().bits() != 0 {
                regs.events_error.reset();
                let source = regs.errorsrc.read().bits();
                regs.errorsrc.write(|w| unsafe { w.bits(source) });
                self.error = Some(if source & ERRORSRC_ANACK != 0 {
                    RegisterEvent::AddressNack
                } else if source & ERRORSRC_DNACK != 0 {
                    RegisterEvent::DataNack
                } else {
                    RegisterEvent::Error
                });
                // Errors do not stop the peripheral by themselves.
                regs.tasks_stop.write(|w| unsafe { w.bits(1) });
            }

            if regs.events_stopped.read().bits() == 0 {
                return None;
            }
            regs.events_stopped.reset();
            compiler_fence(Ordering::SeqCst);

            if self.reading {
                self.received = regs.rxd.amount.read().bits() as usize;
            }
            Some(self.error.take().unwrap_or(RegisterEvent::Done))
        }

        fn received(&self) -> &[u8] {
            self.rx.get(..self.received).unwrap_or(&[])
        }

        fn request_stop(&mut self) {
            self.regs().tasks_stop.write(|w| unsafe { w.bits(1) });
        }

        fn stop(&mut self) {
            self.regs().tasks_stop.write(|w| unsafe { w.bits(1) });
            self.clear_events();
        }
    }
}
