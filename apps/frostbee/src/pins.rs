//! Board wiring.

use embassy_nrf::{
    gpio::{AnyPin, Pin as _},
    peripherals, Peripherals,
};
use frostbee_sensors::transport::{PeripheralId, Pin, PinPair};

#[cfg(not(feature = "backend-alt-pins"))]
pub type BusTwim = peripherals::TWISPI0;
#[cfg(not(feature = "backend-alt-pins"))]
pub const BUS_PERIPHERAL: PeripheralId = PeripheralId("TWIM0");

#[cfg(feature = "backend-alt-pins")]
pub type BusTwim = peripherals::TWISPI1;
#[cfg(feature = "backend-alt-pins")]
pub const BUS_PERIPHERAL: PeripheralId = PeripheralId("TWIM1");

/// Button pin (SW1, active low), port 1.
pub const BUTTON_PIN: u8 = 6;

pub struct BusPeripherals {
    pub twim: BusTwim,
    pub sda: AnyPin,
    pub scl: AnyPin,
}

pub struct BatteryPeripherals {
    pub saadc: peripherals::SAADC,
    /// AIN7.
    pub sense: peripherals::P0_31,
    pub divider: AnyPin,
}

pub struct Board {
    pub bus: BusPeripherals,
    pub battery: BatteryPeripherals,
    pub button: AnyPin,
}

impl Board {
    pub fn take(p: Peripherals, bus_pins: PinPair) -> Self {
        #[cfg(not(feature = "backend-alt-pins"))]
        let (twim, sda, scl) = (p.TWISPI0, p.P0_24.degrade(), p.P1_00.degrade());
        #[cfg(feature = "backend-alt-pins")]
        let (twim, sda, scl) = (p.TWISPI1, p.P0_26.degrade(), p.P0_27.degrade());

        // The selected backend must use the pins recorded in the configuration.
        debug_assert_eq!(sda.psel_bits(), psel_bits(bus_pins.sda));
        debug_assert_eq!(scl.psel_bits(), psel_bits(bus_pins.scl));

        Self {
            bus: BusPeripherals { twim, sda, scl },
            battery: BatteryPeripherals {
                saadc: p.SAADC,
                sense: p.P0_31,
                divider: p.P0_29.degrade(),
            },
            button: p.P1_06.degrade(),
        }
    }
}

/// Returns the value selecting `pin` in a `PSEL` register.
pub const fn psel_bits(pin: Pin) -> u32 {
    ((pin.port as u32) << 5) | pin.pin as u32
}
