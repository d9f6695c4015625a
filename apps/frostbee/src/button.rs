//! User button.

use core::convert::Infallible;

use embassy_nrf::gpio::Input;
use embassy_time::Instant;
use embedded_hal::digital::{ErrorType, InputPin};
use frostbee_sensors::events::{self, Event, WorkQueue};

use crate::pins::BUTTON_PIN;

/// Posts an [`Event::ButtonEdge`] for every level change of the button.
#[embassy_executor::task]
pub async fn edges(mut button: Input<'static>, queue: &'static WorkQueue) -> ! {
    loop {
        button.wait_for_any_edge().await;
        events::post(queue, Event::ButtonEdge(Instant::now()));
    }
}

/// Reads the button level while [`edges()`] owns the pin.
pub struct ButtonLevel;

impl ErrorType for ButtonLevel {
    type Error = Infallible;
}

impl InputPin for ButtonLevel {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        // SAFETY: reading the input register has no side effect.
        let p1 = unsafe { &*nrf52840_pac::P1::ptr() };
        Ok(p1.in_.read().bits() & (1 << BUTTON_PIN) != 0)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}
