//! Exclusive ownership of bus pins.
//!
//! Several peripheral instances can be routed to the same physical pins.
//! Two of them driving the pins at the same time produces contention that no backend is able
//! to detect, so every backend must hold a [`Claim`] on its pins.
//! Claiming pins currently held by another peripheral first has that peripheral released
//! (disabled and disconnected from its pins) through a caller-provided routine.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

/// Maximum number of peripherals holding pins at the same time.
const MAX_CLAIMS: usize = 4;

/// The claim registry of the device.
pub static PIN_CLAIMS: PinClaims = PinClaims::new();

/// A GPIO pin, identified by its port and its number within the port.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pin {
    /// GPIO port.
    pub port: u8,
    /// Pin number within the port.
    pub pin: u8,
}

impl Pin {
    /// Returns the pin `pin` of port `port`.
    #[must_use]
    pub const fn new(port: u8, pin: u8) -> Self {
        Self { port, pin }
    }
}

/// The two pins of an I2C bus.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinPair {
    /// Data line.
    pub sda: Pin,
    /// Clock line.
    pub scl: Pin,
}

impl PinPair {
    /// Returns whether the two pairs share at least one pin.
    #[must_use]
    pub fn overlaps(&self, other: &PinPair) -> bool {
        [self.sda, self.scl]
            .iter()
            .any(|pin| *pin == other.sda || *pin == other.scl)
    }
}

/// Identifies a peripheral instance able to drive bus pins, e.g., `"TWIM0"`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeripheralId(pub &'static str);

/// Error returned when pins could not be claimed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClaimError {
    /// The peripheral currently holding the pins could not be released.
    ReleaseFailed(PeripheralId),
    /// Too many peripherals hold pins already.
    RegistryFull,
}

impl core::fmt::Display for ClaimError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ReleaseFailed(owner) => write!(f, "could not release pins held by {}", owner.0),
            Self::RegistryFull => write!(f, "too many pin claims"),
        }
    }
}

impl core::error::Error for ClaimError {}

impl From<ClaimError> for super::Error {
    fn from(_: ClaimError) -> Self {
        super::Error::BackendUnavailable
    }
}

#[derive(Debug, Copy, Clone)]
struct Entry {
    peripheral: PeripheralId,
    pins: PinPair,
}

/// Records which peripheral owns which bus pins.
pub struct PinClaims {
    entries: Mutex<CriticalSectionRawMutex, RefCell<heapless::Vec<Entry, MAX_CLAIMS>>>,
}

impl PinClaims {
    /// Returns an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(RefCell::new(heapless::Vec::new())),
        }
    }

    /// Claims `pins` for `peripheral`.
    ///
    /// `release` is called for every other peripheral currently holding one of the pins, and
    /// must disable that peripheral and disconnect it from the pins.
    /// If it fails, the claim fails and the pins stay with their previous owner.
    ///
    /// A peripheral claiming pins again moves its claim to the new pins.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimError::ReleaseFailed`] if a previous owner could not be released, and
    /// [`ClaimError::RegistryFull`] if no more claims can be recorded.
    pub fn claim<F>(
        &'static self,
        peripheral: PeripheralId,
        pins: PinPair,
        mut release: F,
    ) -> Result<Claim, ClaimError>
    where
        F: FnMut(PeripheralId) -> Result<(), ()>,
    {
        self.entries.lock(|entries| {
            let mut entries = entries.borrow_mut();

            while let Some(position) = entries
                .iter()
                .position(|e| e.peripheral != peripheral && e.pins.overlaps(&pins))
            {
                let previous = entries.swap_remove(position);
                let owner = previous.peripheral;
                frostbee_log::info!("releasing bus pins held by {}", owner.0);
                if release(owner).is_err() {
                    // The previous owner is still driving the pins.
                    let _ = entries.push(previous);
                    return Err(ClaimError::ReleaseFailed(owner));
                }
            }

            entries.retain(|e| e.peripheral != peripheral);
            entries
                .push(Entry { peripheral, pins })
                .map_err(|_| ClaimError::RegistryFull)?;

            Ok(Claim {
                registry: self,
                peripheral,
                pins,
            })
        })
    }

    /// Records that `peripheral` drives `pins` without holding a [`Claim`], e.g., because it was
    /// left enabled before startup.
    ///
    /// The next [`claim()`](Self::claim) overlapping `pins` releases it like any other owner.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimError::RegistryFull`] if no more owners can be recorded.
    pub fn adopt(&self, peripheral: PeripheralId, pins: PinPair) -> Result<(), ClaimError> {
        self.entries.lock(|entries| {
            let mut entries = entries.borrow_mut();
            entries.retain(|e| e.peripheral != peripheral);
            entries
                .push(Entry { peripheral, pins })
                .map_err(|_| ClaimError::RegistryFull)
        })
    }

    /// Returns the peripheral currently holding `pin`, if any.
    #[cfg(test)]
    fn owner_of(&self, pin: Pin) -> Option<PeripheralId> {
        self.entries.lock(|entries| {
            entries
                .borrow()
                .iter()
                .find(|e| e.pins.sda == pin || e.pins.scl == pin)
                .map(|e| e.peripheral)
        })
    }

    fn release(&self, peripheral: PeripheralId) {
        self.entries.lock(|entries| {
            entries
                .borrow_mut()
                .retain(|e| e.peripheral != peripheral);
        });
    }
}

impl Default for PinClaims {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof that a peripheral exclusively owns its bus pins.
///
/// The pins are released when the claim is dropped.
#[derive(Debug)]
pub struct Claim {
    registry: &'static PinClaims,
    peripheral: PeripheralId,
    pins: PinPair,
}

impl Claim {
    /// Returns the peripheral owning the pins.
    #[must_use]
    pub fn peripheral(&self) -> PeripheralId {
        self.peripheral
    }

    /// Returns the claimed pins.
    #[must_use]
    pub fn pins(&self) -> PinPair {
        self.pins
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.registry.release(self.peripheral);
    }
}

impl core::fmt::Debug for PinClaims {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PinClaims").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIMARY: PinPair = PinPair {
        sda: Pin::new(0, 24),
        scl: Pin::new(1, 0),
    };
    const ALTERNATE: PinPair = PinPair {
        sda: Pin::new(0, 26),
        scl: Pin::new(0, 27),
    };

    #[test]
    fn test_claim_free_pins() {
        static CLAIMS: PinClaims = PinClaims::new();

        let claim = CLAIMS
            .claim(PeripheralId("TWIM0"), PRIMARY, |_| panic!("nothing to release"))
            .unwrap();
        assert_eq!(claim.pins(), PRIMARY);
        assert_eq!(CLAIMS.owner_of(PRIMARY.scl), Some(PeripheralId("TWIM0")));
        assert_eq!(CLAIMS.owner_of(ALTERNATE.sda), None);

        drop(claim);
        assert_eq!(CLAIMS.owner_of(PRIMARY.scl), None);
    }

    #[test]
    fn test_claim_releases_previous_owner() {
        static CLAIMS: PinClaims = PinClaims::new();

        let previous = CLAIMS
            .claim(PeripheralId("TWIM0"), PRIMARY, |_| Ok(()))
            .unwrap();
        // The previous owner is released through the routine, not through its `Claim`.
        core::mem::forget(previous);

        let mut released = Vec::new();
        let claim = CLAIMS
            .claim(PeripheralId("TWIM1"), PRIMARY, |owner| {
                released.push(owner);
                Ok(())
            })
            .unwrap();

        assert_eq!(released, [PeripheralId("TWIM0")]);
        assert_eq!(claim.peripheral(), PeripheralId("TWIM1"));
        assert_eq!(CLAIMS.owner_of(PRIMARY.sda), Some(PeripheralId("TWIM1")));
    }

    #[test]
    fn test_failed_release_keeps_previous_owner() {
        static CLAIMS: PinClaims = PinClaims::new();

        let _previous = CLAIMS
            .claim(PeripheralId("TWIM0"), PRIMARY, |_| Ok(()))
            .unwrap();

        let res = CLAIMS.claim(PeripheralId("TWIM1"), PRIMARY, |_| Err(()));

        assert_eq!(res.unwrap_err(), ClaimError::ReleaseFailed(PeripheralId("TWIM0")));
        assert_eq!(CLAIMS.owner_of(PRIMARY.sda), Some(PeripheralId("TWIM0")));
    }

    #[test]
    fn test_disjoint_pins_do_not_conflict() {
        static CLAIMS: PinClaims = PinClaims::new();

        let _primary = CLAIMS
            .claim(PeripheralId("TWIM0"), PRIMARY, |_| Ok(()))
            .unwrap();
        let _alternate = CLAIMS
            .claim(PeripheralId("TWIM1"), ALTERNATE, |_| panic!("pins are disjoint"))
            .unwrap();

        assert_eq!(CLAIMS.owner_of(PRIMARY.sda), Some(PeripheralId("TWIM0")));
        assert_eq!(CLAIMS.owner_of(ALTERNATE.scl), Some(PeripheralId("TWIM1")));
    }

    #[test]
    fn test_claim_releases_adopted_owner() {
        static CLAIMS: PinClaims = PinClaims::new();

        // Found enabled on one of the pins at startup.
        CLAIMS.adopt(PeripheralId("TWIM1"), PRIMARY).unwrap();
        assert_eq!(CLAIMS.owner_of(PRIMARY.scl), Some(PeripheralId("TWIM1")));

        let mut released = Vec::new();
        let claim = CLAIMS
            .claim(PeripheralId("TWIM0"), PRIMARY, |owner| {
                released.push(owner);
                Ok(())
            })
            .unwrap();

        assert_eq!(released, [PeripheralId("TWIM1")]);
        assert_eq!(claim.peripheral(), PeripheralId("TWIM0"));
        assert_eq!(CLAIMS.owner_of(PRIMARY.scl), Some(PeripheralId("TWIM0")));
    }

    #[test]
    fn test_adopted_owner_that_cannot_be_released_blocks_claim() {
        static CLAIMS: PinClaims = PinClaims::new();

        CLAIMS.adopt(PeripheralId("SPIM1"), PRIMARY).unwrap();

        let res = CLAIMS.claim(PeripheralId("TWIM0"), PRIMARY, |_| Err(()));

        assert_eq!(res.unwrap_err(), ClaimError::ReleaseFailed(PeripheralId("SPIM1")));
        assert_eq!(CLAIMS.owner_of(PRIMARY.sda), Some(PeripheralId("SPIM1")));
    }

    #[test]
    fn test_into_transport_error() {
        let err: super::super::Error = ClaimError::RegistryFull.into();
        assert_eq!(err, super::super::Error::BackendUnavailable);
    }
}
