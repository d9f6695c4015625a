//! CRC-8 protecting every 2-byte word sent by the sensor.
//!
//! Polynomial `0x31` (x⁸ + x⁵ + x⁴ + 1), initial value `0xff`, no reflection, no final XOR.

use crc::{Crc, CRC_8_NRSC_5};

const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_NRSC_5);

/// Computes the checksum of a data word, as transmitted after it.
#[must_use]
pub fn checksum(word: [u8; 2]) -> u8 {
    CRC8.checksum(&word)
}

/// Returns whether `expected` is the checksum of `word`.
#[must_use]
pub fn verify(word: [u8; 2], expected: u8) -> bool {
    checksum(word) == expected
}
