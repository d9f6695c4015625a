//! Build-time helpers shared by the Frostbee crates.

#![no_std]
#![deny(missing_docs)]

pub mod env;
