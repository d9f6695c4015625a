//! Provides logging facilities.
//!
//! Messages are routed to [`defmt`](https://docs.rs/defmt) when the `defmt` feature is enabled,
//! to the [`log`](https://docs.rs/log) facade when the `log` feature is enabled, and are
//! discarded otherwise.
//! When both are enabled, `defmt` wins: it is the one used on the device.
//!
//! Format strings must stay compatible with both backends, which in practice means sticking to
//! `{}`, `{:?}` and `{:#x}`.

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]
#![deny(clippy::pedantic)]

#[cfg(feature = "defmt")]
#[doc(hidden)]
pub mod defmt {
    pub mod hidden {
        pub use defmt;
    }

    pub use defmt::Format;
}

#[cfg(all(feature = "log", not(feature = "defmt")))]
#[doc(hidden)]
pub mod hidden {
    pub use log;
}

// Every level macro forwards to `__log!`, which is defined once per backend.

#[cfg(feature = "defmt")]
#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    // The defmt macros expect `defmt` to be in scope.
    ($level:ident, $($arg:tt)*) => {{
        use $crate::defmt::hidden::defmt;
        defmt::$level!($($arg)*);
    }};
}

#[cfg(all(feature = "log", not(feature = "defmt")))]
#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    ($level:ident, $($arg:tt)*) => {{
        $crate::hidden::log::$level!($($arg)*);
    }};
}

#[cfg(not(any(feature = "defmt", feature = "log")))]
#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    // Arguments are still evaluated so that call sites keep type-checking.
    ($level:ident, $($arg:tt)*) => {{
        let _ = ($($arg)*);
    }};
}

/// Logs a message at the trace level.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::__log!(trace, $($arg)*)
    };
}

/// Logs a message at the debug level.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::__log!(debug, $($arg)*)
    };
}

/// Logs a message at the info level.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::__log!(info, $($arg)*)
    };
}

/// Logs a message at the warn level.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::__log!(warn, $($arg)*)
    };
}

/// Logs a message at the error level.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::__log!(error, $($arg)*)
    };
}
