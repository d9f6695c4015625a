//! Compile-time configuration read from environment variables.
//!
//! Every macro takes the name of an environment variable and a default value.
//! The variable is read with [`option_env!`] when the calling crate is built, so the resulting
//! value can be used in `const` items.
//! A variable that is set but cannot be parsed fails the build instead of silently falling back
//! to the default.
//!
//! ```
//! const INTERVAL_MS: u32 = frostbee_utils::u32_from_env_or!("FROSTBEE_DOC_INTERVAL_MS", 3000);
//! assert_eq!(INTERVAL_MS, 3000);
//! ```

#[doc(hidden)]
pub use {const_panic, konst};

#[doc(hidden)]
#[macro_export]
macro_rules! __parse_env_or {
    ($parse:ident, $type_name:literal, $var:literal, $default:expr) => {
        match option_env!($var) {
            None => $default,
            Some(raw) => match $crate::env::konst::primitive::$parse(raw) {
                Ok(value) => value,
                Err(_) => $crate::env::const_panic::concat_panic!(
                    "environment variable `",
                    $var,
                    "=",
                    raw,
                    "` is not ",
                    $type_name,
                ),
            },
        }
    };
}

/// Returns the value of an environment variable parsed as a `u8`, or `$default` if it is not
/// set.
#[macro_export]
macro_rules! u8_from_env_or {
    ($var:literal, $default:expr) => {
        $crate::__parse_env_or!(parse_u8, "a u8", $var, $default)
    };
}

/// Returns the value of an environment variable parsed as a `u32`, or `$default` if it is not
/// set.
#[macro_export]
macro_rules! u32_from_env_or {
    ($var:literal, $default:expr) => {
        $crate::__parse_env_or!(parse_u32, "a u32", $var, $default)
    };
}

/// Returns the value of an environment variable parsed as a `bool` (`true` or `false`), or
/// `$default` if it is not set.
#[macro_export]
macro_rules! bool_from_env_or {
    ($var:literal, $default:expr) => {
        $crate::__parse_env_or!(parse_bool, "a bool", $var, $default)
    };
}
