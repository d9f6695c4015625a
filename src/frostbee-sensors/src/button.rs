//! Debounced press classification for the user button.
//!
//! [`ButtonMonitor`] is driven by two inputs:
//!
//! - [`ButtonMonitor::on_edge()`], called for every raw edge of the pin, which only
//!   (re)schedules a debounce check;
//! - [`ButtonMonitor::poll()`], called at [`ButtonMonitor::next_deadline()`] with the current
//!   level of the pin, which runs the debounce check and the long-press timer.
//!
//! State only changes on a settled level, never on an edge itself.
//!
//! A release shortly after a press triggers an immediate read, holding the button triggers a
//! factory reset, and anything in between does nothing.
//! A press already held at startup is tracked but does not trigger anything until the button has
//! been released once.
//! Its level is checked once more after the debounce time, as its release may happen before
//! edges are observed.

use embassy_time::{Duration, Instant};

/// Press thresholds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonConfig {
    /// Time the level must stay stable after the last edge.
    pub debounce: Duration,
    /// Presses released before this trigger an immediate read.
    pub short_press_max: Duration,
    /// Presses held this long trigger a factory reset.
    pub long_press: Duration,
}

impl ButtonConfig {
    /// Default thresholds.
    pub const DEFAULT: Self = Self {
        debounce: Duration::from_millis(50),
        short_press_max: Duration::from_millis(1000),
        long_press: Duration::from_millis(5000),
    };
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Settled state of the button.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonState {
    /// Released.
    Idle,
    /// Pressed, the long-press threshold not reached yet.
    Pressed,
    /// Still pressed after the long-press action fired.
    LongPressFired,
}

/// Action requested through the button.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonAction {
    /// Read the sensor and report now.
    ImmediateRead,
    /// Leave the network and erase persistent state.
    FactoryReset,
}

/// Press classifier; see the [module documentation](self).
#[derive(Debug)]
pub struct ButtonMonitor {
    config: ButtonConfig,
    state: ButtonState,
    pressed_at: Instant,
    /// Set while a press held at startup has not been released yet.
    suppressed: bool,
    debounce_at: Option<Instant>,
    long_press_at: Option<Instant>,
}

impl ButtonMonitor {
    /// Creates a monitor, given the level of the pin at startup.
    #[must_use]
    pub fn new(config: ButtonConfig, initially_pressed: bool, now: Instant) -> Self {
        if initially_pressed {
            frostbee_log::info!("button held at startup, ignored until released");
        }

        let mut monitor = Self {
            config,
            state: if initially_pressed {
                ButtonState::Pressed
            } else {
                ButtonState::Idle
            },
            pressed_at: now,
            suppressed: initially_pressed,
            debounce_at: None,
            long_press_at: None,
        };
        if initially_pressed {
            monitor.on_edge(now);
        }
        monitor
    }

    /// Returns the settled state.
    #[must_use]
    pub fn state(&self) -> ButtonState {
        self.state
    }

    /// Records a raw edge: the debounce check is pushed back to `now` plus the debounce time.
    pub fn on_edge(&mut self, now: Instant) {
        self.debounce_at = Some(now + self.config.debounce);
    }

    /// Returns when [`poll()`](Self::poll) must be called next, if at all.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.debounce_at, self.long_press_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Runs the checks due at `now`, given the current level of the pin.
    pub fn poll(&mut self, now: Instant, pressed: bool) -> Option<ButtonAction> {
        if self.debounce_at.is_some_and(|at| at <= now) {
            self.debounce_at = None;
            if let Some(action) = self.settle(now, pressed) {
                return Some(action);
            }
        }

        if self.long_press_at.is_some_and(|at| at <= now) {
            self.long_press_at = None;
            if self.state == ButtonState::Pressed && pressed {
                self.transition(ButtonState::LongPressFired);
                return Some(ButtonAction::FactoryReset);
            }
        }

        None
    }

    fn settle(&mut self, now: Instant, pressed: bool) -> Option<ButtonAction> {
        match (self.state, pressed) {
            (ButtonState::Idle, true) => {
                self.transition(ButtonState::Pressed);
                self.pressed_at = now;
                self.long_press_at = Some(now + self.config.long_press);
                None
            }
            (ButtonState::Pressed, false) => {
                self.transition(ButtonState::Idle);
                self.long_press_at = None;
                if core::mem::take(&mut self.suppressed) {
                    return None;
                }

                let held = now.saturating_duration_since(self.pressed_at);
                frostbee_log::debug!("button held for {} ms", held.as_millis());
                (held < self.config.short_press_max).then_some(ButtonAction::ImmediateRead)
            }
            (ButtonState::LongPressFired, false) => {
                self.transition(ButtonState::Idle);
                None
            }
            // Same level as before: a bounce.
            _ => None,
        }
    }

    fn transition(&mut self, to: ButtonState) {
        frostbee_log::debug!("button: {:?} -> {:?}", self.state, to);
        self.state = to;
    }
}
