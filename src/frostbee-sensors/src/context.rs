//! Device context and scheduler.
//!
//! [`DeviceContext`] owns the resources shared between the periodic and the on-demand read
//! paths: the sensor, behind a lock serializing its accesses, the battery sampler, and the
//! attribute store.
//! The [`Scheduler`] handles the [`Event`]s of the work queue against a context, and forwards
//! the results to the [`Collaborator`].

use core::cell::RefCell;

use embassy_futures::select::{select, Either};
use embassy_sync::{
    blocking_mutex::{self, raw::CriticalSectionRawMutex},
    mutex::Mutex,
};
use embassy_time::{Instant, Timer};
use embedded_hal::digital::InputPin;
use embedded_hal_async::delay::DelayNs;

use crate::{
    battery::{AnalogInput, BatteryReading, BatterySampler},
    button::{ButtonAction, ButtonMonitor},
    endpoint::AttributeStore,
    events::{Event, WorkQueue},
    recovery::{MeasurementUnavailable, Recovering},
    report::{Collaborator, MeasurementReport},
    sht4x::{Measurement, Precision},
    transport::Transport,
};

/// Something able to produce trusted measurements.
pub trait MeasurementSource {
    /// Measures temperature and humidity.
    async fn measure(&mut self, precision: Precision)
        -> Result<Measurement, MeasurementUnavailable>;
}

impl<T: Transport, D: DelayNs> MeasurementSource for Recovering<T, D> {
    async fn measure(
        &mut self,
        precision: Precision,
    ) -> Result<Measurement, MeasurementUnavailable> {
        Recovering::measure(self, precision).await
    }
}

/// Something able to sample the battery.
pub trait BatterySource {
    /// Sampling error.
    type Error;

    /// Samples the battery.
    async fn sample(&mut self) -> Result<BatteryReading, Self::Error>;
}

impl<A, P, D> BatterySource for BatterySampler<A, P, D>
where
    A: AnalogInput,
    P: embedded_hal::digital::OutputPin,
    D: DelayNs,
{
    type Error = crate::battery::Error<A::Error, P::Error>;

    async fn sample(&mut self) -> Result<BatteryReading, Self::Error> {
        BatterySampler::sample(self).await
    }
}

/// Resources shared by every read path.
pub struct DeviceContext<S, B> {
    sensor: Mutex<CriticalSectionRawMutex, S>,
    battery: Mutex<CriticalSectionRawMutex, B>,
    attributes: blocking_mutex::Mutex<CriticalSectionRawMutex, RefCell<AttributeStore>>,
    precision: Precision,
}

impl<S: MeasurementSource, B: BatterySource> DeviceContext<S, B> {
    /// Creates a context; attributes start unknown.
    pub fn new(sensor: S, battery: B, precision: Precision) -> Self {
        Self {
            sensor: Mutex::new(sensor),
            battery: Mutex::new(battery),
            attributes: blocking_mutex::Mutex::new(RefCell::new(AttributeStore::new())),
            precision,
        }
    }

    /// Measures, waiting as long as needed for the sensor to be available.
    ///
    /// # Errors
    ///
    /// Returns [`MeasurementUnavailable`] if the sensor could not be read.
    pub async fn measure(&self) -> Result<Measurement, MeasurementUnavailable> {
        let mut sensor = self.sensor.lock().await;
        sensor.measure(self.precision).await
    }

    /// Samples the battery.
    ///
    /// # Errors
    ///
    /// Returns the sampling error.
    pub async fn sample_battery(&self) -> Result<BatteryReading, B::Error> {
        let mut battery = self.battery.lock().await;
        battery.sample().await
    }

    /// Returns a copy of the current attribute values.
    pub fn attributes(&self) -> AttributeStore {
        self.attributes.lock(|attributes| *attributes.borrow())
    }

    /// Updates the attribute values.
    pub fn update_attributes<R>(&self, f: impl FnOnce(&mut AttributeStore) -> R) -> R {
        self.attributes.lock(|attributes| f(&mut attributes.borrow_mut()))
    }
}

/// Outcome of a measurement cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cycle {
    /// Whether a measurement was reported.
    pub measured: bool,
    /// Whether a battery state was reported.
    pub battery: bool,
}

/// Handles work queue events.
pub struct Scheduler<'a, S, B, C> {
    context: &'a DeviceContext<S, B>,
    collaborator: C,
    button: ButtonMonitor,
}

impl<'a, S, B, C> Scheduler<'a, S, B, C>
where
    S: MeasurementSource,
    B: BatterySource,
    C: Collaborator,
{
    /// Creates a scheduler.
    pub fn new(context: &'a DeviceContext<S, B>, collaborator: C, button: ButtonMonitor) -> Self {
        Self {
            context,
            collaborator,
            button,
        }
    }

    /// Reads the sensor and the battery, and reports the results.
    ///
    /// A part that cannot be read is skipped for this cycle; the previous attribute values
    /// are kept.
    pub async fn periodic_cycle(&mut self) -> Cycle {
        let measured = match self.context.measure().await {
            Ok(measurement) => {
                let report = MeasurementReport::from(measurement);
                self.context
                    .update_attributes(|attributes| attributes.update_measurement(report));
                self.collaborator.report_measurement(report);
                true
            }
            Err(err) => {
                frostbee_log::warn!("skipping measurement report: {}", err);
                false
            }
        };

        let battery = match self.context.sample_battery().await {
            Ok(reading) => {
                let report = reading.report();
                self.context
                    .update_attributes(|attributes| attributes.update_battery(report));
                self.collaborator.report_battery(report);
                true
            }
            Err(_) => {
                frostbee_log::warn!("skipping battery report: sampling failed");
                false
            }
        };

        Cycle { measured, battery }
    }

    /// Carries out a button action.
    pub async fn handle_action(&mut self, action: ButtonAction) {
        frostbee_log::info!("button action: {:?}", action);
        match action {
            ButtonAction::ImmediateRead => {
                self.periodic_cycle().await;
                self.collaborator.immediate_read();
            }
            ButtonAction::FactoryReset => self.collaborator.factory_reset(),
        }
    }

    /// Handles an event from the work queue.
    pub async fn handle(&mut self, event: Event) {
        match event {
            Event::Periodic => {
                self.periodic_cycle().await;
            }
            Event::ButtonEdge(at) => self.button.on_edge(at),
        }
    }

    /// Runs the button checks due at `now`, given the current button level.
    pub async fn check_button(&mut self, now: Instant, pressed: bool) {
        if let Some(action) = self.button.poll(now, pressed) {
            self.handle_action(action).await;
        }
    }

    /// Handles events forever, running the button checks when they are due.
    ///
    /// The button is active low.
    pub async fn run<I: InputPin>(&mut self, queue: &WorkQueue, button: &mut I) -> ! {
        loop {
            let event = match self.button.next_deadline() {
                Some(deadline) => match select(queue.receive(), Timer::at(deadline)).await {
                    Either::First(event) => Some(event),
                    Either::Second(()) => None,
                },
                None => Some(queue.receive().await),
            };

            match event {
                Some(event) => self.handle(event).await,
                None => {
                    // An unreadable pin is treated as released.
                    let pressed = button.is_low().unwrap_or(false);
                    self.check_button(Instant::now(), pressed).await;
                }
            }
        }
    }
}
