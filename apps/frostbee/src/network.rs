//! Hand-off to the network stack.

use frostbee_sensors::{BatteryReport, Collaborator, MeasurementReport};

/// Collaborator forwarding to the network stack.
///
/// The radio stack runs outside of this firmware image; reports are only logged here.
pub struct Network;

impl Collaborator for Network {
    fn report_measurement(&mut self, report: MeasurementReport) {
        frostbee_log::info!(
            "report: T {} cC, RH {} c%",
            report.temperature,
            report.humidity
        );
    }

    fn report_battery(&mut self, report: BatteryReport) {
        frostbee_log::info!(
            "report: battery {} x100 mV, {}/200",
            report.voltage,
            report.percentage
        );
    }

    fn immediate_read(&mut self) {
        frostbee_log::info!("immediate read requested");
    }

    fn factory_reset(&mut self) {
        frostbee_log::warn!("factory reset requested");
    }
}
