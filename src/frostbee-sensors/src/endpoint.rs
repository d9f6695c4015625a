//! Description of the endpoint exposed to the network, and its current attribute values.
//!
//! The endpoint is a Home Automation temperature sensor: it serves the Basic, Identify, Power
//! Configuration, Temperature Measurement and Relative Humidity Measurement clusters, and is an
//! Identify client.
//! Its description is plain data, built by [`build()`] and handed to the radio stack; the
//! values that change over time live in an [`AttributeStore`].

use crate::report::{BatteryReport, MeasurementReport};

/// Endpoint number.
pub const ENDPOINT_ID: u8 = 1;
/// Home Automation profile.
pub const PROFILE_HOME_AUTOMATION: u16 = 0x0104;
/// Temperature sensor device.
pub const DEVICE_TEMPERATURE_SENSOR: u16 = 0x0302;

/// Manufacturer name reported by the Basic cluster.
pub const MANUFACTURER: &str = "Frostbee";
/// Model identifier reported by the Basic cluster.
pub const MODEL: &str = "FBE_TH_1";

/// Cluster identifiers.
pub mod cluster {
    /// Basic.
    pub const BASIC: u16 = 0x0000;
    /// Power Configuration.
    pub const POWER_CONFIGURATION: u16 = 0x0001;
    /// Identify.
    pub const IDENTIFY: u16 = 0x0003;
    /// Temperature Measurement.
    pub const TEMPERATURE: u16 = 0x0402;
    /// Relative Humidity Measurement.
    pub const HUMIDITY: u16 = 0x0405;
}

/// Attribute identifiers, within their cluster.
pub mod attribute {
    /// Basic: ZCL version.
    pub const ZCL_VERSION: u16 = 0x0000;
    /// Basic: manufacturer name.
    pub const MANUFACTURER_NAME: u16 = 0x0004;
    /// Basic: model identifier.
    pub const MODEL_IDENTIFIER: u16 = 0x0005;
    /// Basic: power source.
    pub const POWER_SOURCE: u16 = 0x0007;
    /// Identify: remaining identify time.
    pub const IDENTIFY_TIME: u16 = 0x0000;
    /// Power Configuration: battery voltage, in 100 mV.
    pub const BATTERY_VOLTAGE: u16 = 0x0020;
    /// Power Configuration: remaining battery, in half-percents.
    pub const BATTERY_PERCENTAGE_REMAINING: u16 = 0x0021;
    /// Measurement clusters: measured value.
    pub const MEASURED_VALUE: u16 = 0x0000;
    /// Measurement clusters: minimum measurable value.
    pub const MIN_MEASURED_VALUE: u16 = 0x0001;
    /// Measurement clusters: maximum measurable value.
    pub const MAX_MEASURED_VALUE: u16 = 0x0002;
}

/// Whether the endpoint serves a cluster or uses it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    /// The endpoint holds the attributes.
    Server,
    /// The endpoint sends commands to remote servers.
    Client,
}

/// An attribute value.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Value {
    /// 8-bit unsigned integer.
    U8(u8),
    /// 8-bit enumeration.
    Enum8(u8),
    /// 16-bit signed integer.
    I16(i16),
    /// 16-bit unsigned integer.
    U16(u16),
    /// Character string.
    Str(&'static str),
}

/// Where the value of an attribute comes from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Source {
    /// Never changes.
    Constant(Value),
    /// Held by the [`AttributeStore`].
    Live,
}

/// Describes an attribute.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Attribute {
    /// Identifier within the cluster.
    pub id: u16,
    /// Where the value comes from.
    pub source: Source,
    /// Whether the attribute can be configured for reporting.
    pub reportable: bool,
}

impl Attribute {
    const fn constant(id: u16, value: Value) -> Self {
        Self {
            id,
            source: Source::Constant(value),
            reportable: false,
        }
    }

    const fn live(id: u16, reportable: bool) -> Self {
        Self {
            id,
            source: Source::Live,
            reportable,
        }
    }
}

/// Describes a cluster.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cluster {
    /// Cluster identifier.
    pub id: u16,
    /// Server or client.
    pub role: Role,
    /// Attributes held by the cluster; empty for clients.
    pub attributes: &'static [Attribute],
}

/// Describes the endpoint.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Endpoint {
    /// Endpoint number.
    pub id: u8,
    /// Application profile.
    pub profile: u16,
    /// Device type.
    pub device: u16,
    /// Clusters, servers first.
    pub clusters: [Cluster; 6],
}

impl Endpoint {
    /// Returns the cluster `id` with the given role.
    #[must_use]
    pub fn cluster(&self, id: u16, role: Role) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.id == id && c.role == role)
    }

    /// Returns the server attribute `attribute` of cluster `cluster`.
    #[must_use]
    pub fn attribute(&self, cluster: u16, attribute: u16) -> Option<&Attribute> {
        self.cluster(cluster, Role::Server)?
            .attributes
            .iter()
            .find(|a| a.id == attribute)
    }
}

static BASIC_ATTRIBUTES: [Attribute; 4] = [
    Attribute::constant(attribute::ZCL_VERSION, Value::U8(3)),
    Attribute::constant(attribute::MANUFACTURER_NAME, Value::Str(MANUFACTURER)),
    Attribute::constant(attribute::MODEL_IDENTIFIER, Value::Str(MODEL)),
    // Battery.
    Attribute::constant(attribute::POWER_SOURCE, Value::Enum8(0x03)),
];

static IDENTIFY_ATTRIBUTES: [Attribute; 1] = [Attribute::live(attribute::IDENTIFY_TIME, false)];

static POWER_ATTRIBUTES: [Attribute; 2] = [
    Attribute::live(attribute::BATTERY_VOLTAGE, false),
    Attribute::live(attribute::BATTERY_PERCENTAGE_REMAINING, true),
];

static TEMPERATURE_ATTRIBUTES: [Attribute; 3] = [
    Attribute::live(attribute::MEASURED_VALUE, true),
    Attribute::constant(attribute::MIN_MEASURED_VALUE, Value::I16(-4000)),
    Attribute::constant(attribute::MAX_MEASURED_VALUE, Value::I16(12500)),
];

static HUMIDITY_ATTRIBUTES: [Attribute; 3] = [
    Attribute::live(attribute::MEASURED_VALUE, true),
    Attribute::constant(attribute::MIN_MEASURED_VALUE, Value::U16(0)),
    Attribute::constant(attribute::MAX_MEASURED_VALUE, Value::U16(10000)),
];

/// Builds the description of the endpoint.
#[must_use]
pub fn build() -> Endpoint {
    let server = |id: u16, attributes: &'static [Attribute]| Cluster {
        id,
        role: Role::Server,
        attributes,
    };

    Endpoint {
        id: ENDPOINT_ID,
        profile: PROFILE_HOME_AUTOMATION,
        device: DEVICE_TEMPERATURE_SENSOR,
        clusters: [
            server(cluster::BASIC, &BASIC_ATTRIBUTES),
            server(cluster::IDENTIFY, &IDENTIFY_ATTRIBUTES),
            server(cluster::POWER_CONFIGURATION, &POWER_ATTRIBUTES),
            server(cluster::TEMPERATURE, &TEMPERATURE_ATTRIBUTES),
            server(cluster::HUMIDITY, &HUMIDITY_ATTRIBUTES),
            Cluster {
                id: cluster::IDENTIFY,
                role: Role::Client,
                attributes: &[],
            },
        ],
    }
}

/// Current values of the live attributes.
///
/// Values read before the first update are the "unknown" values of the respective attributes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AttributeStore {
    temperature: i16,
    humidity: u16,
    battery_voltage: u8,
    battery_percentage: u8,
}

impl AttributeStore {
    /// "Unknown" temperature.
    pub const UNKNOWN_TEMPERATURE: i16 = i16::MIN;
    /// "Unknown" humidity.
    pub const UNKNOWN_HUMIDITY: u16 = 0xffff;
    /// "Unknown" battery voltage or percentage.
    pub const UNKNOWN_BATTERY: u8 = 0xff;

    /// Returns a store holding only unknown values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            temperature: Self::UNKNOWN_TEMPERATURE,
            humidity: Self::UNKNOWN_HUMIDITY,
            battery_voltage: Self::UNKNOWN_BATTERY,
            battery_percentage: Self::UNKNOWN_BATTERY,
        }
    }

    /// Records a measurement; invalid measurements are ignored.
    ///
    /// Returns whether the values were updated.
    pub fn update_measurement(&mut self, report: MeasurementReport) -> bool {
        if !report.valid {
            return false;
        }
        self.temperature = report.temperature;
        self.humidity = report.humidity;
        true
    }

    /// Records a battery state.
    pub fn update_battery(&mut self, report: BatteryReport) {
        self.battery_voltage = report.voltage;
        self.battery_percentage = report.percentage;
    }

    /// Returns the value of a server attribute described in `endpoint`.
    #[must_use]
    pub fn read(&self, endpoint: &Endpoint, cluster: u16, attribute: u16) -> Option<Value> {
        match endpoint.attribute(cluster, attribute)?.source {
            Source::Constant(value) => Some(value),
            Source::Live => self.live(cluster, attribute),
        }
    }

    fn live(&self, cluster_id: u16, attribute_id: u16) -> Option<Value> {
        let value = match (cluster_id, attribute_id) {
            (cluster::TEMPERATURE, attribute::MEASURED_VALUE) => Value::I16(self.temperature),
            (cluster::HUMIDITY, attribute::MEASURED_VALUE) => Value::U16(self.humidity),
            (cluster::POWER_CONFIGURATION, attribute::BATTERY_VOLTAGE) => {
                Value::U8(self.battery_voltage)
            }
            (cluster::POWER_CONFIGURATION, attribute::BATTERY_PERCENTAGE_REMAINING) => {
                Value::U8(self.battery_percentage)
            }
            // The device never identifies itself.
            (cluster::IDENTIFY, attribute::IDENTIFY_TIME) => Value::U16(0),
            _ => return None,
        };
        Some(value)
    }
}

impl Default for AttributeStore {
    fn default() -> Self {
        Self::new()
    }
}
