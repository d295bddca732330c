//! Wire formats for the synthesized telemetry.
//!
//! Every shape describes the same inverter snapshot. Field names and nesting
//! are what downstream receivers key on, so they must not drift.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Selector for one of the wire formats, in round-robin order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    /// Nested `data` group with the legacy short field names.
    Current,
    /// Nested `data` group with descriptive field names.
    Renamed,
    /// Every field at the top level.
    Flat,
    /// Nested `readings` group in millivolts, kilowatts, kWh and Fahrenheit.
    UnitConversion,
}

impl Shape {
    pub const ALL: [Shape; 4] = [
        Shape::Current,
        Shape::Renamed,
        Shape::Flat,
        Shape::UnitConversion,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Maps a global dispatch index onto a shape, wrapping around `COUNT`.
    pub fn from_index(index: u64) -> Self {
        Self::ALL[(index % Self::COUNT as u64) as usize]
    }

    /// Position of this shape in [`Shape::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Shape::Current => "current",
            Shape::Renamed => "renamed",
            Shape::Flat => "flat",
            Shape::UnitConversion => "unit_conversion",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentPayload {
    pub device_type: String,
    pub device_name: String,
    pub device_id: String,
    pub date: String,
    pub time: String,
    pub signal_strength: String,
    pub data: CurrentData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentData {
    pub serial_no: String,
    pub s1v: u32,
    pub total_output_power: u32,
    pub f: u32,
    pub today_e: u32,
    pub total_e: u32,
    pub inv_temp: i32,
    pub fault_code: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenamedPayload {
    pub device_type: String,
    pub device_name: String,
    pub device_id: String,
    pub data: RenamedData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenamedData {
    pub serial_no: String,
    #[serde(rename = "voltage_input")]
    pub voltage: u32,
    #[serde(rename = "power_watts")]
    pub power: u32,
    #[serde(rename = "freq_hz")]
    pub frequency: u32,
    #[serde(rename = "energy_today_wh")]
    pub energy_today: u32,
    #[serde(rename = "energy_total_kwh")]
    pub energy_total: u32,
    #[serde(rename = "temp_celsius")]
    pub temperature: i32,
    pub error_code: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatPayload {
    pub device_type: String,
    pub device_name: String,
    pub device_id: String,
    pub serial_no: String,
    #[serde(rename = "V")]
    pub voltage: u32,
    #[serde(rename = "P")]
    pub power: u32,
    #[serde(rename = "Hz")]
    pub frequency: u32,
    #[serde(rename = "E_today")]
    pub energy_today: u32,
    #[serde(rename = "E_total")]
    pub energy_total: u32,
    pub temp: i32,
    pub status: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitConversionPayload {
    pub device_type: String,
    pub device_name: String,
    pub readings: UnitReadings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitReadings {
    pub voltage_mv: u32,
    pub power_kw: f64,
    pub frequency_hz: u32,
    pub today_kwh: f64,
    pub total_kwh: f64,
    pub temp_f: i32,
    pub fault: u8,
}

/// One telemetry snapshot in exactly one wire shape.
///
/// Serialized untagged: the JSON body is the bare record of the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Current(CurrentPayload),
    Renamed(RenamedPayload),
    Flat(FlatPayload),
    UnitConversion(UnitConversionPayload),
}

impl Payload {
    pub fn shape(&self) -> Shape {
        match self {
            Payload::Current(_) => Shape::Current,
            Payload::Renamed(_) => Shape::Renamed,
            Payload::Flat(_) => Shape::Flat,
            Payload::UnitConversion(_) => Shape::UnitConversion,
        }
    }

    pub fn device_type(&self) -> &str {
        match self {
            Payload::Current(p) => &p.device_type,
            Payload::Renamed(p) => &p.device_type,
            Payload::Flat(p) => &p.device_type,
            Payload::UnitConversion(p) => &p.device_type,
        }
    }
}
