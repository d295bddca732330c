//! Payload synthesis.
//!
//! Every shape is built from one [`Reading`] drawn from the shared value
//! ranges, then encoded with that shape's own names and units. Modulo unit
//! conversion, all shapes describe comparable magnitudes.
use rand::{rngs::SmallRng, Rng, SeedableRng};
use telesim_core::{
    CurrentData, CurrentPayload, FlatPayload, Payload, RenamedData, RenamedPayload, Shape,
    UnitConversionPayload, UnitReadings, FAULT_PROBABILITY, MAX_FAULT_CODE,
};
use time::OffsetDateTime;

/// Raw physical quantities of one measurement snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    /// Input voltage in device units (tenths of a volt).
    pub voltage: u32,
    /// Output power in watts.
    pub power: u32,
    /// Grid frequency in device units.
    pub frequency: u32,
    /// Energy produced today in Wh.
    pub energy_today: u32,
    /// Lifetime energy in Wh.
    pub energy_total: u32,
    /// Inverter temperature in tenths of a degree Celsius.
    pub temperature: i32,
    pub fault: u8,
}

impl Reading {
    pub fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            voltage: rng.gen_range(6100..6300),
            power: rng.gen_range(147_000..147_500),
            frequency: rng.gen_range(700..750),
            energy_today: rng.gen_range(0..1000),
            energy_total: rng.gen_range(500_000..510_000),
            temperature: rng.gen_range(645..655),
            fault: fault_code(rng),
        }
    }
}

/// Which device produced the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub device: u32,
    pub device_id: u32,
    pub serial: u32,
}

impl Identity {
    pub fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            device: rng.gen_range(1..=50),
            device_id: rng.gen_range(1..=600),
            serial: rng.gen_range(1..=600),
        }
    }
}

/// Draws a fault code: nonzero with probability [`FAULT_PROBABILITY`].
pub fn fault_code<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    if rng.gen_bool(FAULT_PROBABILITY) {
        rng.gen_range(1..=MAX_FAULT_CODE)
    } else {
        0
    }
}

pub fn to_millivolts(voltage: u32) -> u32 {
    voltage * 10
}

pub fn to_kilo(value: u32) -> f64 {
    f64::from(value) / 1000.
}

/// Linear transform from temperature ticks to the Fahrenheit field.
/// Integer arithmetic, truncating like the receivers expect.
pub fn to_fahrenheit(temperature: i32) -> i32 {
    temperature * 9 / 5 + 32
}

/// Builds a payload of `shape` stamped with the current UTC time.
pub fn synthesize<R: Rng + ?Sized>(shape: Shape, rng: &mut R) -> Payload {
    synthesize_at(shape, rng, OffsetDateTime::now_utc())
}

/// Deterministic form of [`synthesize`] for a given clock reading.
pub fn synthesize_at<R: Rng + ?Sized>(shape: Shape, rng: &mut R, now: OffsetDateTime) -> Payload {
    let identity = Identity::sample(rng);
    let reading = Reading::sample(rng);
    encode(shape, &identity, &reading, now)
}

pub fn encode(shape: Shape, id: &Identity, r: &Reading, now: OffsetDateTime) -> Payload {
    match shape {
        Shape::Current => Payload::Current(CurrentPayload {
            device_type: "current_format".to_string(),
            device_name: format!("ESIN{}", id.device),
            device_id: format!("ESDL{}", id.device_id),
            date: format!(
                "{:02}/{:02}/{:04}",
                now.day(),
                u8::from(now.month()),
                now.year()
            ),
            time: format!(
                "{:02}:{:02}:{:02}",
                now.hour(),
                now.minute(),
                now.second()
            ),
            signal_strength: "-1".to_string(),
            data: CurrentData {
                serial_no: id.serial.to_string(),
                s1v: r.voltage,
                total_output_power: r.power,
                f: r.frequency,
                today_e: r.energy_today,
                total_e: r.energy_total,
                inv_temp: r.temperature,
                fault_code: r.fault,
            },
        }),
        Shape::Renamed => Payload::Renamed(RenamedPayload {
            device_type: "format_2_inverter".to_string(),
            device_name: format!("INV_B_{}", id.device),
            device_id: format!("TYPE_B_{}", id.device_id),
            data: RenamedData {
                serial_no: format!("SN_{}", id.serial),
                voltage: r.voltage,
                power: r.power,
                frequency: r.frequency,
                energy_today: r.energy_today,
                energy_total: r.energy_total / 1000,
                temperature: r.temperature / 10,
                error_code: r.fault,
            },
        }),
        Shape::Flat => Payload::Flat(FlatPayload {
            device_type: "flat_format_device".to_string(),
            device_name: format!("FLAT_{}", id.device),
            device_id: format!("FL_{}", id.device_id),
            serial_no: format!("FLAT_SN_{}", id.serial),
            voltage: r.voltage,
            power: r.power,
            frequency: r.frequency,
            energy_today: r.energy_today,
            energy_total: r.energy_total,
            temp: r.temperature,
            status: r.fault,
        }),
        Shape::UnitConversion => Payload::UnitConversion(UnitConversionPayload {
            device_type: "unit_conversion_device".to_string(),
            device_name: format!("CONV_{}", id.device),
            readings: UnitReadings {
                voltage_mv: to_millivolts(r.voltage),
                power_kw: to_kilo(r.power),
                frequency_hz: r.frequency,
                today_kwh: to_kilo(r.energy_today),
                total_kwh: to_kilo(r.energy_total),
                temp_f: to_fahrenheit(r.temperature),
                fault: r.fault,
            },
        }),
    }
}

/// Random source for the dispatch unit at `index`.
///
/// Seeded runs derive an independent stream per dispatch index, so payloads
/// do not depend on the order in which units get scheduled.
pub fn dispatch_rng(seed: Option<u64>, index: u64) -> SmallRng {
    match seed {
        Some(seed) => {
            SmallRng::seed_from_u64(seed ^ index.wrapping_mul(0x9E37_79B9_7F4A_7C15))
        }
        None => SmallRng::from_entropy(),
    }
}
