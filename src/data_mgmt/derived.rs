//! Calculated sensors
//!
//! Each sensor is a pure function of the decoded values of its inputs. A
//! missing input, a zero denominator or a counter reset resolves to `None`
//! (unavailable); nothing here returns an error.

use serde::Serialize;

use crate::data_mgmt::process::round_to;
use crate::drivers::ScanTier;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Formula {
    /// inputs: [soc %, capacity kWh]
    StoredEnergy,
    /// inputs: [charged kWh, discharged kWh]
    RoundTripEfficiency,
    /// inputs: [battery power W, ac power W]
    ConversionEfficiency,
}

#[derive(Clone, Debug, Serialize)]
pub struct DerivedSensorSpec {
    pub key: &'static str,
    pub name: &'static str,
    pub unit: &'static str,
    pub scan_tier: ScanTier,
    pub enabled_by_default: bool,
    /// Register keys, in the order the formula expects them
    pub inputs: &'static [&'static str],
    pub formula: Formula,
}

impl DerivedSensorSpec {
    /// Compute from the current input values and the values of the previous cycle
    ///
    /// Both slices are aligned with `inputs`.
    pub fn compute(&self, current: &[Option<f64>], previous: &[Option<f64>]) -> Option<f64> {
        if current.len() != self.inputs.len() {
            return None;
        }
        let values: Vec<f64> = current.iter().copied().collect::<Option<_>>()?;

        match self.formula {
            Formula::StoredEnergy => stored_energy(values[0], values[1]),
            Formula::RoundTripEfficiency => {
                if counter_went_backwards(current, previous) {
                    return None;
                }
                round_trip_efficiency(values[0], values[1])
            }
            Formula::ConversionEfficiency => conversion_efficiency(values[0], values[1]),
        }
    }
}

fn stored_energy(soc: f64, capacity: f64) -> Option<f64> {
    Some(round_to(soc / 100.0 * capacity, 2))
}

fn round_trip_efficiency(charged: f64, discharged: f64) -> Option<f64> {
    if charged <= 0.0 || discharged < 0.0 {
        return None;
    }
    Some(round_to((discharged / charged * 100.0).min(100.0), 1))
}

/// Ratio of the smaller to the larger side of the power flow
///
/// Both registers are positive while charging and negative while
/// discharging. The battery side sets the direction; an AC reading of the
/// opposite sign is a mode change caught between two registers and yields
/// nothing.
fn conversion_efficiency(battery_power: f64, ac_power: f64) -> Option<f64> {
    if battery_power == 0.0 || ac_power == 0.0 {
        // idle: no direction, no meaningful ratio
        return None;
    }
    let charging = battery_power > 0.0;
    if charging != (ac_power > 0.0) {
        return None;
    }
    // AC feeds the battery while charging, the battery feeds AC otherwise
    let (input, output) = if charging {
        (ac_power.abs(), battery_power.abs())
    } else {
        (battery_power.abs(), ac_power.abs())
    };
    Some(round_to(output.min(input) / output.max(input) * 100.0, 1))
}

fn counter_went_backwards(current: &[Option<f64>], previous: &[Option<f64>]) -> bool {
    current
        .iter()
        .zip(previous)
        .any(|(now, before)| matches!((now, before), (Some(now), Some(before)) if now < before))
}
