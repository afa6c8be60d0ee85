//! Venus E v1 register map
//!
//! Early firmware exposes the battery and grid measurements and the forcible
//! charge controls, but none of the diagnostics or connectivity registers.

use super::venus_v2::{CONTROL_DISABLE, CONTROL_ENABLE, FORCE_MODES, INVERTER_STATES};
use super::DataType::{Int16, Int32, Uint16, Uint32};
use super::EntityKind::{Number, Select, Sensor, Switch};
use super::{RegisterDefinition as Reg, ScanTier::*};
use crate::data_mgmt::derived::{DerivedSensorSpec, Formula};

pub(super) const PROBE_KEY: &str = "battery_soc";

pub(super) fn registers() -> Vec<Reg> {
    vec![
        Reg::text("device_id", "Device ID", 0x001B, 10),
        Reg::new("software_version", "Software Version", 31100, Uint16)
            .scale(0.01)
            .tier(VeryLow),
        Reg::new("battery_soc", "Battery SOC", 32104, Uint16).unit("%"),
        Reg::new("battery_total_energy", "Battery Total Energy", 32105, Uint16)
            .scale(0.001)
            .unit("kWh")
            .tier(Low),
        Reg::new("battery_voltage", "Battery Voltage", 32100, Uint16)
            .scale(0.01)
            .unit("V"),
        Reg::new("battery_current", "Battery Current", 32101, Int16)
            .scale(0.01)
            .unit("A"),
        Reg::new("battery_power", "Battery Power", 32102, Int32)
            .unit("W")
            .tier(High),
        Reg::new("ac_voltage", "AC Voltage", 32200, Uint16)
            .scale(0.1)
            .unit("V"),
        Reg::new("ac_power", "AC Power", 32202, Int32).unit("W").tier(High),
        Reg::new("total_charging_energy", "Total Charging Energy", 33000, Uint32)
            .scale(0.01)
            .unit("kWh")
            .tier(Low),
        Reg::new("total_discharging_energy", "Total Discharging Energy", 33002, Int32)
            .scale(0.01)
            .unit("kWh")
            .tier(Low),
        Reg::new("internal_temperature", "Internal Temperature", 35000, Int16)
            .scale(0.1)
            .unit("°C"),
        Reg::new("inverter_state", "Inverter State", 35100, Uint16)
            .tier(High)
            .kind(Sensor {
                states: INVERTER_STATES,
            }),
        Reg::new("rs485_control_mode", "RS485 Control Mode", 42000, Uint16)
            .tier(High)
            .kind(Switch {
                command_on: CONTROL_ENABLE,
                command_off: CONTROL_DISABLE,
            })
            .disabled(),
        Reg::new("force_mode", "Force Mode", 42010, Uint16)
            .tier(High)
            .kind(Select {
                options: FORCE_MODES,
            })
            .disabled(),
        Reg::new("set_charge_power", "Set Forcible Charge Power", 42020, Uint16)
            .unit("W")
            .tier(High)
            .kind(Number {
                min: 0.0,
                max: 2500.0,
                step: 50.0,
            })
            .disabled(),
        Reg::new("set_discharge_power", "Set Forcible Discharge Power", 42021, Uint16)
            .unit("W")
            .tier(High)
            .kind(Number {
                min: 0.0,
                max: 2500.0,
                step: 50.0,
            })
            .disabled(),
    ]
}

pub(super) fn derived() -> Vec<DerivedSensorSpec> {
    vec![
        DerivedSensorSpec {
            key: "round_trip_efficiency_total",
            name: "Round-Trip Efficiency Total",
            unit: "%",
            scan_tier: Low,
            enabled_by_default: true,
            inputs: &["total_charging_energy", "total_discharging_energy"],
            formula: Formula::RoundTripEfficiency,
        },
        DerivedSensorSpec {
            key: "stored_energy",
            name: "Stored Energy",
            unit: "kWh",
            scan_tier: Medium,
            enabled_by_default: true,
            inputs: &["battery_soc", "battery_total_energy"],
            formula: Formula::StoredEnergy,
        },
    ]
}
