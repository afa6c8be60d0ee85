//! Venus E v2 / Venus C register map (full firmware surface)

use super::DataType::{Bitfield32, Bitfield64, Int16, Int32, Uint16, Uint32};
use super::EntityKind::{BinarySensor, Button, Flags, Number, Select, Sensor, Switch};
use super::{EntityKind, RegisterDefinition as Reg, ScanTier::*};
use crate::data_mgmt::derived::{DerivedSensorSpec, Formula};

pub(super) const PROBE_KEY: &str = "comm_module_firmware";

pub(super) const INVERTER_STATES: &[(i64, &str)] = &[
    (0, "Sleep"),
    (1, "Standby"),
    (2, "Charge"),
    (3, "Discharge"),
    (4, "Backup Mode"),
    (5, "OTA Upgrade"),
    (6, "Bypass"),
];

const FAULT_BITS: &[(u16, &str)] = &[
    (0, "Grid Overvoltage"),
    (1, "Grid Undervoltage"),
    (2, "Grid Overfrequency"),
    (3, "Grid Underfrequency"),
    (4, "Grid Peak Voltage"),
    (5, "Current Dcover"),
    (6, "Voltage Dcover"),
    (16, "BAT Overvoltage"),
    (17, "BAT Undervoltage"),
    (18, "BAT Overcurrent"),
    (19, "BAT low SOC"),
    (20, "BAT communication failure"),
    (21, "BMS protect"),
    (32, "Inverter soft start timeout"),
    (33, "self-checking failure"),
    (34, "eeprom failure"),
    (35, "other system failure"),
    (48, "Hardware Bus overvoltage"),
    (49, "Hardware Output overcurrent"),
    (50, "Hardware trans overcurrent"),
    (51, "Hardware battery overcurrent"),
    (52, "Hardware Protection"),
    (53, "Output Overcurrent"),
    (54, "High Voltage bus overvoltage"),
    (55, "High Voltage bus undervoltage"),
    (56, "Overpower Protection"),
    (57, "FSM abnormal"),
    (58, "Overtemperature Protection"),
];

const ALARM_BITS: &[(u16, &str)] = &[
    (0, "PLL Abnormal Restart"),
    (1, "Overtemperature Limit"),
    (2, "Low Temperature Limit"),
    (3, "Fan Abnormal Warning"),
    (4, "Low Battery SOC Warning"),
    (5, "Output Overcurrent Warning"),
    (6, "Abnormal Line Sequence Detection"),
    (16, "WiFi Abnormal"),
    (17, "BLE Abnormal"),
    (18, "Network Abnormal"),
    (19, "CT Connection Abnormal"),
];

pub(super) const FORCE_MODES: &[(&str, u16)] = &[("None", 0), ("Charge", 1), ("Discharge", 2)];

const WORK_MODES: &[(&str, u16)] = &[("Manual", 0), ("Anti-Feed", 1), ("Trade Mode", 2)];

const GRID_STANDARDS: &[(&str, u16)] = &[
    ("Auto", 0),
    ("EN50549", 1),
    ("Netherlands", 2),
    ("Germany", 3),
    ("Austria", 4),
    ("United Kingdom", 5),
    ("Spain", 6),
    ("Poland", 7),
    ("Italy", 8),
    ("China", 9),
];

/// Magic value the firmware expects for RS485 control and command buttons
pub(super) const CONTROL_ENABLE: u16 = 21930;
pub(super) const CONTROL_DISABLE: u16 = 21947;

const POWER_LIMIT: EntityKind = Number {
    min: 0.0,
    max: 2500.0,
    step: 50.0,
};

pub(super) fn registers() -> Vec<Reg> {
    vec![
        // Device info
        Reg::text("device_id", "Device ID", 0x001B, 10),
        Reg::new("ems_version", "EMS Version", 0x001C, Uint16).tier(VeryLow),
        Reg::new("inv_version", "INV Version", 0x001D, Uint16).tier(VeryLow),
        Reg::new("mppt_version", "MPPT Version", 0x001E, Uint16).tier(VeryLow),
        Reg::new("bms_version", "BMS Version", 0x001F, Uint16).tier(VeryLow),
        Reg::text("sn_code", "SN Code", 31200, 10).disabled(),
        Reg::new("software_version", "Software Version", 31100, Uint16)
            .scale(0.01)
            .tier(VeryLow),
        Reg::text("comm_module_firmware", "Communication Module Firmware", 30800, 6),
        Reg::text("mac_address", "MAC Address", 30402, 6),
        // Battery
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
        // Temperatures
        Reg::new("internal_temperature", "Internal Temperature", 35000, Int16)
            .scale(0.1)
            .unit("°C"),
        Reg::new("internal_mos1_temperature", "Internal MOS1 Temperature", 35001, Int16)
            .scale(0.1)
            .unit("°C")
            .disabled(),
        Reg::new("internal_mos2_temperature", "Internal MOS2 Temperature", 35002, Int16)
            .scale(0.1)
            .unit("°C")
            .disabled(),
        // Grid side
        Reg::new("ac_voltage", "AC Voltage", 32200, Uint16)
            .scale(0.1)
            .unit("V"),
        Reg::new("ac_current", "AC Current", 32201, Int16)
            .scale(0.01)
            .unit("A"),
        Reg::new("ac_power", "AC Power", 32202, Int32).unit("W").tier(High),
        Reg::new("ac_frequency", "AC Frequency", 32204, Int16)
            .scale(0.01)
            .unit("Hz"),
        // Energy counters
        Reg::new("total_charging_energy", "Total Charging Energy", 33000, Uint32)
            .scale(0.01)
            .unit("kWh")
            .tier(Low),
        Reg::new("total_discharging_energy", "Total Discharging Energy", 33002, Int32)
            .scale(0.01)
            .unit("kWh")
            .tier(Low),
        Reg::new("total_daily_charging_energy", "Total Daily Charging Energy", 33004, Uint32)
            .scale(0.01)
            .unit("kWh")
            .tier(Low)
            .disabled(),
        Reg::new("total_daily_discharging_energy", "Total Daily Discharging Energy", 33006, Int32)
            .scale(0.01)
            .unit("kWh")
            .tier(Low)
            .disabled(),
        Reg::new("total_monthly_charging_energy", "Total Monthly Charging Energy", 33008, Uint32)
            .scale(0.01)
            .unit("kWh")
            .tier(Low)
            .disabled(),
        Reg::new(
            "total_monthly_discharging_energy",
            "Total Monthly Discharging Energy",
            33010,
            Int32,
        )
        .scale(0.01)
        .unit("kWh")
        .tier(Low)
        .disabled(),
        // Cells
        Reg::new("max_cell_temperature", "Max Cell Temperature", 35010, Int16)
            .unit("°C")
            .disabled(),
        Reg::new("min_cell_temperature", "Min Cell Temperature", 35011, Int16)
            .unit("°C")
            .disabled(),
        Reg::new("max_cell_voltage", "Max Cell Voltage", 37007, Int16)
            .scale(0.001)
            .unit("V")
            .disabled(),
        Reg::new("min_cell_voltage", "Min Cell Voltage", 37008, Int16)
            .scale(0.001)
            .unit("V")
            .disabled(),
        // State and diagnostics
        Reg::new("inverter_state", "Inverter State", 35100, Uint16)
            .tier(High)
            .kind(Sensor {
                states: INVERTER_STATES,
            }),
        Reg::new("fault_status", "Fault Status", 36100, Bitfield64)
            .tier(High)
            .kind(Flags { bits: FAULT_BITS }),
        Reg::new("alarm_status", "Alarm Status", 36000, Bitfield32)
            .tier(High)
            .kind(Flags { bits: ALARM_BITS }),
        Reg::new("modbus_address", "Modbus Address", 41100, Uint16)
            .tier(VeryLow)
            .disabled(),
        // Off-grid output
        Reg::new("ac_offgrid_voltage", "AC Offgrid Voltage", 32300, Uint16)
            .scale(0.1)
            .unit("V")
            .disabled(),
        Reg::new("ac_offgrid_current", "AC Offgrid Current", 32301, Uint16)
            .scale(0.01)
            .unit("A")
            .disabled(),
        Reg::new("ac_offgrid_power", "AC Offgrid Power", 32302, Int32)
            .unit("W")
            .tier(High)
            .disabled(),
        Reg::new("wifi_signal_strength", "WiFi Signal Strength", 30303, Uint16)
            .scale(-1.0)
            .unit("dBm")
            .tier(High)
            .disabled(),
        // Connectivity
        Reg::new("wifi_status", "WiFi Status", 30300, Uint16)
            .kind(BinarySensor)
            .disabled(),
        Reg::new("cloud_status", "Cloud Status", 30302, Uint16)
            .kind(BinarySensor)
            .disabled(),
        Reg::new("discharge_limit_mode", "Discharge Limit", 41010, Uint16)
            .kind(BinarySensor)
            .disabled(),
        // Controls
        Reg::new("user_work_mode", "User Work Mode", 43000, Uint16)
            .tier(High)
            .kind(Select {
                options: WORK_MODES,
            }),
        Reg::new("force_mode", "Force Mode", 42010, Uint16)
            .tier(High)
            .kind(Select {
                options: FORCE_MODES,
            })
            .disabled(),
        Reg::new("grid_standard", "Grid Standard", 44100, Uint16)
            .tier(High)
            .kind(Select {
                options: GRID_STANDARDS,
            }),
        Reg::new("backup_function", "Backup Function", 41200, Uint16)
            .tier(High)
            .kind(Switch {
                command_on: 0,
                command_off: 1,
            }),
        Reg::new("rs485_control_mode", "RS485 Control Mode", 42000, Uint16)
            .tier(High)
            .kind(Switch {
                command_on: CONTROL_ENABLE,
                command_off: CONTROL_DISABLE,
            })
            .disabled(),
        Reg::new("set_charge_power", "Set Forcible Charge Power", 42020, Uint16)
            .unit("W")
            .tier(High)
            .kind(POWER_LIMIT)
            .disabled(),
        Reg::new("set_discharge_power", "Set Forcible Discharge Power", 42021, Uint16)
            .unit("W")
            .tier(High)
            .kind(POWER_LIMIT)
            .disabled(),
        Reg::new("max_charge_power", "Max Charge Power", 44002, Uint16)
            .unit("W")
            .tier(High)
            .kind(POWER_LIMIT)
            .disabled(),
        Reg::new("max_discharge_power", "Max Discharge Power", 44003, Uint16)
            .unit("W")
            .tier(High)
            .kind(POWER_LIMIT)
            .disabled(),
        Reg::new("charging_cutoff_capacity", "Charging Cutoff Capacity", 44000, Uint16)
            .scale(0.1)
            .unit("%")
            .tier(High)
            .kind(Number {
                min: 80.0,
                max: 100.0,
                step: 1.0,
            })
            .disabled(),
        Reg::new("discharging_cutoff_capacity", "Discharging Cutoff Capacity", 44001, Uint16)
            .scale(0.1)
            .unit("%")
            .tier(High)
            .kind(Number {
                min: 12.0,
                max: 30.0,
                step: 1.0,
            })
            .disabled(),
        Reg::new("charge_to_soc", "Charge to SOC", 42011, Uint16)
            .unit("%")
            .tier(High)
            .kind(Number {
                min: 10.0,
                max: 100.0,
                step: 1.0,
            })
            .disabled(),
        Reg::new("reset_device", "Reset Device", 41000, Uint16)
            .kind(Button {
                command: CONTROL_ENABLE,
            })
            .disabled(),
        Reg::new("factory_reset", "Factory Reset", 41001, Uint16)
            .kind(Button {
                command: CONTROL_ENABLE,
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
            key: "round_trip_efficiency_monthly",
            name: "Round-Trip Efficiency Monthly",
            unit: "%",
            scan_tier: Low,
            enabled_by_default: true,
            inputs: &[
                "total_monthly_charging_energy",
                "total_monthly_discharging_energy",
            ],
            formula: Formula::RoundTripEfficiency,
        },
        DerivedSensorSpec {
            key: "conversion_efficiency",
            name: "Conversion Efficiency",
            unit: "%",
            scan_tier: High,
            enabled_by_default: true,
            inputs: &["battery_power", "ac_power"],
            formula: Formula::ConversionEfficiency,
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
