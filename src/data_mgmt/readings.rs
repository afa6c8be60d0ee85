//! Entity states from decoded register values
//!
//! Decoding yields numbers; the host sees labels for enumerated sensors and
//! selects, booleans for switches and binary sensors, and the raw number
//! otherwise.

use crate::data_mgmt::models::RtValue;
use crate::drivers::{EntityKind, RegisterDefinition};

/// Present a decoded value the way the entity kind expects
pub fn present(def: &RegisterDefinition, value: &RtValue) -> RtValue {
    let RtValue::Int(raw) = value else {
        return value.clone();
    };
    let raw = *raw;

    match def.kind {
        EntityKind::Sensor { states } => states
            .iter()
            .find(|(code, _)| *code == raw)
            .map(|(_, label)| RtValue::String(label.to_string()))
            .unwrap_or_else(|| value.clone()),
        EntityKind::BinarySensor => RtValue::Bool(raw != 0),
        EntityKind::Select { options } => options
            .iter()
            .find(|(_, code)| i64::from(*code) == raw)
            .map(|(label, _)| RtValue::String(label.to_string()))
            .unwrap_or_else(|| value.clone()),
        EntityKind::Switch {
            command_on,
            command_off,
        } => {
            if raw == i64::from(command_on) {
                RtValue::Bool(true)
            } else if raw == i64::from(command_off) {
                RtValue::Bool(false)
            } else {
                log::debug!("{} reports unknown switch code {}", def.key, raw);
                value.clone()
            }
        }
        EntityKind::Flags { .. } | EntityKind::Number { .. } | EntityKind::Button { .. } => {
            value.clone()
        }
    }
}
