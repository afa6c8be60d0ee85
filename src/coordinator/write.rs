//! Host-issued writes
//!
//! A write is validated against its entity kind before anything is sent.
//! Once the transport accepts it, the decoded form of what was sent becomes
//! the entity's state until a poll confirms or contradicts it.

use thiserror::Error;

use super::{Coordinator, NotActive};
use crate::data_mgmt::models::{Reading, RtValue};
use crate::data_mgmt::process::{decode_register, encode, DecodeError, EncodeError};
use crate::drivers::{CatalogError, EntityKind, RegisterDefinition};
use crate::helpers::now_utc;
use crate::readers::modbus_tcp::{Connector, TransportError};

#[derive(Error, Debug)]
pub enum WriteError {
    #[error(transparent)]
    UnknownRegister(#[from] CatalogError),
    #[error("{0} is read-only")]
    ReadOnly(&'static str),
    #[error("{value} is outside {min}..={max} for {key}")]
    OutOfRange {
        key: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("'{value}' is not an option of {key}")]
    InvalidOption { key: &'static str, value: String },
    #[error("{key} expects {expected}, got '{value}'")]
    InvalidValue {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    NotActive(#[from] NotActive),
}

impl<C: Connector> Coordinator<C> {
    /// Send `value` to the register behind `key`
    ///
    /// Returns the optimistic reading for tracked entities. Buttons, and
    /// entities the schedule never reads back, are fire-and-forget and
    /// return `None`.
    pub async fn write(&mut self, key: &str, value: RtValue) -> Result<Option<Reading>, WriteError> {
        self.ensure_active()?;
        let catalog = self.catalog;
        let def = catalog.lookup(key)?;
        let words = command_words(def, &value)?;

        self.session.write(def.address, &words).await?;
        log::info!("Wrote {} to {}", value, def.key);

        if !self.scheduler.is_polled(def.key) {
            log::debug!("{} is not polled, write not tracked", def.key);
            return Ok(None);
        }

        let assumed = decode_register(def, &words)?;
        if let Some(superseded) = self.writes.record(def.key, assumed, now_utc()) {
            log::debug!(
                "Write to {} supersedes unconfirmed {}",
                def.key,
                superseded.assumed_value
            );
        }
        Ok(Some(self.reading(def)))
    }
}

/// Register words for a write request, after kind-specific validation
fn command_words(def: &'static RegisterDefinition, value: &RtValue) -> Result<Vec<u16>, WriteError> {
    if !def.is_writable() {
        return Err(WriteError::ReadOnly(def.key));
    }

    let code = match def.kind {
        EntityKind::Number { min, max, .. } => {
            let number = match value {
                RtValue::Int(_) | RtValue::Float(_) => value.as_f64(),
                _ => None,
            }
            .ok_or_else(|| invalid_value(def, "a number", value))?;
            if !(min..=max).contains(&number) {
                return Err(WriteError::OutOfRange {
                    key: def.key,
                    value: number,
                    min,
                    max,
                });
            }
            return Ok(encode(
                &RtValue::Float(number),
                def.data_type,
                def.scale,
                def.word_count,
            )?);
        }
        EntityKind::Select { options } => {
            let option = match value {
                RtValue::String(label) => options.iter().find(|(l, _)| *l == label.as_str()),
                RtValue::Int(raw) => options.iter().find(|(_, code)| i64::from(*code) == *raw),
                _ => None,
            };
            match option {
                Some((_, code)) => *code,
                None => {
                    return Err(WriteError::InvalidOption {
                        key: def.key,
                        value: value.to_string(),
                    })
                }
            }
        }
        EntityKind::Switch {
            command_on,
            command_off,
        } => match value {
            RtValue::Bool(true) => command_on,
            RtValue::Bool(false) => command_off,
            _ => return Err(invalid_value(def, "on or off", value)),
        },
        EntityKind::Button { command } => command,
        EntityKind::Sensor { .. } | EntityKind::BinarySensor | EntityKind::Flags { .. } => {
            return Err(WriteError::ReadOnly(def.key));
        }
    };

    Ok(encode(
        &RtValue::Int(code.into()),
        def.data_type,
        1.0,
        def.word_count,
    )?)
}

fn invalid_value(def: &RegisterDefinition, expected: &'static str, value: &RtValue) -> WriteError {
    WriteError::InvalidValue {
        key: def.key,
        expected,
        value: value.to_string(),
    }
}
