//! Register catalog
//!
//! Static register maps for each supported hardware generation. A catalog is
//! selected once from the configured [`HardwareVersion`] and is immutable for
//! the lifetime of the device instance.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use ahash::AHashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data_mgmt::derived::DerivedSensorSpec;

mod venus_v1;
mod venus_v2;

#[derive(Error, Debug, PartialEq)]
pub enum CatalogError {
    #[error("unknown register '{0}'")]
    UnknownRegister(String),
    #[error("register '{key}' declares {word_count} words, {data_type} needs {expected}")]
    WordCountMismatch {
        key: &'static str,
        data_type: DataType,
        word_count: u16,
        expected: u16,
    },
    #[error("duplicate key '{0}' in catalog")]
    DuplicateKey(&'static str),
    #[error("derived sensor '{derived}' requires unknown register '{input}'")]
    MissingInput {
        derived: &'static str,
        input: &'static str,
    },
    #[error("unknown hardware version '{0}', expected one of: v1, v2")]
    UnknownVersion(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Uint16,
    Int16,
    Uint32,
    Int32,
    Char,
    Bitfield32,
    Bitfield64,
}

impl DataType {
    /// Word count implied by the type; `None` for strings, whose width is per register
    pub fn fixed_words(&self) -> Option<u16> {
        match self {
            DataType::Uint16 | DataType::Int16 => Some(1),
            DataType::Uint32 | DataType::Int32 | DataType::Bitfield32 => Some(2),
            DataType::Bitfield64 => Some(4),
            DataType::Char => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Uint16 => "uint16",
            DataType::Int16 => "int16",
            DataType::Uint32 => "uint32",
            DataType::Int32 => "int32",
            DataType::Char => "char",
            DataType::Bitfield32 => "bitfield32",
            DataType::Bitfield64 => "bitfield64",
        };
        f.write_str(name)
    }
}

/// Named refresh-rate class shared by many registers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanTier {
    High,
    Medium,
    Low,
    VeryLow,
}

impl ScanTier {
    pub const ALL: [ScanTier; 4] = [
        ScanTier::High,
        ScanTier::Medium,
        ScanTier::Low,
        ScanTier::VeryLow,
    ];
}

/// Modbus table a register lives in; decides the read function code
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterTable {
    Holding,
    Input,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityKind {
    Sensor { states: &'static [(i64, &'static str)] },
    BinarySensor,
    /// Alarm and fault groups; one entity with a set-valued state
    Flags { bits: &'static [(u16, &'static str)] },
    Select { options: &'static [(&'static str, u16)] },
    Switch { command_on: u16, command_off: u16 },
    Number { min: f64, max: f64, step: f64 },
    /// Write-only command; never polled
    Button { command: u16 },
}

#[derive(Clone, Debug, Serialize)]
pub struct RegisterDefinition {
    pub key: &'static str,
    pub name: &'static str,
    pub address: u16,
    pub data_type: DataType,
    pub word_count: u16,
    pub scale: f64,
    pub unit: Option<&'static str>,
    pub scan_tier: Option<ScanTier>,
    pub enabled_by_default: bool,
    pub table: RegisterTable,
    #[serde(flatten)]
    pub kind: EntityKind,
}

impl RegisterDefinition {
    /// Plain sensor with the type's natural width, scale 1, medium tier
    pub fn new(key: &'static str, name: &'static str, address: u16, data_type: DataType) -> Self {
        RegisterDefinition {
            key,
            name,
            address,
            data_type,
            word_count: data_type.fixed_words().unwrap_or(1),
            scale: 1.0,
            unit: None,
            scan_tier: Some(ScanTier::Medium),
            enabled_by_default: true,
            table: RegisterTable::Holding,
            kind: EntityKind::Sensor { states: &[] },
        }
    }

    /// String register spanning `words` registers (two characters each)
    pub fn text(key: &'static str, name: &'static str, address: u16, words: u16) -> Self {
        RegisterDefinition {
            word_count: words,
            ..Self::new(key, name, address, DataType::Char)
        }
        .tier(ScanTier::VeryLow)
    }

    pub fn scale(self, scale: f64) -> Self {
        RegisterDefinition { scale, ..self }
    }

    pub fn unit(self, unit: &'static str) -> Self {
        RegisterDefinition {
            unit: Some(unit),
            ..self
        }
    }

    pub fn tier(self, tier: ScanTier) -> Self {
        RegisterDefinition {
            scan_tier: Some(tier),
            ..self
        }
    }

    pub fn disabled(self) -> Self {
        RegisterDefinition {
            enabled_by_default: false,
            ..self
        }
    }

    pub fn input_table(self) -> Self {
        RegisterDefinition {
            table: RegisterTable::Input,
            ..self
        }
    }

    pub fn kind(self, kind: EntityKind) -> Self {
        let scan_tier = match kind {
            EntityKind::Button { .. } => None,
            _ => self.scan_tier,
        };
        RegisterDefinition {
            kind,
            scan_tier,
            ..self
        }
    }

    pub fn is_writable(&self) -> bool {
        self.table == RegisterTable::Holding
            && matches!(
                self.kind,
                EntityKind::Select { .. }
                    | EntityKind::Switch { .. }
                    | EntityKind::Number { .. }
                    | EntityKind::Button { .. }
            )
    }

    pub fn is_polled(&self) -> bool {
        self.scan_tier.is_some()
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let expected = match self.data_type.fixed_words() {
            Some(words) => words,
            // Strings need at least one register
            None if self.word_count > 0 => return Ok(()),
            None => 1,
        };
        if self.word_count != expected {
            return Err(CatalogError::WordCountMismatch {
                key: self.key,
                data_type: self.data_type,
                word_count: self.word_count,
                expected,
            });
        }
        Ok(())
    }
}

/// Closed set of hardware generations, each with its own register table
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareVersion {
    V1,
    #[default]
    V2,
}

impl FromStr for HardwareVersion {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v1" => Ok(HardwareVersion::V1),
            "v2" => Ok(HardwareVersion::V2),
            other => Err(CatalogError::UnknownVersion(other.to_string())),
        }
    }
}

impl fmt::Display for HardwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareVersion::V1 => f.write_str("v1"),
            HardwareVersion::V2 => f.write_str("v2"),
        }
    }
}

pub struct Catalog {
    version: HardwareVersion,
    registers: Vec<RegisterDefinition>,
    derived: Vec<DerivedSensorSpec>,
    /// Register present on this generation only; read at setup to detect a wrong selection
    probe_key: &'static str,
    index: AHashMap<&'static str, usize>,
    derived_index: AHashMap<&'static str, usize>,
    dependents: AHashMap<&'static str, Vec<&'static str>>,
}

static VENUS_V1: Lazy<Catalog> = Lazy::new(|| {
    Catalog::new(
        HardwareVersion::V1,
        venus_v1::registers(),
        venus_v1::derived(),
        venus_v1::PROBE_KEY,
    )
});

static VENUS_V2: Lazy<Catalog> = Lazy::new(|| {
    Catalog::new(
        HardwareVersion::V2,
        venus_v2::registers(),
        venus_v2::derived(),
        venus_v2::PROBE_KEY,
    )
});

impl Catalog {
    fn new(
        version: HardwareVersion,
        registers: Vec<RegisterDefinition>,
        derived: Vec<DerivedSensorSpec>,
        probe_key: &'static str,
    ) -> Self {
        let index = registers
            .iter()
            .enumerate()
            .map(|(i, def)| (def.key, i))
            .collect();
        let derived_index = derived
            .iter()
            .enumerate()
            .map(|(i, spec)| (spec.key, i))
            .collect();
        let mut dependents: AHashMap<&'static str, Vec<&'static str>> = AHashMap::new();
        for spec in &derived {
            for input in spec.inputs {
                dependents.entry(*input).or_default().push(spec.key);
            }
        }
        Catalog {
            version,
            registers,
            derived,
            probe_key,
            index,
            derived_index,
            dependents,
        }
    }

    pub fn for_version(version: HardwareVersion) -> &'static Catalog {
        match version {
            HardwareVersion::V1 => &VENUS_V1,
            HardwareVersion::V2 => &VENUS_V2,
        }
    }

    pub fn version(&self) -> HardwareVersion {
        self.version
    }

    pub fn lookup(&self, key: &str) -> Result<&RegisterDefinition, CatalogError> {
        self.index
            .get(key)
            .map(|&i| &self.registers[i])
            .ok_or_else(|| CatalogError::UnknownRegister(key.to_string()))
    }

    pub fn lookup_derived(&self, key: &str) -> Option<&DerivedSensorSpec> {
        self.derived_index.get(key).map(|&i| &self.derived[i])
    }

    /// All registers in catalog order
    pub fn all(&self) -> &[RegisterDefinition] {
        &self.registers
    }

    pub fn derived(&self) -> &[DerivedSensorSpec] {
        &self.derived
    }

    pub fn probe_key(&self) -> &'static str {
        self.probe_key
    }

    /// Keys of the derived sensors that consume `key`
    pub fn depends_on(&self, key: &str) -> &[&'static str] {
        self.dependents.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key) || self.derived_index.contains_key(key)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for def in &self.registers {
            def.validate()?;
            if !seen.insert(def.key) {
                return Err(CatalogError::DuplicateKey(def.key));
            }
        }
        for spec in &self.derived {
            if !seen.insert(spec.key) {
                return Err(CatalogError::DuplicateKey(spec.key));
            }
            for &input in spec.inputs {
                let polled = self.lookup(input).map(|def| def.is_polled());
                if polled != Ok(true) {
                    return Err(CatalogError::MissingInput {
                        derived: spec.key,
                        input,
                    });
                }
            }
        }
        if self.lookup(self.probe_key).is_err() {
            return Err(CatalogError::UnknownRegister(self.probe_key.to_string()));
        }
        Ok(())
    }
}
