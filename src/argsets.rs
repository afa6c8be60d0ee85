use std::path::PathBuf;

use marstek_modbus::drivers::HardwareVersion;

pub struct RegistersArgs {
    pub version: HardwareVersion,
}

pub struct ReadArgs {
    pub config: Option<PathBuf>,
    pub keys: Vec<String>,
}

pub struct WriteArgs {
    pub config: Option<PathBuf>,
    pub key: String,
    pub value: String,
}

pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub once: bool,
}
