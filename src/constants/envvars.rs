pub const LOG_LEVEL: &str = "LOG_LEVEL";

pub const CONFIG_PATH: &str = "MARSTEK_CONFIG";
pub const HOST: &str = "MARSTEK_HOST";
pub const PORT: &str = "MARSTEK_PORT";
