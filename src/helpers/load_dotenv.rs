use std::env;
use std::path::Path;

use crate::constants::envvars;

/// Load `.env` from the working directory, then one next to the config file if set
pub fn load_dotenv() {
    if dotenv::dotenv().is_ok() {
        log::debug!("Loaded local .env");
    }
    if let Ok(config_path) = env::var(envvars::CONFIG_PATH) {
        let Some(config_dir) = Path::new(&config_path).parent() else {
            return;
        };
        let config_dotenv = config_dir.join(".env");
        if dotenv::from_path(&config_dotenv).is_ok() {
            log::debug!("Loaded {}", config_dotenv.display());
        }
    }
}
