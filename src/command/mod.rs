mod read;
mod registers;
mod run;
mod write;

use std::path::Path;

use anyhow::{Context, Result};
use marstek_modbus::coordinator::Coordinator;
use marstek_modbus::node_mgmt::config;
use marstek_modbus::readers::modbus_tcp::TcpConnector;

pub use read::read;
pub use registers::registers;
pub use run::run;
pub use write::write;

/// Load the config, connect and probe the device
async fn connect(config_path: Option<&Path>) -> Result<Coordinator<TcpConnector>> {
    let config = config::load(config_path).context("Failed to load config")?;
    let connector = TcpConnector::new(&config.host, config.port, config.unit_id);
    let mut coordinator = Coordinator::new(config, connector)?;
    coordinator.start().await?;
    Ok(coordinator)
}
