use anyhow::Result;
use marstek_modbus::drivers::Catalog;
use serde_json::json;

use crate::argsets::RegistersArgs;

pub fn registers(args: RegistersArgs) -> Result<()> {
    let catalog = Catalog::for_version(args.version);
    let listing = json!({
        "version": catalog.version(),
        "probe_key": catalog.probe_key(),
        "registers": catalog.all(),
        "derived": catalog.derived(),
    });
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}
