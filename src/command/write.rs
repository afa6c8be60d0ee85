use anyhow::Result;
use marstek_modbus::data_mgmt::models::RtValue;

use crate::argsets::WriteArgs;

pub async fn write(args: WriteArgs) -> Result<()> {
    let mut coordinator = super::connect(args.config.as_deref()).await?;
    let result = coordinator
        .write(&args.key, RtValue::from(args.value.as_str()))
        .await;
    coordinator.unload().await?;

    match result? {
        Some(reading) => println!("{}", serde_json::to_string(&reading)?),
        None => log::info!("Sent {} to {}", args.value, args.key),
    }
    Ok(())
}
