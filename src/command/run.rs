use std::time::Instant;

use anyhow::Result;
use marstek_modbus::coordinator;

use crate::argsets::RunArgs;

/// Poll until the device is unloaded, printing one JSON line per snapshot
pub async fn run(args: RunArgs) -> Result<()> {
    let mut coordinator = super::connect(args.config.as_deref()).await?;

    if args.once {
        let snapshot = coordinator.tick(Instant::now()).await;
        coordinator.unload().await?;
        println!("{}", serde_json::to_string(&snapshot?)?);
        return Ok(());
    }

    log::info!(
        "Polling {} every {:?}",
        coordinator.config().host,
        coordinator.effective_period()
    );
    let (_handle, feed, task) = coordinator::spawn(coordinator);
    while let Ok(snapshot) = feed.recv_async().await {
        println!("{}", serde_json::to_string(&snapshot)?);
    }
    task.await?;
    Ok(())
}
