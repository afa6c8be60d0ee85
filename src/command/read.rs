use anyhow::Result;

use crate::argsets::ReadArgs;

pub async fn read(args: ReadArgs) -> Result<()> {
    let mut coordinator = super::connect(args.config.as_deref()).await?;
    let keys: Vec<&str> = args.keys.iter().map(String::as_str).collect();
    let result = coordinator.read_keys(&keys).await;
    coordinator.unload().await?;

    for reading in result? {
        println!("{}", serde_json::to_string(&reading)?);
    }
    Ok(())
}
