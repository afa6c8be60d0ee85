mod argsets;
mod command;

use anyhow::{anyhow, Result};
use env_logger::Env;
use marstek_modbus::constants::{defaults, envvars};
use marstek_modbus::helpers::load_dotenv;

const CMD_REGISTERS: &str = "registers";
const CMD_READ: &str = "read";
const CMD_WRITE: &str = "write";
const CMD_RUN: &str = "run";

const ARG_CONFIG: &str = "--config";
const ARG_VERSION: &str = "--version";
const ARG_ONCE: &str = "--once";

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    env_logger::Builder::from_env(Env::default().filter_or(envvars::LOG_LEVEL, defaults::LOG_LEVEL))
        .init();

    let mut args = pico_args::Arguments::from_env();
    match args.subcommand()?.as_deref() {
        Some(CMD_REGISTERS) => command::registers(argsets::RegistersArgs {
            version: args.opt_value_from_str(ARG_VERSION)?.unwrap_or_default(),
        }),
        Some(CMD_READ) => {
            let config = args.opt_value_from_str(ARG_CONFIG)?;
            let keys = remaining(args)?;
            if keys.is_empty() {
                return Err(anyhow!("Usage: read [--config <path>] <key>..."));
            }
            command::read(argsets::ReadArgs { config, keys }).await
        }
        Some(CMD_WRITE) => command::write(argsets::WriteArgs {
            config: args.opt_value_from_str(ARG_CONFIG)?,
            key: args.free_from_str()?,
            value: args.free_from_str()?,
        })
        .await,
        Some(CMD_RUN) => command::run(argsets::RunArgs {
            config: args.opt_value_from_str(ARG_CONFIG)?,
            once: args.contains(ARG_ONCE),
        })
        .await,
        _ => Err(anyhow!(
            "Subcommand must be one of 'registers', 'read', 'write', 'run'"
        )),
    }
}

fn remaining(args: pico_args::Arguments) -> Result<Vec<String>> {
    args.finish()
        .into_iter()
        .map(|arg| {
            arg.into_string()
                .map_err(|arg| anyhow!("Argument {:?} is not valid UTF-8", arg))
        })
        .collect()
}
