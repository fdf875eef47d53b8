use clap::Parser;

use micro_geoip::cli::{Cli, Commands, ConfigCommands};
use micro_geoip::config::init_config;
use micro_geoip::runtime::modes;
use micro_geoip::system::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        // config generate 不需要加载配置或初始化日志
        Some(Commands::Config {
            action: ConfigCommands::Generate { output_path, force },
        }) => modes::run_config_generate(output_path, force),
        command => {
            let config = init_config(cli.config.as_deref())?;
            let _log_guard = init_logging(&config.logging)?;

            match command {
                None | Some(Commands::Serve) => modes::run_serve(&config).await,
                Some(Commands::Update) => modes::run_update(&config.geoip).await,
                Some(Commands::Lookup { ips, json }) => {
                    modes::run_lookup(&config.geoip, &ips, json).await
                }
                Some(Commands::Config { .. }) => Ok(()),
            }
        }
    }
}
