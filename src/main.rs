use clap::Parser;

use ipgeo::cli::Cli;
use ipgeo::config::{get_config, init_config};
use ipgeo::runtime::modes;
use ipgeo::system::init_logging;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_config(cli.config.as_deref());
    let config = get_config();
    // 保持 guard 存活直到退出，确保日志刷新
    let log_guard = init_logging(&config.logging)?;

    match cli.command {
        Some(cmd) => {
            if let Err(e) = modes::run_cli(cmd).await {
                eprintln!("{}", e.format_colored());
                drop(log_guard);
                std::process::exit(1);
            }
            Ok(())
        }
        None => modes::run_server().await,
    }
}
