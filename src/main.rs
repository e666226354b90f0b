use clap::Parser;
use cobaltdl::application::ejecutar_cli;
use cobaltdl::infrastructure::logging::init_logging;
use cobaltdl::infrastructure::AppConfig;
use cobaltdl::presentation::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;
    let config = AppConfig::load();

    ejecutar_cli(cli, config).await?;

    Ok(())
}
