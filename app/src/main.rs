use app::{cli, config::ExporterConfig, logging, run};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    let config = ExporterConfig::from_args(args)?;
    logging::init_logging(&config.logging)?;
    run::run(config).await
}
