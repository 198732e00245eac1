use clap::Parser;
use hyopps_cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    hyopps_cli::init_tracing(cli.verbose);
    hyopps_cli::run(cli).await
}
