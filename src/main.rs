use clap::Parser;
use docanvas::cli::Cli;
use docanvas::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    tracing::debug!("docanvas {} built {}", docanvas::VERSION, docanvas::BUILD_DATE);

    let cli = Cli::parse();
    cli.run().await
}
