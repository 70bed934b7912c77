//! Entry-point for the `parlor` binary.
use clap::Parser;
use parlor_cli::Cli;
use parlor_cli::run_main;

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let cli = Cli::parse();
        run_main(cli).await?;
        Ok(())
    })
}
