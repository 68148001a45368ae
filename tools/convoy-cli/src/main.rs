use clap::Parser;
use convoy_cli::{execute, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let output = execute(cli).await?;
    print!("{output}");
    Ok(())
}
