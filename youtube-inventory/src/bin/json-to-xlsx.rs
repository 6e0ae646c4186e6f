use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use youtube_inventory::export;

/// Converts an inventory JSON file (as written by `youtube-inventory`) into an `.xlsx`
/// spreadsheet.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    #[arg(long, short)]
    input: PathBuf,

    #[arg(long, short)]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();

    let rows = export::export_file(&args.input, &args.output).await?;
    println!("Saved {} videos to {}", rows, args.output.display());
    Ok(())
}
