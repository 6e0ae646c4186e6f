use clap::Parser;
use eyre::Context;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use youtube_inventory::youtube_api::YouTubeClient;
use youtube_inventory::{FetchOptions, RetryPolicy, export, output};

/// Lists every upload of a YouTube channel with duration, type and privacy, and writes the
/// result as JSON.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// YouTube Data API key used for public lookups.
    #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Channel to inventory; must start with `UC`.
    #[arg(long, env = "YOUTUBE_CHANNEL_ID")]
    channel_id: String,

    /// Where to write the JSON inventory.
    #[arg(long, short, default_value = "all_videos.json")]
    output: PathBuf,

    /// Also write the inventory as an `.xlsx` spreadsheet here.
    #[arg(long)]
    xlsx: Option<PathBuf>,

    /// OAuth client secrets of the channel owner. Enables private uploads.
    #[arg(long, env = "YOUTUBE_CLIENT_SECRETS")]
    client_secrets: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short)]
    verbose: bool,

    /// Metadata batches in flight at once.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    concurrency: u16,

    /// Retries per request for rate limiting, server errors and network failures.
    #[arg(long, default_value_t = 0)]
    retries: usize,

    /// Minimum spacing between request starts within a stage.
    #[arg(long, default_value_t = 100)]
    request_delay_ms: u64,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    LevelFilter::DEBUG.into()
                } else {
                    LevelFilter::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();

    let credential = match &args.client_secrets {
        Some(path) => {
            if !tokio::fs::try_exists(path)
                .await
                .with_context(|| format!("check for {}", path.display()))?
            {
                eyre::bail!("client secrets file {} does not exist", path.display());
            }
            tracing::info!("authorizing as channel owner to include private uploads");
            Some(youtube_inventory::authorize_channel_owner(path).await?)
        }
        None => {
            tracing::info!("no client secrets given, private uploads will be missing");
            None
        }
    };

    let options = FetchOptions {
        request_delay: Duration::from_millis(args.request_delay_ms),
        concurrency: usize::from(args.concurrency),
        retry: RetryPolicy::with_retries(args.retries),
        ..FetchOptions::default()
    };
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("build HTTP client")?;
    let client = YouTubeClient::new(http).with_retry(options.retry.clone());

    let records = youtube_inventory::fetch_channel_inventory(
        &client,
        &args.channel_id,
        &args.api_key,
        credential.as_ref(),
        &options,
    )
    .await
    .with_context(|| format!("inventory channel {}", args.channel_id))?;

    output::write_records(&args.output, &records).await?;
    if let Some(xlsx) = &args.xlsx {
        export::export_records(xlsx, &records).await?;
        println!("Saved spreadsheet to {}", xlsx.display());
    }

    let unresolved = records.iter().filter(|r| r.is_unresolved()).count();
    println!(
        "Saved {} videos to {} ({} unresolved)",
        records.len(),
        args.output.display(),
        unresolved
    );
    Ok(())
}
