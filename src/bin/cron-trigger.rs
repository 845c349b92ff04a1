use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use uptime_gate::cron::{CronTrigger, DEFAULT_CHECK_URL, DEFAULT_INTERVAL};
use uptime_gate::lifecycle::{signals, Shutdown};

#[derive(Parser)]
#[command(name = "cron-trigger")]
#[command(about = "Periodically trigger the uptime dashboard's monitor checks", long_about = None)]
struct Cli {
    /// Monitor check endpoint.
    #[arg(short, long, default_value = DEFAULT_CHECK_URL)]
    url: String,

    /// Bearer secret expected by the cron endpoint.
    #[arg(short, long, env = "CRON_SECRET", hide_env_values = true)]
    secret: String,

    /// Seconds between checks.
    #[arg(short, long, default_value_t = DEFAULT_INTERVAL.as_secs())]
    interval_secs: u64,

    /// Trigger a single check and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "uptime_gate=info,cron_trigger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let trigger = CronTrigger::new(cli.url, &cli.secret)?;

    if cli.once {
        let body = trigger.trigger().await?;
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(&shutdown);
    trigger
        .run(Duration::from_secs(cli.interval_secs.max(1)), shutdown.subscribe())
        .await;

    Ok(())
}
