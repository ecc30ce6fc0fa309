use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Weekly boss key reminders for the clan
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run a single reminder tick and exit (for use under an external timer)
    #[arg(long)]
    once: bool,

    /// Do not start the key helper web server
    #[arg(long)]
    no_web: bool,

    /// Clan document path (overrides DATA_PATH)
    #[arg(long)]
    data_path: Option<PathBuf>,
}

mod config;
mod error;
mod logging;
mod managers;
mod messages;
mod models;
mod state;
mod web;

use config::AppConfig;
use managers::{create_shared_reminder_scheduler, TickReport, WebhookDispatcher};
use models::BossType;
use state::{create_shared_clan_store, JsonClanStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    // Keep recent logs around for the /logs endpoint
    let log_buffer = logging::create_log_buffer(1000);

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::INFO)
        .with(logging::LogCaptureLayer::new(log_buffer.clone()))
        .init();

    let mut config = AppConfig::from_env()?;
    if let Some(path) = args.data_path {
        config.data_path = path;
    }

    info!(
        "Loading clan document from {}...",
        config.data_path.display()
    );
    let store = create_shared_clan_store(JsonClanStore::load(&config.data_path).await?);

    let dispatcher = WebhookDispatcher::new(config.webhook_username.clone(), config.webhook_timeout)?;
    info!(
        "Webhook messages will be sent as '{}' (timeout {}s)",
        dispatcher.username(),
        config.webhook_timeout.as_secs()
    );
    let scheduler = create_shared_reminder_scheduler(store.clone(), dispatcher, config.timezone);

    if args.once {
        let now = scheduler.now();
        info!("Running a single reminder tick at {}", now);
        match scheduler.tick(now).await? {
            report @ TickReport::Evaluated(_) => {
                for boss in BossType::ALL {
                    if let Some(outcome) = report.outcome(boss) {
                        info!("{}: {:?}", boss, outcome);
                    }
                }
            }
            other => info!("Tick skipped: {:?}", other),
        }
        return Ok(());
    }

    if args.no_web {
        warn!("--no-web: key helper endpoint is not available");
    } else {
        let web_state = web::AppState {
            store: store.clone(),
            log_buffer: log_buffer.clone(),
        };
        let port = config.http_port;
        tokio::spawn(async move {
            if let Err(e) = web::start_web_server(port, web_state).await {
                error!("Web server error: {}", e);
            }
        });
    }

    info!(
        "Reminder times are evaluated in {} ({})",
        config.timezone,
        scheduler.now().format("%A %H:%M")
    );

    tokio::select! {
        _ = scheduler.clone().run(config.reminder_interval) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}
