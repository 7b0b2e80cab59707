use std::num::NonZeroU32;

use boxoffice_config::Config;
use boxoffice_models::EventFilter;
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::OffsetTime;

mod auth;
mod error;
mod handlers;
mod server;
mod simulate;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const GIT_HASH: &str = env!("BOXOFFICE_GIT_HASH");

pub(crate) fn version_string() -> String {
    format!("{VERSION} ({GIT_HASH})")
}

// --- CLI definition ---

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Parser)]
#[command(name = "boxoffice")]
#[command(about = "Event ticketing backend")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BOXOFFICE_GIT_HASH"), ")"))]
struct Cli {
    /// Log level (overrides config file and BOXOFFICE_LOG_LEVEL)
    #[arg(short, long, global = true)]
    log_level: Option<LogLevel>,

    /// Display log timestamps in UTC (default: local time)
    #[arg(long, global = true)]
    utc: bool,

    /// Database URL
    #[arg(long, global = true)]
    db_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List events
    ListEvents {
        /// Only events in this category
        #[arg(long)]
        category: Option<String>,
    },
    /// Show sales figures for one event
    Stats {
        event_id: String,
    },
    /// Run concurrent buyers against an in-memory event (no database)
    Simulate {
        /// Tickets on sale
        #[arg(long, default_value_t = 100)]
        tickets: u32,
        /// Buyers arriving at once
        #[arg(long, default_value_t = 150)]
        buyers: usize,
        /// Tickets each buyer asks for
        #[arg(long, default_value_t = NonZeroU32::MIN)]
        quantity: NonZeroU32,
    },
}

impl Cli {
    /// CLI args are the last configuration layer.
    fn merge_into(&self, config: &mut Config) {
        if let Some(level) = &self.log_level { config.log_level = level.to_string(); }
        if self.utc { config.utc = true; }
        if let Some(url) = &self.db_url { config.db_url = url.clone(); }
        if let Commands::Serve { port: Some(port) } = self.command { config.port = port; }
    }
}

// --- Logging ---

fn init_logging(config: &Config) {
    let filter = EnvFilter::new(&config.log_level);

    if config.utc {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_timer(OffsetTime::new(
                time::UtcOffset::UTC,
                time::macros::format_description!(
                    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
                ),
            ))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_timer(LocalTimer)
            .init();
    }
}

struct LocalTimer;

impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

// --- Main ---

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load();
    cli.merge_into(&mut config);
    init_logging(&config);

    match cli.command {
        Commands::Serve { .. } => {
            let pool = open_db(&config).await?;
            server::run_server(&config, pool).await?;
        }
        Commands::ListEvents { category } => {
            let pool = open_db(&config).await?;
            let filter = EventFilter { category, vendor_id: None };
            let events = boxoffice_db::list_events(&pool, &filter).await?;
            if events.is_empty() {
                println!("No events found.");
            } else {
                println!(
                    "{:<38} {:<28} {:<12} {:<6} {:>9} {:>10} {}",
                    "ID", "Name", "Date", "Time", "Price", "Available", "Category"
                );
                println!("{}", "-".repeat(120));
                for e in &events {
                    println!(
                        "{:<38} {:<28} {:<12} {:<6} {:>9.2} {:>10} {}",
                        e.id, e.name, e.date, e.time, e.price, e.available_tickets, e.category,
                    );
                }
                println!("\n{} event(s) total", events.len());
            }
        }
        Commands::Stats { event_id } => {
            let pool = open_db(&config).await?;
            let Some(event) = boxoffice_db::get_event(&pool, &event_id).await? else {
                anyhow::bail!("Event {event_id} not found");
            };
            let stats = boxoffice_db::event_stats(&pool, &event).await?;
            println!("{} ({} {})", event.name, event.date, event.time);
            println!("  total:     {}", stats.total_tickets);
            println!("  sold:      {}", stats.sold_tickets);
            println!("  available: {}", stats.available_tickets);
            println!("  revenue:   {:.2}", stats.revenue);
        }
        Commands::Simulate { tickets, buyers, quantity } => {
            let report = simulate::run(tickets, buyers, quantity).await?;
            println!("buyers:    {buyers} x {quantity}");
            println!("accepted:  {}", report.accepted);
            println!("refused:   {}", report.refused);
            println!("sold:      {} of {tickets}", report.sold);
            println!("remaining: {}", report.remaining);
        }
    }

    Ok(())
}

async fn open_db(config: &Config) -> anyhow::Result<sqlx::SqlitePool> {
    let pool = boxoffice_db::connect(&config.db_url).await?;
    boxoffice_db::migrate(&pool).await?;
    Ok(pool)
}
