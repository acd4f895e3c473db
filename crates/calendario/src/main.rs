use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

mod cache;
mod clock;
mod config;
mod filter;
mod grid;
mod html;
mod search;
mod server;
mod store;
mod types;

use cache::EventCache;
use clock::{Clock, FixedClock, SystemClock};
use config::Config;
use filter::{filter_events, CategoryFilter, DateRange, EventFilter};
use grid::{events_for_date, DayCell, MonthCursor, DAY_NAMES};
use store::RemoteStore;

#[derive(Parser, Debug)]
#[command(name = "calendario")]
#[command(about = "Event calendar backed by a spreadsheet web app")]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Event store endpoint (overrides CALENDARIO_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Treat this date (YYYY-MM-DD) as today instead of the system date
    #[arg(long, global = true)]
    today: Option<NaiveDate>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the web server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Print a month grid with the number of events per day
    Month {
        /// Year, defaults to the current one
        #[arg(long)]
        year: Option<i32>,

        /// Month number 1-12, defaults to the current one
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
    },

    /// Print events matching the given filters
    List {
        /// Text to look for in title, notes or category
        #[arg(short, long, default_value = "")]
        q: String,

        /// "all" or one of Alumnos, Docentes, Presentaciones, Otros
        #[arg(long, default_value = "all")]
        category: String,

        /// all, today, week, month or last30
        #[arg(long, default_value = "all")]
        range: String,
    },
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level))
        .add_directive("hyper=warn".parse()?)
        .add_directive("tower_http=warn".parse()?);

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_max_level(Level::TRACE)
        .init();
    Ok(())
}

fn build_cache(config: &Config, today: Option<NaiveDate>) -> Result<EventCache> {
    let store = match &config.api_url {
        Some(url) => {
            let store = RemoteStore::new(url.as_str(), config.http_timeout)
                .context("Failed to build event store client")?;
            info!(endpoint = %store.endpoint(), "Using remote event store");
            Some(store)
        }
        None => None,
    };
    let clock: Arc<dyn Clock> = match today {
        Some(date) => Arc::new(FixedClock::at_date(date)),
        None => Arc::new(SystemClock),
    };
    Ok(EventCache::new(store, clock))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args.log_level)?;

    let config = Config::from_env()
        .context("Failed to load configuration")?
        .with_api_url(args.api_url.clone())?;
    let mut cache = build_cache(&config, args.today)?;
    let mode = cache.load().await;
    info!(mode = ?mode, count = cache.events().len(), "Events loaded");

    match args.command {
        None => server::serve(8080, cache).await?,
        Some(Commands::Serve { port }) => server::serve(port, cache).await?,
        Some(Commands::Month { year, month }) => print_month(&cache, year, month),
        Some(Commands::List { q, category, range }) => {
            let filter = EventFilter {
                search: q,
                category: category.parse::<CategoryFilter>()?,
                range: DateRange::parse(&range)?,
            };
            print_list(&cache, &filter);
        }
    }

    Ok(())
}

fn print_month(cache: &EventCache, year: Option<i32>, month: Option<u32>) {
    let today = cache.clock().today();
    let cursor = MonthCursor::new(
        year.unwrap_or(today.year()),
        month.map(|m| m - 1).unwrap_or(today.month0()),
    );

    println!("{}", cursor.title());
    let header: Vec<String> = DAY_NAMES
        .iter()
        .map(|name| format!("{:>7}", name.chars().take(3).collect::<String>()))
        .collect();
    println!("{}", header.join(""));

    let mut line = String::new();
    for (idx, cell) in cursor.grid().iter().enumerate() {
        let text = match cell {
            DayCell::Empty => String::new(),
            DayCell::Day(date) => {
                let count = events_for_date(cache.events(), *date).len();
                let marker = if *date == today { "*" } else { "" };
                if count > 0 {
                    format!("{}{}({})", marker, date.day(), count)
                } else {
                    format!("{}{}", marker, date.day())
                }
            }
        };
        line.push_str(&format!("{:>7}", text));
        if idx % 7 == 6 {
            println!("{}", line);
            line.clear();
        }
    }
    if !line.is_empty() {
        println!("{}", line);
    }
}

fn print_list(cache: &EventCache, filter: &EventFilter) {
    let matching = filter_events(
        cache.events(),
        &filter.search,
        filter.category,
        filter.range,
        cache.clock().today(),
    );
    for event in &matching {
        println!(
            "{:<18} {:<15} {}",
            html::format_date_es(&event.date),
            event.category.as_str(),
            event.title
        );
    }
    info!(
        shown = matching.len(),
        total = cache.events().len(),
        "Events listed"
    );
}
