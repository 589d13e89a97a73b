//! Pineapple Basket CLI - drive a shopper's cart and wishlist from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart
//! basket show cart
//!
//! # Add two of a product, with a known unit price
//! basket add cart gid://shop/Product/7 --quantity 2 --price 24.99
//!
//! # Change a line's quantity (0 removes it)
//! basket set cart gid://shop/Product/7 3
//!
//! # Remove a wishlist entry
//! basket remove wishlist gid://shop/Product/7
//! ```
//!
//! # Environment Variables
//!
//! - `BASKET_API_BASE_URL` - Collection server base URL (required)
//! - `BASKET_API_TOKEN` - Shopper bearer token (or pass `--token`)
//! - `SENTRY_DSN` - Optional error tracking

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use pineapple_basket_core::CollectionKind;
use pineapple_basket_engine::EngineConfig;
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "basket")]
#[command(author, version, about = "Pineapple Basket cart and wishlist tool")]
struct Cli {
    /// Shopper bearer token, overrides `BASKET_API_TOKEN`
    #[arg(long, global = true)]
    token: Option<String>,

    /// Print collections as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and print a collection (`cart` or `wishlist`)
    Show { kind: CollectionKind },
    /// Add a product
    Add {
        kind: CollectionKind,
        id: String,

        /// Quantity to add (cart only)
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Unit price to show until the server confirms it
        #[arg(short, long)]
        price: Option<Decimal>,
    },
    /// Remove a product
    Remove { kind: CollectionKind, id: String },
    /// Set a cart line's quantity; 0 or less removes it
    Set {
        kind: CollectionKind,
        id: String,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &EngineConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pineapple_basket_engine=warn,pineapple_basket_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: EngineConfig) -> Result<(), commands::CommandError> {
    let session = commands::Session::open(&config, cli.token, cli.json)?;
    match cli.command {
        Commands::Show { kind } => session.show(kind).await,
        Commands::Add {
            kind,
            id,
            quantity,
            price,
        } => session.add(kind, id, quantity, price).await,
        Commands::Remove { kind, id } => session.remove(kind, id).await,
        Commands::Set { kind, id, quantity } => session.set_quantity(kind, id, quantity).await,
    }
}
