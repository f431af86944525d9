//! Atelier CLI - catalog browsing, cart inspection and backend checks.
//!
//! # Usage
//!
//! ```bash
//! # Check configuration and backend reachability
//! atelier check
//!
//! # Browse the catalog
//! atelier products list --category shirts --page 2
//! atelier products show prod_123
//!
//! # Inspect or change a customer's cart (password from ATELIER_PASSWORD)
//! atelier cart show -e customer@example.com
//! atelier cart add prod_123 --color Red --size M -e customer@example.com
//! ```
//!
//! # Commands
//!
//! - `check` - Validate configuration and reach the backend
//! - `products` - List and show catalog products
//! - `cart` - Show, add to, or remove from a signed-in customer's cart

#![cfg_attr(not(test), forbid(unsafe_code))]

use atelier_storefront::ClientConfig;
use atelier_storefront::config::ConfigError;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

#[derive(Parser)]
#[command(name = "atelier")]
#[command(author, version, about = "Atelier storefront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration and check that the backend answers
    Check,
    /// Browse the product catalog
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
    /// Work with a customer's cart
    Cart {
        /// Customer email; the password is read from `ATELIER_PASSWORD`
        #[arg(short, long, global = true)]
        email: Option<String>,

        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum ProductsAction {
    /// List a page of products
    List {
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        #[arg(short, long, default_value_t = 20)]
        limit: u32,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show one product
    Show {
        /// Product ID
        id: String,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Print the cart
    Show,
    /// Add a product variant
    Add {
        /// Product ID
        id: String,

        #[arg(long)]
        color: Option<String>,

        #[arg(long)]
        size: Option<String>,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Remove a line
    Remove {
        /// Product ID
        id: String,

        #[arg(long)]
        color: Option<String>,

        #[arg(long)]
        size: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Config is loaded before the runtime so Sentry can be initialized first
    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            report_config_error(&e);
            std::process::exit(2);
        }
    };

    let _sentry_guard = init_sentry(&config);
    init_tracing();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };

    let result: Result<(), Box<dyn std::error::Error>> = runtime.block_on(run(cli, config));

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

/// Tracing isn't installed yet when configuration fails.
#[allow(clippy::print_stderr)]
fn report_config_error(err: &ConfigError) {
    eprintln!("Configuration error: {err}");
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Check => commands::check::run(config).await?,
        Commands::Products { action } => match action {
            ProductsAction::List {
                page,
                limit,
                category,
                search,
            } => commands::products::list(config, page, limit, category, search).await?,
            ProductsAction::Show { id } => commands::products::show(config, &id).await?,
        },
        Commands::Cart { email, action } => {
            let session = commands::connect(config, email.as_deref()).await?;
            let result = match action {
                CartAction::Show => commands::cart::show(&session).await,
                CartAction::Add {
                    id,
                    color,
                    size,
                    quantity,
                } => {
                    commands::cart::add(&session, &id, color.as_deref(), size.as_deref(), quantity)
                        .await
                }
                CartAction::Remove { id, color, size } => {
                    commands::cart::remove(&session, &id, color.as_deref(), size.as_deref()).await
                }
            };
            session.end().await;
            result?;
        }
    }
    Ok(())
}

/// Initialize Sentry error tracking.
///
/// Returns a guard that must be kept alive for the duration of the program.
/// Events are flushed when the guard is dropped.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "atelier_storefront=info,atelier_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(sentry::integrations::tracing::layer().event_filter(sentry_event_filter))
        .init();
}

/// Route tracing events to Sentry: errors and warnings become events,
/// info and debug become breadcrumbs.
fn sentry_event_filter(
    metadata: &tracing::Metadata<'_>,
) -> sentry::integrations::tracing::EventFilter {
    use sentry::integrations::tracing::EventFilter;

    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => EventFilter::Breadcrumb,
        _ => EventFilter::Ignore,
    }
}
