//! Craftmart CLI - browse the shop, manage the cart and place orders.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (password from CRAFTMART_PASSWORD or --password)
//! craftmart login maker@example.in --remember
//!
//! # Browse
//! craftmart products --search cushion --sort price_asc
//! craftmart product 42
//!
//! # Cart
//! craftmart cart add 42 --qty 2
//! craftmart cart qty 1001 3
//! craftmart cart remove 1001
//!
//! # Checkout
//! craftmart address add --name "Meera Iyer" --contact 9876543210 \
//!     --line1 "4 Handloom Street" --country India --state "Tamil Nadu" \
//!     --city Madurai --pincode 625001
//! craftmart checkout --place
//! ```
//!
//! The session (tokens, cart badge, cached addresses) persists in the file
//! named by `STOREFRONT_STATE_PATH` between invocations.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use craftmart_core::{CartItemId, CategoryId, ProductId, SavedItemId};
use craftmart_storefront::config::StorefrontConfig;
use craftmart_storefront::events::StoreEvent;
use craftmart_storefront::models::SortOrder;
use craftmart_storefront::state::AppState;

mod commands;
mod views;

use commands::CliError;

#[derive(Parser)]
#[command(name = "craftmart")]
#[command(author, version, about = "Craftmart storefront in the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in
    Login {
        /// Username or email
        username: String,

        #[arg(long, env = "CRAFTMART_PASSWORD", hide_env_values = true)]
        password: String,

        /// Pre-fill this username next time
        #[arg(long)]
        remember: bool,
    },
    /// Sign out and forget the session
    Logout,
    /// Create an account
    Register {
        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(long)]
        email: String,

        /// 10-digit mobile number
        #[arg(long)]
        phone: String,

        #[arg(long, env = "CRAFTMART_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long, env = "CRAFTMART_CONFIRM_PASSWORD", hide_env_values = true)]
        confirm_password: String,

        /// reCAPTCHA response token
        #[arg(long)]
        captcha: String,
    },
    /// Email a password reset link
    ForgotPassword { email: String },
    /// Set a new password from a reset link code
    ResetPassword {
        code: String,

        #[arg(long, env = "CRAFTMART_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long, env = "CRAFTMART_CONFIRM_PASSWORD", hide_env_values = true)]
        confirm_password: String,
    },
    /// Change the signed-in password
    ChangePassword {
        #[arg(long, env = "CRAFTMART_CURRENT_PASSWORD", hide_env_values = true)]
        current: String,

        #[arg(long, env = "CRAFTMART_PASSWORD", hide_env_values = true)]
        new: String,

        #[arg(long, env = "CRAFTMART_CONFIRM_PASSWORD", hide_env_values = true)]
        confirm: String,
    },
    /// List products
    Products {
        #[arg(long)]
        category: Option<CategoryId>,

        #[arg(long)]
        search: Option<String>,

        #[arg(long)]
        min_price: Option<Decimal>,

        #[arg(long)]
        max_price: Option<Decimal>,

        /// Hide sold-out products
        #[arg(long)]
        in_stock: bool,

        /// `relevance`, `price_asc`, `price_desc` or `newest`
        #[arg(long, default_value = "relevance")]
        sort: SortOrder,

        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Show one product
    Product { id: ProductId },
    /// List categories
    Categories,
    /// Cart and saved-for-later
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Delivery addresses
    Address {
        #[command(subcommand)]
        action: AddressAction,
    },
    /// Review totals per address and optionally place the order
    Checkout {
        /// Address id to deliver to (defaults to the default address)
        #[arg(long)]
        address: Option<String>,

        /// Submit the order
        #[arg(long)]
        place: bool,
    },
    /// Order history
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Contact the shop
    Contact {
        #[command(subcommand)]
        action: ContactAction,
    },
}

#[derive(Subcommand)]
pub enum CartAction {
    /// Show cart lines, totals and saved items
    Show,
    /// Add a product
    Add {
        product: ProductId,

        #[arg(long, default_value_t = 1)]
        qty: u32,
    },
    /// Change a line's quantity (clamped to stock)
    Qty { item: CartItemId, quantity: f64 },
    /// Remove a line
    Remove {
        item: CartItemId,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Move a line to saved-for-later
    Save { item: CartItemId },
    /// List saved-for-later
    Saved,
    /// Move a saved item back to the cart
    Move { saved: SavedItemId },
    /// Delete a saved item
    Unsave { saved: SavedItemId },
}

#[derive(Subcommand)]
pub enum AddressAction {
    /// List saved addresses with delivery status
    List,
    /// Add an address
    Add(commands::address::AddArgs),
}

#[derive(Subcommand)]
pub enum OrdersAction {
    /// List past orders
    List,
    /// Show one order (Ctrl-C cancels the fetch)
    Show { order_id: String },
}

#[derive(Subcommand)]
pub enum ContactAction {
    /// List enquiry types
    Types,
    /// Send a message
    Send(commands::contact::SendArgs),
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Route tracing events to Sentry: warnings and errors become events, the
/// rest breadcrumbs.
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

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => fail(&CliError::from(e)),
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "craftmart_storefront=warn,craftmart_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let state = AppState::from_config(config);
    let mut events = state.events().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                StoreEvent::Navigate(route) => tracing::info!("{}", route.describe()),
                StoreEvent::AuthChanged { signed_in } => tracing::debug!(signed_in, "Auth changed"),
                StoreEvent::CartChanged { count } => tracing::debug!(count, "Cart changed"),
            }
        }
    });

    if let Err(e) = run(&state, cli).await {
        fail(&e);
    }
}

#[allow(clippy::print_stderr)]
fn fail(err: &CliError) -> ! {
    eprintln!("{err}");
    if err.is_auth_required() {
        eprintln!("Run `craftmart login <username>` first.");
    }
    std::process::exit(1);
}

async fn run(state: &AppState, cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Login {
            username,
            password,
            remember,
        } => commands::account::login(state, username, password, remember).await?,
        Commands::Logout => commands::account::logout(state)?,
        Commands::Register {
            first_name,
            last_name,
            email,
            phone,
            password,
            confirm_password,
            captcha,
        } => {
            commands::account::register(
                state,
                commands::account::RegisterArgs {
                    first_name,
                    last_name,
                    email,
                    phone,
                    password,
                    confirm_password,
                    captcha,
                },
            )
            .await?;
        }
        Commands::ForgotPassword { email } => {
            commands::account::forgot_password(state, &email).await?;
        }
        Commands::ResetPassword {
            code,
            password,
            confirm_password,
        } => commands::account::reset_password(state, &code, password, confirm_password).await?,
        Commands::ChangePassword {
            current,
            new,
            confirm,
        } => commands::account::change_password(state, current, new, confirm).await?,
        Commands::Products {
            category,
            search,
            min_price,
            max_price,
            in_stock,
            sort,
            page,
        } => {
            let query = craftmart_storefront::models::ProductQuery {
                category,
                search,
                min_price,
                max_price,
                in_stock_only: in_stock,
                sort,
                page,
                ..Default::default()
            };
            commands::catalog::products(state, &query).await?;
        }
        Commands::Product { id } => commands::catalog::product(state, id).await?,
        Commands::Categories => commands::catalog::categories(state).await?,
        Commands::Cart { action } => commands::cart::run(state, action).await?,
        Commands::Address { action } => commands::address::run(state, action).await?,
        Commands::Checkout { address, place } => {
            commands::checkout::run(state, address.as_deref(), place).await?;
        }
        Commands::Orders { action } => commands::orders::run(state, action).await?,
        Commands::Contact { action } => commands::contact::run(state, action).await?,
    }
    Ok(())
}
