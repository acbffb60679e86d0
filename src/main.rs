mod billing;
mod draft;
mod error;
mod mail;
mod model;
mod pricing;
mod render;
mod report;
mod settings;
mod store;
mod webhook;
mod wizard;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context;
use chrono::{Datelike, Local, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use inquire::{Confirm, InquireError};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::billing::{PlanUsage, StripeCheckout};
use crate::error::QuoteError;
use crate::model::{Client, Profile, Quote, QuoteStatus};
use crate::render::{QuoteContext, Renderer};
use crate::settings::{AppSettings, load_settings, setup_config_wizard};
use crate::store::Store;
use crate::webhook::WebhookOutcome;

// ==========================================
// CLI
// ==========================================

#[derive(Parser)]
#[command(name = "quote-maker", about = "Build, price and send quotes from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure data directory
    Config,
    /// Edit your profile
    Profile,
    /// Set up or edit company settings
    Company,
    /// Upload a company logo
    Logo { path: PathBuf },
    /// Add a new client
    AddClient,
    /// List clients
    Clients {
        /// Filter by name, company or email
        search: Option<String>,
    },
    /// Edit a client
    EditClient,
    /// Delete a client
    DeleteClient,
    /// Add a product to the catalog
    AddProduct,
    /// List catalog products
    Products {
        /// Filter by name or description
        search: Option<String>,
    },
    /// Edit a product
    EditProduct,
    /// Delete a product
    DeleteProduct,
    /// Create a new quote
    New,
    /// Edit an existing quote
    Edit,
    /// List quotes
    Quotes {
        #[arg(long, value_enum)]
        status: Option<QuoteStatus>,
    },
    /// Change a quote's status
    Status,
    /// Delete a quote
    Delete,
    /// Render a quote to HTML and open it
    Preview,
    /// Email a quote to its client
    Send,
    /// Show summary of quotes
    Summary {
        /// Year to summarize (defaults to current year)
        year: Option<i32>,
    },
    /// Show plan and quote usage
    Plan,
    /// Start a Pro subscription checkout
    Upgrade,
    /// Apply a signed payment webhook payload
    Webhook {
        /// File containing the raw event body
        payload: PathBuf,
        /// Value of the Stripe-Signature header
        #[arg(long)]
        signature: String,
    },
}

// ==========================================
// Main Function
// ==========================================

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        if is_cancelled(&err) {
            println!("Cancelled.");
            return;
        }
        eprintln!("❌ Error: {:#}", err);
        std::process::exit(1);
    }
}

fn is_cancelled(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<QuoteError>(),
        Some(QuoteError::Prompt(
            InquireError::OperationCanceled | InquireError::OperationInterrupted
        ))
    )
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    if let Commands::Config = command {
        setup_config_wizard()?;
        return Ok(());
    }

    // 1. Initialize configuration
    let mut settings = match load_settings().context("failed to read settings")? {
        Some(settings) => settings,
        None => setup_config_wizard()?,
    };
    settings.apply_env_overrides(|key| std::env::var(key).ok());

    let root = settings.data_root();
    let store = Store::open(&root)
        .with_context(|| format!("failed to open data directory {}", root.display()))?;

    // Webhooks run unattended, so no profile prompt.
    if let Commands::Webhook { ref payload, ref signature } = command {
        return apply_webhook(&store, &settings, payload, signature);
    }

    let profile = wizard::ensure_profile(&store)?;

    match command {
        Commands::Config | Commands::Webhook { .. } => unreachable!("handled above"),
        Commands::Profile => {
            wizard::edit_profile(&store, profile)?;
        }
        Commands::Company => {
            let existing = store.load_company(profile.id)?;
            wizard::company_wizard(&store, &profile, existing)?;
        }
        Commands::Logo { path } => {
            let company = wizard::upload_logo(&store, &profile, &path)
                .with_context(|| format!("failed to upload logo {}", path.display()))?;
            println!("🖼️  Logo set: {}", company.logo_url.unwrap_or_default());
        }
        Commands::AddClient => {
            wizard::client_wizard(&store, profile.id, None)?;
        }
        Commands::Clients { search } => {
            report::print_clients(&store.clients(profile.id, search.as_deref())?);
        }
        Commands::EditClient => {
            let picked = wizard::select_client(&store, profile.id, "Select Client to edit:")?;
            if let Some(client) = picked {
                wizard::client_wizard(&store, profile.id, Some(&client))?;
            }
        }
        Commands::DeleteClient => wizard::delete_client(&store, profile.id)?,
        Commands::AddProduct => {
            let default_tax = default_tax_rate(&store, &profile)?;
            wizard::product_wizard(&store, profile.id, default_tax, None)?;
        }
        Commands::Products { search } => {
            report::print_products(&store.products(profile.id, search.as_deref())?);
        }
        Commands::EditProduct => {
            let picked = wizard::select_product(&store, profile.id, "Select Product to edit:")?;
            if let Some(product) = picked {
                let default_tax = default_tax_rate(&store, &profile)?;
                wizard::product_wizard(&store, profile.id, default_tax, Some(&product))?;
            }
        }
        Commands::DeleteProduct => wizard::delete_product(&store, profile.id)?,
        Commands::New => {
            PlanUsage::load(&store, &profile)?.ensure_can_create_quote()?;
            let company = wizard::require_company(&store, &profile)?;
            wizard::quote_editor(&store, &profile, &company, None)?;
        }
        Commands::Edit => {
            let picked = wizard::select_quote(&store, profile.id, "Select Quote to edit:")?;
            if let Some(quote) = picked {
                let company = wizard::require_company(&store, &profile)?;
                wizard::quote_editor(&store, &profile, &company, Some(quote))?;
            }
        }
        Commands::Quotes { status } => {
            let quotes = store.quotes(profile.id, status)?;
            if quotes.is_empty() {
                println!("📭 No quotes found.");
            } else {
                report::print_quotes(&quotes, &store.clients(profile.id, None)?);
            }
        }
        Commands::Status => wizard::change_status(&store, profile.id)?,
        Commands::Delete => wizard::delete_quote(&store, profile.id)?,
        Commands::Preview => preview_quote(&store, &root, &profile)?,
        Commands::Send => send_quote(&store, &root, &settings, &profile)?,
        Commands::Summary { year } => {
            let target_year = year.unwrap_or_else(|| Local::now().year());
            println!("🔍 Summarizing quotes (Year: {})...", target_year);
            let quotes = store.quotes(profile.id, None)?;
            let clients = store.clients(profile.id, None)?;
            report::print_summary(&report::summarize(&quotes, &clients, target_year));
        }
        Commands::Plan => {
            let usage = PlanUsage::load(&store, &profile)?;
            println!("💳 Plan: {} | Quotes: {}", usage.plan, usage.describe());
            if !usage.can_create_quote() {
                println!("⚠️  Quote limit reached. Run `quote-maker upgrade` to go Pro.");
            }
        }
        Commands::Upgrade => {
            let provider = StripeCheckout::from_settings(&settings.billing)?;
            let session = billing::start_upgrade(&provider, &profile, &settings.billing)
                .context("failed to start checkout")?;
            println!("🔗 Complete your upgrade at:\n{}", session.url);
            open_url(&session.url);
        }
    }

    Ok(())
}

fn default_tax_rate(store: &Store, profile: &Profile) -> anyhow::Result<f64> {
    Ok(store
        .load_company(profile.id)?
        .map(|c| c.tax_rate)
        .unwrap_or(model::DEFAULT_TAX_RATE))
}

fn quote_client(store: &Store, quote: &Quote) -> anyhow::Result<Option<Client>> {
    Ok(match quote.client_id {
        Some(id) => store.get_owned::<Client>(quote.user_id, id)?,
        None => None,
    })
}

// ==========================================
// Preview & Send
// ==========================================

fn preview_quote(store: &Store, root: &Path, profile: &Profile) -> anyhow::Result<()> {
    let Some(quote) = wizard::select_quote(store, profile.id, "Select Quote to preview:")? else {
        return Ok(());
    };
    let company = store.load_company(profile.id)?;
    let client = quote_client(store, &quote)?;

    let renderer = Renderer::from_data_root(root).context("failed to load templates")?;
    let context = QuoteContext::new(&quote, company.as_ref(), client.as_ref());
    let html = renderer.render_preview(&context)?;
    let path = render::write_preview(root, &quote, client.as_ref(), &html)?;

    println!("✅ Preview generated: {}", path.display());
    open_and_reveal(&path);
    Ok(())
}

fn send_quote(
    store: &Store,
    root: &Path,
    settings: &AppSettings,
    profile: &Profile,
) -> anyhow::Result<()> {
    let Some(quote) = wizard::select_quote(store, profile.id, "Select Quote to send:")? else {
        return Ok(());
    };
    let (client, to) = mail::recipient(store, &quote)?;

    let prompt = format!("Send {} to {} <{}>?", quote.number_or_draft(), client.name, to);
    if !Confirm::new(&prompt).with_default(true).prompt()? {
        println!("Not sent.");
        return Ok(());
    }

    let renderer = Renderer::from_data_root(root).context("failed to load templates")?;
    let mailer = mail::mailer_from_settings(&settings.email);
    let from = settings.email.from.as_str();
    let sent = mail::send_quote(store, &renderer, mailer.as_ref(), from, profile.id, quote.id)
        .with_context(|| format!("failed to send quote {}", quote.number_or_draft()))?;

    println!("📧 Quote {} sent to {}.", sent.number_or_draft(), to);
    Ok(())
}

// ==========================================
// Webhook
// ==========================================

fn apply_webhook(
    store: &Store,
    settings: &AppSettings,
    payload: &Path,
    signature: &str,
) -> anyhow::Result<()> {
    let secret = settings
        .billing
        .webhook_secret
        .as_deref()
        .ok_or(QuoteError::MissingConfig("billing.webhook_secret (or STRIPE_WEBHOOK_SECRET)"))?;
    let body = fs::read(payload).with_context(|| format!("failed to read {}", payload.display()))?;

    match webhook::process_webhook(store, &body, signature, secret, Utc::now().timestamp())? {
        WebhookOutcome::PlanUpgraded(user_id) => println!("✅ Plan upgraded to Pro for {}", user_id),
        WebhookOutcome::Ignored(reason) => {
            println!("ℹ️  Event acknowledged, nothing to do ({})", reason)
        }
    }
    Ok(())
}

// ==========================================
// OS helpers
// ==========================================

fn open_and_reveal(path: &Path) {
    #[cfg(target_os = "macos")]
    Command::new("open").arg("-R").arg(path).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("explorer").arg(format!("/select,{}", path.to_string_lossy())).spawn().ok();

    #[cfg(target_os = "linux")]
    if let Some(parent) = path.parent() {
        Command::new("xdg-open").arg(parent).spawn().ok();
    }

    open_url(&path.to_string_lossy());
}

fn open_url(target: &str) {
    #[cfg(target_os = "macos")]
    Command::new("open").arg(target).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("cmd").args(["/C", "start", "", target]).spawn().ok();

    #[cfg(target_os = "linux")]
    Command::new("xdg-open").arg(target).spawn().ok();
}
