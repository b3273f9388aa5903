//! dmap module - webhook-driven mesh peer
//!
//! Registers webhooks with the controller, serves the callback paths and
//! periodically pushes status messages. Two modes are provided: the
//! many-webhook module and the single-webhook external handler.

mod commands;
mod runtime;

use clap::{Parser, Subcommand};
use commands::{ExternalCommand, ModuleCommand};
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "DMAP_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full
    #[arg(
        long,
        default_value = "compact",
        env = "DMAP_LOG_FORMAT",
        global = true
    )]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the many-webhook module (configured from MODULE_* variables)
    Module(ModuleCommand),
    /// Run the single-webhook external handler for a module
    External(ExternalCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // If RUST_LOG is set, use it as-is; otherwise dmap crates at the requested
    // level and noisy dependencies at warn
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::try_from_default_env()?
    } else {
        tracing_subscriber::EnvFilter::new(format!(
            "dmap_module={level},\
             dmap_core={level},\
             dmap_client={level},\
             dmap_webhooks={level},\
             tower_http={level},\
             h2=warn,\
             tower=warn,\
             hyper=warn,\
             reqwest=warn",
            level = cli.log_level
        ))
    };

    let fmt_layer = match cli.log_format.as_str() {
        "full" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Module(cmd) => cmd.execute(),
        Commands::External(cmd) => cmd.execute(),
    }
}
