//! 🚀 logstreamer-cli: the front door, the bouncer, the maitre d' of logstreamer.
//!
//! 📦 The thin CLI wrapper: checks that something is actually piped in, parses
//! flags, loads config, sets up logging, and then lets the real code do the heavy
//! lifting. Like a manager. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use logstreamer::app_config::{ConfigOverrides, RuntimeOverrides, SinkOverrides};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// 🚩 Pipe logs in, ship them to a `_bulk` endpoint in batches.
///
/// Every flag is optional; anything left out falls back to the config file, then to
/// `LOGSTREAMER_*` env vars, then to the defaults.
#[derive(Debug, Parser)]
#[command(name = "logstreamer", version, about)]
struct Cli {
    /// TOML config file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Base URL of the bulk endpoint (`_bulk` is appended)
    #[arg(long, alias = "logseneurl")]
    url: Option<String>,

    /// Routing token, used as the index name
    #[arg(long, alias = "logsenetoken")]
    token: Option<String>,

    /// Milliseconds between timer drains, 0 disables the timer
    #[arg(long, alias = "timebeforedrain")]
    poll_interval_ms: Option<u64>,

    /// Lines buffered before a forced drain, 0 disables the size trigger
    #[arg(long, alias = "maxitems")]
    max_items: Option<usize>,

    /// Document type tag for every record
    #[arg(long, alias = "logtype")]
    log_type: Option<String>,

    /// Echo every line and every response body
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            sink: SinkOverrides {
                url: self.url.clone(),
                token: self.token.clone(),
                log_type: self.log_type.clone(),
            },
            runtime: RuntimeOverrides {
                poll_interval_ms: self.poll_interval_ms,
                max_items: self.max_items,
            },
            // -- a flag that is absent means "no opinion", not "false"
            debug: self.debug.then_some(true),
        }
    }
}

/// 🚀 main(): where it all begins.
///
/// 🔧 Steps:
/// 1. Parse flags
/// 2. Make sure stdin is a pipe (refuse politely otherwise), load config
/// 3. Init tracing (so we can see what goes wrong, and when)
/// 4. Run until stdin closes
/// 5. Handle errors (cry)
#[tokio::main]
async fn main() -> Result<()> {
    // 🚩 flags first, so `--help` works from a plain terminal
    let cli = Cli::parse();

    // 🔒 nothing piped in? nothing to do. bail before buffering a single byte.
    logstreamer::sources::ensure_stdin_is_piped()?;

    let app_config = logstreamer::app_config::load_config(cli.config.as_deref(), &cli.overrides())
        .context("💀 In logstreamer-cli, main, we couldn't load the config. Check the file, the LOGSTREAMER_* env vars and the flags.")?;

    // 📡 RUST_LOG wins; otherwise --debug turns the volume up. stderr, because stdout
    // might be somebody's pipe.
    let default_level = if app_config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    // 🚀 SEND IT.
    let result = logstreamer::run(app_config).await;

    if let Err(err) = result {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion of sadness, one layer at a time
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
        }

        // 🗑️ Exit with prejudice. Process exitus maximus.
        std::process::exit(1);
    }

    Ok(())
}
