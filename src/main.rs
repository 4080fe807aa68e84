//! Binary entrypoint for the guessbot CLI.
//!
//! Commands:
//! - `init` - create a starter `config.toml` and the data directory
//! - `register --channel <id> --name <login>` - create a channel document
//! - `console --channel <id>` - play one channel from stdin, one chat line per row
//! - `status` - print registered channels and a brief summary
//! - `report totals --channel <id>` - write the lifetime totals CSV
//!
//! See the library crate docs for module-level details: `guessbot::`.
use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::info;

use guessbot::config::Config;
use guessbot::game::report::ReportWriter;
use guessbot::game::GameServer;
use guessbot::metrics;
use guessbot::storage::Storage;

#[derive(Parser)]
#[command(name = "guessbot")]
#[command(about = "A chat guessing game bot")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a default configuration file
    Init,
    /// Register a channel
    Register {
        /// Channel (streamer) user id
        #[arg(long)]
        channel: String,
        /// Channel login name
        #[arg(long)]
        name: String,
        /// Points per correct guess (defaults to bot.default_points)
        #[arg(long)]
        points: Option<u32>,
        /// First-guess bonus (defaults to bot.default_first_bonus)
        #[arg(long)]
        first_bonus: Option<u32>,
    },
    /// Read `<user_id> <username> [mod] <message>` lines from stdin for one channel
    Console {
        #[arg(long)]
        channel: String,
    },
    /// Show registered channels
    Status,
    /// Write a report
    Report {
        #[command(subcommand)]
        kind: ReportKind,
    },
}

#[derive(Subcommand)]
enum ReportKind {
    /// Lifetime points for every participant of a channel
    Totals {
        #[arg(long)]
        channel: String,
    },
}

async fn open_storage(config: &Config) -> Result<Storage> {
    Ok(Storage::new(&config.storage.data_dir)
        .await?
        .with_max_document_bytes(config.storage.max_document_bytes))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Init => {
            info!("Initializing new guessbot configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
            let cfg = Config::default();
            Storage::new(&cfg.storage.data_dir).await?;
            info!("Initialized data directory at {}", cfg.storage.data_dir);
        }
        Commands::Register {
            channel,
            name,
            points,
            first_bonus,
        } => {
            let config = pre_config.unwrap_or(Config::load(&cli.config).await?);
            let storage = open_storage(&config).await?;
            let doc = storage
                .register_streamer(
                    &channel,
                    &name,
                    points.unwrap_or(config.bot.default_points),
                    first_bonus.unwrap_or(config.bot.default_first_bonus),
                )
                .await?;
            println!(
                "Registered {} ({}): {} points, first guess bonus {}",
                doc.name, doc.channel_id, doc.points, doc.first_bonus
            );
        }
        Commands::Console { channel } => {
            let config = pre_config.unwrap_or(Config::load(&cli.config).await?);
            info!("Starting guessbot v{}", env!("CARGO_PKG_VERSION"));
            let mut server = GameServer::new(config).await?;
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            server.run_console(&channel, stdin, tokio::io::stdout()).await?;
            let counters = metrics::snapshot();
            info!(
                "Console input closed: {} guesses ({} rejected), {} reveals, {} families completed, {} points awarded, {} sessions finished",
                counters.guesses_recorded,
                counters.guesses_rejected,
                counters.reveals_scored,
                counters.families_completed,
                counters.points_awarded,
                counters.sessions_finished
            );
        }
        Commands::Status => {
            let config = pre_config.unwrap_or(Config::load(&cli.config).await?);
            let storage = open_storage(&config).await?;
            let channels = storage.list_channels().await?;
            println!("guessbot v{}", env!("CARGO_PKG_VERSION"));
            println!("Data directory: {}", storage.base_dir());
            println!("Channels: {}", channels.len());
            for channel_id in channels {
                let doc = storage.require_streamer(&channel_id).await?;
                println!(
                    "  {} ({}): {} participants, {} items, {} modes, {} extra types, {} sessions played",
                    doc.name,
                    doc.channel_id,
                    doc.participants.len(),
                    doc.guessables.len(),
                    doc.modes.len(),
                    doc.extra.len(),
                    doc.sessions.len()
                );
            }
        }
        Commands::Report {
            kind: ReportKind::Totals { channel },
        } => {
            let config = pre_config.unwrap_or(Config::load(&cli.config).await?);
            let storage = open_storage(&config).await?;
            let doc = storage
                .load_streamer(&channel)
                .await?
                .ok_or_else(|| anyhow!("Channel {} is not registered", channel))?;
            let writer = ReportWriter::new(&config.reports.dir);
            let path = writer
                .write_totals_report(&doc.channel_id, &doc.participants, Utc::now())
                .await?;
            println!("Wrote {}", path.display());
        }
    }

    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|cfg| cfg.logging.level.parse::<log::LevelFilter>().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let file = config
        .as_ref()
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        })
        .map(|f| std::sync::Arc::new(std::sync::Mutex::new(f)));
    let audit_path = config.as_ref().and_then(|cfg| cfg.logging.audit_file.clone());
    let is_tty = atty::is(atty::Stream::Stdout);

    builder.format(move |fmt, record| {
        let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        let line = format!("{} [{}] {}", ts, record.level(), record.args());

        if let Some(ref file) = file {
            if let Ok(mut guard) = file.lock() {
                let _ = writeln!(guard, "{}", line);
            }
        }

        if record.target() == "audit" {
            if let Some(ref path) = audit_path {
                if let Ok(mut af) = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                {
                    let _ = writeln!(af, "{}", line);
                }
            }
        }

        // With a log file and no terminal, the file is the only sink
        if file.is_none() || is_tty {
            writeln!(fmt, "{}", line)
        } else {
            Ok(())
        }
    });
    let _ = builder.try_init();
}
