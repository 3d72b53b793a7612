use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "ibk")]
#[command(about = "Broker session operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local...)
        #[arg(required = true)]
        paths: Vec<String>,

        /// Exit non-zero when the merged config has keys nothing reads
        #[arg(long, default_value_t = false)]
        strict: bool,
    },

    /// Classify one broker message and print the outcome as JSON
    Classify {
        /// Request id the broker attached (-1 for none)
        #[arg(long, allow_negative_numbers = true)]
        id: i32,

        #[arg(long)]
        code: i32,

        #[arg(long)]
        message: String,
    },

    /// Run a full session lifecycle against the in-memory paper broker
    Simulate {
        /// Layered config paths in merge order (defaults to fast timings)
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Ceiling for each lifecycle step
        #[arg(long, default_value_t = 10_000)]
        timeout_ms: u64,
    },
}

fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths, strict } => {
            let loaded = commands::load_config(&paths)?;
            init_tracing(loaded.log_filter());
            commands::config_hash(&loaded, strict)?;
        }

        Commands::Classify { id, code, message } => {
            init_tracing(None);
            let classification = ibk_events::classify(id, code, &message);
            println!("{}", serde_json::to_string_pretty(&classification)?);
        }

        Commands::Simulate {
            config_paths,
            timeout_ms,
        } => {
            let loaded = if config_paths.is_empty() {
                None
            } else {
                Some(commands::load_config(&config_paths)?)
            };
            init_tracing(loaded.as_ref().and_then(|l| l.log_filter()));
            commands::simulate::run(loaded.as_ref(), std::time::Duration::from_millis(timeout_ms))?;
        }
    }

    Ok(())
}

/// `RUST_LOG` wins, then the config's `/logging/filter`, then `info`.
/// Logs go to stderr; stdout carries command output only.
fn init_tracing(config_filter: Option<&str>) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => config_filter
            .and_then(|f| EnvFilter::try_new(f).ok())
            .unwrap_or_else(|| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
