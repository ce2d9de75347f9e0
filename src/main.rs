use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use git_disclosure::{AttackStrength, ScanConfig};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "git-disclosure", version)]
#[command(about = "Recovers source code from web servers that expose their .git/ folder")]
struct Cli {
    #[command(flatten)]
    options: Options,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Options {
    /// Log every request and parsing step
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Requests allowed per object resolution
    #[arg(long, global = true, default_value_t = 20)]
    max_requests: usize,

    /// Buffer size used when inflating loose objects
    #[arg(long, global = true, default_value_t = 4096)]
    inflate_buffer_size: usize,

    /// Longest delta chain followed inside a pack
    #[arg(long, global = true, default_value_t = 512)]
    max_delta_depth: usize,

    #[arg(long, global = true, value_enum, default_value_t = AttackStrength::Medium)]
    strength: AttackStrength,

    #[arg(long, global = true)]
    user_agent: Option<String>,

    #[arg(long, global = true, default_value_t = 10)]
    timeout_secs: u64,
}

impl Options {
    fn to_config(&self) -> ScanConfig {
        let defaults = ScanConfig::default();
        ScanConfig {
            inflate_buffer_size: self.inflate_buffer_size,
            max_requests: self.max_requests,
            max_delta_depth: self.max_delta_depth,
            attack_strength: self.strength,
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Request a page and report whether its source leaks through Git metadata
    Scan { url: String },
    /// Print an object recovered from a remote .git/ folder
    CatObject {
        /// URL of the .git/ folder, e.g. https://example.com/.git/
        git_url: String,
        hash: String,
        /// Also print the URLs that served the object
        #[arg(long)]
        uris: bool,
    },
    /// List the entries of a working tree index, local or remote
    LsIndex { source: String },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.options.verbose);
    let config = cli.options.to_config();

    match cli.command {
        Command::Scan { url } => commands::scan::invoke(&url, config),
        Command::CatObject { git_url, hash, uris } => {
            commands::cat_object::invoke(&git_url, &hash, uris, &config)
        }
        Command::LsIndex { source } => commands::ls_index::invoke(&source, &config),
    }
}
