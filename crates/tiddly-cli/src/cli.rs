use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tiddly",
    about = "Tiddly Store: versioned tiddlers in bags, composed by recipes",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Print the effective configuration
    Config(ConfigArgs),
    /// Validate a configuration file and summarize it
    Check,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on, overriding the configuration file
    #[arg(short, long)]
    pub bind: Option<SocketAddr>,

    /// Allow cross-origin requests from any origin
    #[arg(long)]
    pub cors: bool,

    /// Skip writing the configured bags and recipes at startup
    #[arg(long)]
    pub no_seed: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Ignore the configuration file and print the built-in defaults
    #[arg(long)]
    pub defaults: bool,
}
