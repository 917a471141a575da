use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "viewcount",
    about = "View counter backend with optimistic-concurrency increments",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file. Environment variables override it.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Increment the counter once and print the new count
    Increment,
    /// Print the current count without incrementing
    Get,
    /// Reset the counter to zero (development only)
    Reset(ResetArgs),
    /// Run one function invocation and print the proxy response
    Invoke(InvokeArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Override the bind address, e.g. 0.0.0.0:8000
    #[arg(long)]
    pub bind: Option<String>,
}

#[derive(Args)]
pub struct ResetArgs {
    /// Confirm the reset
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct InvokeArgs {
    #[arg(long, default_value = "GET")]
    pub method: String,
}
