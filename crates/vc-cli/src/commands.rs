use anyhow::{bail, Context};
use colored::Colorize;
use vc_server::config::env;
use vc_server::{
    CounterHandler, CounterServer, Envelope, HandlerResponse, ServerConfig, TriggerMethod,
};
use vc_store::BackendKind;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = ServerConfig::load(cli.config.as_deref()).context("loading configuration")?;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args).await,
        Command::Increment => {
            let handler = one_shot_handler(&config);
            print_response(handler.handle(TriggerMethod::Post).await, cli.format)
        }
        Command::Get => {
            let handler = one_shot_handler(&config);
            print_response(handler.current().await, cli.format)
        }
        Command::Reset(args) => cmd_reset(&config, args).await,
        Command::Invoke(args) => cmd_invoke(&config, args).await,
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

async fn cmd_serve(mut config: ServerConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.bind_addr = bind
            .parse()
            .with_context(|| format!("invalid bind address {bind:?}"))?;
    }
    if config.allow_reset {
        tracing::warn!("reset endpoint enabled; do not expose this server publicly");
    }
    println!("{} view counter on {}", "▶".green(), config.bind_addr.to_string().bold());
    CounterServer::new(config).serve().await?;
    Ok(())
}

/// Handler for a single invocation, as a function host would build it.
fn one_shot_handler(config: &ServerConfig) -> CounterHandler {
    if matches!(config.store.backend, BackendKind::Memory | BackendKind::Atomic) {
        tracing::warn!(
            backend = %config.store.backend,
            "in-memory store; counts do not persist between invocations (set {})",
            env::STORE_BACKEND
        );
    }
    CounterHandler::from_config(config)
}

fn print_response(response: HandlerResponse, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&response.body)?),
        OutputFormat::Text => match &response.body {
            Envelope::Count { count } => {
                println!("{} count: {}", "✓".green().bold(), count.to_string().bold())
            }
            Envelope::Error { error } => println!("{} {}", "✗".red().bold(), error),
        },
    }
    if !response.is_ok() {
        bail!("{}", response.status.label());
    }
    Ok(())
}

async fn cmd_reset(config: &ServerConfig, args: ResetArgs) -> anyhow::Result<()> {
    if !args.yes {
        bail!("refusing to reset the counter without --yes");
    }
    let engine = config.build_engine()?;
    engine.reset().await?;
    println!(
        "{} counter {} reset to 0",
        "✓".green().bold(),
        engine.key().to_string().yellow()
    );
    Ok(())
}

async fn cmd_invoke(config: &ServerConfig, args: InvokeArgs) -> anyhow::Result<()> {
    let method: TriggerMethod = args.method.parse()?;
    let response = one_shot_handler(config).handle(method).await;
    println!("{}", serde_json::to_string_pretty(&response.to_function_payload())?);
    Ok(())
}
