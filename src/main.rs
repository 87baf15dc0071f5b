mod cli;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mcpgate::config::Settings;
use mcpgate::mcp::{
    AuthType, DiscoveryCoordinator, InMemoryCatalog, InvocationOutcome, JsonRpcHttpTransport,
    ServerEndpoint, ToolInvoker,
};

use crate::cli::{Cli, Commands, Target};
use crate::ui::Console;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let console = Console::new();
    if let Err(e) = run(cli, &console).await {
        tracing::error!("{:#}", e);
        console.error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli, console: &Console) -> Result<()> {
    let config_path = match &cli.config {
        Some(path) => PathBuf::from(path),
        None => Settings::config_path()?,
    };
    let settings = Settings::load(Some(&config_path))?;

    match cli.command {
        Commands::Discover { target, json } => {
            let server = resolve(&settings, &target)?;
            let http = Arc::new(JsonRpcHttpTransport::new(settings.http_config())?);
            let catalog = Arc::new(InMemoryCatalog::new());
            let coordinator =
                DiscoveryCoordinator::new(http, settings.session_config(), catalog);

            console.info(&format!("Discovering tools on {}", server.base_url));
            let tools = coordinator.discover(&server).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tools)?);
            } else {
                console.list_tools(&server, &tools);
            }
        }
        Commands::Call { target, tool, args } => {
            let server = resolve(&settings, &target)?;
            let http = Arc::new(JsonRpcHttpTransport::new(settings.http_config())?);
            let invoker = Arc::new(ToolInvoker::new(
                http,
                settings.session_config(),
                &settings.transport.invoke_path,
            ));

            let handle = invoker.spawn_call(server, tool.as_str(), args);
            let canceller = handle.canceller();
            let call = handle.join();
            tokio::pin!(call);
            let outcome = tokio::select! {
                outcome = &mut call => outcome,
                _ = tokio::signal::ctrl_c() => {
                    console.warn("Interrupted, closing session...");
                    canceller.cancel();
                    call.await
                }
            };

            match outcome {
                InvocationOutcome::Completed(result) => {
                    console.tool_result(&tool, &result?);
                }
                InvocationOutcome::Cancelled => anyhow::bail!("tool call '{}' cancelled", tool),
                InvocationOutcome::Panicked(reason) => {
                    anyhow::bail!("tool call '{}' crashed: {}", tool, reason)
                }
            }
        }
        Commands::Servers => {
            console.list_servers(&settings.directory().list()?);
        }
        Commands::Config { init } => {
            if init && !config_path.exists() {
                settings.save(&config_path)?;
                console.success(&format!("Wrote {}", config_path.display()));
            }
            console.show_config(&settings, Some(&config_path));
        }
    }

    Ok(())
}

fn resolve(settings: &Settings, target: &Target) -> Result<ServerEndpoint> {
    if let Some(url) = &target.url {
        return Ok(ServerEndpoint::new("adhoc", url, AuthType::None)?);
    }
    let id = target.server.as_deref().context("No server given")?;
    settings
        .server(id)?
        .with_context(|| format!("Server '{}' is not configured or is disabled", id))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "mcpgate=debug" } else { "mcpgate=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
