//! CLI entry point - the composition root.
//!
//! Infrastructure is wired together once via [`bootstrap`]; commands are
//! dispatched to handlers which delegate to the launcher.

use std::process::ExitCode;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use lmlaunch_cli::{Cli, CliConfig, CliError, Commands, bootstrap, handlers};

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        // No command provided - show help
        Cli::command().print_help()?;
        return Ok(());
    };

    let echo = !matches!(command, Commands::Serve { quiet: true, .. });
    let ctx = bootstrap(CliConfig::resolve(cli.config)?.with_echo(echo))?;

    match command {
        Commands::Serve {
            model,
            quiet: _,
            stats_interval,
        } => {
            handlers::serve::execute(&ctx, model, Duration::from_secs(stats_interval)).await?;
        }
        Commands::Models => handlers::models::execute(&ctx)?,
        Commands::Info { label, tensors } => {
            handlers::info::execute(&ctx, label, tensors).await?;
        }
        Commands::Config { command } => handlers::config::execute(&ctx, command)?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables before clap reads LMLAUNCH_CONFIG
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
