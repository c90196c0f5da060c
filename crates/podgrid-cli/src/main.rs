//! podgrid CLI binary entrypoint.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use podgrid_cli::cli::{Cli, Commands};
use podgrid_cli::commands::{PodsCommand, RegistryCommand, ResourcesCommand};
use podgrid_cli::output::OutputFormat;
use podgrid_cli::CliError;
use podgrid_client::{
    ApiClient, HybridClient, PrimeCli, RetryPolicy, RetryingTransport,
};
use podgrid_registry::{ActivePodRegistry, ConfigStore};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();

    let policy = RetryPolicy::default();
    let client = if cli.no_api {
        HybridClient::new(
            None::<ApiClient>,
            PrimeCli::default(),
            RetryingTransport::new(policy),
        )
    } else {
        podgrid_client::default_client(policy)
    };

    let store = match cli.registry {
        Some(path) => ConfigStore::new(path),
        None => ConfigStore::new(ConfigStore::default_path()),
    };
    let registry = ActivePodRegistry::new(store);

    match cli.command {
        Commands::Resources { command } => {
            ResourcesCommand::new(&client)
                .execute(&mut stdout, &format, &command)
                .await?;
        }
        Commands::Pods { command } => {
            PodsCommand::new(&client, &registry)
                .execute(&mut stdout, &format, &command)
                .await?;
        }
        Commands::Pod { command } => {
            RegistryCommand::new(&registry)
                .execute(&mut stdout, &format, &command)
                .await?;
        }
    }

    Ok(())
}
