use anyhow::Result;
use clap::Parser;
use recall_index::{
    app,
    cli::{
        handle_capabilities_command, handle_index_command, handle_query_command,
        handle_status_command, handle_uploads_command, load_config, Cli, CliCommand,
    },
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if let Some(CliCommand::Version) = cli.command {
        println!("recall-index {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = load_config(&cli)?;

    match cli.command {
        Some(CliCommand::Index(args)) => handle_index_command(&config, args).await,
        Some(CliCommand::Query(args)) => handle_query_command(&config, args).await,
        Some(CliCommand::Status) => handle_status_command(&config).await,
        Some(CliCommand::Uploads) => handle_uploads_command(&config).await,
        Some(CliCommand::Capabilities) => handle_capabilities_command(&config).await,
        Some(CliCommand::Serve) | Some(CliCommand::Version) | None => {
            app::run_service(config).await
        }
    }
}
