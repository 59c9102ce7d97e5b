//! Terminal front-end. Handlers print results; the work lives in `app` and `index`.
//!
//! Only `index` takes the data directory lock. The inspection commands read
//! the persisted index, so they work while `serve` is running.

use crate::app::Service;
use crate::config::Config;
use crate::index::{IndexPhase, IndexRequest};
use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

mod args;

pub use args::{Cli, CliCommand, IndexCliArgs, QueryCliArgs};

pub fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

pub async fn handle_index_command(config: &Config, args: IndexCliArgs) -> Result<()> {
    let service = Service::build(config).await?;
    let orchestrator = service.orchestrator.clone();

    let accepted = orchestrator
        .request_build_or_update(IndexRequest {
            source: Some(args.source),
            room_name: args.room,
            max_recordings: args.max_recordings,
        })
        .await?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));

    let state = orchestrator.state();
    let waiter = orchestrator.clone();
    let wait = tokio::spawn(async move { waiter.wait_for_idle().await });
    tokio::pin!(wait);

    loop {
        tokio::select! {
            _ = &mut wait => break,
            _ = tokio::time::sleep(Duration::from_millis(250)) => {
                spinner.set_message(state.get().await.message);
            }
        }
    }

    let status = state.get().await;
    spinner.finish_and_clear();

    println!("Generation {} ({})", accepted.generation, accepted.source.as_str());
    println!("{}", status.message);

    if let Some(report) = orchestrator.last_report().await {
        for recording in &report.recordings {
            match &recording.error {
                Some(error) => println!(
                    "  {:<10} {} - {}",
                    recording.outcome.as_str(),
                    recording.identity,
                    error
                ),
                None => println!("  {:<10} {}", recording.outcome.as_str(), recording.identity),
            }
        }
    }

    if status.state == IndexPhase::Failed {
        bail!("Index update failed");
    }
    Ok(())
}

pub async fn handle_query_command(config: &Config, args: QueryCliArgs) -> Result<()> {
    let text = args.text.join(" ");
    if text.trim().is_empty() {
        bail!("Query text is required");
    }

    let service = Service::inspect(config).await?;
    let answer = service.orchestrator.query(&text).await?;

    println!("{}", answer.answer);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in answer.sources {
            println!("  {} ({:.3}) {}", source.identity, source.score, source.title);
        }
    }
    Ok(())
}

pub async fn handle_status_command(config: &Config) -> Result<()> {
    let service = Service::inspect(config).await?;
    let status = service.orchestrator.state().get().await;

    println!("State:      {}", status.state.as_str());
    println!("Message:    {}", status.message);
    println!("Generation: {}", status.generation);
    println!("Updated:    {}", status.updated_at.to_rfc3339());
    Ok(())
}

pub async fn handle_uploads_command(config: &Config) -> Result<()> {
    let service = Service::inspect(config).await?;
    let uploads = service.uploads.snapshot()?;

    if uploads.is_empty() {
        println!("No uploads waiting to be indexed.");
        return Ok(());
    }

    println!("{} upload(s) waiting to be indexed:\n", uploads.len());
    for upload in uploads {
        println!("ID:       {}", upload.identity);
        println!("File:     {}", upload.original_filename);
        println!("Size:     {} bytes", upload.size_bytes);
        println!("Received: {}", upload.received_at.to_rfc3339());
        println!("---");
    }
    Ok(())
}

pub async fn handle_capabilities_command(config: &Config) -> Result<()> {
    let service = Service::inspect(config).await?;
    let capabilities = service.orchestrator.capabilities();
    println!("{}", serde_json::to_string_pretty(&capabilities)?);
    Ok(())
}
