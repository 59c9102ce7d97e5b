use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "recall-index")]
#[command(about = "Searchable transcripts of your meeting recordings", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use this config file instead of the default location
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Run the HTTP service (default)
    Serve,
    /// Build or update the index in this process and wait for it to finish
    Index(IndexCliArgs),
    /// Ask a question against the committed index
    Query(QueryCliArgs),
    /// Show the persisted index state
    Status,
    /// List uploads waiting to be indexed
    Uploads,
    /// Show which transcription, embedding and cloud backends are configured
    Capabilities,
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct IndexCliArgs {
    /// Recording source: cloud or upload
    #[arg(short, long, default_value = "cloud")]
    pub source: String,
    /// Only index cloud recordings from this room
    #[arg(short, long)]
    pub room: Option<String>,
    /// Index at most this many of the most recent cloud recordings
    #[arg(short, long)]
    pub max_recordings: Option<usize>,
}

#[derive(ClapArgs, Debug)]
pub struct QueryCliArgs {
    /// The question to ask
    pub text: Vec<String>,
}
