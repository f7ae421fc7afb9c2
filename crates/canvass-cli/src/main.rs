use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "canvass")]
#[command(about = "Canvass CLI - Adaptive Interview Orchestration and Synthesis", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interview from the terminal
    Interview(commands::interview::InterviewArgs),
    /// Synthesize team-review perspectives from a JSON file
    Synthesize(commands::synthesize::SynthesizeArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Interview(args) => commands::interview::run(args).await,
        Commands::Synthesize(args) => commands::synthesize::run(args).await,
    }
}
