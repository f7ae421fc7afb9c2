//! Batch synthesis of team-review perspectives.

use anyhow::{Context, Result};
use canvass_application::SynthesisService;
use canvass_core::oracle::OracleClient;
use canvass_core::synthesis::{PerspectiveRecord, SynthesisStrategy};
use canvass_interaction::ApiOracle;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args)]
pub struct SynthesizeArgs {
    /// JSON file containing an array of perspective records
    #[arg(long)]
    input: PathBuf,

    /// Use one oracle call over the raw answers instead of the
    /// two-phase extract-then-judge pipeline
    #[arg(long)]
    one_shot: bool,
}

pub async fn run(args: SynthesizeArgs) -> Result<()> {
    let content = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let records: Vec<PerspectiveRecord> =
        serde_json::from_str(&content).context("input is not an array of perspective records")?;

    let oracle = ApiOracle::try_from_env()?;
    let service = SynthesisService::new(OracleClient::new(Arc::new(oracle)));

    let strategy = if args.one_shot {
        SynthesisStrategy::OneShot
    } else {
        SynthesisStrategy::TwoPhase
    };
    let result = service.synthesize_team_review(&records, strategy).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
