//! Interactive interview runner.

use anyhow::{Context, Result, bail};
use canvass_application::{
    CancellationToken, InterviewContext, InterviewService, StaticProfileProvider,
};
use canvass_core::interview::Transition;
use canvass_core::oracle::{Oracle, OracleClient};
use canvass_core::profile::{CandidateProfile, GeneralAnalysis};
use canvass_core::synthesis::SynthesisStrategy;
use canvass_interaction::{ApiOracle, ScriptedOracle};
use clap::{Args, ValueEnum};
use serde_json::json;
use std::io::{BufRead, Write};
use std::sync::Arc;

const DEMO_SUBJECT: &str = "demo";

#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    General,
    TeamReview,
    SkillDepth,
    PhasedPersona,
}

#[derive(Args)]
pub struct InterviewArgs {
    /// Interview variant to run
    #[arg(long, value_enum, default_value = "general")]
    kind: KindArg,

    /// Respondents per question slot (team-review only)
    #[arg(long, default_value_t = 2)]
    team_size: u32,

    /// Use the built-in scripted oracle instead of a live API
    #[arg(long)]
    offline: bool,
}

pub async fn run(args: InterviewArgs) -> Result<()> {
    let oracle: Arc<dyn Oracle> = if args.offline {
        Arc::new(demo_oracle())
    } else {
        Arc::new(ApiOracle::try_from_env()?)
    };
    let service = InterviewService::new(OracleClient::new(oracle), Arc::new(demo_profiles()));

    let context = match args.kind {
        KindArg::General => InterviewContext::General,
        KindArg::TeamReview => {
            if args.team_size == 0 {
                bail!("--team-size must be at least 1");
            }
            InterviewContext::TeamReview {
                team_size: args.team_size,
                strategy: SynthesisStrategy::TwoPhase,
            }
        }
        KindArg::SkillDepth => InterviewContext::SkillDepth {
            subject_id: DEMO_SUBJECT.to_string(),
        },
        KindArg::PhasedPersona => InterviewContext::PhasedPersona,
    };

    let started = service.start(context).await?;
    let cancel = CancellationToken::new();
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    let mut question = Some(started.first_question);
    let mut member = 0u32;
    while let Some(q) = question {
        let respondent = match args.kind {
            KindArg::TeamReview => {
                let name = format!("member-{}", member % args.team_size + 1);
                println!("\n[{name}] {}", q.text);
                Some(name)
            }
            _ => {
                println!("\n[{}] {}", q.topic, q.text);
                None
            }
        };
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next() else {
            bail!("stdin closed before the interview completed");
        };
        let text = line.context("failed to read answer")?;
        if text.trim().is_empty() {
            println!("(empty answer ignored)");
            question = Some(q);
            continue;
        }

        let outcome = service
            .answer(&started.session_id, respondent.as_deref(), text, &cancel)
            .await?;
        member += 1;
        if let Transition::Waiting { remaining } = outcome.transition {
            println!("(waiting for {remaining} more respondent(s) on this question)");
        }
        question = outcome.next_question;
    }

    println!("\nInterview complete. Result:\n");
    let result = service.get_result(&started.session_id).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Canned responses so every variant runs end to end without a network.
fn demo_oracle() -> ScriptedOracle {
    ScriptedOracle::new()
        .with_response(
            "GeneratedQuestion",
            json!({
                "question": "Walk me through a concrete production experience with this topic and the decisions you made.",
                "rationale": "probe for real depth",
            }),
        )
        .with_response(
            "AnswerFeedback",
            json!({
                "key_points": ["hands-on production experience"],
                "mentioned_technologies": [],
                "depth_areas": ["failure handling"],
                "follow_up_direction": "ask how failures were handled",
            }),
        )
        .with_response(
            "TraitAnalysis",
            json!({
                "reasoning": "collaborative and analytical signals",
                "deltas": {
                    "work_style": {"collaborative": 0.7},
                    "problem_solving": {"analytical": 0.6},
                    "learning": {"experimental": 0.5},
                    "stress_response": {"steady": 0.4},
                    "communication": {"logical": 0.5}
                }
            }),
        )
        .with_response(
            "PersonaNarrative",
            json!({
                "dimension_reasons": {},
                "summary": "collaborative, analytical type",
                "team_fit": "teams with open technical debate",
            }),
        )
        .with_response(
            "GeneralAnalysis",
            json!({
                "key_themes": ["ownership"],
                "interests": ["backend systems"],
                "work_style_hints": ["collaborative"],
                "emphasized_experiences": [],
                "technical_keywords": ["Python", "Redis"],
            }),
        )
        .with_response(
            "ExtractedRequirements",
            json!({
                "items": [
                    {"keyword": "Python", "category": "language", "importance": "required", "context_quote": "demo"},
                ]
            }),
        )
        .with_response(
            "ClassificationJudgment",
            json!({
                "conflict_groups": [],
                "final_text": "The team is looking for a Python engineer.",
                "reasoning": "demo",
            }),
        )
}

fn demo_profiles() -> StaticProfileProvider {
    StaticProfileProvider::new()
        .with_profile(
            DEMO_SUBJECT,
            CandidateProfile {
                name: "Demo Candidate".to_string(),
                headline: "backend engineer".to_string(),
                skills: vec![
                    "Redis".to_string(),
                    "Docker".to_string(),
                    "FastAPI".to_string(),
                ],
                ..Default::default()
            },
        )
        .with_prior(
            DEMO_SUBJECT,
            GeneralAnalysis {
                technical_keywords: vec!["Redis".to_string(), "Docker".to_string()],
                ..Default::default()
            },
        )
}
