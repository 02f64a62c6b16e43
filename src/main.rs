//! finder-plan - model selection dry run.
//!
//! Prints the order in which the finder would try models, given the
//! `FINDER_MODELS` override list and the models named on the command line.
//!
//! ```text
//! FINDER_MODELS="acme/fast:low,acme/deep:high" \
//!     finder-plan acme/fast acme/deep other/base --fallback other/base
//! ```

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workspace_finder::agents::SelectionPlan;
use workspace_finder::backend::StaticModelRegistry;
use workspace_finder::provider_health::CooldownReason;
use workspace_finder::{Config, ModelCandidate, UnavailabilityRegistry};

const USAGE: &str = "usage: finder-plan <provider/model>... [--fallback <provider/model>]";

struct Args {
    available: Vec<ModelCandidate>,
    fallback: Option<ModelCandidate>,
}

fn parse_candidate(raw: &str) -> anyhow::Result<ModelCandidate> {
    raw.parse().map_err(anyhow::Error::msg)
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Args> {
    let mut available = Vec::new();
    let mut fallback = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--fallback" => {
                let value = args.next().context(USAGE)?;
                fallback = Some(parse_candidate(&value)?);
            }
            "-h" | "--help" => anyhow::bail!(USAGE),
            _ => available.push(parse_candidate(&arg)?),
        }
    }

    Ok(Args {
        available,
        fallback,
    })
}

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "workspace_finder=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env()?;
    let args = parse_args(std::env::args().skip(1))?;
    info!(
        overrides = config.model_overrides.entries.len(),
        available = args.available.len(),
        "Loaded configuration"
    );

    let registry = StaticModelRegistry::new(args.available);
    // Fresh registry: every handed-out model is cooled down as if it failed.
    let health = UnavailabilityRegistry::new();
    let mut plan = SelectionPlan::new(config.model_overrides, args.fallback);

    let mut attempt = 0;
    while let Some(selection) = plan.next_candidate(&registry, &health).await {
        attempt += 1;
        println!("{}) {}  ({})", attempt, selection.label(), selection.reason);
        health.mark(&selection.candidate, CooldownReason::Error).await;
    }

    if attempt == 0 {
        println!("no candidates");
    }
    println!("then: {}", plan.no_candidate_message());
    Ok(())
}
