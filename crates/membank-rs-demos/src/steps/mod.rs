//! Walkthrough steps, each runnable on its own.

mod delete;
mod generate;
mod lifecycle;
mod multimodal;
mod retrieve;
mod setup;

use crate::demo::Demo;
use clap::Subcommand;
use log::{debug, info};
use membank_rs_protocol::{GenerateMemoriesResponse, GenerationAction};

/// Steps of the walkthrough, in the order `all` runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Step {
    /// Create an agent engine and configure its memory bank
    Setup,
    /// Create and generate memories from sessions and direct content
    Generate,
    /// Retrieve memories by scope, similarity, and filters
    Retrieve,
    /// Generate memories from image and text input
    Multimodal,
    /// Delete single memories and purge by filter
    Delete,
    /// Inspect revisions, roll back, and update metadata
    Lifecycle,
    /// Run every step in order
    All,
}

const WALKTHROUGH: [Step; 5] = [
    Step::Generate,
    Step::Retrieve,
    Step::Multimodal,
    Step::Delete,
    Step::Lifecycle,
];

/// Run `step`. Offline runs create their engine first since the in-process
/// bank starts empty; `all` also does when no engine is configured.
pub async fn run(demo: &mut Demo, step: Step) -> anyhow::Result<()> {
    info!("running demo step (step={step:?}, offline={})", demo.is_offline());
    match step {
        Step::Setup => setup::run(demo).await,
        Step::All => {
            if !demo.has_engine() {
                setup::run(demo).await?;
            }
            for step in WALKTHROUGH {
                run_one(demo, step).await?;
            }
            Ok(())
        }
        step => {
            if demo.is_offline() && !demo.has_engine() {
                setup::run(demo).await?;
            }
            run_one(demo, step).await
        }
    }
}

async fn run_one(demo: &mut Demo, step: Step) -> anyhow::Result<()> {
    match step {
        Step::Generate => generate::run(demo).await,
        Step::Retrieve => retrieve::run(demo).await,
        Step::Multimodal => multimodal::run(demo).await,
        Step::Delete => delete::run(demo).await,
        Step::Lifecycle => lifecycle::run(demo).await,
        Step::Setup | Step::All => Ok(()),
    }
}

/// Narrate a generate response, then fetch every memory it touched so the
/// extracted facts show up. Responses only carry memory names.
async fn show_generated(demo: &mut Demo, response: &GenerateMemoriesResponse) -> anyhow::Result<()> {
    demo.out.generated(response)?;
    for generated in &response.generated_memories {
        if generated.action == GenerationAction::Deleted {
            continue;
        }
        let Some(name) = generated
            .memory
            .as_ref()
            .and_then(|memory| memory.memory_name().ok())
        else {
            continue;
        };
        debug!("fetching generated memory (name={name})");
        match demo.client.get_memory(&name).await {
            Ok(memory) => demo.out.memory(&memory)?,
            Err(err) if err.is_not_found() => demo.out.line(format!("  {name} no longer exists"))?,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}
