use crate::demo::Demo;
use membank_rs_config::ENV_ENGINE;
use membank_rs_protocol::{ContextSpec, CustomTopic, ReasoningEngine, embedding_model_resource};

const DISPLAY_NAME: &str = "membank-demo";
pub(super) const DEFAULT_TOPIC_LABEL: &str = "technical_skills";
const DEFAULT_EMBEDDING_MODEL: &str = "text-multilingual-embedding-002";

fn default_topic() -> CustomTopic {
    CustomTopic::new(
        DEFAULT_TOPIC_LABEL,
        "Programming languages, frameworks, and tools the user knows or is learning.",
    )
}

/// Create an engine, then point its memory bank at the embedding model and
/// custom topics from `engine_setup`.
pub(super) async fn run(demo: &mut Demo) -> anyhow::Result<()> {
    demo.out.heading("Setup: agent engine")?;
    let engine = ReasoningEngine {
        display_name: Some(DISPLAY_NAME.to_string()),
        ..ReasoningEngine::default()
    };
    let created = demo.client.create_engine(&demo.location, engine).await?;
    let name = created.engine_name()?;
    demo.out.line(format!("created engine {name}"))?;

    let model = demo
        .engine_setup
        .embedding_model
        .as_deref()
        .unwrap_or(DEFAULT_EMBEDDING_MODEL);
    let mut builder =
        ContextSpec::builder().embedding_model(embedding_model_resource(&demo.location, model));
    let topics: Vec<CustomTopic> = if demo.engine_setup.custom_topics.is_empty() {
        vec![default_topic()]
    } else {
        demo.engine_setup
            .custom_topics
            .iter()
            .map(|topic| CustomTopic::new(&topic.label, &topic.description))
            .collect()
    };
    for topic in topics {
        demo.out.line(format!("custom topic {}", topic.label))?;
        builder = builder.custom_topic(topic);
    }
    demo.client
        .update_engine_context(&name, builder.build())
        .await?;
    demo.out.line(format!("embedding model {model}"))?;

    if !demo.is_offline() {
        demo.out.line("add this line to .env:")?;
        demo.out.line(format!("{ENV_ENGINE}={name}"))?;
    }
    demo.set_engine(name);
    Ok(())
}
