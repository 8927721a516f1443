use super::setup::DEFAULT_TOPIC_LABEL;
use crate::demo::Demo;
use membank_rs_client::{CreateMemory, GenerateMemories, Retrieve};
use membank_rs_protocol::{Content, MetadataValue, Part, SessionEvent, user_scope};

const CONVERSATION: [(&str, &str); 3] = [
    (
        "user",
        "I prefer Python for data science work. I use pandas every day.",
    ),
    (
        "model",
        "Python with pandas is a solid choice for data analysis.",
    ),
    (
        "user",
        "I also write Rust for performance critical services.",
    ),
];

pub(super) async fn run(demo: &mut Demo) -> anyhow::Result<()> {
    let engine = demo.engine()?.clone();
    let user = demo.user_id.clone();
    let scope = user_scope(&user);

    demo.out.heading("Generate: from a session")?;
    let session = demo.client.create_session(&engine, &user).await?;
    let session_name = session.session_name()?;
    demo.out.line(format!("session {session_name}"))?;
    for (turn, (role, text)) in CONVERSATION.into_iter().enumerate() {
        let content = Content::new(role, vec![Part::text(text)]);
        let event = SessionEvent::new(role, format!("turn-{turn}"), content);
        demo.client.append_event(&session_name, event).await?;
    }
    let events = demo.client.list_events(&session_name).await?;
    demo.out.line(format!("appended {} events", events.len()))?;
    let generated = demo
        .client
        .generate_memories(&engine, GenerateMemories::from_session(&session_name))
        .await?
        .wait()
        .await?;
    super::show_generated(demo, &generated).await?;

    demo.out.heading("Generate: create a fact directly")?;
    let memory = demo
        .client
        .create_memory(
            &engine,
            CreateMemory::new("My favorite editor is VS Code", scope.clone()),
        )
        .await?;
    demo.out.memory(&memory)?;

    demo.out.heading("Generate: retrieve everything for the user")?;
    let retrieved = demo
        .client
        .retrieve_memories(&engine, Retrieve::new(scope.clone()))
        .await?;
    demo.out.retrieved(&retrieved)?;

    demo.out.heading("Generate: direct content with metadata")?;
    let learning = GenerateMemories::from_contents(
        [Content::user_text(
            "I am learning Kubernetes and Terraform for infrastructure programming.",
        )],
        scope.clone(),
    )
    .metadata("category", MetadataValue::string("learning"));
    let generated = demo
        .client
        .generate_memories(&engine, learning)
        .await?
        .wait()
        .await?;
    super::show_generated(demo, &generated).await?;

    demo.out.heading("Generate: custom topic coverage")?;
    let memories: Vec<_> = demo
        .client
        .list_memories(&engine)
        .await?
        .into_iter()
        .filter(|memory| memory.scope == scope)
        .collect();
    let labels: Vec<String> = demo
        .engine_setup
        .custom_topics
        .iter()
        .map(|topic| topic.label.clone())
        .collect();
    let labels = if labels.is_empty() {
        vec![DEFAULT_TOPIC_LABEL.to_string()]
    } else {
        labels
    };
    for label in labels {
        let tagged = memories
            .iter()
            .filter(|memory| memory.has_custom_topic(&label))
            .count();
        demo.out.line(format!("{tagged} memories tagged {label}"))?;
    }

    demo.out.heading("Generate: all memories in the engine")?;
    let memories = demo.client.list_memories(&engine).await?;
    demo.out.memories(&memories)?;
    Ok(())
}
