use crate::demo::Demo;
use anyhow::Context;
use membank_rs_client::{CreateMemory, GenerateMemories, Purge};
use membank_rs_protocol::filter::SystemFilter;
use membank_rs_protocol::{
    Content, GenerateMemoriesResponse, MemoryName, Metadata, MetadataValue, user_scope,
};

const LABEL_KEY: &str = "data_source";
const LABEL_VALUE: &str = "walkthrough";

pub(super) async fn run(demo: &mut Demo) -> anyhow::Result<()> {
    let engine = demo.engine()?.clone();
    let user = demo.scoped_user("lifecycle");
    let scope = user_scope(&user);

    demo.out.heading("Lifecycle: create and inspect revisions")?;
    let memory = demo
        .client
        .create_memory(
            &engine,
            CreateMemory::new("I use Python 3.11 for backend development", scope.clone()),
        )
        .await?;
    let name = memory.memory_name()?;
    demo.out.memory(&memory)?;
    let revisions = demo.client.list_revisions(&name, None).await?;
    demo.out.revisions(&revisions)?;

    demo.out.heading("Lifecycle: generate an update")?;
    let update = GenerateMemories::from_contents(
        [Content::user_text(
            "I upgraded to Python 3.12 for backend development.",
        )],
        scope.clone(),
    );
    let generated = demo
        .client
        .generate_memories(&engine, update)
        .await?
        .wait()
        .await?;
    super::show_generated(demo, &generated).await?;
    let revisions = demo.client.list_revisions(&name, None).await?;
    demo.out.revisions(&revisions)?;

    demo.out.heading("Lifecycle: roll back to the first revision")?;
    let oldest = revisions
        .last()
        .context("memory has no revisions")?
        .revision_id()
        .to_string();
    demo.client.rollback_memory(&name, &oldest).await?;
    let restored = demo.client.get_memory(&name).await?;
    demo.out.memory(&restored)?;
    let revisions = demo.client.list_revisions(&name, None).await?;
    demo.out.revisions(&revisions)?;

    demo.out.heading("Lifecycle: labelled revisions")?;
    let labelled = GenerateMemories::from_contents(
        [Content::user_text(
            "I test my Python backend development with pytest.",
        )],
        scope.clone(),
    )
    .revision_label(LABEL_KEY, LABEL_VALUE)
    .revision_label("batch_id", "batch_001");
    let generated = demo
        .client
        .generate_memories(&engine, labelled)
        .await?
        .wait()
        .await?;
    super::show_generated(demo, &generated).await?;
    let label_filter = SystemFilter::label_eq(LABEL_KEY, LABEL_VALUE);
    for touched in touched_memories(&generated) {
        demo.out.line(format!("revisions of {touched} with {}", label_filter.render()))?;
        let revisions = demo
            .client
            .list_revisions(&touched, Some(&label_filter))
            .await?;
        demo.out.revisions(&revisions)?;
    }

    demo.out.heading("Lifecycle: update metadata")?;
    let metadata = Metadata::from([
        ("reviewed".to_string(), MetadataValue::BoolValue(true)),
        ("owner".to_string(), MetadataValue::string(&user)),
    ]);
    let updated = demo.client.update_memory_metadata(&name, metadata).await?;
    demo.out.memory(&updated)?;

    demo.out.heading("Lifecycle: clean up")?;
    let outcome = demo
        .client
        .purge_memories(
            &engine,
            Purge::matching(SystemFilter::scope_eq("user_id", &user)).force(true),
        )
        .await?;
    demo.out
        .line(format!("purged {} memories", outcome.purge_count))?;
    Ok(())
}

fn touched_memories(response: &GenerateMemoriesResponse) -> Vec<MemoryName> {
    response
        .generated_memories
        .iter()
        .filter_map(|generated| generated.memory.as_ref())
        .filter_map(|memory| memory.memory_name().ok())
        .collect()
}
