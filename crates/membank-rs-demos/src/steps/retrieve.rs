use super::setup::DEFAULT_TOPIC_LABEL;
use crate::demo::Demo;
use chrono::{TimeDelta, Utc};
use membank_rs_client::Retrieve;
use membank_rs_protocol::filter::{FilterGroup, MetadataCondition, SystemFilter};
use membank_rs_protocol::{ManagedTopic, MetadataValue, PageRequest, user_scope};

const QUERIES: [&str; 2] = [
    "Which programming languages do I use?",
    "Which editor is my favorite?",
];
const TOP_K: u32 = 2;

fn category(value: &str) -> FilterGroup {
    FilterGroup::all([MetadataCondition::eq(
        "category",
        MetadataValue::string(value),
    )])
}

pub(super) async fn run(demo: &mut Demo) -> anyhow::Result<()> {
    let engine = demo.engine()?.clone();
    let scope = user_scope(&demo.user_id);

    demo.out.heading("Retrieve: every memory in scope")?;
    let all = demo
        .client
        .retrieve_memories(&engine, Retrieve::new(scope.clone()))
        .await?;
    demo.out.retrieved(&all)?;

    for query in QUERIES {
        demo.out
            .heading(&format!("Retrieve: top {TOP_K} similar to {query:?}"))?;
        let ranked = demo
            .client
            .retrieve_memories(&engine, Retrieve::new(scope.clone()).similar_to(query, TOP_K))
            .await?;
        demo.out.retrieved(&ranked)?;
    }

    demo.out.heading("Retrieve: scope isolation")?;
    let other_user = demo.scoped_user("stranger");
    let stranger = demo
        .client
        .retrieve_memories(&engine, Retrieve::new(user_scope(&other_user)))
        .await?;
    demo.out
        .line(format!("{other_user} sees {} memories", stranger.len()))?;

    if let Some(first) = all.first() {
        demo.out.heading("Retrieve: get by name")?;
        let memory = demo.client.get_memory(&first.memory.memory_name()?).await?;
        demo.out.memory(&memory)?;
    }

    demo.out.heading("Retrieve: first page of the engine")?;
    let page = demo
        .client
        .list_memories_page(
            &engine,
            &PageRequest {
                page_size: Some(5),
                ..PageRequest::default()
            },
        )
        .await?;
    demo.out.line(format!(
        "{} memories on the page, more={}",
        page.memories.len(),
        !page.next_page_token.is_empty()
    ))?;

    demo.out.heading("Retrieve: metadata category=learning")?;
    let learning = demo
        .client
        .retrieve_memories(
            &engine,
            Retrieve::new(scope.clone()).filter_groups([category("learning")]),
        )
        .await?;
    demo.out.retrieved(&learning)?;

    demo.out.heading("Retrieve: metadata category=nonexistent")?;
    let none = demo
        .client
        .retrieve_memories(
            &engine,
            Retrieve::new(scope.clone()).filter_groups([category("nonexistent")]),
        )
        .await?;
    demo.out.retrieved(&none)?;

    let python = SystemFilter::fact_matches(".*Python.*")?;
    demo.out
        .heading(&format!("Retrieve: {}", python.render()))?;
    let matched = demo
        .client
        .retrieve_memories(&engine, Retrieve::new(scope.clone()).filter(python.clone()))
        .await?;
    demo.out.retrieved(&matched)?;

    let recent = SystemFilter::created_at_or_after(Utc::now() - TimeDelta::days(1));
    demo.out
        .heading(&format!("Retrieve: {}", recent.render()))?;
    let fresh = demo
        .client
        .retrieve_memories(&engine, Retrieve::new(scope.clone()).filter(recent.clone()))
        .await?;
    demo.out.retrieved(&fresh)?;

    demo.out
        .heading("Retrieve: Python facts from the last day tagged learning")?;
    let combined = demo
        .client
        .retrieve_memories(
            &engine,
            Retrieve::new(scope.clone())
                .filter(python.and(recent))
                .filter_groups([category("learning")]),
        )
        .await?;
    demo.out.retrieved(&combined)?;

    let label = demo
        .engine_setup
        .custom_topics
        .first()
        .map(|topic| topic.label.clone())
        .unwrap_or_else(|| DEFAULT_TOPIC_LABEL.to_string());
    for topic in [
        SystemFilter::has_managed_topic(ManagedTopic::UserPreferences),
        SystemFilter::has_custom_topic(label),
    ] {
        demo.out
            .heading(&format!("Retrieve: {}", topic.render()))?;
        let tagged = demo
            .client
            .retrieve_memories(&engine, Retrieve::new(scope.clone()).filter(topic))
            .await?;
        demo.out.retrieved(&tagged)?;
    }
    Ok(())
}
