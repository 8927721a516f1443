//! Client behaviour against the in-process memory bank.

use membank_rs_client::{
    CreateMemory, GenerateMemories, MemoryBankClient, MemoryBankError, Purge, Retrieve,
};
use membank_rs_protocol::filter::{FilterGroup, MetadataCondition, SystemFilter};
use membank_rs_protocol::{
    Content, ContextSpec, CustomTopic, EngineName, GenerateMemoriesResponse, GenerationAction,
    LocationName, ManagedTopic, MemoryTopic, Metadata, MetadataValue, SessionEvent, user_scope,
};
use chrono::{Duration as ChronoDuration, Utc};
use membank_rs_test_utils::InMemoryBank;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn setup() -> (Arc<InMemoryBank>, MemoryBankClient, EngineName) {
    let bank = Arc::new(InMemoryBank::new());
    let engine = bank.seed_engine(&LocationName::new("test-project", "us-central1"));
    let client = MemoryBankClient::new(bank.clone());
    (bank, client, engine)
}

async fn generate(
    client: &MemoryBankClient,
    engine: &EngineName,
    request: GenerateMemories,
) -> GenerateMemoriesResponse {
    client
        .generate_memories(engine, request)
        .await
        .expect("start generate")
        .wait()
        .await
        .expect("generate")
}

/// A created memory keeps its fact verbatim and starts with one revision.
#[tokio::test]
async fn create_then_get_returns_exact_fact() {
    let (_bank, client, engine) = setup();
    let fact = "Prefers   tabs over spaces, always.";
    let created = client
        .create_memory(&engine, CreateMemory::new(fact, user_scope("u1")))
        .await
        .expect("create");

    let name = created.memory_name().expect("name");
    let fetched = client.get_memory(&name).await.expect("get");
    assert_eq!(fetched.fact, fact);
    assert_eq!(fetched.scope, user_scope("u1"));

    let revisions = client.list_revisions(&name, None).await.expect("revisions");
    assert_eq!(revisions.len(), 1);
    assert_eq!(revisions[0].fact, fact);
}

/// Retrieval only returns memories whose scope matches exactly.
#[tokio::test]
async fn retrieval_is_scope_isolated() {
    let (_bank, client, engine) = setup();
    client
        .create_memory(&engine, CreateMemory::new("Lives in Lisbon", user_scope("u1")))
        .await
        .expect("create u1");
    client
        .create_memory(&engine, CreateMemory::new("Lives in Oslo", user_scope("u2")))
        .await
        .expect("create u2");
    let mut wider = user_scope("u1");
    wider.insert("agent".to_string(), "travel".to_string());
    client
        .create_memory(&engine, CreateMemory::new("Books window seats", wider))
        .await
        .expect("create u1+agent");

    let retrieved = client
        .retrieve_memories(&engine, Retrieve::new(user_scope("u1")))
        .await
        .expect("retrieve");
    let facts: Vec<&str> = retrieved
        .iter()
        .map(|item| item.memory.fact.as_str())
        .collect();
    assert_eq!(facts, vec!["Lives in Lisbon"]);
    assert_eq!(client.list_memories(&engine).await.expect("list").len(), 3);
}

/// A dry-run purge only counts; a forced purge deletes that many.
#[tokio::test]
async fn purge_dry_run_then_force() {
    let (_bank, client, engine) = setup();
    for (fact, batch) in [
        ("Fact one", "b1"),
        ("Fact two", "b1"),
        ("Fact three", "b1"),
        ("Fact four", "b2"),
    ] {
        client
            .create_memory(
                &engine,
                CreateMemory::new(fact, user_scope("u1"))
                    .metadata("batch_id", MetadataValue::string(batch)),
            )
            .await
            .expect("create");
    }
    let selection = || {
        Purge::matching_groups([FilterGroup::all([MetadataCondition::eq(
            "batch_id",
            MetadataValue::string("b1"),
        )])])
    };

    let dry_run = client
        .purge_memories(&engine, selection())
        .await
        .expect("dry run");
    assert_eq!(dry_run.purge_count, 3);
    assert!(!dry_run.executed);
    assert_eq!(client.list_memories(&engine).await.expect("list").len(), 4);

    let forced = client
        .purge_memories(&engine, selection().force(true))
        .await
        .expect("purge");
    assert_eq!(forced.purge_count, dry_run.purge_count);
    assert!(forced.executed);
    let remaining = client.list_memories(&engine).await.expect("list");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].fact, "Fact four");
}

/// Purging requires a selection and fails before reaching the service.
#[tokio::test]
async fn purge_without_selection_is_rejected_locally() {
    let (bank, client, engine) = setup();
    let result = client
        .purge_memories(&engine, Purge::default().force(true))
        .await;
    assert!(matches!(result, Err(MemoryBankError::InvalidRequest(_))));
    assert_eq!(bank.call_count(), 0);
}

/// Selections that would match every memory are refused, and nothing is deleted.
#[tokio::test]
async fn purge_of_everything_is_rejected_locally() {
    let (bank, client, engine) = setup();
    for user in ["u1", "u2"] {
        client
            .create_memory(&engine, CreateMemory::new("Keeps bees", user_scope(user)))
            .await
            .expect("create");
    }
    let calls = bank.call_count();

    for selection in [
        Purge::matching_groups([FilterGroup::default()]),
        Purge::matching(SystemFilter::And(Vec::new())),
    ] {
        let result = client
            .purge_memories(&engine, selection.force(true))
            .await;
        assert!(matches!(result, Err(MemoryBankError::InvalidRequest(_))));
    }
    assert_eq!(bank.call_count(), calls);
    assert_eq!(client.list_memories(&engine).await.expect("list").len(), 2);
}

/// Deleted memories are gone but their history stays readable.
#[tokio::test]
async fn delete_keeps_revision_history() {
    let (_bank, client, engine) = setup();
    let created = client
        .create_memory(&engine, CreateMemory::new("Owns a cat", user_scope("u1")))
        .await
        .expect("create");
    let name = created.memory_name().expect("name");

    client.delete_memory(&name).await.expect("delete");

    let err = client.get_memory(&name).await.unwrap_err();
    assert!(err.is_not_found());
    let revisions = client.list_revisions(&name, None).await.expect("revisions");
    assert_eq!(revisions.len(), 2);
    assert!(revisions[0].is_deletion());
    assert_eq!(revisions[1].fact, "Owns a cat");
    assert!(revisions[1].expire_time <= revisions[0].expire_time);
}

/// Consolidation merges into the existing memory and records the prior revision.
#[tokio::test]
async fn generation_merges_related_facts() {
    let (_bank, client, engine) = setup();
    let first = generate(
        &client,
        &engine,
        GenerateMemories::from_contents([Content::user_text("I like Python.")], user_scope("u1")),
    )
    .await;
    assert_eq!(first.generated_memories.len(), 1);
    assert_eq!(
        first.generated_memories[0].action,
        GenerationAction::Created
    );

    let second = generate(
        &client,
        &engine,
        GenerateMemories::from_contents(
            [Content::user_text("I use Python for data science.")],
            user_scope("u1"),
        )
        .revision_label("data_source", "merge-demo"),
    )
    .await;
    let updated = &second.generated_memories[0];
    assert_eq!(updated.action, GenerationAction::Updated);
    assert!(updated.previous_revision.is_some());

    let name = updated
        .memory
        .as_ref()
        .expect("memory")
        .memory_name()
        .expect("name");
    let revisions = client.list_revisions(&name, None).await.expect("revisions");
    assert_eq!(revisions.len(), 2);
    assert_eq!(
        updated.previous_revision.as_deref(),
        Some(revisions[1].name.as_str())
    );
    assert_eq!(revisions[0].extracted_memories.len(), 1);

    let labelled = client
        .list_revisions(&name, Some(&SystemFilter::label_eq("data_source", "merge-demo")))
        .await
        .expect("labelled revisions");
    assert_eq!(labelled.len(), 1);
    assert_eq!(labelled[0].name, revisions[0].name);
}

/// Without consolidation every candidate becomes its own memory.
#[tokio::test]
async fn disabled_consolidation_creates_new_memories() {
    let (_bank, client, engine) = setup();
    let contents = [Content::user_text(
        "I like Python. I use Python for data science.",
    )];
    let response = generate(
        &client,
        &engine,
        GenerateMemories::from_contents(contents, user_scope("u1")).disable_consolidation(),
    )
    .await;
    assert!(
        response
            .generated_memories
            .iter()
            .all(|memory| memory.action == GenerationAction::Created)
    );
    assert_eq!(client.list_memories(&engine).await.expect("list").len(), 2);
}

/// Rolling back restores the old fact and appends a revision.
#[tokio::test]
async fn rollback_restores_fact() {
    let (_bank, client, engine) = setup();
    let created = client
        .create_memory(&engine, CreateMemory::new("I like Python", user_scope("u1")))
        .await
        .expect("create");
    let name = created.memory_name().expect("name");
    generate(
        &client,
        &engine,
        GenerateMemories::from_contents(
            [Content::user_text("I use Python daily")],
            user_scope("u1"),
        ),
    )
    .await;
    let before = client.list_revisions(&name, None).await.expect("revisions");
    assert_eq!(before.len(), 2);
    assert_ne!(
        client.get_memory(&name).await.expect("get").fact,
        "I like Python"
    );

    let original = before.last().expect("original revision");
    client
        .rollback_memory(&name, original.revision_id())
        .await
        .expect("rollback");

    assert_eq!(
        client.get_memory(&name).await.expect("get").fact,
        "I like Python"
    );
    let after = client.list_revisions(&name, None).await.expect("revisions");
    assert_eq!(after.len(), before.len() + 1);
    assert_eq!(after[0].fact, "I like Python");
}

/// A single revision can be fetched by name; unknown ids are not found.
#[tokio::test]
async fn get_revision_returns_recorded_snapshot() {
    let (_bank, client, engine) = setup();
    let created = client
        .create_memory(&engine, CreateMemory::new("Speaks Norwegian", user_scope("u1")))
        .await
        .expect("create");
    let name = created.memory_name().expect("name");
    let listed = client.list_revisions(&name, None).await.expect("revisions");
    let first = &listed[0];

    let fetched = client
        .get_revision(&name.revision(first.revision_id()))
        .await
        .expect("get revision");
    assert_eq!(&fetched, first);
    assert_eq!(fetched.fact, "Speaks Norwegian");

    let err = client
        .get_revision(&name.revision("missing"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

/// Similarity results are ordered by distance and capped at top_k.
#[tokio::test]
async fn similarity_search_is_ranked_and_bounded() {
    let (_bank, client, engine) = setup();
    for fact in [
        "Writes Python for data pipelines",
        "Uses Rust for systems work",
        "Favorite editor is Helix",
        "Learning Python type hints",
    ] {
        client
            .create_memory(&engine, CreateMemory::new(fact, user_scope("u1")))
            .await
            .expect("create");
    }

    let results = client
        .retrieve_memories(
            &engine,
            Retrieve::new(user_scope("u1")).similar_to("Python", 3),
        )
        .await
        .expect("retrieve");
    assert_eq!(results.len(), 3);
    let distances: Vec<f64> = results
        .iter()
        .map(|item| item.distance.expect("distance"))
        .collect();
    assert!(distances.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(results[0].memory.fact.contains("Python"));
    assert!(results[1].memory.fact.contains("Python"));

    let zero = client
        .retrieve_memories(
            &engine,
            Retrieve::new(user_scope("u1")).similar_to("Python", 0),
        )
        .await;
    assert!(matches!(zero, Err(MemoryBankError::InvalidRequest(_))));
}

/// System filters and metadata groups both narrow retrieval.
#[tokio::test]
async fn filters_combine_with_and() {
    let (_bank, client, engine) = setup();
    client
        .create_memory(
            &engine,
            CreateMemory::new("Prefers Python for scripting", user_scope("u1"))
                .topic(MemoryTopic::Managed(ManagedTopic::UserPreferences))
                .metadata("category", MetadataValue::string("learning")),
        )
        .await
        .expect("create");
    let later = client
        .create_memory(
            &engine,
            CreateMemory::new("Studies Python async", user_scope("u1"))
                .metadata("category", MetadataValue::string("learning")),
        )
        .await
        .expect("create");
    client
        .create_memory(
            &engine,
            CreateMemory::new("Studies Go generics", user_scope("u1"))
                .metadata("category", MetadataValue::string("work")),
        )
        .await
        .expect("create");

    let fetch = |retrieve: Retrieve| {
        let client = client.clone();
        let engine = engine.clone();
        async move {
            client
                .retrieve_memories(&engine, retrieve)
                .await
                .expect("retrieve")
                .into_iter()
                .map(|item| item.memory.fact)
                .collect::<Vec<_>>()
        }
    };

    assert_eq!(
        fetch(
            Retrieve::new(user_scope("u1")).filter(SystemFilter::fact_contains("Python"))
        )
        .await,
        vec!["Prefers Python for scripting", "Studies Python async"]
    );
    assert_eq!(
        fetch(
            Retrieve::new(user_scope("u1"))
                .filter(SystemFilter::has_managed_topic(ManagedTopic::UserPreferences))
        )
        .await,
        vec!["Prefers Python for scripting"]
    );
    let created = later.create_time.expect("create time");
    assert_eq!(
        fetch(
            Retrieve::new(user_scope("u1"))
                .filter(SystemFilter::created_at_or_after(created))
                .filter_groups([FilterGroup::all([MetadataCondition::eq(
                    "category",
                    MetadataValue::string("learning"),
                )])])
        )
        .await,
        vec!["Studies Python async"]
    );
}

/// Metadata updates leave the fact and its history untouched.
#[tokio::test]
async fn metadata_update_does_not_touch_fact() {
    let (_bank, client, engine) = setup();
    let created = client
        .create_memory(
            &engine,
            CreateMemory::new("Runs on Tuesdays", user_scope("u1"))
                .metadata("status", MetadataValue::string("draft")),
        )
        .await
        .expect("create");
    let name = created.memory_name().expect("name");

    let metadata = Metadata::from([
        ("status".to_string(), MetadataValue::string("reviewed")),
        ("score".to_string(), MetadataValue::DoubleValue(0.9)),
    ]);
    let updated = client
        .update_memory_metadata(&name, metadata.clone())
        .await
        .expect("update");

    assert_eq!(updated.fact, "Runs on Tuesdays");
    assert_eq!(updated.metadata, metadata);
    assert_eq!(
        client
            .list_revisions(&name, None)
            .await
            .expect("revisions")
            .len(),
        1
    );
}

/// Session sources derive the scope from the session's user.
#[tokio::test]
async fn generates_from_session_events() {
    let (_bank, client, engine) = setup();
    let session = client
        .create_session(&engine, "session-user")
        .await
        .expect("session");
    let session_name = session.session_name().expect("session name");
    for (idx, text) in ["My name is Ada.", "I work on compilers."].iter().enumerate() {
        client
            .append_event(
                &session_name,
                SessionEvent::new("user", format!("turn-{idx}"), Content::user_text(*text)),
            )
            .await
            .expect("append");
    }
    assert_eq!(
        client
            .list_events(&session_name)
            .await
            .expect("events")
            .len(),
        2
    );

    let response = generate(&client, &engine, GenerateMemories::from_session(&session_name)).await;
    assert_eq!(response.generated_memories.len(), 2);
    let memories = client
        .retrieve_memories(&engine, Retrieve::new(user_scope("session-user")))
        .await
        .expect("retrieve");
    assert_eq!(memories.len(), 2);
    assert!(
        memories
            .iter()
            .all(|item| item.memory.has_managed_topic(ManagedTopic::UserPersonalInfo))
    );
}

/// A time range only feeds events stamped within `[start, end)` to generation.
#[tokio::test]
async fn session_time_range_skips_outside_events() {
    let (_bank, client, engine) = setup();
    let session = client
        .create_session(&engine, "ranged-user")
        .await
        .expect("session");
    let session_name = session.session_name().expect("session name");
    let start = Utc::now() - ChronoDuration::hours(2);
    let end = start + ChronoDuration::hours(1);
    let stamped = [
        ("I used to live in Oslo.", start - ChronoDuration::minutes(5)),
        ("I moved to Lisbon.", start + ChronoDuration::minutes(10)),
        ("I now work remotely.", end),
    ];
    for (idx, (text, timestamp)) in stamped.into_iter().enumerate() {
        let mut event = SessionEvent::new("user", format!("turn-{idx}"), Content::user_text(text));
        event.timestamp = timestamp;
        client
            .append_event(&session_name, event)
            .await
            .expect("append");
    }

    let response = generate(
        &client,
        &engine,
        GenerateMemories::from_session(&session_name).time_range(Some(start), Some(end)),
    )
    .await;
    assert_eq!(response.generated_memories.len(), 1);
    let memories = client
        .retrieve_memories(&engine, Retrieve::new(user_scope("ranged-user")))
        .await
        .expect("retrieve");
    assert_eq!(memories.len(), 1);
    assert!(memories[0].memory.fact.contains("Lisbon"));
}

/// A time range that ends before it starts never reaches the service.
#[tokio::test]
async fn inverted_time_range_is_rejected_locally() {
    let (bank, client, engine) = setup();
    let session_name = engine.session("s1");
    let end = Utc::now();
    let start = end + ChronoDuration::minutes(1);
    let result = client
        .generate_memories(
            &engine,
            GenerateMemories::from_session(&session_name).time_range(Some(start), Some(end)),
        )
        .await;
    assert!(matches!(result, Err(MemoryBankError::InvalidRequest(_))));
    assert_eq!(bank.call_count(), 0);
}

/// Events need an author and an invocation id.
#[tokio::test]
async fn rejects_incomplete_events() {
    let (bank, client, engine) = setup();
    let session_name = engine.session("s1");
    let event = SessionEvent::new("", "turn-1", Content::user_text("hi"));
    let result = client.append_event(&session_name, event).await;
    assert!(matches!(result, Err(MemoryBankError::InvalidRequest(_))));
    assert_eq!(bank.call_count(), 0);
}

/// Custom topics configured on the engine tag generated memories.
#[tokio::test]
async fn engine_context_drives_custom_topics() {
    let (_bank, client, engine) = setup();
    let spec = ContextSpec::builder()
        .custom_topic(CustomTopic::new(
            "technical_skills",
            "Programming languages, frameworks and tools",
        ))
        .build();
    let updated = client
        .update_engine_context(&engine, spec.clone())
        .await
        .expect("update context");
    assert_eq!(updated.context_spec, Some(spec));

    generate(
        &client,
        &engine,
        GenerateMemories::from_contents(
            [Content::user_text("I know several programming languages")],
            user_scope("u1"),
        ),
    )
    .await;
    let tagged = client
        .retrieve_memories(
            &engine,
            Retrieve::new(user_scope("u1"))
                .filter(SystemFilter::has_custom_topic("technical_skills")),
        )
        .await
        .expect("retrieve");
    assert_eq!(tagged.len(), 1);
}

/// Listing follows page tokens until the last page.
#[tokio::test]
async fn list_collects_every_page() {
    let (_bank, client, engine) = setup();
    for idx in 0..130 {
        client
            .create_memory(
                &engine,
                CreateMemory::new(format!("Fact number {idx}"), user_scope("u1")),
            )
            .await
            .expect("create");
    }
    assert_eq!(client.list_memories(&engine).await.expect("list").len(), 130);
    assert_eq!(
        client
            .retrieve_memories(&engine, Retrieve::new(user_scope("u1")))
            .await
            .expect("retrieve")
            .len(),
        130
    );
}

/// Unknown memories surface as NotFound.
#[tokio::test]
async fn missing_memory_is_not_found() {
    let (_bank, client, engine) = setup();
    let err = client
        .get_memory(&engine.memory("does-not-exist"))
        .await
        .unwrap_err();
    assert!(matches!(err, MemoryBankError::NotFound(_)));
}

/// Forget requests delete matching memories in the same scope only.
#[tokio::test]
async fn forget_request_deletes_matching_memories() {
    let (_bank, client, engine) = setup();
    for user in ["u1", "u2"] {
        client
            .create_memory(
                &engine,
                CreateMemory::new("Allergic to peanuts", user_scope(user)),
            )
            .await
            .expect("create");
    }
    let response = generate(
        &client,
        &engine,
        GenerateMemories::from_contents(
            [Content::user_text("Forget about my peanuts allergy.")],
            user_scope("u1"),
        ),
    )
    .await;
    assert_eq!(
        response.generated_memories[0].action,
        GenerationAction::Deleted
    );
    let remaining = client.list_memories(&engine).await.expect("list");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].scope, user_scope("u2"));
}
