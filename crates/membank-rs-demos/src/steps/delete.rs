use crate::demo::Demo;
use log::warn;
use membank_rs_client::{CreateMemory, GenerateMemories, MemoryBankError, Purge, Retrieve};
use membank_rs_protocol::filter::{FilterGroup, MetadataCondition, SystemFilter};
use membank_rs_protocol::{Content, Memory, MemoryName, MetadataValue, user_scope};

const DISPOSABLE: [&str; 3] = [
    "Temporary note about the staging cluster",
    "Temporary note about the release checklist",
    "Temporary note about the on-call rotation",
];

pub(super) async fn run(demo: &mut Demo) -> anyhow::Result<()> {
    let engine = demo.engine()?.clone();
    let user = demo.scoped_user("delete");
    let scope = user_scope(&user);

    demo.out.heading("Delete: a single memory")?;
    let memory = demo
        .client
        .create_memory(
            &engine,
            CreateMemory::new("My desk is next to the window", scope.clone()),
        )
        .await?;
    let name = memory.memory_name()?;
    demo.out.memory(&memory)?;
    demo.client.delete_memory(&name).await?;
    let lookup = demo.client.get_memory(&name).await;
    if let Err(err) = &lookup
        && !err.is_not_found()
    {
        warn!("lookup after delete failed (name={name}, err={err})");
    }
    demo.out.line(after_delete(&name, &lookup))?;

    demo.out.heading("Delete: purge by metadata")?;
    for fact in DISPOSABLE {
        demo.client
            .create_memory(
                &engine,
                CreateMemory::new(fact, scope.clone())
                    .metadata("for_purge", MetadataValue::string("yes")),
            )
            .await?;
    }
    let selection = Purge::matching(SystemFilter::scope_eq("user_id", &user)).and_groups([
        FilterGroup::all([MetadataCondition::eq(
            "for_purge",
            MetadataValue::string("yes"),
        )]),
    ]);
    let dry_run = demo
        .client
        .purge_memories(&engine, selection.clone())
        .await?;
    demo.out.line(format!(
        "dry run: {} memories would be purged",
        dry_run.purge_count
    ))?;
    let purged = demo
        .client
        .purge_memories(&engine, selection.force(true))
        .await?;
    demo.out
        .line(format!("purged {} memories", purged.purge_count))?;

    demo.out.heading("Delete: ask to forget")?;
    let food = demo
        .client
        .create_memory(
            &engine,
            CreateMemory::new("My favorite food is sushi", scope.clone()),
        )
        .await?;
    demo.out.memory(&food)?;
    let forget = GenerateMemories::from_contents(
        [Content::user_text("Forget my favorite food preference.")],
        scope.clone(),
    );
    let generated = demo
        .client
        .generate_memories(&engine, forget)
        .await?
        .wait()
        .await?;
    super::show_generated(demo, &generated).await?;
    demo.out
        .line("whether the service deletes the fact is up to its extraction model")?;

    demo.out.heading("Delete: remaining memories")?;
    let remaining = demo
        .client
        .retrieve_memories(&engine, Retrieve::new(scope))
        .await?;
    demo.out.retrieved(&remaining)?;
    Ok(())
}

/// What a lookup right after a delete says. The walkthrough carries on
/// either way.
fn after_delete(name: &MemoryName, lookup: &Result<Memory, MemoryBankError>) -> String {
    match lookup {
        Err(err) if err.is_not_found() => "deleted memory is gone".to_string(),
        Err(err) => format!("could not check deleted memory: {err}"),
        Ok(_) => format!("memory {name} still exists after delete"),
    }
}
