use crate::demo::Demo;
use anyhow::Context;
use log::{debug, info};
use membank_rs_client::{GenerateMemories, Purge, Retrieve};
use membank_rs_protocol::filter::SystemFilter;
use membank_rs_protocol::{Content, Part, SessionEvent, user_scope};
use std::io::Write;
use tempfile::NamedTempFile;

const IMAGE_URI: &str = "gs://cloud-samples-data/generative-ai/image/scones.jpg";
const IMAGE_URL: &str =
    "https://storage.googleapis.com/cloud-samples-data/generative-ai/image/scones.jpg";
const IMAGE_MIME: &str = "image/jpeg";
/// JPEG start and end markers; enough for the in-process bank.
const PLACEHOLDER_JPEG: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xD9];

pub(super) async fn run(demo: &mut Demo) -> anyhow::Result<()> {
    let engine = demo.engine()?.clone();
    let user = demo.scoped_user("multimodal");
    let scope = user_scope(&user);

    demo.out.heading("Multimodal: image by URI")?;
    let by_uri = Content::new(
        "user",
        vec![
            Part::text("I baked these blueberry scones this morning. Baking is my weekend hobby."),
            Part::file(IMAGE_URI, IMAGE_MIME),
        ],
    );
    let generated = demo
        .client
        .generate_memories(&engine, GenerateMemories::from_contents([by_uri], scope.clone()))
        .await?
        .wait()
        .await?;
    super::show_generated(demo, &generated).await?;

    demo.out.heading("Multimodal: inline image bytes")?;
    let image = download_image(demo.is_offline()).await?;
    let bytes = std::fs::read(image.path()).context("failed to read downloaded image")?;
    demo.out
        .line(format!("image staged at {} ({} bytes)", image.path().display(), bytes.len()))?;
    let inline = Content::new(
        "user",
        vec![
            Part::text("My favorite pastry is a scone with clotted cream."),
            Part::inline(IMAGE_MIME, bytes.clone()),
        ],
    );
    let generated = demo
        .client
        .generate_memories(&engine, GenerateMemories::from_contents([inline], scope.clone()))
        .await?
        .wait()
        .await?;
    super::show_generated(demo, &generated).await?;

    demo.out.heading("Multimodal: image in a session event")?;
    let session = demo.client.create_session(&engine, &user).await?;
    let session_name = session.session_name()?;
    let event = SessionEvent::new(
        "user",
        "turn-0",
        Content::new(
            "user",
            vec![
                Part::text("I run a small bakery on weekends."),
                Part::inline(IMAGE_MIME, bytes),
            ],
        ),
    );
    demo.client.append_event(&session_name, event).await?;
    let generated = demo
        .client
        .generate_memories(&engine, GenerateMemories::from_session(&session_name))
        .await?
        .wait()
        .await?;
    super::show_generated(demo, &generated).await?;

    demo.out.heading("Multimodal: what was remembered")?;
    let retrieved = demo
        .client
        .retrieve_memories(&engine, Retrieve::new(scope))
        .await?;
    demo.out.retrieved(&retrieved)?;

    demo.out.heading("Multimodal: clean up")?;
    let outcome = demo
        .client
        .purge_memories(
            &engine,
            Purge::matching(SystemFilter::scope_eq("user_id", &user)).force(true),
        )
        .await?;
    demo.out
        .line(format!("purged {} memories", outcome.purge_count))?;
    debug!("removing staged image (path={})", image.path().display());
    image.close().context("failed to remove staged image")?;
    Ok(())
}

/// Stage the sample image in a temp file. Offline runs write a placeholder
/// instead of touching the network.
async fn download_image(offline: bool) -> anyhow::Result<NamedTempFile> {
    let bytes = if offline {
        PLACEHOLDER_JPEG.to_vec()
    } else {
        info!("downloading sample image (url={IMAGE_URL})");
        reqwest::get(IMAGE_URL)
            .await
            .context("failed to download sample image")?
            .error_for_status()
            .context("sample image request failed")?
            .bytes()
            .await
            .context("failed to read sample image")?
            .to_vec()
    };
    let mut file = tempfile::Builder::new()
        .prefix("membank-demo-")
        .suffix(".jpg")
        .tempfile()
        .context("failed to create temp file")?;
    file.write_all(&bytes)
        .context("failed to write sample image")?;
    Ok(file)
}
