//! Offline walkthrough runs.

use membank_rs_config::MembankConfig;
use membank_rs_demos::{Demo, Narrator, Step, run};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().expect("lock").clone()).expect("utf8")
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn offline_demo() -> (Demo, Captured) {
    let captured = Captured::default();
    let demo = Demo::offline(
        &MembankConfig::default(),
        Narrator::new(Box::new(captured.clone())),
    );
    (demo, captured)
}

/// Every step completes against the in-process bank.
#[tokio::test]
async fn all_steps_run_offline() {
    let (mut demo, captured) = offline_demo();
    run(&mut demo, Step::All).await.expect("walkthrough");

    let text = captured.text();
    assert!(text.contains("== Setup: agent engine =="));
    assert!(text.contains("demo-user-stranger sees 0 memories"));
    assert!(text.contains("deleted memory is gone"));
    assert!(text.contains("dry run: 3 memories would be purged"));
    assert!(text.contains("purged 3 memories"));
    assert!(text.contains("1 memories tagged technical_skills"));
    assert!(!text.contains("AGENT_ENGINE_NAME="));
    assert!(text.contains("== Retrieve: topics.managed_memory_topic: USER_PREFERENCES =="));
    assert!(text.contains("== Retrieve: topics.custom_memory_topic_label: technical_skills =="));
}

/// The isolation check uses a user that differs from the configured one.
#[tokio::test]
async fn isolation_user_differs_from_configured_user() {
    let captured = Captured::default();
    let mut config = MembankConfig::default();
    config.demo.user_id = "user-999".to_string();
    let mut demo = Demo::offline(&config, Narrator::new(Box::new(captured.clone())));
    run(&mut demo, Step::Retrieve).await.expect("retrieve");

    let text = captured.text();
    assert!(text.contains("user-999-stranger sees 0 memories"));
}

/// A single offline step provisions its own engine first.
#[tokio::test]
async fn single_step_creates_engine_offline() {
    let (mut demo, captured) = offline_demo();
    assert!(!demo.has_engine());
    run(&mut demo, Step::Lifecycle).await.expect("lifecycle");

    assert!(demo.has_engine());
    let text = captured.text();
    assert!(text.contains("== Lifecycle: roll back to the first revision =="));
    assert!(text.contains("label data_source=walkthrough"));
    // Generated memories are fetched, so the merged fact is printed as a memory.
    assert!(text.contains(
        "  - I use Python 3.11 for backend development; I upgraded to Python 3.12 for backend development\n    name: "
    ));
    // Revisions are listed again after the rollback.
    assert!(text.contains("  3 revisions (newest first)"));
}

/// Setup alone reports the configured topic and embedding model.
#[tokio::test]
async fn setup_reports_context() {
    let (mut demo, captured) = offline_demo();
    run(&mut demo, Step::Setup).await.expect("setup");

    let text = captured.text();
    assert!(text.contains("custom topic technical_skills"));
    assert!(text.contains("embedding model text-multilingual-embedding-002"));
    assert!(demo.engine().is_ok());
}
