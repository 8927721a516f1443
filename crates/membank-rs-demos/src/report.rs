//! Narration printed while the walkthrough runs.

use membank_rs_protocol::{
    GenerateMemoriesResponse, Memory, MemoryRevision, MemoryTopic, RetrievedMemory,
};
use std::io::{self, Write};

/// Line-oriented writer for step output.
pub struct Narrator {
    out: Box<dyn Write>,
}

impl Narrator {
    pub fn new(out: Box<dyn Write>) -> Self {
        Self { out }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    pub fn heading(&mut self, title: &str) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "== {title} ==")
    }

    pub fn line(&mut self, text: impl AsRef<str>) -> io::Result<()> {
        writeln!(self.out, "{}", text.as_ref())
    }

    pub fn memory(&mut self, memory: &Memory) -> io::Result<()> {
        writeln!(self.out, "  - {}", memory.fact)?;
        writeln!(self.out, "    name: {}", memory.name)?;
        if !memory.topics.is_empty() {
            writeln!(self.out, "    topics: {}", topic_list(&memory.topics))?;
        }
        for (key, value) in &memory.metadata {
            writeln!(self.out, "    metadata.{key}: {value}")?;
        }
        Ok(())
    }

    pub fn memories(&mut self, memories: &[Memory]) -> io::Result<()> {
        writeln!(self.out, "  {} memories", memories.len())?;
        memories.iter().try_for_each(|memory| self.memory(memory))
    }

    /// Retrieved memories, with distances when similarity search ran.
    pub fn retrieved(&mut self, retrieved: &[RetrievedMemory]) -> io::Result<()> {
        writeln!(self.out, "  {} memories", retrieved.len())?;
        for entry in retrieved {
            match entry.distance {
                Some(distance) => {
                    writeln!(self.out, "  - [{distance:.4}] {}", entry.memory.fact)?
                }
                None => writeln!(self.out, "  - {}", entry.memory.fact)?,
            }
        }
        Ok(())
    }

    pub fn generated(&mut self, response: &GenerateMemoriesResponse) -> io::Result<()> {
        if response.generated_memories.is_empty() {
            return writeln!(self.out, "  nothing worth remembering was found");
        }
        for generated in &response.generated_memories {
            let (name, fact) = generated
                .memory
                .as_ref()
                .map(|memory| (memory.name.as_str(), memory.fact.as_str()))
                .unwrap_or_default();
            writeln!(self.out, "  {:?} {name}", generated.action)?;
            if !fact.is_empty() {
                writeln!(self.out, "    fact: {fact}")?;
            }
        }
        Ok(())
    }

    pub fn revisions(&mut self, revisions: &[MemoryRevision]) -> io::Result<()> {
        writeln!(self.out, "  {} revisions (newest first)", revisions.len())?;
        for revision in revisions {
            let created = revision
                .create_time
                .map(|time| time.to_rfc3339())
                .unwrap_or_default();
            let fact = if revision.is_deletion() {
                "<deleted>"
            } else {
                revision.fact.as_str()
            };
            writeln!(self.out, "  - {} @ {created}: {fact}", revision.revision_id())?;
            for (key, value) in &revision.labels {
                writeln!(self.out, "    label {key}={value}")?;
            }
        }
        Ok(())
    }
}

fn topic_list(topics: &[MemoryTopic]) -> String {
    topics
        .iter()
        .map(|topic| match topic {
            MemoryTopic::Managed(managed) => managed.as_str().to_string(),
            MemoryTopic::Custom(label) => label.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use membank_rs_protocol::{ManagedTopic, MetadataValue};
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn memory_lists_topics_and_metadata() {
        let buffer = Shared::default();
        let mut narrator = Narrator::new(Box::new(buffer.clone()));
        let mut memory = Memory {
            name: "m/1".to_string(),
            fact: "Likes tea".to_string(),
            topics: vec![
                MemoryTopic::Managed(ManagedTopic::UserPreferences),
                MemoryTopic::Custom("drinks".to_string()),
            ],
            ..Memory::default()
        };
        memory
            .metadata
            .insert("category".to_string(), MetadataValue::string("food"));
        narrator.memory(&memory).expect("write");

        let text = String::from_utf8(buffer.0.lock().expect("lock").clone()).expect("utf8");
        assert_eq!(
            text,
            "  - Likes tea\n    name: m/1\n    topics: USER_PREFERENCES, drinks\n    metadata.category: \"food\"\n"
        );
    }

    #[test]
    fn deletion_revisions_are_marked() {
        let buffer = Shared::default();
        let mut narrator = Narrator::new(Box::new(buffer.clone()));
        let revisions = [MemoryRevision {
            name: "m/1/revisions/2".to_string(),
            ..MemoryRevision::default()
        }];
        narrator.revisions(&revisions).expect("write");

        let text = String::from_utf8(buffer.0.lock().expect("lock").clone()).expect("utf8");
        assert!(text.contains("- 2 @ : <deleted>"));
    }
}
