//! Engine instance resource and its memory bank configuration.

use crate::error::NameError;
use crate::memory::ManagedTopic;
use crate::names::{EngineName, LocationName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level container for sessions and memories.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningEngine {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_spec: Option<ContextSpec>,
}

impl ReasoningEngine {
    pub fn engine_name(&self) -> Result<EngineName, NameError> {
        self.name.parse()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContextSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_bank_config: Option<MemoryBankConfig>,
}

/// Memory bank settings applied to every later generate/retrieve call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemoryBankConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_search_config: Option<SimilaritySearchConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub customization_configs: Vec<CustomizationConfig>,
}

impl MemoryBankConfig {
    /// Custom topics replace the managed defaults unless both are listed.
    pub fn validate(&self) -> Result<(), String> {
        for config in &self.customization_configs {
            let has_custom = config
                .memory_topics
                .iter()
                .any(|topic| matches!(topic, MemoryTopicConfig::Custom(_)));
            let has_managed = config
                .memory_topics
                .iter()
                .any(|topic| matches!(topic, MemoryTopicConfig::Managed(_)));
            if has_custom && !has_managed {
                return Err(
                    "custom memory topics require the managed topics to be listed explicitly"
                        .to_string(),
                );
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SimilaritySearchConfig {
    /// Full publisher model resource name.
    pub embedding_model: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationConfig {
    #[serde(default)]
    pub memory_topics: Vec<MemoryTopicConfig>,
}

/// Topic that extraction should look for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum MemoryTopicConfig {
    #[serde(rename = "managedMemoryTopic")]
    Managed(ManagedTopicConfig),
    #[serde(rename = "customMemoryTopic")]
    Custom(CustomTopic),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedTopicConfig {
    pub managed_topic_enum: ManagedTopic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomTopic {
    pub label: String,
    pub description: String,
}

impl CustomTopic {
    pub fn new(label: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: description.into(),
        }
    }
}

/// Publisher model resource for an embedding model id.
pub fn embedding_model_resource(location: &LocationName, model_id: &str) -> String {
    format!("{location}/publishers/google/models/{model_id}")
}

/// Builder for the context spec pushed by `update_engine_context`.
#[derive(Debug, Clone, Default)]
pub struct ContextSpecBuilder {
    embedding_model: Option<String>,
    custom_topics: Vec<CustomTopic>,
}

impl ContextSpec {
    pub fn builder() -> ContextSpecBuilder {
        ContextSpecBuilder::default()
    }
}

impl ContextSpecBuilder {
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    pub fn custom_topic(mut self, topic: CustomTopic) -> Self {
        self.custom_topics.push(topic);
        self
    }

    /// Build the spec. Custom topics are emitted after the four managed
    /// topics so the defaults stay enabled.
    pub fn build(self) -> ContextSpec {
        let mut customization_configs = Vec::new();
        if !self.custom_topics.is_empty() {
            let mut memory_topics: Vec<MemoryTopicConfig> = ManagedTopic::ALL
                .into_iter()
                .map(|managed_topic_enum| {
                    MemoryTopicConfig::Managed(ManagedTopicConfig { managed_topic_enum })
                })
                .collect();
            memory_topics.extend(self.custom_topics.into_iter().map(MemoryTopicConfig::Custom));
            customization_configs.push(CustomizationConfig { memory_topics });
        }
        ContextSpec {
            memory_bank_config: Some(MemoryBankConfig {
                similarity_search_config: self
                    .embedding_model
                    .map(|embedding_model| SimilaritySearchConfig { embedding_model }),
                customization_configs,
            }),
        }
    }
}
