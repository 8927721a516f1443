//! Shared state threaded through the walkthrough steps.

use crate::report::Narrator;
use anyhow::{Context, anyhow};
use log::info;
use membank_rs_client::MemoryBankClient;
use membank_rs_config::{ENV_ENGINE, EngineSetupConfig, MembankConfig};
use membank_rs_protocol::{EngineName, LocationName};
use membank_rs_test_utils::InMemoryBank;
use std::sync::Arc;

const OFFLINE_PROJECT: &str = "offline-project";

/// Client, target engine, and output for one walkthrough run.
pub struct Demo {
    pub client: MemoryBankClient,
    pub location: LocationName,
    pub user_id: String,
    pub engine_setup: EngineSetupConfig,
    pub out: Narrator,
    engine: Option<EngineName>,
    offline: bool,
}

impl Demo {
    /// Talk to the real service using `config`.
    pub fn online(config: &MembankConfig, out: Narrator) -> anyhow::Result<Self> {
        let location = config.location_name().context("project is not configured")?;
        let engine = config
            .engine
            .as_deref()
            .filter(|engine| !engine.is_empty())
            .map(|_| config.engine_name())
            .transpose()
            .context("invalid engine name")?;
        let client = MemoryBankClient::from_config(config).context("failed to build client")?;
        info!(
            "demo targets service (location={location}, engine_set={})",
            engine.is_some()
        );
        Ok(Self {
            client,
            location,
            user_id: config.demo.user_id.clone(),
            engine_setup: config.engine_setup.clone(),
            out,
            engine,
            offline: false,
        })
    }

    /// Run against an in-process bank. No credentials or network needed.
    pub fn offline(config: &MembankConfig, out: Narrator) -> Self {
        let project = config.project.as_deref().unwrap_or(OFFLINE_PROJECT);
        let location = LocationName::new(project, &config.location);
        let client = MemoryBankClient::new(Arc::new(InMemoryBank::new()));
        info!("demo runs offline (location={location})");
        Self {
            client,
            location,
            user_id: config.demo.user_id.clone(),
            engine_setup: config.engine_setup.clone(),
            out,
            engine: None,
            offline: true,
        }
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    /// Engine every step after setup works against.
    pub fn engine(&self) -> anyhow::Result<&EngineName> {
        self.engine.as_ref().ok_or_else(|| {
            anyhow!("{ENV_ENGINE} is not set; run `membank-demo setup` and add it to .env")
        })
    }

    pub fn set_engine(&mut self, engine: EngineName) {
        self.engine = Some(engine);
    }

    /// Scope key for a step-specific user derived from the configured one.
    pub fn scoped_user(&self, suffix: &str) -> String {
        format!("{}-{suffix}", self.user_id)
    }
}
