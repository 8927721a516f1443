//! REST transport for the memory bank API.

use crate::api::MemoryBankApi;
use crate::auth::{TokenProvider, token_provider};
use crate::error::{MemoryBankError, Result};
use async_trait::async_trait;
use log::{debug, info};
use membank_rs_config::MembankConfig;
use membank_rs_protocol::{
    EngineName, GenerateMemoriesRequest, ListEventsResponse, ListMemoriesResponse,
    ListRevisionsResponse, LocationName, Memory, MemoryName, MemoryRevision, Operation,
    PageRequest, PurgeMemoriesRequest, ReasoningEngine, RetrieveMemoriesRequest,
    RetrieveMemoriesResponse, RevisionName, RollbackMemoryRequest, Session, SessionEvent,
    SessionName,
};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Per-request timeout; long work runs as operations, so calls return fast.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// `MemoryBankApi` over HTTPS with bearer authentication.
#[derive(Clone)]
pub struct HttpMemoryBank {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl std::fmt::Debug for HttpMemoryBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMemoryBank")
            .field("base_url", &self.base_url)
            .field("tokens", &self.tokens.describe())
            .finish()
    }
}

impl HttpMemoryBank {
    /// `base_url` includes the API version, e.g.
    /// `https://us-central1-aiplatform.googleapis.com/v1beta1/`.
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url,
            tokens,
        })
    }

    /// Endpoint and credentials as configured.
    pub fn from_config(config: &MembankConfig) -> Result<Self> {
        let base_url = config.api.base_url(&config.location);
        info!("memory bank endpoint (base_url={base_url})");
        Self::new(base_url, token_provider(&config.auth)?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a resource path or custom method (`{name}:verb`).
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self.tokens.access_token().await?;
        Ok(self
            .http
            .request(method, self.url(path))
            .bearer_auth(token))
    }

    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(error_from_response(status, &body));
        }
        let body = if body.trim().is_empty() { "{}" } else { body.as_str() };
        Ok(serde_json::from_str(body)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        debug!("GET {path}");
        let builder = self.request(Method::GET, path).await?.query(query);
        self.execute(builder).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        debug!("POST {path}");
        let builder = self.request(Method::POST, path).await?.json(body);
        self.execute(builder).await
    }

    async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        update_mask: &str,
        body: &B,
    ) -> Result<T> {
        debug!("PATCH {path} (updateMask={update_mask})");
        let builder = self
            .request(Method::PATCH, path)
            .await?
            .query(&[("updateMask", update_mask)])
            .json(body);
        self.execute(builder).await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        debug!("DELETE {path}");
        let builder = self.request(Method::DELETE, path).await?;
        self.execute(builder).await
    }
}

/// Map a non-success response to a typed error, preferring the message in a
/// Google error body (`{"error": {"code", "message", "status"}}`).
pub(crate) fn error_from_response(status: StatusCode, body: &str) -> MemoryBankError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            } else {
                trimmed.to_string()
            }
        });
    match status {
        StatusCode::NOT_FOUND => MemoryBankError::NotFound(message),
        StatusCode::BAD_REQUEST => MemoryBankError::InvalidRequest(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => MemoryBankError::Unauthorized(message),
        other => MemoryBankError::Status {
            code: other.as_u16(),
            message,
        },
    }
}

fn memories_path(engine: &EngineName) -> String {
    format!("{engine}/memories")
}

#[async_trait]
impl MemoryBankApi for HttpMemoryBank {
    async fn create_engine(
        &self,
        location: &LocationName,
        engine: &ReasoningEngine,
    ) -> Result<Operation> {
        self.post(&format!("{location}/reasoningEngines"), engine)
            .await
    }

    async fn get_engine(&self, engine: &EngineName) -> Result<ReasoningEngine> {
        self.get(&engine.to_string(), &[]).await
    }

    async fn update_engine(
        &self,
        engine: &EngineName,
        patch: &ReasoningEngine,
        update_mask: &str,
    ) -> Result<Operation> {
        self.patch(&engine.to_string(), update_mask, patch).await
    }

    async fn create_session(&self, engine: &EngineName, session: &Session) -> Result<Operation> {
        self.post(&format!("{engine}/sessions"), session).await
    }

    async fn append_event(&self, session: &SessionName, event: &SessionEvent) -> Result<()> {
        let _: Value = self
            .post(&format!("{session}:appendEvent"), event)
            .await?;
        Ok(())
    }

    async fn list_events(
        &self,
        session: &SessionName,
        page: &PageRequest,
    ) -> Result<ListEventsResponse> {
        self.get(&format!("{session}/events"), &page.query_pairs())
            .await
    }

    async fn create_memory(&self, engine: &EngineName, memory: &Memory) -> Result<Operation> {
        self.post(&memories_path(engine), memory).await
    }

    async fn generate_memories(
        &self,
        engine: &EngineName,
        request: &GenerateMemoriesRequest,
    ) -> Result<Operation> {
        self.post(&format!("{engine}/memories:generate"), request)
            .await
    }

    async fn get_memory(&self, name: &MemoryName) -> Result<Memory> {
        self.get(&name.to_string(), &[]).await
    }

    async fn list_memories(
        &self,
        engine: &EngineName,
        page: &PageRequest,
    ) -> Result<ListMemoriesResponse> {
        self.get(&memories_path(engine), &page.query_pairs()).await
    }

    async fn retrieve_memories(
        &self,
        engine: &EngineName,
        request: &RetrieveMemoriesRequest,
    ) -> Result<RetrieveMemoriesResponse> {
        self.post(&format!("{engine}/memories:retrieve"), request)
            .await
    }

    async fn update_memory(
        &self,
        name: &MemoryName,
        patch: &Memory,
        update_mask: &str,
    ) -> Result<Operation> {
        self.patch(&name.to_string(), update_mask, patch).await
    }

    async fn delete_memory(&self, name: &MemoryName) -> Result<Operation> {
        self.delete(&name.to_string()).await
    }

    async fn purge_memories(
        &self,
        engine: &EngineName,
        request: &PurgeMemoriesRequest,
    ) -> Result<Operation> {
        self.post(&format!("{engine}/memories:purge"), request)
            .await
    }

    async fn list_revisions(
        &self,
        memory: &MemoryName,
        page: &PageRequest,
    ) -> Result<ListRevisionsResponse> {
        self.get(&format!("{memory}/revisions"), &page.query_pairs())
            .await
    }

    async fn get_revision(&self, name: &RevisionName) -> Result<MemoryRevision> {
        self.get(&name.to_string(), &[]).await
    }

    async fn rollback_memory(
        &self,
        memory: &MemoryName,
        request: &RollbackMemoryRequest,
    ) -> Result<Operation> {
        self.post(&format!("{memory}:rollback"), request).await
    }

    async fn get_operation(&self, name: &str) -> Result<Operation> {
        self.get(name, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use pretty_assertions::assert_eq;

    fn bank(base_url: &str) -> HttpMemoryBank {
        HttpMemoryBank::new(base_url, Arc::new(StaticToken::new("t"))).expect("client")
    }

    #[test]
    fn urls_join_base_and_resource() {
        let bank = bank("https://us-central1-aiplatform.googleapis.com/v1beta1");
        let engine = LocationName::new("p", "us-central1").engine("42");
        assert_eq!(
            bank.url(&format!("{engine}/memories:retrieve")),
            "https://us-central1-aiplatform.googleapis.com/v1beta1/projects/p/locations/us-central1/reasoningEngines/42/memories:retrieve"
        );
        assert_eq!(
            bank.url("/projects/p/locations/l/operations/9"),
            "https://us-central1-aiplatform.googleapis.com/v1beta1/projects/p/locations/l/operations/9"
        );
    }

    #[test]
    fn maps_statuses_to_errors() {
        let google_body = r#"{"error":{"code":404,"message":"Memory does not exist.","status":"NOT_FOUND"}}"#;
        match error_from_response(StatusCode::NOT_FOUND, google_body) {
            MemoryBankError::NotFound(message) => assert_eq!(message, "Memory does not exist."),
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            error_from_response(StatusCode::BAD_REQUEST, "filter is invalid"),
            MemoryBankError::InvalidRequest(message) if message == "filter is invalid"
        ));
        assert!(matches!(
            error_from_response(StatusCode::FORBIDDEN, ""),
            MemoryBankError::Unauthorized(message) if message == "Forbidden"
        ));
        assert!(matches!(
            error_from_response(StatusCode::UNAUTHORIZED, "{}"),
            MemoryBankError::Unauthorized(_)
        ));
        assert!(matches!(
            error_from_response(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            MemoryBankError::Status { code: 429, .. }
        ));
    }
}
