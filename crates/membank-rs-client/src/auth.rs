//! Access-token providers for the REST transport.

use crate::error::{MemoryBankError, Result};
use async_trait::async_trait;
use log::{debug, info};
use membank_rs_config::{AuthConfig, AuthSource};
use parking_lot::Mutex;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// GCE/GKE metadata endpoint for the default service account token.
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// gcloud tokens live for an hour; refresh well before that.
const GCLOUD_TOKEN_LIFETIME: Duration = Duration::from_secs(45 * 60);
/// Refresh metadata tokens this long before they expire.
const EXPIRY_SLACK: Duration = Duration::from_secs(60);

/// Supplies OAuth bearer tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;

    /// Short label used in logs and error messages.
    fn describe(&self) -> &'static str;
}

/// A fixed token from configuration or the environment.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(..)")
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> &'static str {
        "static"
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    refresh_at: Instant,
}

#[derive(Debug, Default)]
struct TokenCache(Mutex<Option<CachedToken>>);

impl TokenCache {
    fn get(&self) -> Option<String> {
        self.0
            .lock()
            .as_ref()
            .filter(|cached| Instant::now() < cached.refresh_at)
            .map(|cached| cached.token.clone())
    }

    fn put(&self, token: &str, lifetime: Duration) {
        *self.0.lock() = Some(CachedToken {
            token: token.to_string(),
            refresh_at: Instant::now() + lifetime,
        });
    }
}

/// Runs `gcloud auth print-access-token`.
#[derive(Debug)]
pub struct GcloudToken {
    program: PathBuf,
    cache: TokenCache,
}

impl GcloudToken {
    /// Locate `gcloud` on `PATH`.
    pub fn discover() -> Result<Self> {
        let program = which::which("gcloud")
            .map_err(|err| MemoryBankError::Auth(format!("gcloud not found on PATH: {err}")))?;
        debug!("using gcloud for access tokens (path={})", program.display());
        Ok(Self::with_program(program))
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            cache: TokenCache::default(),
        }
    }
}

#[async_trait]
impl TokenProvider for GcloudToken {
    async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.cache.get() {
            return Ok(token);
        }
        let output = tokio::process::Command::new(&self.program)
            .args(["auth", "print-access-token"])
            .output()
            .await
            .map_err(|err| MemoryBankError::Auth(format!("failed to run gcloud: {err}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MemoryBankError::Auth(format!(
                "gcloud exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(MemoryBankError::Auth(
                "gcloud printed an empty access token".to_string(),
            ));
        }
        self.cache.put(&token, GCLOUD_TOKEN_LIFETIME);
        Ok(token)
    }

    fn describe(&self) -> &'static str {
        "gcloud"
    }
}

#[derive(Debug, Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

/// Default service account token from the compute metadata server.
#[derive(Debug)]
pub struct MetadataServerToken {
    http: reqwest::Client,
    url: String,
    cache: TokenCache,
}

impl MetadataServerToken {
    pub fn new() -> Result<Self> {
        Self::with_url(METADATA_TOKEN_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(3))
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
            cache: TokenCache::default(),
        })
    }
}

#[async_trait]
impl TokenProvider for MetadataServerToken {
    async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.cache.get() {
            return Ok(token);
        }
        let response = self
            .http
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|err| MemoryBankError::Auth(format!("metadata server unreachable: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(MemoryBankError::Auth(format!(
                "metadata server returned HTTP {}",
                status.as_u16()
            )));
        }
        let body: MetadataTokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(EXPIRY_SLACK);
        self.cache.put(&body.access_token, lifetime);
        Ok(body.access_token)
    }

    fn describe(&self) -> &'static str {
        "metadata"
    }
}

/// Tries each provider in order and returns the first token obtained.
pub struct ChainedToken {
    providers: Vec<Arc<dyn TokenProvider>>,
}

impl ChainedToken {
    pub fn new(providers: Vec<Arc<dyn TokenProvider>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl TokenProvider for ChainedToken {
    async fn access_token(&self) -> Result<String> {
        let mut failures = Vec::new();
        for provider in &self.providers {
            match provider.access_token().await {
                Ok(token) => return Ok(token),
                Err(err) => {
                    debug!("token source failed (source={}, error={err})", provider.describe());
                    failures.push(format!("{}: {err}", provider.describe()));
                }
            }
        }
        if failures.is_empty() {
            return Err(MemoryBankError::Auth("no token sources configured".to_string()));
        }
        Err(MemoryBankError::Auth(failures.join("; ")))
    }

    fn describe(&self) -> &'static str {
        "auto"
    }
}

/// Build the provider selected by `auth`.
///
/// `auto` uses a configured token when present and otherwise tries the
/// metadata server, then gcloud.
pub fn token_provider(auth: &AuthConfig) -> Result<Arc<dyn TokenProvider>> {
    let configured = auth
        .token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty());
    let provider: Arc<dyn TokenProvider> = match auth.source {
        AuthSource::Static => {
            let token = configured.ok_or_else(|| {
                MemoryBankError::Auth("auth.source is static but no token is set".to_string())
            })?;
            Arc::new(StaticToken::new(token))
        }
        AuthSource::Gcloud => Arc::new(GcloudToken::discover()?),
        AuthSource::Metadata => Arc::new(MetadataServerToken::new()?),
        AuthSource::Auto => match configured {
            Some(token) => Arc::new(StaticToken::new(token)),
            None => {
                let mut providers: Vec<Arc<dyn TokenProvider>> =
                    vec![Arc::new(MetadataServerToken::new()?)];
                match GcloudToken::discover() {
                    Ok(gcloud) => providers.push(Arc::new(gcloud)),
                    Err(err) => debug!("skipping gcloud token source ({err})"),
                }
                Arc::new(ChainedToken::new(providers))
            }
        },
    };
    info!("access tokens from {} source", provider.describe());
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Failing;

    #[async_trait]
    impl TokenProvider for Failing {
        async fn access_token(&self) -> Result<String> {
            Err(MemoryBankError::Auth("nope".to_string()))
        }

        fn describe(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test]
    async fn chain_falls_through_to_next_source() {
        let chain = ChainedToken::new(vec![
            Arc::new(Failing),
            Arc::new(StaticToken::new("tok")),
        ]);
        assert_eq!(chain.access_token().await.expect("token"), "tok");
    }

    #[tokio::test]
    async fn chain_reports_every_failure() {
        let chain = ChainedToken::new(vec![Arc::new(Failing), Arc::new(Failing)]);
        let err = chain.access_token().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "auth error: failing: auth error: nope; failing: auth error: nope"
        );
    }

    #[tokio::test]
    async fn static_and_auto_prefer_configured_token() {
        for source in [AuthSource::Static, AuthSource::Auto] {
            let provider = token_provider(&AuthConfig {
                source,
                token: Some(" secret ".to_string()),
            })
            .expect("provider");
            assert_eq!(provider.describe(), "static");
            assert_eq!(provider.access_token().await.expect("token"), "secret");
        }
    }

    #[test]
    fn static_without_token_is_rejected() {
        let result = token_provider(&AuthConfig {
            source: AuthSource::Static,
            token: None,
        });
        assert!(matches!(result, Err(MemoryBankError::Auth(_))));
    }

    #[test]
    fn cache_expires() {
        let cache = TokenCache::default();
        cache.put("a", Duration::from_secs(60));
        assert_eq!(cache.get().as_deref(), Some("a"));
        cache.put("b", Duration::ZERO);
        assert_eq!(cache.get(), None);
    }
}
