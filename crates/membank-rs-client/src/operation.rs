//! Poll-until-done handling for long-running operations.

use crate::api::MemoryBankApi;
use crate::error::{MemoryBankError, Result};
use log::{debug, warn};
use membank_rs_config::PollingConfig;
use membank_rs_protocol::Operation;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Backoff schedule for `PendingOperation::wait`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollOptions {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    /// Overall budget measured from the first call to `wait`.
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(10),
            multiplier: 1.5,
            timeout: Duration::from_secs(300),
        }
    }
}

impl From<&PollingConfig> for PollOptions {
    fn from(config: &PollingConfig) -> Self {
        Self {
            initial_interval: config.initial_interval(),
            max_interval: config.max_interval(),
            multiplier: config.multiplier,
            timeout: config.timeout(),
        }
    }
}

impl PollOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn next_interval(&self, current: Duration) -> Duration {
        current
            .mul_f64(self.multiplier.max(1.0))
            .min(self.max_interval)
    }
}

/// A started operation that resolves to `T` once the service marks it done.
pub struct PendingOperation<T> {
    api: Arc<dyn MemoryBankApi>,
    operation: Operation,
    options: PollOptions,
    _response: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for PendingOperation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingOperation")
            .field("operation", &self.operation)
            .field("options", &self.options)
            .finish()
    }
}

impl<T: DeserializeOwned> PendingOperation<T> {
    pub fn new(api: Arc<dyn MemoryBankApi>, operation: Operation, options: PollOptions) -> Self {
        Self {
            api,
            operation,
            options,
            _response: PhantomData,
        }
    }

    /// Operation resource name.
    pub fn name(&self) -> &str {
        &self.operation.name
    }

    /// Last snapshot received from the service.
    pub fn snapshot(&self) -> &Operation {
        &self.operation
    }

    pub fn is_done(&self) -> bool {
        self.operation.done
    }

    /// Override the poll schedule for this operation only.
    pub fn with_options(mut self, options: PollOptions) -> Self {
        self.options = options;
        self
    }

    /// Poll until done or until the configured timeout elapses.
    pub async fn wait(self) -> Result<T> {
        self.wait_with_cancel(&CancellationToken::new()).await
    }

    /// Like `wait`, but also stops when `cancel` fires. Cancelling only stops
    /// waiting; the remote operation keeps running.
    pub async fn wait_with_cancel(self, cancel: &CancellationToken) -> Result<T> {
        let Self {
            api,
            mut operation,
            options,
            ..
        } = self;
        let deadline = Instant::now() + options.timeout;
        let mut interval = options.initial_interval;
        let mut polls = 0usize;

        while !operation.done {
            let now = Instant::now();
            if now >= deadline {
                warn!(
                    "operation wait timed out (name={}, polls={})",
                    operation.name, polls
                );
                return Err(MemoryBankError::Timeout(operation.name));
            }
            let pause = interval.min(deadline - now);
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("operation wait cancelled (name={})", operation.name);
                    return Err(MemoryBankError::Cancelled(operation.name));
                }
                _ = tokio::time::sleep(pause) => {}
            }
            operation = api.get_operation(&operation.name).await?;
            polls += 1;
            interval = options.next_interval(interval);
        }

        debug!(
            "operation finished (name={}, polls={}, failed={})",
            operation.name,
            polls,
            operation.error.is_some()
        );
        resolve(operation)
    }
}

/// Turn a finished operation into its typed payload or error.
pub(crate) fn resolve<T: DeserializeOwned>(operation: Operation) -> Result<T> {
    if let Some(status) = operation.error {
        return Err(MemoryBankError::Operation {
            code: status.code,
            message: status.message,
        });
    }
    Ok(operation.decode_response()?)
}
