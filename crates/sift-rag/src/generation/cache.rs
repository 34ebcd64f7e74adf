//! Lazily-constructed, shared generation backend handle
//!
//! Backend construction is expensive, so one handle is built on first use
//! and reused for the lifetime of the orchestrator. The handle is owned
//! here and injected where needed rather than living in a process global.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::error::{Error, Result};
use crate::providers::{GenerationBackend, GenerationOptions};

type BackendFactory = Box<dyn Fn() -> Result<Arc<dyn GenerationBackend>> + Send + Sync>;

/// Holds at most one generation backend, built lazily on first call
///
/// Construction happens while the lock is held, so concurrent callers wait
/// on the same in-progress build instead of each constructing their own.
pub struct GenerationCache {
    backend: Mutex<Option<Arc<dyn GenerationBackend>>>,
    factory: BackendFactory,
    max_retries: u32,
}

impl GenerationCache {
    /// Create a cache that builds its backend from `factory` on first use
    pub fn new<F>(factory: F, max_retries: u32) -> Self
    where
        F: Fn() -> Result<Arc<dyn GenerationBackend>> + Send + Sync + 'static,
    {
        Self {
            backend: Mutex::new(None),
            factory: Box::new(factory),
            max_retries,
        }
    }

    /// Create a cache around an already-built backend (for injection in tests)
    pub fn with_backend(backend: Arc<dyn GenerationBackend>, max_retries: u32) -> Self {
        Self::new(move || Ok(Arc::clone(&backend)), max_retries)
    }

    /// Get the shared handle, constructing it if this is the first call
    async fn handle(&self) -> Result<Arc<dyn GenerationBackend>> {
        let mut guard = self.backend.lock().await;
        if let Some(backend) = guard.as_ref() {
            return Ok(Arc::clone(backend));
        }
        let built = (self.factory)()?;
        tracing::info!("Constructed generation backend '{}'", built.name());
        *guard = Some(Arc::clone(&built));
        Ok(built)
    }

    /// Whether the backend has been constructed
    pub async fn is_initialized(&self) -> bool {
        self.backend.lock().await.is_some()
    }

    /// Generate text, retrying a bounded number of times on failure
    pub async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let backend = self.handle().await?;

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            match backend.generate(prompt, options).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                        tracing::warn!(
                            "Generation failed (attempt {}/{}), retrying in {:?}",
                            attempt + 1,
                            self.max_retries + 1,
                            delay
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        Err(match last_error {
            Some(Error::Generation(message)) => Error::Generation(message),
            Some(other) => Error::generation(other.to_string()),
            None => Error::generation("generation produced no result"),
        })
    }

    /// Release the backend handle for controlled shutdown
    ///
    /// The next generate call constructs a fresh backend.
    pub async fn shutdown(&self) {
        let mut guard = self.backend.lock().await;
        if guard.take().is_some() {
            tracing::info!("Generation backend released");
        }
    }
}
