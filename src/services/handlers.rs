use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::models::job::JobKind;

/// Failure reported by a job handler. Only the message is retained on the job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Capture the display message of any error.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        Self::new(err.to_string())
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Async work for one job kind, invoked with the job's resource id.
///
/// Handlers should be safe to run again for the same resource: the queue
/// never retries on its own, but callers may re-enqueue after a failure.
pub trait JobHandler: Send + Sync + 'static {
    fn handle(&self, resource_id: String) -> BoxFuture<'static, Result<(), HandlerError>>;
}

impl<F, Fut> JobHandler for F
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn handle(&self, resource_id: String) -> BoxFuture<'static, Result<(), HandlerError>> {
        (self)(resource_id).boxed()
    }
}

/// Maps each job kind to exactly one handler.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    pub fn get(&self, kind: JobKind) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<JobKind> {
        let mut kinds: Vec<JobKind> = self.handlers.keys().copied().collect();
        kinds.sort_by_key(|k| k.to_string());
        kinds
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[derive(Default)]
pub struct HandlerRegistryBuilder {
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
}

impl HandlerRegistryBuilder {
    /// Bind `handler` to `kind`, replacing any earlier registration.
    pub fn register<H: JobHandler>(mut self, kind: JobKind, handler: H) -> Self {
        if self.handlers.insert(kind, Arc::new(handler)).is_some() {
            tracing::warn!(kind = %kind, "Replacing previously registered job handler");
        }
        self
    }

    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: self.handlers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closure_handlers_are_registered_per_kind() {
        let registry = HandlerRegistry::builder()
            .register(JobKind::AiAnalysis, |id: String| async move {
                if id == "bad" {
                    Err(HandlerError::from("boom"))
                } else {
                    Ok(())
                }
            })
            .build();

        assert!(registry.get(JobKind::MetadataAndThumbnail).is_none());
        let handler = registry.get(JobKind::AiAnalysis).unwrap();
        tokio_test::assert_ok!(handler.handle("good".into()).await);
        let err = handler.handle("bad".into()).await.unwrap_err();
        assert_eq!(err.message(), "boom");
    }

    #[test]
    fn test_from_error_keeps_display_message() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing original");
        assert_eq!(HandlerError::from_error(&io).to_string(), "missing original");
    }
}
