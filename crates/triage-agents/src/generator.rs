//! Text-generation backend seam.
//!
//! Agents never call a model directly. When a backend is attached, the
//! orchestrator sends each agent's analysis prompt through it and stores
//! the reply as the finding's narrative. Any failure leaves the narrative
//! empty; the call itself carries on.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::GeneratorError;

/// A model backend behind a single `generate(prompt) -> text` call.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError>;
}

pub type SharedGenerator = Arc<dyn TextGenerator>;

/// Run one generation with a time budget, degrading every failure to `None`.
pub async fn narrate(generator: &dyn TextGenerator, prompt: &str, budget: Duration) -> Option<String> {
    let result = match tokio::time::timeout(budget, generator.generate(prompt)).await {
        Ok(inner) => inner,
        Err(_) => Err(GeneratorError::Timeout(budget)),
    };

    match result {
        Ok(text) if text.trim().is_empty() => {
            warn!(backend = generator.name(), error = %GeneratorError::Empty, "Narrative dropped");
            None
        }
        Ok(text) => Some(text.trim().to_string()),
        Err(e) => {
            warn!(backend = generator.name(), error = %e, "Narrative dropped");
            None
        }
    }
}
