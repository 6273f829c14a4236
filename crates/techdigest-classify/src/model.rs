//! Model-backed batch classification.

use std::collections::HashMap;

use async_trait::async_trait;
use techdigest_core::{Article, CategoryRegistry, DigestError};
use tracing::{debug, warn};

use crate::llm::{ChatMessage, ChatProvider};
use crate::prompt::{build_batch_prompt, build_system_prompt, parse_assignments};

/// What a single batch call produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Article url to an accepted category name.
    pub assigned: HashMap<String, String>,
    /// Urls of articles the response left without a usable category.
    pub unclassified: Vec<String>,
}

/// Classifies one batch of articles at a time.
#[async_trait]
pub trait BatchClassifier: Send + Sync {
    /// Short label for logs, e.g. `openrouter/openai/gpt-4o-mini`.
    fn describe(&self) -> String;

    /// Classify `batch` against `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::Provider`] when the call fails and
    /// [`DigestError::Parse`] when the response has an unusable shape.
    async fn classify_batch(
        &self,
        batch: &[Article],
        registry: &CategoryRegistry,
    ) -> Result<BatchOutcome, DigestError>;
}

/// [`BatchClassifier`] that asks a chat model, one request per batch.
pub struct ModelClassifier {
    provider: Box<dyn ChatProvider>,
    summary_chars: usize,
}

impl ModelClassifier {
    pub fn new(provider: Box<dyn ChatProvider>, summary_chars: usize) -> Self {
        Self {
            provider,
            summary_chars,
        }
    }
}

#[async_trait]
impl BatchClassifier for ModelClassifier {
    fn describe(&self) -> String {
        format!("{}/{}", self.provider.name(), self.provider.model())
    }

    async fn classify_batch(
        &self,
        batch: &[Article],
        registry: &CategoryRegistry,
    ) -> Result<BatchOutcome, DigestError> {
        if batch.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let messages = [
            ChatMessage::system(build_system_prompt()),
            ChatMessage::user(build_batch_prompt(batch, registry, self.summary_chars)),
        ];
        let response = self.provider.complete(&messages).await?;
        debug!(len = response.len(), "received model response");

        let mut names = parse_assignments(&response, batch.len())?;

        let mut outcome = BatchOutcome::default();
        for (idx, article) in batch.iter().enumerate() {
            match names.remove(&(idx + 1)) {
                Some(name) if registry.contains(&name) => {
                    outcome.assigned.insert(article.url.clone(), name);
                }
                Some(name) => {
                    warn!(
                        article = %article.title,
                        category = %name,
                        "model returned an unknown category, discarding"
                    );
                    outcome.unclassified.push(article.url.clone());
                }
                None => {
                    debug!(article = %article.title, "model left article unassigned");
                    outcome.unclassified.push(article.url.clone());
                }
            }
        }
        Ok(outcome)
    }
}
