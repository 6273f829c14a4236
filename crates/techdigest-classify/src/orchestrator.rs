//! Runs the model over batches and routes whatever it cannot settle to the
//! keyword classifier or the catch-all.

use std::time::Duration;

use techdigest_core::{
    Article, AssignmentSource, CategoryRegistry, ClassificationResult, ClassificationStats,
    ClassifierConfig, DigestError,
};
use tracing::{debug, error, info, warn};

use crate::keyword;
use crate::model::{BatchClassifier, BatchOutcome};

/// Knobs for one classification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Maximum articles per model call; 0 is treated as 1.
    pub batch_size: usize,
    /// Keyword-classify unresolved articles instead of defaulting to the catch-all.
    pub fallback_to_keywords: bool,
    /// Extra attempts for a batch that failed with a retryable provider error.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further attempt.
    pub retry_delay: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&ClassifierConfig::default())
    }
}

impl From<&ClassifierConfig> for OrchestratorSettings {
    fn from(config: &ClassifierConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            fallback_to_keywords: config.fallback_to_keywords,
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

/// Assigns every article exactly one category.
///
/// # Examples
///
/// ```
/// use techdigest_classify::{Orchestrator, OrchestratorSettings};
/// use techdigest_core::{Article, AssignmentSource, Category, CategoryRegistry};
///
/// # tokio_test_block(async {
/// let registry = CategoryRegistry::load(
///     vec![Category::new("ML").with_keywords(["gpt"])],
///     "Other",
/// )
/// .unwrap();
/// let articles = vec![Article::new("GPT tricks", "https://x.dev/1", "x", "")];
///
/// let orchestrator = Orchestrator::keyword_only(OrchestratorSettings::default());
/// let results = orchestrator.classify_all(&articles, &registry, true).await;
/// assert_eq!(results[0].category, "ML");
/// assert_eq!(results[0].source, AssignmentSource::Keyword);
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Runtime::new().unwrap().block_on(f)
/// # }
/// ```
pub struct Orchestrator {
    model: Option<Box<dyn BatchClassifier>>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(model: Option<Box<dyn BatchClassifier>>, settings: OrchestratorSettings) -> Self {
        Self { model, settings }
    }

    /// An orchestrator with no model; every article goes to the keyword path.
    pub fn keyword_only(settings: OrchestratorSettings) -> Self {
        Self::new(None, settings)
    }

    /// Classify `articles`, returning one result per article in input order.
    ///
    /// Never fails: provider and parse errors only change which strategy
    /// settles an article. Without a model (or with `use_model` off) every
    /// article is keyword-classified; after a model attempt, leftovers go to
    /// the keyword classifier or, with fallback disabled, the catch-all.
    pub async fn classify_all(
        &self,
        articles: &[Article],
        registry: &CategoryRegistry,
        use_model: bool,
    ) -> Vec<ClassificationResult> {
        if articles.is_empty() {
            return Vec::new();
        }

        let mut slots: Vec<Option<(String, AssignmentSource)>> = vec![None; articles.len()];

        let attempted = match self.model.as_deref() {
            Some(model) if use_model => {
                self.run_model(model, articles, registry, &mut slots).await;
                true
            }
            Some(_) => {
                info!("model classification disabled, using keywords");
                false
            }
            None if use_model => {
                warn!("no model classifier available, using keywords");
                false
            }
            None => {
                debug!("keyword-only run");
                false
            }
        };

        let mut unresolved = 0usize;
        let results: Vec<ClassificationResult> = articles
            .iter()
            .zip(slots)
            .map(|(article, slot)| {
                let (category, source) = match slot {
                    Some(assigned) => assigned,
                    None if attempted => {
                        unresolved += 1;
                        self.fallback(article, registry)
                    }
                    None => (
                        keyword::classify(article, registry).to_string(),
                        AssignmentSource::Keyword,
                    ),
                };
                ClassificationResult::new(article, category, source)
            })
            .collect();

        if unresolved > 0 {
            if self.settings.fallback_to_keywords {
                info!(count = unresolved, "keyword fallback settled unresolved articles");
            } else {
                warn!(
                    count = unresolved,
                    catch_all = registry.catch_all(),
                    "keyword fallback disabled, defaulted unresolved articles to the catch-all"
                );
            }
        }

        let stats = ClassificationStats::from_results(&results);
        info!(%stats, "classification complete");
        results
    }

    async fn run_model(
        &self,
        model: &dyn BatchClassifier,
        articles: &[Article],
        registry: &CategoryRegistry,
        slots: &mut [Option<(String, AssignmentSource)>],
    ) {
        let batch_size = self.settings.batch_size.max(1);
        let batches = articles.len().div_ceil(batch_size);
        info!(
            model = %model.describe(),
            articles = articles.len(),
            batches,
            "classifying with model"
        );

        for (n, (batch, batch_slots)) in articles
            .chunks(batch_size)
            .zip(slots.chunks_mut(batch_size))
            .enumerate()
        {
            let outcome = match self.attempt(model, batch, registry, n + 1).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_recoverable() => {
                    warn!(batch = n + 1, error = %e, "batch failed, falling back");
                    continue;
                }
                Err(e) => {
                    error!(batch = n + 1, error = %e, "unexpected classifier error, falling back");
                    continue;
                }
            };

            for (article, slot) in batch.iter().zip(batch_slots.iter_mut()) {
                if let Some(name) = outcome.assigned.get(&article.url) {
                    if registry.contains(name) {
                        *slot = Some((name.clone(), AssignmentSource::Model));
                    }
                }
            }
            debug!(
                batch = n + 1,
                assigned = outcome.assigned.len(),
                unclassified = outcome.unclassified.len(),
                "batch done"
            );
        }
    }

    /// One batch call plus retries for retryable provider errors.
    async fn attempt(
        &self,
        model: &dyn BatchClassifier,
        batch: &[Article],
        registry: &CategoryRegistry,
        batch_no: usize,
    ) -> Result<BatchOutcome, DigestError> {
        let mut delay = self.settings.retry_delay;
        let mut retries = 0u32;
        loop {
            match model.classify_batch(batch, registry).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_retryable() && retries < self.settings.max_retries => {
                    retries += 1;
                    warn!(
                        batch = batch_no,
                        attempt = retries,
                        ?delay,
                        error = %e,
                        "retrying batch"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn fallback(&self, article: &Article, registry: &CategoryRegistry) -> (String, AssignmentSource) {
        if self.settings.fallback_to_keywords {
            (
                keyword::classify(article, registry).to_string(),
                AssignmentSource::Keyword,
            )
        } else {
            (registry.catch_all().to_string(), AssignmentSource::CatchAll)
        }
    }
}
