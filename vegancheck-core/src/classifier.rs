//! Classification pipeline.
//!
//! [`Classifier::classify`] runs one submission through:
//! normalize → memory lookup → knowledge base → oracle (unknowns only) →
//! merge → resolve → memory write-back.
//!
//! It never fails: store and oracle failures degrade the result, and anything
//! unexpected (including panics) becomes a `status = error` result.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{info_span, Instrument};

use crate::knowledge_base::KnowledgeBase;
use crate::memory::MemoryCache;
use crate::merge::{explain, merge, resolve_status};
use crate::normalizer::{cache_key, Normalizer};
use crate::oracle::{Oracle, OracleVerdict};
use crate::types::{CheckStatus, ClassificationResult, FlaggedItem, IngredientRecord, VeganStatus};

/// Explanation returned when the pipeline itself breaks. Details go to the log only.
pub const GENERIC_ERROR: &str = "Analysis failed. Please try again.";

const EMPTY_INPUT: &str = "No ingredients were provided.";

/// Outcome of the compute stages, before persistence.
struct Computed {
    result: ClassificationResult,
    /// A store read or the oracle failed; the result is returned but not remembered.
    degraded: bool,
}

/// The classification pipeline with its injected collaborators.
#[derive(Clone)]
pub struct Classifier {
    knowledge_base: Arc<dyn KnowledgeBase>,
    memory: Arc<dyn MemoryCache>,
    oracle: Option<Oracle>,
    normalizer: Normalizer,
}

impl Classifier {
    /// Pipeline without an oracle; unknown ingredients degrade the result.
    pub fn new(knowledge_base: Arc<dyn KnowledgeBase>, memory: Arc<dyn MemoryCache>) -> Self {
        Self {
            knowledge_base,
            memory,
            oracle: None,
            normalizer: Normalizer::new(),
        }
    }

    pub fn with_oracle(mut self, oracle: Oracle) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn has_oracle(&self) -> bool {
        self.oracle.is_some()
    }

    /// Classify a free-text ingredient list. Always yields a result.
    pub async fn classify(&self, raw: &str) -> ClassificationResult {
        let span = info_span!("classify", input_len = raw.len());
        match AssertUnwindSafe(self.run(raw))
            .catch_unwind()
            .instrument(span)
            .await
        {
            Ok(result) => result,
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(detail = %detail, "Classification pipeline panicked");
                ClassificationResult::error(GENERIC_ERROR)
            }
        }
    }

    async fn run(&self, raw: &str) -> ClassificationResult {
        let raw = raw.trim();
        if raw.is_empty() {
            return ClassificationResult::unclear(EMPTY_INPUT);
        }

        let tokens = self.normalizer.normalize(raw);
        if tokens.is_empty() {
            tracing::debug!("Normalization produced no tokens");
            return ClassificationResult::unclear(explain(CheckStatus::Unclear, &[], false));
        }
        let key = cache_key(&tokens);

        match self
            .memory
            .lookup(&key)
            .instrument(info_span!("memory_lookup"))
            .await
        {
            Ok(Some(entry)) => {
                tracing::info!(tokens = tokens.len(), "Product memory hit");
                return entry.into_result();
            }
            Ok(None) => {
                tracing::debug!(tokens = tokens.len(), "Product memory miss");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Product memory lookup failed, computing");
            }
        }

        let computed = self.compute(&tokens).await;

        if computed.degraded {
            tracing::info!("Result is degraded, not persisting");
        } else if let Err(e) = self
            .memory
            .insert(&key, &computed.result)
            .instrument(info_span!("persist"))
            .await
        {
            // Caching is best-effort; the caller still gets the result.
            tracing::warn!(error = %e, "Failed to persist classification result");
        }

        computed.result
    }

    async fn compute(&self, tokens: &[String]) -> Computed {
        let mut degraded = false;

        let names: BTreeSet<String> = tokens.iter().cloned().collect();
        let records = match self
            .knowledge_base
            .lookup(&names)
            .instrument(info_span!("knowledge_lookup", names = names.len()))
            .await
        {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "Knowledge base lookup failed, treating all as unknown");
                degraded = true;
                Vec::new()
            }
        };
        let known: HashMap<&str, &IngredientRecord> =
            records.iter().map(|r| (r.name.as_str(), r)).collect();

        // Walk tokens in input order so flagged items follow the submitted list.
        let mut visited = HashSet::new();
        let mut kb_items = Vec::new();
        let mut unknown = Vec::new();
        for token in tokens {
            if !visited.insert(token.as_str()) {
                continue;
            }
            match known.get(token.as_str()) {
                Some(record) if record.vegan_status != VeganStatus::Vegan => {
                    kb_items.push(FlaggedItem::from(*record));
                }
                Some(_) => {}
                None => unknown.push(token.clone()),
            }
        }

        tracing::debug!(
            known = known.len(),
            unknown = unknown.len(),
            "Knowledge base lookup complete"
        );

        let mut oracle_items = Vec::new();
        if !unknown.is_empty() {
            match &self.oracle {
                None => {
                    tracing::warn!(unknown = unknown.len(), "No oracle configured for unknown ingredients");
                    degraded = true;
                }
                Some(oracle) => {
                    let span = info_span!(
                        "oracle_call",
                        unknown = unknown.len(),
                        provider = oracle.provider_name(),
                        model = oracle.model_name(),
                    );
                    match oracle.classify(&unknown).instrument(span).await {
                        Ok(OracleVerdict::Unintelligible { explanation }) => {
                            return Computed {
                                result: ClassificationResult::unclear(explanation),
                                degraded,
                            };
                        }
                        Ok(OracleVerdict::Classified {
                            flagged,
                            explanation,
                        }) => {
                            tracing::debug!(
                                flagged = flagged.len(),
                                explanation = %explanation,
                                "Oracle classified unknown ingredients"
                            );
                            // Only names that were asked about; known ones are settled by
                            // the knowledge base and invented ones were never submitted.
                            let asked: HashSet<&str> = unknown.iter().map(String::as_str).collect();
                            let (kept, dropped): (Vec<_>, Vec<_>) = flagged
                                .into_iter()
                                .partition(|item| asked.contains(item.name.as_str()));
                            if !dropped.is_empty() {
                                tracing::debug!(
                                    dropped = dropped.len(),
                                    "Ignoring oracle items for names that were not asked about"
                                );
                            }
                            oracle_items = kept;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Oracle failed, dropping unknown ingredients");
                            degraded = true;
                        }
                    }
                }
            }
        }

        let merged = merge(kb_items, oracle_items);
        let status = resolve_status(tokens.len(), &merged);
        let explanation = explain(status, &merged, degraded);

        tracing::info!(
            status = status.as_str(),
            flagged = merged.len(),
            degraded = degraded,
            "Classification complete"
        );

        Computed {
            result: ClassificationResult::new(status, merged, explanation),
            degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::knowledge_base::StaticKnowledgeBase;
    use crate::llm::FakeProvider;
    use crate::memory::InMemoryMemory;
    use crate::types::MemoryEntry;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingKnowledgeBase {
        inner: StaticKnowledgeBase,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl KnowledgeBase for CountingKnowledgeBase {
        async fn lookup(
            &self,
            names: &BTreeSet<String>,
        ) -> Result<Vec<IngredientRecord>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.lookup(names).await
        }
    }

    struct FailingMemory;

    #[async_trait]
    impl MemoryCache for FailingMemory {
        async fn lookup(&self, _key: &str) -> Result<Option<MemoryEntry>, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn insert(&self, _key: &str, _result: &ClassificationResult) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
    }

    struct PanickingKnowledgeBase;

    #[async_trait]
    impl KnowledgeBase for PanickingKnowledgeBase {
        async fn lookup(
            &self,
            _names: &BTreeSet<String>,
        ) -> Result<Vec<IngredientRecord>, StoreError> {
            panic!("connection pool poisoned");
        }
    }

    #[tokio::test]
    async fn test_whitespace_input_is_unclear() {
        let kb = Arc::new(CountingKnowledgeBase::default());
        let classifier = Classifier::new(kb.clone(), Arc::new(InMemoryMemory::new()));

        let result = classifier.classify("   \n ").await;
        assert_eq!(result.status, CheckStatus::Unclear);
        assert!(!result.cached);
        assert_eq!(kb.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_memory_failure_does_not_fail_request() {
        let classifier = Classifier::new(
            Arc::new(StaticKnowledgeBase::bundled()),
            Arc::new(FailingMemory),
        );

        let result = classifier.classify("water, honey").await;
        assert_eq!(result.status, CheckStatus::NonVegan);
        assert!(!result.cached);
    }

    #[tokio::test]
    async fn test_panic_becomes_error_result() {
        let classifier = Classifier::new(
            Arc::new(PanickingKnowledgeBase),
            Arc::new(InMemoryMemory::new()),
        );

        let result = classifier.classify("water").await;
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.explanation, GENERIC_ERROR);
        assert!(!result.explanation.contains("poisoned"));
    }

    #[tokio::test]
    async fn test_missing_oracle_degrades_and_skips_persist() {
        let memory = Arc::new(InMemoryMemory::new());
        let classifier = Classifier::new(Arc::new(StaticKnowledgeBase::bundled()), memory.clone());

        let result = classifier.classify("water, tallow").await;
        assert_eq!(result.status, CheckStatus::Vegan);
        assert!(result.explanation.contains("could not be verified"));
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_oracle_cannot_override_known_ingredient() {
        let provider = FakeProvider::new().with_default_response(
            r#"{"is_vegan": false, "flagged": [{"name": "water"}, {"name": "tallow"}], "explanation": "x"}"#,
        );
        let classifier = Classifier::new(
            Arc::new(StaticKnowledgeBase::bundled()),
            Arc::new(InMemoryMemory::new()),
        )
        .with_oracle(Oracle::new(Arc::new(provider)));

        let result = classifier.classify("water, tallow").await;
        let names: Vec<&str> = result.flagged.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["tallow"]);
    }

    #[tokio::test]
    async fn test_oracle_items_outside_submission_are_ignored() {
        let provider = FakeProvider::new().with_default_response(
            r#"{"is_vegan": false, "flagged": [{"name": "ambergris"}, {"name": "tallow"}, {"name": "civet"}], "explanation": "x"}"#,
        );
        let classifier = Classifier::new(
            Arc::new(StaticKnowledgeBase::bundled()),
            Arc::new(InMemoryMemory::new()),
        )
        .with_oracle(Oracle::new(Arc::new(provider)));

        let result = classifier.classify("sugar, tallow").await;
        let names: Vec<&str> = result.flagged.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["tallow"]);
        assert!(!result.explanation.contains("ambergris"));
        assert!(!result.explanation.contains("civet"));
    }

    #[tokio::test]
    async fn test_flagged_follow_input_order() {
        let classifier = Classifier::new(
            Arc::new(StaticKnowledgeBase::bundled()),
            Arc::new(InMemoryMemory::new()),
        );

        let result = classifier.classify("milk, honey, butter, honey").await;
        let names: Vec<&str> = result.flagged.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["milk", "honey", "butter"]);
    }
}
