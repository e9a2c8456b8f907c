//! End-to-end pipeline tests against the bundled knowledge base and a fake oracle.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use vegancheck_core::llm::{FakeProvider, LlmError};
use vegancheck_core::{
    CheckStatus, Classifier, DiskMemory, FlagSource, InMemoryMemory, IngredientRecord,
    KnowledgeBase, MemoryCache, Oracle, StaticKnowledgeBase, StoreError, VeganStatus,
    DEGRADED_NOTE,
};

const TALLOW_NON_VEGAN: &str = r#"{"is_vegan": false, "flagged": [{"name": "tallow", "reason": "Rendered beef fat."}], "explanation": "Tallow is animal fat."}"#;
const TALLOW_MAYBE: &str = r#"{"is_vegan": false, "maybe": true, "flagged": [{"name": "tallow"}], "explanation": "Could be animal fat."}"#;
const UNCLEAR: &str = r#"{"unclear": true, "flagged": [], "explanation": "This is not an ingredient list."}"#;

/// Knowledge base that counts lookups.
struct CountingKnowledgeBase {
    inner: StaticKnowledgeBase,
    calls: AtomicUsize,
}

impl CountingKnowledgeBase {
    fn bundled() -> Self {
        Self {
            inner: StaticKnowledgeBase::bundled(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KnowledgeBase for CountingKnowledgeBase {
    async fn lookup(&self, names: &BTreeSet<String>) -> Result<Vec<IngredientRecord>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.lookup(names).await
    }
}

struct UnavailableKnowledgeBase;

#[async_trait]
impl KnowledgeBase for UnavailableKnowledgeBase {
    async fn lookup(&self, _names: &BTreeSet<String>) -> Result<Vec<IngredientRecord>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

struct Harness {
    kb: Arc<CountingKnowledgeBase>,
    memory: Arc<InMemoryMemory>,
    provider: Arc<FakeProvider>,
    classifier: Classifier,
}

fn harness(provider: FakeProvider) -> Harness {
    let kb = Arc::new(CountingKnowledgeBase::bundled());
    let memory = Arc::new(InMemoryMemory::new());
    let provider = Arc::new(provider);
    let oracle = Oracle::new(provider.clone()).with_retry_backoff(Duration::from_millis(1));
    let classifier = Classifier::new(kb.clone(), memory.clone()).with_oracle(oracle);
    Harness {
        kb,
        memory,
        provider,
        classifier,
    }
}

#[tokio::test]
async fn honey_is_non_vegan_and_remembered() {
    let h = harness(FakeProvider::new());

    let first = h.classifier.classify("Water, Sugar, Honey, Salt").await;
    assert_eq!(first.status, CheckStatus::NonVegan);
    assert!(!first.cached);
    assert_eq!(first.flagged.len(), 1);
    assert_eq!(first.flagged[0].name, "honey");
    assert_eq!(first.flagged[0].source, FlagSource::KnowledgeBase);
    assert!(first.flagged[0].swap_static.is_some());
    assert!(first.explanation.contains("honey"));
    assert_eq!(h.provider.calls(), 0);

    let second = h.classifier.classify("Water, Sugar, Honey, Salt").await;
    assert!(second.cached);
    assert_eq!(second.status, first.status);
    assert_eq!(second.flagged, first.flagged);
    assert_eq!(second.explanation, first.explanation);
    assert_eq!(h.kb.calls(), 1);
}

#[tokio::test]
async fn formatting_differences_share_one_memory_entry() {
    let h = harness(FakeProvider::new());

    let first = h.classifier.classify("2 tbsp Honey, water").await;
    let second = h.classifier.classify("honey\nWATER.").await;

    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(h.memory.len(), 1);
}

#[tokio::test]
async fn known_vegan_list_needs_no_oracle() {
    let h = harness(FakeProvider::new());

    let result = h.classifier.classify("Quinoa, Chickpeas, Olive Oil").await;
    assert_eq!(result.status, CheckStatus::Vegan);
    assert!(result.flagged.is_empty());
    assert!(!result.explanation.contains(DEGRADED_NOTE));
    assert_eq!(h.provider.calls(), 0);
    assert_eq!(h.memory.len(), 1);
}

#[tokio::test]
async fn empty_input_touches_nothing() {
    let h = harness(FakeProvider::new());

    let result = h.classifier.classify("").await;
    assert_eq!(result.status, CheckStatus::Unclear);
    assert!(result.flagged.is_empty());
    assert!(!result.cached);
    assert_eq!(h.kb.calls(), 0);
    assert_eq!(h.provider.calls(), 0);
    assert!(h.memory.is_empty());
}

#[tokio::test]
async fn debris_only_input_is_unclear_and_not_remembered() {
    let h = harness(FakeProvider::new());

    let result = h.classifier.classify("1, 2, !!!, ()").await;
    assert_eq!(result.status, CheckStatus::Unclear);
    assert_eq!(h.kb.calls(), 0);
    assert!(h.memory.is_empty());
}

#[tokio::test]
async fn oracle_flags_unknown_ingredient() {
    let h = harness(FakeProvider::with_response("- tallow", TALLOW_NON_VEGAN));

    let result = h.classifier.classify("sugar, tallow").await;
    assert_eq!(result.status, CheckStatus::NonVegan);
    assert_eq!(result.flagged.len(), 1);
    assert_eq!(result.flagged[0].name, "tallow");
    assert_eq!(result.flagged[0].source, FlagSource::Oracle);
    assert_eq!(
        result.flagged[0].sub_reasoning.as_deref(),
        Some("Rendered beef fat.")
    );
    assert_eq!(h.provider.calls(), 1);
    assert_eq!(h.memory.len(), 1);
}

#[tokio::test]
async fn knowledge_base_items_come_before_oracle_items() {
    let h = harness(FakeProvider::with_response("- tallow", TALLOW_MAYBE));

    let result = h.classifier.classify("tallow, gelatin").await;
    assert_eq!(result.status, CheckStatus::NonVegan);

    let names: Vec<&str> = result.flagged.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["gelatin", "tallow"]);
    assert_eq!(result.flagged[0].source, FlagSource::KnowledgeBase);
    assert_eq!(result.flagged[1].vegan_status, VeganStatus::MaybeVegan);
    assert!(result.explanation.contains("Also check: tallow"));
}

#[tokio::test]
async fn oracle_only_maybe_gives_maybe_vegan() {
    let h = harness(FakeProvider::with_response("- tallow", TALLOW_MAYBE));

    let result = h.classifier.classify("flour, tallow").await;
    assert_eq!(result.status, CheckStatus::MaybeVegan);
    assert!(result.explanation.contains("tallow"));
}

#[tokio::test]
async fn malformed_oracle_output_degrades_without_persisting() {
    let h = harness(FakeProvider::new().with_default_response("Sure! Tallow is not vegan."));

    let result = h.classifier.classify("sugar, tallow").await;
    assert_eq!(result.status, CheckStatus::Vegan);
    assert!(result.explanation.ends_with(DEGRADED_NOTE));
    assert!(!result.explanation.contains("verified vegan"));
    assert!(!result.cached);
    assert!(h.memory.is_empty());

    // Nothing was remembered, so the next request asks again.
    h.classifier.classify("sugar, tallow").await;
    assert_eq!(h.provider.calls(), 2);
}

#[tokio::test]
async fn oracle_failure_keeps_knowledge_base_findings() {
    let h = harness(
        FakeProvider::new()
            .with_failure(LlmError::Timeout)
            .with_failure(LlmError::Timeout),
    );

    let result = h.classifier.classify("milk, tallow").await;
    assert_eq!(result.status, CheckStatus::NonVegan);
    assert_eq!(result.flagged.len(), 1);
    assert_eq!(result.flagged[0].name, "milk");
    assert!(result.explanation.ends_with(DEGRADED_NOTE));
    assert!(h.memory.is_empty());
}

#[tokio::test]
async fn transient_oracle_failure_is_retried() {
    let h = harness(
        FakeProvider::with_response("- tallow", TALLOW_NON_VEGAN).with_failure(LlmError::ApiError {
            status: 502,
            message: "bad gateway".to_string(),
        }),
    );

    let result = h.classifier.classify("tallow").await;
    assert_eq!(result.status, CheckStatus::NonVegan);
    assert!(!result.explanation.contains(DEGRADED_NOTE));
    assert_eq!(h.provider.calls(), 2);
    assert_eq!(h.memory.len(), 1);
}

#[tokio::test]
async fn oracle_unclear_signal_is_remembered() {
    let h = harness(FakeProvider::with_response("- xyzzy blorp", UNCLEAR));

    let first = h.classifier.classify("xyzzy blorp").await;
    assert_eq!(first.status, CheckStatus::Unclear);
    assert!(first.flagged.is_empty());
    assert_eq!(first.explanation, "This is not an ingredient list.");

    let second = h.classifier.classify("xyzzy blorp").await;
    assert!(second.cached);
    assert_eq!(second.status, CheckStatus::Unclear);
    assert_eq!(h.provider.calls(), 1);
}

#[tokio::test]
async fn composite_ingredient_keeps_components() {
    let h = harness(FakeProvider::new());

    let result = h.classifier.classify("sugar, natural flavors").await;
    assert_eq!(result.status, CheckStatus::MaybeVegan);
    let item = &result.flagged[0];
    assert!(item.is_composite);
    assert!(!item.components.is_empty());
}

#[tokio::test]
async fn knowledge_base_outage_routes_everything_to_oracle() {
    let memory = Arc::new(InMemoryMemory::new());
    // Known names are sent to the oracle too.
    let provider = Arc::new(FakeProvider::with_response(
        "- sugar\n- tallow",
        TALLOW_NON_VEGAN,
    ));
    let classifier = Classifier::new(Arc::new(UnavailableKnowledgeBase), memory.clone())
        .with_oracle(Oracle::new(provider.clone()));

    let result = classifier.classify("sugar, tallow").await;
    assert_eq!(result.status, CheckStatus::NonVegan);
    assert!(result.explanation.ends_with(DEGRADED_NOTE));
    assert!(memory.is_empty());
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn disk_memory_survives_a_new_classifier() {
    let dir = tempfile::tempdir().unwrap();
    let kb = Arc::new(StaticKnowledgeBase::bundled());

    let first = Classifier::new(kb.clone(), Arc::new(DiskMemory::new(dir.path().to_path_buf())))
        .classify("oats, honey")
        .await;
    assert!(!first.cached);

    let memory = Arc::new(DiskMemory::new(dir.path().to_path_buf()));
    let second = Classifier::new(kb, memory.clone())
        .classify("Oats, Honey")
        .await;
    assert!(second.cached);
    assert_eq!(second.flagged, first.flagged);
    assert_eq!(memory.len(), 1);

    let entry = memory.lookup("oats, honey").await.unwrap().unwrap();
    assert_eq!(entry.status, CheckStatus::NonVegan);
}

#[tokio::test]
async fn truncated_disk_entry_is_recomputed_and_repaired() {
    let dir = tempfile::tempdir().unwrap();
    let memory = Arc::new(DiskMemory::new(dir.path().to_path_buf()));

    let path = memory.entry_path("oats, honey");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "").unwrap();

    let classifier = Classifier::new(Arc::new(StaticKnowledgeBase::bundled()), memory.clone());
    let first = classifier.classify("oats, honey").await;
    assert!(!first.cached);
    assert_eq!(first.status, CheckStatus::NonVegan);

    let second = classifier.classify("oats, honey").await;
    assert!(second.cached);
    assert_eq!(second.flagged, first.flagged);
    assert!(memory.lookup("oats, honey").await.unwrap().is_some());
}

#[tokio::test]
async fn concurrent_requests_for_same_text_agree() {
    let h = harness(FakeProvider::with_response("- tallow", TALLOW_NON_VEGAN));
    let classifier = Arc::new(h.classifier);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let classifier = classifier.clone();
            tokio::spawn(async move { classifier.classify("butter, tallow").await })
        })
        .collect();

    for handle in handles {
        let result = handle.await.unwrap();
        assert_eq!(result.status, CheckStatus::NonVegan);
        assert_eq!(result.flagged.len(), 2);
    }
    assert_eq!(h.memory.len(), 1);
}
