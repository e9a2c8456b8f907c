//! Knowledge base of vetted ingredients.
//!
//! The knowledge base answers one batched question per submission: which of
//! these canonical names do we already know about? Backends implement
//! [`KnowledgeBase`]; the server has a Postgres implementation, and
//! [`StaticKnowledgeBase`] serves tests, the CLI and the bundled data set.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::LazyLock;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::StoreError;
use crate::types::IngredientRecord;

/// Batched lookup of known ingredients by canonical name.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Return the records whose `name` is in `names`.
    ///
    /// Must be a single round trip to the backing store. Names with no record
    /// are simply absent from the result.
    async fn lookup(&self, names: &BTreeSet<String>) -> Result<Vec<IngredientRecord>, StoreError>;
}

/// The raw JSON structure of a knowledge base file.
#[derive(Deserialize)]
struct KnowledgeBaseFile {
    ingredients: Vec<IngredientRecord>,
}

static BUNDLED: LazyLock<Vec<IngredientRecord>> = LazyLock::new(|| {
    let json = include_str!("../data/knowledge_base.json");
    let file: KnowledgeBaseFile =
        serde_json::from_str(json).expect("Failed to parse knowledge_base.json");
    file.ingredients
});

/// In-memory knowledge base keyed by canonical name.
#[derive(Debug, Clone, Default)]
pub struct StaticKnowledgeBase {
    records: HashMap<String, IngredientRecord>,
}

impl StaticKnowledgeBase {
    /// Build from records. Names are lower-cased; later duplicates replace earlier ones.
    pub fn from_records(records: impl IntoIterator<Item = IngredientRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|mut r| {
                r.name = r.name.trim().to_lowercase();
                (r.name.clone(), r)
            })
            .collect();
        Self { records }
    }

    /// The ingredient data set compiled into the binary.
    pub fn bundled() -> Self {
        Self::from_records(BUNDLED.iter().cloned())
    }

    /// Load a knowledge base from a JSON file shaped like the bundled one.
    pub fn from_json_file(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)?;
        let file: KnowledgeBaseFile = serde_json::from_str(&content)?;
        Ok(Self::from_records(file.ingredients))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl KnowledgeBase for StaticKnowledgeBase {
    async fn lookup(&self, names: &BTreeSet<String>) -> Result<Vec<IngredientRecord>, StoreError> {
        Ok(names
            .iter()
            .filter_map(|name| self.records.get(name).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VeganStatus;

    fn record(name: &str, status: VeganStatus) -> IngredientRecord {
        IngredientRecord {
            name: name.to_string(),
            vegan_status: status,
            function_logic: None,
            nourishment_fact: None,
            swap_static: None,
            swap_functional: None,
            is_composite: false,
            components: vec![],
            difficulty_weight: None,
        }
    }

    #[tokio::test]
    async fn test_lookup_returns_only_matches() {
        let kb = StaticKnowledgeBase::from_records([
            record("honey", VeganStatus::NonVegan),
            record("sugar", VeganStatus::Vegan),
        ]);

        let names: BTreeSet<String> = ["honey", "unobtainium"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let found = kb.lookup(&names).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "honey");
    }

    #[tokio::test]
    async fn test_names_are_canonicalized() {
        let kb = StaticKnowledgeBase::from_records([record("  Honey ", VeganStatus::NonVegan)]);
        let names = BTreeSet::from(["honey".to_string()]);
        assert_eq!(kb.lookup(&names).await.unwrap().len(), 1);
    }

    #[test]
    fn test_bundled_data_parses() {
        let kb = StaticKnowledgeBase::bundled();
        assert!(!kb.is_empty());
        assert!(kb.records.contains_key("honey"));
        assert!(kb.records.contains_key("natural flavors"));
    }

    #[test]
    fn test_bundled_names_are_normalized() {
        // Every bundled name must survive normalization unchanged, otherwise it can never match.
        for name in BUNDLED.iter().map(|r| &r.name) {
            assert_eq!(
                crate::normalizer::normalize(name),
                vec![name.clone()],
                "bundled name {:?} is not in normalized form",
                name
            );
        }
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("kb.json");
        std::fs::write(
            &path,
            r#"{"ingredients": [{"name": "gelatin", "vegan_status": "non_vegan"}]}"#,
        )
        .unwrap();

        let kb = StaticKnowledgeBase::from_json_file(&path).unwrap();
        assert_eq!(kb.len(), 1);
    }

    #[test]
    fn test_from_json_file_rejects_bad_status() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("kb.json");
        std::fs::write(
            &path,
            r#"{"ingredients": [{"name": "gelatin", "vegan_status": "sometimes"}]}"#,
        )
        .unwrap();

        assert!(matches!(
            StaticKnowledgeBase::from_json_file(&path),
            Err(StoreError::Serialization(_))
        ));
    }
}
