pub mod classifier;
pub mod error;
pub mod knowledge_base;
pub mod llm;
pub mod memory;
pub mod merge;
pub mod normalizer;
pub mod oracle;
pub mod types;

pub use classifier::{Classifier, GENERIC_ERROR};
pub use error::StoreError;
pub use knowledge_base::{KnowledgeBase, StaticKnowledgeBase};
pub use memory::{DiskMemory, InMemoryMemory, MemoryCache};
pub use merge::{explain, merge, resolve_status, DEGRADED_NOTE};
pub use normalizer::{cache_key, normalize, Normalizer};
pub use oracle::{parse_oracle_response, Oracle, OracleError, OracleVerdict};
pub use types::{
    CheckStatus, ClassificationResult, FlagSource, FlaggedItem, IngredientRecord, MemoryEntry,
    UnknownStatus, VeganStatus,
};
