//! Postgres-backed knowledge base and product memory.
//!
//! Diesel is synchronous, so every query runs on the blocking thread pool.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use vegancheck_core::{
    ClassificationResult, IngredientRecord, KnowledgeBase, MemoryCache, MemoryEntry, StoreError,
};

use crate::db::DbPool;
use crate::models::{IngredientRow, NewProduct, ProductRow};
use crate::schema::{ingredients, products};

/// Run `f` with a pooled connection on the blocking pool.
async fn with_conn<T, F>(pool: &Arc<DbPool>, f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> Result<T, StoreError> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let _span = tracing::debug_span!("db.query").entered();
        let mut conn = pool
            .get()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        f(&mut conn)
    })
    .await
    .map_err(|e| StoreError::Unavailable(format!("database task failed: {}", e)))?
}

/// Knowledge base stored in the `ingredients` table.
#[derive(Clone)]
pub struct PgKnowledgeBase {
    pool: Arc<DbPool>,
}

impl PgKnowledgeBase {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KnowledgeBase for PgKnowledgeBase {
    async fn lookup(&self, names: &BTreeSet<String>) -> Result<Vec<IngredientRecord>, StoreError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let names: Vec<String> = names.iter().cloned().collect();

        with_conn(&self.pool, move |conn| {
            let rows: Vec<IngredientRow> = ingredients::table
                .filter(ingredients::name.eq_any(&names))
                .select(IngredientRow::as_select())
                .load(conn)
                .map_err(|e| StoreError::Query(e.to_string()))?;

            Ok(rows.into_iter().filter_map(IngredientRow::into_record).collect())
        })
        .await
    }
}

/// Product memory stored in the `products` table.
#[derive(Clone)]
pub struct PgMemoryCache {
    pool: Arc<DbPool>,
}

impl PgMemoryCache {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemoryCache for PgMemoryCache {
    async fn lookup(&self, key: &str) -> Result<Option<MemoryEntry>, StoreError> {
        let key = key.to_string();

        with_conn(&self.pool, move |conn| {
            let row: Option<ProductRow> = products::table
                .filter(products::ingredient_text.eq(&key))
                .select(ProductRow::as_select())
                .first(conn)
                .optional()
                .map_err(|e| StoreError::Query(e.to_string()))?;

            row.map(MemoryEntry::try_from).transpose()
        })
        .await
    }

    async fn insert(&self, key: &str, result: &ClassificationResult) -> Result<(), StoreError> {
        let entry = MemoryEntry::new(key, result);
        let flagged = serde_json::to_value(&entry.flagged)?;

        with_conn(&self.pool, move |conn| {
            let inserted = diesel::insert_into(products::table)
                .values(NewProduct {
                    ingredient_text: &entry.ingredient_text,
                    status: entry.status.as_str(),
                    flagged,
                    explanation: &entry.explanation,
                    created_at: entry.created_at,
                })
                .on_conflict(products::ingredient_text)
                .do_nothing()
                .execute(conn)
                .map_err(|e| StoreError::Query(e.to_string()))?;

            if inserted == 0 {
                tracing::debug!("Product memory entry already existed");
            }
            Ok(())
        })
        .await
    }
}
