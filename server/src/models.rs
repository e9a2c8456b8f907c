use chrono::{DateTime, Utc};
use diesel::prelude::*;
use vegancheck_core::{
    CheckStatus, FlaggedItem, IngredientRecord, MemoryEntry, StoreError, UnknownStatus,
    VeganStatus,
};

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = crate::schema::ingredients)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct IngredientRow {
    pub name: String,
    pub vegan_status: String,
    pub function_logic: Option<String>,
    pub nourishment_fact: Option<String>,
    pub swap_static: Option<String>,
    pub swap_functional: Option<String>,
    pub is_composite: bool,
    pub components: Vec<Option<String>>,
    pub difficulty_weight: Option<i32>,
}

impl IngredientRow {
    /// Convert to the core record. Rows with an unrecognized status yield `None`.
    pub fn into_record(self) -> Option<IngredientRecord> {
        let Ok(vegan_status) = self.vegan_status.parse::<VeganStatus>() else {
            tracing::warn!(
                name = %self.name,
                vegan_status = %self.vegan_status,
                "Ignoring ingredient row with unknown vegan_status"
            );
            return None;
        };

        Some(IngredientRecord {
            name: self.name.trim().to_lowercase(),
            vegan_status,
            function_logic: self.function_logic,
            nourishment_fact: self.nourishment_fact,
            swap_static: self.swap_static,
            swap_functional: self.swap_functional,
            is_composite: self.is_composite,
            components: self.components.into_iter().flatten().collect(),
            difficulty_weight: self.difficulty_weight,
        })
    }
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = crate::schema::products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductRow {
    pub ingredient_text: String,
    pub status: String,
    pub flagged: serde_json::Value,
    pub explanation: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for MemoryEntry {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let status: CheckStatus = row
            .status
            .parse()
            .map_err(|e: UnknownStatus| StoreError::Query(format!("product row: {}", e)))?;
        let flagged: Vec<FlaggedItem> = serde_json::from_value(row.flagged)?;

        Ok(MemoryEntry {
            ingredient_text: row.ingredient_text,
            status,
            flagged,
            explanation: row.explanation,
            created_at: row.created_at,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::products)]
pub struct NewProduct<'a> {
    pub ingredient_text: &'a str,
    pub status: &'a str,
    pub flagged: serde_json::Value,
    pub explanation: &'a str,
    pub created_at: DateTime<Utc>,
}
