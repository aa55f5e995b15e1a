//! [`LoraCatalog`] — the persistent store plus query surface over LoRA
//! records (§4.2).

use std::collections::HashMap;
use std::str::FromStr;

use chrono::Utc;
use sdforge_gateway::SdGateway;
use sdforge_types::{ContentRating, LoraCategory, SdForgeError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::conflicts::{optimize_weights, validate_combination};
use crate::scoring::{categorize, confidence_for, content_rating, prompt_tag_score, tokenize, trigger_words};
use crate::types::{CatalogSummary, Conflict, LoraRecord, SearchHit, SelectedLora, Suggestion};

fn category_to_str(c: LoraCategory) -> &'static str {
    match c {
        LoraCategory::Character => "character",
        LoraCategory::Anime => "anime",
        LoraCategory::Realistic => "realistic",
        LoraCategory::Style => "style",
        LoraCategory::Concept => "concept",
        LoraCategory::General => "general",
    }
}

fn category_from_str(s: &str) -> LoraCategory {
    match s {
        "character" => LoraCategory::Character,
        "anime" => LoraCategory::Anime,
        "realistic" => LoraCategory::Realistic,
        "style" => LoraCategory::Style,
        "concept" => LoraCategory::Concept,
        _ => LoraCategory::General,
    }
}

fn rating_to_str(r: ContentRating) -> &'static str {
    match r {
        ContentRating::Safe => "safe",
        ContentRating::Suggestive => "suggestive",
        ContentRating::Nsfw => "nsfw",
    }
}

fn rating_from_str(s: &str) -> ContentRating {
    match s {
        "suggestive" => ContentRating::Suggestive,
        "nsfw" => ContentRating::Nsfw,
        _ => ContentRating::Safe,
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<LoraRecord, SdForgeError> {
    let trigger_words: Vec<String> = serde_json::from_str(row.get::<&str, _>("trigger_words"))
        .unwrap_or_default();
    let training_tag_frequency: HashMap<String, u64> =
        serde_json::from_str(row.get::<&str, _>("training_tag_frequency")).unwrap_or_default();

    Ok(LoraRecord {
        name: row.get("name"),
        filename: row.get("filename"),
        path: row.get("path"),
        alias: row.get("alias"),
        category: category_from_str(row.get::<&str, _>("category")),
        content_type: rating_from_str(row.get::<&str, _>("content_type")),
        description: row.get("description"),
        trigger_words,
        training_tag_frequency,
        recommended_weight: row.get("recommended_weight"),
        created_at: chrono::DateTime::from_str(row.get::<&str, _>("created_at")).unwrap_or_else(|_| Utc::now()),
        updated_at: chrono::DateTime::from_str(row.get::<&str, _>("updated_at")).unwrap_or_else(|_| Utc::now()),
    })
}

/// Persistent, queryable index of LoRAs with derived intelligence
/// (§4.2 LoRACatalog).
pub struct LoraCatalog {
    pool: SqlitePool,
}

impl LoraCatalog {
    /// Open (creating if absent) a SQLite-backed catalog at `path`,
    /// applying pending migrations.
    pub async fn open(path: &str) -> Result<Self, SdForgeError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| SdForgeError::Configuration(format!("invalid catalog path: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| SdForgeError::Configuration(format!("failed to open LoRA catalog: {e}")))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| SdForgeError::Configuration(format!("LoRA catalog migration failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Build directly from an existing pool (tests, shared-database setups).
    #[must_use]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Pull the engine's LoRA list and derive intelligence for each entry
    /// (§4.2 Ingestion). Idempotent: re-running with identical upstream
    /// data yields identical records.
    pub async fn sync_from_gateway(&self, gateway: &SdGateway) -> Result<usize, SdForgeError> {
        let raw = gateway.list_loras().await?;
        let mut synced = 0;

        for entry in raw {
            let freq: HashMap<String, u64> = entry
                .metadata
                .get("tag_frequency")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default();

            let category = categorize(&freq, &entry.name);
            let content_type = content_rating(&freq);
            let triggers = trigger_words(&freq);
            let now = Utc::now();

            sqlx::query(
                "INSERT INTO lora_records
                    (name, filename, path, alias, category, content_type, description,
                     trigger_words, training_tag_frequency, recommended_weight, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1.0, ?10, ?10)
                 ON CONFLICT(name) DO UPDATE SET
                    filename = excluded.filename,
                    path = excluded.path,
                    alias = excluded.alias,
                    category = excluded.category,
                    content_type = excluded.content_type,
                    trigger_words = excluded.trigger_words,
                    training_tag_frequency = excluded.training_tag_frequency,
                    updated_at = excluded.updated_at",
            )
            .bind(&entry.name)
            .bind(entry.path.clone().unwrap_or_else(|| entry.name.clone()))
            .bind(entry.path.clone().unwrap_or_default())
            .bind(entry.alias.clone())
            .bind(category_to_str(category))
            .bind(rating_to_str(content_type))
            .bind("")
            .bind(serde_json::to_string(&triggers).unwrap_or_else(|_| "[]".into()))
            .bind(serde_json::to_string(&freq).unwrap_or_else(|_| "{}".into()))
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| SdForgeError::Internal(Box::new(e)))?;

            synced += 1;
        }

        tracing::info!(synced, "LoRA catalog sync complete");
        Ok(synced)
    }

    async fn all_records(&self) -> Result<Vec<LoraRecord>, SdForgeError> {
        let rows = sqlx::query("SELECT * FROM lora_records")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SdForgeError::Internal(Box::new(e)))?;
        rows.iter().map(row_to_record).collect()
    }

    /// Totals, counts by category, and global top trigger words (§4.2).
    pub async fn summary(&self) -> Result<CatalogSummary, SdForgeError> {
        let records = self.all_records().await?;
        let mut by_category = HashMap::new();
        let mut word_counts: HashMap<String, usize> = HashMap::new();

        for record in &records {
            *by_category.entry(record.category).or_insert(0) += 1;
            for word in &record.trigger_words {
                *word_counts.entry(word.clone()).or_insert(0) += 1;
            }
        }

        let mut top_trigger_words: Vec<(String, usize)> = word_counts.into_iter().collect();
        top_trigger_words.sort_by(|(a, ca), (b, cb)| cb.cmp(ca).then_with(|| a.cmp(b)));

        Ok(CatalogSummary {
            total: records.len(),
            by_category,
            top_trigger_words: top_trigger_words.into_iter().take(20).map(|(w, _)| w).collect(),
        })
    }

    /// List LoRAs in a category, most recently updated first (§4.2 browse).
    pub async fn browse(&self, category: LoraCategory, limit: usize) -> Result<Vec<LoraRecord>, SdForgeError> {
        let rows = sqlx::query("SELECT * FROM lora_records WHERE category = ?1 ORDER BY updated_at DESC LIMIT ?2")
            .bind(category_to_str(category))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SdForgeError::Internal(Box::new(e)))?;
        rows.iter().map(row_to_record).collect()
    }

    /// Relevance-ranked search over name/description/tags (§4.2 search).
    ///
    /// Score combines substring match on name/description (weight 0.4),
    /// tag membership match (0.4), and category tie-break (0.2).
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SdForgeError> {
        let query_lower = query.to_lowercase();
        let records = self.all_records().await?;

        let mut hits: Vec<SearchHit> = records
            .into_iter()
            .filter_map(|record| {
                let name_desc_match = record.name.to_lowercase().contains(&query_lower)
                    || record.description.to_lowercase().contains(&query_lower);
                let tag_match = record
                    .trigger_words
                    .iter()
                    .any(|t| t.to_lowercase().contains(&query_lower));

                if !name_desc_match && !tag_match {
                    return None;
                }

                let category_tiebreak = 1.0 - (record.category.tie_break_rank() as f64 / 6.0);
                let score = (name_desc_match as u8 as f64) * 0.4
                    + (tag_match as u8 as f64) * 0.4
                    + category_tiebreak * 0.2;

                Some(SearchHit { record, score })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    /// Score every catalogued LoRA against a prompt and return the top-N
    /// (§4.2 suggest_for_prompt, §8 scenario 1).
    pub async fn suggest_for_prompt(&self, prompt: &str, limit: usize) -> Result<Vec<Suggestion>, SdForgeError> {
        let prompt_tokens = tokenize(prompt);
        let records = self.all_records().await?;

        let mut suggestions: Vec<Suggestion> = records
            .into_iter()
            .map(|record| {
                let (score, matching_tags) = prompt_tag_score(&record.training_tag_frequency, &prompt_tokens);
                Suggestion {
                    name: record.name,
                    score,
                    confidence: confidence_for(score),
                    matching_tags,
                    recommended_weight: record.recommended_weight,
                }
            })
            .filter(|s| s.score > 0.0)
            .collect();

        // Deterministic ordering given a fixed snapshot and prompt (§8).
        suggestions.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        suggestions.truncate(limit);
        Ok(suggestions)
    }

    /// Detect conflicts in a selected combination (§4.2 validate_combination).
    #[must_use]
    pub fn validate_combination(&self, selected: &[SelectedLora]) -> Vec<Conflict> {
        validate_combination(selected)
    }

    /// Apply a style-preference multiplier, clamped to each LoRA's bounds
    /// (§4.2 optimize_weights). Bounds default to `[0.0, 2.0]` when the
    /// catalog has no per-LoRA override.
    #[must_use]
    pub fn optimize_weights(
        &self,
        recommended: &[(String, f64)],
        style_preference: sdforge_types::StylePreference,
    ) -> Vec<(String, f64)> {
        optimize_weights(recommended, style_preference, 0.0, 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_catalog() -> LoraCatalog {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        LoraCatalog::from_pool(pool)
    }

    #[tokio::test]
    async fn summary_on_empty_catalog() {
        let catalog = test_catalog().await;
        let summary = catalog.summary().await.unwrap();
        assert_eq!(summary.total, 0);
    }

    #[tokio::test]
    async fn suggest_for_prompt_is_deterministic() {
        let catalog = test_catalog().await;
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO lora_records (name, filename, path, alias, category, content_type,
             description, trigger_words, training_tag_frequency, recommended_weight, created_at, updated_at)
             VALUES ('animeStyleV4', 'f.safetensors', '/p', NULL, 'anime', 'safe', '',
             '[\"anime\"]', '{\"anime\":500,\"1girl\":450,\"cat ears\":80,\"solo\":400}', 1.0, ?1, ?1)",
        )
        .bind(&now)
        .execute(&catalog.pool)
        .await
        .unwrap();

        let first = catalog.suggest_for_prompt("anime girl with cat ears", 10).await.unwrap();
        let second = catalog.suggest_for_prompt("anime girl with cat ears", 10).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert!((first[0].score - 0.72027972).abs() < 1e-4);
    }
}
