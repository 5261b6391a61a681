//! Content store port and its implementations.
//!
//! The pipeline talks to persistence through the [`ContentStore`] trait so
//! the generation stages can run against a real database or an in-memory
//! fake. The primary implementation is [`LibsqlStore`], a libSQL embedded
//! database with versioned migrations; [`memory::MemoryStore`] backs unit
//! tests and offline experiments.
//!
//! Writes are independent inserts with freshly generated identifiers — the
//! store is a content pool, not a uniqueness-constrained catalog, so no
//! read-before-write deduplication happens here.

mod migrations;

pub mod memory;

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use libsql::{Connection, Database, params};

use quizsmith_shared::{
    ContentCandidate, ContentItem, CoverageKey, Difficulty, ItemId, ItemStatus, Payload,
    QuestionType, QuizsmithError, Result,
};

// ---------------------------------------------------------------------------
// ContentStore port
// ---------------------------------------------------------------------------

/// Append-only persistence port for generated content.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Append one item. A failure here fails only this item, never a batch.
    async fn insert_item(&self, item: &ContentItem) -> Result<()>;

    /// Fetch one item by id.
    async fn get_item(&self, id: &ItemId) -> Result<Option<ContentItem>>;

    /// Current ready-item counts grouped by coverage key. Keys with no items
    /// are absent from the map.
    async fn count_by_key(&self) -> Result<HashMap<CoverageKey, u64>>;
}

/// Persist a validated candidate: assign a fresh id, denormalize the coverage
/// key onto the row, and append it to the store.
pub async fn persist_candidate(
    store: &dyn ContentStore,
    key: CoverageKey,
    candidate: &ContentCandidate,
    model_id: &str,
) -> Result<ContentItem> {
    let item = ContentItem::from_candidate(key, candidate, model_id);
    store.insert_item(&item).await?;
    tracing::debug!(id = %item.id, key = %item.key, "content item persisted");
    Ok(item)
}

// ---------------------------------------------------------------------------
// LibsqlStore
// ---------------------------------------------------------------------------

/// Primary storage handle wrapping a libSQL database.
pub struct LibsqlStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl LibsqlStore {
    /// Open or create a database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| QuizsmithError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| QuizsmithError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| QuizsmithError::Storage(e.to_string()))?;

        let store = Self { db, conn };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        QuizsmithError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }
}

#[async_trait]
impl ContentStore for LibsqlStore {
    async fn insert_item(&self, item: &ContentItem) -> Result<()> {
        let payload_json = serde_json::to_string(&item.payload)
            .map_err(|e| QuizsmithError::Storage(format!("payload serialize: {e}")))?;

        self.conn
            .execute(
                "INSERT INTO content_items
                   (id, skill_node, difficulty, question_type, language,
                    prompt, payload_json, model_id, content_hash, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    item.id.to_string(),
                    item.key.skill_node.as_str(),
                    i64::from(item.key.difficulty.value()),
                    item.key.question_type.as_str(),
                    item.key.language.as_str(),
                    item.prompt.as_str(),
                    payload_json.as_str(),
                    item.model_id.as_str(),
                    item.content_hash.as_str(),
                    item.status.as_str(),
                    item.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| QuizsmithError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn get_item(&self, id: &ItemId) -> Result<Option<ContentItem>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, skill_node, difficulty, question_type, language,
                        prompt, payload_json, model_id, content_hash, status, created_at
                 FROM content_items WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| QuizsmithError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_item(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(QuizsmithError::Storage(e.to_string())),
        }
    }

    async fn count_by_key(&self) -> Result<HashMap<CoverageKey, u64>> {
        let mut rows = self
            .conn
            .query(
                "SELECT skill_node, difficulty, question_type, language, COUNT(*)
                 FROM content_items
                 WHERE status = 'ready'
                 GROUP BY skill_node, difficulty, question_type, language",
                params![],
            )
            .await
            .map_err(|e| QuizsmithError::Storage(e.to_string()))?;

        let mut counts = HashMap::new();
        while let Ok(Some(row)) = rows.next().await {
            let skill_node: String = row
                .get(0)
                .map_err(|e| QuizsmithError::Storage(e.to_string()))?;
            let difficulty: i64 = row
                .get(1)
                .map_err(|e| QuizsmithError::Storage(e.to_string()))?;
            let question_type: String = row
                .get(2)
                .map_err(|e| QuizsmithError::Storage(e.to_string()))?;
            let language: String = row
                .get(3)
                .map_err(|e| QuizsmithError::Storage(e.to_string()))?;
            let count: i64 = row
                .get(4)
                .map_err(|e| QuizsmithError::Storage(e.to_string()))?;

            let key = CoverageKey {
                skill_node,
                difficulty: Difficulty::clamp(difficulty),
                question_type: QuestionType::from_str(&question_type)?,
                language,
            };
            counts.insert(key, count as u64);
        }
        Ok(counts)
    }
}

/// Convert a database row to a [`ContentItem`].
fn row_to_item(row: &libsql::Row) -> Result<ContentItem> {
    let id_str: String = row
        .get(0)
        .map_err(|e| QuizsmithError::Storage(e.to_string()))?;
    let payload_json: String = row
        .get(6)
        .map_err(|e| QuizsmithError::Storage(e.to_string()))?;
    let payload: Payload = serde_json::from_str(&payload_json)
        .map_err(|e| QuizsmithError::Storage(format!("payload parse: {e}")))?;
    let status_str: String = row
        .get(9)
        .map_err(|e| QuizsmithError::Storage(e.to_string()))?;

    Ok(ContentItem {
        id: ItemId::from_str(&id_str)
            .map_err(|e| QuizsmithError::Storage(format!("invalid item id: {e}")))?,
        key: CoverageKey {
            skill_node: row
                .get::<String>(1)
                .map_err(|e| QuizsmithError::Storage(e.to_string()))?,
            difficulty: Difficulty::clamp(
                row.get::<i64>(2)
                    .map_err(|e| QuizsmithError::Storage(e.to_string()))?,
            ),
            question_type: QuestionType::from_str(
                &row.get::<String>(3)
                    .map_err(|e| QuizsmithError::Storage(e.to_string()))?,
            )?,
            language: row
                .get::<String>(4)
                .map_err(|e| QuizsmithError::Storage(e.to_string()))?,
        },
        prompt: row
            .get::<String>(5)
            .map_err(|e| QuizsmithError::Storage(e.to_string()))?,
        payload,
        model_id: row
            .get::<String>(7)
            .map_err(|e| QuizsmithError::Storage(e.to_string()))?,
        content_hash: row
            .get::<String>(8)
            .map_err(|e| QuizsmithError::Storage(e.to_string()))?,
        status: ItemStatus::from_str(&status_str)?,
        created_at: {
            let s: String = row
                .get(10)
                .map_err(|e| QuizsmithError::Storage(e.to_string()))?;
            chrono::DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .map_err(|e| QuizsmithError::Storage(format!("invalid date: {e}")))?
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizsmith_shared::MultipleChoicePayload;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_store() -> LibsqlStore {
        let tmp = std::env::temp_dir().join(format!("qs_test_{}.db", Uuid::now_v7()));
        LibsqlStore::open(&tmp).await.expect("open test db")
    }

    fn key(skill: &str, difficulty: i64, qt: QuestionType) -> CoverageKey {
        CoverageKey {
            skill_node: skill.into(),
            difficulty: Difficulty::clamp(difficulty),
            question_type: qt,
            language: "en".into(),
        }
    }

    fn mc_candidate(prompt: &str) -> ContentCandidate {
        ContentCandidate {
            prompt: prompt.into(),
            difficulty: Some(2),
            payload: Payload::MultipleChoice(MultipleChoicePayload {
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                answer: 0,
                explanation: "a is correct".into(),
            }),
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let store = test_store().await;
        assert_eq!(store.schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("qs_test_{}.db", Uuid::now_v7()));
        let s1 = LibsqlStore::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = LibsqlStore::open(&tmp).await.expect("second open");
        assert_eq!(s2.schema_version().await, 1);
    }

    #[tokio::test]
    async fn insert_and_get_roundtrip() {
        let store = test_store().await;
        let item = ContentItem::from_candidate(
            key("algebra-linear-equations", 2, QuestionType::MultipleChoice),
            &mc_candidate("Solve x + 1 = 3."),
            "kimi-k2",
        );

        store.insert_item(&item).await.expect("insert");

        let found = store.get_item(&item.id).await.expect("get").expect("some");
        assert_eq!(found.id, item.id);
        assert_eq!(found.key, item.key);
        assert_eq!(found.prompt, "Solve x + 1 = 3.");
        assert_eq!(found.payload, item.payload);
        assert_eq!(found.status, ItemStatus::Ready);
        assert_eq!(found.content_hash, item.content_hash);
    }

    #[tokio::test]
    async fn missing_item_is_none() {
        let store = test_store().await;
        let found = store.get_item(&ItemId::new()).await.expect("get");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn count_groups_by_coverage_key() {
        let store = test_store().await;
        let k1 = key("algebra-linear-equations", 2, QuestionType::MultipleChoice);
        let k2 = key("geometry-triangles", 4, QuestionType::Ordering);

        for _ in 0..3 {
            let item =
                ContentItem::from_candidate(k1.clone(), &mc_candidate("Q1"), "kimi-k2");
            store.insert_item(&item).await.unwrap();
        }
        let item = ContentItem::from_candidate(k2.clone(), &mc_candidate("Q2"), "kimi-k2");
        store.insert_item(&item).await.unwrap();

        let counts = store.count_by_key().await.expect("count");
        assert_eq!(counts.get(&k1), Some(&3));
        assert_eq!(counts.get(&k2), Some(&1));
        assert_eq!(counts.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_content_is_two_rows() {
        // The store is a content pool: identical candidates land as
        // independent rows with distinct ids.
        let store = test_store().await;
        let k = key("algebra-linear-equations", 2, QuestionType::MultipleChoice);
        let candidate = mc_candidate("Solve x + 1 = 3.");

        let a = persist_candidate(&store, k.clone(), &candidate, "kimi-k2")
            .await
            .expect("first write");
        let b = persist_candidate(&store, k.clone(), &candidate, "kimi-k2")
            .await
            .expect("second write");

        assert_ne!(a.id, b.id);
        assert_eq!(a.content_hash, b.content_hash);

        let counts = store.count_by_key().await.unwrap();
        assert_eq!(counts.get(&k), Some(&2));
    }
}
