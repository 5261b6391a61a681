//! SQL migration definitions for the Quizsmith content database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: content_items",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Generated content pool. Append-only: the pipeline inserts rows and never
-- updates or deletes them; superseding content is a new row.
CREATE TABLE IF NOT EXISTS content_items (
    id            TEXT PRIMARY KEY,
    skill_node    TEXT NOT NULL,
    difficulty    INTEGER NOT NULL,
    question_type TEXT NOT NULL,
    language      TEXT NOT NULL,
    prompt        TEXT NOT NULL,
    payload_json  TEXT NOT NULL,
    model_id      TEXT NOT NULL,
    content_hash  TEXT NOT NULL,
    status        TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

-- Coverage counting groups by the four key columns
CREATE INDEX IF NOT EXISTS idx_items_coverage
    ON content_items(skill_node, difficulty, question_type, language);

CREATE INDEX IF NOT EXISTS idx_items_status ON content_items(status);
CREATE INDEX IF NOT EXISTS idx_items_content_hash ON content_items(content_hash);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
