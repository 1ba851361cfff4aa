// src/store/mod.rs
//! SQLite persistence for categories and articles.
//!
//! Two invariants live here, both enforced by the schema rather than by the
//! pipeline: `categories.name` is unique (get-or-create is race-safe), and
//! `articles (title, source)` is unique (ingesting the same pair again
//! updates the mutable fields instead of duplicating the row).

mod entities;

pub use entities::{Article, Category};

use anyhow::{Context, Result};
use chrono::Utc;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Row};

use crate::ingest::types::ArticleCandidate;

// Type alias to make signatures clearer.
pub type Pool = r2d2::Pool<SqliteConnectionManager>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS categories (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS articles (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    title        TEXT NOT NULL,
    content      TEXT NOT NULL,
    author       TEXT,
    source       TEXT NOT NULL,
    published_at TEXT NOT NULL,
    category_id  INTEGER NOT NULL REFERENCES categories (id) ON DELETE CASCADE,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    UNIQUE (title, source)
);
";

#[derive(Clone)]
pub struct Store {
    pool: Pool,
}

impl Store {
    pub fn open(path: &str) -> Result<Self> {
        Self::build(SqliteConnectionManager::file(path), 10)
    }

    /// Pool capped at one connection: every pooled connection of a plain
    /// `:memory:` manager would otherwise see its own empty database.
    pub fn open_in_memory() -> Result<Self> {
        Self::build(SqliteConnectionManager::memory(), 1)
    }

    fn build(manager: SqliteConnectionManager, max_size: u32) -> Result<Self> {
        let manager = manager.with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
        });
        let pool = r2d2::Pool::builder()
            .max_size(max_size)
            .build(manager)
            .context("building sqlite pool")?;
        let store = Self { pool };
        store
            .conn()?
            .execute_batch(SCHEMA)
            .context("creating schema")?;
        Ok(store)
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool.get().context("getting sqlite connection")
    }

    /// Idempotent get-or-create keyed on the exact name. A concurrent insert
    /// losing the uniqueness race falls through to the select.
    pub fn category_id(&self, name: &str) -> Result<i64> {
        let conn = self.conn()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO categories (name, created_at, updated_at)
             VALUES (?1, ?2, ?2)
             ON CONFLICT (name) DO NOTHING",
            params![name, now],
        )
        .context("inserting category")?;
        conn.query_row(
            "SELECT id FROM categories WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .context("selecting category id")
    }

    pub fn find_category(&self, name: &str) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM categories WHERE name = ?1")?;
        let mut rows = stmt.query_map(params![name], map_category)?;
        rows.next().transpose().context("selecting category")
    }

    /// Pre-create the configured category list at startup.
    pub fn seed_categories(&self, names: &[String]) -> Result<()> {
        for name in names {
            self.category_id(name)?;
        }
        Ok(())
    }

    /// Insert-or-update keyed on (title, source). A later ingest of the same
    /// pair refreshes content, author, published_at and category.
    pub fn upsert_article(&self, candidate: &ArticleCandidate, category_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO articles
                 (title, content, author, source, published_at, category_id,
                  created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT (title, source) DO UPDATE SET
                 content      = excluded.content,
                 author       = excluded.author,
                 published_at = excluded.published_at,
                 category_id  = excluded.category_id,
                 updated_at   = excluded.updated_at",
            params![
                candidate.title,
                candidate.content,
                candidate.author,
                candidate.source,
                candidate.published_at,
                category_id,
                now,
            ],
        )
        .context("upserting article")?;
        Ok(())
    }

    pub fn find_article(&self, title: &str, source: &str) -> Result<Option<Article>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, content, author, source, published_at, category_id,
                    created_at, updated_at
             FROM articles WHERE title = ?1 AND source = ?2",
        )?;
        let mut rows = stmt.query_map(params![title, source], map_article)?;
        rows.next().transpose().context("selecting article")
    }

    pub fn article_count(&self) -> Result<i64> {
        let conn = self.conn()?;
        conn.query_row("SELECT count(*) FROM articles", [], |row| row.get(0))
            .context("counting articles")
    }

    pub fn category_count(&self) -> Result<i64> {
        let conn = self.conn()?;
        conn.query_row("SELECT count(*) FROM categories", [], |row| row.get(0))
            .context("counting categories")
    }
}

fn map_category(row: &Row) -> Result<Category, rusqlite::Error> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

fn map_article(row: &Row) -> Result<Article, rusqlite::Error> {
    Ok(Article {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        author: row.get(3)?,
        source: row.get(4)?,
        published_at: row.get(5)?,
        category_id: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candidate(title: &str, content: &str) -> ArticleCandidate {
        ArticleCandidate {
            title: title.into(),
            content: content.into(),
            author: Some("Jo".into()),
            source: "example.org".into(),
            published_at: Utc.with_ymd_and_hms(2024, 11, 20, 8, 0, 0).unwrap(),
            category: "Tech".into(),
        }
    }

    #[test]
    fn category_get_or_create_reuses_rows() {
        let store = Store::open_in_memory().unwrap();
        let a = store.category_id("Tech").unwrap();
        let b = store.category_id("Tech").unwrap();
        assert_eq!(a, b);
        assert_eq!(store.category_count().unwrap(), 1);

        let c = store.category_id("Sports").unwrap();
        assert_ne!(a, c);
        assert_eq!(store.category_count().unwrap(), 2);
    }

    #[test]
    fn upsert_updates_instead_of_duplicating() {
        let store = Store::open_in_memory().unwrap();
        let tech = store.category_id("Tech").unwrap();
        let sports = store.category_id("Sports").unwrap();

        store.upsert_article(&candidate("T", "first"), tech).unwrap();
        store.upsert_article(&candidate("T", "second"), sports).unwrap();

        assert_eq!(store.article_count().unwrap(), 1);
        let stored = store.find_article("T", "example.org").unwrap().unwrap();
        assert_eq!(stored.content, "second");
        assert_eq!(stored.category_id, sports);
    }

    #[test]
    fn different_sources_are_distinct_articles() {
        let store = Store::open_in_memory().unwrap();
        let tech = store.category_id("Tech").unwrap();
        let mut other = candidate("T", "body");
        other.source = "another.org".into();

        store.upsert_article(&candidate("T", "body"), tech).unwrap();
        store.upsert_article(&other, tech).unwrap();
        assert_eq!(store.article_count().unwrap(), 2);
    }

    #[test]
    fn nullable_author_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let tech = store.category_id("Tech").unwrap();
        let mut anon = candidate("T", "body");
        anon.author = None;
        store.upsert_article(&anon, tech).unwrap();
        let stored = store.find_article("T", "example.org").unwrap().unwrap();
        assert_eq!(stored.author, None);
        assert_eq!(
            stored.published_at,
            Utc.with_ymd_and_hms(2024, 11, 20, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn deleting_a_category_cascades_to_articles() {
        let store = Store::open_in_memory().unwrap();
        let tech = store.category_id("Tech").unwrap();
        store.upsert_article(&candidate("T", "body"), tech).unwrap();

        store
            .conn()
            .unwrap()
            .execute("DELETE FROM categories WHERE id = ?1", params![tech])
            .unwrap();
        assert_eq!(store.article_count().unwrap(), 0);
    }

    #[test]
    fn seed_categories_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let names = vec!["Tech".to_string(), "Sports".to_string()];
        store.seed_categories(&names).unwrap();
        store.seed_categories(&names).unwrap();
        assert_eq!(store.category_count().unwrap(), 2);
    }
}
