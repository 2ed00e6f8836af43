use crate::types::{
    Change, Check, CheckStatus, Link, LinkType, MonitorError, Result, Snippet,
};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS competitors (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS links (
    id             TEXT PRIMARY KEY,
    competitor_id  TEXT NOT NULL REFERENCES competitors(id) ON DELETE CASCADE,
    url            TEXT NOT NULL,
    link_type      TEXT NOT NULL,
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS checks (
    id            TEXT PRIMARY KEY,
    link_id       TEXT NOT NULL REFERENCES links(id) ON DELETE CASCADE,
    content       TEXT NOT NULL,
    text_content  TEXT NOT NULL,
    status        TEXT NOT NULL,
    error_msg     TEXT,
    check_date    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS changes (
    id               TEXT PRIMARY KEY,
    check_id         TEXT NOT NULL REFERENCES checks(id) ON DELETE CASCADE,
    diff_text        TEXT NOT NULL,
    summary          TEXT,
    has_significant  INTEGER NOT NULL,
    snippets         TEXT,
    created_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_checks_link_date ON checks(link_id, check_date DESC);
CREATE INDEX IF NOT EXISTS idx_changes_check ON changes(check_id);
"#;

/// CRUD store for competitors, links, checks and changes. Checks and
/// changes are append-only; nothing here mutates them after insertion.
pub struct CheckStore {
    db: SqlitePool,
}

impl CheckStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // An in-memory database exists per connection, so the pool must
        // not hand out more than one.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let db = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&db).await?;

        Ok(Self { db })
    }

    pub async fn add_competitor(&self, name: &str) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query("INSERT INTO competitors (id, name, created_at) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(name)
            .bind(now.to_rfc3339())
            .execute(&self.db)
            .await?;

        info!("Added competitor: {} (ID: {})", name, id);
        Ok(id)
    }

    pub async fn add_link(
        &self,
        competitor_id: Uuid,
        url: &str,
        link_type: LinkType,
    ) -> Result<Uuid> {
        let parsed = url::Url::parse(url)?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host().is_none() {
            return Err(MonitorError::General(format!(
                "not an http(s) URL: {url}"
            )));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO links (id, competitor_id, url, link_type, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(competitor_id.to_string())
        .bind(url)
        .bind(link_type.as_str())
        .bind(now.to_rfc3339())
        .execute(&self.db)
        .await?;

        info!("Added {} link: {} (ID: {})", link_type, url, id);
        Ok(id)
    }

    pub async fn get_link(&self, link_id: Uuid) -> Result<Link> {
        let row = sqlx::query("SELECT * FROM links WHERE id = ?")
            .bind(link_id.to_string())
            .fetch_optional(&self.db)
            .await?;

        match row {
            Some(row) => row_to_link(&row),
            None => Err(MonitorError::LinkNotFound { id: link_id }),
        }
    }

    pub async fn links_for_competitor(&self, competitor_id: Uuid) -> Result<Vec<Link>> {
        let rows = sqlx::query(
            "SELECT * FROM links WHERE competitor_id = ? ORDER BY created_at",
        )
        .bind(competitor_id.to_string())
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(row_to_link).collect()
    }

    /// Most recently persisted check for a link, if any.
    pub async fn latest_check(&self, link_id: Uuid) -> Result<Option<Check>> {
        let row = sqlx::query(
            "SELECT * FROM checks WHERE link_id = ? ORDER BY check_date DESC LIMIT 1",
        )
        .bind(link_id.to_string())
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(row_to_check).transpose()
    }

    pub async fn create_check(
        &self,
        link_id: Uuid,
        content: String,
        text_content: String,
        status: CheckStatus,
        error_msg: Option<String>,
    ) -> Result<Check> {
        let check = Check {
            id: Uuid::new_v4(),
            link_id,
            content,
            text_content,
            status,
            error_msg,
            check_date: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO checks (id, link_id, content, text_content, status, error_msg, check_date) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(check.id.to_string())
        .bind(check.link_id.to_string())
        .bind(&check.content)
        .bind(&check.text_content)
        .bind(check.status.as_str())
        .bind(&check.error_msg)
        .bind(check.check_date.to_rfc3339())
        .execute(&self.db)
        .await?;

        debug!(
            "Recorded {} check {} for link {}",
            check.status, check.id, check.link_id
        );
        Ok(check)
    }

    pub async fn create_change(
        &self,
        check_id: Uuid,
        diff_text: &str,
        summary: Option<&str>,
        has_significant: bool,
        snippets: Option<&[Snippet]>,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let snippets_json = snippets.map(|s| serde_json::to_string(s)).transpose()?;

        sqlx::query(
            "INSERT INTO changes (id, check_id, diff_text, summary, has_significant, snippets, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(check_id.to_string())
        .bind(diff_text)
        .bind(summary)
        .bind(has_significant)
        .bind(snippets_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;

        info!(
            "Recorded change {} for check {} (significant: {})",
            id, check_id, has_significant
        );
        Ok(id)
    }

    /// Recent changes for a link, newest first.
    pub async fn changes_for_link(&self, link_id: Uuid, limit: u32) -> Result<Vec<Change>> {
        let rows = sqlx::query(
            "SELECT changes.* FROM changes \
             JOIN checks ON checks.id = changes.check_id \
             WHERE checks.link_id = ? \
             ORDER BY changes.created_at DESC LIMIT ?",
        )
        .bind(link_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(row_to_change).collect()
    }

    /// Liveness probe for status reporting.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

fn parse_uuid(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw).map_err(|e| MonitorError::General(format!("bad uuid in {column}: {e}")))
}

fn parse_timestamp(row: &SqliteRow, column: &str) -> Result<chrono::DateTime<Utc>> {
    let raw: String = row.try_get(column)?;
    chrono::DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| MonitorError::General(format!("bad timestamp in {column}: {e}")))
}

fn row_to_link(row: &SqliteRow) -> Result<Link> {
    let link_type: String = row.try_get("link_type")?;
    Ok(Link {
        id: parse_uuid(row, "id")?,
        competitor_id: parse_uuid(row, "competitor_id")?,
        url: row.try_get("url")?,
        link_type: link_type.parse().unwrap_or(LinkType::Other),
        created_at: parse_timestamp(row, "created_at")?,
    })
}

fn row_to_check(row: &SqliteRow) -> Result<Check> {
    let status: String = row.try_get("status")?;
    Ok(Check {
        id: parse_uuid(row, "id")?,
        link_id: parse_uuid(row, "link_id")?,
        content: row.try_get("content")?,
        text_content: row.try_get("text_content")?,
        status: status.parse()?,
        error_msg: row.try_get("error_msg")?,
        check_date: parse_timestamp(row, "check_date")?,
    })
}

fn row_to_change(row: &SqliteRow) -> Result<Change> {
    Ok(Change {
        id: parse_uuid(row, "id")?,
        check_id: parse_uuid(row, "check_id")?,
        diff_text: row.try_get("diff_text")?,
        summary: row.try_get("summary")?,
        has_significant: row.try_get("has_significant")?,
        snippets: row.try_get("snippets")?,
        created_at: parse_timestamp(row, "created_at")?,
    })
}
