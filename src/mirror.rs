use crate::types::OptimisticMessage;
use anyhow::Result;
use chrono::Utc;
use sqlx::{AnyPool, Row};
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbKind {
    Sqlite,
    Postgres,
}

pub fn db_kind_from_url(url: &str) -> DbKind {
    let lower = url.to_lowercase();
    if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
        DbKind::Postgres
    } else {
        DbKind::Sqlite
    }
}

pub fn rewrite_sql<'a>(sql: &'a str, kind: DbKind) -> Cow<'a, str> {
    match kind {
        DbKind::Sqlite => Cow::Borrowed(sql),
        DbKind::Postgres => {
            let mut out = String::with_capacity(sql.len() + 8);
            let mut idx = 1;
            for ch in sql.chars() {
                if ch == '?' {
                    out.push('$');
                    out.push_str(&idx.to_string());
                    idx += 1;
                } else {
                    out.push(ch);
                }
            }
            Cow::Owned(out)
        }
    }
}

pub fn failed_slot_key(chat_id: &str) -> String {
    format!("failed_messages_{}", chat_id)
}

pub async fn init_mirror(pool: &AnyPool, kind: DbKind) -> Result<()> {
    let stmt = r#"CREATE TABLE IF NOT EXISTS client_state (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )"#;
    let sql = rewrite_sql(stmt, kind);
    sqlx::query(sql.as_ref()).execute(pool).await?;
    Ok(())
}

pub async fn save_failed_snapshot(
    pool: &AnyPool,
    kind: DbKind,
    chat_id: &str,
    entries: &[OptimisticMessage],
) -> Result<()> {
    if entries.is_empty() {
        return clear_failed_snapshot(pool, kind, chat_id).await;
    }
    let sql = rewrite_sql(
        r#"INSERT INTO client_state (key, value, updated_at) VALUES (?, ?, ?)
           ON CONFLICT(key) DO UPDATE SET value=excluded.value, updated_at=excluded.updated_at"#,
        kind,
    );
    sqlx::query(sql.as_ref())
        .bind(failed_slot_key(chat_id))
        .bind(serde_json::to_string(entries)?)
        .bind(Utc::now().timestamp())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn load_failed_snapshot(
    pool: &AnyPool,
    kind: DbKind,
    chat_id: &str,
) -> Result<Vec<OptimisticMessage>> {
    let sql = rewrite_sql("SELECT value FROM client_state WHERE key = ?", kind);
    let row = sqlx::query(sql.as_ref())
        .bind(failed_slot_key(chat_id))
        .fetch_optional(pool)
        .await?;

    if let Some(row) = row {
        let value: String = row.try_get("value")?;
        return Ok(serde_json::from_str(&value).unwrap_or_default());
    }
    Ok(Vec::new())
}

pub async fn clear_failed_snapshot(pool: &AnyPool, kind: DbKind, chat_id: &str) -> Result<()> {
    let sql = rewrite_sql("DELETE FROM client_state WHERE key = ?", kind);
    sqlx::query(sql.as_ref())
        .bind(failed_slot_key(chat_id))
        .execute(pool)
        .await?;
    Ok(())
}
