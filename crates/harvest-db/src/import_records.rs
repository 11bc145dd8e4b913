//! Staging table operations.
//!
//! `import_records` holds one row per listing detail URL. The crawler only
//! ever inserts; moderation workflows outside this repository update the
//! status later. `source_url` is unique, so an insert for a known URL is a
//! no-op rather than an error.

use chrono::{DateTime, Utc};
use harvest_core::ImportStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{Pool, Row, Sqlite};

/// A persisted staging row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRecord {
    pub id: String,
    /// Absolute URL of the listing's detail page; the dedup key
    pub source_url: String,
    pub source_system: String,
    pub business_name: String,
    pub raw_category: Option<String>,
    pub category_id: String,
    pub raw_city: Option<String>,
    pub city_id: Option<i64>,
    pub status: ImportStatus,
    pub rejection_reason: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub social_links: Vec<String>,
    pub description: Option<String>,
    pub raw_payload: JsonValue,
    pub duplicate_score: f64,
    pub created_at: DateTime<Utc>,
}

/// Values for a new staging row.
#[derive(Debug, Clone)]
pub struct NewImportRecord {
    pub source_url: String,
    pub source_system: String,
    pub business_name: String,
    pub raw_category: Option<String>,
    pub category_id: String,
    pub raw_city: Option<String>,
    pub city_id: Option<i64>,
    pub status: ImportStatus,
    pub rejection_reason: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub social_links: Vec<String>,
    pub description: Option<String>,
    pub raw_payload: JsonValue,
}

/// Whether a row with this source URL already exists.
pub async fn exists_by_source_url(
    pool: &Pool<Sqlite>,
    source_url: &str,
) -> Result<bool, sqlx::Error> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM import_records WHERE source_url = ? LIMIT 1")
            .bind(source_url)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

/// Insert a staging row.
///
/// Returns `false` when a row with the same `source_url` already exists;
/// the existing row is left untouched.
pub async fn insert(pool: &Pool<Sqlite>, record: &NewImportRecord) -> Result<bool, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let social_json = serde_json::to_string(&record.social_links).unwrap_or_else(|_| "[]".into());
    let payload_json = serde_json::to_string(&record.raw_payload).unwrap_or_else(|_| "{}".into());

    let result = sqlx::query(
        "INSERT INTO import_records (id, source_url, source_system, business_name, raw_category,
                                     category_id, raw_city, city_id, status, rejection_reason,
                                     email, phone, website, social_links, description,
                                     raw_payload, duplicate_score, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
         ON CONFLICT(source_url) DO NOTHING",
    )
    .bind(&id)
    .bind(&record.source_url)
    .bind(&record.source_system)
    .bind(&record.business_name)
    .bind(&record.raw_category)
    .bind(&record.category_id)
    .bind(&record.raw_city)
    .bind(record.city_id)
    .bind(record.status.as_str())
    .bind(&record.rejection_reason)
    .bind(&record.email)
    .bind(&record.phone)
    .bind(&record.website)
    .bind(&social_json)
    .bind(&record.description)
    .bind(&payload_json)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Fetch a staging row by its source URL.
pub async fn get_by_source_url(
    pool: &Pool<Sqlite>,
    source_url: &str,
) -> Result<Option<ImportRecord>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, source_url, source_system, business_name, raw_category, category_id,
                raw_city, city_id, status, rejection_reason, email, phone, website,
                social_links, description, raw_payload, duplicate_score, created_at
         FROM import_records WHERE source_url = ?",
    )
    .bind(source_url)
    .fetch_optional(pool)
    .await?;

    row.map(|row| parse_import_record(&row)).transpose()
}

/// Number of staging rows, optionally restricted to one source system.
pub async fn count(pool: &Pool<Sqlite>, source_system: Option<&str>) -> Result<i64, sqlx::Error> {
    match source_system {
        Some(system) => {
            sqlx::query_scalar("SELECT COUNT(*) FROM import_records WHERE source_system = ?")
                .bind(system)
                .fetch_one(pool)
                .await
        }
        None => {
            sqlx::query_scalar("SELECT COUNT(*) FROM import_records")
                .fetch_one(pool)
                .await
        }
    }
}

/// Row counts grouped by status, for operator summaries.
pub async fn count_by_status(
    pool: &Pool<Sqlite>,
    source_system: &str,
) -> Result<Vec<(ImportStatus, i64)>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT status, COUNT(*) FROM import_records WHERE source_system = ?
         GROUP BY status ORDER BY status",
    )
    .bind(source_system)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(status, n)| (ImportStatus::parse(&status), n))
        .collect())
}

fn parse_import_record(row: &sqlx::sqlite::SqliteRow) -> Result<ImportRecord, sqlx::Error> {
    let status: String = row.try_get("status")?;

    let social: String = row.try_get("social_links")?;
    let social_links = serde_json::from_str(&social).unwrap_or_default();

    let payload: String = row.try_get("raw_payload")?;
    let raw_payload = serde_json::from_str(&payload).unwrap_or(JsonValue::Null);

    let created_at: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
        .with_timezone(&Utc);

    Ok(ImportRecord {
        id: row.try_get("id")?,
        source_url: row.try_get("source_url")?,
        source_system: row.try_get("source_system")?,
        business_name: row.try_get("business_name")?,
        raw_category: row.try_get("raw_category")?,
        category_id: row.try_get("category_id")?,
        raw_city: row.try_get("raw_city")?,
        city_id: row.try_get("city_id")?,
        status: ImportStatus::parse(&status),
        rejection_reason: row.try_get("rejection_reason")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        website: row.try_get("website")?,
        social_links,
        description: row.try_get("description")?,
        raw_payload,
        duplicate_score: row.try_get("duplicate_score")?,
        created_at,
    })
}
