//! Read access to the city reference tables.

use crate::error::Result;
use sqlx::{Pool, Sqlite};

/// A canonical city.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct City {
    pub id: i64,
    pub name: String,
}

/// Alternative spelling that maps onto a canonical city.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityAlias {
    pub alias: String,
    pub city_id: i64,
}

/// Load every city. Called once per crawl run.
pub async fn load_cities(pool: &Pool<Sqlite>) -> Result<Vec<City>> {
    let rows = sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM cities ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(id, name)| City { id, name })
        .collect())
}

/// Load every alias. Called once per crawl run.
pub async fn load_aliases(pool: &Pool<Sqlite>) -> Result<Vec<CityAlias>> {
    let rows =
        sqlx::query_as::<_, (String, i64)>("SELECT alias, city_id FROM city_aliases ORDER BY alias")
            .fetch_all(pool)
            .await?;

    Ok(rows
        .into_iter()
        .map(|(alias, city_id)| CityAlias { alias, city_id })
        .collect())
}

/// Insert or rename a city. Used for seeding.
pub async fn upsert_city(pool: &Pool<Sqlite>, id: i64, name: &str) -> Result<()> {
    sqlx::query("INSERT INTO cities (id, name) VALUES (?, ?) ON CONFLICT(id) DO UPDATE SET name = excluded.name")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn insert_alias(pool: &Pool<Sqlite>, alias: &str, city_id: i64) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO city_aliases (alias, city_id) VALUES (?, ?)")
        .bind(alias)
        .bind(city_id)
        .execute(pool)
        .await?;
    Ok(())
}
