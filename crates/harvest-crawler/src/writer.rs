use crate::listing::RawListing;
use harvest_core::ImportStatus;
use harvest_db::import_records::{self, NewImportRecord};
use sqlx::{Pool, Sqlite};

/// Dedup-then-insert into the staging table.
pub struct ImportWriter {
    pool: Pool<Sqlite>,
    source_system: String,
}

impl ImportWriter {
    pub fn new(pool: Pool<Sqlite>, source_system: impl Into<String>) -> Self {
        Self {
            pool,
            source_system: source_system.into(),
        }
    }

    /// Store `listing` unless its source URL is already known.
    ///
    /// Returns `true` only when a new row was written. Known listings are left
    /// untouched; persistence errors are logged and reported as not new.
    pub async fn log_import(
        &self,
        listing: &RawListing,
        category_id: &str,
        status: ImportStatus,
        rejection_reason: Option<&str>,
        city_id: Option<i64>,
    ) -> bool {
        match import_records::exists_by_source_url(&self.pool, &listing.source_url).await {
            Ok(true) => return false,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("Dedup lookup failed for {}: {}", listing.source_url, e);
                return false;
            }
        }

        let record = NewImportRecord {
            source_url: listing.source_url.clone(),
            source_system: self.source_system.clone(),
            business_name: listing.name.clone(),
            raw_category: Some(listing.category_label.clone()).filter(|c| !c.is_empty()),
            category_id: category_id.to_string(),
            raw_city: Some(listing.location.clone()).filter(|c| !c.trim().is_empty()),
            city_id,
            status,
            rejection_reason: rejection_reason.map(ToString::to_string),
            email: listing.email.clone(),
            phone: listing.phone.clone(),
            website: listing.website.clone(),
            social_links: listing.social_links.clone(),
            description: listing.description.clone(),
            raw_payload: serde_json::json!({
                "origin": listing.origin,
                "listing": listing.payload,
            }),
        };

        match import_records::insert(&self.pool, &record).await {
            Ok(inserted) => {
                if inserted {
                    tracing::debug!("Imported {} ({})", listing.name, listing.source_url);
                }
                inserted
            }
            Err(e) => {
                tracing::warn!("Failed to store {}: {}", listing.source_url, e);
                false
            }
        }
    }
}
