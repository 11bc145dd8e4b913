use serde::Serialize;
use serde_json::Value;

/// Which extraction phase produced a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingOrigin {
    /// The page's embedded state blob
    StructuredData,
    /// An anchor found by scanning the rendered DOM; category is a placeholder
    DomScan,
}

/// One listing as found on a page, before resolution and persistence.
#[derive(Debug, Clone, Serialize)]
pub struct RawListing {
    pub name: String,
    pub category_label: String,
    /// Free-text location, possibly empty
    pub location: String,
    /// Absolute detail URL; the dedup key
    pub source_url: String,
    pub slug: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub social_links: Vec<String>,
    pub description: Option<String>,
    pub origin: ListingOrigin,
    /// Everything the page gave us, kept for audit
    pub payload: Value,
}

impl RawListing {
    /// Case-insensitive key used to merge the two extraction phases.
    pub fn dedup_key(&self) -> String {
        self.slug.to_lowercase()
    }

    pub fn is_dom_derived(&self) -> bool {
        self.origin == ListingOrigin::DomScan
    }
}
