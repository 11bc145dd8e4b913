//! Listing extraction.
//!
//! Two independent producers run over every page:
//!
//! 1. the structured-data producer reads the page's embedded state blob
//!    (by element id, falling back to a regex scan of inline scripts);
//! 2. the DOM producer scans anchors into the directory that carry a title
//!    element. It recovers promoted and regional listings that are injected
//!    into the DOM without entering the page state.
//!
//! Results are merged as a set union keyed on the lowercase slug, structured
//! records first. Extraction never fails; a producer that finds nothing
//! contributes nothing.

use crate::listing::{ListingOrigin, RawListing};
use crate::url_builder::PageUrls;
use harvest_core::{CategoryMapping, SourceConfig};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

const NAME_KEYS: &[&str] = &["name", "title", "businessName", "companyName"];
const SLUG_KEYS: &[&str] = &["slug", "urlSlug", "seoSlug", "path"];
const LOCATION_KEYS: &[&str] = &["city", "location", "locationName", "town", "region"];
const EMAIL_KEYS: &[&str] = &["email", "mail", "contactEmail"];
const PHONE_KEYS: &[&str] = &["phone", "phoneNumber", "telephone"];
const WEBSITE_KEYS: &[&str] = &["website", "websiteUrl", "homepage"];
const SOCIAL_KEYS: &[&str] = &["instagram", "facebook", "tiktok", "pinterest", "youtube"];
const DESCRIPTION_KEYS: &[&str] = &["description", "shortDescription", "teaser", "about"];
const CATEGORY_KEYS: &[&str] = &["category", "categoryName", "categoryLabel"];

const TITLE_SELECTOR: &str = "h2, h3, h4, [class*='title'], [class*='name']";
const SHORT_PARAGRAPH_MAX: usize = 40;

fn postal_location_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[A-Za-z]-?)?\d{4,5}\s+\S").expect("valid postal regex")
    })
}

/// Produces [`RawListing`]s from a rendered category page.
pub struct ListingExtractor {
    source: SourceConfig,
    urls: PageUrls,
    array_key_re: Option<Regex>,
}

impl ListingExtractor {
    pub fn new(source: SourceConfig, urls: PageUrls) -> Self {
        let pattern = format!(r#""{}"\s*:\s*\["#, regex::escape(&source.state_array_key));
        let array_key_re = Regex::new(&pattern).ok();
        Self {
            source,
            urls,
            array_key_re,
        }
    }

    /// Extract listings from `html`, loaded from `page_url` while crawling `mapping`.
    pub fn extract(&self, html: &str, page_url: &str, mapping: &CategoryMapping) -> Vec<RawListing> {
        let document = Html::parse_document(html);

        let structured = self.structured_listings(&document, mapping);
        let dom = match Url::parse(page_url) {
            Ok(base) => self.dom_listings(&document, &base),
            Err(e) => {
                tracing::debug!("DOM scan skipped, bad page URL {}: {}", page_url, e);
                Vec::new()
            }
        };

        let structured_count = structured.len();
        let merged = merge_listings(structured, dom);
        tracing::debug!(
            "Extracted {} listings from {} ({} structured, {} DOM-only)",
            merged.len(),
            page_url,
            structured_count,
            merged.len() - structured_count.min(merged.len())
        );
        merged
    }

    fn structured_listings(&self, document: &Html, mapping: &CategoryMapping) -> Vec<RawListing> {
        let Some(items) = self.find_state_array(document) else {
            tracing::debug!("No embedded state array found");
            return Vec::new();
        };

        items
            .iter()
            .filter_map(|item| self.listing_from_json(item, mapping))
            .collect()
    }

    /// First parseable listing array, from the state element or any inline script.
    fn find_state_array(&self, document: &Html) -> Option<Vec<Value>> {
        let key = &self.source.state_array_key;

        if let Ok(selector) = Selector::parse(&format!("script#{}", self.source.state_element_id)) {
            for script in document.select(&selector) {
                let text: String = script.text().collect();
                match serde_json::from_str::<Value>(&text) {
                    Ok(state) => {
                        if let Some(items) = find_array(&state, key) {
                            return Some(items.clone());
                        }
                    }
                    Err(e) => tracing::debug!("State element is not JSON: {}", e),
                }
            }
        }

        let re = self.array_key_re.as_ref()?;
        let scripts = Selector::parse("script:not([src])").ok()?;
        for script in document.select(&scripts) {
            let text: String = script.text().collect();
            for found in re.find_iter(&text) {
                let start = found.end() - 1;
                let Some(slice) = balanced_array(&text[start..]) else {
                    continue;
                };
                if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(slice) {
                    return Some(items);
                }
            }
        }
        None
    }

    fn listing_from_json(&self, item: &Value, mapping: &CategoryMapping) -> Option<RawListing> {
        let obj = item.as_object()?;
        let name = text_field(obj, NAME_KEYS)?;
        let Some(slug) = text_field(obj, SLUG_KEYS).and_then(|s| last_segment(&s)) else {
            tracing::debug!("Skipping structured listing without slug: {}", name);
            return None;
        };

        let category_label = obj
            .iter()
            .find(|(k, _)| CATEGORY_KEYS.contains(&k.as_str()))
            .and_then(|(_, v)| match v {
                Value::Object(inner) => text_field(inner, &["name", "label", "title"]),
                other => value_text(other),
            })
            .unwrap_or_else(|| mapping.display_name().to_string());

        Some(RawListing {
            source_url: self.urls.detail_url(mapping, &slug),
            slug,
            name,
            category_label,
            location: json_location(obj).unwrap_or_default(),
            email: text_field(obj, EMAIL_KEYS),
            phone: text_field(obj, PHONE_KEYS),
            website: text_field(obj, WEBSITE_KEYS),
            social_links: social_links(obj),
            description: text_field(obj, DESCRIPTION_KEYS),
            origin: ListingOrigin::StructuredData,
            payload: item.clone(),
        })
    }

    fn dom_listings(&self, document: &Html, base: &Url) -> Vec<RawListing> {
        let (Ok(anchors), Ok(titles), Ok(paragraphs)) = (
            Selector::parse("a[href]"),
            Selector::parse(TITLE_SELECTOR),
            Selector::parse("p"),
        ) else {
            return Vec::new();
        };

        let prefix = self.urls.directory_prefix();
        let category_paths: HashSet<String> = self
            .source
            .categories
            .iter()
            .map(|c| c.normalized_path().to_lowercase())
            .collect();

        let mut seen = HashSet::new();
        let mut listings = Vec::new();

        for anchor in document.select(&anchors) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if !href.contains(&prefix) {
                continue;
            }
            let Some(title) = anchor.select(&titles).next() else {
                continue;
            };
            let name = collapse_whitespace(&title.text().collect::<String>());
            if name.is_empty() {
                continue;
            }

            let Ok(mut url) = base.join(href) else {
                continue;
            };
            if url.host_str() != base.host_str() {
                continue;
            }
            url.set_query(None);
            url.set_fragment(None);

            let Some(relative) = self.urls.relative_path(&url) else {
                continue;
            };
            if relative.is_empty() || category_paths.contains(&relative.to_lowercase()) {
                continue;
            }
            let Some(slug) = last_segment(&relative) else {
                continue;
            };
            if !seen.insert(slug.to_lowercase()) {
                continue;
            }

            let location = self.dom_location(anchor, &paragraphs, &name);
            listings.push(RawListing {
                payload: json!({
                    "origin": "dom",
                    "href": href,
                    "title": name,
                    "location": location,
                }),
                source_url: url.into(),
                slug,
                name,
                category_label: self.source.dom_category_label.clone(),
                location,
                email: None,
                phone: None,
                website: None,
                social_links: Vec::new(),
                description: None,
                origin: ListingOrigin::DomScan,
            });
        }

        listings
    }

    /// Postal-code paragraph, else the first short plain paragraph, else the
    /// unregioned label. Looks inside the anchor first, then its parent.
    fn dom_location(&self, anchor: ElementRef<'_>, paragraphs: &Selector, name: &str) -> String {
        let mut texts: Vec<String> = anchor
            .select(paragraphs)
            .map(|p| collapse_whitespace(&p.text().collect::<String>()))
            .collect();
        if texts.is_empty() {
            if let Some(parent) = anchor.parent().and_then(ElementRef::wrap) {
                texts = parent
                    .select(paragraphs)
                    .map(|p| collapse_whitespace(&p.text().collect::<String>()))
                    .collect();
            }
        }

        if let Some(postal) = texts.iter().find(|t| postal_location_re().is_match(t)) {
            return postal.clone();
        }

        texts
            .into_iter()
            .find(|t| {
                let len = t.chars().count();
                (2..=SHORT_PARAGRAPH_MAX).contains(&len)
                    && !t.chars().any(|c| c.is_ascii_digit())
                    && t != name
            })
            .unwrap_or_else(|| self.source.unregioned_label.clone())
    }
}

/// Set union keyed on the slug; the first occurrence wins.
pub fn merge_listings(structured: Vec<RawListing>, dom: Vec<RawListing>) -> Vec<RawListing> {
    let mut seen = HashSet::new();
    structured
        .into_iter()
        .chain(dom)
        .filter(|listing| seen.insert(listing.dedup_key()))
        .collect()
}

/// Depth-first search for the first array stored under `key`.
fn find_array<'v>(value: &'v Value, key: &str) -> Option<&'v Vec<Value>> {
    match value {
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get(key) {
                return Some(items);
            }
            map.values().find_map(|v| find_array(v, key))
        }
        Value::Array(items) => items.iter().find_map(|v| find_array(v, key)),
        _ => None,
    }
}

/// The JSON array starting at `text[0] == '['`, up to its matching bracket.
fn balanced_array(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| obj.get(*k).and_then(value_text))
}

fn json_location(obj: &Map<String, Value>) -> Option<String> {
    for key in LOCATION_KEYS {
        match obj.get(*key) {
            Some(Value::Object(inner)) => {
                if let Some(text) = text_field(inner, &["name", "city", "title"]) {
                    return Some(text);
                }
            }
            Some(other) => {
                if let Some(text) = value_text(other) {
                    return Some(text);
                }
            }
            None => {}
        }
    }

    let address = obj.get("address")?.as_object()?;
    let city = text_field(address, &["city", "locality", "town"])?;
    match text_field(address, &["zip", "postalCode", "postcode"]) {
        Some(zip) => Some(format!("{zip} {city}")),
        None => Some(city),
    }
}

fn social_links(obj: &Map<String, Value>) -> Vec<String> {
    let mut links: Vec<String> = SOCIAL_KEYS
        .iter()
        .filter_map(|k| obj.get(*k).and_then(value_text))
        .collect();

    match obj.get("socialLinks").or_else(|| obj.get("social")) {
        Some(Value::Array(items)) => links.extend(items.iter().filter_map(value_text)),
        Some(Value::Object(map)) => links.extend(map.values().filter_map(value_text)),
        _ => {}
    }

    let mut seen = HashSet::new();
    links.retain(|l| seen.insert(l.clone()));
    links
}

fn last_segment(path: &str) -> Option<String> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.split('/')
        .filter(|s| !s.trim().is_empty())
        .last()
        .map(|s| s.trim().to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> ListingExtractor {
        let mut source = SourceConfig::default();
        source.categories = vec![mapping()];
        let urls = PageUrls::new(&source).expect("urls");
        ListingExtractor::new(source, urls)
    }

    fn mapping() -> CategoryMapping {
        CategoryMapping {
            path: "hochzeitsfotografen".to_string(),
            category_id: "photographers".to_string(),
            label: "Hochzeitsfotografen".to_string(),
        }
    }

    const PAGE_URL: &str = "https://www.example-directory.de/vendors/hochzeitsfotografen";

    #[test]
    fn test_structured_data_by_element_id() {
        let html = r#"<html><body>
            <script id="__NEXT_DATA__" type="application/json">
            {"props":{"pageProps":{"vendors":[
                {"name":"Atelier Licht","slug":"atelier-licht","city":"45127 Essen",
                 "email":"hallo@atelier-licht.de","instagram":"https://instagram.com/atelierlicht",
                 "category":{"name":"Fotografie"}},
                {"title":"Nordlicht","urlSlug":"/vendors/hochzeitsfotografen/nordlicht/",
                 "address":{"zip":80331,"city":"München"}},
                {"name":"No Slug Studio"}
            ]}}}
            </script></body></html>"#;

        let listings = extractor().extract(html, PAGE_URL, &mapping());
        assert_eq!(listings.len(), 2);

        let first = &listings[0];
        assert_eq!(first.name, "Atelier Licht");
        assert_eq!(first.location, "45127 Essen");
        assert_eq!(first.category_label, "Fotografie");
        assert_eq!(
            first.source_url,
            "https://www.example-directory.de/vendors/hochzeitsfotografen/atelier-licht"
        );
        assert_eq!(first.social_links.len(), 1);
        assert_eq!(first.origin, ListingOrigin::StructuredData);

        let second = &listings[1];
        assert_eq!(second.slug, "nordlicht");
        assert_eq!(second.location, "80331 München");
        assert_eq!(second.category_label, "Hochzeitsfotografen");
    }

    #[test]
    fn test_structured_data_regex_fallback() {
        let html = r#"<html><body><script>
            window.__STATE__ = {"page":2,"vendors":[{"name":"Klang & Co","slug":"klang-co",
              "description":"Band mit [Swing] und \"Soul\"","location":"Köln"}],"total":41};
            </script></body></html>"#;

        let listings = extractor().extract(html, PAGE_URL, &mapping());
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].name, "Klang & Co");
        assert_eq!(listings[0].location, "Köln");
        assert!(listings[0]
            .description
            .as_deref()
            .is_some_and(|d| d.contains("[Swing]")));
    }

    #[test]
    fn test_dom_scan_supplements_structured_data() {
        let html = r#"<html><body>
            <script id="__NEXT_DATA__">{"vendors":[{"name":"Atelier Licht","slug":"atelier-licht","city":"Essen"}]}</script>
            <nav><a href="/vendors/hochzeitsfotografen"><h3>Hochzeitsfotografen</h3></a></nav>
            <div class="card">
              <a href="/vendors/hochzeitsfotografen/atelier-licht"><h3>Atelier Licht</h3></a>
            </div>
            <div class="card promoted">
              <a href="/vendors/hochzeitsfotografen/sonnenschein-studio?ref=promo">
                <h3 class="card-title">Sonnenschein   Studio</h3>
                <p>Top bewertet</p>
                <p>D-10115 Berlin</p>
              </a>
            </div>
            <div class="card">
              <a href="https://www.example-directory.de/vendors/hochzeitsfotografen/wolke-7/"><span class="vendor-name">Wolke 7</span></a>
              <p>4.9 Sterne</p>
              <p>Hamburg</p>
            </div>
            <div class="card">
              <a href="/vendors/hochzeitsfotografen/bundesweit-foto"><h4>Bundesweit Foto</h4></a>
            </div>
            <a href="/blog/tipps"><h3>Tipps</h3></a>
            </body></html>"#;

        let listings = extractor().extract(html, PAGE_URL, &mapping());
        let names: Vec<&str> = listings.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Atelier Licht", "Sonnenschein Studio", "Wolke 7", "Bundesweit Foto"]
        );

        let promoted = &listings[1];
        assert!(promoted.is_dom_derived());
        assert_eq!(promoted.location, "D-10115 Berlin");
        assert_eq!(promoted.category_label, "Dienstleister");
        assert_eq!(
            promoted.source_url,
            "https://www.example-directory.de/vendors/hochzeitsfotografen/sonnenschein-studio"
        );

        assert_eq!(listings[2].slug, "wolke-7");
        assert_eq!(listings[2].location, "Hamburg");
        assert_eq!(listings[3].location, "Überregional");
    }

    #[test]
    fn test_dom_scan_ignores_other_hosts() {
        let html = r#"<html><body>
            <a href="https://mirror.example.net/vendors/hochzeitsfotografen/kopie"><h3>Kopie</h3></a>
            <a href="//cdn.example.org/vendors/hochzeitsfotografen/bild"><h3>Bild</h3></a>
            <a href="/vendors/hochzeitsfotografen/echt"><h3>Echt</h3></a>
            </body></html>"#;

        let listings = extractor().extract(html, PAGE_URL, &mapping());
        let slugs: Vec<&str> = listings.iter().map(|l| l.slug.as_str()).collect();
        assert_eq!(slugs, vec!["echt"]);
        assert!(listings[0]
            .source_url
            .starts_with("https://www.example-directory.de/"));
    }

    #[test]
    fn test_garbage_yields_nothing() {
        let html = r#"<script id="__NEXT_DATA__">{not json</script><script>var vendors = "vendors": [ oops</script>"#;
        assert!(extractor().extract(html, PAGE_URL, &mapping()).is_empty());
        assert!(extractor().extract("", "not a url", &mapping()).is_empty());
    }

    #[test]
    fn test_balanced_array() {
        assert_eq!(balanced_array(r#"[1,[2,3],"]"] tail"#), Some(r#"[1,[2,3],"]"]"#));
        assert_eq!(balanced_array(r#"[{"a":"\"]"}]x"#), Some(r#"[{"a":"\"]"}]"#));
        assert_eq!(balanced_array("[1,2"), None);
    }

    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("/vendors/dj/nordlicht/").as_deref(), Some("nordlicht"));
        assert_eq!(last_segment("nordlicht").as_deref(), Some("nordlicht"));
        assert_eq!(last_segment("/vendors/dj/nordlicht?ref=1").as_deref(), Some("nordlicht"));
        assert_eq!(last_segment("///"), None);
    }
}
