use crate::error::{CrawlError, Result};
use harvest_core::{CategoryMapping, SourceConfig};
use url::Url;

/// Builds category, page and detail URLs for one directory site.
#[derive(Debug, Clone)]
pub struct PageUrls {
    root: Url,
    directory: Vec<String>,
    page_query_param: String,
    page_path_segment: String,
}

impl PageUrls {
    pub fn new(source: &SourceConfig) -> Result<Self> {
        let root = Url::parse(&source.base_url)
            .map_err(|e| CrawlError::InvalidUrl(format!("{}: {e}", source.base_url)))?;
        if root.cannot_be_a_base() {
            return Err(CrawlError::InvalidUrl(format!(
                "{} cannot be used as a base URL",
                source.base_url
            )));
        }

        Ok(Self {
            root,
            directory: split_path(&source.directory_path),
            page_query_param: source.page_query_param.clone(),
            page_path_segment: source.page_path_segment.clone(),
        })
    }

    /// Directory root, e.g. `https://site/vendors/`.
    pub fn directory_url(&self) -> Url {
        let mut url = self.with_segments(self.directory.iter().map(String::as_str));
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push("");
        }
        url
    }

    /// Path prefix every listing link contains, e.g. `/vendors/`.
    pub fn directory_prefix(&self) -> String {
        if self.directory.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", self.directory.join("/"))
        }
    }

    pub fn category_url(&self, mapping: &CategoryMapping) -> Url {
        self.with_segments(
            self.directory
                .iter()
                .map(String::as_str)
                .chain(mapping.normalized_path().split('/').filter(|s| !s.is_empty())),
        )
    }

    /// Page 1 is the category root; later pages carry the page query parameter.
    pub fn page_url(&self, mapping: &CategoryMapping, page: u32) -> String {
        let mut url = self.category_url(mapping);
        if page > 1 {
            url.query_pairs_mut()
                .append_pair(&self.page_query_param, &page.to_string());
        }
        url.into()
    }

    /// Alternate pagination scheme: `<category>/<segment>/<n>`.
    pub fn path_segment_page_url(&self, mapping: &CategoryMapping, page: u32) -> String {
        let mut url = self.category_url(mapping);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(&self.page_path_segment)
                .push(&page.to_string());
        }
        url.into()
    }

    /// Canonical detail URL of a listing, hung off the category's first segment.
    pub fn detail_url(&self, mapping: &CategoryMapping, slug: &str) -> String {
        self.with_segments(
            self.directory
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(mapping.root_segment()).filter(|s| !s.is_empty()))
                .chain(std::iter::once(slug.trim_matches('/'))),
        )
        .into()
    }

    /// Path of `url` below the directory root, without surrounding slashes.
    pub fn relative_path(&self, url: &Url) -> Option<String> {
        let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
        if segments.len() < self.directory.len()
            || !segments
                .iter()
                .zip(&self.directory)
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
        {
            return None;
        }
        Some(segments[self.directory.len()..].join("/"))
    }

    fn with_segments<'a>(&self, segments: impl Iterator<Item = &'a str>) -> Url {
        let mut url = self.root.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.clear().extend(segments);
        }
        url
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls() -> PageUrls {
        PageUrls::new(&SourceConfig::default()).expect("valid base url")
    }

    fn mapping(path: &str) -> CategoryMapping {
        CategoryMapping {
            path: path.to_string(),
            category_id: "photographers".to_string(),
            label: String::new(),
        }
    }

    #[test]
    fn test_page_urls() {
        let urls = urls();
        let m = mapping("hochzeitsfotografen");

        assert_eq!(
            urls.page_url(&m, 1),
            "https://www.example-directory.de/vendors/hochzeitsfotografen"
        );
        assert_eq!(
            urls.page_url(&m, 3),
            "https://www.example-directory.de/vendors/hochzeitsfotografen?page=3"
        );
        assert_eq!(
            urls.path_segment_page_url(&m, 3),
            "https://www.example-directory.de/vendors/hochzeitsfotografen/page/3"
        );
    }

    #[test]
    fn test_location_scoped_category() {
        let urls = urls();
        let m = mapping("/hochzeitsfotografen/berlin/");

        assert_eq!(
            urls.page_url(&m, 2),
            "https://www.example-directory.de/vendors/hochzeitsfotografen/berlin?page=2"
        );
        assert_eq!(
            urls.detail_url(&m, "atelier-licht"),
            "https://www.example-directory.de/vendors/hochzeitsfotografen/atelier-licht"
        );
    }

    #[test]
    fn test_relative_path() {
        let urls = urls();
        let url = Url::parse("https://www.example-directory.de/vendors/dj/nordlicht-sound")
            .expect("url");
        assert_eq!(urls.relative_path(&url).as_deref(), Some("dj/nordlicht-sound"));

        let outside = Url::parse("https://www.example-directory.de/blog/post").expect("url");
        assert!(urls.relative_path(&outside).is_none());
        assert_eq!(urls.directory_prefix(), "/vendors/");
        assert_eq!(
            urls.directory_url().as_str(),
            "https://www.example-directory.de/vendors/"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let source = SourceConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            PageUrls::new(&source),
            Err(CrawlError::InvalidUrl(_))
        ));
    }
}
