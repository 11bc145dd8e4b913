//! Free-text location to city id.

use harvest_core::ImportStatus;
use harvest_db::{City, CityAlias};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn postal_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:[A-Za-z]-?)?\d{4,5}\b\s*").expect("valid postal regex"))
}

fn parenthetical_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\([^)]*\)?").expect("valid parenthetical regex"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMethod {
    Exact,
    /// Substring containment in either direction
    Partial,
    Alias,
}

/// How a listing's location will be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposition {
    pub status: ImportStatus,
    pub city_id: Option<i64>,
    pub method: Option<MatchMethod>,
    pub rejection_reason: Option<String>,
}

/// Resolves location text against a snapshot of the city tables.
pub struct CityResolver {
    /// (id, lowercase name), in id order
    cities: Vec<(i64, String)>,
    aliases: HashMap<String, i64>,
    unregioned_label: String,
}

impl CityResolver {
    pub fn new(cities: &[City], aliases: &[CityAlias], unregioned_label: &str) -> Self {
        let cities = cities
            .iter()
            .map(|c| (c.id, c.name.trim().to_lowercase()))
            .filter(|(_, name)| !name.is_empty())
            .collect();

        let mut alias_map = HashMap::new();
        for alias in aliases {
            alias_map
                .entry(alias.alias.trim().to_lowercase())
                .or_insert(alias.city_id);
        }

        Self {
            cities,
            aliases: alias_map,
            unregioned_label: unregioned_label.trim().to_lowercase(),
        }
    }

    pub fn city_count(&self) -> usize {
        self.cities.len()
    }

    /// Strip the postal code, any parenthetical and everything after the first comma.
    pub fn clean(raw: &str) -> String {
        let without_postal = postal_prefix_re().replace(raw, "");
        let without_parens = parenthetical_re().replace_all(&without_postal, " ");
        let head = without_parens.split(',').next().unwrap_or_default();
        head.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Exact, then partial, then alias match. First hit wins.
    pub fn resolve(&self, raw: &str) -> Option<(i64, MatchMethod)> {
        let needle = Self::clean(raw).to_lowercase();
        if needle.is_empty() {
            return None;
        }

        if let Some((id, _)) = self.cities.iter().find(|(_, name)| *name == needle) {
            return Some((*id, MatchMethod::Exact));
        }

        if let Some((id, _)) = self
            .cities
            .iter()
            .find(|(_, name)| name.contains(&needle) || needle.contains(name.as_str()))
        {
            return Some((*id, MatchMethod::Partial));
        }

        self.aliases
            .get(&needle)
            .map(|id| (*id, MatchMethod::Alias))
    }

    /// Resolve and decide what to store. Listings are never dropped: a
    /// missing or unresolvable location is kept with a reason for staff.
    pub fn classify(&self, raw: &str) -> Disposition {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.to_lowercase() == self.unregioned_label {
            return Disposition {
                status: ImportStatus::Pending,
                city_id: None,
                method: None,
                rejection_reason: Some("Nationwide listing: no city given".to_string()),
            };
        }

        match self.resolve(trimmed) {
            Some((city_id, method)) => Disposition {
                status: ImportStatus::Pending,
                city_id: Some(city_id),
                method: Some(method),
                rejection_reason: None,
            },
            None => {
                tracing::debug!("Unmapped city: {}", trimmed);
                Disposition {
                    status: ImportStatus::Pending,
                    city_id: None,
                    method: None,
                    rejection_reason: Some(format!("Unmapped city: {trimmed}")),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> CityResolver {
        let cities = vec![
            City { id: 1, name: "Essen".into() },
            City { id: 2, name: "München".into() },
            City { id: 3, name: "Frankfurt am Main".into() },
            City { id: 4, name: "Halle (Saale)".into() },
            City { id: 5, name: "Köln".into() },
        ];
        let aliases = vec![
            CityAlias { alias: "Munich".into(), city_id: 2 },
            CityAlias { alias: "Cologne".into(), city_id: 5 },
        ];
        CityResolver::new(&cities, &aliases, "Überregional")
    }

    #[test]
    fn test_clean() {
        assert_eq!(CityResolver::clean("45127 Essen"), "Essen");
        assert_eq!(CityResolver::clean("D-80331 München (Bavaria)"), "München");
        assert_eq!(CityResolver::clean("Köln, Deutschland"), "Köln");
        assert_eq!(CityResolver::clean("  A1010 Wien  "), "Wien");
        assert_eq!(CityResolver::clean("(nur online)"), "");
    }

    #[test]
    fn test_exact_match_with_postal_code() {
        assert_eq!(resolver().resolve("45127 Essen"), Some((1, MatchMethod::Exact)));
        assert_eq!(resolver().resolve("essen"), Some((1, MatchMethod::Exact)));
    }

    #[test]
    fn test_parenthetical_stripped() {
        assert_eq!(
            resolver().resolve("München (Bavaria)"),
            Some((2, MatchMethod::Exact))
        );
    }

    #[test]
    fn test_partial_match() {
        assert_eq!(resolver().resolve("Frankfurt"), Some((3, MatchMethod::Partial)));
        assert_eq!(resolver().resolve("Halle"), Some((4, MatchMethod::Partial)));
        assert_eq!(resolver().resolve("Essen-Rüttenscheid"), Some((1, MatchMethod::Partial)));
    }

    #[test]
    fn test_alias_match() {
        assert_eq!(resolver().resolve("Munich"), Some((2, MatchMethod::Alias)));
        assert_eq!(resolver().resolve("50667 Cologne, Germany"), Some((5, MatchMethod::Alias)));
    }

    #[test]
    fn test_unmapped_city_is_kept() {
        let resolver = CityResolver::new(
            &[City { id: 1, name: "Essen".into() }],
            &[],
            "Überregional",
        );
        let d = resolver.classify("Frankfurt/Oder");
        assert_eq!(d.status, ImportStatus::Pending);
        assert_eq!(d.city_id, None);
        assert_eq!(d.rejection_reason.as_deref(), Some("Unmapped city: Frankfurt/Oder"));
    }

    #[test]
    fn test_nationwide() {
        for raw in ["", "   ", "Überregional", "überregional"] {
            let d = resolver().classify(raw);
            assert_eq!(d.status, ImportStatus::Pending);
            assert_eq!(d.city_id, None);
            assert!(d
                .rejection_reason
                .as_deref()
                .is_some_and(|r| r.starts_with("Nationwide")));
        }
    }

    #[test]
    fn test_classify_resolved() {
        let d = resolver().classify("45127 Essen");
        assert_eq!(d.city_id, Some(1));
        assert_eq!(d.method, Some(MatchMethod::Exact));
        assert!(d.rejection_reason.is_none());
    }
}
