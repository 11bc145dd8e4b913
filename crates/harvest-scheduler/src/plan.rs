//! Which categories a run covers.

use crate::error::{Result, SupervisorError};
use harvest_core::{CategoryMapping, TargetCategory};

/// Select the mappings named by `target`, in configuration order.
///
/// A specific target matches by path, label or category id; every
/// location-scoped variant of a matched category id is included.
pub fn select_categories(
    source: &str,
    mappings: &[CategoryMapping],
    target: &TargetCategory,
) -> Result<Vec<CategoryMapping>> {
    if mappings.is_empty() {
        return Err(SupervisorError::NoCategories(source.to_string()));
    }

    match target {
        TargetCategory::All => Ok(mappings.to_vec()),
        TargetCategory::Specific(selector) => {
            let selected: Vec<CategoryMapping> = mappings
                .iter()
                .filter(|m| m.matches(selector))
                .cloned()
                .collect();
            if selected.is_empty() {
                Err(SupervisorError::UnknownCategory(selector.clone()))
            } else {
                Ok(selected)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(path: &str, id: &str, label: &str) -> CategoryMapping {
        CategoryMapping {
            path: path.to_string(),
            category_id: id.to_string(),
            label: label.to_string(),
        }
    }

    fn mappings() -> Vec<CategoryMapping> {
        vec![
            mapping("hochzeitsfotografen", "photo", "Fotografen"),
            mapping("hochzeitsfotografen/berlin", "photo", ""),
            mapping("dj", "music", "DJs"),
        ]
    }

    #[test]
    fn test_all_selects_everything() {
        let selected = select_categories("directory", &mappings(), &TargetCategory::All).expect("select");
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn test_specific_by_path_label_or_id() {
        let by_path = select_categories(
            "directory",
            &mappings(),
            &TargetCategory::Specific("/dj/".to_string()),
        )
        .expect("select");
        assert_eq!(by_path, vec![mapping("dj", "music", "DJs")]);

        let by_label = select_categories(
            "directory",
            &mappings(),
            &TargetCategory::Specific("djs".to_string()),
        )
        .expect("select");
        assert_eq!(by_label.len(), 1);

        let by_id = select_categories(
            "directory",
            &mappings(),
            &TargetCategory::Specific("PHOTO".to_string()),
        )
        .expect("select");
        assert_eq!(by_id.len(), 2);
    }

    #[test]
    fn test_unknown_target_is_an_error() {
        let err = select_categories(
            "directory",
            &mappings(),
            &TargetCategory::Specific("zauberer".to_string()),
        )
        .expect_err("unknown");
        assert!(matches!(err, SupervisorError::UnknownCategory(s) if s == "zauberer"));
    }

    #[test]
    fn test_no_categories_configured() {
        assert!(matches!(
            select_categories("directory", &[], &TargetCategory::All),
            Err(SupervisorError::NoCategories(_))
        ));
    }
}
