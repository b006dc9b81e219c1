// ABOUTME: Maps a page's "Category:" label (or caller hints) onto the fixed topic enumeration.
// ABOUTME: Never returns text from the page itself; unmatched input yields the UNCATEGORIZED sentinel.

use eyeatlas_records::Category;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

use crate::dom::{content_root, node_text};

static CATEGORY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bCategor(?:y|ies)[ \t]*:[ \t]*([^\n]*?)[ \t]*(?:Contributors?[ \t]*:|Photographers?[ \t]*:|Posted\b|\n|$)",
    )
    .unwrap()
});

/// Resolves the category of a parsed page; see [`category_from_text`].
pub fn resolve_category(doc: &Html, hints: &[String]) -> Category {
    category_from_text(&node_text(content_root(doc)), hints)
}

/// Every non-empty text captured after a `Category:`/`Categories:` label.
pub fn category_labels(text: &str) -> Vec<String> {
    CATEGORY_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Category from page text, falling back to the hints.
///
/// The first label capture that maps onto the enumeration wins; within a
/// capture such as `Retina, Vitreous` containment is tested in enumeration
/// order, so the earlier topic is chosen. Hints are only consulted when no
/// label maps.
pub fn category_from_text(text: &str, hints: &[String]) -> Category {
    category_labels(text)
        .iter()
        .chain(hints)
        .find_map(|candidate| Category::match_text(candidate))
        .unwrap_or(Category::Uncategorized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_containment_match_wins() {
        assert_eq!(
            category_from_text("Categories: Retina, Vitreous\nContributor: A", &[]),
            Category::Retina
        );
    }

    #[test]
    fn test_label_stops_at_next_field() {
        assert_eq!(
            category_labels("Category: Glaucoma Contributor: Jane"),
            vec!["Glaucoma".to_string()]
        );
    }

    #[test]
    fn test_hints_used_when_label_missing() {
        let hints = vec!["Misc".to_string(), "Retina".to_string()];
        assert_eq!(category_from_text("No label here", &hints), Category::Retina);
        let hints = vec!["Neuro-ophthalmology".to_string()];
        assert_eq!(category_from_text("No label here", &hints), Category::NeuroOp);
    }

    #[test]
    fn test_unmapped_label_falls_back_to_hints_then_sentinel() {
        assert_eq!(
            category_from_text("Category: Miscellany", &["Uveitis".to_string()]),
            Category::Uveitis
        );
        assert_eq!(category_from_text("Category: Miscellany", &[]), Category::Uncategorized);
        assert_eq!(category_from_text("", &[]), Category::Uncategorized);
    }

    #[test]
    fn test_resolve_from_markup() {
        let doc = Html::parse_document(
            "<body><h1>Coats Disease</h1><p><strong>Category:</strong> Retina</p></body>",
        );
        assert_eq!(resolve_category(&doc, &[]), Category::Retina);
    }
}
