// ABOUTME: Field extraction for one entry's text: contributor, photographer and description.
// ABOUTME: Description candidates are tried in a fixed order, then cleaned of figure labels and footers.

use aho_corasick::{AhoCorasick, MatchKind};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::dom::normalize_spaces;

/// Fields recovered from an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFields {
    pub contributor: String,
    pub photographer: String,
    pub description: String,
}

/// Text after any of these belongs to the page footer, not the case.
const FOOTER_MARKERS: &[&str] = &[
    "Image Permissions",
    "Creative Commons",
    "University of Iowa",
    "Carver College",
    "200 Hawkins",
    "Iowa City",
    "Related Articles",
    "Related Links",
    "Support Us",
    "Copyright",
    "Report an issue",
    "EyeRounds Social Media",
    "Reference:",
    "References:",
];

static FOOTER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .match_kind(MatchKind::LeftmostFirst)
        .build(FOOTER_MARKERS)
        .expect("footer markers are valid patterns")
});

static CONTRIBUTOR_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bContributors?[ \t]*:").unwrap());
static CONTRIBUTOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bContributors?[ \t]*:[ \t]*([^\n]*?)[ \t]*(?:Photographers?[ \t]*:|Posted\b|Categor(?:y|ies)[ \t]*:|\n|$)",
    )
    .unwrap()
});
static PHOTOGRAPHER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bPhotographers?[ \t]*:[ \t]*([^\n]*?)[ \t]*(?:Contributors?[ \t]*:|Posted\b|Categor(?:y|ies)[ \t]*:|These\b|Figure\b|\n|$)",
    )
    .unwrap()
});

/// Any metadata label; a description stops where the next one starts.
static FIELD_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:Contributors?|Photographers?|Categor(?:y|ies)|Posted(?:\s+on)?)[ \t]*:")
        .unwrap()
});

/// Description openers in the order they are tried, with the minimum
/// cleaned length each must reach. A capture group, when present, marks
/// where the description starts.
static DESCRIPTION_PATTERNS: Lazy<Vec<(Regex, usize)>> = Lazy::new(|| {
    [
        (r"(?i:Photographers?)[ \t]*:[^\n]*\n\s*([A-Z])", 50),
        (r"(?i)\b(?:These|The following)\s+(?:photographs|photos|images|figures)\s+show", 30),
        (r"\bThis\s+(?:patient|case|photograph|image|figure)\b", 30),
        (r"\b[A-Z][a-z]+(?:\s+[a-z]+)?\s+is\s+(?:an?|the)\b", 50),
        (r"(?i:Categor(?:y|ies))[^:\n]*:[^\n]*\n\s*([A-Z])", 50),
        (r"(?i:Contributors?)[ \t]*:[^\n]*\n\s*([A-Z])", 30),
    ]
    .into_iter()
    .map(|(pattern, min)| (Regex::new(pattern).unwrap(), min))
    .collect()
});

static FIGURE_CLAUSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bFigures?\s+\d+[a-z]?\s*:[^.]*\.?").unwrap());
static FIGURE_PAREN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*\(\s*(?:see\s+)?Figures?\s+\d+[a-z]?[^)]*\)").unwrap());
static FIGURE_BARE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bFigures?\s+\d+[a-z]?\b").unwrap());
static UI_ARTIFACT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:Enlarge|Download|Back to top)\b|EyeRounds\.org|Online Atlas of Ophthalmology")
        .unwrap()
});
static SPACE_BEFORE_PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([.,;:])").unwrap());

/// True when the text carries a contributor label.
pub fn has_contributor_label(text: &str) -> bool {
    CONTRIBUTOR_LABEL_RE.is_match(text)
}

/// Number of contributor labels in the text.
pub fn contributor_label_count(text: &str) -> usize {
    CONTRIBUTOR_LABEL_RE.find_iter(text).count()
}

/// Extracts all fields from an entry's rendered text.
pub fn extract_fields(text: &str) -> EntryFields {
    EntryFields {
        contributor: contributor(text),
        photographer: photographer(text),
        description: description(text),
    }
}

pub fn contributor(text: &str) -> String {
    credit(&CONTRIBUTOR_RE, text)
}

pub fn photographer(text: &str) -> String {
    credit(&PHOTOGRAPHER_RE, text)
}

fn credit(re: &Regex, text: &str) -> String {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| {
            normalize_spaces(m.as_str())
                .trim_end_matches([',', ';', '|'])
                .trim()
                .to_string()
        })
        .unwrap_or_default()
}

/// Picks the description from an entry's text.
///
/// Each opener is tried in turn; the candidate runs from the opener to
/// the next metadata label (or the end of the text) and is accepted once
/// it survives [`clean_description`] with enough length. Unusual phrasing
/// matches none of the openers and yields an empty description.
pub fn description(text: &str) -> String {
    for (re, min_len) in DESCRIPTION_PATTERNS.iter() {
        for caps in re.captures_iter(text) {
            let start = caps
                .get(1)
                .or_else(|| caps.get(0))
                .map(|m| m.start())
                .unwrap_or_default();
            let rest = &text[start..];
            let end = FIELD_LABEL_RE
                .find(rest)
                .filter(|m| m.start() > 0)
                .map(|m| m.start())
                .unwrap_or(rest.len());
            let cleaned = clean_description(&rest[..end]);
            if cleaned.chars().count() >= *min_len {
                return cleaned;
            }
        }
    }
    String::new()
}

/// Strips boilerplate from a description candidate.
///
/// Cuts at the first footer marker, removes figure caption clauses
/// (`Figure 1: ...`), parenthetical figure references, bare figure labels
/// and UI artifact words, then collapses whitespace.
pub fn clean_description(raw: &str) -> String {
    let text = match FOOTER.find(raw) {
        Some(m) => &raw[..m.start()],
        None => raw,
    };

    let text = FIGURE_CLAUSE_RE.replace_all(text, " ");
    let text = FIGURE_PAREN_RE.replace_all(&text, "");
    let text = FIGURE_BARE_RE.replace_all(&text, " ");
    let text = UI_ARTIFACT_RE.replace_all(&text, " ");
    let text = normalize_spaces(&text);
    let text = SPACE_BEFORE_PUNCT_RE.replace_all(&text, "$1");

    text.trim_start_matches(|c: char| c.is_whitespace() || ".,;:-|".contains(c))
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clean_strips_leading_figure_clause() {
        assert_eq!(
            clean_description("Figure 1: fundus photo. This patient presented with vision loss."),
            "This patient presented with vision loss."
        );
    }

    #[test]
    fn test_clean_strips_references_and_artifacts() {
        assert_eq!(
            clean_description(
                "Drusen are visible (Figure 2a) in both eyes.\n\nEnlarge Download  Note the halo in Figure 3."
            ),
            "Drusen are visible in both eyes. Note the halo in."
        );
    }

    #[test]
    fn test_clean_truncates_at_footer() {
        assert_eq!(
            clean_description("The lesion regressed after treatment. Image Permissions: Creative Commons"),
            "The lesion regressed after treatment."
        );
        assert_eq!(
            clean_description("Stable at one year. University of Iowa Health Care, 200 Hawkins Drive"),
            "Stable at one year."
        );
    }

    #[test]
    fn test_credits_stop_at_next_label() {
        let text = "Contributor: Jane Doe, MD Photographer: Bob Smith, CRA\nThese photographs show a white pupil.";
        assert_eq!(contributor(text), "Jane Doe, MD");
        assert_eq!(photographer(text), "Bob Smith, CRA");
    }

    #[test]
    fn test_credits_on_separate_lines() {
        let text = "Contributors: A. Author; B. Author\nPhotographers: C. Camera\nPosted: 2019";
        assert_eq!(contributor(text), "A. Author; B. Author");
        assert_eq!(photographer(text), "C. Camera");
    }

    #[test]
    fn test_empty_label_does_not_swallow_next_line() {
        let text = "Contributor:\nThis patient has a long and interesting history of trauma.";
        assert_eq!(contributor(text), "");
    }

    #[test]
    fn test_missing_fields_are_empty() {
        assert_eq!(extract_fields("Nothing here."), EntryFields::default());
    }

    #[test]
    fn test_description_opener_order() {
        let text = "Contributor: Jane Doe\n\
                    Photographer: Bob\n\
                    Figure 1: Fundus.\n\
                    These photographs show bilateral optic disc edema in a young woman with headache.";
        assert_eq!(
            description(text),
            "These photographs show bilateral optic disc edema in a young woman with headache."
        );
    }

    #[test]
    fn test_description_stops_at_next_label() {
        let text = "This patient presented with painless loss of vision in the left eye.\nCategory: Retina";
        assert_eq!(
            description(text),
            "This patient presented with painless loss of vision in the left eye."
        );
    }

    #[test]
    fn test_definition_opener_needs_fifty_chars() {
        assert_eq!(description("Coats is a disease."), "");
        let text = "Retinoblastoma is the most common primary intraocular malignancy of childhood.";
        assert_eq!(description(text), text);
    }

    #[test]
    fn test_contributor_label_count() {
        assert_eq!(contributor_label_count("Contributor: A\nContributors: B"), 2);
        assert!(!has_contributor_label("Photographer: C"));
    }
}
