// ABOUTME: Resolves the condition title of an atlas page from its headings or its URL.
// ABOUTME: Filters site-chrome headings and derives a title-cased slug as the last resort.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::dom::{element_text, in_excluded_region};

/// Headings that name the site rather than the condition.
const SITE_CHROME_TITLES: &[&str] = &[
    "eyerounds",
    "eyerounds.org",
    "atlas",
    "online atlas",
    "ophthalmology and visual sciences",
    "ophthalmology atlas",
    "university of iowa health care",
];

/// Path segments that never name a condition.
const GENERIC_SEGMENTS: &[&str] = &["index.htm", "index.html", "pages", "atlas", "eyeforum"];

static SITE_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^EyeRounds(?:\.org)?\s*[-–|:]\s*").unwrap());
static SITE_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*[-–|:]\s*EyeRounds(?:\.org)?$").unwrap());
static ENTRY_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^Entry\s*#?\s*\d+\b").unwrap());
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static H2: Lazy<Selector> = Lazy::new(|| Selector::parse("h2").unwrap());

/// Title used when neither headings nor the URL give anything.
pub const UNKNOWN_TITLE: &str = "Unknown Condition";

/// Resolves the page title: first qualifying `<h1>`, then `<h2>`, then the URL slug.
///
/// Never returns an empty string.
pub fn resolve_title(doc: &Html, fallback_url: &str) -> String {
    heading_title(doc).unwrap_or_else(|| title_from_url(fallback_url))
}

/// The first `<h1>` (or failing that `<h2>`) naming the condition.
pub fn heading_title(doc: &Html) -> Option<String> {
    [&*H1, &*H2].into_iter().find_map(|sel| {
        doc.select(sel)
            .filter(|h| !in_excluded_region(**h))
            .map(|h| strip_site_affixes(&element_text(&h)))
            .find(|t| is_condition_title(t))
    })
}

fn strip_site_affixes(title: &str) -> String {
    let title = SITE_PREFIX_RE.replace(title, "");
    SITE_SUFFIX_RE.replace(&title, "").trim().to_string()
}

fn is_condition_title(title: &str) -> bool {
    title.chars().count() > 3
        && !SITE_CHROME_TITLES.contains(&title.to_lowercase().as_str())
        && !ENTRY_HEADING_RE.is_match(title)
}

/// Last path segment that names something, with any `.htm`/`.html` suffix removed.
fn meaningful_segment(url: &str) -> Option<String> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    };
    path.rsplit('/')
        .map(str::trim)
        .filter(|seg| !seg.is_empty())
        .find(|seg| !GENERIC_SEGMENTS.contains(&seg.to_lowercase().as_str()))
        .map(|seg| strip_html_ext(seg).to_string())
        .filter(|seg| !seg.is_empty())
}

fn strip_html_ext(seg: &str) -> &str {
    for ext in [".html", ".htm"] {
        if seg.len() >= ext.len() {
            let split = seg.len() - ext.len();
            if seg.is_char_boundary(split) && seg[split..].eq_ignore_ascii_case(ext) {
                return &seg[..split];
            }
        }
    }
    seg
}

/// Title-cased words from the URL slug: `acute-macular-neuroretinopathy`
/// becomes `Acute Macular Neuroretinopathy`.
pub fn title_from_url(url: &str) -> String {
    meaningful_segment(url)
        .map(|seg| title_case(&seg.replace(['-', '_'], " ")))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string())
}

/// Identity stem for records from this page: the lowercase slug with
/// anything outside `[a-z0-9-]` replaced by `_`.
pub fn url_slug(url: &str) -> String {
    let slug: String = meaningful_segment(url)
        .unwrap_or_else(|| "page".to_string())
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    slug
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
