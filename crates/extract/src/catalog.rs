// ABOUTME: Reads the atlas catalog: the JavaScript link database and the HTML index page.
// ABOUTME: Yields catalog entries with page URLs and hints, grouped onto the fixed category enumeration.

use std::collections::{BTreeMap, HashSet};

use eyeatlas_records::Category;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use url::Url;

use crate::assemble::PageHints;
use crate::client::PageTarget;
use crate::dom::{element_text, nearest_ancestor_tagged, normalize_spaces, node_text};
use crate::options::Origins;

/// Where the site publishes its atlas database.
pub const DEFAULT_DATABASE_URL: &str =
    "https://eyerounds.org/atlas/atlasJS/atlasJS_revision_22.js";

/// The HTML atlas index.
pub const DEFAULT_INDEX_URL: &str = "https://eyerounds.org/atlas/index.htm";

const DATABASE_MARKER: &str = "linkInformationDB";

static STRING_FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\b(name|imgSrc|src|title|keyWords)\s*:\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)")"#,
    )
    .unwrap()
});
static NUMBER_FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\b(year|numImg)\s*:\s*['"]?(\d+)"#).unwrap());
static CAT_ARRAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bcat\s*:\s*\[([^\]]*)\]").unwrap());
static CAT_SINGLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bcat\s*:\s*(?:'([^']*)'|"([^"]*)")"#).unwrap());
static QUOTED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"'([^']*)'|"([^"]*)""#).unwrap());
static LINKS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());

/// One atlas page as listed in the JavaScript database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AtlasEntry {
    pub name: String,
    pub title: String,
    pub src: String,
    #[serde(rename = "imgSrc")]
    pub img_src: String,
    #[serde(rename = "keyWords")]
    pub keywords: String,
    pub year: String,
    #[serde(rename = "numImg")]
    pub num_img: String,
    #[serde(rename = "cat")]
    pub categories: Vec<String>,
}

impl AtlasEntry {
    /// Human-readable name: the title, else the short name.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.name
        } else {
            &self.title
        }
    }

    /// Absolute page URL. `src` is normally relative to `/atlas/`.
    pub fn page_url(&self, origin: &Url) -> Option<String> {
        let src = self.src.trim();
        if src.is_empty() {
            return None;
        }
        if src.starts_with("http://") || src.starts_with("https://") {
            return Some(src.to_string());
        }
        let joined = if src.starts_with('/') {
            origin.join(src)
        } else {
            origin.join(&format!("atlas/{}", src))
        };
        joined.ok().map(|u| u.to_string())
    }

    /// Hints carried into the records scraped from this entry's page.
    pub fn hints(&self) -> PageHints {
        let title = self.display_title().trim();
        PageHints {
            categories: self.categories.clone(),
            title: (!title.is_empty()).then(|| title.to_string()),
            keywords: self.keywords.clone(),
            year: self.year.clone(),
        }
    }

    /// Scrape target for this entry, if it names a page.
    pub fn target(&self, origin: &Url) -> Option<PageTarget> {
        self.page_url(origin)
            .map(|url| PageTarget::with_hints(url, self.hints()))
    }

    /// Topics this entry is filed under; the sentinel when none map.
    pub fn mapped_categories(&self) -> Vec<Category> {
        let mut mapped: Vec<Category> = Vec::new();
        for cat in self.categories.iter().filter_map(|raw| Category::match_text(raw)) {
            if !mapped.contains(&cat) {
                mapped.push(cat);
            }
        }
        if mapped.is_empty() {
            mapped.push(Category::Uncategorized);
        }
        mapped
    }
}

/// Parses the `linkInformationDB = [...]` array out of the atlas script.
///
/// Returns `None` when the script holds no such array. Objects naming
/// none of `name`, `title` or `src` are dropped.
pub fn parse_atlas_database(js: &str) -> Option<Vec<AtlasEntry>> {
    let marker = js.find(DATABASE_MARKER)?;
    let open = marker + js[marker..].find('[')?;
    let array = &js[open..matching_bracket(js, open)?];

    Some(
        top_level_objects(array)
            .into_iter()
            .map(parse_object)
            .filter(|e| !e.name.is_empty() || !e.title.is_empty() || !e.src.is_empty())
            .collect(),
    )
}

/// Byte offset just past the bracket closing the one at `open`.
fn matching_bracket(js: &str, open: usize) -> Option<usize> {
    let bytes = js.as_bytes();
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => i = skip_string(bytes, i),
            b'[' => depth += 1,
            b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Index of the quote closing the string opened at `start`.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// The `{...}` literals sitting directly inside the array.
fn top_level_objects(array: &str) -> Vec<&str> {
    let bytes = array.as_bytes();
    let mut objects = Vec::new();
    let (mut braces, mut brackets) = (0usize, 0usize);
    let mut start = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => i = skip_string(bytes, i),
            b'[' => brackets += 1,
            b']' => brackets = brackets.saturating_sub(1),
            b'{' => {
                if braces == 0 && brackets == 1 {
                    start = Some(i);
                }
                braces += 1;
            }
            b'}' => {
                braces = braces.saturating_sub(1);
                if braces == 0 && brackets == 1 {
                    if let Some(s) = start.take() {
                        objects.push(&array[s..=i]);
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }
    objects
}

fn unescape(s: &str) -> String {
    s.replace("\\'", "'").replace("\\\"", "\"").replace("\\\\", "\\")
}

fn parse_object(obj: &str) -> AtlasEntry {
    let mut entry = AtlasEntry::default();

    for caps in STRING_FIELD_RE.captures_iter(obj) {
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| unescape(m.as_str()))
            .unwrap_or_default();
        let slot = match &caps[1] {
            "name" => &mut entry.name,
            "imgSrc" => &mut entry.img_src,
            "src" => &mut entry.src,
            "title" => &mut entry.title,
            _ => &mut entry.keywords,
        };
        if slot.is_empty() {
            *slot = value;
        }
    }

    for caps in NUMBER_FIELD_RE.captures_iter(obj) {
        let slot = if &caps[1] == "year" {
            &mut entry.year
        } else {
            &mut entry.num_img
        };
        if slot.is_empty() {
            *slot = caps[2].to_string();
        }
    }

    entry.categories = match CAT_ARRAY_RE.captures(obj) {
        Some(caps) => QUOTED_RE
            .captures_iter(&caps[1])
            .filter_map(|q| q.get(1).or_else(|| q.get(2)))
            .map(|m| m.as_str().to_string())
            .collect(),
        None => CAT_SINGLE_RE
            .captures(obj)
            .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| vec![m.as_str().to_string()])
            .unwrap_or_default(),
    };

    entry
}

/// Files entries under every topic their raw categories map onto, in
/// enumeration order with the sentinel last.
pub fn group_by_category(entries: &[AtlasEntry]) -> BTreeMap<Category, Vec<&AtlasEntry>> {
    let mut groups: BTreeMap<Category, Vec<&AtlasEntry>> = BTreeMap::new();
    for entry in entries {
        for cat in entry.mapped_categories() {
            groups.entry(cat).or_default().push(entry);
        }
    }
    groups
}

/// A link to an atlas page found on the HTML index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AtlasLink {
    pub title: String,
    pub url: String,
}

impl AtlasLink {
    pub fn target(&self) -> PageTarget {
        PageTarget::with_hints(
            self.url.clone(),
            PageHints {
                title: Some(self.title.clone()),
                ..Default::default()
            },
        )
    }
}

/// Collects atlas page links from the HTML index, de-duplicated by URL in
/// document order.
///
/// Root-relative links under `/eyeforum/` belong to the secondary origin.
/// A link without usable text takes its title from a nearby image.
pub fn discover_atlas_links(index_html: &str, index_url: &str, origins: &Origins) -> Vec<AtlasLink> {
    let Ok(index) = Url::parse(index_url) else {
        return Vec::new();
    };
    let doc = Html::parse_document(index_html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for a in doc.select(&LINKS) {
        let Some(href) = a.value().attr("href").map(str::trim) else {
            continue;
        };
        if !href.contains("/atlas/pages/") {
            continue;
        }

        let resolved = if href.starts_with("http://") || href.starts_with("https://") {
            Url::parse(href)
        } else if href.starts_with('/') {
            let origin = if href.contains("/eyeforum/") {
                &origins.secondary
            } else {
                origins.for_page(&index)
            };
            origin.join(href)
        } else {
            index.join(href)
        };
        let Ok(url) = resolved.map(|u| u.to_string()) else {
            continue;
        };

        let mut title = element_text(&a);
        if title.chars().count() < 3 {
            if let Some(parent) = nearest_ancestor_tagged(*a, &["div", "li", "td"]) {
                let alt = parent
                    .descendants()
                    .filter_map(scraper::ElementRef::wrap)
                    .find(|el| IMG.matches(el))
                    .and_then(|img| img.value().attr("alt").or_else(|| img.value().attr("title")))
                    .map(normalize_spaces)
                    .unwrap_or_default();
                title = if alt.is_empty() {
                    normalize_spaces(&node_text(parent)).chars().take(100).collect()
                } else {
                    alt
                };
            }
        }

        if title.chars().count() > 2 && seen.insert(url.clone()) {
            links.push(AtlasLink { title, url });
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DB: &str = r#"
        var version = "22";
        var linkInformationDB = [
            {name: 'amn', title: 'Acute Macular Neuroretinopathy', src: 'pages/Acute-macular-neuroretinopathy/index.htm',
             imgSrc: 'thumbs/amn.jpg', keyWords: 'AMN, Marcus Gunn [rare]', year: '2016', numImg: 4, cat: ['Retina', 'Neuro-op']},
            {name: "coats", title: "Coats\" Disease", src: "/atlas/pages/coats.htm", year: 2019, cat: "Retina"},
            {imgSrc: 'orphan.jpg'},
            {name: 'x', title: 'It\'s odd', src: 'https://webeye.ophth.uiowa.edu/eyeforum/atlas/pages/x.htm', cat: ['Misc']}
        ];
        var other = [1, 2];
    "#;

    #[test]
    fn test_parse_database() {
        let entries = parse_atlas_database(DB).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[0],
            AtlasEntry {
                name: "amn".to_string(),
                title: "Acute Macular Neuroretinopathy".to_string(),
                src: "pages/Acute-macular-neuroretinopathy/index.htm".to_string(),
                img_src: "thumbs/amn.jpg".to_string(),
                keywords: "AMN, Marcus Gunn [rare]".to_string(),
                year: "2016".to_string(),
                num_img: "4".to_string(),
                categories: vec!["Retina".to_string(), "Neuro-op".to_string()],
            }
        );
        assert_eq!(entries[1].title, "Coats\" Disease");
        assert_eq!(entries[1].year, "2019");
        assert_eq!(entries[1].categories, vec!["Retina".to_string()]);
        assert_eq!(entries[2].title, "It's odd");
    }

    #[test]
    fn test_missing_database() {
        assert_eq!(parse_atlas_database("var x = 1;"), None);
    }

    #[test]
    fn test_page_urls() {
        let origin = Url::parse("https://eyerounds.org").unwrap();
        let entries = parse_atlas_database(DB).unwrap();
        assert_eq!(
            entries[0].page_url(&origin).as_deref(),
            Some("https://eyerounds.org/atlas/pages/Acute-macular-neuroretinopathy/index.htm")
        );
        assert_eq!(
            entries[1].page_url(&origin).as_deref(),
            Some("https://eyerounds.org/atlas/pages/coats.htm")
        );
        assert_eq!(
            entries[2].page_url(&origin).as_deref(),
            Some("https://webeye.ophth.uiowa.edu/eyeforum/atlas/pages/x.htm")
        );
    }

    #[test]
    fn test_group_by_category() {
        let entries = parse_atlas_database(DB).unwrap();
        let groups = group_by_category(&entries);
        let retina: Vec<&str> = groups[&Category::Retina].iter().map(|e| e.name.as_str()).collect();
        assert_eq!(retina, vec!["amn", "coats"]);
        assert_eq!(groups[&Category::NeuroOp].len(), 1);
        assert_eq!(groups[&Category::Uncategorized][0].name, "x");
        assert_eq!(groups.keys().last(), Some(&Category::Uncategorized));
    }

    #[test]
    fn test_hints_from_entry() {
        let entries = parse_atlas_database(DB).unwrap();
        let hints = entries[0].hints();
        assert_eq!(hints.title.as_deref(), Some("Acute Macular Neuroretinopathy"));
        assert_eq!(hints.year, "2016");
        assert_eq!(hints.categories.len(), 2);
    }

    #[test]
    fn test_discover_links() {
        let html = r#"<body>
            <a href="/atlas/pages/coats.htm">Coats Disease</a>
            <a href="/eyeforum/atlas/pages/amd.htm">AMD in the elderly</a>
            <div><img src="t.jpg" alt="Iris Nevus"><a href="/atlas/pages/iris-nevus.htm"> </a></div>
            <a href="/atlas/pages/coats.htm">Coats again</a>
            <a href="/about.htm">About</a>
        </body>"#;
        let links = discover_atlas_links(html, DEFAULT_INDEX_URL, &Origins::default());
        assert_eq!(
            links,
            vec![
                AtlasLink {
                    title: "Coats Disease".to_string(),
                    url: "https://eyerounds.org/atlas/pages/coats.htm".to_string(),
                },
                AtlasLink {
                    title: "AMD in the elderly".to_string(),
                    url: "https://webeye.ophth.uiowa.edu/eyeforum/atlas/pages/amd.htm".to_string(),
                },
                AtlasLink {
                    title: "Iris Nevus".to_string(),
                    url: "https://eyerounds.org/atlas/pages/iris-nevus.htm".to_string(),
                },
            ]
        );
    }
}
