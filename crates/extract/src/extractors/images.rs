// ABOUTME: Image collection for entry spans: denylist filtering, two-origin URL resolution,
// ABOUTME: figure label recovery and first-seen de-duplication.

use std::collections::HashSet;

use ego_tree::NodeRef;
use eyeatlas_records::ImageRef;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::node::Element;
use scraper::Node;
use url::Url;

use crate::dom::{in_excluded_region, nearest_ancestor_tagged, node_text};
use crate::options::Origins;

/// Substrings marking site furniture rather than clinical photographs
/// (checked case-insensitively against the raw source attribute).
pub const IMAGE_DENYLIST: &[&str] = &[
    "cc.png",
    "lowerlogo",
    "domegold",
    "eyerounds-logo",
    "eyerounds-500w",
    "facebook",
    "twitter",
    "instagram",
    "/i/current/",
    "logo",
    "social",
    "icon",
    "banner",
    "related_case",
];

/// Attributes holding an image source, primary first, then lazy-load variants.
const SOURCE_ATTRS: &[&str] = &["src", "data-src", "data-original", "data-lazy-src"];

/// Blocks whose text is searched for a figure label.
const LABEL_BLOCK_TAGS: &[&str] = &[
    "figure", "figcaption", "p", "div", "td", "li", "section", "article", "blockquote",
];

static FIGURE_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bFigure\s+(\d+[a-z]?)\b").unwrap());

/// True when the source names a known non-clinical asset.
pub fn is_denylisted(src: &str) -> bool {
    let lower = src.to_lowercase();
    IMAGE_DENYLIST.iter().any(|pattern| lower.contains(pattern))
}

/// First usable source attribute of an `<img>`; inline `data:` payloads are not usable.
pub fn image_source(el: &Element) -> Option<&str> {
    if el.name() != "img" {
        return None;
    }
    SOURCE_ATTRS
        .iter()
        .filter_map(|attr| el.attr(attr))
        .map(str::trim)
        .find(|src| !src.is_empty() && !src.starts_with("data:"))
}

/// Every clinical `<img>` in the span, in document order.
///
/// Images inside site chrome, without a usable source, or matching the
/// denylist are left out.
pub fn image_elements<'a>(nodes: &[NodeRef<'a, Node>]) -> Vec<NodeRef<'a, Node>> {
    nodes
        .iter()
        .flat_map(|node| node.descendants())
        .filter(|n| {
            n.value()
                .as_element()
                .and_then(image_source)
                .is_some_and(|src| !is_denylisted(src))
        })
        .filter(|n| !in_excluded_region(*n))
        .collect()
}

/// Resolves an image source to an absolute URL.
///
/// Absolute sources are kept, protocol-relative ones get `https:`, and
/// root-relative ones are joined to the origin `page` belongs to. Anything
/// else is relative to the page itself.
pub fn resolve_image_url(src: &str, page: &Url, origins: &Origins) -> Option<String> {
    let src = src.trim();
    if src.is_empty() || src.starts_with("data:") {
        return None;
    }

    if src.starts_with("http://") || src.starts_with("https://") {
        return Some(src.to_string());
    }

    if let Some(rest) = src.strip_prefix("//") {
        return Url::parse(&format!("https://{}", rest))
            .ok()
            .map(|u| u.to_string());
    }

    let base = if src.starts_with('/') {
        origins.for_page(page)
    } else {
        page
    };
    base.join(src).ok().map(|u| u.to_string())
}

/// `Figure N[x]` label for an image: searched in the enclosing block's
/// text, then in the nearest preceding sibling carrying text.
pub fn figure_label(img: NodeRef<'_, Node>) -> String {
    let from_block = nearest_ancestor_tagged(img, LABEL_BLOCK_TAGS)
        .and_then(|block| find_label(&node_text(block)));
    if let Some(label) = from_block {
        return label;
    }

    img.prev_siblings()
        .map(node_text)
        .find(|text| !text.is_empty())
        .and_then(|text| find_label(&text))
        .unwrap_or_default()
}

fn find_label(text: &str) -> Option<String> {
    FIGURE_LABEL_RE
        .captures(text)
        .map(|caps| format!("Figure {}", &caps[1]))
}

/// Collects the clinical images of a span as [`ImageRef`]s.
///
/// Output follows document order; a URL seen twice keeps its first
/// occurrence only.
pub fn collect_images(nodes: &[NodeRef<'_, Node>], page: &Url, origins: &Origins) -> Vec<ImageRef> {
    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for img in image_elements(nodes) {
        let Some(el) = img.value().as_element() else {
            continue;
        };
        let Some(url) = image_source(el).and_then(|src| resolve_image_url(src, page, origins))
        else {
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }
        images.push(ImageRef {
            url,
            alt: el.attr("alt").unwrap_or_default().to_string(),
            figure_label: figure_label(img),
            local_path: None,
        });
    }

    images
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::content_root;
    use pretty_assertions::assert_eq;
    use scraper::Html;

    fn page() -> Url {
        Url::parse("https://eyerounds.org/atlas/pages/coats/index.htm").unwrap()
    }

    fn collect(html: &str, page: &Url) -> Vec<ImageRef> {
        let doc = Html::parse_document(html);
        collect_images(&[content_root(&doc)], page, &Origins::default())
    }

    #[test]
    fn test_denylist_is_case_insensitive() {
        assert!(is_denylisted("/i/current/header.jpg"));
        assert!(is_denylisted("images/EyeRounds-Logo.png"));
        assert!(is_denylisted("https://x.org/Facebook_share.PNG"));
        assert!(is_denylisted("cc.png"));
        assert!(!is_denylisted("/atlas/images/coats-fig1.jpg"));
    }

    #[test]
    fn test_resolution_rules() {
        let origins = Origins::default();
        let page = page();
        assert_eq!(
            resolve_image_url("https://cdn.org/a.jpg", &page, &origins).as_deref(),
            Some("https://cdn.org/a.jpg")
        );
        assert_eq!(
            resolve_image_url("//cdn.org/a.jpg", &page, &origins).as_deref(),
            Some("https://cdn.org/a.jpg")
        );
        assert_eq!(
            resolve_image_url("/atlas/images/a.jpg", &page, &origins).as_deref(),
            Some("https://eyerounds.org/atlas/images/a.jpg")
        );
        assert_eq!(
            resolve_image_url("fig1.jpg", &page, &origins).as_deref(),
            Some("https://eyerounds.org/atlas/pages/coats/fig1.jpg")
        );
        assert_eq!(resolve_image_url("data:image/png;base64,xx", &page, &origins), None);
    }

    #[test]
    fn test_root_relative_on_secondary_origin() {
        let origins = Origins::default();
        let page = Url::parse("https://webeye.ophth.uiowa.edu/eyeforum/atlas/pages/x/index.htm")
            .unwrap();
        assert_eq!(
            resolve_image_url("/eyeforum/atlas/a.jpg", &page, &origins).as_deref(),
            Some("https://webeye.ophth.uiowa.edu/eyeforum/atlas/a.jpg")
        );
    }

    #[test]
    fn test_collect_filters_dedups_and_labels() {
        let html = r#"<body>
            <header><img src="/i/current/header.jpg"></header>
            <img src="/images/eyerounds-logo.png">
            <div><img src="fig1.jpg" alt="Fundus"><p>Figure 1a. Fundus photo.</p></div>
            <div>Figure 2 <img data-src="fig2.jpg"></div>
            <img src="fig1.jpg" alt="again">
            <img src="facebook.png">
        </body>"#;
        let images = collect(html, &page());
        assert_eq!(
            images,
            vec![
                ImageRef {
                    url: "https://eyerounds.org/atlas/pages/coats/fig1.jpg".to_string(),
                    alt: "Fundus".to_string(),
                    figure_label: "Figure 1a".to_string(),
                    local_path: None,
                },
                ImageRef {
                    url: "https://eyerounds.org/atlas/pages/coats/fig2.jpg".to_string(),
                    alt: String::new(),
                    figure_label: "Figure 2".to_string(),
                    local_path: None,
                },
            ]
        );
    }

    #[test]
    fn test_label_from_preceding_sibling() {
        let html = r#"<body><span>Figure 3b</span><img src="fig3b.jpg"></body>"#;
        let doc = Html::parse_document(html);
        let imgs = image_elements(&[content_root(&doc)]);
        assert_eq!(figure_label(imgs[0]), "Figure 3b");
    }

    #[test]
    fn test_duplicates_keep_first_seen_order() {
        let html = r#"<body><img src="b.jpg"><img src="a.jpg"><img src="b.jpg"><img src="./a.jpg"></body>"#;
        let urls: Vec<String> = collect(html, &page()).into_iter().map(|i| i.url).collect();
        assert_eq!(
            urls,
            vec![
                "https://eyerounds.org/atlas/pages/coats/b.jpg".to_string(),
                "https://eyerounds.org/atlas/pages/coats/a.jpg".to_string(),
            ]
        );
    }
}
