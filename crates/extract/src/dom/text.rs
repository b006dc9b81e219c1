// ABOUTME: Text rendering and tree helpers over scraper's DOM for the heuristic extractors.
// ABOUTME: Renders node spans to line-structured text and classifies site chrome and block containers.

use ego_tree::{NodeId, NodeRef};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::node::Element;
use scraper::{ElementRef, Html, Node};

/// A contiguous run of markup, in document order.
pub type Span<'a> = Vec<NodeRef<'a, Node>>;

/// Elements whose boundaries become line breaks in rendered text.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "caption", "dd", "div", "dl", "dt",
    "figcaption", "figure", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "main", "ol",
    "p", "pre", "section", "table", "tbody", "td", "th", "thead", "tr", "ul",
];

/// Never rendered, never searched for images.
const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template", "head", "title"];

/// Page furniture shared by every atlas page.
const CHROME_TAGS: &[&str] = &["header", "nav", "footer"];
const CHROME_ROLES: &[&str] = &["navigation", "banner", "contentinfo"];

/// Containers that can hold a whole case. Paragraphs and inline elements
/// are deliberately absent: a label inside `<p><strong>` belongs to the
/// surrounding block, not to the paragraph.
pub const CONTAINER_TAGS: &[&str] = &["div", "section", "article", "td", "li", "figure", "blockquote", "main"];

static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapses runs of whitespace to single spaces and trims.
pub fn normalize_spaces(text: &str) -> String {
    WS_RE.replace_all(text.trim(), " ").into_owned()
}

/// True for `<header>`, `<nav>`, `<footer>` and landmark roles of the same kind.
pub fn is_chrome(el: &Element) -> bool {
    CHROME_TAGS.contains(&el.name())
        || el
            .attr("role")
            .is_some_and(|role| CHROME_ROLES.contains(&role.trim().to_ascii_lowercase().as_str()))
}

/// True when the element or anything above it is chrome or invisible.
pub fn in_excluded_region(node: NodeRef<'_, Node>) -> bool {
    std::iter::once(node)
        .chain(node.ancestors())
        .filter_map(|n| n.value().as_element())
        .any(|el| is_chrome(el) || INVISIBLE_TAGS.contains(&el.name()))
}

/// The `<body>` of a document, or the tree root for fragments.
pub fn content_root(doc: &Html) -> NodeRef<'_, Node> {
    doc.root_element()
        .children()
        .find(|n| n.value().as_element().is_some_and(|el| el.name() == "body"))
        .unwrap_or_else(|| doc.tree.root())
}

/// Renders a span to text.
///
/// Text nodes have their internal whitespace collapsed (source formatting
/// carries no meaning), while block boundaries and `<br>` become newlines.
/// Chrome and invisible elements are skipped.
pub fn span_text(nodes: &[NodeRef<'_, Node>]) -> String {
    let mut out = String::new();
    for node in nodes {
        push_text(*node, &mut out);
    }
    tidy_lines(&out)
}

/// Renders a single node's subtree to text; see [`span_text`].
pub fn node_text(node: NodeRef<'_, Node>) -> String {
    span_text(&[node])
}

/// Plain inline text of an element with whitespace collapsed.
pub fn element_text(el: &ElementRef<'_>) -> String {
    normalize_spaces(&el.text().collect::<String>())
}

fn push_text(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => {
            let collapsed = WS_RE.replace_all(text, " ");
            if collapsed.trim().is_empty() {
                if !out.is_empty() && !out.ends_with([' ', '\n']) {
                    out.push(' ');
                }
            } else {
                out.push_str(&collapsed);
            }
        }
        Node::Element(el) => {
            let name = el.name();
            if INVISIBLE_TAGS.contains(&name) || is_chrome(el) {
                return;
            }
            if name == "br" {
                out.push('\n');
                return;
            }
            let block = BLOCK_TAGS.contains(&name);
            if block {
                out.push('\n');
            }
            for child in node.children() {
                push_text(child, out);
            }
            if block {
                out.push('\n');
            }
        }
        Node::Document | Node::Fragment => {
            for child in node.children() {
                push_text(child, out);
            }
        }
        _ => {}
    }
}

/// Trims every line and drops blank ones.
fn tidy_lines(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Nearest ancestor (excluding the node itself) that is a case container.
pub fn nearest_container<'a>(node: NodeRef<'a, Node>) -> Option<NodeRef<'a, Node>> {
    node.ancestors().find(|n| {
        n.value()
            .as_element()
            .is_some_and(|el| CONTAINER_TAGS.contains(&el.name()))
    })
}

/// Nearest enclosing element of any of the given tag names.
pub fn nearest_ancestor_tagged<'a>(
    node: NodeRef<'a, Node>,
    tags: &[&str],
) -> Option<NodeRef<'a, Node>> {
    node.ancestors().find(|n| {
        n.value()
            .as_element()
            .is_some_and(|el| tags.contains(&el.name()))
    })
}

pub fn contains_node(haystack: NodeRef<'_, Node>, needle: NodeId) -> bool {
    haystack.descendants().any(|d| d.id() == needle)
}

/// Next node in document order after `node`'s whole subtree.
fn following(node: NodeRef<'_, Node>) -> Option<NodeRef<'_, Node>> {
    let mut cur = node;
    loop {
        if let Some(sib) = cur.next_sibling() {
            return Some(sib);
        }
        cur = cur.parent()?;
    }
}

/// Every maximal subtree strictly after `start` and before `stop` (or the
/// end of the document), in document order.
///
/// `start` and `stop` may sit at different depths; ancestors of `stop` are
/// descended into rather than taken whole.
pub fn nodes_between<'a>(start: NodeRef<'a, Node>, stop: Option<NodeId>) -> Span<'a> {
    let mut nodes = Vec::new();
    let mut next = following(start);
    while let Some(node) = next {
        if Some(node.id()) == stop {
            break;
        }
        if stop.is_some_and(|id| contains_node(node, id)) {
            next = node.first_child();
            continue;
        }
        nodes.push(node);
        next = following(node);
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Selector;

    #[test]
    fn test_span_text_lines_follow_blocks() {
        let doc = Html::parse_document(
            "<body><div><p>Contributor: Jane   Doe,\n  MD</p><p>Photographer: <b>Bob</b></p>Loose text<br>after break</div></body>",
        );
        let text = node_text(content_root(&doc));
        assert_eq!(
            text,
            "Contributor: Jane Doe, MD\nPhotographer: Bob\nLoose text\nafter break"
        );
    }

    #[test]
    fn test_span_text_skips_chrome_and_scripts() {
        let doc = Html::parse_document(
            "<body><header>EyeRounds.org</header><nav>Atlas</nav><script>var x=1;</script><p>Case text.</p><footer>Copyright</footer></body>",
        );
        assert_eq!(node_text(content_root(&doc)), "Case text.");
    }

    #[test]
    fn test_inline_whitespace_between_elements_is_kept() {
        let doc = Html::parse_document("<p><b>Figure 1</b> <i>Fundus</i></p>");
        assert_eq!(node_text(content_root(&doc)), "Figure 1 Fundus");
    }

    #[test]
    fn test_nodes_between_crosses_depths() {
        let doc = Html::parse_document(
            r#"<body><h4 id="a">Entry 1</h4><p>one</p><div><p>two</p><h4 id="b">Entry 2</h4><p>three</p></div></body>"#,
        );
        let sel = Selector::parse("h4").unwrap();
        let heads: Vec<_> = doc.select(&sel).collect();
        let first = nodes_between(*heads[0], Some(heads[1].id()));
        assert_eq!(span_text(&first), "one\ntwo");
        let second = nodes_between(*heads[1], None);
        assert_eq!(span_text(&second), "three");
    }

    #[test]
    fn test_in_excluded_region() {
        let doc = Html::parse_document(
            r#"<body><footer><img src="a.png"></footer><div role="navigation"><img src="b.png"></div><img src="c.png"></body>"#,
        );
        let sel = Selector::parse("img").unwrap();
        let flags: Vec<bool> = doc.select(&sel).map(|img| in_excluded_region(*img)).collect();
        assert_eq!(flags, vec![true, true, false]);
    }

    #[test]
    fn test_nearest_container_skips_paragraphs() {
        let doc = Html::parse_document(
            r#"<body><div id="case"><p><strong>Contributor:</strong> A</p></div></body>"#,
        );
        let sel = Selector::parse("strong").unwrap();
        let strong = doc.select(&sel).next().unwrap();
        let container = nearest_container(*strong).unwrap();
        assert_eq!(container.value().as_element().unwrap().attr("id"), Some("case"));
    }
}
