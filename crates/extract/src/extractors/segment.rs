// ABOUTME: Splits an atlas page into entries (one clinical case each) with an ordered strategy chain.
// ABOUTME: Strategies: "Entry N" headings, contributor anchors, whole page, then image proximity.

use std::collections::HashMap;

use ego_tree::{NodeId, NodeRef};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Node, Selector};
use tracing::debug;

use crate::dom::{
    content_root, element_text, in_excluded_region, nearest_container, node_text, nodes_between,
    span_text, Span,
};
use crate::extractors::fields;
use crate::extractors::images::{figure_label, image_elements};

static HEADINGS: Lazy<Selector> = Lazy::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").unwrap());
static ENTRY_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bEntry\b").unwrap());
static ENTRY_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bEntry\s*#?\s*(\d+)").unwrap());
static FIGURE_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").unwrap());

/// One clinical case within a page.
#[derive(Debug, Clone)]
pub struct Entry<'a> {
    /// The markup belonging to the case, in document order.
    pub nodes: Span<'a>,
    /// The `N` of an "Entry N" marker, if one was seen.
    pub hint: Option<u32>,
}

impl<'a> Entry<'a> {
    fn new(nodes: Span<'a>, hint: Option<u32>) -> Self {
        Self { nodes, hint }
    }

    /// Rendered text of the entry.
    pub fn text(&self) -> String {
        span_text(&self.nodes)
    }

    /// True when the entry has a clinical image or a description.
    pub fn is_substantive(&self) -> bool {
        !image_elements(&self.nodes).is_empty() || !fields::description(&self.text()).is_empty()
    }
}

/// A segmentation strategy. An empty result hands over to the next one.
pub type Strategy = for<'a> fn(&'a Html) -> Vec<Entry<'a>>;

/// The strategy chain, in the order it is tried.
pub const STRATEGIES: [(&str, Strategy); 4] = [
    ("entry-headings", by_entry_headings),
    ("contributor-anchors", by_contributor_anchors),
    ("single-page", single_page),
    ("image-proximity", by_image_proximity),
];

/// Partitions a page into entries using the first strategy that finds any.
///
/// Entries with neither a clinical image nor a description are never
/// returned, so a page of pure site chrome segments to nothing.
pub fn segment(doc: &Html) -> Vec<Entry<'_>> {
    for (name, strategy) in STRATEGIES {
        let entries = strategy(doc);
        if !entries.is_empty() {
            debug!(strategy = name, entries = entries.len(), "segmented page");
            return entries;
        }
        debug!(strategy = name, "strategy found no entries");
    }
    Vec::new()
}

/// One entry per heading containing the word "Entry", spanning up to the
/// next such heading.
///
/// Images outside every span (typically above the first heading) join the
/// entry whose number matches their figure label, when there is one.
pub fn by_entry_headings(doc: &Html) -> Vec<Entry<'_>> {
    let headings: Vec<NodeRef<'_, Node>> = doc
        .select(&HEADINGS)
        .filter(|h| !in_excluded_region(**h) && ENTRY_WORD_RE.is_match(&element_text(h)))
        .map(|h| *h)
        .collect();
    if headings.is_empty() {
        return Vec::new();
    }

    let mut entries: Vec<Entry<'_>> = headings
        .iter()
        .enumerate()
        .map(|(i, heading)| {
            let stop = headings.get(i + 1).map(|next| next.id());
            Entry::new(nodes_between(*heading, stop), entry_hint(&node_text(*heading)))
        })
        .collect();

    let root = content_root(doc);
    let scattered: Vec<NodeRef<'_, Node>> = image_elements(&[root])
        .into_iter()
        .filter(|img| !entries.iter().any(|e| span_contains(&e.nodes, *img)))
        .collect();
    attach_scattered(&mut entries, scattered, false, &document_order(root));

    keep_substantive(entries)
}

/// One entry per distinct container holding a contributor label.
///
/// Needs at least two labels on the page; a single one is the
/// single-page layout.
pub fn by_contributor_anchors(doc: &Html) -> Vec<Entry<'_>> {
    let root = content_root(doc);
    if fields::contributor_label_count(&node_text(root)) < 2 {
        return Vec::new();
    }

    let mut containers: Vec<NodeRef<'_, Node>> = Vec::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        if !text.to_lowercase().contains("contributor") || in_excluded_region(node) {
            continue;
        }
        let Some(container) = nearest_container(node) else {
            continue;
        };
        if !fields::has_contributor_label(&node_text(container)) {
            continue;
        }
        if !containers.iter().any(|c| c.id() == container.id()) {
            containers.push(container);
        }
    }

    keep_substantive(
        containers
            .into_iter()
            .map(|c| Entry::new(vec![c], entry_hint(&node_text(c))))
            .collect(),
    )
}

/// The whole page as one entry: exactly one contributor label, or none but
/// a description is present.
pub fn single_page(doc: &Html) -> Vec<Entry<'_>> {
    let root = content_root(doc);
    let text = node_text(root);
    let labels = fields::contributor_label_count(&text);
    if labels == 1 || (labels == 0 && !fields::description(&text).is_empty()) {
        keep_substantive(vec![Entry::new(vec![root], None)])
    } else {
        Vec::new()
    }
}

/// Groups clinical images by their nearest enclosing container.
///
/// Two or more groups give one entry each; images without a container join
/// the group whose entry number matches their figure label, else the first
/// group. Without such a grouping signal the whole page is one entry.
pub fn by_image_proximity(doc: &Html) -> Vec<Entry<'_>> {
    let root = content_root(doc);
    let images = image_elements(&[root]);
    if images.is_empty() {
        return Vec::new();
    }

    let mut containers: Vec<NodeRef<'_, Node>> = Vec::new();
    let mut scattered = Vec::new();
    for img in images {
        match nearest_container(img) {
            Some(c) => {
                if !containers.iter().any(|known| known.id() == c.id()) {
                    containers.push(c);
                }
            }
            None => scattered.push(img),
        }
    }

    // A container nested in another group's container is already covered by it.
    let outer: Vec<NodeRef<'_, Node>> = containers
        .iter()
        .filter(|c| !c.ancestors().any(|a| containers.iter().any(|o| o.id() == a.id())))
        .copied()
        .collect();

    if outer.len() < 2 {
        return keep_substantive(vec![Entry::new(vec![root], None)]);
    }

    let mut entries: Vec<Entry<'_>> = outer
        .into_iter()
        .map(|c| Entry::new(vec![c], entry_hint(&node_text(c))))
        .collect();
    attach_scattered(&mut entries, scattered, true, &document_order(root));
    keep_substantive(entries)
}

fn keep_substantive(entries: Vec<Entry<'_>>) -> Vec<Entry<'_>> {
    entries
        .into_iter()
        .filter(|e| !e.nodes.is_empty() && e.is_substantive())
        .collect()
}

fn entry_hint(text: &str) -> Option<u32> {
    ENTRY_NUMBER_RE
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

fn figure_number(img: NodeRef<'_, Node>) -> Option<u32> {
    let label = figure_label(img);
    FIGURE_NUMBER_RE
        .captures(&label)
        .and_then(|caps| caps[1].parse().ok())
}

fn span_contains(span: &[NodeRef<'_, Node>], node: NodeRef<'_, Node>) -> bool {
    span.iter()
        .any(|n| n.id() == node.id() || node.ancestors().any(|a| a.id() == n.id()))
}

fn document_order(root: NodeRef<'_, Node>) -> HashMap<NodeId, usize> {
    root.descendants()
        .enumerate()
        .map(|(i, n)| (n.id(), i))
        .collect()
}

/// Second pass for images no entry claimed: the entry whose hint equals
/// the image's figure number takes it, else the first entry when
/// `fallback_first` is set. Entry spans are re-sorted into document order.
fn attach_scattered<'a>(
    entries: &mut [Entry<'a>],
    scattered: Vec<NodeRef<'a, Node>>,
    fallback_first: bool,
    order: &HashMap<NodeId, usize>,
) {
    if scattered.is_empty() || entries.is_empty() {
        return;
    }
    for img in scattered {
        let matched = figure_number(img)
            .and_then(|n| entries.iter().position(|e| e.hint == Some(n)));
        let target = matched.or(if fallback_first { Some(0) } else { None });
        if let Some(idx) = target {
            entries[idx].nodes.push(img);
        }
    }
    for entry in entries.iter_mut() {
        entry
            .nodes
            .sort_by_key(|n| order.get(&n.id()).copied().unwrap_or(usize::MAX));
    }
}
