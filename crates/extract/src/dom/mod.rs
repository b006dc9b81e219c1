// ABOUTME: DOM traversal utilities for HTML parsing.
// ABOUTME: Provides helpers for rendering and walking scraper's HTML document tree.

//! DOM utilities for the atlas extractors.
//!
//! Extraction works on "spans": runs of nodes in document order. This module
//! renders spans to line-structured text and answers structural questions
//! (is this chrome, what is the enclosing container) the extractors ask.

pub mod text;

pub use text::{
    content_root, element_text, in_excluded_region, nearest_ancestor_tagged, nearest_container,
    node_text, nodes_between, normalize_spaces, span_text, Span,
};
