// ABOUTME: Heuristic extractors that turn loosely structured atlas pages into record parts.
// ABOUTME: Includes title/category resolution, entry segmentation, field and image extraction.

//! Extraction engine.
//!
//! Submodules:
//! - `title`: page title resolution with URL slug fallback.
//! - `category`: category label resolution onto the fixed enumeration.
//! - `segment`: splits a page into entries with an ordered strategy chain.
//! - `fields`: contributor, photographer and description from entry text.
//! - `images`: image enumeration, filtering, URL resolution, figure labels.

pub mod category;
pub mod fields;
pub mod images;
pub mod segment;
pub mod title;
