// ABOUTME: Record assembly: merges page-level and per-entry extraction results into ClinicalRecords.
// ABOUTME: Derives identities and admits records into a collection under a caller-chosen duplicate policy.

use std::fmt;
use std::str::FromStr;

use eyeatlas_records::{Category, ClinicalRecord, ImageRef, RecordCollection};
use tracing::debug;

use crate::extractors::fields::EntryFields;
use crate::extractors::title::url_slug;

/// Appended to an identity that already exists under [`DuplicatePolicy::Suffix`].
pub const DUPLICATE_SUFFIX: &str = "_dup";

/// What to do with a record whose identity is already in the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Keep the existing record and drop the new one.
    #[default]
    Skip,
    /// Keep both, renaming the new one `{id}_dup`, `{id}_dup2`, ...
    Suffix,
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicatePolicy::Skip => write!(f, "skip"),
            DuplicatePolicy::Suffix => write!(f, "suffix"),
        }
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(DuplicatePolicy::Skip),
            "suffix" => Ok(DuplicatePolicy::Suffix),
            other => Err(format!("unknown duplicate policy: {other} (expected skip or suffix)")),
        }
    }
}

/// Page metadata supplied by the caller, usually from the atlas catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageHints {
    /// Raw category names; consulted only when the page has no usable label.
    pub categories: Vec<String>,
    /// Title used when the page has no qualifying heading.
    pub title: Option<String>,
    pub keywords: String,
    pub year: String,
}

/// Page-level values shared by every record from one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    pub source_url: String,
    pub title: String,
    pub category: Category,
    pub keywords: String,
    pub year: String,
}

/// Identity of the `position`-th (1-based) entry of a page.
pub fn record_identity(page_url: &str, position: usize) -> String {
    format!("{}_{}", url_slug(page_url), position)
}

/// First free `{id}_dup`, `{id}_dup2`, ... not already taken.
pub fn suffixed_identity(id: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut candidate = format!("{id}{DUPLICATE_SUFFIX}");
    let mut n = 2;
    while taken(&candidate) {
        candidate = format!("{id}{DUPLICATE_SUFFIX}{n}");
        n += 1;
    }
    candidate
}

/// Builds one record per entry, in entry order.
///
/// Identities number entries by their position in `entries`, so an entry
/// dropped for carrying neither images nor a description leaves a gap
/// rather than shifting its successors.
pub fn assemble(page: &PageContext, entries: Vec<(EntryFields, Vec<ImageRef>)>) -> Vec<ClinicalRecord> {
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(i, (fields, images))| {
            let mut record = ClinicalRecord {
                id: record_identity(&page.source_url, i + 1),
                title: page.title.clone(),
                category: page.category,
                description: fields.description,
                contributor: fields.contributor,
                photographer: fields.photographer,
                source_url: page.source_url.clone(),
                images: Vec::with_capacity(images.len()),
                keywords: page.keywords.clone(),
                year: page.year.clone(),
            };
            for image in images {
                record.push_image(image);
            }
            if record.is_empty() {
                debug!(id = %record.id, "dropping entry with no images and no description");
                None
            } else {
                Some(record)
            }
        })
        .collect()
}

/// Counts from one [`admit`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdmitOutcome {
    pub added: usize,
    pub skipped: usize,
    pub renamed: usize,
}

/// Adds records to the collection without ever duplicating an identity.
pub fn admit(
    collection: &mut RecordCollection,
    records: Vec<ClinicalRecord>,
    policy: DuplicatePolicy,
) -> AdmitOutcome {
    let mut outcome = AdmitOutcome::default();
    for mut record in records {
        if collection.contains_id(&record.id) {
            match policy {
                DuplicatePolicy::Skip => {
                    debug!(id = %record.id, "skipping duplicate identity");
                    outcome.skipped += 1;
                    continue;
                }
                DuplicatePolicy::Suffix => {
                    let renamed = suffixed_identity(&record.id, |id| collection.contains_id(id));
                    debug!(from = %record.id, to = %renamed, "renaming duplicate identity");
                    record.id = renamed;
                    outcome.renamed += 1;
                }
            }
        }
        collection.push(record);
        outcome.added += 1;
    }
    outcome
}
