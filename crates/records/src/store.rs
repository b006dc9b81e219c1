// ABOUTME: JSON persistence for record collections in the current and legacy file formats.
// ABOUTME: Exposes save/load plus RecordStore, an explicitly owned repository with a load/save lifecycle.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::category::Category;
use crate::error::StoreError;
use crate::models::{lenient, ClinicalRecord, ImageRef, RecordCollection};

/// On-disk layout of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// `{ "total", "categories", "flashcards": [...] }`
    #[default]
    Current,
    /// A bare array of cards with `answer` and `url` fields.
    Legacy,
}

#[derive(Debug, Serialize, Deserialize)]
struct CollectionFile {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    categories: Vec<Category>,
    flashcards: Vec<ClinicalRecord>,
}

/// One card of the legacy bare-array format.
#[derive(Debug, Default, Serialize, Deserialize)]
struct LegacyCard {
    #[serde(default, deserialize_with = "lenient::string")]
    id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    title: String,
    #[serde(default, skip_deserializing)]
    entry_index: usize,
    #[serde(default, deserialize_with = "lenient::images")]
    images: Vec<ImageRef>,
    #[serde(default, deserialize_with = "lenient::string")]
    answer: String,
    #[serde(default, deserialize_with = "lenient::string")]
    contributor: String,
    #[serde(default, deserialize_with = "lenient::string")]
    photographer: String,
    #[serde(default, deserialize_with = "lenient::string")]
    url: String,
    #[serde(default)]
    category: Category,
    #[serde(default, deserialize_with = "lenient::string")]
    keywords: String,
    #[serde(default, deserialize_with = "lenient::string")]
    year: String,
}

/// Answer paragraphs that are credits or source lines rather than description.
const ANSWER_NOISE_PREFIXES: &[&str] = &["Photographers:", "Photographer:", "Contributor:", "Contributors:", "Source:"];

/// Recovers the description from a legacy `answer`, which bundled credits
/// and the source link into the same text.
fn description_from_answer(answer: &str) -> String {
    answer
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .filter(|p| !ANSWER_NOISE_PREFIXES.iter().any(|prefix| p.starts_with(prefix)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Text of the first answer paragraph opening with one of `labels`.
fn credit_from_answer(answer: &str, labels: &[&str]) -> String {
    answer
        .split("\n\n")
        .map(str::trim)
        .find_map(|p| labels.iter().find_map(|label| p.strip_prefix(label)))
        .map(|rest| rest.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

fn or_from_answer(field: String, answer: &str, labels: &[&str]) -> String {
    if field.trim().is_empty() {
        credit_from_answer(answer, labels)
    } else {
        field
    }
}

impl From<LegacyCard> for ClinicalRecord {
    fn from(card: LegacyCard) -> Self {
        ClinicalRecord {
            id: card.id,
            title: card.title,
            category: card.category,
            description: description_from_answer(&card.answer),
            contributor: or_from_answer(card.contributor, &card.answer, &["Contributors:", "Contributor:"]),
            photographer: or_from_answer(
                card.photographer,
                &card.answer,
                &["Photographers:", "Photographer:"],
            ),
            source_url: card.url,
            images: card.images,
            keywords: card.keywords,
            year: card.year,
        }
    }
}

impl LegacyCard {
    fn from_record(index: usize, record: &ClinicalRecord) -> Self {
        LegacyCard {
            id: record.id.clone(),
            title: record.title.clone(),
            entry_index: index,
            images: record.images.clone(),
            answer: record.description.clone(),
            contributor: record.contributor.clone(),
            photographer: record.photographer.clone(),
            url: record.source_url.clone(),
            category: record.category,
            keywords: record.keywords.clone(),
            year: record.year.clone(),
        }
    }
}

/// Encodes a collection as pretty-printed JSON in the given format.
pub fn to_json(records: &RecordCollection, format: Format) -> Result<String, StoreError> {
    let json = match format {
        Format::Current => serde_json::to_string_pretty(&CollectionFile {
            total: records.len(),
            categories: records.categories(),
            flashcards: records.records().to_vec(),
        })?,
        Format::Legacy => {
            let cards: Vec<LegacyCard> = records
                .iter()
                .enumerate()
                .map(|(i, r)| LegacyCard::from_record(i, r))
                .collect();
            serde_json::to_string_pretty(&cards)?
        }
    };
    Ok(json)
}

/// Decodes a collection, trying the current format first and the legacy
/// array second.
pub fn from_json(json: &str) -> Result<RecordCollection, StoreError> {
    let current_err = match serde_json::from_str::<CollectionFile>(json) {
        Ok(file) => return Ok(RecordCollection::from_records(file.flashcards)),
        Err(e) => e,
    };

    match serde_json::from_str::<Vec<LegacyCard>>(json) {
        Ok(cards) => {
            debug!(cards = cards.len(), "loaded legacy collection format");
            Ok(cards.into_iter().map(ClinicalRecord::from).collect())
        }
        Err(legacy_err) => Err(StoreError::Parse(format!(
            "current format: {}; legacy format: {}",
            current_err, legacy_err
        ))),
    }
}

/// Writes `records` to `path` in the current format.
pub fn save(records: &RecordCollection, path: &Path) -> Result<(), StoreError> {
    save_as(records, path, Format::Current)
}

/// Writes `records` to `path` in the chosen format, creating parent directories.
pub fn save_as(records: &RecordCollection, path: &Path, format: Format) -> Result<(), StoreError> {
    let json = to_json(records, format)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    fs::write(path, json).map_err(|e| StoreError::io(path, e))
}

/// Reads a collection file in either format.
pub fn load(path: &Path) -> Result<RecordCollection, StoreError> {
    let json = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    from_json(&json)
}

/// A record collection bound to the file it is persisted in.
///
/// Nothing is cached behind the caller's back: the store is opened
/// explicitly, mutated through `collection_mut`, and written with `save`.
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    collection: RecordCollection,
}

impl RecordStore {
    /// Loads the collection at `path`, or starts empty when the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let collection = if path.exists() {
            load(&path)?
        } else {
            RecordCollection::new()
        };
        debug!(path = %path.display(), records = collection.len(), "opened record store");
        Ok(Self { path, collection })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn collection(&self) -> &RecordCollection {
        &self.collection
    }

    pub fn collection_mut(&mut self) -> &mut RecordCollection {
        &mut self.collection
    }

    /// Persists the collection in the current format.
    pub fn save(&self) -> Result<(), StoreError> {
        save(&self.collection, &self.path)
    }

    pub fn into_collection(self) -> RecordCollection {
        self.collection
    }
}
