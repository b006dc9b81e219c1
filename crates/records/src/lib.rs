// ABOUTME: Library root for eyeatlas-records: the clinical record model and its persisted collection.
// ABOUTME: Re-exports ClinicalRecord, ImageRef, Category, RecordCollection, RecordStore and save/load.

//! Data model and persistence for extracted atlas records.
//!
//! A collection is stored as one JSON document. The current layout is an
//! object with `total`, `categories` and `flashcards`; an older bare-array
//! layout (`answer` instead of `description`, `url` instead of `source_url`)
//! is still readable.

pub mod category;
pub mod error;
pub mod models;
pub mod store;

pub use category::{Category, UnknownCategory};
pub use error::StoreError;
pub use models::{ClinicalRecord, ImageRef, RecordCollection};
pub use store::{from_json, load, save, save_as, to_json, Format, RecordStore};
