// ABOUTME: Main library entry point for the EyeRounds atlas extraction engine.
// ABOUTME: Re-exports the public API: Client, ClientBuilder, extraction, catalog and download types.

//! eyeatlas-extract - turns EyeRounds atlas pages into structured clinical records.
//!
//! Pages are fetched, split into entries (one clinical case each), and every
//! entry is reduced to a [`ClinicalRecord`] carrying a title, a category from
//! the fixed enumeration, credits, a cleaned description and its images.
//!
//! # Example
//!
//! ```no_run
//! use eyeatlas_extract::{Client, DuplicatePolicy, PageTarget};
//! use eyeatlas_records::RecordStore;
//!
//! let client = Client::builder().build();
//! let mut store = RecordStore::open("data/flashcards.json")?;
//! let targets = vec![PageTarget::new(
//!     "https://eyerounds.org/atlas/pages/Acute-macular-neuroretinopathy/index.htm",
//! )];
//! let summary = client.run(&targets, &mut store, DuplicatePolicy::Skip);
//! store.save()?;
//! println!("{summary}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod assemble;
pub mod catalog;
pub mod client;
pub mod dom;
pub mod download;
pub mod error;
pub mod extractors;
pub mod options;
pub mod resource;

pub use crate::assemble::{admit, assemble, AdmitOutcome, DuplicatePolicy, PageHints};
pub use crate::catalog::{
    discover_atlas_links, group_by_category, parse_atlas_database, AtlasEntry, AtlasLink,
};
pub use crate::client::{extract_page, Client, PageFailure, PageTarget, RunSummary};
pub use crate::download::{DownloadSummary, ImageDownloader};
pub use crate::error::{ErrorCode, ScrapeError};
pub use crate::options::{ClientBuilder, Options, Origins};
pub use crate::resource::{HttpSource, PageSource};
pub use eyeatlas_records::{Category, ClinicalRecord, ImageRef};
