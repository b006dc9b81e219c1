// ABOUTME: The Client that fetches atlas pages and turns them into ClinicalRecords.
// ABOUTME: Provides single-page extraction and a sequential, resumable batch run with a summary.

use std::fmt;
use std::thread;

use eyeatlas_records::{ClinicalRecord, RecordStore};
use scraper::Html;
use tracing::{debug, info, warn};
use url::Url;

use crate::assemble::{admit, assemble, DuplicatePolicy, PageContext, PageHints};
use crate::error::{ErrorCode, ScrapeError};
use crate::extractors::category::resolve_category;
use crate::extractors::fields::extract_fields;
use crate::extractors::images::collect_images;
use crate::extractors::segment::segment;
use crate::extractors::title::{heading_title, title_from_url};
use crate::options::{ClientBuilder, Options, Origins};
use crate::resource::{FetchOptions, HttpSource, PageSource};

/// A page to scrape, with whatever the caller already knows about it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageTarget {
    pub url: String,
    pub hints: PageHints,
}

impl PageTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            hints: PageHints::default(),
        }
    }

    pub fn with_hints(url: impl Into<String>, hints: PageHints) -> Self {
        Self {
            url: url.into(),
            hints,
        }
    }
}

impl From<&str> for PageTarget {
    fn from(url: &str) -> Self {
        PageTarget::new(url)
    }
}

/// A page the run gave up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub url: String,
    pub code: ErrorCode,
    pub message: String,
}

/// What a batch run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pages_scraped: usize,
    /// Pages not fetched because the store already held records from them.
    pub pages_already_present: usize,
    pub failures: Vec<PageFailure>,
    pub records_added: usize,
    pub records_skipped: usize,
    pub records_renamed: usize,
}

impl RunSummary {
    pub fn pages_failed(&self) -> usize {
        self.failures.len()
    }

    /// Failed pages whose error carried `code`.
    pub fn failed_with(&self, code: ErrorCode) -> usize {
        self.failures.iter().filter(|f| f.code == code).count()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pages scraped, {} already present, {} failed (network {}, empty {}, invalid url {}); \
             {} records added, {} duplicates skipped, {} renamed",
            self.pages_scraped,
            self.pages_already_present,
            self.pages_failed(),
            self.failed_with(ErrorCode::Network) + self.failed_with(ErrorCode::Timeout),
            self.failed_with(ErrorCode::ExtractionEmpty),
            self.failed_with(ErrorCode::InvalidUrl),
            self.records_added,
            self.records_skipped,
            self.records_renamed,
        )
    }
}

/// Extracts every record from one page's markup.
///
/// Fails with `ExtractionEmpty` when no entry yields a record; a page is
/// never reported as a success with zero records.
pub fn extract_page(
    html: &str,
    url: &str,
    hints: &PageHints,
    origins: &Origins,
) -> Result<Vec<ClinicalRecord>, ScrapeError> {
    let page_url = Url::parse(url).map_err(|e| {
        ScrapeError::invalid_url(url, "Extract", Some(anyhow::anyhow!("invalid URL: {}", e)))
    })?;
    let doc = Html::parse_document(html);

    let title = heading_title(&doc)
        .or_else(|| hints.title.clone().filter(|t| !t.trim().is_empty()))
        .unwrap_or_else(|| title_from_url(url));
    let category = resolve_category(&doc, &hints.categories);

    let entries = segment(&doc);
    let parts = entries
        .iter()
        .map(|entry| {
            (
                extract_fields(&entry.text()),
                collect_images(&entry.nodes, &page_url, origins),
            )
        })
        .collect();

    let context = PageContext {
        source_url: url.to_string(),
        title,
        category,
        keywords: hints.keywords.clone(),
        year: hints.year.clone(),
    };
    let records = assemble(&context, parts);
    if records.is_empty() {
        return Err(ScrapeError::extraction_empty(url, "Extract"));
    }
    debug!(url, entries = entries.len(), records = records.len(), "extracted page");
    Ok(records)
}

/// The atlas scraper client.
pub struct Client {
    opts: Options,
    http: HttpSource,
    source: Option<Box<dyn PageSource>>,
}

impl Client {
    /// Create a new ClientBuilder for configuring the client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a new Client with the given options.
    pub fn new(opts: Options) -> Self {
        let http_client = opts.http_client.clone().unwrap_or_else(|| {
            reqwest::blocking::Client::builder()
                .user_agent(&opts.user_agent)
                .timeout(opts.timeout)
                .gzip(true)
                .brotli(true)
                .deflate(true)
                .build()
                .expect("failed to build HTTP client")
        });
        let fetch_opts = FetchOptions {
            headers: opts.headers.clone(),
        };

        Self {
            http: HttpSource::new(http_client, fetch_opts),
            opts,
            source: None,
        }
    }

    /// Serve pages from `source` instead of HTTP. Image downloads still use HTTP.
    pub fn with_source(mut self, source: impl PageSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// The HTTP side of the client, shared with the image downloader.
    pub fn http(&self) -> &HttpSource {
        &self.http
    }

    /// Fetches a page's markup.
    pub fn fetch_page(&self, url: &str) -> Result<String, ScrapeError> {
        match &self.source {
            Some(source) => source.fetch_page(url),
            None => self.http.fetch_page(url),
        }
    }

    /// Extracts records from markup already in hand.
    pub fn extract_page(
        &self,
        html: &str,
        url: &str,
        hints: &PageHints,
    ) -> Result<Vec<ClinicalRecord>, ScrapeError> {
        extract_page(html, url, hints, &self.opts.origins)
    }

    /// Fetches and extracts one page.
    pub fn scrape_page(&self, target: &PageTarget) -> Result<Vec<ClinicalRecord>, ScrapeError> {
        let html = self.fetch_page(&target.url)?;
        self.extract_page(&html, &target.url, &target.hints)
    }

    /// Scrapes targets one after another into the store's collection.
    ///
    /// No page failure stops the run. With `skip_existing` set, pages the
    /// store already holds records from are not fetched again. The caller
    /// saves the store.
    pub fn run(
        &self,
        targets: &[PageTarget],
        store: &mut RecordStore,
        policy: DuplicatePolicy,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut fetched_any = false;

        for (i, target) in targets.iter().enumerate() {
            if self.opts.skip_existing && store.collection().contains_source(&target.url) {
                debug!(url = %target.url, "already in store, not fetching");
                summary.pages_already_present += 1;
                continue;
            }

            if fetched_any && !self.opts.delay.is_zero() {
                thread::sleep(self.opts.delay);
            }
            fetched_any = true;

            info!(url = %target.url, page = i + 1, of = targets.len(), "scraping page");
            match self.scrape_page(target) {
                Ok(records) => {
                    let outcome = admit(store.collection_mut(), records, policy);
                    info!(
                        url = %target.url,
                        added = outcome.added,
                        skipped = outcome.skipped,
                        renamed = outcome.renamed,
                        "page done"
                    );
                    summary.pages_scraped += 1;
                    summary.records_added += outcome.added;
                    summary.records_skipped += outcome.skipped;
                    summary.records_renamed += outcome.renamed;
                }
                Err(e) => {
                    warn!(url = %target.url, code = %e.code, error = %e, "skipping page");
                    summary.failures.push(PageFailure {
                        url: target.url.clone(),
                        code: e.code,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(%summary, "run finished");
        summary
    }
}
