// ABOUTME: Command-line front end for the EyeRounds atlas scraper.
// ABOUTME: Subcommands read the catalog, scrape pages into a collection, download images and print stats.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use eyeatlas_extract::catalog::{DEFAULT_DATABASE_URL, DEFAULT_INDEX_URL};
use eyeatlas_extract::{
    admit, discover_atlas_links, group_by_category, parse_atlas_database, AtlasEntry, Category,
    Client, DuplicatePolicy, ImageDownloader, PageHints, PageTarget,
};
use eyeatlas_records::{save_as, Format, RecordStore};
use serde_json::json;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "eyeatlas")]
#[command(about = "Scrape the EyeRounds ophthalmology atlas into structured clinical records")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarise the atlas database by category
    Catalog {
        #[command(flatten)]
        source: CatalogSource,

        /// Print every entry as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Scrape atlas pages into a record collection
    Scrape(ScrapeArgs),
    /// Download images for an existing collection
    Download {
        /// Collection file to update
        #[arg(short = 'i', long = "input", default_value = "data/flashcards.json")]
        input: PathBuf,

        #[arg(long = "images-dir", default_value = "data/images")]
        images_dir: PathBuf,

        /// Pause between requests in milliseconds
        #[arg(long = "delay-ms", default_value_t = 500)]
        delay_ms: u64,
    },
    /// Per-category record and image counts of a collection
    Stats {
        #[arg(short = 'i', long = "input", default_value = "data/flashcards.json")]
        input: PathBuf,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct CatalogSource {
    /// URL of the atlas JavaScript database
    #[arg(long = "db-url", default_value = DEFAULT_DATABASE_URL)]
    db_url: String,

    /// Read the atlas database from a local file instead
    #[arg(long = "db-file", conflicts_with = "db_url")]
    db_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ScrapeArgs {
    /// Atlas page URLs
    urls: Vec<String>,

    /// Scrape every catalog page filed under this category (repeatable)
    #[arg(short = 'c', long = "category")]
    categories: Vec<Category>,

    /// Scrape every page linked from the HTML atlas index
    #[arg(long = "from-index", num_args = 0..=1, default_missing_value = DEFAULT_INDEX_URL)]
    from_index: Option<String>,

    #[command(flatten)]
    catalog: CatalogSource,

    /// Extract a saved HTML file instead of fetching (requires --url)
    #[arg(long = "html", requires = "url")]
    html: Option<PathBuf>,

    /// Page URL the --html file was saved from
    #[arg(long = "url")]
    url: Option<String>,

    /// Collection file; existing records are kept
    #[arg(short = 'o', long = "output", default_value = "data/flashcards.json")]
    output: PathBuf,

    /// Write the legacy bare-array layout
    #[arg(long)]
    legacy: bool,

    /// What to do with records whose identity already exists: skip or suffix
    #[arg(long = "on-duplicate", default_value_t = DuplicatePolicy::Skip)]
    on_duplicate: DuplicatePolicy,

    /// Do not refetch pages that already have records in the collection
    #[arg(long)]
    resume: bool,

    /// Download images after scraping
    #[arg(long = "download-images")]
    download_images: bool,

    #[arg(long = "images-dir", default_value = "data/images")]
    images_dir: PathBuf,

    /// Pause between requests in milliseconds
    #[arg(long = "delay-ms", default_value_t = 500)]
    delay_ms: u64,

    /// Scrape at most this many pages
    #[arg(long)]
    limit: Option<usize>,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Catalog { source, json } => catalog(&source, json),
        Command::Scrape(args) => scrape(args),
        Command::Download {
            input,
            images_dir,
            delay_ms,
        } => download(&input, &images_dir, delay_ms),
        Command::Stats { input, json } => stats(&input, json),
    }
}

fn load_catalog(client: &Client, source: &CatalogSource) -> Result<Vec<AtlasEntry>> {
    let js = match &source.db_file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading atlas database {}", path.display()))?,
        None => client
            .fetch_page(&source.db_url)
            .with_context(|| format!("fetching atlas database {}", source.db_url))?,
    };
    let entries = parse_atlas_database(&js).context("no atlas database found in script")?;
    info!(entries = entries.len(), "loaded atlas catalog");
    Ok(entries)
}

fn catalog(source: &CatalogSource, as_json: bool) -> Result<ExitCode> {
    let client = Client::builder().build();
    let entries = load_catalog(&client, source)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(ExitCode::SUCCESS);
    }

    for (category, members) in group_by_category(&entries) {
        println!("{:<20} {:>5}", category.label(), members.len());
    }
    println!("{:<20} {:>5}", "TOTAL ENTRIES", entries.len());
    Ok(ExitCode::SUCCESS)
}

fn scrape(args: ScrapeArgs) -> Result<ExitCode> {
    if args.html.is_none() && args.urls.is_empty() && args.categories.is_empty() && args.from_index.is_none() {
        bail!("nothing to scrape: give URLs, --category, --from-index, or --html with --url");
    }
    if args.html.is_some()
        && (!args.urls.is_empty() || !args.categories.is_empty() || args.from_index.is_some())
    {
        bail!("--html cannot be combined with URLs, --category or --from-index");
    }

    let client = Client::builder()
        .delay(Duration::from_millis(args.delay_ms))
        .skip_existing(args.resume)
        .build();
    let mut store = RecordStore::open(&args.output)
        .with_context(|| format!("opening collection {}", args.output.display()))?;

    let failed_everything = if let (Some(html_path), Some(url)) = (&args.html, &args.url) {
        let html = fs::read_to_string(html_path)
            .with_context(|| format!("reading {}", html_path.display()))?;
        let records = client.extract_page(&html, url, &PageHints::default())?;
        let outcome = admit(store.collection_mut(), records, args.on_duplicate);
        println!(
            "{} records added, {} duplicates skipped, {} renamed",
            outcome.added, outcome.skipped, outcome.renamed
        );
        false
    } else {
        let mut targets = targets_from_args(&client, &args)?;
        if let Some(limit) = args.limit {
            targets.truncate(limit);
        }
        info!(pages = targets.len(), policy = %args.on_duplicate, "starting scrape");
        let summary = client.run(&targets, &mut store, args.on_duplicate);
        for failure in &summary.failures {
            eprintln!("failed {}: {}", failure.url, failure.message);
        }
        println!("{summary}");
        summary.pages_scraped == 0 && summary.pages_failed() > 0
    };

    if args.download_images {
        let downloader = ImageDownloader::from_client(&client, &args.images_dir);
        let summary = downloader.download_collection(store.collection_mut());
        println!(
            "{} images downloaded, {} already present, {} failed",
            summary.downloaded,
            summary.already_present,
            summary.failures.len()
        );
    }

    write_store(&store, args.legacy)?;
    println!(
        "{} records in {}",
        store.collection().len(),
        store.path().display()
    );

    Ok(if failed_everything {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}

/// URLs first, then catalog pages of the requested categories, then index
/// links; a page named twice is scraped once.
fn targets_from_args(client: &Client, args: &ScrapeArgs) -> Result<Vec<PageTarget>> {
    let mut targets: Vec<PageTarget> = args.urls.iter().map(PageTarget::new).collect();

    if !args.categories.is_empty() {
        let entries = load_catalog(client, &args.catalog)?;
        let origin = &client.options().origins.primary;
        let groups = group_by_category(&entries);
        for category in &args.categories {
            let Some(members) = groups.get(category) else {
                warn!(category = %category, "no catalog entries in category");
                continue;
            };
            targets.extend(members.iter().filter_map(|entry| entry.target(origin)));
        }
    }

    if let Some(index_url) = &args.from_index {
        let html = client
            .fetch_page(index_url)
            .with_context(|| format!("fetching atlas index {index_url}"))?;
        let links = discover_atlas_links(&html, index_url, &client.options().origins);
        info!(links = links.len(), "discovered atlas pages");
        targets.extend(links.iter().map(|link| link.target()));
    }

    let mut seen = std::collections::HashSet::new();
    targets.retain(|t| seen.insert(t.url.clone()));
    Ok(targets)
}

fn write_store(store: &RecordStore, legacy: bool) -> Result<()> {
    let result = if legacy {
        save_as(store.collection(), store.path(), Format::Legacy)
    } else {
        store.save()
    };
    result.with_context(|| format!("writing collection {}", store.path().display()))
}

fn download(input: &Path, images_dir: &Path, delay_ms: u64) -> Result<ExitCode> {
    if !input.exists() {
        bail!("collection not found: {}", input.display());
    }
    let client = Client::builder()
        .delay(Duration::from_millis(delay_ms))
        .build();
    let mut store = RecordStore::open(input)
        .with_context(|| format!("opening collection {}", input.display()))?;

    let downloader = ImageDownloader::from_client(&client, images_dir);
    let summary = downloader.download_collection(store.collection_mut());
    store
        .save()
        .with_context(|| format!("writing collection {}", input.display()))?;

    for failure in &summary.failures {
        eprintln!("failed {} ({}): {}", failure.url, failure.record_id, failure.message);
    }
    println!(
        "{} images downloaded, {} already present, {} failed",
        summary.downloaded,
        summary.already_present,
        summary.failures.len()
    );
    Ok(ExitCode::SUCCESS)
}

fn stats(input: &Path, as_json: bool) -> Result<ExitCode> {
    let collection = eyeatlas_records::load(input)
        .with_context(|| format!("loading collection {}", input.display()))?;

    let rows: Vec<(Category, usize, usize)> = collection
        .categories()
        .into_iter()
        .map(|category| {
            let records = collection.filter_category(category);
            let images = records.iter().map(|r| r.images.len()).sum();
            (category, records.len(), images)
        })
        .collect();

    if as_json {
        let per_category: Vec<_> = rows
            .iter()
            .map(|(category, records, images)| {
                json!({ "category": category, "records": records, "images": images })
            })
            .collect();
        let output = json!({
            "total": collection.len(),
            "images": collection.image_count(),
            "categories": per_category,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(ExitCode::SUCCESS);
    }

    for (category, records, images) in &rows {
        println!("{:<20} {:>5} records {:>6} images", category.label(), records, images);
    }
    println!(
        "{:<20} {:>5} records {:>6} images",
        "TOTAL",
        collection.len(),
        collection.image_count()
    );
    Ok(ExitCode::SUCCESS)
}
