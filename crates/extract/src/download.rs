// ABOUTME: Image downloader that saves record images under a per-category directory tree.
// ABOUTME: Sequential with the inter-request delay; failures are logged and leave URL-only images.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use eyeatlas_records::{ClinicalRecord, ImageRef, RecordCollection};
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::error::ScrapeError;
use crate::resource::HttpSource;

/// Extensions kept from the image URL; anything else is saved as `.jpg`.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "tif", "tiff", "bmp"];

/// An image that could not be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadFailure {
    pub record_id: String,
    pub url: String,
    pub message: String,
}

/// What a download pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub downloaded: usize,
    pub already_present: usize,
    pub failures: Vec<DownloadFailure>,
}

impl DownloadSummary {
    fn merge(&mut self, other: DownloadSummary) {
        self.downloaded += other.downloaded;
        self.already_present += other.already_present;
        self.failures.extend(other.failures);
    }
}

/// Saves record images to `<dir>/<category>/<id>_<figX_N or imgN><ext>`.
pub struct ImageDownloader<'a> {
    http: &'a HttpSource,
    dir: PathBuf,
    delay: Duration,
    fetched_any: std::cell::Cell<bool>,
}

impl<'a> ImageDownloader<'a> {
    pub fn new(http: &'a HttpSource, dir: impl Into<PathBuf>, delay: Duration) -> Self {
        Self {
            http,
            dir: dir.into(),
            delay,
            fetched_any: std::cell::Cell::new(false),
        }
    }

    /// A downloader sharing the client's HTTP settings and delay.
    pub fn from_client(client: &'a Client, dir: impl Into<PathBuf>) -> Self {
        Self::new(client.http(), dir, client.options().delay)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the `index`-th image of `record` is stored.
    ///
    /// The position is always part of the name; images sharing a figure
    /// label never share a file.
    pub fn image_path(&self, record: &ClinicalRecord, index: usize, image: &ImageRef) -> PathBuf {
        let label = image.figure_label.trim().trim_start_matches("Figure").trim();
        let tag = if label.is_empty() {
            format!("img{}", index + 1)
        } else {
            format!("fig{}_{}", label, index + 1)
        };
        let stem = sanitize_file_stem(&format!("{}_{}", record.id, tag));
        self.dir
            .join(record.category.slug())
            .join(format!("{}.{}", stem, image_extension(&image.url)))
    }

    /// Downloads every image of one record, setting `local_path` on success.
    pub fn download_record(&self, record: &mut ClinicalRecord) -> DownloadSummary {
        let mut summary = DownloadSummary::default();
        let paths: Vec<PathBuf> = record
            .images
            .iter()
            .enumerate()
            .map(|(i, image)| self.image_path(record, i, image))
            .collect();

        for (image, path) in record.images.iter_mut().zip(paths) {
            if path.exists() {
                debug!(path = %path.display(), "image already on disk");
                image.local_path = Some(path.display().to_string());
                summary.already_present += 1;
                continue;
            }
            match self.save_image(&image.url, &path) {
                Ok(()) => {
                    image.local_path = Some(path.display().to_string());
                    summary.downloaded += 1;
                }
                Err(e) => {
                    warn!(id = %record.id, url = %image.url, error = %e, "image download failed");
                    summary.failures.push(DownloadFailure {
                        record_id: record.id.clone(),
                        url: image.url.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
        summary
    }

    /// Downloads images for every record in the collection.
    pub fn download_collection(&self, collection: &mut RecordCollection) -> DownloadSummary {
        let mut summary = DownloadSummary::default();
        for record in collection.iter_mut() {
            summary.merge(self.download_record(record));
        }
        info!(
            downloaded = summary.downloaded,
            already_present = summary.already_present,
            failed = summary.failures.len(),
            "image download finished"
        );
        summary
    }

    fn save_image(&self, url: &str, path: &Path) -> Result<(), ScrapeError> {
        if self.fetched_any.replace(true) && !self.delay.is_zero() {
            thread::sleep(self.delay);
        }

        let result = self
            .http
            .fetch(url)
            .map_err(|e| ScrapeError::image_download(url, "Download", Some(anyhow::Error::new(e))))?;
        if result
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("text/"))
        {
            return Err(ScrapeError::image_download(
                url,
                "Download",
                Some(anyhow::anyhow!("not an image: {}", result.content_type.unwrap_or_default())),
            ));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ScrapeError::io(url, "Download", e))?;
        }
        fs::write(path, &result.body).map_err(|e| ScrapeError::io(url, "Download", e))?;
        debug!(url, path = %path.display(), bytes = result.body.len(), "saved image");
        Ok(())
    }
}

/// Keeps ASCII alphanumerics, `.`, `_` and `-`.
fn sanitize_file_stem(stem: &str) -> String {
    stem.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect()
}

fn image_extension(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segs| segs.next_back().map(str::to_string))
        })
        .and_then(|last| last.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()))
        .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or_else(|| "jpg".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::FetchOptions;
    use eyeatlas_records::Category;
    use httpmock::prelude::*;

    fn http() -> HttpSource {
        HttpSource::new(reqwest::blocking::Client::new(), FetchOptions::default())
    }

    fn record(images: Vec<ImageRef>) -> ClinicalRecord {
        ClinicalRecord {
            id: "coats-disease_1".to_string(),
            category: Category::Retina,
            images,
            ..Default::default()
        }
    }

    #[test]
    fn test_image_path_uses_figure_or_index() {
        let http = http();
        let downloader = ImageDownloader::new(&http, "/tmp/imgs", Duration::ZERO);
        let mut fig = ImageRef::new("https://eyerounds.org/a/Fig1A.PNG");
        fig.figure_label = "Figure 1a".to_string();
        let plain = ImageRef::new("https://eyerounds.org/a/photo?size=large");
        let rec = record(vec![]);
        assert_eq!(
            downloader.image_path(&rec, 0, &fig),
            PathBuf::from("/tmp/imgs/retina/coats-disease_1_fig1a_1.png")
        );
        assert_eq!(
            downloader.image_path(&rec, 1, &plain),
            PathBuf::from("/tmp/imgs/retina/coats-disease_1_img2.jpg")
        );
    }

    #[test]
    fn test_images_sharing_a_figure_label_get_their_own_files() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/a.jpg");
            then.status(200).header("content-type", "image/jpeg").body("AAAA");
        });
        server.mock(|when, then| {
            when.method(GET).path("/b.jpg");
            then.status(200).header("content-type", "image/jpeg").body("BBBB");
        });

        let dir = tempfile::tempdir().unwrap();
        let http = http();
        let downloader = ImageDownloader::new(&http, dir.path(), Duration::ZERO);
        let mut first = ImageRef::new(server.url("/a.jpg"));
        first.figure_label = "Figure 1".to_string();
        let mut second = ImageRef::new(server.url("/b.jpg"));
        second.figure_label = "Figure 1".to_string();
        let mut rec = record(vec![first, second]);

        let summary = downloader.download_record(&mut rec);
        assert_eq!(summary.downloaded, 2);
        assert_eq!(summary.already_present, 0);

        let a = rec.images[0].local_path.clone().unwrap();
        let b = rec.images[1].local_path.clone().unwrap();
        assert_ne!(a, b);
        assert_eq!(fs::read(&a).unwrap(), b"AAAA");
        assert_eq!(fs::read(&b).unwrap(), b"BBBB");
    }

    #[test]
    fn test_download_sets_local_paths_and_reports_failures() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/ok.jpg");
            then.status(200).header("content-type", "image/jpeg").body("JPEGDATA");
        });
        server.mock(|when, then| {
            when.method(GET).path("/gone.jpg");
            then.status(404);
        });

        let dir = tempfile::tempdir().unwrap();
        let http = http();
        let downloader = ImageDownloader::new(&http, dir.path(), Duration::ZERO);
        let mut rec = record(vec![
            ImageRef::new(server.url("/ok.jpg")),
            ImageRef::new(server.url("/gone.jpg")),
        ]);

        let summary = downloader.download_record(&mut rec);
        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.failures.len(), 1);
        assert!(summary.failures[0].message.contains("image download error"));

        let saved = rec.images[0].local_path.clone().unwrap();
        assert_eq!(fs::read(&saved).unwrap(), b"JPEGDATA");
        assert_eq!(rec.images[1].local_path, None);

        // A second pass finds the file on disk and does not refetch it.
        let again = downloader.download_record(&mut rec);
        assert_eq!(again.already_present, 1);
        assert_eq!(again.downloaded, 0);
    }
}
