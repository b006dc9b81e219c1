// ABOUTME: Error types for the atlas scraper including ErrorCode enum and ScrapeError struct.
// ABOUTME: Provides categorized errors with convenience constructors and boolean helpers.

use std::fmt;

/// Error codes representing the ways a page or image can fail to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidUrl,
    Network,
    Timeout,
    ExtractionEmpty,
    ImageDownload,
    Io,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::InvalidUrl => "invalid URL",
            ErrorCode::Network => "network error",
            ErrorCode::Timeout => "timeout",
            ErrorCode::ExtractionEmpty => "nothing extracted",
            ErrorCode::ImageDownload => "image download error",
            ErrorCode::Io => "i/o error",
        };
        write!(f, "{}", s)
    }
}

/// The error type for fetch, extraction and download operations.
///
/// None of these are fatal to a batch run; the pipeline logs them, counts
/// them by code and moves on.
#[derive(Debug, thiserror::Error)]
pub struct ScrapeError {
    pub code: ErrorCode,
    pub url: String,
    pub op: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "eyeatlas: {} {}: {}", self.op, self.url, self.code)?;
        if let Some(ref src) = self.source {
            write!(f, ": {}", src)?;
        }
        Ok(())
    }
}

impl ScrapeError {
    fn new(
        code: ErrorCode,
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code,
            url: url.into(),
            op: op.into(),
            source,
        }
    }

    /// Create an InvalidUrl error.
    pub fn invalid_url(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::InvalidUrl, url, op, source)
    }

    /// Create a Network error (connection failure or non-2xx status).
    pub fn network(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::Network, url, op, source)
    }

    /// Create a Timeout error.
    pub fn timeout(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::Timeout, url, op, source)
    }

    /// Create an ExtractionEmpty error: every strategy came up with nothing usable.
    pub fn extraction_empty(url: impl Into<String>, op: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExtractionEmpty, url, op, None)
    }

    /// Create an ImageDownload error.
    pub fn image_download(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::ImageDownload, url, op, source)
    }

    /// Create an Io error.
    pub fn io(url: impl Into<String>, op: impl Into<String>, source: std::io::Error) -> Self {
        Self::new(ErrorCode::Io, url, op, Some(anyhow::Error::new(source)))
    }

    /// Network and timeout failures both count as the page being unreachable.
    pub fn is_network(&self) -> bool {
        matches!(self.code, ErrorCode::Network | ErrorCode::Timeout)
    }

    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::Timeout
    }

    pub fn is_invalid_url(&self) -> bool {
        self.code == ErrorCode::InvalidUrl
    }

    pub fn is_extraction_empty(&self) -> bool {
        self.code == ErrorCode::ExtractionEmpty
    }

    pub fn is_image_download(&self) -> bool {
        self.code == ErrorCode::ImageDownload
    }
}
