// ABOUTME: Resource fetching for atlas pages and images over blocking HTTP.
// ABOUTME: Handles status checks, content-length limits, timeouts and charset decoding.

use std::collections::HashMap;

use bytes::Bytes;

use crate::error::ScrapeError;

/// Maximum allowed content length (20 MB; clinical photographs can be large).
pub const MAX_CONTENT_LENGTH: usize = 20 * 1024 * 1024;

/// Options for fetching a resource.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub headers: HashMap<String, String>,
}

/// Result of a successful fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: u16,
    pub url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl FetchResult {
    /// Decode the body as text, using charset hints from the content-type header.
    pub fn text(&self) -> String {
        decode_body(&self.body, self.content_type.as_deref())
    }
}

/// Source of raw page markup.
///
/// The pipeline only needs "URL in, markup or failure out"; tests swap in
/// canned pages through this seam.
pub trait PageSource {
    fn fetch_page(&self, url: &str) -> Result<String, ScrapeError>;
}

/// [`PageSource`] backed by a blocking reqwest client.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::blocking::Client,
    opts: FetchOptions,
}

impl HttpSource {
    pub fn new(client: reqwest::blocking::Client, opts: FetchOptions) -> Self {
        Self { client, opts }
    }

    pub fn client(&self) -> &reqwest::blocking::Client {
        &self.client
    }

    pub fn fetch(&self, url: &str) -> Result<FetchResult, ScrapeError> {
        fetch(&self.client, url, &self.opts)
    }
}

impl PageSource for HttpSource {
    fn fetch_page(&self, url: &str) -> Result<String, ScrapeError> {
        Ok(self.fetch(url)?.text())
    }
}

/// Decode body bytes to a String using charset from content-type header or detection.
fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    if let Some(ct) = content_type {
        if let Some(charset) = extract_charset(ct) {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
                let (decoded, _, _) = encoding.decode(body);
                return decoded.into_owned();
            }
        }
    }

    // Older atlas pages are served without a charset.
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

/// Extract charset value from Content-Type header.
fn extract_charset(content_type: &str) -> Option<String> {
    let lower = content_type.to_lowercase();
    for part in lower.split(';') {
        let trimmed = part.trim();
        if let Some(charset) = trimmed.strip_prefix("charset=") {
            let charset = charset.trim_matches('"').trim_matches('\'');
            return Some(charset.to_string());
        }
    }
    None
}

fn request_error(url: &str, e: reqwest::Error) -> ScrapeError {
    if e.is_timeout() {
        ScrapeError::timeout(url, "Fetch", Some(anyhow::anyhow!("request timed out: {}", e)))
    } else {
        ScrapeError::network(url, "Fetch", Some(anyhow::anyhow!("request failed: {}", e)))
    }
}

/// Fetch a resource from the given URL.
///
/// Any non-2xx status is a network error carrying the status code.
pub fn fetch(
    client: &reqwest::blocking::Client,
    url: &str,
    opts: &FetchOptions,
) -> Result<FetchResult, ScrapeError> {
    if url.is_empty() {
        return Err(ScrapeError::invalid_url(url, "Fetch", None));
    }

    let parsed_url = url::Url::parse(url).map_err(|e| {
        ScrapeError::invalid_url(url, "Fetch", Some(anyhow::anyhow!("invalid URL: {}", e)))
    })?;

    let scheme = parsed_url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(ScrapeError::invalid_url(
            url,
            "Fetch",
            Some(anyhow::anyhow!("scheme must be http or https")),
        ));
    }

    let mut request = client.get(parsed_url);
    for (key, value) in &opts.headers {
        request = request.header(key, value);
    }

    let response = request.send().map_err(|e| request_error(url, e))?;

    if let Some(len) = response.content_length() {
        if len as usize > MAX_CONTENT_LENGTH {
            return Err(ScrapeError::network(
                url,
                "Fetch",
                Some(anyhow::anyhow!("content too large")),
            ));
        }
    }

    let status = response.status();
    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_lowercase());

    if !status.is_success() {
        return Err(ScrapeError::network(
            url,
            "Fetch",
            Some(anyhow::anyhow!("HTTP status {}", status.as_u16())),
        ));
    }

    let body = response.bytes().map_err(|e| request_error(url, e))?;

    if body.len() > MAX_CONTENT_LENGTH {
        return Err(ScrapeError::network(
            url,
            "Fetch",
            Some(anyhow::anyhow!("content too large")),
        ));
    }

    Ok(FetchResult {
        status: status.as_u16(),
        url: url.to_string(),
        final_url,
        content_type,
        body,
    })
}
