// ABOUTME: Configuration for the atlas scraper: Options, the two-origin table and ClientBuilder.
// ABOUTME: ClientBuilder provides a fluent API for constructing Client instances with custom settings.

use std::collections::HashMap;
use std::time::Duration;

use url::Url;

use crate::client::Client;

/// Browser-like identification; the site turns away obvious bots.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// Current home of the atlas.
pub const PRIMARY_ORIGIN: &str = "https://eyerounds.org";

/// Historical host; older atlas pages and their images still live here.
pub const SECONDARY_ORIGIN: &str = "https://webeye.ophth.uiowa.edu";

/// The two origins atlas content is spread across.
///
/// Root-relative image paths resolve against whichever origin the page
/// itself was served from, defaulting to the primary one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origins {
    pub primary: Url,
    pub secondary: Url,
}

impl Origins {
    pub fn new(primary: Url, secondary: Url) -> Self {
        Self { primary, secondary }
    }

    /// Picks the origin a page belongs to.
    pub fn for_page(&self, page: &Url) -> &Url {
        if page.host_str().is_some() && page.host_str() == self.secondary.host_str() {
            &self.secondary
        } else {
            &self.primary
        }
    }
}

impl Default for Origins {
    fn default() -> Self {
        Self {
            primary: Url::parse(PRIMARY_ORIGIN).expect("PRIMARY_ORIGIN is a valid URL"),
            secondary: Url::parse(SECONDARY_ORIGIN).expect("SECONDARY_ORIGIN is a valid URL"),
        }
    }
}

/// Configuration options for the scraper client.
#[derive(Debug, Clone)]
pub struct Options {
    pub timeout: Duration,
    pub user_agent: String,
    pub headers: HashMap<String, String>,
    /// Pause between consecutive requests (pages and images alike).
    pub delay: Duration,
    pub origins: Origins,
    /// Skip pages the store already holds records from (page-level resume).
    pub skip_existing: bool,
    pub http_client: Option<reqwest::blocking::Client>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: HashMap::new(),
            delay: Duration::from_millis(500),
            origins: Origins::default(),
            skip_existing: false,
            http_client: None,
        }
    }
}

/// Builder for constructing Client instances with custom configuration.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    opts: Options,
}

impl ClientBuilder {
    /// Create a new ClientBuilder with default options.
    pub fn new() -> Self {
        Self {
            opts: Options::default(),
        }
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.opts.timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.opts.user_agent = user_agent.into();
        self
    }

    /// Add a custom header to all requests.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.headers.insert(key.into(), value.into());
        self
    }

    /// Set the pause between consecutive requests.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.opts.delay = delay;
        self
    }

    /// Replace the origin table used to resolve root-relative image paths.
    pub fn origins(mut self, origins: Origins) -> Self {
        self.opts.origins = origins;
        self
    }

    /// Do not refetch pages already present in the store.
    pub fn skip_existing(mut self, skip: bool) -> Self {
        self.opts.skip_existing = skip;
        self
    }

    /// Use a custom HTTP client.
    pub fn http_client(mut self, client: reqwest::blocking::Client) -> Self {
        self.opts.http_client = Some(client);
        self
    }

    /// Build the Client with the configured options.
    pub fn build(self) -> Client {
        Client::new(self.opts)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_for_secondary_host() {
        let origins = Origins::default();
        let page = Url::parse(
            "https://webeye.ophth.uiowa.edu/eyeforum/atlas/pages/apmppe/index.htm",
        )
        .unwrap();
        assert_eq!(origins.for_page(&page).as_str(), "https://webeye.ophth.uiowa.edu/");
    }

    #[test]
    fn test_origin_defaults_to_primary() {
        let origins = Origins::default();
        let page = Url::parse("https://example.com/atlas/pages/x.htm").unwrap();
        assert_eq!(origins.for_page(&page).as_str(), "https://eyerounds.org/");
    }

    #[test]
    fn test_builder_overrides() {
        let builder = ClientBuilder::new()
            .timeout(Duration::from_secs(3))
            .delay(Duration::ZERO)
            .header("Accept-Language", "en");
        assert_eq!(builder.opts.timeout, Duration::from_secs(3));
        assert_eq!(builder.opts.delay, Duration::ZERO);
        assert_eq!(builder.opts.headers.get("Accept-Language").map(String::as_str), Some("en"));
    }
}
