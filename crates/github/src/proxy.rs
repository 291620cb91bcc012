//! Per-host proxy selection for API calls.

use reqwest::Url;

/// A configured proxy and the hosts that bypass it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy URL, e.g. `http://proxy.internal:3128`.
    pub url: Option<String>,
    /// Hosts (exact or domain suffix, leading `.` optional) reached directly.
    pub no_proxy: Vec<String>,
}

impl ProxyConfig {
    pub fn new(url: Option<String>, no_proxy: Vec<String>) -> Self {
        Self {
            url: url.filter(|u| !u.trim().is_empty()),
            no_proxy: no_proxy
                .into_iter()
                .map(|h| h.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    /// Parses a comma-separated `NO_PROXY`-style list.
    pub fn parse_no_proxy(list: &str) -> Vec<String> {
        list.split(',').map(str::to_string).collect()
    }

    /// Returns the proxy to use for `api_url`, or `None` to connect directly.
    ///
    /// An unparsable `api_url` gets the proxy; the request itself will then
    /// report the malformed URL.
    pub fn proxy_for(&self, api_url: &str) -> Option<String> {
        let url = self.url.clone()?;
        let host = match Url::parse(api_url) {
            Ok(parsed) => parsed.host_str().map(str::to_ascii_lowercase),
            Err(_) => None,
        };
        let bypass = host.is_some_and(|host| {
            self.no_proxy.iter().any(|entry| {
                entry == "*" || host == *entry || host.ends_with(&format!(".{entry}"))
            })
        });
        if bypass {
            tracing::debug!(api_url, "Bypassing proxy");
            None
        } else {
            Some(url)
        }
    }
}
