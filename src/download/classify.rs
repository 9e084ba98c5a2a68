//! URL policy: scheme check, host allow-list, share-link rewrite and
//! route selection.
//!
//! Pure string/URL work; nothing here touches the network.

use reqwest::Url;
use std::collections::HashSet;

/// Which fetch strategy serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Streaming GET by our own HTTP client.
    Direct,
    /// Delegation to the external media extractor.
    Extractor,
}

/// Outcome of classifying one raw URL.
///
/// Derived once per request and read-only afterwards.
#[derive(Debug, Clone)]
pub struct FetchPlan {
    pub route: Route,
    /// Possibly rewritten from a share-link form.
    pub target_url: String,
    pub allowed: bool,
}

/// Host policy injected from configuration.
///
/// The allow-list gates the direct route only; media hosts select the
/// extractor route and bypass the allow-list entirely, so a site can be
/// served by the extractor without also opening it to raw GETs.
#[derive(Debug, Clone)]
pub struct HostPolicy {
    allowed_hosts: HashSet<String>,
    media_hosts: Vec<String>,
}

impl HostPolicy {
    #[must_use]
    pub fn new(allowed_hosts: HashSet<String>, media_hosts: Vec<String>) -> Self {
        Self {
            allowed_hosts,
            media_hosts,
        }
    }

    /// Dot-suffix match: `host` equals an entry or is a subdomain of one.
    /// Expects `host` lowercased with any leading `www.` already stripped.
    fn host_allowed(&self, host: &str) -> bool {
        self.allowed_hosts.iter().any(|entry| {
            host == entry
                || host
                    .strip_suffix(entry.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    /// Substring match selecting the extractor route.
    fn is_media_host(&self, host: &str) -> bool {
        self.media_hosts.iter().any(|entry| host.contains(entry.as_str()))
    }
}

/// Hosts whose share links are rewritten to the direct-download form.
const DRIVE_HOSTS: [&str; 2] = ["drive.google.com", "docs.google.com"];

/// Classify a raw URL into a [`FetchPlan`]. Malformed input never
/// panics; it comes back as `allowed = false`.
#[must_use]
pub fn classify(raw_url: &str, policy: &HostPolicy) -> FetchPlan {
    if !has_http_scheme(raw_url) {
        return rejected(raw_url);
    }
    let Ok(url) = Url::parse(raw_url) else {
        return rejected(raw_url);
    };
    let Some(raw_host) = url.host_str() else {
        return rejected(raw_url);
    };

    let lowered = raw_host.to_ascii_lowercase();
    let host = lowered.strip_prefix("www.").unwrap_or(&lowered);

    let target_url = if is_drive_host(host) {
        drive_direct_link(&url)
    } else {
        raw_url.to_string()
    };

    // Route selection wins over the allow-list: a media host is fetched
    // via the extractor even when the allow-list also names it.
    if policy.is_media_host(host) {
        return FetchPlan {
            route: Route::Extractor,
            target_url,
            allowed: true,
        };
    }

    FetchPlan {
        route: Route::Direct,
        allowed: policy.host_allowed(host),
        target_url,
    }
}

fn rejected(raw_url: &str) -> FetchPlan {
    FetchPlan {
        route: Route::Direct,
        target_url: raw_url.to_string(),
        allowed: false,
    }
}

// Scheme matching is case-insensitive; pasted links sometimes arrive
// as `HTTP://...` and the URL parser accepts them anyway.
fn has_http_scheme(raw_url: &str) -> bool {
    let prefix = raw_url.get(..8).unwrap_or(raw_url).to_ascii_lowercase();
    prefix.starts_with("http://") || prefix.starts_with("https://")
}

fn is_drive_host(host: &str) -> bool {
    DRIVE_HOSTS.iter().any(|entry| {
        host == *entry
            || host
                .strip_suffix(entry)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// Rewrite a shareable drive link (`.../file/d/<ID>/...` or `?id=<ID>`)
/// to the direct-download form. Unrecognized shapes pass through.
fn drive_direct_link(url: &Url) -> String {
    let segments: Vec<&str> = url
        .path_segments()
        .map(|segs| segs.collect())
        .unwrap_or_default();

    if segments.contains(&"file") {
        if let Some(idx) = segments.iter().position(|seg| *seg == "d") {
            if let Some(file_id) = segments.get(idx + 1).filter(|seg| !seg.is_empty()) {
                return direct_download_url(file_id);
            }
        }
    }

    if let Some((_, file_id)) = url.query_pairs().find(|(key, _)| key == "id") {
        if !file_id.is_empty() {
            return direct_download_url(&file_id);
        }
    }

    url.as_str().to_string()
}

fn direct_download_url(file_id: &str) -> String {
    format!("https://drive.google.com/uc?export=download&id={file_id}")
}
