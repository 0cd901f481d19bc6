/// URL and site-matching helpers for the background worker
use url::Url;

/// Host of the point-of-sale web application
pub const POS_HOST: &str = "pos.paymore.tech";

/// Whether content scripts can run in a tab showing `url`
///
/// Only http(s), file and ftp pages accept injected scripts; browser-internal
/// pages (chrome://, about:, the web store, extension pages) never do.
pub fn is_injectable(url: &str) -> bool {
    match Url::parse(url.trim()) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https" | "file" | "ftp"),
        Err(_) => false,
    }
}

/// Whether a tab URL belongs to the point-of-sale app
pub fn is_pos_url(url: &str) -> bool {
    url.contains(POS_HOST)
}

/// Normalize a user-entered site into a bare lowercase hostname
///
/// Examples:
/// - `https://www.ebay.com/sch/` → `www.ebay.com`
/// - `Example.COM:8080` → `example.com`
/// - `  shop.test  ` → `shop.test`
pub fn normalize_site(entry: &str) -> Option<String> {
    let trimmed = entry.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Remove protocol if present
    let without_scheme = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed);

    let host_with_port = without_scheme.split('/').next()?;
    let host = host_with_port.split(':').next()?.to_lowercase();

    if host.is_empty() { None } else { Some(host) }
}

/// A domain is covered by a site entry when it equals it or is a subdomain of it
pub fn site_matches(domain: &str, site: &str) -> bool {
    domain == site || domain.ends_with(&format!(".{}", site))
}

/// Whether the toolset is disabled on `domain`
pub fn is_site_disabled(domain: &str, disabled_sites: &[String], global_enabled: bool) -> bool {
    !global_enabled || disabled_sites.iter().any(|site| site_matches(domain, site))
}
