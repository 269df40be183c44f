// SPDX-License-Identifier: MIT

//! Cleanup of pasted credentials.
//!
//! Users paste API keys and company URLs in whatever form their browser or
//! password manager hands them: `API_KEY=...` lines, dashboard URLs with the
//! key in a query parameter, or a bare token wrapped in quotes. Both
//! normalizers are forgiving, never fail, and are idempotent on their own
//! output.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Vendor domain suffix used to recognize tenant URLs.
pub const BOOQABLE_DOMAIN_SUFFIX: &str = ".booqable.com";

static LABELED_KEY: LazyLock<Regex> = LazyLock::new(|| {
    // e.g. BOOQABLE_API_KEY=abc123 or "api key: abc123"
    Regex::new(r#"(?i)(?:api[_\s-]?key|token)\s*[=:]\s*["']?([A-Za-z0-9_-]{8,})"#).unwrap()
});

static QUERY_KEY: LazyLock<Regex> = LazyLock::new(|| {
    // e.g. https://acme.booqable.com/api/1/orders?api_key=abc123
    Regex::new(r"[?&](?:api_key|key|token)=([A-Za-z0-9_-]+)").unwrap()
});

static HEX_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9a-fA-F]{32,}").unwrap());

/// Extract a clean API key from a pasted string.
///
/// Resolution order: labeled assignment, URL query parameter, bare hex token
/// (32+ hex chars), then a minimal quote/whitespace strip. Never fails; a
/// no-match input passes through minimally cleaned.
pub fn normalize_api_key(raw: &str) -> String {
    let trimmed = raw.trim();

    if let Some(caps) = LABELED_KEY.captures(trimmed) {
        return caps[1].to_string();
    }
    if let Some(caps) = QUERY_KEY.captures(trimmed) {
        return caps[1].to_string();
    }
    if let Some(m) = HEX_TOKEN.find(trimmed) {
        return m.as_str().to_string();
    }

    trimmed.trim_matches(|c| c == '"' || c == '\'').to_string()
}

/// Extract a clean tenant slug from a pasted URL or raw string.
///
/// A parseable URL whose host ends in the vendor domain yields the subdomain
/// portion. Anything else is stripped of protocol, path, and query, cut at
/// the domain suffix, and has internal whitespace collapsed to hyphens. The
/// result only contains `[a-z0-9-]`.
pub fn normalize_slug(raw: &str) -> String {
    let trimmed = raw.trim().to_lowercase();
    if trimmed.is_empty() {
        return String::new();
    }

    // Full URL (scheme optional): pull the host portion before the suffix.
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.clone()
    } else {
        format!("https://{trimmed}")
    };
    if let Ok(url) = Url::parse(&with_scheme) {
        if let Some(host) = url.host_str() {
            if let Some(candidate) = host.strip_suffix(BOOQABLE_DOMAIN_SUFFIX) {
                if !candidate.is_empty() {
                    return clean_slug_chars(candidate);
                }
            }
        }
    }

    // Fallback: manual stripping for inputs Url::parse rejects.
    let without_proto = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(&trimmed);
    let before_path = without_proto
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let before_domain = before_path
        .split(BOOQABLE_DOMAIN_SUFFIX)
        .next()
        .unwrap_or(before_path);

    clean_slug_chars(before_domain)
}

fn clean_slug_chars(value: &str) -> String {
    let hyphenated: String = value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    hyphenated
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_from_labeled_assignment() {
        assert_eq!(
            normalize_api_key("BOOQABLE_API_KEY=6f9a02cd11aa"),
            "6f9a02cd11aa"
        );
        assert_eq!(
            normalize_api_key("api key: \"abc123def456\""),
            "abc123def456"
        );
    }

    #[test]
    fn key_from_url_query_param() {
        assert_eq!(
            normalize_api_key("https://acme.booqable.com/api/1/orders?api_key=deadbeef01&per=1"),
            "deadbeef01"
        );
    }

    #[test]
    fn key_from_bare_hex_token() {
        let key = "0123456789abcdef0123456789abcdef";
        assert_eq!(normalize_api_key(&format!("your key is {key} ok")), key);
    }

    #[test]
    fn key_fallback_strips_quotes() {
        assert_eq!(normalize_api_key("  \"short\"  "), "short");
        assert_eq!(normalize_api_key("plain"), "plain");
    }

    #[test]
    fn key_normalization_is_idempotent() {
        for raw in [
            "BOOQABLE_API_KEY=6f9a02cd11aa",
            "https://x.booqable.com?api_key=deadbeef01",
            "0123456789abcdef0123456789abcdef",
            "'quoted'",
            "",
        ] {
            let once = normalize_api_key(raw);
            assert_eq!(normalize_api_key(&once), once, "input: {raw:?}");
        }
    }

    #[test]
    fn slug_from_full_url() {
        assert_eq!(normalize_slug("https://acme-rentals.booqable.com/orders"), "acme-rentals");
        assert_eq!(normalize_slug("acme.booqable.com"), "acme");
    }

    #[test]
    fn slug_from_raw_string() {
        assert_eq!(normalize_slug("  Acme Rentals "), "acme-rentals");
        assert_eq!(normalize_slug("acme"), "acme");
    }

    #[test]
    fn slug_strips_path_and_query() {
        assert_eq!(normalize_slug("http://acme.booqable.com/admin?tab=1"), "acme");
    }

    #[test]
    fn slug_normalization_is_idempotent() {
        for raw in [
            "https://acme.booqable.com",
            "Acme Rentals",
            "acme",
            "weird_&^chars",
            "",
        ] {
            let once = normalize_slug(raw);
            assert_eq!(normalize_slug(&once), once, "input: {raw:?}");
        }
    }
}
