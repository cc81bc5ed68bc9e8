//! HTTP lookups with SSRF protection and resource limits.

use std::net::IpAddr;
use std::time::Duration;

use feed_rs::parser;
use reqwest::Client;
use tracing::debug;
use url::{Host, Url};

use super::{FeedEntry, LinkLookup};
use crate::config::LinksConfig;
use crate::error::{BotError, Result};

/// User agent string for lookups.
const USER_AGENT: &str = concat!("lineupbot/", env!("CARGO_PKG_VERSION"));

/// Longest title announced, in characters.
const MAX_TITLE_CHARS: usize = 300;

/// Lookup backed by reqwest.
pub struct HttpLinkLookup {
    client: Client,
    titles_enabled: bool,
    max_body_bytes: u64,
    feed_url: Option<Url>,
}

impl HttpLinkLookup {
    /// Build the HTTP client from configuration.
    pub fn new(config: &LinksConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.total_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BotError::Lookup(format!("failed to create HTTP client: {e}")))?;

        let feed_url = if config.feed_url.is_empty() {
            None
        } else {
            Some(
                Url::parse(&config.feed_url)
                    .map_err(|e| BotError::Config(format!("invalid feed URL: {e}")))?,
            )
        };

        Ok(Self {
            client,
            titles_enabled: config.enabled,
            max_body_bytes: config.max_body_bytes,
            feed_url,
        })
    }

    async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        validate_url(url)?;
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| BotError::Lookup(format!("failed to fetch {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(BotError::Lookup(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_body_bytes {
                return Err(BotError::Lookup(format!(
                    "response too large: {} bytes (max {} bytes)",
                    content_length, self.max_body_bytes
                )));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BotError::Lookup(format!("failed to read response: {e}")))?;

        if bytes.len() as u64 > self.max_body_bytes {
            return Err(BotError::Lookup(format!(
                "response too large: {} bytes (max {} bytes)",
                bytes.len(),
                self.max_body_bytes
            )));
        }

        Ok(bytes.to_vec())
    }
}

impl LinkLookup for HttpLinkLookup {
    async fn title(&self, url: &Url) -> Result<Option<String>> {
        if !self.titles_enabled {
            return Ok(None);
        }
        let body = self.fetch(url).await?;
        let (html, _, _) = encoding_rs::UTF_8.decode(&body);
        Ok(extract_title(&html))
    }

    async fn latest_entries(&self) -> Result<Vec<FeedEntry>> {
        let Some(feed_url) = &self.feed_url else {
            return Ok(Vec::new());
        };
        let body = self.fetch(feed_url).await?;
        parse_feed(&body)
    }
}

/// Validate a URL for SSRF protection.
///
/// Only http and https are allowed, and the host must not be a private,
/// loopback or reserved name or address.
pub fn validate_url(url: &Url) -> Result<()> {
    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(BotError::Lookup(format!(
                "unsupported URL scheme: {scheme}"
            )));
        }
    }

    let host = url
        .host()
        .ok_or_else(|| BotError::Lookup("URL has no host".to_string()))?;

    let ip = match host {
        Host::Domain(domain) => {
            if is_forbidden_hostname(domain) {
                return Err(BotError::Lookup(format!("forbidden host: {domain}")));
            }
            return Ok(());
        }
        Host::Ipv4(ipv4) => IpAddr::V4(ipv4),
        Host::Ipv6(ipv6) => IpAddr::V6(ipv6),
    };
    if is_private_ip(&ip) {
        return Err(BotError::Lookup(format!(
            "private IP address not allowed: {ip}"
        )));
    }
    Ok(())
}

fn is_forbidden_hostname(host: &str) -> bool {
    let host = host.to_lowercase();
    if host == "localhost" {
        return true;
    }
    [
        ".local",
        ".localhost",
        ".internal",
        ".intranet",
        ".corp",
        ".home",
        ".lan",
    ]
    .iter()
    .any(|suffix| host.ends_with(suffix))
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();
            ipv4.is_loopback()
                || ipv4.is_private()
                || ipv4.is_link_local()
                || ipv4.is_broadcast()
                || ipv4.is_unspecified()
                || ipv4.is_documentation()
                // Carrier-grade NAT: 100.64.0.0/10
                || (octets[0] == 100 && (64..=127).contains(&octets[1]))
        }
        IpAddr::V6(ipv6) => {
            let first = ipv6.segments()[0];
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                // Unique local: fc00::/7
                || (first & 0xfe00) == 0xfc00
                // Link-local: fe80::/10
                || (first & 0xffc0) == 0xfe80
                || ipv6
                    .to_ipv4_mapped()
                    .is_some_and(|v4| is_private_ip(&IpAddr::V4(v4)))
        }
    }
}

/// Extract and clean the `<title>` of an HTML document.
///
/// Entities are decoded and whitespace is collapsed. An empty title counts
/// as no title.
pub fn extract_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let content_start = open + lower[open..].find('>')? + 1;
    let content_end = content_start + lower[content_start..].find("</title")?;

    let title = decode_entities(&html[content_start..content_end]);
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() {
        return None;
    }
    Some(title.chars().take(MAX_TITLE_CHARS).collect())
}

/// Decode HTML character references.
fn decode_entities(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        result.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let decoded = after
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&after[..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                result.push(c);
                rest = &after[end + 1..];
            }
            None => {
                result.push('&');
                rest = after;
            }
        }
    }
    result.push_str(rest);
    result
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        "ndash" => Some('\u{2013}'),
        "mdash" => Some('\u{2014}'),
        "hellip" => Some('\u{2026}'),
        _ => {
            let code = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

/// Strip tags from an HTML fragment and collapse whitespace.
fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    decode_entities(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse feed bytes into entries, newest first. Undated entries sort last.
fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedEntry>> {
    let feed =
        parser::parse(bytes).map_err(|e| BotError::Lookup(format!("failed to parse feed: {e}")))?;

    let mut entries: Vec<FeedEntry> = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let text = entry
                .title
                .map(|t| strip_html(&t.content))
                .filter(|t| !t.is_empty())
                .or_else(|| entry.summary.map(|s| strip_html(&s.content)))
                .filter(|t| !t.is_empty())?;
            Some(FeedEntry {
                published: entry.published.or(entry.updated),
                text,
                link: entry.links.first().map(|l| l.href.clone()),
            })
        })
        .collect();

    entries.sort_by(|a, b| b.published.cmp(&a.published));
    Ok(entries)
}
