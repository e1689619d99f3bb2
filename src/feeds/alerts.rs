use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, instrument, warn};
use xmltree::Element;

use crate::fetch_error::FetchError;
use crate::feeds::{
    child_text, children, expand_url, find_descendant, find_descendants, get_text, parse_xml,
    Feed, FeedClient,
};
use crate::models::RawAlert;

pub const DEFAULT_ALERTS_URL: &str = "https://api.vedur.is/cap/v1/capbroker/active/feed/met";

/// Upper bound on CAP documents followed from one feed poll
pub const MAX_CAP_DOCUMENTS: usize = 10;

const CAP_DOCUMENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the CAP alert broker: an Atom/RSS index of CAP 1.2 documents.
#[derive(Clone)]
pub struct AlertFeedClient {
    client: reqwest::Client,
    url_template: String,
}

impl AlertFeedClient {
    pub fn new(url_template: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url_template,
        }
    }

    /// Extracts CAP document links from the index feed
    pub fn parse_feed_links(&self, xml: &str) -> Result<Vec<String>, FetchError> {
        let root = parse_xml(xml)?;

        let mut entries = find_descendants(&root, "entry");
        if entries.is_empty() {
            entries = find_descendants(&root, "item");
        }

        let links: Vec<String> = entries.into_iter().filter_map(entry_link).collect();
        debug!("Alert feed lists {} CAP documents", links.len());
        Ok(links)
    }

    /// Parses one CAP document into one raw entry per `<info>` block
    pub fn parse_cap(&self, xml: &str, source_url: Option<&str>) -> Result<Vec<RawAlert>, FetchError> {
        let root = parse_xml(xml)?;
        let alert = find_descendant(&root, "alert")
            .ok_or_else(|| FetchError::MalformedPayload("no <alert> element".to_string()))?;

        let identifier = child_text(alert, "identifier");
        let sent = child_text(alert, "sent");

        let entries = children(alert, "info")
            .map(|info| {
                let area = info.get_child("area").and_then(|a| child_text(a, "areaDesc"));
                RawAlert {
                    identifier: identifier.clone(),
                    language: child_text(info, "language"),
                    severity: child_text(info, "severity"),
                    event: child_text(info, "event"),
                    headline: child_text(info, "headline"),
                    description: child_text(info, "description"),
                    effective_from: child_text(info, "onset")
                        .or_else(|| child_text(info, "effective"))
                        .or_else(|| sent.clone()),
                    effective_until: child_text(info, "expires"),
                    issued_at: sent.clone(),
                    area,
                    link: source_url.map(str::to_string),
                }
            })
            .collect();

        Ok(entries)
    }

    #[instrument(skip(self))]
    async fn fetch_cap_document(&self, url: &str) -> Result<Vec<RawAlert>, FetchError> {
        let xml = match tokio::time::timeout(CAP_DOCUMENT_TIMEOUT, get_text(&self.client, url)).await {
            Ok(result) => result?,
            Err(_) => return Err(FetchError::Timeout(CAP_DOCUMENT_TIMEOUT)),
        };
        self.parse_cap(&xml, Some(url))
    }
}

/// Prefers an explicit XML link, then any href, then an RSS text link
fn entry_link(entry: &Element) -> Option<String> {
    let mut fallback = None;

    for link in children(entry, "link") {
        let Some(href) = link.attributes.get("href").filter(|h| !h.is_empty()) else {
            continue;
        };
        let is_xml = link
            .attributes
            .get("type")
            .map(|t| t.contains("xml"))
            .unwrap_or(false);
        if is_xml || href.ends_with("/xml/") {
            return Some(href.clone());
        }
        if fallback.is_none() {
            fallback = Some(href.clone());
        }
    }

    fallback.or_else(|| child_text(entry, "link"))
}

#[async_trait]
impl FeedClient for AlertFeedClient {
    type Payload = Vec<RawAlert>;

    fn feed(&self) -> Feed {
        Feed::Alerts
    }

    #[instrument(skip(self), fields(feed = "alerts"))]
    async fn fetch(&self, region: &str) -> Result<Vec<RawAlert>, FetchError> {
        let url = expand_url(&self.url_template, "region", region);
        debug!("Requesting alert index from {}", url);
        let index = get_text(&self.client, &url).await?;

        let mut links = self.parse_feed_links(&index)?;
        if links.len() > MAX_CAP_DOCUMENTS {
            warn!(
                "Alert feed lists {} documents, following the first {}",
                links.len(),
                MAX_CAP_DOCUMENTS
            );
            links.truncate(MAX_CAP_DOCUMENTS);
        }

        let results = join_all(links.iter().map(|link| self.fetch_cap_document(link))).await;

        let mut alerts = Vec::new();
        let mut failed = 0;
        let mut first_error = None;
        for (link, result) in links.iter().zip(results) {
            match result {
                Ok(entries) => alerts.extend(entries),
                Err(e) => {
                    warn!("Skipping CAP document {}: {}", link, e);
                    failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        if failed > 0 {
            warn!("{} of {} CAP documents could not be retrieved", failed, links.len());
        }
        // Every document failing is a failed poll, not an empty alert list
        if failed == links.len() {
            if let Some(e) = first_error {
                return Err(e);
            }
        }
        debug!("Collected {} raw alert entries", alerts.len());
        Ok(alerts)
    }
}
