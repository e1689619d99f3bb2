//! Feed clients for the three upstream sources.
//!
//! Every client implements [`FeedClient`]: one fetch, no caching, no retry.
//! The time budget is applied by [`fetch_within`] so a slow feed surfaces as
//! [`FetchError::Timeout`] instead of stalling the cycle.

pub mod alerts;
pub mod forecast;
pub mod observation;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use xmltree::{Element, XMLNode};

use crate::fetch_error::FetchError;

pub use alerts::AlertFeedClient;
pub use forecast::ForecastClient;
pub use observation::ObservationClient;

/// Which feed a client serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Forecast,
    Observation,
    Alerts,
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Feed::Forecast => "forecast",
            Feed::Observation => "observation",
            Feed::Alerts => "alerts",
        };
        f.write_str(name)
    }
}

#[async_trait]
pub trait FeedClient: Send + Sync {
    type Payload: Send;

    fn feed(&self) -> Feed;

    /// Fetch and parse the feed for a station or region key
    async fn fetch(&self, key: &str) -> Result<Self::Payload, FetchError>;
}

/// Runs one fetch bounded by `budget`
pub async fn fetch_within<C>(client: &C, key: &str, budget: Duration) -> Result<C::Payload, FetchError>
where
    C: FeedClient + ?Sized,
{
    match tokio::time::timeout(budget, client.fetch(key)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(budget)),
    }
}

/// Substitutes `{placeholder}` in a URL template
pub(crate) fn expand_url(template: &str, placeholder: &str, value: &str) -> String {
    template.replace(&format!("{{{}}}", placeholder), value)
}

pub(crate) async fn get_text(client: &reqwest::Client, url: &str) -> Result<String, FetchError> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.text().await?)
}

pub(crate) fn parse_xml(text: &str) -> Result<Element, FetchError> {
    Ok(Element::parse(text.as_bytes())?)
}

/// Depth-first search for the first element named `name`, root included
pub(crate) fn find_descendant<'a>(element: &'a Element, name: &str) -> Option<&'a Element> {
    if element.name == name {
        return Some(element);
    }
    element.children.iter().find_map(|node| match node {
        XMLNode::Element(child) => find_descendant(child, name),
        _ => None,
    })
}

/// All descendants named `name`, in document order
pub(crate) fn find_descendants<'a>(element: &'a Element, name: &str) -> Vec<&'a Element> {
    let mut found = Vec::new();
    collect_descendants(element, name, &mut found);
    found
}

fn collect_descendants<'a>(element: &'a Element, name: &str, found: &mut Vec<&'a Element>) {
    for node in &element.children {
        if let XMLNode::Element(child) = node {
            if child.name == name {
                found.push(child);
            }
            collect_descendants(child, name, found);
        }
    }
}

/// Direct children named `name`
pub(crate) fn children<'a>(element: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
    element.children.iter().filter_map(move |node| match node {
        XMLNode::Element(child) if child.name == name => Some(child),
        _ => None,
    })
}

/// Trimmed text of a direct child; empty text counts as absent
pub(crate) fn child_text(element: &Element, name: &str) -> Option<String> {
    let text = element.get_child(name)?.get_text()?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Numeric child value. Accepts a decimal comma; anything unparseable is absent.
pub(crate) fn child_f64(element: &Element, name: &str) -> Option<f64> {
    child_text(element, name)?.replace(',', ".").parse::<f64>().ok()
}

/// Parses the `YYYY-MM-DD HH:MM:SS` UTC timestamps used by the weather XML
pub(crate) fn parse_feed_time(value: &str) -> Result<DateTime<Utc>, FetchError> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%d %H:%M:%S")
        .map_err(|e| FetchError::MalformedPayload(format!("bad timestamp '{}': {}", value, e)))?;
    Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

/// Whether a `<station valid="...">` element reports usable data
pub(crate) fn station_is_valid(station: &Element) -> bool {
    station
        .attributes
        .get("valid")
        .map(|v| v.trim() != "0")
        .unwrap_or(true)
}
