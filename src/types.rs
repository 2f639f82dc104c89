use std::collections::HashSet;

use async_trait::async_trait;

use crate::classify::classify;
use crate::error::{DeliveryOutcome, NotifyError};

/// One configured delivery target.
///
/// The classification is computed once, when the destination list is
/// reloaded, and cached here for every later dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Deliverable with a single POST to `url`.
    DirectWebhook {
        raw: String,
        url: String,
    },

    /// Handed to the generic broker as-is.
    Generic {
        raw: String,
    },
}

impl Destination {
    pub fn classify(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        match classify(&raw) {
            Some(url) => Destination::DirectWebhook { raw, url },
            None => Destination::Generic { raw },
        }
    }

    /// The URL exactly as configured.
    pub fn raw(&self) -> &str {
        match self {
            Destination::DirectWebhook { raw, .. } | Destination::Generic { raw } => raw,
        }
    }

    /// Canonical webhook URL, for direct destinations only.
    pub fn webhook_url(&self) -> Option<&str> {
        match self {
            Destination::DirectWebhook { url, .. } => Some(url),
            Destination::Generic { .. } => None,
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, Destination::DirectWebhook { .. })
    }
}

/// Destination settings as the host application stores them: either one
/// delimited string or a list of entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawDestinations {
    Delimited(String),
    List(Vec<String>),
}

impl RawDestinations {
    /// Split on commas and whitespace, drop empty entries and repeats,
    /// keeping the first occurrence of each URL in its original position.
    pub fn normalize(&self) -> Vec<String> {
        let entries: Vec<&str> = match self {
            RawDestinations::Delimited(value) => vec![value.as_str()],
            RawDestinations::List(values) => values.iter().map(String::as_str).collect(),
        };

        let mut seen = HashSet::new();
        entries
            .into_iter()
            .flat_map(|entry| entry.split(|c: char| c == ',' || c.is_whitespace()))
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .filter(|url| seen.insert(url.to_string()))
            .map(str::to_string)
            .collect()
    }
}

impl From<&str> for RawDestinations {
    fn from(value: &str) -> Self {
        RawDestinations::Delimited(value.to_string())
    }
}

impl From<String> for RawDestinations {
    fn from(value: String) -> Self {
        RawDestinations::Delimited(value)
    }
}

impl From<Vec<String>> for RawDestinations {
    fn from(values: Vec<String>) -> Self {
        RawDestinations::List(values)
    }
}

impl From<Vec<&str>> for RawDestinations {
    fn from(values: Vec<&str>) -> Self {
        RawDestinations::List(values.into_iter().map(str::to_string).collect())
    }
}

impl From<&[String]> for RawDestinations {
    fn from(values: &[String]) -> Self {
        RawDestinations::List(values.to_vec())
    }
}

impl From<&[&str]> for RawDestinations {
    fn from(values: &[&str]) -> Self {
        RawDestinations::List(values.iter().map(|v| v.to_string()).collect())
    }
}

/// Immutable snapshot of the configured destinations, partitioned by route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchConfiguration {
    destinations: Vec<Destination>,
    direct: Vec<Destination>,
    generic: Vec<String>,
}

impl DispatchConfiguration {
    pub fn from_raw(raw: &RawDestinations) -> Self {
        let destinations: Vec<Destination> =
            raw.normalize().into_iter().map(Destination::classify).collect();

        let direct = destinations.iter().filter(|d| d.is_direct()).cloned().collect();
        let generic = destinations
            .iter()
            .filter(|d| !d.is_direct())
            .map(|d| d.raw().to_string())
            .collect();

        Self { destinations, direct, generic }
    }

    /// All destinations in configured order.
    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    pub fn direct(&self) -> &[Destination] {
        &self.direct
    }

    /// Raw URLs of the broker-handled destinations.
    pub fn generic(&self) -> &[String] {
        &self.generic
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }
}

/// Supplies the shared HTTP client for direct webhook posts.
///
/// The dispatcher asks for a client on every post and never owns its
/// lifecycle; the host application decides how it is pooled.
#[async_trait]
pub trait ClientProvider: Send + Sync {
    async fn client(&self) -> Result<reqwest::Client, NotifyError>;
}

#[async_trait]
impl ClientProvider for reqwest::Client {
    async fn client(&self) -> Result<reqwest::Client, NotifyError> {
        Ok(self.clone())
    }
}

/// Result of one direct webhook post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectDelivery {
    pub destination: String,
    pub outcome: DeliveryOutcome,
}

/// Result of the single broker call of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerDelivery {
    pub destinations: Vec<String>,
    pub outcome: DeliveryOutcome,
}

/// What a background dispatch did. Failures are recorded here and logged,
/// never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub event: &'static str,
    pub direct: Vec<DirectDelivery>,
    pub broker: Option<BrokerDelivery>,
}

impl DispatchReport {
    pub fn new(event: &'static str) -> Self {
        Self { event, direct: Vec::new(), broker: None }
    }

    pub fn failures(&self) -> usize {
        let direct = self.direct.iter().filter(|d| !d.outcome.is_delivered()).count();
        let broker = self
            .broker
            .as_ref()
            .map_or(0, |b| usize::from(!b.outcome.is_delivered()));
        direct + broker
    }
}
