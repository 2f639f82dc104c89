//! Generic notification broker.
//!
//! Destinations that are not direct webhooks are handed to a [`Broker`] in a
//! single synchronous call. The dispatcher builds a fresh broker for every
//! dispatch through a [`BrokerFactory`] and runs it on the blocking pool.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Url;
use serde_json::json;

use crate::config::NotifierConfig;
use crate::error::BrokerError;

const NTFY_DEFAULT_HOST: &str = "ntfy.sh";

/// Hosts whose plain `http(s)://` URLs are ntfy topics rather than webhooks.
pub const NTFY_HOSTS: &[&str] = &[NTFY_DEFAULT_HOST];

/// Synchronous fan-out of a plain title/body notification.
pub trait Broker: Send {
    fn notify(&self, title: &str, body: &str) -> Result<(), BrokerError>;
}

/// Builds a throwaway broker covering exactly the given destinations.
pub trait BrokerFactory: Send + Sync {
    fn build(&self, destinations: &[String]) -> Box<dyn Broker>;
}

/// Default factory producing [`FanoutBroker`]s.
#[derive(Debug, Clone)]
pub struct FanoutBrokerFactory {
    timeout: Duration,
    user_agent: String,
}

impl FanoutBrokerFactory {
    pub fn new(config: &NotifierConfig) -> Self {
        Self {
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
        }
    }
}

impl BrokerFactory for FanoutBrokerFactory {
    fn build(&self, destinations: &[String]) -> Box<dyn Broker> {
        Box::new(FanoutBroker {
            destinations: destinations.to_vec(),
            timeout: self.timeout,
            user_agent: self.user_agent.clone(),
        })
    }
}

/// Delivers to `json(s)://`, `ntfy(s)://` and plain `http(s)://` targets.
///
/// Every destination is attempted; the call fails if any of them failed.
#[derive(Debug, Clone)]
pub struct FanoutBroker {
    destinations: Vec<String>,
    timeout: Duration,
    user_agent: String,
}

impl FanoutBroker {
    pub fn destinations(&self) -> &[String] {
        &self.destinations
    }
}

impl Broker for FanoutBroker {
    fn notify(&self, title: &str, body: &str) -> Result<(), BrokerError> {
        let client = Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()
            .map_err(|e| BrokerError::Delivery(vec![("*".to_string(), e.to_string())]))?;

        let mut failures = Vec::new();
        for destination in &self.destinations {
            let result = BrokerTarget::parse(destination)
                .map_err(|e| e.to_string())
                .and_then(|target| target.send(&client, title, body));

            match result {
                Ok(()) => tracing::debug!(
                    destination = %without_credentials(destination),
                    "broker notification sent"
                ),
                Err(reason) => failures.push((without_credentials(destination), reason)),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BrokerError::Delivery(failures))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerTarget {
    /// JSON document in the `{version, title, message, type}` shape.
    Json {
        url: Url,
        auth: Option<(String, Option<String>)>,
    },
    /// ntfy topic publish: body is the message, title goes in a header.
    Ntfy {
        url: Url,
        auth: Option<(String, Option<String>)>,
    },
    /// Any other http(s) endpoint, sent `{title, message}`.
    Webhook {
        url: Url,
    },
}

impl BrokerTarget {
    pub fn parse(raw: &str) -> Result<Self, BrokerError> {
        let invalid = |reason: String| BrokerError::InvalidDestination {
            destination: without_credentials(raw),
            reason,
        };
        let parsed = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;

        match parsed.scheme() {
            "http" | "https" if is_ntfy_host(&parsed) => {
                let host = authority(&parsed).ok_or_else(|| invalid("missing host".into()))?;
                let topic = parsed
                    .path()
                    .split('/')
                    .find(|s| !s.is_empty())
                    .ok_or_else(|| invalid("missing topic".into()))?;
                let target = format!("{}://{}/{}", parsed.scheme(), host, topic);
                let url = Url::parse(&target).map_err(|e| invalid(e.to_string()))?;
                Ok(BrokerTarget::Ntfy { url, auth: credentials(&parsed) })
            }
            "http" | "https" => Ok(BrokerTarget::Webhook { url: parsed }),
            "json" | "jsons" => {
                let scheme = if parsed.scheme() == "jsons" { "https" } else { "http" };
                let host = authority(&parsed).ok_or_else(|| invalid("missing host".into()))?;
                let mut target = format!("{}://{}{}", scheme, host, parsed.path());
                if let Some(query) = parsed.query() {
                    target.push('?');
                    target.push_str(query);
                }
                let url = Url::parse(&target).map_err(|e| invalid(e.to_string()))?;
                Ok(BrokerTarget::Json { url, auth: credentials(&parsed) })
            }
            "ntfy" | "ntfys" => {
                let host = authority(&parsed).ok_or_else(|| invalid("missing topic".into()))?;
                let topic = parsed.path().split('/').find(|s| !s.is_empty());
                let target = match topic {
                    // ntfy://{topic} publishes to the public instance
                    None => format!("https://{}/{}", NTFY_DEFAULT_HOST, host),
                    Some(topic) => {
                        let scheme = if parsed.scheme() == "ntfys" { "https" } else { "http" };
                        format!("{}://{}/{}", scheme, host, topic)
                    }
                };
                let url = Url::parse(&target).map_err(|e| invalid(e.to_string()))?;
                Ok(BrokerTarget::Ntfy { url, auth: credentials(&parsed) })
            }
            _ => Err(BrokerError::UnsupportedScheme {
                destination: without_credentials(raw),
            }),
        }
    }

    pub fn url(&self) -> &Url {
        match self {
            BrokerTarget::Json { url, .. }
            | BrokerTarget::Ntfy { url, .. }
            | BrokerTarget::Webhook { url } => url,
        }
    }

    fn send(&self, client: &Client, title: &str, body: &str) -> Result<(), String> {
        let request = match self {
            BrokerTarget::Json { url, auth } => with_auth(
                client.post(url.clone()).json(&json!({
                    "version": "1.0",
                    "title": title,
                    "message": body,
                    "type": "info",
                })),
                auth,
            ),
            BrokerTarget::Ntfy { url, auth } => with_auth(
                client
                    .post(url.clone())
                    .header("Title", title)
                    .body(body.to_string()),
                auth,
            ),
            BrokerTarget::Webhook { url } => client
                .post(url.clone())
                .json(&json!({ "title": title, "message": body })),
        };

        let response = request.send().map_err(|e| e.to_string())?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let details = response.text().unwrap_or_default();
            Err(format!("HTTP {}: {}", status.as_u16(), details))
        }
    }
}

fn is_ntfy_host(url: &Url) -> bool {
    let Some(host) = url.host_str() else { return false };
    NTFY_HOSTS.iter().any(|known| {
        host == *known
            || host
                .strip_suffix(known)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// Destination as it may appear in logs and errors: user info removed.
pub(crate) fn without_credentials(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw.trim()) else {
        // unparseable; drop anything that could be user info
        return match raw.rsplit_once('@') {
            Some((_, rest)) => format!("***@{}", rest),
            None => raw.to_string(),
        };
    };
    if url.username().is_empty() && url.password().is_none() {
        return raw.trim().to_string();
    }
    let _ = url.set_password(None);
    let _ = url.set_username("");
    url.to_string()
}

fn authority(url: &Url) -> Option<String> {
    let host = url.host_str().filter(|h| !h.is_empty())?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn credentials(url: &Url) -> Option<(String, Option<String>)> {
    if url.username().is_empty() {
        return None;
    }
    Some((url.username().to_string(), url.password().map(str::to_string)))
}

fn with_auth(
    request: reqwest::blocking::RequestBuilder,
    auth: &Option<(String, Option<String>)>,
) -> reqwest::blocking::RequestBuilder {
    match auth {
        Some((user, password)) => request.basic_auth(user, password.as_deref()),
        None => request,
    }
}
