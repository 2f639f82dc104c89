//! Destination classification.
//!
//! Decides whether a configured URL can be delivered with a single direct
//! webhook POST or has to go through the generic broker.

use reqwest::Url;

/// Hosts whose `/api/webhooks/` URLs accept direct webhook posts.
pub const DISCORD_WEBHOOK_HOSTS: &[&str] = &[
    "discord.com",
    "discordapp.com",
    "ptb.discord.com",
    "canary.discord.com",
];

const DISCORD_SCHEME: &str = "discord";
const WEBHOOK_PATH: &str = "/api/webhooks/";

/// Map a destination URL to its canonical direct-webhook URL.
///
/// Returns `None` for anything that is not a recognised webhook, which routes
/// the destination to the generic broker.
pub fn classify(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;

    match url.scheme() {
        "http" | "https" => canonical_http(&url),
        DISCORD_SCHEME => canonical_short(&url),
        _ => None,
    }
}

fn canonical_http(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    if !is_allowed_host(&host) || !url.path().contains(WEBHOOK_PATH) {
        return None;
    }

    let mut canonical = format!("{}://{}", url.scheme(), host);
    if let Some(port) = url.port() {
        canonical.push_str(&format!(":{}", port));
    }
    canonical.push_str(url.path());
    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        canonical.push('?');
        canonical.push_str(query);
    }
    Some(canonical)
}

// discord://[user@]{id}/{token}
fn canonical_short(url: &Url) -> Option<String> {
    let id = url.host_str().filter(|id| !id.is_empty())?;
    let token = url
        .path()
        .split('/')
        .find(|segment| !segment.is_empty())?;

    Some(format!("https://discord.com/api/webhooks/{}/{}", id, token))
}

fn is_allowed_host(host: &str) -> bool {
    DISCORD_WEBHOOK_HOSTS.iter().any(|allowed| {
        host == *allowed
            || host
                .strip_suffix(allowed)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}
