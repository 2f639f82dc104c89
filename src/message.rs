use serde::{Deserialize, Serialize};

use crate::config::{NotifierConfig, DEFAULT_AVATAR_URL, DEFAULT_USERNAME};

pub const BRAND_COLOR: u32 = 0x9146FF;
pub const FOOTER_TEXT: &str = "TwitchDropsMiner";
pub const PLACEHOLDER_IMAGE: &str = "https://placehold.co/460x215.jpg?text=Cant+load+image";
pub const PLACEHOLDER_THUMBNAIL: &str = "https://placehold.co/80x80.jpg?text=No+image";

/// A claimed drop, as reported by the mining workflow.
///
/// Read-only input; the builder only borrows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropClaim {
    pub name: String,
    #[serde(default)]
    pub benefits: Vec<Benefit>,
    pub campaign: Campaign,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Benefit {
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub name: String,
    pub game_name: String,
    pub claimed_drops: u32,
    pub total_drops: u32,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Events the dispatcher knows how to announce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// Manually triggered from settings to check the destinations.
    Test,
    DropClaimed(DropClaim),
}

impl NotificationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::Test => "test",
            NotificationEvent::DropClaimed(_) => "drop_claimed",
        }
    }

    pub fn build_message(&self) -> RichMessage {
        match self {
            NotificationEvent::Test => RichMessage::test(),
            NotificationEvent::DropClaimed(drop) => RichMessage::drop_claimed(drop),
        }
    }
}

/// Rendered alert, built once per event and never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichMessage {
    title: String,
    body: String,
    color: u32,
    footer: String,
    image_url: Option<String>,
    thumbnail_url: Option<String>,
}

impl RichMessage {
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        color: u32,
        footer: impl Into<String>,
        image_url: Option<String>,
        thumbnail_url: Option<String>,
    ) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            color: color & 0xFF_FFFF,
            footer: footer.into(),
            image_url: image_url.filter(|u| !u.is_empty()),
            thumbnail_url: thumbnail_url.filter(|u| !u.is_empty()),
        }
    }

    pub fn test() -> Self {
        Self::new(
            "Test Notification",
            "This is a test notification from TwitchDropsMiner.",
            BRAND_COLOR,
            FOOTER_TEXT,
            Some(PLACEHOLDER_IMAGE.to_string()),
            Some(PLACEHOLDER_THUMBNAIL.to_string()),
        )
    }

    pub fn drop_claimed(drop: &DropClaim) -> Self {
        let campaign = &drop.campaign;
        let title = format!(
            "Claimed Drop: {} ({}/{})",
            campaign.game_name, campaign.claimed_drops, campaign.total_drops
        );
        let body = format!("Campaign: {}\nDrop: {}", campaign.name, drop.name);

        let image = drop
            .benefits
            .first()
            .and_then(|b| non_empty(b.image_url.as_deref()))
            .unwrap_or(PLACEHOLDER_IMAGE);
        let thumbnail = non_empty(campaign.image_url.as_deref()).unwrap_or(PLACEHOLDER_THUMBNAIL);

        Self::new(
            title,
            body,
            BRAND_COLOR,
            FOOTER_TEXT,
            Some(image.to_string()),
            Some(thumbnail.to_string()),
        )
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn color(&self) -> u32 {
        self.color
    }

    pub fn footer(&self) -> &str {
        &self.footer
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn thumbnail_url(&self) -> Option<&str> {
        self.thumbnail_url.as_deref()
    }

    /// Request body for a direct webhook post.
    pub fn webhook_payload<'a>(&'a self, identity: &'a WebhookIdentity) -> WebhookPayload<'a> {
        WebhookPayload {
            embeds: vec![Embed {
                title: &self.title,
                description: &self.body,
                color: self.color,
                footer: Footer { text: &self.footer },
                image: self.image_url.as_deref().map(|url| EmbedImage { url }),
                thumbnail: self.thumbnail_url.as_deref().map(|url| EmbedImage { url }),
            }],
            username: &identity.username,
            avatar_url: &identity.avatar_url,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Name and avatar the webhook posts appear under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookIdentity {
    pub username: String,
    pub avatar_url: String,
}

impl Default for WebhookIdentity {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.to_string(),
            avatar_url: DEFAULT_AVATAR_URL.to_string(),
        }
    }
}

impl From<&NotifierConfig> for WebhookIdentity {
    fn from(config: &NotifierConfig) -> Self {
        Self {
            username: config.username.clone(),
            avatar_url: config.avatar_url.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub embeds: Vec<Embed<'a>>,
    pub username: &'a str,
    pub avatar_url: &'a str,
}

#[derive(Debug, Serialize)]
pub struct Embed<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub color: u32,
    pub footer: Footer<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage<'a>>,
}

#[derive(Debug, Serialize)]
pub struct Footer<'a> {
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub struct EmbedImage<'a> {
    pub url: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_drop() -> DropClaim {
        DropClaim {
            name: "Golden Pickaxe".into(),
            benefits: vec![Benefit {
                name: "Pickaxe".into(),
                image_url: Some("https://cdn.example/pickaxe.png".into()),
            }],
            campaign: Campaign {
                name: "Autumn Event".into(),
                game_name: "Rust".into(),
                claimed_drops: 2,
                total_drops: 5,
                image_url: Some("https://cdn.example/campaign.png".into()),
            },
        }
    }

    #[test]
    fn drop_message_embeds_campaign_details() {
        let drop = sample_drop();
        let message = RichMessage::drop_claimed(&drop);

        assert_eq!(message.title(), "Claimed Drop: Rust (2/5)");
        assert_eq!(message.body(), "Campaign: Autumn Event\nDrop: Golden Pickaxe");
        assert_eq!(message.image_url(), Some("https://cdn.example/pickaxe.png"));
        assert_eq!(message.thumbnail_url(), Some("https://cdn.example/campaign.png"));
        assert_eq!(drop, sample_drop());
    }

    #[test]
    fn missing_images_use_placeholders() {
        let mut drop = sample_drop();
        drop.benefits.clear();
        drop.campaign.image_url = Some(String::new());

        let message = RichMessage::drop_claimed(&drop);
        assert_eq!(message.image_url(), Some(PLACEHOLDER_IMAGE));
        assert_eq!(message.thumbnail_url(), Some(PLACEHOLDER_THUMBNAIL));
    }

    #[test]
    fn test_message_is_branded() {
        let message = NotificationEvent::Test.build_message();
        assert_eq!(message.title(), "Test Notification");
        assert_eq!(message.color(), BRAND_COLOR);
        assert_eq!(message.footer(), FOOTER_TEXT);
    }

    #[test]
    fn color_is_masked_to_24_bits() {
        let message = RichMessage::new("t", "b", 0xFF12_3456, "f", None, None);
        assert_eq!(message.color(), 0x12_3456);
    }

    #[test]
    fn payload_omits_absent_images() {
        let message = RichMessage::new("Title", "Body", 0x00FF00, "Footer", None, None);
        let identity = WebhookIdentity::default();
        let payload = serde_json::to_value(message.webhook_payload(&identity)).unwrap();

        assert_eq!(
            payload,
            json!({
                "embeds": [{
                    "title": "Title",
                    "description": "Body",
                    "color": 0x00FF00,
                    "footer": {"text": "Footer"},
                }],
                "username": DEFAULT_USERNAME,
                "avatar_url": DEFAULT_AVATAR_URL,
            })
        );
    }

    #[test]
    fn payload_includes_images_when_set() {
        let message = RichMessage::test();
        let identity = WebhookIdentity::default();
        let payload = serde_json::to_value(message.webhook_payload(&identity)).unwrap();

        assert_eq!(payload["embeds"][0]["image"]["url"], PLACEHOLDER_IMAGE);
        assert_eq!(payload["embeds"][0]["thumbnail"]["url"], PLACEHOLDER_THUMBNAIL);
    }

    #[test]
    fn drop_claim_deserializes_without_optional_fields() {
        let drop: DropClaim = serde_json::from_value(json!({
            "name": "Crate",
            "campaign": {
                "name": "Spring",
                "game_name": "Game",
                "claimed_drops": 1,
                "total_drops": 3
            }
        }))
        .unwrap();
        assert!(drop.benefits.is_empty());
        assert_eq!(drop.campaign.image_url, None);
    }
}
