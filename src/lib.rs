//! Best-effort notification dispatch for drop-claim events.
//!
//! Configured destination URLs are classified once per reload into
//! **direct webhooks**, posted straight to the chat platform, and
//! **generic destinations**, handed in one batch to a notification broker.
//!
//! ## Guarantees
//! - `notify` never blocks on network I/O or rate-limit waits
//! - Direct webhook traffic stays under a shared burst + sustained quota
//! - One destination's failure never affects another
//! - Delivery failures are logged, never returned to the caller
//!
//! ## Non-Guarantees
//! - At-least-once delivery or retries
//! - Ordering across destinations or events
//! - Deduplication of repeated events
//! - Persistence of undelivered notifications

mod broker;
mod classify;
mod config;
mod dispatcher;
mod error;
mod limiter;
mod message;
mod types;
mod worker;

pub use broker::{
    Broker, BrokerFactory, BrokerTarget, FanoutBroker, FanoutBrokerFactory, NTFY_HOSTS,
};
pub use classify::{classify, DISCORD_WEBHOOK_HOSTS};
pub use config::{NotifierConfig, DEFAULT_AVATAR_URL, DEFAULT_USERNAME};
pub use dispatcher::Dispatcher;
pub use error::{BrokerError, DeliveryOutcome, FailureReason, NotifyError};
pub use limiter::{LimiterChain, RateLimiter, RateLimiterStats};
pub use message::{
    Benefit,
    Campaign,
    DropClaim,
    NotificationEvent,
    RichMessage,
    WebhookIdentity,
    WebhookPayload,
    BRAND_COLOR,
    FOOTER_TEXT,
    PLACEHOLDER_IMAGE,
    PLACEHOLDER_THUMBNAIL,
};
pub use types::{
    BrokerDelivery,
    ClientProvider,
    Destination,
    DirectDelivery,
    DispatchConfiguration,
    DispatchReport,
    RawDestinations,
};
