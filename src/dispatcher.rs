use std::sync::{Arc, PoisonError, RwLock};

use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::broker::{BrokerFactory, FanoutBrokerFactory};
use crate::config::NotifierConfig;
use crate::limiter::{LimiterChain, RateLimiterStats};
use crate::message::{DropClaim, NotificationEvent, WebhookIdentity};
use crate::types::{ClientProvider, DispatchConfiguration, DispatchReport, RawDestinations};
use crate::worker::{metric_inc, run_dispatch, DispatchContext};

/// Turns application events into best-effort notifications.
///
/// `notify` never waits for delivery: it snapshots the current destinations,
/// spawns a background dispatch and hands back its [`JoinHandle`].
/// Production callers may drop the handle; tests can await it.
///
/// The limiter chain is shared by every direct-webhook post of this
/// dispatcher, and can be shared with other dispatchers through
/// [`Dispatcher::with_rate_limiter`], so one quota covers all of that traffic.
pub struct Dispatcher {
    config: NotifierConfig,
    destinations: RwLock<Arc<DispatchConfiguration>>,
    client_provider: Arc<dyn ClientProvider>,
    limiter: Arc<LimiterChain>,
    broker_factory: Arc<dyn BrokerFactory>,
    identity: Arc<WebhookIdentity>,
}

impl Dispatcher {
    /// Create an unconfigured dispatcher. Call [`reload`](Self::reload) to
    /// supply destinations.
    pub fn new(config: NotifierConfig, client_provider: impl ClientProvider + 'static) -> Self {
        Self {
            limiter: Arc::new(LimiterChain::from_config(&config)),
            broker_factory: Arc::new(FanoutBrokerFactory::new(&config)),
            identity: Arc::new(WebhookIdentity::from(&config)),
            destinations: RwLock::new(Arc::new(DispatchConfiguration::default())),
            client_provider: Arc::new(client_provider),
            config,
        }
    }

    /// Use an existing limiter chain instead of the one built from config.
    pub fn with_rate_limiter(mut self, limiter: Arc<LimiterChain>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Replace the broker used for generic destinations.
    pub fn with_broker_factory(mut self, factory: Arc<dyn BrokerFactory>) -> Self {
        self.broker_factory = factory;
        self
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    pub fn rate_limiter(&self) -> Arc<LimiterChain> {
        self.limiter.clone()
    }

    pub fn rate_limiter_stats(&self) -> Vec<RateLimiterStats> {
        self.limiter.stats()
    }

    /// Parse, classify and install a new destination list.
    ///
    /// The previous snapshot is replaced in one step; dispatches already
    /// running keep the snapshot they started with.
    pub fn reload(&self, raw: impl Into<RawDestinations>) {
        let raw = raw.into();
        let snapshot = Arc::new(DispatchConfiguration::from_raw(&raw));

        tracing::info!(
            destinations = snapshot.len(),
            direct = snapshot.direct().len(),
            generic = snapshot.generic().len(),
            "notification destinations reloaded"
        );

        let mut guard = self.destinations.write().unwrap_or_else(PoisonError::into_inner);
        *guard = snapshot;
    }

    pub fn configured(&self) -> bool {
        !self.destinations().is_empty()
    }

    /// Current destination snapshot.
    pub fn destinations(&self) -> Arc<DispatchConfiguration> {
        let guard = self.destinations.read().unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }

    /// Schedule delivery of `event` to every configured destination.
    ///
    /// Returns `None`, scheduling nothing, when no destination is configured.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn notify(&self, event: NotificationEvent) -> Option<JoinHandle<DispatchReport>> {
        let snapshot = self.destinations();
        if snapshot.is_empty() {
            return None;
        }

        let ctx = DispatchContext {
            client_provider: self.client_provider.clone(),
            limiter: self.limiter.clone(),
            broker_factory: self.broker_factory.clone(),
            identity: self.identity.clone(),
        };

        let span = tracing::info_span!("notification_dispatch", event = event.kind());
        metric_inc("notify.dispatch.scheduled");
        Some(tokio::spawn(run_dispatch(ctx, snapshot, event).instrument(span)))
    }

    pub fn notify_test(&self) -> Option<JoinHandle<DispatchReport>> {
        self.notify(NotificationEvent::Test)
    }

    pub fn notify_drop(&self, drop: &DropClaim) -> Option<JoinHandle<DispatchReport>> {
        self.notify(NotificationEvent::DropClaimed(drop.clone()))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("destinations", &self.destinations().len())
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(NotifierConfig::default(), reqwest::Client::new())
    }

    #[test]
    fn starts_unconfigured() {
        assert!(!dispatcher().configured());
    }

    #[test]
    fn reload_replaces_destinations_wholesale() {
        let dispatcher = dispatcher();
        dispatcher.reload("discord://1/a ntfy://topic");
        let first = dispatcher.destinations();
        assert_eq!(first.len(), 2);

        dispatcher.reload(vec!["json://host/path"]);
        assert_eq!(dispatcher.destinations().len(), 1);
        // earlier snapshots are untouched
        assert_eq!(first.len(), 2);

        dispatcher.reload(Vec::<String>::new());
        assert!(!dispatcher.configured());
    }

    #[tokio::test]
    async fn unconfigured_notify_schedules_nothing() {
        let dispatcher = dispatcher();
        assert!(dispatcher.notify_test().is_none());
    }

    #[test]
    fn limiter_can_be_shared() {
        let first = dispatcher();
        let second = dispatcher().with_rate_limiter(first.rate_limiter());
        assert!(Arc::ptr_eq(&first.rate_limiter(), &second.rate_limiter()));
    }
}
