use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;

use crate::broker::BrokerFactory;
use crate::error::{DeliveryOutcome, FailureReason, NotifyError};
use crate::limiter::LimiterChain;
use crate::message::{NotificationEvent, RichMessage, WebhookIdentity};
use crate::types::{BrokerDelivery, ClientProvider, DirectDelivery, DispatchConfiguration, DispatchReport};

#[cfg(feature = "metrics")]
pub(crate) fn metric_inc(name: &'static str) {
    metrics::increment_counter!(name);
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn metric_inc(_name: &'static str) {}

/// Shared, read-only context handed to every dispatch task.
pub(crate) struct DispatchContext {
    pub client_provider: Arc<dyn ClientProvider>,

    /// Process-wide quota for direct webhook posts.
    pub limiter: Arc<LimiterChain>,

    pub broker_factory: Arc<dyn BrokerFactory>,
    pub identity: Arc<WebhookIdentity>,
}

/// Deliver one event to every destination of `snapshot`.
///
/// Direct webhooks are posted one after another behind the limiter chain;
/// the generic destinations get one broker call on the blocking pool.
/// Every failure is logged and recorded in the report.
pub(crate) async fn run_dispatch(
    ctx: DispatchContext,
    snapshot: Arc<DispatchConfiguration>,
    event: NotificationEvent,
) -> DispatchReport {
    let message = event.build_message();
    let mut report = DispatchReport::new(event.kind());

    for destination in snapshot.direct() {
        let Some(url) = destination.webhook_url() else { continue };

        ctx.limiter.acquire().await;
        let outcome = match deliver_webhook(&ctx, url, &message).await {
            Ok(()) => {
                metric_inc("notify.webhook.delivered");
                tracing::debug!(destination = %redact(url), "webhook notification delivered");
                DeliveryOutcome::Delivered
            }
            Err(reason) => {
                metric_inc("notify.webhook.failed");
                match &reason {
                    FailureReason::Status { status, body } => tracing::warn!(
                        destination = %redact(url),
                        status,
                        body = %body,
                        "webhook notification failed"
                    ),
                    other => tracing::error!(
                        destination = %redact(url),
                        error = %other,
                        "webhook notification failed"
                    ),
                }
                DeliveryOutcome::Failed(reason)
            }
        };

        report.direct.push(DirectDelivery {
            destination: url.to_string(),
            outcome,
        });
    }

    if !snapshot.generic().is_empty() {
        let outcome = run_broker(&ctx, snapshot.generic(), &message).await;
        report.broker = Some(BrokerDelivery {
            destinations: snapshot.generic().to_vec(),
            outcome,
        });
    }

    report
}

async fn deliver_webhook(
    ctx: &DispatchContext,
    url: &str,
    message: &RichMessage,
) -> Result<(), FailureReason> {
    let payload = serde_json::to_vec(&message.webhook_payload(&ctx.identity))
        .map_err(|e| NotifyError::Serialization(e.to_string()))?;
    let client = ctx.client_provider.client().await?;

    let response = client
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .body(payload)
        .send()
        .await
        .map_err(|err| {
            if err.is_timeout() {
                FailureReason::Timeout
            } else {
                FailureReason::Network(err.to_string())
            }
        })?;

    let status = response.status();
    if status.as_u16() >= 400 {
        let body = response.text().await.unwrap_or_default();
        return Err(FailureReason::Status {
            status: status.as_u16(),
            body,
        });
    }

    Ok(())
}

/// Run the broker off the async scheduler. Broker panics are caught by the
/// blocking task and reported like any other failure.
async fn run_broker(
    ctx: &DispatchContext,
    destinations: &[String],
    message: &RichMessage,
) -> DeliveryOutcome {
    let factory = ctx.broker_factory.clone();
    let destinations = destinations.to_vec();
    let count = destinations.len();
    let title = message.title().to_string();
    let body = message.body().to_string();

    let result = tokio::task::spawn_blocking(move || {
        factory.build(&destinations).notify(&title, &body)
    })
    .await;

    match result {
        Ok(Ok(())) => {
            metric_inc("notify.broker.delivered");
            tracing::debug!(destinations = count, "broker notification delivered");
            DeliveryOutcome::Delivered
        }
        Ok(Err(err)) => {
            metric_inc("notify.broker.failed");
            tracing::error!(destinations = count, error = %err, "broker notification failed");
            DeliveryOutcome::Failed(err.into())
        }
        Err(join_err) => {
            metric_inc("notify.broker.failed");
            tracing::error!(destinations = count, error = %join_err, "broker notification aborted");
            DeliveryOutcome::Failed(FailureReason::Broker(join_err.to_string()))
        }
    }
}

/// Webhook URLs carry their token in the last path segment; keep it out of logs.
pub(crate) fn redact(url: &str) -> String {
    let path_end = url.find('?').unwrap_or(url.len());
    match url[..path_end].trim_end_matches('/').rsplit_once('/') {
        Some((head, _token)) => format!("{}/***", head),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_hides_token() {
        assert_eq!(
            redact("https://discord.com/api/webhooks/123/secret?thread_id=5"),
            "https://discord.com/api/webhooks/123/***"
        );
        assert_eq!(
            redact("https://discord.com/api/webhooks/1/tok/"),
            "https://discord.com/api/webhooks/1/***"
        );
        assert_eq!(
            redact("https://discord.com/api/webhooks/1/tok//?wait=true"),
            "https://discord.com/api/webhooks/1/***"
        );
        assert_eq!(redact("no-slashes"), "no-slashes");
    }
}
