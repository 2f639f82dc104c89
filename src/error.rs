use std::fmt;

/// Errors raised while preparing a delivery, before any request is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The injected client provider could not supply an HTTP client.
    ClientUnavailable(String),

    /// The outgoing payload could not be serialized.
    Serialization(String),
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyError::ClientUnavailable(reason) =>
                write!(f, "http client unavailable: {}", reason),
            NotifyError::Serialization(reason) =>
                write!(f, "failed to serialize payload: {}", reason),
        }
    }
}

impl std::error::Error for NotifyError {}

/// Errors reported by a generic broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The destination scheme has no broker handler.
    UnsupportedScheme {
        destination: String,
    },

    /// The destination could not be turned into a request target.
    InvalidDestination {
        destination: String,
        reason: String,
    },

    /// One or more destinations failed; each entry is `(destination, reason)`.
    Delivery(Vec<(String, String)>),
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerError::UnsupportedScheme { destination } =>
                write!(f, "unsupported notification scheme: {}", destination),
            BrokerError::InvalidDestination { destination, reason } =>
                write!(f, "invalid destination {}: {}", destination, reason),
            BrokerError::Delivery(failures) => {
                write!(f, "{} destination(s) failed", failures.len())?;
                for (destination, reason) in failures {
                    write!(f, "; {}: {}", destination, reason)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for BrokerError {}

/// Final outcome of attempting one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(FailureReason),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

/// Reasons why a delivery attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The endpoint answered with a status of 400 or above.
    Status {
        status: u16,
        body: String,
    },
    Timeout,
    Network(String),

    /// Setup failed before the request was sent.
    Client(String),

    /// The generic broker reported an error or panicked.
    Broker(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Status { status, body } =>
                write!(f, "endpoint returned {}: {}", status, body),
            FailureReason::Timeout =>
                write!(f, "request timed out"),
            FailureReason::Network(reason) =>
                write!(f, "network error: {}", reason),
            FailureReason::Client(reason) =>
                write!(f, "request setup failed: {}", reason),
            FailureReason::Broker(reason) =>
                write!(f, "broker failed: {}", reason),
        }
    }
}

impl From<NotifyError> for FailureReason {
    fn from(err: NotifyError) -> Self {
        FailureReason::Client(err.to_string())
    }
}

impl From<BrokerError> for FailureReason {
    fn from(err: BrokerError) -> Self {
        FailureReason::Broker(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_delivery_error_lists_every_failure() {
        let err = BrokerError::Delivery(vec![
            ("ntfy://a".to_string(), "timeout".to_string()),
            ("json://b".to_string(), "503".to_string()),
        ]);
        assert_eq!(
            err.to_string(),
            "2 destination(s) failed; ntfy://a: timeout; json://b: 503"
        );
    }

    #[test]
    fn notify_error_converts_to_client_failure() {
        let reason: FailureReason = NotifyError::ClientUnavailable("gone".into()).into();
        assert_eq!(reason, FailureReason::Client("http client unavailable: gone".into()));
    }
}
