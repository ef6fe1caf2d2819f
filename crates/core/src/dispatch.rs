//! Alert fan-out to subscribers with per-subscriber failure isolation

use crate::alert::{Alert, AsyncSubscriber};
use crate::error::SubscriberError;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// A subscriber with the name it was attached under, for logs and reports.
pub struct NamedSubscriber {
    pub name: String,
    pub subscriber: Box<dyn AsyncSubscriber>,
}

impl NamedSubscriber {
    pub fn new(name: impl Into<String>, subscriber: Box<dyn AsyncSubscriber>) -> Self {
        Self {
            name: name.into(),
            subscriber,
        }
    }
}

/// One failed delivery within a dispatch.
#[derive(Debug)]
pub struct SubscriberFailure {
    pub subscriber: String,
    pub error: SubscriberError,
}

/// Outcome of dispatching one alert to a set of subscribers.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Subscribers that accepted the alert
    pub delivered: usize,

    /// Subscribers that failed, with their errors
    pub failures: Vec<SubscriberFailure>,
}

impl DispatchReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Deliver one alert to every subscriber, in attachment order.
///
/// A failing subscriber is logged and reported but never stops delivery to
/// the remaining subscribers, and the failure is never raised to the caller.
pub async fn dispatch(alert: &Arc<Alert>, subscribers: &mut [NamedSubscriber]) -> DispatchReport {
    let mut report = DispatchReport::default();

    for named in subscribers.iter_mut() {
        match named.subscriber.notify(Arc::clone(alert)).await {
            Ok(()) => report.delivered += 1,
            Err(error) => {
                warn!(
                    "Alert {} delivery to subscriber '{}' failed: {}",
                    alert.id, named.name, error
                );
                report.failures.push(SubscriberFailure {
                    subscriber: named.name.clone(),
                    error,
                });
            }
        }
    }

    report
}

/// Suppresses alerts that arrive within a window of the previous one.
///
/// The first alert always passes; each passed alert restarts the window.
pub struct Cooldown {
    window: Duration,
    last: Option<tokio::time::Instant>,
}

impl Cooldown {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Whether an alert may pass now. Advances the window when it does.
    pub fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        match self.last {
            Some(at) if now.duration_since(at) < self.window => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}
