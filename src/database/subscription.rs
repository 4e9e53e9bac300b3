//! # Subscriptions
//!
//! Live queries. The backend hands every written or deleted record to the
//! [`SubscriptionPlugin`], which offers it to each matching subscriber.
//!
//! A slow subscriber is finished with `DbError::Timeout` once it has
//! blocked for the configured timeout. Offers to different subscribers
//! run concurrently, so one stalled subscriber never delays delivery to
//! another.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures_util::future::join_all;
use uuid::Uuid;

use super::context::Context;
use super::errors::{DbError, DbResult};
use super::iterator::{Finisher, RecordIterator};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::query::Query;
use crate::record::RecordRef;

/// A live query handed to the consumer
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    query: Arc<Query>,
    feed: RecordIterator,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Next written or deleted record; `None` once the subscription ended
    pub async fn next(&mut self) -> Option<RecordRef> {
        self.feed.next().await
    }

    /// Stop receiving. Returns true for the call that cancelled.
    pub fn cancel(&self) -> bool {
        self.feed.cancel()
    }

    /// Why the subscription ended, if it ended with an error
    pub fn err(&self) -> Option<DbError> {
        self.feed.err()
    }

    pub fn is_finished(&self) -> bool {
        self.feed.is_finished()
    }

    /// Wait until the subscription has been finished
    pub async fn done(&self) {
        self.feed.done().await
    }

    /// The underlying record stream
    pub fn into_iterator(self) -> RecordIterator {
        self.feed
    }
}

/// Registry-side half of a subscription
#[derive(Debug)]
struct Subscriber {
    id: Uuid,
    query: Arc<Query>,
    finisher: Finisher,
}

impl Subscriber {
    /// Tombstones carry no payload, so only key and permission apply
    fn wants(&self, record: &RecordRef) -> bool {
        if record.is_deleted() {
            self.query.matches_key(record.key())
                && self.query.matches_permission(record.permission())
        } else {
            self.query.matches(record.as_ref())
        }
    }
}

/// Fans records out to live subscriptions
#[derive(Debug)]
pub struct SubscriptionPlugin {
    subscribers: RwLock<Vec<Arc<Subscriber>>>,
    timeout: Duration,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl SubscriptionPlugin {
    /// Create a plugin whose offers give up after `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            timeout,
            metrics: None,
        }
    }

    /// Count subscriptions, deliveries and timeouts in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register a live query.
    ///
    /// Subscriptions that already ended are swept out of the registry here;
    /// there is no background sweeper.
    pub fn subscribe(&self, query: Query, queue_size: usize) -> DbResult<Subscription> {
        let query = Arc::new(query.checked()?);
        let (feed, finisher) = RecordIterator::new(queue_size);
        let id = Uuid::new_v4();

        let subscriber = Arc::new(Subscriber {
            id,
            query: query.clone(),
            finisher,
        });

        let swept = {
            let mut subscribers = self
                .subscribers
                .write()
                .map_err(|_| DbError::ShuttingDown)?;
            let before = subscribers.len();
            subscribers.retain(|s| {
                if s.finisher.is_cancelled() {
                    s.finisher.finish(None);
                }
                !s.finisher.is_finished()
            });
            let swept = before - subscribers.len();
            subscribers.push(subscriber);
            swept
        };

        if swept > 0 {
            let count = swept.to_string();
            log_event_with_fields(Event::SubscriptionsSwept, &[("count", count.as_str())]);
        }
        if let Some(metrics) = &self.metrics {
            metrics.increment_subscriptions_created();
        }
        let id_text = id.to_string();
        log_event_with_fields(
            Event::SubscriptionCreated,
            &[("id", id_text.as_str()), ("prefix", query.key_prefix())],
        );

        Ok(Subscription { id, query, feed })
    }

    /// Offer a written or deleted record to every matching subscriber.
    ///
    /// Returns true when `ctx` was cancelled and the writer should stop.
    pub async fn submit(&self, ctx: &Context, record: &RecordRef) -> bool {
        let targets: Vec<Arc<Subscriber>> = match self.subscribers.read() {
            Ok(subscribers) => subscribers
                .iter()
                .filter(|s| !s.finisher.is_closed() && s.wants(record))
                .cloned()
                .collect(),
            Err(_) => return true,
        };

        let offers = targets.iter().map(|s| async move {
            let delivered = s.finisher.offer(ctx, record.clone(), self.timeout).await;
            (s, delivered)
        });

        for (subscriber, delivered) in join_all(offers).await {
            if delivered {
                if let Some(metrics) = &self.metrics {
                    metrics.increment_deliveries();
                }
            } else if subscriber.finisher.err() == Some(DbError::Timeout) {
                if let Some(metrics) = &self.metrics {
                    metrics.increment_subscription_timeouts();
                }
                let id = subscriber.id.to_string();
                log_event_with_fields(
                    Event::SubscriptionTimeout,
                    &[("id", id.as_str()), ("key", record.key())],
                );
            }
        }

        ctx.is_cancelled()
    }

    /// Finish every subscription with `err` and empty the registry
    pub fn finish_all(&self, err: Option<DbError>) {
        let drained: Vec<Arc<Subscriber>> = match self.subscribers.write() {
            Ok(mut subscribers) => subscribers.drain(..).collect(),
            Err(_) => return,
        };
        for subscriber in drained {
            subscriber.finisher.finish(err.clone());
        }
    }

    /// Number of subscriptions still accepting records
    pub fn len(&self) -> usize {
        self.subscribers
            .read()
            .map(|s| s.iter().filter(|s| !s.finisher.is_closed()).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
