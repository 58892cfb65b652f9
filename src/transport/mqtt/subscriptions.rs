//! Tracked topic subscriptions
//!
//! Filters are keyed by their topic string only. A second request for a
//! filter that is already tracked is ignored even if it asks for a different
//! QoS. Insertion order is kept so the batched SUBSCRIBE lists filters in the
//! order they were first requested.

use super::connection::QoS;
use rumqttc::SubscribeFilter;

/// A topic filter with its requested QoS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub topic_filter: String,
    pub qos: QoS,
}

impl Subscription {
    pub fn new(topic_filter: impl Into<String>, qos: QoS) -> Self {
        Self {
            topic_filter: topic_filter.into(),
            qos,
        }
    }
}

impl From<&Subscription> for SubscribeFilter {
    fn from(subscription: &Subscription) -> Self {
        SubscribeFilter::new(subscription.topic_filter.clone(), subscription.qos.into())
    }
}

/// Deduplicated, ordered subscription list
#[derive(Debug, Default, Clone)]
pub struct SubscriptionSet {
    entries: Vec<Subscription>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, topic_filter: &str) -> bool {
        self.entries
            .iter()
            .any(|existing| existing.topic_filter == topic_filter)
    }

    /// Append every filter not already tracked; returns how many were added
    pub fn extend_new<I>(&mut self, subscriptions: I) -> usize
    where
        I: IntoIterator<Item = Subscription>,
    {
        let before = self.entries.len();
        for subscription in subscriptions {
            if !self.contains(&subscription.topic_filter) {
                self.entries.push(subscription);
            }
        }
        self.entries.len() - before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Subscription] {
        &self.entries
    }

    /// The whole accumulated set, ready for one `subscribe_many` call
    pub fn to_filters(&self) -> Vec<SubscribeFilter> {
        self.entries.iter().map(SubscribeFilter::from).collect()
    }
}
