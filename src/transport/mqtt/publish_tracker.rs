//! Pending-publish bookkeeping
//!
//! rumqttc only assigns a packet id once the event loop writes the PUBLISH,
//! so `publish()` hands out its own [`MessageId`] and the tracker binds it to
//! the packet id when the matching `Outgoing::Publish` event arrives. Packets
//! leave in submission order, so the Nth outgoing publish belongs to the Nth
//! queued submission.

use super::connection::QoS;
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// Handle correlating a `publish()` call with its later acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of an acknowledgment lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledged {
    pub message_id: MessageId,
    /// Size submitted with the publish; `None` when no pending entry remained
    pub payload_size: Option<usize>,
}

#[derive(Debug)]
pub struct PublishTracker {
    next_id: u64,
    /// Submitted but not yet seen on the wire
    awaiting_packet_id: VecDeque<MessageId>,
    /// Latest message bound to each packet id
    packet_ids: HashMap<u16, MessageId>,
    /// The pending-publish map: QoS 1/2 payload sizes awaiting acknowledgment
    payload_sizes: HashMap<MessageId, usize>,
}

impl Default for PublishTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PublishTracker {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            awaiting_packet_id: VecDeque::new(),
            packet_ids: HashMap::new(),
            payload_sizes: HashMap::new(),
        }
    }

    /// Record a publish that was accepted by the request queue.
    /// QoS 0 never enters the pending map.
    pub fn register(&mut self, qos: QoS, payload_size: usize) -> MessageId {
        let message_id = MessageId(self.next_id);
        self.next_id += 1;

        self.awaiting_packet_id.push_back(message_id);
        if qos.is_acknowledged() {
            self.payload_sizes.insert(message_id, payload_size);
        }
        message_id
    }

    /// Bind the next queued submission to the packet id the event loop used.
    /// A packet id still bound to a pending message is a retransmission after
    /// reconnect and does not consume a submission.
    pub fn bind_outgoing(&mut self, packet_id: u16) -> Option<MessageId> {
        if packet_id != 0 {
            if let Some(existing) = self.packet_ids.get(&packet_id) {
                if self.payload_sizes.contains_key(existing) {
                    return None;
                }
            }
        }

        let message_id = self.awaiting_packet_id.pop_front()?;
        if packet_id != 0 {
            self.packet_ids.insert(packet_id, message_id);
        }
        Some(message_id)
    }

    /// Resolve an acknowledgment, removing the pending entry.
    /// Returns `None` for packet ids never bound to a message.
    pub fn acknowledge(&mut self, packet_id: u16) -> Option<Acknowledged> {
        let message_id = *self.packet_ids.get(&packet_id)?;
        Some(Acknowledged {
            message_id,
            payload_size: self.complete(message_id),
        })
    }

    /// Remove and return the pending size for a message
    pub fn complete(&mut self, message_id: MessageId) -> Option<usize> {
        self.payload_sizes.remove(&message_id)
    }

    /// Messages still waiting for acknowledgment
    pub fn pending(&self) -> usize {
        self.payload_sizes.len()
    }

    pub fn is_pending(&self, message_id: MessageId) -> bool {
        self.payload_sizes.contains_key(&message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos0_never_pending() {
        let mut tracker = PublishTracker::new();
        let id = tracker.register(QoS::AtMostOnce, 42);

        assert_eq!(tracker.pending(), 0);
        assert!(!tracker.is_pending(id));
        // QoS 0 goes out with packet id 0 and is never bound
        assert_eq!(tracker.bind_outgoing(0), Some(id));
        assert_eq!(tracker.acknowledge(0), None);
    }

    #[test]
    fn test_qos1_acknowledged_once() {
        let mut tracker = PublishTracker::new();
        let id = tracker.register(QoS::AtLeastOnce, 64);
        assert_eq!(tracker.pending(), 1);

        assert_eq!(tracker.bind_outgoing(1), Some(id));
        assert_eq!(
            tracker.acknowledge(1),
            Some(Acknowledged {
                message_id: id,
                payload_size: Some(64)
            })
        );
        assert_eq!(tracker.pending(), 0);

        // Duplicate acknowledgment reports an absent size
        assert_eq!(
            tracker.acknowledge(1),
            Some(Acknowledged {
                message_id: id,
                payload_size: None
            })
        );
    }

    #[test]
    fn test_message_ids_are_monotonic() {
        let mut tracker = PublishTracker::new();
        let a = tracker.register(QoS::AtMostOnce, 1);
        let b = tracker.register(QoS::AtLeastOnce, 1);
        let c = tracker.register(QoS::ExactlyOnce, 1);
        assert!(a < b && b < c);
    }

    #[test]
    fn test_binding_follows_submission_order() {
        let mut tracker = PublishTracker::new();
        let first = tracker.register(QoS::AtLeastOnce, 10);
        let second = tracker.register(QoS::AtMostOnce, 20);
        let third = tracker.register(QoS::ExactlyOnce, 30);

        assert_eq!(tracker.bind_outgoing(1), Some(first));
        assert_eq!(tracker.bind_outgoing(0), Some(second));
        assert_eq!(tracker.bind_outgoing(2), Some(third));

        assert_eq!(tracker.acknowledge(2).unwrap().payload_size, Some(30));
        assert_eq!(tracker.acknowledge(1).unwrap().payload_size, Some(10));
    }

    #[test]
    fn test_retransmission_does_not_consume_submission() {
        let mut tracker = PublishTracker::new();
        let first = tracker.register(QoS::AtLeastOnce, 10);
        assert_eq!(tracker.bind_outgoing(1), Some(first));

        let second = tracker.register(QoS::AtLeastOnce, 20);
        // Packet 1 resent after reconnect
        assert_eq!(tracker.bind_outgoing(1), None);
        assert_eq!(tracker.bind_outgoing(2), Some(second));
    }

    #[test]
    fn test_packet_id_reuse_after_ack() {
        let mut tracker = PublishTracker::new();
        let first = tracker.register(QoS::AtLeastOnce, 10);
        tracker.bind_outgoing(1);
        tracker.acknowledge(1);

        let second = tracker.register(QoS::AtLeastOnce, 20);
        assert_eq!(tracker.bind_outgoing(1), Some(second));
        assert_ne!(first, second);
        assert_eq!(
            tracker.acknowledge(1),
            Some(Acknowledged {
                message_id: second,
                payload_size: Some(20)
            })
        );
    }

    #[test]
    fn test_unknown_packet_id() {
        let mut tracker = PublishTracker::new();
        assert_eq!(tracker.acknowledge(99), None);
        assert_eq!(tracker.bind_outgoing(5), None);
    }

    #[test]
    fn test_message_id_display() {
        assert_eq!(MessageId(17).to_string(), "17");
    }
}
