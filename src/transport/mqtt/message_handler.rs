//! Pure routing of rumqttc events
//!
//! The network task polls the rumqttc event loop and hands every event to
//! [`MessageHandler::route_mqtt_event`], which reduces it to the handful of
//! cases the lifecycle dispatcher cares about.

use rumqttc::{ConnectReturnCode, Event, Outgoing, Packet, SubscribeReasonCode};

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to appropriate handler (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(connack) if connack.code == ConnectReturnCode::Success => {
                    EventRoute::ConnectionAcknowledged {
                        session_present: connack.session_present,
                    }
                }
                Packet::ConnAck(connack) => {
                    EventRoute::ConnectionRefused(format!("{:?}", connack.code))
                }
                Packet::Publish(publish) => EventRoute::MessageReceived {
                    topic: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                },
                // QoS 1 completes with PUBACK, QoS 2 with PUBCOMP
                Packet::PubAck(puback) => EventRoute::PublishAcknowledged {
                    packet_id: puback.pkid,
                },
                Packet::PubComp(pubcomp) => EventRoute::PublishAcknowledged {
                    packet_id: pubcomp.pkid,
                },
                Packet::SubAck(suback) => EventRoute::SubscriptionConfirmed {
                    packet_id: suback.pkid,
                    rejected: Self::count_rejected(&suback.return_codes),
                },
                Packet::Disconnect => EventRoute::BrokerDisconnected,
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(outgoing) => match outgoing {
                Outgoing::Publish(packet_id) => EventRoute::PublishSent {
                    packet_id: *packet_id,
                },
                Outgoing::Disconnect => EventRoute::DisconnectSent,
                _ => EventRoute::OutgoingEvent,
            },
        }
    }

    /// Number of filters the broker refused in a SubAck (pure function)
    pub fn count_rejected(return_codes: &[SubscribeReasonCode]) -> usize {
        return_codes
            .iter()
            .filter(|code| matches!(code, SubscribeReasonCode::Failure))
            .count()
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone, PartialEq)]
pub enum EventRoute {
    /// Connection acknowledged - ready to publish/subscribe
    ConnectionAcknowledged { session_present: bool },
    /// Broker answered CONNECT with a failure code
    ConnectionRefused(String),
    /// Message received on subscribed topic
    MessageReceived { topic: String, payload: Vec<u8> },
    /// Final acknowledgment for a QoS 1 or QoS 2 publish
    PublishAcknowledged { packet_id: u16 },
    /// A PUBLISH packet left the client (packet id 0 for QoS 0)
    PublishSent { packet_id: u16 },
    /// Subscription confirmed, with the count of refused filters
    SubscriptionConfirmed { packet_id: u16, rejected: usize },
    /// Broker sent DISCONNECT
    BrokerDisconnected,
    /// Our DISCONNECT went out
    DisconnectSent,
    /// Infrastructure event (PingResp, etc.)
    InfrastructureEvent(String),
    /// Other outgoing event (handled by rumqttc)
    OutgoingEvent,
}
