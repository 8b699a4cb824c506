use homie_types::{
    constants::STATE,
    topic::{attribute_topic, QoS},
    DeviceState,
};

/// A single publish request.
///
/// A `payload` of `None` publishes an empty message, which removes a retained message
/// from the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishMessage {
    pub topic: String,
    pub payload: Option<String>,
    pub retain: bool,
    pub qos: QoS,
}

impl PublishMessage {
    pub fn new<S: Into<String>>(topic: S, payload: Option<String>, retain: bool, qos: QoS) -> Self {
        Self {
            topic: topic.into(),
            payload,
            retain,
            qos,
        }
    }

    /// A retained announcement, published with [QoS::AtLeastOnce]
    pub fn retained<S: Into<String>, P: Into<String>>(topic: S, payload: P) -> Self {
        Self::new(topic, Some(payload.into()), true, QoS::AtLeastOnce)
    }

    /// Remove the retained message on `topic`, published with [QoS::AtMostOnce]
    pub fn clear<S: Into<String>>(topic: S) -> Self {
        Self::new(topic, None, true, QoS::AtMostOnce)
    }

    pub fn payload_bytes(&self) -> Vec<u8> {
        match &self.payload {
            Some(payload) => payload.as_bytes().to_vec(),
            None => Vec::new(),
        }
    }
}

/// A request a [Client](crate::Client) can process as part of a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Publish(PublishMessage),
    Subscribe(homie_types::topic::TopicFilter),
    Unsubscribe(String),
}

/// A message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

/// An enum that represents the different types of events an [EventLoop](crate::EventLoop) implementation can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The connection was (re-)established and acknowledged by the broker
    Online,
    Offline,
    Message(InboundMessage),
    /// A subscribe request was acknowledged
    Subscribed,
    /// An unsubscribe request was acknowledged
    Unsubscribed,
}

/// Structure representing the last will of a device
#[derive(Debug, Clone, PartialEq)]
pub struct LastWill {
    pub topic: String,
    pub retain: bool,
    pub qos: QoS,
    pub payload: Vec<u8>,
}

impl LastWill {
    /// `{device_topic}/$state = lost`, retained
    pub fn new_device(device_topic: &str) -> Self {
        Self {
            topic: attribute_topic(device_topic, STATE),
            retain: true,
            qos: QoS::AtLeastOnce,
            payload: DeviceState::Lost.as_str().into(),
        }
    }
}
