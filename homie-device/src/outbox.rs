use homie_client::{PublishMessage, Request};
use homie_types::topic::{QoS, TopicFilter};

/// Transport requests queued while the device tree is locked, flushed as one batch afterwards.
pub(crate) struct Outbox {
    requests: Vec<Request>,
    metadata: bool,
}

impl Outbox {

    pub fn new(metadata: bool) -> Self {
        Self { requests: Vec::new(), metadata }
    }

    /// Whether property metadata is announced for this device
    pub fn metadata(&self) -> bool {
        self.metadata
    }

    pub fn publish(&mut self, message: PublishMessage) {
        self.requests.push(Request::Publish(message))
    }

    pub fn retained<P: Into<String>>(&mut self, topic: String, payload: P) {
        self.publish(PublishMessage::retained(topic, payload))
    }

    pub fn clear(&mut self, topic: String) {
        self.publish(PublishMessage::clear(topic))
    }

    pub fn subscribe(&mut self, topic: String) {
        self.requests.push(Request::Subscribe(TopicFilter::new_with_qos(topic, QoS::AtLeastOnce)))
    }

    pub fn unsubscribe(&mut self, topic: String) {
        self.requests.push(Request::Unsubscribe(topic))
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn into_requests(self) -> Vec<Request> {
        self.requests
    }
}
