#![allow(dead_code)]

use std::time::Duration;

use homie_client::{
    channel::{ChannelBroker, ChannelEventLoop, OutboundMessage},
    Event, InboundMessage, PublishMessage,
};
use homie_device::{Device, DeviceBuilder};
use tokio::time::timeout;

pub fn create_device(id: &str) -> (Device, ChannelBroker) {
    let (eventloop, client, broker) = ChannelEventLoop::new();
    let device = DeviceBuilder::new(eventloop, client)
        .with_id(id)
        .with_name("Test device")
        .build()
        .unwrap();
    (device, broker)
}

pub async fn recv(broker: &mut ChannelBroker) -> OutboundMessage {
    timeout(Duration::from_secs(1), broker.rx_outbound.recv())
        .await
        .expect("timed out waiting for outbound message")
        .expect("client dropped")
}

pub async fn recv_publish(broker: &mut ChannelBroker) -> PublishMessage {
    match recv(broker).await {
        OutboundMessage::Publish(message) => message,
        message => panic!("expected publish, got {message:?}"),
    }
}

/// Receive a publish and check its topic and payload
pub async fn expect_publish(broker: &mut ChannelBroker, topic: &str, payload: Option<&str>) {
    let message = recv_publish(broker).await;
    assert_eq!(message.topic, topic);
    assert_eq!(message.payload.as_deref(), payload, "payload of {topic}");
}

/// Collect everything the client sends until it has been quiet for a short while
pub async fn drain(broker: &mut ChannelBroker) -> Vec<OutboundMessage> {
    let mut messages = Vec::new();
    while let Ok(Some(message)) =
        timeout(Duration::from_millis(100), broker.rx_outbound.recv()).await
    {
        messages.push(message);
    }
    messages
}

pub fn publishes(messages: &[OutboundMessage]) -> Vec<(String, Option<String>)> {
    messages
        .iter()
        .filter_map(|x| match x {
            OutboundMessage::Publish(message) => {
                Some((message.topic.clone(), message.payload.clone()))
            }
            _ => None,
        })
        .collect()
}

pub fn state_changes(messages: &[OutboundMessage], device_topic: &str) -> Vec<String> {
    let state_topic = format!("{device_topic}/$state");
    publishes(messages)
        .into_iter()
        .filter(|(topic, _)| *topic == state_topic)
        .filter_map(|(_, payload)| payload)
        .collect()
}

pub fn subscriptions(messages: &[OutboundMessage]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|x| match x {
            OutboundMessage::Subscribe(filters) => Some(filters.iter().map(|f| f.topic.clone())),
            _ => None,
        })
        .flatten()
        .collect()
}

pub async fn assert_quiet(broker: &mut ChannelBroker) {
    let messages = drain(broker).await;
    assert!(messages.is_empty(), "unexpected messages {messages:?}");
}

pub fn send_message(broker: &ChannelBroker, topic: &str, payload: &[u8], retain: bool) {
    broker
        .tx_event
        .send(Event::Message(InboundMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            retain,
        }))
        .unwrap();
}

pub fn send_command(broker: &ChannelBroker, topic: &str, payload: &str) {
    send_message(broker, topic, payload.as_bytes(), false)
}
