use std::sync::{Arc, Mutex};

use crate::{Event, LastWill, PublishMessage};
use async_trait::async_trait;
use homie_types::topic::TopicFilter;
use tokio::sync::mpsc;

/// A [Client](crate::Client) implementation that uses channels for message passing.
///
/// # Examples
///
/// See [ChannelEventLoop]
#[derive(Clone)]
pub struct ChannelClient {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelClient {
    fn send(&self, message: OutboundMessage) -> Result<(), ()> {
        match self.tx.send(message) {
            Ok(_) => Ok(()),
            Err(_) => Err(()),
        }
    }
}

#[async_trait]
impl crate::Client for ChannelClient {
    async fn disconnect(&self) -> Result<(), ()> {
        self.send(OutboundMessage::Disconnect)
    }

    async fn publish(&self, message: PublishMessage) -> Result<(), ()> {
        self.send(OutboundMessage::Publish(message))
    }

    async fn subscribe_many(&self, topics: Vec<TopicFilter>) -> Result<(), ()> {
        self.send(OutboundMessage::Subscribe(topics))
    }

    async fn unsubscribe(&self, topic: String) -> Result<(), ()> {
        self.send(OutboundMessage::Unsubscribe(topic))
    }
}

/// An Enum representing different messages and requests a [ChannelClient] can send to the [ChannelBroker]
#[derive(Clone, Debug, PartialEq)]
pub enum OutboundMessage {
    Disconnect,
    Publish(PublishMessage),
    Subscribe(Vec<TopicFilter>),
    Unsubscribe(String),
}

/// A "broker" that manages the communication between a [ChannelClient] and an [ChannelEventLoop].
///
/// Used to send events to the eventloop and inspect messages/requests produced by the client
///
/// # Examples
///
/// ```no_run
/// use homie_client::{Event, channel::{ChannelEventLoop, ChannelClient}};
/// use tokio::runtime::Runtime;
///
/// let rt = Runtime::new().unwrap();
/// rt.block_on(async {
///     let (mut eventloop, client, mut broker) = ChannelEventLoop::new();
///
///     //create a device that uses the EventLoop and client
///     
///     //Send an event to the EventLoop
///     broker.tx_event.send(Event::Online).unwrap();
///
///     //Receive a message or request from the Client
///     let message = broker.rx_outbound.recv().await.unwrap();
/// });
/// ```
pub struct ChannelBroker {
    pub rx_outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    pub tx_event: mpsc::UnboundedSender<Event>,
    last_will: Arc<Mutex<Option<LastWill>>>,
}

impl ChannelBroker {
    /// Retrieves the current last will message set by the EventLoop, if set.
    pub fn last_will(&self) -> Option<LastWill> {
        self.last_will.lock().unwrap().clone()
    }
}

/// An [EventLoop](crate::EventLoop) implementation that uses channels
///
/// # Examples
///
/// See [ChannelBroker]
pub struct ChannelEventLoop {
    rx: mpsc::UnboundedReceiver<Event>,
    last_will: Arc<Mutex<Option<LastWill>>>,
}

impl ChannelEventLoop {
    /// Creates a new event loop along with the corresponding client and broker.
    pub fn new() -> (Self, ChannelClient, ChannelBroker) {
        let (tx_event, rx_event) = mpsc::unbounded_channel();
        let (tx_outbound, rx_outbound) = mpsc::unbounded_channel();
        let last_will = Arc::new(Mutex::new(None));
        let el = Self {
            rx: rx_event,
            last_will: last_will.clone(),
        };
        (
            el,
            ChannelClient { tx: tx_outbound },
            ChannelBroker {
                rx_outbound,
                tx_event,
                last_will,
            },
        )
    }
}

#[async_trait]
impl crate::EventLoop for ChannelEventLoop {
    async fn poll(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    fn set_last_will(&mut self, will: LastWill) {
        let mut lw = self.last_will.lock().unwrap();
        *lw = Some(will)
    }
}
