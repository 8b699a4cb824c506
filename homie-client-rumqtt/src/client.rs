use async_trait::async_trait;
use log::{error, trace};
use rumqttc::{v5::{mqttbytes::{v5::{Filter, Packet}, QoS}, AsyncClient as RuClient, EventLoop as RuEventLoop, MqttOptions}, Outgoing};
use homie_types::topic::TopicFilter;

use homie_client::{Event, InboundMessage, LastWill, PublishMessage};

fn qos_to_mqtt_qos(qos: homie_types::topic::QoS) -> QoS {
  match qos {
    homie_types::topic::QoS::AtMostOnce => QoS::AtMostOnce,
    homie_types::topic::QoS::AtLeastOnce => QoS::AtLeastOnce,
    homie_types::topic::QoS::ExactlyOnce => QoS::ExactlyOnce,
  }
}

fn topic_filter_to_mqtt_filter(topic_filter: TopicFilter) -> Filter {
  Filter::new(topic_filter.topic, qos_to_mqtt_qos(topic_filter.qos))
}

/// A [homie_client::Client] implementation using [rumqttc]
#[derive(Clone)]
pub struct Client {
  client: RuClient
}

#[async_trait]
impl homie_client::Client for Client {

  async fn disconnect(&self) -> Result<(),()> {
    match self.client.disconnect().await {
      Ok(_) => Ok(()),
      Err(_) => Err(()),
    }
  }

  async fn publish(&self, message: PublishMessage) -> Result<(),()> {
    let payload = message.payload_bytes();
    match self.client.publish(message.topic, qos_to_mqtt_qos(message.qos), message.retain, payload).await {
      Ok(_) => Ok(()),
      Err(_) => Err(()),
    }
  }

  async fn subscribe_many(&self, topics: Vec<TopicFilter>) -> Result<(),()> {
    let filters: Vec<Filter> = topics.into_iter().map(topic_filter_to_mqtt_filter).collect();
    match self.client.subscribe_many(filters).await {
      Ok(_) => Ok(()),
      Err(_) => Err(()),
    }
  }

  async fn unsubscribe(&self, topic: String) -> Result<(),()> {
    match self.client.unsubscribe(topic).await {
      Ok(_) => Ok(()),
      Err(_) => Err(()),
    }
  }

}

enum ConnectionState {
  Disconnected,
  ManualDisconnected,
  Connected,
}

/// An [homie_client::EventLoop] implementation using [rumqttc]
pub struct EventLoop {
  state: ConnectionState,
  el: RuEventLoop 
}

impl EventLoop {

  /// Create a new `Eventloop`.
  /// 
  /// `options` are the mqtt options to create the rumqtt client with. A clean start is always requested:
  /// command subscriptions are restored by the device after every reconnect.
  /// 
  /// `cap` specifies the capacity of the bounded async channel for the client handle.
  pub fn new(options: MqttOptions, cap: usize) -> (Self, Client) {
    let mut options = options;
    options.set_clean_start(true);

    let (client, eventloop) = RuClient::new(options, cap);
    (EventLoop{el: eventloop, state: ConnectionState::Disconnected}, Client{client})
  }

  async fn poll_rumqtt(&mut self) -> Option<Event>
  {
    let event = self.el.poll().await;
    match event {
      Ok(event) => {
        trace!("{event:?}");
        match event {
          rumqttc::v5::Event::Incoming(Packet::ConnAck(_)) => {
            self.state = ConnectionState::Connected;
            Some(Event::Online)
          },
          rumqttc::v5::Event::Incoming(Packet::Disconnect(_)) => {
            self.state = ConnectionState::Disconnected;
            Some(Event::Offline)
          },
          rumqttc::v5::Event::Incoming(Packet::Publish(publish)) => {
            match String::from_utf8(publish.topic.to_vec()) {
              Ok(topic) => Some(Event::Message(InboundMessage { topic, payload: publish.payload.to_vec(), retain: publish.retain })),
              Err(_) => {
                error!("Received publish with a non utf8 topic - ignoring");
                None
              }
            }
          },
          rumqttc::v5::Event::Incoming(Packet::SubAck(_)) => Some(Event::Subscribed),
          rumqttc::v5::Event::Incoming(Packet::UnsubAck(_)) => Some(Event::Unsubscribed),
          rumqttc::v5::Event::Outgoing(Outgoing::Disconnect) => {
            self.state = ConnectionState::ManualDisconnected;
            Some(Event::Offline)
          }
          _ => None
        }
      },
      Err(e) => {
        match self.state {
            ConnectionState::Connected=>{
              error!("Client error: {e}");
              self.state = ConnectionState::Disconnected;
              Some(Event::Offline)
            },
            ConnectionState::Disconnected=>{
              error!("Client error on reconnect attempt: {e}");
              tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
              None
            }
            ConnectionState::ManualDisconnected => None,
        }
      },
    }
  }
}

#[async_trait]
impl homie_client::EventLoop for EventLoop 
{
  async fn poll(&mut self) -> Option<Event> {
    loop {
      if let ConnectionState::ManualDisconnected = self.state {
        return None
      }
      if let Some(event) = self.poll_rumqtt().await {
        return Some(event)
      }
    }
  }

  fn set_last_will(&mut self, will: LastWill) {
    let qos = qos_to_mqtt_qos(will.qos);
    let mqtt_will = rumqttc::v5::mqttbytes::v5::LastWill::new(will.topic, will.payload, qos, will.retain, None);
    self.el.options.set_last_will(mqtt_will);
  }

}
