use async_trait::async_trait;
use homie_types::topic::TopicFilter;

use crate::{Event, LastWill, PublishMessage, Request};

#[async_trait]
pub trait Client {

  /// Disconnects the client.
  ///
  /// # Returns
  ///
  /// - `Ok(())` if the disconnection was successful
  /// - `Err(())` if the disconnection failed
  async fn disconnect(&self) -> Result<(),()>; 

  /// Publishes a message.
  ///
  /// This method will yield to the async runtime until the message is accepted by the client.
  /// A message without payload clears the retained message on its topic.
  ///
  /// # Parameters
  ///
  /// - `message`: The topic, payload, retain flag and [QoS](homie_types::topic::QoS) to publish with
  ///
  /// # Returns
  ///
  /// - `Ok(())` if the message was successfully published
  /// - `Err(())` if the publication failed
  async fn publish(&self, message: PublishMessage) -> Result<(),()>;

  /// Subscribes to a single topic.
  ///
  /// This is a convenience method that calls `subscribe_many` with a single topic.
  ///
  /// # Parameters
  ///
  /// - `topic`: The topic filter to subscribe to
  ///
  /// # Returns
  ///
  /// - `Ok(())` if the subscription was successful
  /// - `Err(())` if the subscription failed
  async fn subscribe(&self, topic: TopicFilter) -> Result<(),()> {self.subscribe_many(vec![topic]).await}

  /// Subscribes to multiple topics in a single operation.
  ///
  /// # Parameters
  ///
  /// - `topics`: A vector of topic filters to subscribe to
  ///
  /// # Returns
  ///
  /// - `Ok(())` if all subscriptions were successful
  /// - `Err(())` if any subscription failed
  async fn subscribe_many(&self, topics: Vec<TopicFilter>) -> Result<(),()>; 

  /// Unsubscribes from a topic.
  ///
  /// The broker acknowledgment is reported by the [EventLoop] as [Event::Unsubscribed].
  async fn unsubscribe(&self, topic: String) -> Result<(),()>;

  /// Processes a group of related requests in order.
  ///
  /// Implementations may use this as a hint to flush the requests together. A batch is not
  /// transactional: if a request fails the remaining requests are not sent and the ones already
  /// sent are not undone.
  async fn batch(&self, requests: Vec<Request>) -> Result<(),()> {
    for request in requests {
      match request {
        Request::Publish(message) => self.publish(message).await?,
        Request::Subscribe(filter) => self.subscribe(filter).await?,
        Request::Unsubscribe(topic) => self.unsubscribe(topic).await?,
      }
    }
    Ok(())
  }
}

pub type DynClient = dyn Client + Send + Sync;

#[async_trait]
pub trait EventLoop
{
  /// Wait for the next [Event].
  ///
  /// Returns `None` once the event stream has ended and will produce no further events.
  async fn poll(&mut self) -> Option<Event>;

  /// Set the last will registered with the broker when the next connection is established.
  fn set_last_will(&mut self, will: LastWill);
} 

pub type DynEventLoop = dyn EventLoop + Send;
