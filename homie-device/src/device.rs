use std::{
    pin::pin,
    time::Duration,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use homie_client::{DynClient, DynEventLoop, Event, PublishMessage, Request};
use homie_types::{
    topic::{device_wildcard, QoS, TopicFilter},
    Datatype, DeviceState, FormatSpec, Value,
};
use log::{debug, info, warn};
use tokio::{select, task::JoinHandle, time::timeout};

use crate::{
    error::RoutingError,
    outbox::Outbox,
    routing,
    tree::{DeviceTree, Reconfiguration},
    DeviceBuilder, HomieError, Node,
};

/// Handler for inbound messages that do not address a settable property.
pub type OutOfBandHandler = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

/// State shared between the [Device], its [PropertyHandle]s and the routing task.
pub(crate) struct DeviceShared {
    pub client: Arc<DynClient>,
    pub tree: Mutex<DeviceTree>,
    pub topic: String,
    /// Set once the first connection has been acknowledged
    pub online_once: AtomicBool,
    pub out_of_band: Option<OutOfBandHandler>,
}

impl DeviceShared {
    pub async fn flush(&self, out: Outbox) -> Result<(), HomieError> {
        if out.is_empty() {
            return Ok(());
        }
        let requests = out.into_requests();
        debug!("Sending batch of {} requests. device={}", requests.len(), self.topic);
        if self.client.batch(requests).await.is_err() {
            warn!("Transport rejected batch. device={}", self.topic);
            return Err(HomieError::Transport);
        }
        Ok(())
    }

    pub async fn reconfigure<T, F>(&self, mutation: F) -> Result<T, HomieError>
    where
        F: FnOnce(&mut Reconfiguration<'_>) -> Result<T, HomieError>,
    {
        let (result, out) = self.tree.lock().unwrap().reconfigure(mutation);
        let flushed = self.flush(out).await;
        let value = result?;
        flushed?;
        Ok(value)
    }

    pub async fn set_value(&self, node_id: &str, property_id: &str, value: Value) -> Result<(), HomieError> {
        let out = {
            let mut tree = self.tree.lock().unwrap();
            let out = tree.set_value(node_id, property_id, value)?;
            if tree.is_disconnected() {
                return Ok(());
            }
            out
        };
        self.flush(out).await
    }
}

/// Structure that represents a Homie device.
///
/// The device owns the transport session and the tree of [Node]s and
/// [Property](crate::Property)s it announces. See [DeviceBuilder] on how to create a [Device].
///
/// Structural changes go through [Device::with_reconfiguration], which marks the device `init`
/// while a batch of changes is applied and `ready` again afterwards.
pub struct Device {
    shared: Arc<DeviceShared>,
    eventloop: Option<Box<DynEventLoop>>,
    routing: Option<JoinHandle<Result<(), RoutingError>>>,
}

impl Device {
    pub(crate) fn new_from_builder(builder: DeviceBuilder) -> Result<Self, HomieError> {
        let (shared, eventloop) = builder.into_shared()?;
        Ok(Self {
            shared: Arc::new(shared),
            eventloop: Some(eventloop),
            routing: None,
        })
    }

    pub fn id(&self) -> String {
        self.shared.tree.lock().unwrap().id().to_string()
    }

    pub fn name(&self) -> String {
        self.shared.tree.lock().unwrap().name().to_string()
    }

    /// The device's base topic, `{root}/{id}`
    pub fn topic(&self) -> &str {
        &self.shared.topic
    }

    pub fn state(&self) -> DeviceState {
        self.shared.tree.lock().unwrap().state()
    }

    pub fn is_published(&self) -> bool {
        self.shared.tree.lock().unwrap().is_published()
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.shared
            .tree
            .lock()
            .unwrap()
            .nodes()
            .iter()
            .map(|x| x.id().to_string())
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.shared.tree.lock().unwrap().nodes().len()
    }

    /// Get a handle to a property, `None` if no such property is attached.
    pub fn property(&self, node_id: &str, property_id: &str) -> Option<PropertyHandle> {
        self.shared
            .tree
            .lock()
            .unwrap()
            .property(node_id, property_id)?;
        Some(PropertyHandle::new(self.shared.clone(), node_id, property_id))
    }

    /// Apply a group of changes to the device tree.
    ///
    /// If the device is `ready`, `$state` is set to `init` before and back to `ready` after
    /// `mutation` runs and all resulting announcements are sent as one batch. Before the device
    /// is published the mutation is applied without any announcement.
    ///
    /// The window is closed and everything queued so far is sent even if `mutation` returns an
    /// error, in which case the error is returned. `mutation` must not call back into the
    /// [Device].
    pub async fn with_reconfiguration<T, F>(&self, mutation: F) -> Result<T, HomieError>
    where
        F: FnOnce(&mut Reconfiguration<'_>) -> Result<T, HomieError>,
    {
        self.shared.reconfigure(mutation).await
    }

    /// Attach a node in its own reconfiguration window, see [Reconfiguration::add_node].
    pub async fn add_node(&self, node: Node) -> Result<(), HomieError> {
        self.with_reconfiguration(|ctx| ctx.add_node(node)).await
    }

    /// Detach a node in its own reconfiguration window, see [Reconfiguration::remove_node].
    pub async fn remove_node(&self, id: &str) -> Result<bool, HomieError> {
        self.with_reconfiguration(|ctx| Ok(ctx.remove_node(id))).await
    }

    /// Rename the device. `$name` is re-announced if the device is published.
    pub async fn set_name<S: Into<String>>(&self, name: S) -> Result<(), HomieError> {
        let name = name.into();
        self.with_reconfiguration(|ctx| {
            ctx.set_name(name);
            Ok(())
        })
        .await
    }

    /// Set several values of one node and send the resulting messages as one batch.
    ///
    /// Nothing is assigned if any of the properties is unknown or any value does not fit its
    /// property's datatype.
    pub async fn batch_update<I, S, V>(&self, node_id: &str, updates: I) -> Result<(), HomieError>
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<String>,
        V: Into<Value>,
    {
        let updates = updates
            .into_iter()
            .map(|(id, value)| (id.into(), value.into()))
            .collect();
        let out = {
            let mut tree = self.shared.tree.lock().unwrap();
            let out = tree.batch_update(node_id, updates)?;
            if tree.is_disconnected() {
                return Ok(());
            }
            out
        };
        self.shared.flush(out).await
    }

    /// Announce the device and start routing inbound messages.
    ///
    /// Sends `$homie`, `$name` and `$state`, then `$nodes` and every node and property before
    /// moving the device to `ready`. Calling `publish` on a published device does nothing.
    pub async fn publish(&mut self) -> Result<(), HomieError> {
        {
            let tree = self.shared.tree.lock().unwrap();
            if tree.is_disconnected() {
                return Err(HomieError::Disconnected);
            }
            if tree.is_published() {
                return Ok(());
            }
        }

        // The event loop has to be polled while the announcements are sent
        if let Some(eventloop) = self.eventloop.take() {
            let shared = self.shared.clone();
            self.routing = Some(tokio::spawn(routing::run(shared, eventloop)));
        }

        let (header, body) = self.shared.tree.lock().unwrap().publish();
        info!("Publishing device. device={}", self.shared.topic);
        self.shared.flush(header).await?;
        self.shared.flush(body).await
    }

    /// Remove every retained message below the device's topic.
    ///
    /// Subscribes to `{root}/{id}/#`, collects the topics of the retained messages the broker
    /// delivers until the subscription is removed again, then clears each of them. Only
    /// possible before the device is published, fails with [HomieError::AlreadyPublished]
    /// afterwards.
    pub async fn clear_topics(&mut self) -> Result<(), HomieError> {
        if self.shared.tree.lock().unwrap().is_disconnected() {
            return Err(HomieError::Disconnected);
        }
        let Some(eventloop) = self.eventloop.as_mut() else {
            return Err(HomieError::AlreadyPublished);
        };
        let shared = self.shared.clone();
        let wildcard = device_wildcard(&shared.topic);

        let mut requests = pin!(async {
            shared
                .client
                .subscribe(TopicFilter::new_with_qos(wildcard.clone(), QoS::AtLeastOnce))
                .await?;
            shared.client.unsubscribe(wildcard.clone()).await
        });
        let mut sent = false;
        let mut unsubscribed = false;
        let mut topics: Vec<String> = Vec::new();

        while !(sent && unsubscribed) {
            select! {
                result = &mut requests, if !sent => {
                    if result.is_err() {
                        return Err(HomieError::Transport);
                    }
                    sent = true;
                },
                event = eventloop.poll() => match event {
                    Some(Event::Online) => shared.online_once.store(true, Ordering::SeqCst),
                    Some(Event::Message(message)) => {
                        if message.retain && !message.payload.is_empty() && !topics.contains(&message.topic) {
                            topics.push(message.topic);
                        }
                    }
                    Some(Event::Unsubscribed) => unsubscribed = true,
                    Some(_) => (),
                    None => return Err(HomieError::Disconnected),
                },
            }
        }

        info!(
            "Clearing {} retained topics. device={}",
            topics.len(),
            shared.topic
        );
        let clears = topics
            .into_iter()
            .map(|topic| Request::Publish(PublishMessage::clear(topic)))
            .collect::<Vec<_>>();
        let mut clear = pin!(shared.client.batch(clears));
        loop {
            select! {
                result = &mut clear => {
                    return result.map_err(|_| HomieError::Transport);
                },
                event = eventloop.poll() => match event {
                    Some(Event::Online) => shared.online_once.store(true, Ordering::SeqCst),
                    Some(_) => (),
                    None => return Err(HomieError::Disconnected),
                },
            }
        }
    }

    /// Close the session.
    ///
    /// The device is marked unpublished, the transport disconnected and the routing task,
    /// including every running command callback, aborted without waiting for it. A device that
    /// was never published polls its event loop for up to a second so the disconnect is sent.
    pub async fn disconnect(&mut self) -> Result<(), HomieError> {
        {
            let mut tree = self.shared.tree.lock().unwrap();
            if tree.is_disconnected() {
                return Ok(());
            }
            tree.disconnect();
        }
        info!("Disconnecting device. device={}", self.shared.topic);
        let result = self.shared.client.disconnect().await;
        if let Some(routing) = &self.routing {
            routing.abort();
        }
        if let Some(mut eventloop) = self.eventloop.take() {
            // Never published, nothing else drives the event loop to send the disconnect
            let until_offline = async {
                while let Some(event) = eventloop.poll().await {
                    if event == Event::Offline {
                        break;
                    }
                }
            };
            _ = timeout(Duration::from_secs(1), until_offline).await;
        }
        result.map_err(|_| HomieError::Transport)
    }

    /// Wait for the routing task to end.
    ///
    /// Returns [HomieError::RoutingTask] if the task ended because a command callback or the
    /// out-of-band handler panicked. A task ended through [Device::disconnect] is a clean end.
    pub async fn join(&mut self) -> Result<(), HomieError> {
        let Some(routing) = self.routing.take() else {
            return Ok(());
        };
        match routing.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(HomieError::RoutingTask(e)),
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(HomieError::RoutingTask(RoutingError::TaskPanicked(
                routing::panic_message(e.into_panic()),
            ))),
        }
    }
}

/// A cloneable handle to a property attached to a [Device].
///
/// Handed to command callbacks and returned by [Device::property]. Operations on a property that
/// has since been removed fail with [HomieError::UnknownProperty] or [HomieError::UnknownNode].
#[derive(Clone)]
pub struct PropertyHandle {
    shared: Arc<DeviceShared>,
    node_id: String,
    property_id: String,
}

impl PropertyHandle {
    pub(crate) fn new(shared: Arc<DeviceShared>, node_id: &str, property_id: &str) -> Self {
        Self {
            shared,
            node_id: node_id.to_string(),
            property_id: property_id.to_string(),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn id(&self) -> &str {
        &self.property_id
    }

    /// The cached value. Always `None` for non-retained properties.
    pub fn value(&self) -> Option<Value> {
        self.shared
            .tree
            .lock()
            .unwrap()
            .property(&self.node_id, &self.property_id)?
            .value()
            .cloned()
    }

    pub fn datatype(&self) -> Option<Datatype> {
        self.shared
            .tree
            .lock()
            .unwrap()
            .property(&self.node_id, &self.property_id)
            .map(|x| x.datatype())
    }

    /// The property's name prefixed with its node's full name.
    pub fn full_name(&self) -> Option<String> {
        self.shared
            .tree
            .lock()
            .unwrap()
            .property_full_name(&self.node_id, &self.property_id)
    }

    /// Assign a value.
    ///
    /// The value is converted to the property's datatype where possible (a string for an enum
    /// property, an integer for a float property) and rejected with
    /// [ValueTypeMismatch](homie_types::ValueError::ValueTypeMismatch) otherwise.
    ///
    /// A retained property ignores a value equal to the one it holds; otherwise it stores the
    /// value and, if published, sends it. A non-retained property stores nothing and sends every
    /// value while published.
    pub async fn set_value<V: Into<Value>>(&self, value: V) -> Result<(), HomieError> {
        self.shared
            .set_value(&self.node_id, &self.property_id, value.into())
            .await
    }

    /// Rename the property in its own reconfiguration window. `$name` is re-announced if published.
    pub async fn set_name<S: Into<String>>(&self, name: S) -> Result<(), HomieError> {
        let name = name.into();
        self.reconfigure(|property| {
            property.set_name(name);
            Ok(())
        })
        .await
    }

    /// Replace the format in its own reconfiguration window. `$format` is re-announced if published.
    pub async fn set_format<F: Into<FormatSpec>>(&self, format: F) -> Result<(), HomieError> {
        let format = format.into();
        self.reconfigure(|property| property.set_format(format)).await
    }

    /// Replace the unit in its own reconfiguration window. `$unit` is re-announced if published.
    pub async fn set_unit<S: Into<String>>(&self, unit: S) -> Result<(), HomieError> {
        let unit = unit.into();
        self.reconfigure(|property| {
            property.set_unit(unit);
            Ok(())
        })
        .await
    }

    /// Remove the unit in its own reconfiguration window, clearing `$unit` if published.
    pub async fn clear_unit(&self) -> Result<(), HomieError> {
        self.reconfigure(|property| {
            property.clear_unit();
            Ok(())
        })
        .await
    }

    async fn reconfigure<F>(&self, mutation: F) -> Result<(), HomieError>
    where
        F: FnOnce(&mut crate::PropertyMut<'_>) -> Result<(), HomieError>,
    {
        let node_id = &self.node_id;
        let property_id = &self.property_id;
        self.shared
            .reconfigure(|ctx| {
                let mut node = ctx.node(node_id)?;
                let mut property = node.property(property_id)?;
                mutation(&mut property)
            })
            .await
    }
}
