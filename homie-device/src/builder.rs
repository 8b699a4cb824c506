use std::sync::{atomic::AtomicBool, Arc, Mutex};

use homie_client::{Client, DynClient, DynEventLoop, EventLoop, LastWill};
use homie_types::{
    constants::DEFAULT_ROOT_TOPIC,
    topic::device_topic,
    utils::validate_root_topic,
};

use crate::{
    device::{DeviceShared, OutOfBandHandler},
    entity::Entity,
    tree::DeviceTree,
    Device, HomieError,
};

/// A builder for creating and configuring [Device] instances.
pub struct DeviceBuilder {
    id: Option<String>,
    name: Option<String>,
    root_topic: String,
    metadata: bool,
    out_of_band: Option<OutOfBandHandler>,
    eventloop_client: (Box<DynEventLoop>, Arc<DynClient>),
}

impl DeviceBuilder {
    /// Creates a new builder with the specified event loop and client.
    pub fn new<E: EventLoop + Send + 'static, C: Client + Send + Sync + 'static>(
        eventloop: E,
        client: C,
    ) -> Self {
        Self {
            id: None,
            name: None,
            root_topic: DEFAULT_ROOT_TOPIC.to_string(),
            metadata: true,
            out_of_band: None,
            eventloop_client: (Box::new(eventloop), Arc::new(client)),
        }
    }

    /// Sets the device id. Required.
    ///
    /// The id must consist of lowercase letters, digits and hyphens and must not start with a
    /// hyphen, see [escape_id](homie_types::utils::escape_id).
    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the human readable device name. Required.
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the root topic the device lives under. Defaults to `homie`.
    pub fn with_root_topic<S: Into<String>>(mut self, root_topic: S) -> Self {
        self.root_topic = root_topic.into();
        self
    }

    /// Sets whether property metadata (`$datatype`, `$format` ...) is announced. Defaults to `true`.
    pub fn with_metadata(mut self, metadata: bool) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets a handler for received messages that do not address a settable property.
    pub fn with_out_of_band_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &[u8]) + Send + Sync + 'static,
    {
        self.out_of_band = Some(Arc::new(handler));
        self
    }

    pub(crate) fn into_shared(self) -> Result<(DeviceShared, Box<DynEventLoop>), HomieError> {
        let id = self.id.ok_or(HomieError::MissingConfiguration("device id"))?;
        let name = self
            .name
            .ok_or(HomieError::MissingConfiguration("device name"))?;
        validate_root_topic(&self.root_topic)?;
        let entity = Entity::new(id, name)?;

        let topic = device_topic(&self.root_topic, entity.id());
        let (mut eventloop, client) = self.eventloop_client;
        eventloop.set_last_will(LastWill::new_device(&topic));

        let shared = DeviceShared {
            client,
            tree: Mutex::new(DeviceTree::new(entity, topic.clone(), self.metadata)),
            topic,
            online_once: AtomicBool::new(false),
            out_of_band: self.out_of_band,
        };
        Ok((shared, eventloop))
    }

    /// Builds the [Device].
    ///
    /// Fails if the id or name is missing, or the id or root topic is invalid. The device's
    /// last will (`$state = lost`) is registered with the event loop.
    pub fn build(self) -> Result<Device, HomieError> {
        Device::new_from_builder(self)
    }
}
