use homie_types::{
    constants::{HOMIE, HOMIE_VERSION, NAME, NODES, STATE},
    topic::{attribute_topic, child_topic},
    DeviceState, FormatSpec, Value,
};

use crate::{
    entity::Entity,
    outbox::Outbox,
    property::{CommandCallback, CommandParser},
    HomieError, Node, Property,
};

/// Outcome of resolving an inbound message against the tree.
pub(crate) enum Route {
    /// A settable property is addressed. The payload is parsed after the tree lock is released.
    Settable(CommandCallback, CommandParser),
    /// No settable property is addressed by the topic
    OutOfBand,
}

/// The device's entity tree and announcement state. Lives behind the device mutex.
pub(crate) struct DeviceTree {
    entity: Entity,
    topic: String,
    state: DeviceState,
    nodes: Vec<Node>,
    published: bool,
    metadata: bool,
    disconnected: bool,
}

impl DeviceTree {
    pub fn new(entity: Entity, topic: String, metadata: bool) -> Self {
        Self {
            entity,
            topic,
            state: DeviceState::Init,
            nodes: Vec::new(),
            published: false,
            metadata,
            disconnected: false,
        }
    }

    pub fn id(&self) -> &str {
        self.entity.id()
    }

    pub fn name(&self) -> &str {
        self.entity.name()
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    pub fn outbox(&self) -> Outbox {
        Outbox::new(self.metadata)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|x| x.id() == id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn property(&self, node_id: &str, property_id: &str) -> Option<&Property> {
        self.node(node_id)?.property(property_id)
    }

    fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|x| x.id() == id)
    }

    fn node_ids(&self) -> String {
        self.nodes
            .iter()
            .map(|x| x.id())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// A node's own name when it is the only node, otherwise prefixed with the device name.
    pub fn node_full_name(&self, node: &Node) -> String {
        if self.nodes.len() == 1 {
            node.name().to_string()
        } else {
            format!("{} {}", self.name(), node.name())
        }
    }

    pub fn property_full_name(&self, node_id: &str, property_id: &str) -> Option<String> {
        let node = self.node(node_id)?;
        let property = node.property(property_id)?;
        Some(format!("{} {}", self.node_full_name(node), property.name()))
    }

    fn announce_state(&mut self, state: DeviceState, out: &mut Outbox) {
        self.state = state;
        out.retained(attribute_topic(&self.topic, STATE), state.as_str());
    }

    /// Run `mutation` inside a reconfiguration window.
    ///
    /// When the device is `ready` the window is bracketed by `init` and `ready` announcements,
    /// otherwise the mutation runs as is. The bracket closes even if the mutation fails.
    pub fn reconfigure<T, F>(&mut self, mutation: F) -> (Result<T, HomieError>, Outbox)
    where
        F: FnOnce(&mut Reconfiguration<'_>) -> Result<T, HomieError>,
    {
        let mut out = self.outbox();
        if self.disconnected {
            return (Err(HomieError::Disconnected), out);
        }
        let prior = self.state;
        if prior != DeviceState::Init {
            self.announce_state(DeviceState::Init, &mut out);
        }
        let result = mutation(&mut Reconfiguration {
            tree: &mut *self,
            out: &mut out,
            prior,
        });
        if prior != DeviceState::Init {
            self.announce_state(DeviceState::Ready, &mut out);
        }
        (result, out)
    }

    /// Requests of the first publish, split into the device header and the rest of the tree.
    pub fn publish(&mut self) -> (Outbox, Outbox) {
        let mut header = self.outbox();
        let mut body = self.outbox();
        if self.published {
            return (header, body);
        }
        header.retained(attribute_topic(&self.topic, HOMIE), HOMIE_VERSION);
        header.retained(attribute_topic(&self.topic, NAME), self.name());
        header.retained(attribute_topic(&self.topic, STATE), self.state.as_str());

        body.retained(attribute_topic(&self.topic, NODES), self.node_ids());
        for node in self.nodes.iter_mut() {
            let node_topic = child_topic(&self.topic, node.id());
            node.publish(&node_topic, &mut body);
        }
        self.announce_state(DeviceState::Ready, &mut body);
        self.published = true;
        (header, body)
    }

    pub fn disconnect(&mut self) {
        self.published = false;
        self.disconnected = true;
    }

    /// Requests restoring the session after a reconnect.
    pub fn recover(&mut self) -> Outbox {
        let mut out = self.outbox();
        for node in self.nodes.iter() {
            node.subscribe(&child_topic(&self.topic, node.id()), &mut out);
        }
        if self.state == DeviceState::Init {
            out.retained(attribute_topic(&self.topic, STATE), self.state.as_str());
        } else {
            self.announce_state(DeviceState::Init, &mut out);
            self.announce_state(DeviceState::Ready, &mut out);
        }
        out
    }

    /// Resolve a command topic's target and run the property's validation on `payload`.
    pub fn route(&self, node_id: &str, property_id: &str) -> Route {
        let Some(property) = self.property(node_id, property_id) else {
            return Route::OutOfBand;
        };
        match property.callback() {
            Some(callback) => Route::Settable(callback, property.command_parser()),
            None => Route::OutOfBand,
        }
    }

    pub fn set_value(&mut self, node_id: &str, property_id: &str, value: Value) -> Result<Outbox, HomieError> {
        let mut out = self.outbox();
        let topic = self.property_topic(node_id, property_id);
        self.property_mut(node_id, property_id)?
            .set_value(value, &topic, &mut out)?;
        Ok(out)
    }

    /// Assign several values of one node, all or nothing.
    pub fn batch_update(&mut self, node_id: &str, updates: Vec<(String, Value)>) -> Result<Outbox, HomieError> {
        let node = self
            .node(node_id)
            .ok_or_else(|| HomieError::UnknownNode(node_id.to_string()))?;
        let mut checked = Vec::with_capacity(updates.len());
        for (property_id, value) in updates {
            let property = node
                .property(&property_id)
                .ok_or_else(|| HomieError::UnknownProperty {
                    node: node_id.to_string(),
                    property: property_id.clone(),
                })?;
            let value = value.coerce(property.datatype())?;
            checked.push((property_id, value));
        }
        let mut out = self.outbox();
        for (property_id, value) in checked {
            let topic = self.property_topic(node_id, &property_id);
            self.property_mut(node_id, &property_id)?
                .set_value(value, &topic, &mut out)?;
        }
        Ok(out)
    }

    fn property_topic(&self, node_id: &str, property_id: &str) -> String {
        child_topic(&child_topic(&self.topic, node_id), property_id)
    }

    fn property_mut(&mut self, node_id: &str, property_id: &str) -> Result<&mut Property, HomieError> {
        self.node_mut(node_id)
            .ok_or_else(|| HomieError::UnknownNode(node_id.to_string()))?
            .property_mut(property_id)
            .ok_or_else(|| HomieError::UnknownProperty {
                node: node_id.to_string(),
                property: property_id.to_string(),
            })
    }
}

/// Mutation context of a reconfiguration window, see
/// [Device::with_reconfiguration](crate::Device::with_reconfiguration).
///
/// Every change made through the context and its [NodeMut]/[PropertyMut] children is sent as
/// one batch when the window closes. A mutator that fails leaves the tree as it was.
pub struct Reconfiguration<'a> {
    tree: &'a mut DeviceTree,
    out: &'a mut Outbox,
    prior: DeviceState,
}

impl Reconfiguration<'_> {
    /// The device state observed when the window opened.
    pub fn prior_state(&self) -> DeviceState {
        self.prior
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.tree.nodes.iter().map(|x| x.id().to_string()).collect()
    }

    /// Rename the device. `$name` is re-announced if the device is published.
    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        let published = self.tree.published;
        self.tree
            .entity
            .rename(name.into(), &self.tree.topic, published, self.out);
    }

    /// Attach a node.
    ///
    /// Fails with [HomieError::DuplicateIdentifier] if a node with the same id exists. If the
    /// device was `ready` when the window opened, the node is published and `$nodes`
    /// re-announced.
    pub fn add_node(&mut self, mut node: Node) -> Result<(), HomieError> {
        if self.tree.node(node.id()).is_some() {
            return Err(HomieError::DuplicateIdentifier(node.id().to_string()));
        }
        let announce = self.prior == DeviceState::Ready;
        if announce {
            node.publish(&child_topic(&self.tree.topic, node.id()), self.out);
        }
        self.tree.nodes.push(node);
        if announce {
            self.out
                .retained(attribute_topic(&self.tree.topic, NODES), self.tree.node_ids());
        }
        Ok(())
    }

    /// Unpublish and detach a node. `$nodes` is re-announced if the device is published.
    ///
    /// Returns whether a node was removed.
    pub fn remove_node(&mut self, id: &str) -> bool {
        let Some(index) = self.tree.nodes.iter().position(|x| x.id() == id) else {
            return false;
        };
        let mut node = self.tree.nodes.remove(index);
        node.unpublish(&child_topic(&self.tree.topic, id), self.out);
        if self.tree.published {
            self.out
                .retained(attribute_topic(&self.tree.topic, NODES), self.tree.node_ids());
        }
        true
    }

    pub fn node(&mut self, id: &str) -> Result<NodeMut<'_>, HomieError> {
        let topic = child_topic(&self.tree.topic, id);
        let node = self
            .tree
            .node_mut(id)
            .ok_or_else(|| HomieError::UnknownNode(id.to_string()))?;
        Ok(NodeMut {
            node,
            topic,
            out: &mut *self.out,
            prior: self.prior,
        })
    }
}

/// An attached node, borrowed from a [Reconfiguration].
pub struct NodeMut<'a> {
    node: &'a mut Node,
    topic: String,
    out: &'a mut Outbox,
    prior: DeviceState,
}

impl NodeMut<'_> {
    pub fn id(&self) -> &str {
        self.node.id()
    }

    pub fn name(&self) -> &str {
        self.node.name()
    }

    /// Rename the node. `$name` is re-announced if the node is published.
    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        self.node.set_name(name.into(), &self.topic, self.out);
    }

    /// Attach a property.
    ///
    /// Fails with [HomieError::DuplicateIdentifier] if a property with the same id exists. If the
    /// device was `ready` when the window opened, the property is published and `$properties`
    /// re-announced.
    pub fn add_property(&mut self, property: Property) -> Result<(), HomieError> {
        let announce = self.prior == DeviceState::Ready && self.node.is_published();
        self.node
            .insert_property(property, &self.topic, announce, self.out)
    }

    /// Unpublish and detach a property. `$properties` is re-announced if the node is published.
    ///
    /// Returns whether a property was removed.
    pub fn remove_property(&mut self, id: &str) -> bool {
        self.node.remove_property(id, &self.topic, self.out)
    }

    pub fn property(&mut self, id: &str) -> Result<PropertyMut<'_>, HomieError> {
        let topic = child_topic(&self.topic, id);
        let node_id = self.node.id().to_string();
        let property = self
            .node
            .property_mut(id)
            .ok_or_else(|| HomieError::UnknownProperty {
                node: node_id,
                property: id.to_string(),
            })?;
        Ok(PropertyMut {
            property,
            topic,
            out: &mut *self.out,
        })
    }
}

/// An attached property, borrowed from a [NodeMut].
///
/// Metadata setters re-announce the changed topic if the property is published.
pub struct PropertyMut<'a> {
    property: &'a mut Property,
    topic: String,
    out: &'a mut Outbox,
}

impl PropertyMut<'_> {
    pub fn id(&self) -> &str {
        self.property.id()
    }

    pub fn property(&self) -> &Property {
        self.property
    }

    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        self.property.set_name(name.into(), &self.topic, self.out);
    }

    /// Validate and replace the format. `$format` is re-announced if published.
    pub fn set_format<F: Into<FormatSpec>>(&mut self, format: F) -> Result<(), HomieError> {
        self.property
            .set_format(Some(format.into()), &self.topic, self.out)
    }

    /// Remove the format, which fails for datatypes that require one.
    pub fn clear_format(&mut self) -> Result<(), HomieError> {
        self.property.set_format(None, &self.topic, self.out)
    }

    /// Replace the unit. `$unit` is re-announced if published.
    pub fn set_unit<S: Into<String>>(&mut self, unit: S) {
        self.property
            .set_unit(Some(unit.into()), &self.topic, self.out);
    }

    /// Remove the unit, clearing `$unit` if published.
    pub fn clear_unit(&mut self) {
        self.property.set_unit(None, &self.topic, self.out);
    }

    /// Assign a value, see [PropertyHandle::set_value](crate::PropertyHandle::set_value).
    pub fn set_value<V: Into<Value>>(&mut self, value: V) -> Result<(), HomieError> {
        self.property
            .set_value(value.into(), &self.topic, self.out)
    }
}
