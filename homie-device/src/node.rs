use std::fmt;

use homie_types::{
    constants::{NAME, PROPERTIES, TYPE},
    topic::{attribute_topic, child_topic},
};

use crate::{entity::Entity, outbox::Outbox, HomieError, Property};

/// A named group of properties.
///
/// Properties can be added freely with [Node::with_property] before the node is attached to a
/// device. Once attached, the node is only reachable through a [NodeMut](crate::NodeMut).
pub struct Node {
    entity: Entity,
    node_type: String,
    properties: Vec<Property>,
    published: bool,
}

impl Node {
    pub fn new<I, N, T>(id: I, name: N, node_type: T) -> Result<Self, HomieError>
    where
        I: Into<String>,
        N: Into<String>,
        T: Into<String>,
    {
        Ok(Self {
            entity: Entity::new(id, name)?,
            node_type: node_type.into(),
            properties: Vec::new(),
            published: false,
        })
    }

    /// Add a property to a detached node.
    ///
    /// Fails with [HomieError::DuplicateIdentifier] if a property with the same id exists.
    pub fn with_property(mut self, property: Property) -> Result<Self, HomieError> {
        self.check_unique(property.id())?;
        self.properties.push(property);
        Ok(self)
    }

    pub fn id(&self) -> &str {
        self.entity.id()
    }

    pub fn name(&self) -> &str {
        self.entity.name()
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    pub fn property(&self, id: &str) -> Option<&Property> {
        self.properties.iter().find(|x| x.id() == id)
    }

    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Comma joined property ids in insertion order, the `$properties` payload.
    pub fn property_ids(&self) -> String {
        self.properties
            .iter()
            .map(|x| x.id())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub(crate) fn property_mut(&mut self, id: &str) -> Option<&mut Property> {
        self.properties.iter_mut().find(|x| x.id() == id)
    }

    pub(crate) fn properties_mut(&mut self) -> impl Iterator<Item = &mut Property> {
        self.properties.iter_mut()
    }

    fn check_unique(&self, id: &str) -> Result<(), HomieError> {
        if self.property(id).is_some() {
            return Err(HomieError::DuplicateIdentifier(id.to_string()));
        }
        Ok(())
    }

    pub(crate) fn set_name(&mut self, name: String, topic: &str, out: &mut Outbox) {
        self.entity.rename(name, topic, self.published, out);
    }

    /// Attach a property. When `announce` is set the property is published right away and
    /// `$properties` republished.
    pub(crate) fn insert_property(
        &mut self,
        mut property: Property,
        topic: &str,
        announce: bool,
        out: &mut Outbox,
    ) -> Result<(), HomieError> {
        self.check_unique(property.id())?;
        if announce {
            property.publish(&child_topic(topic, property.id()), out);
        }
        self.properties.push(property);
        if announce {
            out.retained(attribute_topic(topic, PROPERTIES), self.property_ids());
        }
        Ok(())
    }

    pub(crate) fn remove_property(&mut self, id: &str, topic: &str, out: &mut Outbox) -> bool {
        let Some(index) = self.properties.iter().position(|x| x.id() == id) else {
            return false;
        };
        let mut property = self.properties.remove(index);
        property.unpublish(&child_topic(topic, id), out);
        if self.published {
            out.retained(attribute_topic(topic, PROPERTIES), self.property_ids());
        }
        true
    }

    pub(crate) fn publish(&mut self, topic: &str, out: &mut Outbox) {
        if !self.published {
            out.retained(attribute_topic(topic, NAME), self.name());
            out.retained(attribute_topic(topic, TYPE), self.node_type.clone());
            self.published = true;
        }
        out.retained(attribute_topic(topic, PROPERTIES), self.property_ids());
        for property in self.properties.iter_mut() {
            let property_topic = child_topic(topic, property.id());
            property.publish(&property_topic, out);
        }
    }

    pub(crate) fn unpublish(&mut self, topic: &str, out: &mut Outbox) {
        if self.published {
            out.clear(attribute_topic(topic, NAME));
            out.clear(attribute_topic(topic, TYPE));
            out.clear(attribute_topic(topic, PROPERTIES));
            self.published = false;
        }
        for property in self.properties.iter_mut() {
            let property_topic = child_topic(topic, property.id());
            property.unpublish(&property_topic, out);
        }
    }

    /// Command topics of every settable property, used to resubscribe after a reconnect.
    pub(crate) fn subscribe(&self, topic: &str, out: &mut Outbox) {
        for property in self.properties.iter() {
            property.subscribe(&child_topic(topic, property.id()), out);
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("type", &self.node_type)
            .field("properties", &self.properties)
            .finish()
    }
}
