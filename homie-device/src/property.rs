use std::{fmt, future::Future, sync::Arc};

use futures::future::BoxFuture;
use homie_client::PublishMessage;
use log::debug;
use homie_types::{
    constants::{DATATYPE, FORMAT, NAME, RETAINED, SETTABLE, UNIT},
    topic::{attribute_topic, command_topic, QoS},
    Datatype, Format, FormatSpec, Value,
};

use crate::{entity::Entity, outbox::Outbox, HomieError, PropertyHandle};

/// Callback invoked with the casted value of an accepted command.
pub type CommandCallback = Arc<dyn Fn(PropertyHandle, Value) -> BoxFuture<'static, ()> + Send + Sync>;

/// Fallback validator given a chance to accept a command payload the built-in rules rejected.
pub type CommandValidator = Arc<dyn Fn(&str) -> Option<Value> + Send + Sync>;

/// The command rules of a property, detached from the tree so they run without holding its lock.
#[derive(Clone)]
pub(crate) struct CommandParser {
    datatype: Datatype,
    format: Option<Format>,
    validator: Option<CommandValidator>,
}

impl CommandParser {
    /// Returns `None` if neither the built-in rule of the datatype nor the fallback
    /// validator accepts `raw`, or the validator's value does not fit the datatype.
    pub fn parse(&self, raw: &str) -> Option<Value> {
        if let Some(value) = Value::parse(self.datatype, self.format.as_ref(), raw) {
            return Some(value);
        }
        let value = self.validator.as_ref().and_then(|validator| validator(raw))?;
        value.coerce(self.datatype).ok()
    }
}

/// A builder for creating a [Property].
pub struct PropertyBuilder {
    id: String,
    name: String,
    datatype: Datatype,
    format: Option<FormatSpec>,
    unit: Option<String>,
    value: Option<Value>,
    retained: bool,
    callback: Option<CommandCallback>,
    validator: Option<CommandValidator>,
}

impl PropertyBuilder {
    pub fn new<I: Into<String>, N: Into<String>>(id: I, name: N, datatype: Datatype) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            datatype,
            format: None,
            unit: None,
            value: None,
            retained: true,
            callback: None,
            validator: None,
        }
    }

    /// Sets the format. Required for enum and color properties.
    ///
    /// Integer and float formats are ranges such as `0..=100` or `"0:100"`.
    pub fn format<F: Into<FormatSpec>>(mut self, format: F) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn unit<S: Into<String>>(mut self, unit: S) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Sets the initial value. Only retained properties can hold one.
    pub fn value<V: Into<Value>>(mut self, value: V) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Sets whether the broker retains the value of the property. Defaults to `true`.
    pub fn retained(mut self, retained: bool) -> Self {
        self.retained = retained;
        self
    }

    /// Makes the property settable.
    ///
    /// `callback` is called with every command that passes validation. Commands are not
    /// applied automatically, the callback usually calls [PropertyHandle::set_value].
    pub fn settable<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(PropertyHandle, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.callback = Some(Arc::new(
            move |handle: PropertyHandle, value: Value| -> BoxFuture<'static, ()> {
                Box::pin(callback(handle, value))
            },
        ));
        self
    }

    /// Sets a validator consulted for command payloads the built-in rules reject.
    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&str) -> Option<Value> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn build(self) -> Result<Property, HomieError> {
        let entity = Entity::new(self.id, self.name)?;
        let format = Format::normalize(self.datatype, self.format)?;
        if self.value.is_some() && !self.retained {
            return Err(HomieError::InitialValueNotRetained);
        }
        let value = match self.value {
            Some(value) => Some(value.coerce(self.datatype)?),
            None => None,
        };
        Ok(Property {
            entity,
            datatype: self.datatype,
            format,
            unit: self.unit,
            value,
            retained: self.retained,
            published: false,
            callback: self.callback,
            validator: self.validator,
        })
    }
}

/// A leaf of the device tree: a typed value with its metadata.
///
/// See [PropertyBuilder] on how to create a [Property].
pub struct Property {
    entity: Entity,
    datatype: Datatype,
    format: Option<Format>,
    unit: Option<String>,
    value: Option<Value>,
    retained: bool,
    published: bool,
    callback: Option<CommandCallback>,
    validator: Option<CommandValidator>,
}

impl Property {
    pub fn id(&self) -> &str {
        self.entity.id()
    }

    pub fn name(&self) -> &str {
        self.entity.name()
    }

    pub fn datatype(&self) -> Datatype {
        self.datatype
    }

    pub fn format(&self) -> Option<&Format> {
        self.format.as_ref()
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    /// The cached value. Always `None` for non-retained properties.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn is_retained(&self) -> bool {
        self.retained
    }

    pub fn is_settable(&self) -> bool {
        self.callback.is_some()
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    pub(crate) fn callback(&self) -> Option<CommandCallback> {
        self.callback.clone()
    }

    /// Validate and cast a command payload.
    ///
    /// Returns `None` if neither the built-in rule of the datatype nor the fallback
    /// validator accepts it, or the validator's value does not fit the datatype.
    pub fn command(&self, raw: &str) -> Option<Value> {
        self.command_parser().parse(raw)
    }

    pub(crate) fn command_parser(&self) -> CommandParser {
        CommandParser {
            datatype: self.datatype,
            format: self.format.clone(),
            validator: self.validator.clone(),
        }
    }

    fn publish_value(&self, value: &Value, topic: &str, out: &mut Outbox) {
        let serialized = value.to_string();
        debug!("publishing {serialized:?} to {topic}");
        out.publish(PublishMessage::new(
            topic,
            Some(serialized),
            self.retained,
            QoS::AtLeastOnce,
        ));
    }

    /// Assign a value.
    ///
    /// Retained properties ignore a value equal to the cached one, otherwise the value is cached
    /// and, when published, announced once. Non-retained properties cache nothing and announce
    /// every assignment when published.
    pub(crate) fn set_value(&mut self, value: Value, topic: &str, out: &mut Outbox) -> Result<(), HomieError> {
        let value = value.coerce(self.datatype)?;
        if !self.retained {
            if self.published {
                self.publish_value(&value, topic, out);
            }
            return Ok(());
        }
        if self.value.as_ref() == Some(&value) {
            return Ok(());
        }
        if self.published {
            self.publish_value(&value, topic, out);
        }
        self.value = Some(value);
        Ok(())
    }

    /// Rename, re-announcing `$name` when published.
    pub(crate) fn set_name(&mut self, name: String, topic: &str, out: &mut Outbox) {
        let announce = self.published && out.metadata();
        self.entity.rename(name, topic, announce, out);
    }

    /// Validate and replace the format, re-announcing `$format` when published.
    pub(crate) fn set_format(&mut self, format: Option<FormatSpec>, topic: &str, out: &mut Outbox) -> Result<(), HomieError> {
        let format = Format::normalize(self.datatype, format)?;
        if format == self.format {
            return Ok(());
        }
        self.format = format;
        if self.published && out.metadata() {
            let format_topic = attribute_topic(topic, FORMAT);
            match &self.format {
                Some(format) => out.retained(format_topic, format.to_string()),
                None => out.clear(format_topic),
            }
        }
        Ok(())
    }

    /// Replace the unit, re-announcing `$unit` when published.
    pub(crate) fn set_unit(&mut self, unit: Option<String>, topic: &str, out: &mut Outbox) {
        if unit == self.unit {
            return;
        }
        self.unit = unit;
        if self.published && out.metadata() {
            let unit_topic = attribute_topic(topic, UNIT);
            match &self.unit {
                Some(unit) => out.retained(unit_topic, unit.clone()),
                None => out.clear(unit_topic),
            }
        }
    }

    pub(crate) fn subscribe(&self, topic: &str, out: &mut Outbox) {
        if self.is_settable() {
            out.subscribe(command_topic(topic));
        }
    }

    pub(crate) fn publish(&mut self, topic: &str, out: &mut Outbox) {
        if self.published {
            return;
        }
        if out.metadata() {
            out.retained(attribute_topic(topic, NAME), self.name());
            out.retained(attribute_topic(topic, DATATYPE), self.datatype.as_str());
            if let Some(format) = &self.format {
                out.retained(attribute_topic(topic, FORMAT), format.to_string());
            }
            if self.is_settable() {
                out.retained(attribute_topic(topic, SETTABLE), "true");
            }
            if !self.retained {
                out.retained(attribute_topic(topic, RETAINED), "false");
            }
            if let Some(unit) = &self.unit {
                out.retained(attribute_topic(topic, UNIT), unit.clone());
            }
        }
        if let Some(value) = &self.value {
            self.publish_value(value, topic, out);
        }
        self.subscribe(topic, out);
        self.published = true;
    }

    pub(crate) fn unpublish(&mut self, topic: &str, out: &mut Outbox) {
        if !self.published {
            return;
        }
        self.published = false;
        if out.metadata() {
            out.clear(attribute_topic(topic, NAME));
            out.clear(attribute_topic(topic, DATATYPE));
            if self.format.is_some() {
                out.clear(attribute_topic(topic, FORMAT));
            }
            if self.is_settable() {
                out.clear(attribute_topic(topic, SETTABLE));
            }
            if !self.retained {
                out.clear(attribute_topic(topic, RETAINED));
            }
            if self.unit.is_some() {
                out.clear(attribute_topic(topic, UNIT));
            }
        }
        if self.is_settable() {
            out.unsubscribe(command_topic(topic));
        }
        if self.retained && self.value.is_some() {
            out.clear(topic.to_string());
        }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Property");
        s.field("id", &self.id())
            .field("name", &self.name())
            .field("datatype", &self.datatype);
        if let Some(format) = &self.format {
            s.field("format", &format.to_string());
        }
        if let Some(unit) = &self.unit {
            s.field("unit", unit);
        }
        if self.is_settable() {
            s.field("settable", &true);
        }
        if self.retained {
            s.field("value", &self.value);
        } else {
            s.field("retained", &false);
        }
        s.finish()
    }
}
