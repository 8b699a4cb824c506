use crate::{constants::SET, utils::validate_id};

/// Delivery guarantee requested for a publish or subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TopicFilter {
    pub topic: String,
    pub qos: QoS,
}

impl TopicFilter {
    pub fn new<S: Into<String>>(topic: S) -> Self {
        Self::new_with_qos(topic, QoS::AtMostOnce)
    }

    pub fn new_with_qos<S: Into<String>>(topic: S, qos: QoS) -> Self {
        Self {
            topic: topic.into(),
            qos,
        }
    }
}

/// `{root}/{device_id}`
pub fn device_topic(root_topic: &str, device_id: &str) -> String {
    format!("{root_topic}/{device_id}")
}

/// `{parent}/{id}`, used for both node and property topics
pub fn child_topic(parent_topic: &str, id: &str) -> String {
    format!("{parent_topic}/{id}")
}

/// `{entity}/{attribute}` e.g. `homie/d1/$name`
pub fn attribute_topic(entity_topic: &str, attribute: &str) -> String {
    format!("{entity_topic}/{attribute}")
}

pub fn command_topic(property_topic: &str) -> String {
    format!("{property_topic}/{SET}")
}

/// Filter matching every topic below a device
pub fn device_wildcard(device_topic: &str) -> String {
    format!("{device_topic}/#")
}

/// The node and property ids addressed by a command topic.
#[derive(Debug, PartialEq)]
pub struct CommandTarget<'a> {
    pub node_id: &'a str,
    pub property_id: &'a str,
}

/// Match `topic` against `{device_topic}/{node}/{property}/set`.
///
/// Returns `None` for anything outside the convention's command layout, including
/// ids that do not satisfy the identifier grammar.
pub fn parse_command_topic<'a>(device_topic: &str, topic: &'a str) -> Option<CommandTarget<'a>> {
    let rest = topic.strip_prefix(device_topic)?.strip_prefix('/')?;
    let mut iter = rest.split('/');

    let node_id = iter.next()?;
    let property_id = iter.next()?;
    if iter.next()? != SET || iter.next().is_some() {
        return None;
    }
    if validate_id(node_id).is_err() || validate_id(property_id).is_err() {
        return None;
    }
    Some(CommandTarget {
        node_id,
        property_id,
    })
}
