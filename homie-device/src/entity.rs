use homie_types::{constants::NAME, topic::attribute_topic, utils::validate_id, ValueError};

use crate::outbox::Outbox;

/// Identifier and display name shared by devices, nodes and properties
#[derive(Debug, Clone)]
pub(crate) struct Entity {
    id: String,
    name: String,
}

impl Entity {

    pub fn new<I: Into<String>, N: Into<String>>(id: I, name: N) -> Result<Self, ValueError> {
        let id = id.into();
        validate_id(&id)?;
        Ok(Self { id, name: name.into() })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the name and, if it changed and `published` is set, queue the `$name` announcement.
    ///
    /// Returns whether the name changed.
    pub fn rename(&mut self, name: String, topic: &str, published: bool, out: &mut Outbox) -> bool {
        if self.name == name {
            return false;
        }
        self.name = name;
        if published {
            out.retained(attribute_topic(topic, NAME), self.name.clone());
        }
        true
    }
}
