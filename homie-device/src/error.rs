use homie_types::ValueError;
use thiserror::Error;

/// A fault that terminated the inbound routing task.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoutingError {
    #[error("Command callback panicked: {0}")]
    CallbackPanicked(String),
    #[error("Routing task panicked: {0}")]
    TaskPanicked(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HomieError {
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error("Duplicate identifier '{0}'")]
    DuplicateIdentifier(String),
    #[error("An initial value cannot be provided for a non-retained property")]
    InitialValueNotRetained,
    #[error("Unknown node '{0}'")]
    UnknownNode(String),
    #[error("Unknown property '{property}' on node '{node}'")]
    UnknownProperty { node: String, property: String },
    #[error("Device has already been published")]
    AlreadyPublished,
    #[error("Missing configuration: {0}")]
    MissingConfiguration(&'static str),
    #[error("Device has been disconnected")]
    Disconnected,
    #[error("Transport request failed")]
    Transport,
    #[error("Fault in the inbound routing task: {0}")]
    RoutingTask(RoutingError),
}
