//! Part of [homie](https://crates.io/crates/homie), a [Homie](https://homieiot.github.io/) device development library.
//!
//! This library provides the device side of the convention: a [Device] made of [Node]s and
//! [Property]s, announced over a transport implementing the [homie_client] traits.
//!
//! # Example
//!
//! ```no_run
//! use homie_client::channel::ChannelEventLoop;
//! use homie_device::{DeviceBuilder, Node, PropertyBuilder};
//! use homie_types::Datatype;
//!
//! # async fn example() -> Result<(), homie_device::HomieError> {
//! let (eventloop, client, _broker) = ChannelEventLoop::new();
//! let mut device = DeviceBuilder::new(eventloop, client)
//!     .with_id("lamp")
//!     .with_name("Desk lamp")
//!     .build()?;
//!
//! let node = Node::new("light", "Light", "switch")?.with_property(
//!     PropertyBuilder::new("power", "Power", Datatype::Boolean)
//!         .value(false)
//!         .settable(|property, value| async move {
//!             _ = property.set_value(value).await;
//!         })
//!         .build()?,
//! )?;
//! device.add_node(node).await?;
//! device.publish().await?;
//! device.join().await
//! # }
//! ```

mod builder;
mod device;
mod entity;
mod error;
mod node;
mod outbox;
mod property;
mod routing;
mod tree;

pub use builder::DeviceBuilder;
pub use device::{Device, OutOfBandHandler, PropertyHandle};
pub use error::{HomieError, RoutingError};
pub use node::Node;
pub use property::{CommandCallback, CommandValidator, Property, PropertyBuilder};
pub use tree::{NodeMut, PropertyMut, Reconfiguration};
