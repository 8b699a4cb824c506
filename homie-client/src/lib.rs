//! Part of [homie](https://crates.io/crates/homie), a [Homie](https://homieiot.github.io/) device development library.
//! 
//! This library defines traits and types used to implement the transport a Homie device runs over.
//! 
//! # Feature Flags
//! 
//! - `channel-client`: Enables the channel based [EventLoop] and [Client] implementation. Disabled by default.
//! 
 
mod traits;
mod types;

pub use traits::{Client, DynClient, EventLoop, DynEventLoop};
pub use types::*;

/// A basic [EventLoop] and [Client] implementation based on channels
/// 
/// Useful for writing tests where it is not appropriate to be running a real MQTT client and broker setup
#[cfg(any(feature = "channel-client", doc))]
pub mod channel;
